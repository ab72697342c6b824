pub mod gateway;
pub mod plan;

pub use gateway::{filter_graph, FfmpegGateway, RenderGateway, RenderRequest};
pub use plan::{build_plan, MixPlan, PanAutomation, PanPoint, Source, PAN_SWEEP_SECS};
