//! Audio render gateway.
//!
//! The engine only knows [`RenderGateway`]; [`FfmpegGateway`] is the backend
//! used in production. It translates a [`MixPlan`] into an ffmpeg filter
//! graph and runs ffmpeg as a child process. The child is killed if the
//! render future is dropped, so a caller-side timeout also stops the work.

use std::future::Future;
use std::path::PathBuf;
use std::process::Stdio;

use serde::{Deserialize, Serialize};
use tokio::process::Command;

use super::plan::MixPlan;
use crate::error::RenderError;

/// Everything a backend needs to produce one alarm sound.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderRequest {
    pub source_nonrem: PathBuf,
    pub source_rem: PathBuf,
    pub plan: MixPlan,
    pub dest: PathBuf,
}

pub trait RenderGateway: Send + Sync {
    /// Render `request` and return the path written.
    fn render(
        &self,
        request: RenderRequest,
    ) -> impl Future<Output = Result<PathBuf, RenderError>> + Send;
}

/// Filter graph for a plan, plus the label of its final output pad.
pub fn filter_graph(plan: &MixPlan) -> (Vec<String>, &'static str) {
    let mut graph = vec![
        // Mono inputs are upmixed so the pan stage is always defined.
        format!(
            "[0:a]aformat=channel_layouts=stereo,volume={:.2}[a_nonrem]",
            plan.gain_nonrem
        ),
        format!(
            "[1:a]aformat=channel_layouts=stereo,volume={:.2}[a_rem]",
            plan.gain_rem
        ),
        "[a_nonrem][a_rem]amix=inputs=2:duration=longest:normalize=0[a_mixed]".to_string(),
    ];

    let Some(pan) = &plan.pan else {
        return (graph, "a_mixed");
    };
    let secs = pan.sweep_secs;
    graph.push(format!(
        "[a_mixed]aeval=val(0)*cos(min(t\\,{secs})/{secs}*PI/2)|val(1)*sin(min(t\\,{secs})/{secs}*PI/2):c=stereo[a_panned]"
    ));
    (graph, "a_panned")
}

#[derive(Debug, Clone)]
pub struct FfmpegGateway {
    binary: PathBuf,
}

impl FfmpegGateway {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    /// Arguments for one render invocation.
    pub fn args(request: &RenderRequest) -> Vec<String> {
        let (graph, output) = filter_graph(&request.plan);
        vec![
            "-y".into(),
            "-hide_banner".into(),
            "-loglevel".into(),
            "error".into(),
            "-i".into(),
            request.source_nonrem.display().to_string(),
            "-i".into(),
            request.source_rem.display().to_string(),
            "-filter_complex".into(),
            graph.join(";"),
            "-map".into(),
            format!("[{output}]"),
            request.dest.display().to_string(),
        ]
    }
}

impl RenderGateway for FfmpegGateway {
    async fn render(&self, request: RenderRequest) -> Result<PathBuf, RenderError> {
        if let Some(parent) = request.dest.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let output = Command::new(&self.binary)
            .args(Self::args(&request))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let tail: String = stderr.lines().rev().take(3).collect::<Vec<_>>().join(" | ");
            return Err(RenderError::Failed(format!(
                "ffmpeg exited with {}: {tail}",
                output.status
            )));
        }
        tracing::debug!(dest = %request.dest.display(), "render finished");
        Ok(request.dest)
    }
}
