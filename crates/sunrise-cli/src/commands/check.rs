use std::sync::Arc;

use chrono::{DateTime, Utc};
use clap::Args;
use sunrise_core::alarm::{AlarmEngine, EngineOptions};
use sunrise_core::{Database, FfmpegGateway, FitbitClient};

use super::{print_json, provider_config, runtime, CliResult};

#[derive(Args)]
pub struct CheckArgs {
    /// User ID
    user: i64,
    /// Evaluate at this instant (RFC 3339) instead of now
    #[arg(long)]
    at: Option<DateTime<Utc>>,
}

pub fn run(args: CheckArgs) -> CliResult {
    let config = provider_config()?;
    let db = Arc::new(Database::open()?);
    let options = EngineOptions::from_settings(&config.engine)?;
    let telemetry = FitbitClient::new(
        db.clone(),
        &config.provider,
        config.engine.heart_rate_window_minutes,
    );
    let gateway = FfmpegGateway::new(&config.engine.ffmpeg_path);
    let engine = AlarmEngine::new(db, telemetry, gateway, options);

    let now = args.at.unwrap_or_else(Utc::now);
    let decision = runtime()?.block_on(engine.evaluate(args.user, now))?;
    if let Some(fired) = &decision.fired {
        if fired.reauthorization_required {
            eprintln!("telemetry access was revoked; run `sunrise auth url {}` to reconnect", args.user);
        }
    }
    print_json(&decision)
}
