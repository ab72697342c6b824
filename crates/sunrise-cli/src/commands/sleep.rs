use std::sync::Arc;

use chrono::{NaiveDate, NaiveTime, Utc};
use clap::Subcommand;
use serde::Serialize;
use sunrise_core::sleep::{
    average_sleep_minutes, estimate_cycle_minutes, recommend_wake_times, WakeRecommendation,
};
use sunrise_core::storage::SleepRecord;
use sunrise_core::{Database, EngineStore, FitbitClient};

use super::{print_json, provider_config, runtime, CliResult};

#[derive(Subcommand)]
pub enum SleepAction {
    /// Fetch a night's sleep log from the provider and store its summary
    Sync {
        /// User ID
        user: i64,
        /// Date of sleep (YYYY-MM-DD), defaults to today in the configured zone
        #[arg(long)]
        date: Option<NaiveDate>,
    },
    /// Show stored sleep summaries
    Recent {
        /// User ID
        user: i64,
        /// Number of nights
        #[arg(long, default_value_t = 7)]
        days: u32,
    },
    /// Recommend wake times for a bedtime
    Recommend {
        /// User ID
        user: i64,
        /// Bedtime as HH:MM
        bedtime: NaiveTime,
        /// Skip the provider and use the default cycle length
        #[arg(long)]
        offline: bool,
    },
}

#[derive(Serialize)]
struct RecentSleep {
    records: Vec<SleepRecord>,
    average_minutes: Option<f64>,
}

#[derive(Serialize)]
struct Recommendation {
    cycle_minutes: Option<u32>,
    wake_times: Vec<WakeRecommendation>,
}

pub fn run(action: SleepAction) -> CliResult {
    match action {
        SleepAction::Sync { user, date } => {
            let config = provider_config()?;
            let offset = config.engine.utc_offset()?;
            let date = date.unwrap_or_else(|| Utc::now().with_timezone(&offset).date_naive());
            let db = Arc::new(Database::open()?);
            let client = FitbitClient::new(
                db.clone(),
                &config.provider,
                config.engine.heart_rate_window_minutes,
            );
            match runtime()?.block_on(client.sleep_log(user, date))? {
                Some(log) => {
                    let inserted = db.save_sleep_record(user, &log.to_record())?;
                    print_json(&log.to_record())?;
                    if !inserted {
                        eprintln!("a record for {date} was already stored; kept the existing one");
                    }
                }
                None => println!("no sleep logged for {date}"),
            }
        }
        SleepAction::Recent { user, days } => {
            let db = Database::open()?;
            let records = db.recent_sleep_records(user, days)?;
            let average_minutes = average_sleep_minutes(&records);
            print_json(&RecentSleep {
                records,
                average_minutes,
            })?;
        }
        SleepAction::Recommend {
            user,
            bedtime,
            offline,
        } => {
            let config = provider_config()?;
            let offset = config.engine.utc_offset()?;
            let now = Utc::now().with_timezone(&offset).naive_local();
            let db = Arc::new(Database::open()?);

            let mut cycle_minutes = None;
            if !offline && db.linked_subject(user)?.is_some() {
                let client = FitbitClient::new(
                    db.clone(),
                    &config.provider,
                    config.engine.heart_rate_window_minutes,
                );
                match runtime()?.block_on(client.sleep_log(user, now.date())) {
                    Ok(log) => cycle_minutes = log.and_then(|l| estimate_cycle_minutes(&l.stages)),
                    Err(e) => tracing::warn!(user_id = user, error = %e, "using default cycle length"),
                }
            }
            print_json(&Recommendation {
                cycle_minutes,
                wake_times: recommend_wake_times(bedtime, now, cycle_minutes),
            })?;
        }
    }
    Ok(())
}
