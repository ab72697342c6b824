use clap::Subcommand;
use sunrise_core::storage::NewAlarm;
use sunrise_core::Database;

use super::{print_json, CliResult};

#[derive(Subcommand)]
pub enum AlarmAction {
    /// Add an alarm
    Add {
        /// User ID
        user: i64,
        /// Time of day as HH:MM
        time: String,
        /// Sound played when the user is in deep (non-REM) sleep
        #[arg(long)]
        nonrem: String,
        /// Sound played when the user is in light or REM sleep
        #[arg(long)]
        rem: String,
    },
    /// List a user's alarms
    List {
        /// User ID
        user: i64,
    },
    /// Remove an alarm
    Remove {
        /// User ID
        user: i64,
        /// Alarm ID
        id: i64,
    },
    /// Enable or disable an alarm
    Toggle {
        /// User ID
        user: i64,
        /// Alarm ID
        id: i64,
        /// Turn the alarm off instead of on
        #[arg(long)]
        off: bool,
    },
}

fn parse_time(time: &str) -> Result<(u32, u32), String> {
    let (h, m) = time
        .split_once(':')
        .ok_or_else(|| format!("expected HH:MM, got '{time}'"))?;
    let hour = h.parse::<u32>().map_err(|_| format!("invalid hour '{h}'"))?;
    let minute = m.parse::<u32>().map_err(|_| format!("invalid minute '{m}'"))?;
    Ok((hour, minute))
}

pub fn run(action: AlarmAction) -> CliResult {
    let db = Database::open()?;
    match action {
        AlarmAction::Add {
            user,
            time,
            nonrem,
            rem,
        } => {
            let (hour, minute) = parse_time(&time)?;
            let alarm = db.add_alarm(
                user,
                &NewAlarm {
                    hour,
                    minute,
                    sound_nonrem: nonrem,
                    sound_rem: rem,
                },
            )?;
            print_json(&alarm)?;
        }
        AlarmAction::List { user } => {
            let alarms = db.list_alarms(user)?;
            print_json(&alarms)?;
        }
        AlarmAction::Remove { user, id } => {
            if !db.delete_alarm(user, id)? {
                return Err(format!("alarm {id} not found for user {user}").into());
            }
            println!("alarm {id} removed");
        }
        AlarmAction::Toggle { user, id, off } => {
            if !db.set_alarm_enabled(user, id, !off)? {
                return Err(format!("alarm {id} not found for user {user}").into());
            }
            println!("alarm {id} {}", if off { "disabled" } else { "enabled" });
        }
    }
    Ok(())
}
