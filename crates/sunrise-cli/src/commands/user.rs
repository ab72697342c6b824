use clap::Subcommand;
use sunrise_core::Database;

use super::{print_json, CliResult};

#[derive(Subcommand)]
pub enum UserAction {
    /// Register a user
    Add {
        /// Email address, unique per user
        email: String,
    },
    /// Show a user and whether a telemetry account is linked
    Show {
        /// User ID
        id: i64,
    },
}

pub fn run(action: UserAction) -> CliResult {
    let db = Database::open()?;
    match action {
        UserAction::Add { email } => {
            let id = db.create_user(&email)?;
            println!("user created: {id}");
        }
        UserAction::Show { id } => {
            let user = db.find_user(id)?.ok_or_else(|| format!("user {id} not found"))?;
            print_json(&user)?;
        }
    }
    Ok(())
}
