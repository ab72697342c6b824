use chrono::Utc;
use clap::Subcommand;
use sunrise_core::{AuthorizationFlow, Database, EngineStore, OAuthClient};

use super::{provider_config, runtime, CliResult};

#[derive(Subcommand)]
pub enum AuthAction {
    /// Print the provider authorization URL for a user
    Url {
        /// User ID
        user: i64,
        /// Open the URL in the default browser
        #[arg(long)]
        open: bool,
    },
    /// Finish linking with the state and code from the callback URL
    Complete {
        #[arg(long)]
        state: String,
        #[arg(long)]
        code: String,
    },
    /// Check whether a user has a linked account
    Status {
        /// User ID
        user: i64,
    },
    /// Remove the stored tokens for a user
    Unlink {
        /// User ID
        user: i64,
    },
}

pub fn run(action: AuthAction) -> CliResult {
    match action {
        AuthAction::Url { user, open } => {
            let config = provider_config()?;
            let db = Database::open()?;
            db.find_user(user)?.ok_or_else(|| format!("user {user} not found"))?;
            let oauth = OAuthClient::new(config.provider);
            let flow = AuthorizationFlow::new(&db, &oauth, config.engine.authorization_ttl_minutes);
            let request = flow.begin(user, Utc::now())?;
            println!("{}", request.url);
            if open {
                if let Err(e) = open::that(request.url.as_str()) {
                    eprintln!("could not open browser: {e}");
                }
            }
        }
        AuthAction::Complete { state, code } => {
            let config = provider_config()?;
            let db = Database::open()?;
            let oauth = OAuthClient::new(config.provider);
            let flow = AuthorizationFlow::new(&db, &oauth, config.engine.authorization_ttl_minutes);
            let (user, credential) =
                runtime()?.block_on(flow.complete(&state, &code, Utc::now()))?;
            println!("user {user} linked to {}", credential.subject_id);
        }
        AuthAction::Status { user } => {
            let db = Database::open()?;
            match db.linked_subject(user)? {
                Some(subject) => println!("linked ({subject})"),
                None => println!("not linked"),
            }
        }
        AuthAction::Unlink { user } => {
            let db = Database::open()?;
            db.clear_credential(user)?;
            println!("user {user} unlinked");
        }
    }
    Ok(())
}
