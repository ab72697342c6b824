use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(name = "sunrise", version, about = "Sunrise adaptive alarm CLI")]
struct Cli {
    /// Log debug output from the engine
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// User accounts
    User {
        #[command(subcommand)]
        action: commands::user::UserAction,
    },
    /// Link or unlink the fitness provider account
    Auth {
        #[command(subcommand)]
        action: commands::auth::AuthAction,
    },
    /// Alarm management
    Alarm {
        #[command(subcommand)]
        action: commands::alarm::AlarmAction,
    },
    /// Evaluate a user's alarms once and render the sound if one is due
    Check(commands::check::CheckArgs),
    /// Sleep history and wake-time recommendations
    Sleep {
        #[command(subcommand)]
        action: commands::sleep::SleepAction,
    },
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: commands::config::ConfigAction,
    },
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "info,sunrise_core=debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result = match cli.command {
        Commands::User { action } => commands::user::run(action),
        Commands::Auth { action } => commands::auth::run(action),
        Commands::Alarm { action } => commands::alarm::run(action),
        Commands::Check(args) => commands::check::run(args),
        Commands::Sleep { action } => commands::sleep::run(action),
        Commands::Config { action } => commands::config::run(action),
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
