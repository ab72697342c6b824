use clap::Subcommand;
use sunrise_core::Config;

use super::CliResult;

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Print the effective configuration
    Show,
    /// Print the config file location
    Path,
    /// Write a default config file, replacing any existing one
    Init,
    /// Get a config value
    Get {
        /// Config key (e.g. "engine.pan_enabled", "provider.client_id")
        key: String,
    },
    /// Set a config value
    Set {
        /// Config key
        key: String,
        /// New value
        value: String,
    },
}

pub fn run(action: ConfigAction) -> CliResult {
    match action {
        ConfigAction::Show => {
            let config = Config::load()?;
            print!("{}", toml::to_string_pretty(&config)?);
        }
        ConfigAction::Path => {
            println!("{}", Config::path()?.display());
        }
        ConfigAction::Init => {
            Config::default().save()?;
            println!("wrote {}", Config::path()?.display());
        }
        ConfigAction::Get { key } => {
            let config = Config::load()?;
            let value = config.get(&key).ok_or_else(|| format!("unknown key: {key}"))?;
            println!("{value}");
        }
        ConfigAction::Set { key, value } => {
            let mut config = Config::load_file()?;
            config.set(&key, &value)?;
            config.validate(false)?;
            config.save()?;
            println!("ok");
        }
    }
    Ok(())
}
