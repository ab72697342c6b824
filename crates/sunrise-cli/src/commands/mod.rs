pub mod alarm;
pub mod auth;
pub mod check;
pub mod config;
pub mod sleep;
pub mod user;

use serde::Serialize;
use sunrise_core::Config;

pub type CliResult = Result<(), Box<dyn std::error::Error>>;

/// Load the config and check it is usable for commands that call the provider.
pub(crate) fn provider_config() -> Result<Config, Box<dyn std::error::Error>> {
    let config = Config::load()?;
    config.validate(true)?;
    Ok(config)
}

pub(crate) fn runtime() -> std::io::Result<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_multi_thread().enable_all().build()
}

pub(crate) fn print_json<T: Serialize>(value: &T) -> CliResult {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
