#![cfg(not(tarpaulin_include))]

use fpm::app;
use fpm::config::Config;

/// Main entry point for the web application
///
/// Reads the configuration from the environment (and `.env`), sets up
/// logging and serves the API and static files until stopped.
///
/// # Returns
/// * `Result<(), Box<dyn std::error::Error>>` - Success or error object
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = Config::from_env()?;
    app::run(config).await
}
