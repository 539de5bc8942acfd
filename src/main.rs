use anyhow::Result;
use clap::Parser;
use cinescope::cli::{self, Cli};
use cinescope::config::Config;
use dotenvy::dotenv;
use tracing::debug;

#[tokio::main]
async fn main() -> Result<()> {
    let dotenv_result = dotenv();
    cinescope::init_tracing();
    match dotenv_result {
        Ok(path) => debug!("Loaded environment from {:?}", path),
        Err(e) => debug!("No .env file loaded ({}) - relying on environment", e),
    }
    let cli = Cli::parse();
    let config = Config::from_env()?;
    cli::run(cli, config).await
}
