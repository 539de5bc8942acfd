//! Fetch any TMDB endpoint through the app's client and print the JSON body.
//! Usage:
//!   cargo run --bin tmdb_raw -- /movie/550 append_to_response=videos
//!   cargo run --bin tmdb_raw -- /discover/movie with_genres=18 sort_by=vote_average.desc
//! Requires TMDB_API_KEY in the environment (.env supported).

use anyhow::{Context, Result};
use cinescope::config::Config;
use cinescope::tmdb::TmdbClient;
use dotenvy::dotenv;
use std::env;

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    cinescope::init_tracing();
    let args: Vec<String> = env::args().skip(1).collect();
    let Some((endpoint, rest)) = args.split_first() else {
        eprintln!("Usage: cargo run --bin tmdb_raw -- <endpoint> [key=value ...]");
        std::process::exit(1);
    };

    let params = rest
        .iter()
        .map(|pair| {
            pair.split_once('=')
                .map(|(k, v)| (k, Some(v.to_string())))
                .with_context(|| format!("parameter '{pair}' must look like key=value"))
        })
        .collect::<Result<Vec<_>>>()?;

    let config = Config::from_env()?;
    let client = TmdbClient::from_config(&config)?;
    let body = client.raw(endpoint, &params).await?;
    println!("{}", serde_json::to_string_pretty(&body)?);
    Ok(())
}
