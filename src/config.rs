use anyhow::{Context, Result};
use std::env;
use std::path::PathBuf;

use crate::tmdb::TMDB_BASE;

const STORAGE_FILE: &str = "storage.json";

#[derive(Debug, Clone)]
pub struct Config {
    pub tmdb_api_key: Option<String>,
    pub tmdb_base_url: String,
    pub data_dir: PathBuf,
}

impl Config {
    /// Reads `TMDB_API_KEY`, `TMDB_BASE_URL` and `CINESCOPE_DATA_DIR`.
    pub fn from_env() -> Result<Self> {
        let tmdb_api_key = non_empty_var("TMDB_API_KEY");
        let tmdb_base_url = non_empty_var("TMDB_BASE_URL").unwrap_or_else(|| TMDB_BASE.to_string());
        let data_dir = match non_empty_var("CINESCOPE_DATA_DIR") {
            Some(dir) => PathBuf::from(dir),
            None => default_data_dir().context("Could not determine a data directory")?,
        };
        Ok(Self {
            tmdb_api_key,
            tmdb_base_url,
            data_dir,
        })
    }

    pub fn with_data_dir(mut self, dir: Option<PathBuf>) -> Self {
        if let Some(dir) = dir {
            self.data_dir = dir;
        }
        self
    }

    pub fn require_api_key(&self) -> Result<&str> {
        self.tmdb_api_key
            .as_deref()
            .ok_or_else(|| anyhow::anyhow!("Missing required environment variable: TMDB_API_KEY"))
    }

    pub fn storage_path(&self) -> PathBuf {
        self.data_dir.join(STORAGE_FILE)
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// `<platform data dir>/cinescope`, e.g. `~/.local/share/cinescope` on Linux.
pub fn default_data_dir() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|d| d.data_dir().join("cinescope"))
}
