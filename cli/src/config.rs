use anyhow::{Context, Result};
use directories::ProjectDirs;
use std::path::PathBuf;

/// Environment variable that points the journal at a specific database file.
pub const DB_ENV_VAR: &str = "FLARE_DB";

pub struct Config {
    pub db_path: PathBuf,
}

impl Config {
    pub fn load() -> Result<Self> {
        if let Some(path) = std::env::var_os(DB_ENV_VAR).filter(|v| !v.is_empty()) {
            let db_path = PathBuf::from(path);
            tracing::debug!(path = %db_path.display(), "database path from {DB_ENV_VAR}");
            return Ok(Config { db_path });
        }

        let proj_dirs =
            ProjectDirs::from("", "", "flare").context("Could not determine home directory")?;

        let data_dir = proj_dirs.data_dir().to_path_buf();
        std::fs::create_dir_all(&data_dir)
            .with_context(|| format!("Failed to create data directory: {}", data_dir.display()))?;

        let db_path = data_dir.join("flare.db");

        Ok(Config { db_path })
    }
}
