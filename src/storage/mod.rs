//! Storage Layer
//!
//! Locates the per-user directory holding `config.toml`.

use anyhow::Result;
use std::path::PathBuf;

/// Get the configuration directory
pub fn get_config_dir() -> Result<PathBuf> {
    let proj_dirs = directories::ProjectDirs::from("com", "pfeile", "Pfeile")
        .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?;

    let config_dir = proj_dirs.config_dir().to_path_buf();
    std::fs::create_dir_all(&config_dir)?;

    Ok(config_dir)
}

/// Path of the configuration file inside [`get_config_dir`]
pub fn config_path() -> Result<PathBuf> {
    Ok(get_config_dir()?.join("config.toml"))
}
