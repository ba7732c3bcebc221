//! Common paths for Roost data storage
//!
//! All Roost data is stored under ~/.config/roost/ on all platforms:
//! - config.toml - User configuration
//! - credentials.enc - Encrypted account settings

use std::fs;
use std::path::PathBuf;

use crate::error::{Error, Result};

/// Get the Roost data directory (~/.config/roost/), creating it if needed
pub fn roost_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| Error::Storage("Could not determine home directory".to_string()))?;
    let dir = home.join(".config").join("roost");
    fs::create_dir_all(&dir)?;
    Ok(dir)
}

/// Get the config file path (~/.config/roost/config.toml)
pub fn config_path() -> Result<PathBuf> {
    Ok(roost_dir()?.join("config.toml"))
}

/// Get the credentials file path (~/.config/roost/credentials.enc)
pub fn credentials_path() -> Result<PathBuf> {
    Ok(roost_dir()?.join("credentials.enc"))
}
