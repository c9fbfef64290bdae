//! Configuration file loading.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::client::DRIVE_API_BASE;
use crate::error::{DriveError, Result};

/// Runtime configuration, read from TOML and overridden by CLI flags.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Root directory downloads are written under.
    pub download_dir: PathBuf,

    /// OAuth client secrets or service account key.
    pub credentials_file: PathBuf,

    /// Where OAuth tokens are cached between runs.
    pub token_file: PathBuf,

    /// Drive API root.
    pub api_base_url: String,

    /// Whether to draw per-file progress bars.
    pub show_progress: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            download_dir: PathBuf::from("downloads"),
            credentials_file: PathBuf::from("credentials.json"),
            token_file: PathBuf::from("token.json"),
            api_base_url: DRIVE_API_BASE.to_string(),
            show_progress: true,
        }
    }
}

impl Config {
    /// Load configuration from a TOML file. Missing keys take defaults.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            DriveError::ConfigError(format!("cannot read {}: {}", path.display(), e))
        })?;
        let config: Config = toml::from_str(&content)?;

        if config.api_base_url.trim().is_empty() {
            return Err(DriveError::ConfigError(
                "api_base_url must not be empty".to_string(),
            ));
        }
        Ok(config)
    }
}
