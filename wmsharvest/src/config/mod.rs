//! Optional INI configuration file.
//!
//! Default location is `~/.wmsharvest/config.ini`:
//!
//! ```ini
//! [wms]
//! endpoint = https://maps.nationalmap.co.nz/wms
//! layer = NationalMap:NationalMap Emergency Management
//! auth_key = your-key
//!
//! [download]
//! concurrency = 3
//! max_attempts = 5
//! timeout = 30
//! commit_every = 10
//!
//! [output]
//! path = ~/maps/nz_nationalmap_emergency.mbtiles
//! ```
//!
//! Every key is optional. Values left unset here fall back to the built-in
//! defaults; command-line flags override both.

mod parser;

use std::path::{Path, PathBuf};
use std::time::Duration;

use ini::Ini;
use thiserror::Error;

/// Errors from loading the configuration file.
#[derive(Debug, Error)]
pub enum ConfigFileError {
    /// Failed to read or parse the file
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] ini::Error),

    /// A key holds a value that cannot be used
    #[error("Invalid configuration: {section}.{key} = '{value}' - {reason}")]
    InvalidValue {
        section: String,
        key: String,
        value: String,
        reason: String,
    },
}

/// `[wms]` section.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WmsSection {
    pub endpoint: Option<String>,
    pub layer: Option<String>,
    pub auth_key: Option<String>,
}

/// `[download]` section.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DownloadSection {
    pub concurrency: Option<usize>,
    pub max_attempts: Option<u32>,
    pub timeout: Option<Duration>,
    pub commit_every: Option<usize>,
}

/// `[output]` section.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OutputSection {
    pub path: Option<PathBuf>,
}

/// Values read from the configuration file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfigFile {
    pub wms: WmsSection,
    pub download: DownloadSection,
    pub output: OutputSection,
}

impl ConfigFile {
    /// Loads the file at the default path, or defaults if it is absent.
    pub fn load() -> Result<Self, ConfigFileError> {
        Self::load_from(&config_file_path())
    }

    /// Loads a specific file, or defaults if it does not exist.
    pub fn load_from(path: &Path) -> Result<Self, ConfigFileError> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let ini = Ini::load_from_file(path)?;
        parser::parse_ini(&ini)
    }

    /// Parses configuration from INI text.
    pub fn parse(text: &str) -> Result<Self, ConfigFileError> {
        let ini = Ini::load_from_str(text).map_err(ini::Error::Parse)?;
        parser::parse_ini(&ini)
    }
}

/// Directory holding the configuration file (`~/.wmsharvest`).
pub fn config_directory() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".wmsharvest")
}

/// Default configuration file path (`~/.wmsharvest/config.ini`).
pub fn config_file_path() -> PathBuf {
    config_directory().join("config.ini")
}
