//! CLI error handling with user-friendly messages.

use std::fmt;
use std::process;

use wmsharvest::config::ConfigFileError;
use wmsharvest::harvest::HarvestError;
use wmsharvest::store::StoreError;

/// CLI-specific errors.
#[derive(Debug)]
pub enum CliError {
    /// Failed to initialize logging
    LoggingInit(String),
    /// Invalid settings
    Config(String),
    /// No auth key from any source
    MissingAuthKey,
    /// Failed to read the config file
    ConfigFile(ConfigFileError),
    /// Failed to open the archive
    Archive { path: String, error: StoreError },
    /// The harvest run aborted
    Harvest(HarvestError),
}

impl CliError {
    /// Exit the process with an error message and status 1.
    pub fn exit(&self) -> ! {
        eprintln!("Error: {}", self);

        match self {
            CliError::MissingAuthKey => {
                eprintln!();
                eprintln!("Provide the key with --auth-key, the WMSHARVEST_AUTH_KEY");
                eprintln!("environment variable, or auth_key under [wms] in the config file.");
            }
            CliError::Archive {
                error: StoreError::IncompatibleSchema(_),
                ..
            } => {
                eprintln!();
                eprintln!("The output file exists but is not an MBTiles archive written by");
                eprintln!("this tool. Choose another --output path or move the file away.");
            }
            _ => {}
        }

        process::exit(1)
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::LoggingInit(msg) => write!(f, "Failed to initialize logging: {}", msg),
            CliError::Config(msg) => write!(f, "Configuration error: {}", msg),
            CliError::MissingAuthKey => write!(f, "Configuration error: no WMS auth key given"),
            CliError::ConfigFile(e) => write!(f, "{}", e),
            CliError::Archive { path, error } => {
                write!(f, "Failed to open archive '{}': {}", path, error)
            }
            CliError::Harvest(e) => write!(f, "Harvest failed: {}", e),
        }
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CliError::ConfigFile(e) => Some(e),
            CliError::Archive { error, .. } => Some(error),
            CliError::Harvest(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ConfigFileError> for CliError {
    fn from(e: ConfigFileError) -> Self {
        CliError::ConfigFile(e)
    }
}

impl From<HarvestError> for CliError {
    fn from(e: HarvestError) -> Self {
        match e {
            HarvestError::Config(msg) => CliError::Config(msg),
            other => CliError::Harvest(other),
        }
    }
}
