//! Command-line arguments.

use std::path::PathBuf;

use clap::Parser;

/// Output archive used when neither the flag nor the config file names one.
pub const DEFAULT_OUTPUT: &str = "nz_nationalmap_emergency.mbtiles";

#[derive(Debug, Parser)]
#[command(name = "wmsharvest", version)]
#[command(
    about = "Harvest WMS map tiles into a resumable MBTiles archive",
    long_about = None
)]
pub struct Args {
    /// WMS auth key (falls back to [wms] auth_key in the config file)
    #[arg(long, env = "WMSHARVEST_AUTH_KEY", hide_env_values = true)]
    pub auth_key: Option<String>,

    /// Lowest zoom level to harvest
    #[arg(long, default_value_t = wmsharvest::harvest::DEFAULT_MIN_ZOOM)]
    pub min_zoom: u8,

    /// Highest zoom level to harvest
    #[arg(long, default_value_t = wmsharvest::harvest::DEFAULT_MAX_ZOOM)]
    pub max_zoom: u8,

    /// Archive to create or resume [default: nz_nationalmap_emergency.mbtiles]
    #[arg(long, short)]
    pub output: Option<PathBuf>,

    /// Concurrent tile requests [default: 3]
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
    pub concurrency: Option<u32>,

    /// Attempts per tile for rate limits and network errors [default: 5]
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
    pub max_attempts: Option<u32>,

    /// Tiles stored between commits [default: 10]
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
    pub commit_every: Option<u32>,

    /// Per-request timeout in seconds [default: 30]
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
    pub timeout: Option<u64>,

    /// Config file [default: ~/.wmsharvest/config.ini]
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Also write logs to this file
    #[arg(long)]
    pub log_file: Option<PathBuf>,

    /// Report what would be fetched without downloading anything
    #[arg(long)]
    pub dry_run: bool,
}
