//! Resolves settings and drives a harvest run.
//!
//! Every setting is taken from the command line first, then the config file,
//! then the built-in default.

use std::path::{Path, PathBuf};
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::info;

use wmsharvest::config::{config_file_path, ConfigFile};
use wmsharvest::fetch::{FetchConfig, TileFetcher};
use wmsharvest::harvest::{plan, HarvestConfig, Harvester};
use wmsharvest::store::{ArchiveMetadata, TileStore};
use wmsharvest::wms::{Credential, WmsConfig};

use crate::args::{Args, DEFAULT_OUTPUT};
use crate::error::CliError;
use crate::progress::BarProgress;

/// Fully resolved settings for one invocation.
#[derive(Debug)]
pub struct Settings {
    pub credential: Option<Credential>,
    pub wms: WmsConfig,
    pub fetch: FetchConfig,
    pub harvest: HarvestConfig,
    pub output: PathBuf,
    pub dry_run: bool,
}

/// Merges command-line arguments with the config file.
pub fn resolve(args: &Args, file: &ConfigFile) -> Result<Settings, CliError> {
    let credential = args
        .auth_key
        .clone()
        .or_else(|| file.wms.auth_key.clone())
        .filter(|k| !k.trim().is_empty())
        .map(Credential::new);
    if credential.is_none() && !args.dry_run {
        return Err(CliError::MissingAuthKey);
    }

    let mut wms = WmsConfig::new();
    if let Some(endpoint) = &file.wms.endpoint {
        wms = wms.with_endpoint(endpoint.clone());
    }
    if let Some(layer) = &file.wms.layer {
        wms = wms.with_layer(layer.clone());
    }
    wms.validate().map_err(|e| CliError::Config(e.to_string()))?;

    let mut fetch = FetchConfig::new();
    if let Some(timeout) = args
        .timeout
        .map(Duration::from_secs)
        .or(file.download.timeout)
    {
        fetch = fetch.with_timeout(timeout);
    }
    if let Some(max_attempts) = args.max_attempts.or(file.download.max_attempts) {
        fetch = fetch.with_max_attempts(max_attempts);
    }

    let mut harvest = HarvestConfig::new().with_zoom_range(args.min_zoom, args.max_zoom);
    if let Some(concurrency) = args
        .concurrency
        .map(|c| c as usize)
        .or(file.download.concurrency)
    {
        harvest = harvest.with_concurrency(concurrency);
    }
    if let Some(commit_every) = args
        .commit_every
        .map(|c| c as usize)
        .or(file.download.commit_every)
    {
        harvest = harvest.with_commit_every(commit_every);
    }
    harvest.validate().map_err(CliError::Config)?;

    let output = args
        .output
        .clone()
        .or_else(|| file.output.path.clone())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT));

    Ok(Settings {
        credential,
        wms,
        fetch,
        harvest,
        output,
        dry_run: args.dry_run,
    })
}

/// Loads the config file named on the command line, or the default one.
fn load_config(args: &Args) -> Result<ConfigFile, CliError> {
    match &args.config {
        Some(path) if !path.exists() => Err(CliError::Config(format!(
            "config file '{}' does not exist",
            path.display()
        ))),
        Some(path) => Ok(ConfigFile::load_from(path)?),
        None => Ok(ConfigFile::load_from(&config_file_path())?),
    }
}

fn open_archive(path: &Path, harvest: &HarvestConfig) -> Result<TileStore, CliError> {
    let metadata = ArchiveMetadata::for_run(harvest.min_zoom, harvest.max_zoom, &harvest.tiers);
    TileStore::open(path, &metadata).map_err(|error| CliError::Archive {
        path: path.display().to_string(),
        error,
    })
}

/// Runs the command.
pub fn run(args: Args) -> Result<(), CliError> {
    let _logging = wmsharvest::logging::init_logging(args.log_file.as_deref())
        .map_err(|e| CliError::LoggingInit(e.to_string()))?;

    let file = load_config(&args)?;
    let settings = resolve(&args, &file)?;

    info!(version = wmsharvest::VERSION, output = %settings.output.display(), "wmsharvest");

    if settings.dry_run {
        return dry_run(&settings);
    }

    let credential = settings.credential.clone().ok_or(CliError::MissingAuthKey)?;

    if settings.output.exists() {
        println!("Resuming existing download");
    } else {
        println!("Starting new download");
    }
    let mut store = open_archive(&settings.output, &settings.harvest)?;

    let client = settings
        .fetch
        .build_client()
        .map_err(|e| CliError::Config(format!("Failed to create HTTP client: {}", e)))?;
    let fetcher = TileFetcher::new(
        client,
        settings.wms.clone(),
        credential,
        settings.fetch.backoff().clone(),
    );
    let harvester = Harvester::new(fetcher, settings.harvest.clone())?;

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    ctrlc::set_handler(move || {
        eprintln!();
        eprintln!("Received interrupt, finishing tiles in flight...");
        on_signal.cancel();
    })
    .map_err(|e| CliError::Config(format!("Failed to set signal handler: {}", e)))?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| CliError::Config(format!("Failed to start async runtime: {}", e)))?;

    let mut progress = BarProgress::new();
    let summary = runtime.block_on(harvester.run(&mut store, &mut progress, &cancel))?;

    store.close().map_err(|error| CliError::Archive {
        path: settings.output.display().to_string(),
        error,
    })?;

    println!();
    println!("{}", summary);
    if summary.interrupted {
        println!("Run the same command again to resume.");
    } else if summary.failed > 0 {
        println!(
            "{} tiles failed; run the same command again to retry them.",
            summary.failed
        );
    }

    Ok(())
}

/// Prints the per-zoom plan without fetching.
fn dry_run(settings: &Settings) -> Result<(), CliError> {
    let store = if settings.output.exists() {
        open_archive(&settings.output, &settings.harvest)?
    } else {
        TileStore::open_in_memory(&ArchiveMetadata::default()).map_err(|error| {
            CliError::Archive {
                path: ":memory:".to_string(),
                error,
            }
        })?
    };

    let reports = plan(&settings.harvest, &store)?;

    println!("Dry run for {}", settings.output.display());
    let mut pending = 0;
    for report in &reports {
        println!(
            "  zoom {:>2} ({}): {} tiles, {} present, {} to fetch",
            report.zoom,
            report.tier,
            report.total(),
            report.existing,
            report.pending
        );
        pending += report.pending;
    }
    println!("{} tiles to fetch", pending);

    Ok(())
}
