//! Harvest orchestration.
//!
//! A run walks the configured zoom levels in ascending order. For each level
//! it computes the covering [`TileRange`], partitions the range into tiles the
//! archive already holds and tiles still missing, then fetches the missing
//! ones with bounded concurrency:
//!
//! ```text
//! pending tiles ──► producer task ──► buffer_unordered(concurrency) ──► mpsc ──► run loop ──► TileStore
//!                   (stops on cancel)    (TileFetcher::fetch)                    (sole writer)
//! ```
//!
//! The run loop is the channel's only consumer and the only code touching the
//! store, so writes are serialized without locks. Failed tiles are counted and
//! left missing; a later run picks them up again.

mod config;
mod progress;
mod report;

pub use config::{
    HarvestConfig, DEFAULT_COMMIT_EVERY, DEFAULT_CONCURRENCY, DEFAULT_MAX_ZOOM, DEFAULT_MIN_ZOOM,
    DEFAULT_QUEUE_CAPACITY,
};
pub use progress::{HarvestProgress, NoopProgress, TileResolution};
pub use report::{RunSummary, ZoomReport};

use std::sync::Arc;

use futures::stream::{self, StreamExt};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::coord::{TileCoord, TileRange};
use crate::fetch::{AsyncHttpClient, FetchOutcome, TileFetcher};
use crate::store::{PutOutcome, StoreError, TileStore};

/// Errors that abort a harvest run.
///
/// Individual tile failures are never errors; they are counted in the
/// [`ZoomReport`].
#[derive(Debug, Error)]
pub enum HarvestError {
    /// Invalid settings, detected before any work starts.
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// The archive could not be read or written.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// The fetch task died.
    #[error("Fetch worker failed: {0}")]
    Worker(String),
}

/// Computes what a run would do without fetching anything.
///
/// Returns one report per zoom level with `existing` and `pending` filled in.
pub fn plan(config: &HarvestConfig, store: &TileStore) -> Result<Vec<ZoomReport>, HarvestError> {
    config.validate().map_err(HarvestError::Config)?;

    let mut reports = Vec::new();
    for zoom in config.zooms() {
        let (report, _) = partition(config, store, zoom)?;
        reports.push(report);
    }
    Ok(reports)
}

/// Splits a zoom level's range into archived and missing tiles.
fn partition(
    config: &HarvestConfig,
    store: &TileStore,
    zoom: u8,
) -> Result<(ZoomReport, Vec<TileCoord>), StoreError> {
    let tier = config.tiers.tier_for(zoom);
    let range = TileRange::covering(&config.tiers.bounds(tier), zoom);
    let mut report = ZoomReport::new(zoom, tier, range);

    let mut pending = Vec::new();
    for tile in range.tiles() {
        if store.contains(&tile)? {
            report.existing += 1;
        } else {
            pending.push(tile);
        }
    }
    report.pending = pending.len() as u64;

    Ok((report, pending))
}

/// Drives a harvest run against one archive.
pub struct Harvester<C: AsyncHttpClient + 'static> {
    fetcher: Arc<TileFetcher<C>>,
    config: HarvestConfig,
}

impl<C: AsyncHttpClient + 'static> Harvester<C> {
    /// Creates a harvester, rejecting invalid settings up front.
    pub fn new(fetcher: TileFetcher<C>, config: HarvestConfig) -> Result<Self, HarvestError> {
        config.validate().map_err(HarvestError::Config)?;
        fetcher
            .wms()
            .validate()
            .map_err(|e| HarvestError::Config(e.to_string()))?;

        Ok(Self {
            fetcher: Arc::new(fetcher),
            config,
        })
    }

    pub fn config(&self) -> &HarvestConfig {
        &self.config
    }

    pub fn fetcher(&self) -> &TileFetcher<C> {
        &self.fetcher
    }

    /// Dry run over `store`. See [`plan`].
    pub fn plan(&self, store: &TileStore) -> Result<Vec<ZoomReport>, HarvestError> {
        plan(&self.config, store)
    }

    /// Runs the harvest over every configured zoom level, lowest first.
    ///
    /// Cancelling `cancel` stops dispatch of new tiles. Fetches already in
    /// flight finish and are stored before the final commit.
    ///
    /// # Arguments
    ///
    /// * `store` - Archive to skip existing tiles from and write new ones to
    /// * `progress` - Receives per-zoom and per-tile events
    /// * `cancel` - Stops the run early when cancelled
    ///
    /// # Returns
    ///
    /// Per-zoom counts, marked interrupted if `cancel` fired. Failed tiles are
    /// counted, not raised; only archive and task errors return `Err`.
    pub async fn run(
        &self,
        store: &mut TileStore,
        progress: &mut dyn HarvestProgress,
        cancel: &CancellationToken,
    ) -> Result<RunSummary, HarvestError> {
        let mut summary = RunSummary::default();

        info!(
            min_zoom = self.config.min_zoom,
            max_zoom = self.config.max_zoom,
            concurrency = self.config.concurrency,
            resumed = store.is_resumed(),
            "Starting harvest"
        );

        for zoom in self.config.zooms() {
            if cancel.is_cancelled() {
                break;
            }

            let (mut report, pending) = partition(&self.config, store, zoom)?;
            info!(
                zoom,
                tier = %report.tier,
                range = %report.range,
                total = report.total(),
                existing = report.existing,
                pending = report.pending,
                "Processing zoom level"
            );
            progress.zoom_started(zoom, report.tier, report.total(), report.pending);

            if !pending.is_empty() {
                self.harvest_tiles(store, pending, &mut report, progress, cancel)
                    .await?;
            }
            store.commit()?;

            info!(
                zoom,
                downloaded = report.downloaded,
                failed = report.failed,
                duplicates = report.duplicates,
                "Finished zoom level"
            );
            progress.zoom_finished(&report);
            summary.record(report);
        }

        store.commit()?;

        let incomplete_levels = summary.zooms.len() < self.config.zooms().count();
        let skipped_tiles = summary.zooms.iter().any(|z| z.skipped() > 0);
        summary.interrupted = cancel.is_cancelled() && (incomplete_levels || skipped_tiles);

        if summary.interrupted {
            warn!(%summary, "Harvest interrupted");
        } else {
            info!(%summary, "Harvest complete");
        }

        Ok(summary)
    }

    /// Fetches `tiles` concurrently and stores the results.
    pub(crate) async fn harvest_tiles(
        &self,
        store: &mut TileStore,
        tiles: Vec<TileCoord>,
        report: &mut ZoomReport,
        progress: &mut dyn HarvestProgress,
        cancel: &CancellationToken,
    ) -> Result<(), HarvestError> {
        let (tx, mut rx) = mpsc::channel(self.config.queue_capacity);
        let fetcher = Arc::clone(&self.fetcher);
        let concurrency = self.config.concurrency;
        let stop = cancel.clone();

        let producer = tokio::spawn(async move {
            let results = stream::iter(tiles)
                .take_until(stop.cancelled_owned())
                .map(|tile| {
                    let fetcher = Arc::clone(&fetcher);
                    async move {
                        let outcome = fetcher.fetch(tile).await;
                        (tile, outcome)
                    }
                })
                .buffer_unordered(concurrency);
            let mut results = std::pin::pin!(results);

            while let Some(result) = results.next().await {
                if tx.send(result).await.is_err() {
                    // Consumer gone, nothing left to deliver to.
                    break;
                }
            }
        });

        while let Some((tile, outcome)) = rx.recv().await {
            if let Err(e) = self.resolve(store, tile, outcome, report, progress) {
                producer.abort();
                return Err(e);
            }
        }

        producer
            .await
            .map_err(|e| HarvestError::Worker(e.to_string()))
    }

    /// Applies one fetch result to the store and the report.
    fn resolve(
        &self,
        store: &mut TileStore,
        tile: TileCoord,
        outcome: FetchOutcome,
        report: &mut ZoomReport,
        progress: &mut dyn HarvestProgress,
    ) -> Result<(), HarvestError> {
        let resolution = match outcome {
            FetchOutcome::Success(payload) => match store.put_tile(&tile, &payload)? {
                PutOutcome::Inserted => {
                    debug!(%tile, bytes = payload.len(), "Stored tile");
                    report.downloaded += 1;
                    TileResolution::Stored
                }
                PutOutcome::Duplicate => {
                    report.duplicates += 1;
                    TileResolution::Duplicate
                }
            },
            other => {
                debug!(%tile, outcome = %other, "Tile left missing");
                report.failed += 1;
                TileResolution::Failed
            }
        };

        if store.pending() >= self.config.commit_every {
            store.commit()?;
        }

        progress.tile_resolved(tile, resolution);
        Ok(())
    }
}
