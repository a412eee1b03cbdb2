//! Progress reporting for harvest runs.
//!
//! The orchestrator calls into a [`HarvestProgress`] implementation from its
//! consumer loop, so callbacks are never invoked concurrently.

use super::report::ZoomReport;
use crate::coord::{BoundsTier, TileCoord};

/// How a tile was resolved during a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TileResolution {
    /// Fetched and written to the archive.
    Stored,
    /// Fetched, but another writer stored it first.
    Duplicate,
    /// The fetch did not succeed; the tile stays missing.
    Failed,
}

/// Observer for a harvest run.
pub trait HarvestProgress: Send {
    /// A zoom level is about to be processed. `pending` tiles need fetching
    /// out of `total` covered by the range.
    fn zoom_started(&mut self, zoom: u8, tier: BoundsTier, total: u64, pending: u64);

    /// One pending tile reached its final state.
    fn tile_resolved(&mut self, tile: TileCoord, resolution: TileResolution);

    /// A zoom level is done.
    fn zoom_finished(&mut self, report: &ZoomReport);
}

/// Progress sink that ignores every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopProgress;

impl HarvestProgress for NoopProgress {
    fn zoom_started(&mut self, _zoom: u8, _tier: BoundsTier, _total: u64, _pending: u64) {}

    fn tile_resolved(&mut self, _tile: TileCoord, _resolution: TileResolution) {}

    fn zoom_finished(&mut self, _report: &ZoomReport) {}
}
