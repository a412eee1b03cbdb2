//! Harvest run configuration.

use std::ops::RangeInclusive;

use crate::coord::{BoundsTiers, MAX_ZOOM};

/// Default lowest zoom level harvested.
pub const DEFAULT_MIN_ZOOM: u8 = 0;

/// Default highest zoom level harvested.
pub const DEFAULT_MAX_ZOOM: u8 = 15;

/// Default number of concurrent tile fetches.
pub const DEFAULT_CONCURRENCY: usize = 3;

/// Default number of stored tiles between commits.
pub const DEFAULT_COMMIT_EVERY: usize = 10;

/// Default capacity of the fetch result channel.
pub const DEFAULT_QUEUE_CAPACITY: usize = 64;

/// Settings for one harvest run.
#[derive(Debug, Clone, PartialEq)]
pub struct HarvestConfig {
    /// Lowest zoom level, inclusive
    pub min_zoom: u8,
    /// Highest zoom level, inclusive
    pub max_zoom: u8,
    /// Which rectangle to cover at each zoom level
    pub tiers: BoundsTiers,
    /// Fetches in flight at once
    pub concurrency: usize,
    /// Stored tiles between commits
    pub commit_every: usize,
    /// Fetch results buffered between the workers and the store
    pub queue_capacity: usize,
}

impl Default for HarvestConfig {
    fn default() -> Self {
        Self {
            min_zoom: DEFAULT_MIN_ZOOM,
            max_zoom: DEFAULT_MAX_ZOOM,
            tiers: BoundsTiers::default(),
            concurrency: DEFAULT_CONCURRENCY,
            commit_every: DEFAULT_COMMIT_EVERY,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
        }
    }
}

impl HarvestConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the zoom span, both ends inclusive.
    pub fn with_zoom_range(mut self, min_zoom: u8, max_zoom: u8) -> Self {
        self.min_zoom = min_zoom;
        self.max_zoom = max_zoom;
        self
    }

    pub fn with_tiers(mut self, tiers: BoundsTiers) -> Self {
        self.tiers = tiers;
        self
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    pub fn with_commit_every(mut self, commit_every: usize) -> Self {
        self.commit_every = commit_every;
        self
    }

    pub fn with_queue_capacity(mut self, queue_capacity: usize) -> Self {
        self.queue_capacity = queue_capacity;
        self
    }

    /// Zoom levels in processing order.
    pub fn zooms(&self) -> RangeInclusive<u8> {
        self.min_zoom..=self.max_zoom
    }

    /// Checks the settings before any work starts.
    pub fn validate(&self) -> Result<(), String> {
        if self.min_zoom > self.max_zoom {
            return Err(format!(
                "min zoom {} is greater than max zoom {}",
                self.min_zoom, self.max_zoom
            ));
        }
        if self.max_zoom > MAX_ZOOM {
            return Err(format!(
                "max zoom {} exceeds the supported maximum of {}",
                self.max_zoom, MAX_ZOOM
            ));
        }
        if self.concurrency == 0 {
            return Err("concurrency must be at least 1".to_string());
        }
        if self.commit_every == 0 {
            return Err("commit interval must be at least 1".to_string());
        }
        if self.queue_capacity == 0 {
            return Err("queue capacity must be at least 1".to_string());
        }
        Ok(())
    }
}
