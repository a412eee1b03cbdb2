//! Per-zoom and per-run accounting.

use std::fmt;

use crate::coord::{BoundsTier, TileRange};

/// What happened at one zoom level.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZoomReport {
    pub zoom: u8,
    pub tier: BoundsTier,
    pub range: TileRange,
    /// Tiles already in the archive before this run touched the level.
    pub existing: u64,
    /// Tiles that needed fetching.
    pub pending: u64,
    pub downloaded: u64,
    pub failed: u64,
    /// Fetched tiles that turned out to be stored already.
    pub duplicates: u64,
}

impl ZoomReport {
    pub fn new(zoom: u8, tier: BoundsTier, range: TileRange) -> Self {
        Self {
            zoom,
            tier,
            range,
            existing: 0,
            pending: 0,
            downloaded: 0,
            failed: 0,
            duplicates: 0,
        }
    }

    /// Total tiles covered at this zoom level.
    pub fn total(&self) -> u64 {
        self.range.len()
    }

    /// Pending tiles that were never attempted (run interrupted).
    pub fn skipped(&self) -> u64 {
        self.pending
            .saturating_sub(self.downloaded + self.failed + self.duplicates)
    }
}

impl fmt::Display for ZoomReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "zoom {:>2} ({}): {} tiles, {} existing, {} downloaded, {} failed",
            self.zoom,
            self.tier,
            self.total(),
            self.existing,
            self.downloaded,
            self.failed
        )?;
        if self.duplicates > 0 {
            write!(f, ", {} duplicates", self.duplicates)?;
        }
        Ok(())
    }
}

/// Totals for a whole run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub zooms: Vec<ZoomReport>,
    pub downloaded: u64,
    pub failed: u64,
    pub existing: u64,
    pub duplicates: u64,
    /// True if the run was cancelled before every zoom level finished.
    pub interrupted: bool,
}

impl RunSummary {
    /// Adds a finished zoom level to the totals.
    pub fn record(&mut self, report: ZoomReport) {
        self.downloaded += report.downloaded;
        self.failed += report.failed;
        self.existing += report.existing;
        self.duplicates += report.duplicates;
        self.zooms.push(report);
    }

    /// Tiles still missing from the covered ranges.
    pub fn missing(&self) -> u64 {
        self.zooms
            .iter()
            .map(|z| z.pending.saturating_sub(z.downloaded + z.duplicates))
            .sum()
    }

    pub fn is_complete(&self) -> bool {
        !self.interrupted && self.missing() == 0
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} zoom levels: {} downloaded, {} already present, {} failed",
            self.zooms.len(),
            self.downloaded,
            self.existing,
            self.failed
        )?;
        if self.duplicates > 0 {
            write!(f, ", {} duplicates", self.duplicates)?;
        }
        if self.interrupted {
            write!(f, " (interrupted)")?;
        }
        Ok(())
    }
}
