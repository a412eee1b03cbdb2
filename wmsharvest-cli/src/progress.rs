//! Terminal progress bars for harvest runs.

use indicatif::{ProgressBar, ProgressStyle};
use wmsharvest::coord::{BoundsTier, TileCoord};
use wmsharvest::harvest::{HarvestProgress, TileResolution, ZoomReport};

const BAR_TEMPLATE: &str =
    "{prefix:>8} [{elapsed_precise}] {bar:40.cyan/blue} {pos:>7}/{len:7} {msg}";

/// One progress bar per zoom level.
pub struct BarProgress {
    bar: Option<ProgressBar>,
    failed: u64,
}

impl BarProgress {
    pub fn new() -> Self {
        Self {
            bar: None,
            failed: 0,
        }
    }

    fn style() -> ProgressStyle {
        ProgressStyle::with_template(BAR_TEMPLATE)
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=> ")
    }
}

impl HarvestProgress for BarProgress {
    fn zoom_started(&mut self, zoom: u8, tier: BoundsTier, total: u64, pending: u64) {
        println!(
            "Zoom {}: {} tiles ({} bounds), {} to fetch",
            zoom, total, tier, pending
        );
        self.failed = 0;

        if pending > 0 {
            let bar = ProgressBar::new(pending)
                .with_style(Self::style())
                .with_prefix(format!("zoom {}", zoom));
            self.bar = Some(bar);
        }
    }

    fn tile_resolved(&mut self, _tile: TileCoord, resolution: TileResolution) {
        if resolution == TileResolution::Failed {
            self.failed += 1;
        }
        if let Some(bar) = &self.bar {
            if self.failed > 0 {
                bar.set_message(format!("{} failed", self.failed));
            }
            bar.inc(1);
        }
    }

    fn zoom_finished(&mut self, report: &ZoomReport) {
        if let Some(bar) = self.bar.take() {
            bar.finish_and_clear();
        }
        println!("  {}", report);
    }
}
