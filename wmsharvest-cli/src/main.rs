//! wmsharvest CLI - command-line interface
//!
//! Harvests tiles from a WMS endpoint into an MBTiles archive. Re-running the
//! same command resumes an interrupted or partially failed harvest.

mod args;
mod error;
mod progress;
mod run;

use clap::Parser;

fn main() {
    let args = args::Args::parse();

    if let Err(e) = run::run(args) {
        e.exit();
    }
}
