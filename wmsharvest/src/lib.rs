//! wmsharvest - resumable WMS tile harvesting into MBTiles archives.
//!
//! The crate fetches every tile of a configured zoom span from an OGC WMS
//! endpoint and stores it in a single SQLite file using the MBTiles layout.
//! Runs are idempotent: tiles already in the archive are never fetched again,
//! so an interrupted run continues where it left off.
//!
//! - [`coord`]: tile math and bounds tiers
//! - [`wms`]: GetMap request building
//! - [`fetch`]: HTTP fetching with backoff
//! - [`store`]: the MBTiles archive
//! - [`harvest`]: orchestration of a run
//! - [`config`]: optional INI configuration file
//! - [`logging`]: tracing subscriber setup

pub mod config;
pub mod coord;
pub mod fetch;
pub mod harvest;
pub mod logging;
pub mod store;
pub mod wms;

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
