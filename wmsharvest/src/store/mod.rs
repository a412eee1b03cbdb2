//! Resumable MBTiles tile archive.
//!
//! A single SQLite file in the MBTiles layout holds every harvested tile. The
//! archive is keyed by `(zoom_level, tile_column, tile_row)` where `tile_row`
//! uses the TMS (bottom-origin) convention; callers always speak XYZ rows and
//! the conversion happens here, once, on both read and write.
//!
//! Writes are batched: the first [`TileStore::put`] after a commit opens a
//! transaction and [`TileStore::commit`] makes it durable, so a crash loses at
//! most the current batch.

mod metadata;
mod schema;

pub use metadata::ArchiveMetadata;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use rusqlite::{Connection, ErrorCode, OptionalExtension};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::coord::{tiles_per_axis, xyz_to_tms_row, TileCoord, MAX_ZOOM};

/// Errors from the tile archive.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Underlying SQLite failure.
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// An existing archive does not have the expected MBTiles layout.
    #[error("Incompatible archive schema: {0}")]
    IncompatibleSchema(String),

    /// Zoom above [`MAX_ZOOM`] or row outside the zoom level's grid.
    #[error("Tile out of range: zoom {zoom}, row {row}")]
    TileOutOfRange { zoom: u8, row: u32 },
}

/// Result of inserting one tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PutOutcome {
    Inserted,
    /// A record with the same key already exists; nothing was written.
    Duplicate,
}

/// Persisted tile archive. Single writer.
pub struct TileStore {
    conn: Connection,
    path: Option<PathBuf>,
    resumed: bool,
    pending: usize,
}

impl std::fmt::Debug for TileStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TileStore")
            .field("path", &self.path)
            .field("resumed", &self.resumed)
            .field("pending", &self.pending)
            .finish()
    }
}

impl TileStore {
    /// Opens an archive, creating it when the file does not exist.
    ///
    /// A new archive gets the schema and `metadata` written once. An existing
    /// archive is validated and resumed as-is; its metadata is never rewritten.
    /// A file holding neither MBTiles table (left behind by a crash before the
    /// schema was written) is initialized like a new archive.
    ///
    /// # Arguments
    ///
    /// * `path` - Archive file, created if missing
    /// * `metadata` - Rows written into a new archive's `metadata` table
    ///
    /// # Returns
    ///
    /// The open store, or [`StoreError::IncompatibleSchema`] when an existing
    /// archive has a different layout.
    pub fn open(path: impl AsRef<Path>, metadata: &ArchiveMetadata) -> Result<Self, StoreError> {
        let path = path.as_ref();
        let exists = path.exists();

        let conn = Connection::open(path)?;
        let mut store = Self {
            conn,
            path: Some(path.to_path_buf()),
            resumed: false,
            pending: 0,
        };

        if exists && (store.has_table("metadata")? || store.has_table("tiles")?) {
            info!(path = %path.display(), "Resuming existing archive");
            schema::validate_schema(&store.conn)?;
            store.resumed = true;
        } else {
            info!(path = %path.display(), "Creating new archive");
            store.initialize_schema(metadata)?;
        }

        Ok(store)
    }

    /// Opens a fresh archive that lives only in memory.
    pub fn open_in_memory(metadata: &ArchiveMetadata) -> Result<Self, StoreError> {
        let mut store = Self {
            conn: Connection::open_in_memory()?,
            path: None,
            resumed: false,
            pending: 0,
        };
        store.initialize_schema(metadata)?;
        Ok(store)
    }

    /// Creates tables, index and metadata.
    ///
    /// Does nothing for a resumed archive, so calling it again is harmless.
    pub fn initialize_schema(&mut self, metadata: &ArchiveMetadata) -> Result<(), StoreError> {
        if self.resumed {
            debug!("Archive resumed, schema left untouched");
            return Ok(());
        }
        if self.has_table("tiles")? {
            return Ok(());
        }

        let tx = self.conn.transaction()?;
        schema::create_schema(&tx)?;
        for (name, value) in metadata.entries() {
            tx.execute("INSERT INTO metadata VALUES (?1, ?2)", (name, value))?;
        }
        tx.commit()?;
        Ok(())
    }

    fn has_table(&self, table: &str) -> Result<bool, StoreError> {
        let found = self
            .conn
            .query_row(
                "SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1",
                [table],
                |_| Ok(()),
            )
            .optional()?;
        Ok(found.is_some())
    }

    /// True if an existing archive was opened and its schema kept.
    pub fn is_resumed(&self) -> bool {
        self.resumed
    }

    /// Path of the archive file, if on disk.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// True if a tile is already archived. `xyz_row` is the XYZ row.
    pub fn exists(&self, zoom: u8, col: u32, xyz_row: u32) -> Result<bool, StoreError> {
        let tms_row = tms_row(zoom, xyz_row)?;
        let found = self
            .conn
            .prepare_cached(
                "SELECT 1 FROM tiles WHERE zoom_level = ?1 AND tile_column = ?2 AND tile_row = ?3",
            )?
            .query_row((zoom, col, tms_row), |_| Ok(()))
            .optional()?;
        Ok(found.is_some())
    }

    /// Convenience for [`TileStore::exists`].
    pub fn contains(&self, tile: &TileCoord) -> Result<bool, StoreError> {
        self.exists(tile.zoom, tile.col, tile.row)
    }

    /// Inserts a tile into the current batch.
    ///
    /// A second write for the same key is reported as [`PutOutcome::Duplicate`]
    /// and logged, never raised.
    ///
    /// # Arguments
    ///
    /// * `zoom` - Zoom level, at most [`MAX_ZOOM`]
    /// * `col` - Tile column
    /// * `xyz_row` - Tile row in the XYZ convention; stored as the TMS row
    /// * `payload` - Encoded image bytes
    ///
    /// # Returns
    ///
    /// Whether the row was inserted or already present. Nothing is durable
    /// until [`TileStore::commit`].
    pub fn put(
        &mut self,
        zoom: u8,
        col: u32,
        xyz_row: u32,
        payload: &[u8],
    ) -> Result<PutOutcome, StoreError> {
        let tms_row = tms_row(zoom, xyz_row)?;

        if self.conn.is_autocommit() {
            self.conn.execute_batch("BEGIN")?;
        }

        let result = self
            .conn
            .prepare_cached("INSERT INTO tiles VALUES (?1, ?2, ?3, ?4)")?
            .execute((zoom, col, tms_row, payload));

        match result {
            Ok(_) => {
                self.pending += 1;
                Ok(PutOutcome::Inserted)
            }
            Err(e) if e.sqlite_error_code() == Some(ErrorCode::ConstraintViolation) => {
                warn!(zoom, x = col, y = tms_row, "Duplicate tile");
                Ok(PutOutcome::Duplicate)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Inserts a tile addressed by [`TileCoord`].
    pub fn put_tile(&mut self, tile: &TileCoord, payload: &[u8]) -> Result<PutOutcome, StoreError> {
        self.put(tile.zoom, tile.col, tile.row, payload)
    }

    /// Reads a tile's payload. `xyz_row` is the XYZ row.
    pub fn get(&self, zoom: u8, col: u32, xyz_row: u32) -> Result<Option<Vec<u8>>, StoreError> {
        let tms_row = tms_row(zoom, xyz_row)?;
        let payload = self
            .conn
            .prepare_cached(
                "SELECT tile_data FROM tiles \
                 WHERE zoom_level = ?1 AND tile_column = ?2 AND tile_row = ?3",
            )?
            .query_row((zoom, col, tms_row), |row| row.get::<_, Vec<u8>>(0))
            .optional()?;
        Ok(payload)
    }

    /// Number of inserts since the last commit.
    pub fn pending(&self) -> usize {
        self.pending
    }

    /// Makes outstanding writes durable. No-op when nothing is pending.
    pub fn commit(&mut self) -> Result<(), StoreError> {
        if !self.conn.is_autocommit() {
            self.conn.execute_batch("COMMIT")?;
            debug!(tiles = self.pending, "Committed batch");
        }
        self.pending = 0;
        Ok(())
    }

    /// Commits and closes the archive.
    pub fn close(mut self) -> Result<(), StoreError> {
        self.commit()?;
        // Connection::close hands the connection back on failure; drop it.
        let conn = std::mem::replace(&mut self.conn, Connection::open_in_memory()?);
        conn.close().map_err(|(_, e)| StoreError::Sqlite(e))
    }

    /// Tiles stored at one zoom level.
    pub fn tile_count(&self, zoom: u8) -> Result<u64, StoreError> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM tiles WHERE zoom_level = ?1",
            [zoom],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    /// Tiles stored across all zoom levels.
    pub fn tile_count_total(&self) -> Result<u64, StoreError> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM tiles", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    /// Tile counts keyed by zoom level.
    pub fn tile_counts_by_zoom(&self) -> Result<BTreeMap<u8, u64>, StoreError> {
        let mut stmt = self
            .conn
            .prepare("SELECT zoom_level, COUNT(*) FROM tiles GROUP BY zoom_level")?;
        let counts = stmt
            .query_map([], |row| Ok((row.get::<_, u8>(0)?, row.get::<_, i64>(1)? as u64)))?
            .collect::<Result<BTreeMap<_, _>, _>>()?;
        Ok(counts)
    }

    /// All metadata rows, in insertion order.
    pub fn metadata(&self) -> Result<Vec<(String, String)>, StoreError> {
        let mut stmt = self
            .conn
            .prepare("SELECT name, value FROM metadata ORDER BY rowid")?;
        let rows = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// One metadata value.
    pub fn metadata_value(&self, name: &str) -> Result<Option<String>, StoreError> {
        schema::metadata_value(&self.conn, name)
    }
}

fn tms_row(zoom: u8, xyz_row: u32) -> Result<u32, StoreError> {
    if zoom > MAX_ZOOM || u64::from(xyz_row) >= tiles_per_axis(zoom) {
        return Err(StoreError::TileOutOfRange { zoom, row: xyz_row });
    }
    Ok(xyz_to_tms_row(zoom, xyz_row))
}

impl Drop for TileStore {
    fn drop(&mut self) {
        if !self.conn.is_autocommit() {
            if let Err(e) = self.conn.execute_batch("COMMIT") {
                warn!(error = %e, "Failed to commit pending tiles on drop");
            }
        }
    }
}
