//! MBTiles schema creation and validation.

use rusqlite::{Connection, OptionalExtension};

use super::StoreError;

const CREATE_METADATA: &str = "CREATE TABLE metadata (name text, value text)";

const CREATE_TILES: &str = "CREATE TABLE tiles (zoom_level integer, tile_column integer, \
                            tile_row integer, tile_data blob)";

const CREATE_TILE_INDEX: &str =
    "CREATE UNIQUE INDEX tile_index on tiles (zoom_level, tile_column, tile_row)";

const METADATA_COLUMNS: [&str; 2] = ["name", "value"];

const TILES_COLUMNS: [&str; 4] = ["zoom_level", "tile_column", "tile_row", "tile_data"];

const TILE_KEY_COLUMNS: [&str; 3] = ["zoom_level", "tile_column", "tile_row"];

/// Creates the `metadata` and `tiles` tables and the unique tile index.
pub(super) fn create_schema(conn: &Connection) -> Result<(), StoreError> {
    conn.execute(CREATE_METADATA, ())?;
    conn.execute(CREATE_TILES, ())?;
    conn.execute(CREATE_TILE_INDEX, ())?;
    Ok(())
}

/// Checks that an existing archive has the layout this crate writes.
pub(super) fn validate_schema(conn: &Connection) -> Result<(), StoreError> {
    require_columns(conn, "metadata", &METADATA_COLUMNS)?;
    require_columns(conn, "tiles", &TILES_COLUMNS)?;

    if !has_unique_tile_key(conn)? {
        return Err(StoreError::IncompatibleSchema(
            "tiles has no unique index on (zoom_level, tile_column, tile_row)".to_string(),
        ));
    }

    Ok(())
}

fn table_columns(conn: &Connection, table: &str) -> Result<Vec<String>, StoreError> {
    let mut stmt = conn.prepare("SELECT name FROM pragma_table_info(?1)")?;
    let columns = stmt
        .query_map([table], |row| row.get::<_, String>(0))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(columns)
}

fn require_columns(conn: &Connection, table: &str, expected: &[&str]) -> Result<(), StoreError> {
    let columns = table_columns(conn, table)?;
    if columns.is_empty() {
        return Err(StoreError::IncompatibleSchema(format!(
            "missing table '{}'",
            table
        )));
    }

    let missing: Vec<&str> = expected
        .iter()
        .copied()
        .filter(|c| !columns.iter().any(|have| have.eq_ignore_ascii_case(c)))
        .collect();

    if !missing.is_empty() {
        return Err(StoreError::IncompatibleSchema(format!(
            "table '{}' lacks column(s) {}",
            table,
            missing.join(", ")
        )));
    }

    Ok(())
}

/// True if some unique index (or primary key) on `tiles` covers exactly the tile key.
fn has_unique_tile_key(conn: &Connection) -> Result<bool, StoreError> {
    let mut stmt = conn.prepare("SELECT name, \"unique\" FROM pragma_index_list('tiles')")?;
    let indexes = stmt
        .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, bool>(1)?)))?
        .collect::<Result<Vec<_>, _>>()?;

    for (name, unique) in indexes {
        if !unique {
            continue;
        }

        let mut cols_stmt = conn.prepare("SELECT name FROM pragma_index_info(?1) ORDER BY seqno")?;
        let mut columns = cols_stmt
            .query_map([&name], |row| row.get::<_, Option<String>>(0))?
            .collect::<Result<Vec<_>, _>>()?
            .into_iter()
            .flatten()
            .map(|c| c.to_ascii_lowercase())
            .collect::<Vec<_>>();
        columns.sort();

        let mut key: Vec<String> = TILE_KEY_COLUMNS.iter().map(|c| c.to_string()).collect();
        key.sort();

        if columns == key {
            return Ok(true);
        }
    }

    Ok(false)
}

/// Reads one metadata value.
pub(super) fn metadata_value(conn: &Connection, name: &str) -> Result<Option<String>, StoreError> {
    let value = conn
        .query_row(
            "SELECT value FROM metadata WHERE name = ?1",
            [name],
            |row| row.get::<_, Option<String>>(0),
        )
        .optional()?;
    Ok(value.flatten())
}
