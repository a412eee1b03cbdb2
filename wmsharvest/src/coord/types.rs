//! Coordinate types: tiles, tile ranges, geographic bounds and bounds tiers.

use std::fmt;
use std::ops::RangeInclusive;

/// Highest zoom level the harvester accepts.
///
/// Keeps `2^zoom` comfortably inside `u32` for column/row arithmetic.
pub const MAX_ZOOM: u8 = 30;

/// Number of tiles along one axis at the given zoom level.
///
/// `zoom` must not exceed [`MAX_ZOOM`]; debug builds assert it.
#[inline]
pub fn tiles_per_axis(zoom: u8) -> u64 {
    debug_assert!(zoom <= MAX_ZOOM, "zoom {} above MAX_ZOOM", zoom);
    1u64 << zoom
}

/// A tile in the XYZ slippy-map convention (row 0 is the northernmost row).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TileCoord {
    /// Zoom level
    pub zoom: u8,
    /// Column, west to east
    pub col: u32,
    /// Row, north to south
    pub row: u32,
}

impl TileCoord {
    /// Creates a tile coordinate.
    pub fn new(zoom: u8, col: u32, row: u32) -> Self {
        Self { zoom, col, row }
    }

    /// Builds an XYZ tile from a TMS (bottom-origin) row.
    pub fn from_tms(zoom: u8, col: u32, tms_row: u32) -> Self {
        Self {
            zoom,
            col,
            row: super::tms_to_xyz_row(zoom, tms_row),
        }
    }

    /// Row of this tile in the TMS convention used by MBTiles archives.
    pub fn tms_row(&self) -> u32 {
        super::xyz_to_tms_row(self.zoom, self.row)
    }
}

impl fmt::Display for TileCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "z:{} x:{} y:{}", self.zoom, self.col, self.row)
    }
}

/// Geographic rectangle in degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoBounds {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lon: f64,
    pub max_lon: f64,
}

impl GeoBounds {
    /// Creates a bounds rectangle.
    pub const fn new(min_lat: f64, max_lat: f64, min_lon: f64, max_lon: f64) -> Self {
        Self {
            min_lat,
            max_lat,
            min_lon,
            max_lon,
        }
    }

    /// Full service extent including outlying islands and the antimeridian.
    pub const WIDE: GeoBounds = GeoBounds::new(-56.33, -25.19, -180.0, 180.0);

    /// Primary landmass only.
    pub const NARROW: GeoBounds = GeoBounds::new(-47.5, -34.0, 166.0, 179.0);

    /// Formats as the MBTiles `bounds` value: `min_lon,min_lat,max_lon,max_lat`.
    pub fn to_mbtiles_string(&self) -> String {
        format!(
            "{:?},{:?},{:?},{:?}",
            self.min_lon, self.min_lat, self.max_lon, self.max_lat
        )
    }
}

/// Which bounds tier a zoom level uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoundsTier {
    Wide,
    Narrow,
}

impl fmt::Display for BoundsTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BoundsTier::Wide => write!(f, "wide"),
            BoundsTier::Narrow => write!(f, "narrow"),
        }
    }
}

/// Zoom-keyed bounds policy.
///
/// Zoom levels inside `wide_zooms` use the wide rectangle, every other zoom
/// level (including 0) uses the narrow one.
#[derive(Debug, Clone, PartialEq)]
pub struct BoundsTiers {
    pub wide: GeoBounds,
    pub narrow: GeoBounds,
    pub wide_zooms: RangeInclusive<u8>,
}

impl Default for BoundsTiers {
    fn default() -> Self {
        Self {
            wide: GeoBounds::WIDE,
            narrow: GeoBounds::NARROW,
            wide_zooms: 1..=9,
        }
    }
}

impl BoundsTiers {
    /// Selects the tier for a zoom level.
    pub fn tier_for(&self, zoom: u8) -> BoundsTier {
        if self.wide_zooms.contains(&zoom) {
            BoundsTier::Wide
        } else {
            BoundsTier::Narrow
        }
    }

    /// Rectangle of the given tier.
    pub fn bounds(&self, tier: BoundsTier) -> GeoBounds {
        match tier {
            BoundsTier::Wide => self.wide,
            BoundsTier::Narrow => self.narrow,
        }
    }

    /// Rectangle used at the given zoom level.
    pub fn bounds_for(&self, zoom: u8) -> GeoBounds {
        self.bounds(self.tier_for(zoom))
    }
}

/// Tile bounding box in degrees, as returned by [`super::projected_bounds_for`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProjectedBounds {
    pub min_lon: f64,
    pub min_lat: f64,
    pub max_lon: f64,
    pub max_lat: f64,
}

impl ProjectedBounds {
    /// True if the point lies inside or on the edge of the box.
    pub fn contains(&self, lat: f64, lon: f64) -> bool {
        self.contains_within(lat, lon, 0.0)
    }

    /// Like [`ProjectedBounds::contains`], with every edge pushed outward by
    /// `tolerance` degrees.
    pub fn contains_within(&self, lat: f64, lon: f64, tolerance: f64) -> bool {
        (self.min_lat - tolerance..=self.max_lat + tolerance).contains(&lat)
            && (self.min_lon - tolerance..=self.max_lon + tolerance).contains(&lon)
    }
}

/// Tile bounding box in EPSG:3857 meters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MercatorBounds {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl fmt::Display for MercatorBounds {
    /// WMS `BBOX` parameter form: `minx,miny,maxx,maxy`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{},{},{},{}",
            self.min_x, self.min_y, self.max_x, self.max_y
        )
    }
}

/// Inclusive, clamped rectangle of tile indices at one zoom level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileRange {
    pub zoom: u8,
    pub min_col: u32,
    pub max_col: u32,
    pub min_row: u32,
    pub max_row: u32,
}

impl TileRange {
    /// Computes the tiles covering `bounds` at `zoom`.
    ///
    /// The south-west corner yields the minimum column and maximum row, the
    /// north-east corner the maximum column and minimum row. Both are clamped
    /// to `[0, 2^zoom - 1]`.
    pub fn covering(bounds: &GeoBounds, zoom: u8) -> Self {
        let (x_min, y_max) = super::tile_index_for(bounds.min_lat, bounds.min_lon, zoom);
        let (x_max, y_min) = super::tile_index_for(bounds.max_lat, bounds.max_lon, zoom);

        let last = tiles_per_axis(zoom) as i64 - 1;
        let clamp = |v: i64| v.clamp(0, last) as u32;

        Self {
            zoom,
            min_col: clamp(x_min),
            max_col: clamp(x_max),
            min_row: clamp(y_min),
            max_row: clamp(y_max),
        }
    }

    /// Number of tiles in the range.
    pub fn len(&self) -> u64 {
        if self.max_col < self.min_col || self.max_row < self.min_row {
            return 0;
        }
        (self.max_col - self.min_col + 1) as u64 * (self.max_row - self.min_row + 1) as u64
    }

    /// True if the range holds no tiles.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// True if the tile lies in this range.
    pub fn contains(&self, tile: &TileCoord) -> bool {
        tile.zoom == self.zoom
            && (self.min_col..=self.max_col).contains(&tile.col)
            && (self.min_row..=self.max_row).contains(&tile.row)
    }

    /// Iterates tiles column by column, rows innermost.
    pub fn tiles(&self) -> TileRangeIter {
        TileRangeIter {
            range: *self,
            col: self.min_col,
            row: self.min_row,
            done: self.is_empty(),
        }
    }
}

impl fmt::Display for TileRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "z{} x:{}..={} y:{}..={}",
            self.zoom, self.min_col, self.max_col, self.min_row, self.max_row
        )
    }
}

/// Iterator over every tile of a [`TileRange`].
#[derive(Debug, Clone)]
pub struct TileRangeIter {
    range: TileRange,
    col: u32,
    row: u32,
    done: bool,
}

impl Iterator for TileRangeIter {
    type Item = TileCoord;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        let tile = TileCoord::new(self.range.zoom, self.col, self.row);

        if self.row < self.range.max_row {
            self.row += 1;
        } else if self.col < self.range.max_col {
            self.col += 1;
            self.row = self.range.min_row;
        } else {
            self.done = true;
        }

        Some(tile)
    }
}
