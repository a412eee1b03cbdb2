//! Coordinate conversion module
//!
//! Converts between geographic coordinates (latitude/longitude), Web Mercator
//! tile indices and the EPSG:3857 meter space the WMS endpoint expects.

mod types;

pub use types::{
    tiles_per_axis, BoundsTier, BoundsTiers, GeoBounds, MercatorBounds, ProjectedBounds,
    TileCoord, TileRange, TileRangeIter, MAX_ZOOM,
};

use std::f64::consts::PI;

/// Half the circumference of the Web Mercator sphere, in meters.
const MERCATOR_HALF_EXTENT: f64 = 20037508.34;

/// Converts geographic coordinates to slippy-map tile indices.
///
/// No clamping is done: a longitude of exactly 180° yields column `2^zoom`,
/// so callers enumerating ranges go through [`TileRange::covering`].
///
/// # Arguments
///
/// * `lat` - Latitude in decimal degrees, within the Web Mercator range
/// * `lon` - Longitude in decimal degrees
/// * `zoom` - Zoom level, at most [`MAX_ZOOM`]
///
/// # Returns
///
/// `(column, row)` as raw floor values in the XYZ convention.
#[inline]
pub fn tile_index_for(lat: f64, lon: f64, zoom: u8) -> (i64, i64) {
    let n = tiles_per_axis(zoom) as f64;

    let col = ((lon + 180.0) / 360.0 * n).floor() as i64;

    let lat_rad = lat.to_radians();
    let row = ((1.0 - lat_rad.tan().asinh() / PI) / 2.0 * n).floor() as i64;

    (col, row)
}

/// Longitude of the west edge of a tile column.
#[inline]
fn col_to_lon(col: u32, n: f64) -> f64 {
    col as f64 / n * 360.0 - 180.0
}

/// Latitude of the north edge of a tile row.
#[inline]
fn row_to_lat(row: u32, n: f64) -> f64 {
    let y = row as f64 / n;
    (PI * (1.0 - 2.0 * y)).sinh().atan().to_degrees()
}

/// Bounding box of a tile in degrees.
///
/// Evaluates the inverse tile formula at `col`/`col + 1` and `row`/`row + 1`.
///
/// # Arguments
///
/// * `zoom` - Zoom level, at most [`MAX_ZOOM`]
/// * `col` - Tile column
/// * `row` - Tile row (XYZ, top origin)
///
/// # Returns
///
/// The tile's edges as longitude and latitude in degrees.
pub fn projected_bounds_for(zoom: u8, col: u32, row: u32) -> ProjectedBounds {
    let n = tiles_per_axis(zoom) as f64;

    ProjectedBounds {
        min_lon: col_to_lon(col, n),
        min_lat: row_to_lat(row + 1, n),
        max_lon: col_to_lon(col + 1, n),
        max_lat: row_to_lat(row, n),
    }
}

/// Projects a lon/lat pair onto spherical Web Mercator (EPSG:3857) meters.
#[inline]
pub fn to_web_mercator_meters(lon: f64, lat: f64) -> (f64, f64) {
    let x = lon * MERCATOR_HALF_EXTENT / 180.0;
    let y = ((90.0 + lat) * PI / 360.0).tan().ln() / (PI / 180.0);
    let y = y * MERCATOR_HALF_EXTENT / 180.0;
    (x, y)
}

/// Bounding box of a tile in EPSG:3857 meters, ready for a WMS `BBOX`.
pub fn mercator_bounds_for(zoom: u8, col: u32, row: u32) -> MercatorBounds {
    let deg = projected_bounds_for(zoom, col, row);
    let (min_x, min_y) = to_web_mercator_meters(deg.min_lon, deg.min_lat);
    let (max_x, max_y) = to_web_mercator_meters(deg.max_lon, deg.max_lat);

    MercatorBounds {
        min_x,
        min_y,
        max_x,
        max_y,
    }
}

/// Converts an XYZ (top-origin) row to the TMS (bottom-origin) convention.
///
/// The transform is its own inverse. `zoom` must not exceed [`MAX_ZOOM`] and
/// `row` must lie in `[0, 2^zoom - 1]`.
#[inline]
pub fn xyz_to_tms_row(zoom: u8, row: u32) -> u32 {
    (tiles_per_axis(zoom) - 1 - row as u64) as u32
}

/// Converts a TMS row back to XYZ.
#[inline]
pub fn tms_to_xyz_row(zoom: u8, tms_row: u32) -> u32 {
    xyz_to_tms_row(zoom, tms_row)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_york_city_at_zoom_16() {
        // New York City: 40.7128°N, 74.0060°W
        let (col, row) = tile_index_for(40.7128, -74.0060, 16);
        assert_eq!(col, 19295);
        assert_eq!(row, 24640);
    }

    #[test]
    fn test_antimeridian_is_not_clamped() {
        let (col, _) = tile_index_for(-40.0, 180.0, 5);
        assert_eq!(col, 32, "clamping belongs to the caller");
    }

    #[test]
    fn test_zoom_0_single_tile() {
        assert_eq!(tile_index_for(-41.0, 173.0, 0), (0, 0));

        let bounds = projected_bounds_for(0, 0, 0);
        assert_eq!(bounds.min_lon, -180.0);
        assert_eq!(bounds.max_lon, 180.0);
        assert!((bounds.max_lat - 85.0511287798).abs() < 1e-6);
        assert!((bounds.min_lat + 85.0511287798).abs() < 1e-6);
    }

    #[test]
    fn test_projected_bounds_orders_corners() {
        let b = projected_bounds_for(12, 4034, 2567);
        assert!(b.min_lon < b.max_lon);
        assert!(b.min_lat < b.max_lat);
        assert!(b.contains(b.min_lat, b.min_lon));
        assert!(b.contains(b.max_lat, b.max_lon));
        assert!(!b.contains(b.max_lat + 1e-6, b.min_lon));
        assert!(b.contains_within(b.max_lat + 1e-6, b.min_lon, 1e-5));
    }

    #[test]
    fn test_web_mercator_origin_and_edges() {
        let (x, y) = to_web_mercator_meters(0.0, 0.0);
        assert!(x.abs() < 1e-6);
        assert!(y.abs() < 1e-6);

        let (x, _) = to_web_mercator_meters(180.0, 0.0);
        assert!((x - MERCATOR_HALF_EXTENT).abs() < 1e-6);

        let (_, y) = to_web_mercator_meters(0.0, 85.0511287798);
        assert!((y - MERCATOR_HALF_EXTENT).abs() < 1.0);
    }

    #[test]
    fn test_mercator_bounds_zoom_0_is_full_square() {
        let b = mercator_bounds_for(0, 0, 0);
        assert!((b.min_x + MERCATOR_HALF_EXTENT).abs() < 1e-6);
        assert!((b.max_x - MERCATOR_HALF_EXTENT).abs() < 1e-6);
        assert!((b.min_y + MERCATOR_HALF_EXTENT).abs() < 1.0);
        assert!((b.max_y - MERCATOR_HALF_EXTENT).abs() < 1.0);
    }

    #[test]
    fn test_mercator_bbox_format() {
        let b = MercatorBounds {
            min_x: 1.5,
            min_y: -2.0,
            max_x: 3.25,
            max_y: 4.0,
        };
        assert_eq!(b.to_string(), "1.5,-2,3.25,4");
    }

    #[test]
    fn test_tms_row_inversion() {
        assert_eq!(xyz_to_tms_row(0, 0), 0);
        assert_eq!(xyz_to_tms_row(1, 0), 1);
        assert_eq!(xyz_to_tms_row(1, 1), 0);
        assert_eq!(xyz_to_tms_row(12, 2567), 4095 - 2567);
    }

    #[test]
    fn test_tile_coord_tms_roundtrip() {
        let tile = TileCoord::new(10, 1000, 640);
        assert_eq!(tile.tms_row(), 383);
        assert_eq!(TileCoord::from_tms(10, 1000, tile.tms_row()), tile);
    }

    #[test]
    fn test_tier_selection_policy() {
        let tiers = BoundsTiers::default();
        assert_eq!(tiers.tier_for(0), BoundsTier::Narrow);
        for zoom in 1..=9 {
            assert_eq!(tiers.tier_for(zoom), BoundsTier::Wide, "zoom {}", zoom);
        }
        for zoom in 10..=20 {
            assert_eq!(tiers.tier_for(zoom), BoundsTier::Narrow, "zoom {}", zoom);
        }
    }

    #[test]
    fn test_range_zoom_5_wide_tier() {
        let tiers = BoundsTiers::default();
        assert_eq!(tiers.tier_for(5), BoundsTier::Wide);

        let range = TileRange::covering(&tiers.bounds_for(5), 5);
        assert_eq!(
            range,
            TileRange {
                zoom: 5,
                min_col: 0,
                max_col: 31,
                min_row: 18,
                max_row: 22,
            }
        );
        assert_eq!(range.len(), 32 * 5);
    }

    #[test]
    fn test_range_zoom_12_narrow_tier() {
        let tiers = BoundsTiers::default();
        assert_eq!(tiers.tier_for(12), BoundsTier::Narrow);

        let range = TileRange::covering(&tiers.bounds_for(12), 12);
        assert_eq!(
            range,
            TileRange {
                zoom: 12,
                min_col: 3936,
                max_col: 4084,
                min_row: 2459,
                max_row: 2663,
            }
        );
        assert_eq!(range.len(), 149 * 205);
    }

    #[test]
    fn test_range_iteration_order_and_count() {
        let range = TileRange {
            zoom: 3,
            min_col: 2,
            max_col: 3,
            min_row: 5,
            max_row: 7,
        };

        let tiles: Vec<_> = range.tiles().collect();
        assert_eq!(tiles.len() as u64, range.len());
        assert_eq!(tiles[0], TileCoord::new(3, 2, 5));
        assert_eq!(tiles[1], TileCoord::new(3, 2, 6));
        assert_eq!(tiles[3], TileCoord::new(3, 3, 5));
        assert_eq!(*tiles.last().unwrap(), TileCoord::new(3, 3, 7));
        assert!(tiles.iter().all(|t| range.contains(t)));
    }

    #[test]
    fn test_mbtiles_bounds_string() {
        assert_eq!(
            GeoBounds::NARROW.to_mbtiles_string(),
            "166.0,-47.5,179.0,-34.0"
        );
    }

    // Property-based tests using proptest
    mod property_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn test_point_lies_in_its_tile(
                lat in -85.0..85.0_f64,
                lon in -180.0..179.999_f64,
                zoom in 0u8..=18
            ) {
                let (col, row) = tile_index_for(lat, lon, zoom);
                let bounds = projected_bounds_for(zoom, col as u32, row as u32);

                prop_assert!(
                    bounds.contains_within(lat, lon, 1e-9),
                    "({}, {}) outside {:?} at zoom {}",
                    lat, lon, bounds, zoom
                );
            }

            #[test]
            fn test_tile_index_in_range(
                lat in -85.05..85.05_f64,
                lon in -180.0..180.0_f64,
                zoom in 0u8..=18
            ) {
                let (col, row) = tile_index_for(lat, lon, zoom);
                let n = tiles_per_axis(zoom) as i64;
                prop_assert!((0..n).contains(&col));
                prop_assert!((0..n).contains(&row));
            }

            #[test]
            fn test_tms_row_is_involution(
                row_raw in 0u32..u32::MAX,
                zoom in 0u8..=20
            ) {
                let row = row_raw % tiles_per_axis(zoom) as u32;
                let tms = xyz_to_tms_row(zoom, row);
                prop_assert!((tms as u64) < tiles_per_axis(zoom));
                prop_assert_eq!(tms_to_xyz_row(zoom, tms), row);
            }

            #[test]
            fn test_longitude_monotonic(
                lat in 0.0..1.0_f64,
                lon1 in -180.0..-90.0_f64,
                lon2 in -90.0..0.0_f64,
                zoom in 10u8..=15
            ) {
                let (col1, _) = tile_index_for(lat, lon1, zoom);
                let (col2, _) = tile_index_for(lat, lon2, zoom);
                prop_assert!(col1 < col2);
            }

            #[test]
            fn test_covering_range_is_clamped(
                min_lat in -80.0..0.0_f64,
                lat_span in 0.0..80.0_f64,
                min_lon in -180.0..0.0_f64,
                lon_span in 0.0..180.0_f64,
                zoom in 0u8..=14
            ) {
                let bounds =
                    GeoBounds::new(min_lat, min_lat + lat_span, min_lon, min_lon + lon_span);
                let range = TileRange::covering(&bounds, zoom);
                let last = (tiles_per_axis(zoom) - 1) as u32;
                prop_assert!(range.max_col <= last);
                prop_assert!(range.max_row <= last);
                prop_assert!(range.min_col <= range.max_col);
                prop_assert!(range.min_row <= range.max_row);
            }
        }
    }
}
