//! Descriptive archive metadata (the MBTiles `metadata` table).

use crate::coord::{BoundsTiers, GeoBounds};

/// Key/value fields written once when an archive is created.
#[derive(Debug, Clone, PartialEq)]
pub struct ArchiveMetadata {
    pub name: String,
    pub layer_type: String,
    pub version: String,
    pub description: String,
    pub format: String,
    pub bounds: GeoBounds,
    /// (lon, lat, zoom)
    pub center: (f64, f64, u8),
    pub min_zoom: u8,
    pub max_zoom: u8,
    pub attribution: String,
}

impl Default for ArchiveMetadata {
    fn default() -> Self {
        Self {
            name: "NZ Emergency Management".to_string(),
            layer_type: "baselayer".to_string(),
            version: "1.0.0".to_string(),
            description: "National Map Emergency Management".to_string(),
            format: "png".to_string(),
            bounds: BoundsTiers::default().narrow,
            center: (173.0, -41.0, 6),
            min_zoom: 0,
            max_zoom: 15,
            attribution: "© NationalMap WMS Basemap Service CC BY-NC-ND 4.0".to_string(),
        }
    }
}

impl ArchiveMetadata {
    /// Default metadata for the given zoom span and bounds tiers.
    ///
    /// The advertised bounds are always the narrow tier.
    pub fn for_run(min_zoom: u8, max_zoom: u8, tiers: &BoundsTiers) -> Self {
        Self {
            bounds: tiers.narrow,
            min_zoom,
            max_zoom,
            ..Self::default()
        }
    }

    /// Rows for the `metadata` table, in insertion order.
    pub fn entries(&self) -> Vec<(&'static str, String)> {
        let (lon, lat, zoom) = self.center;
        vec![
            ("name", self.name.clone()),
            ("type", self.layer_type.clone()),
            ("version", self.version.clone()),
            ("description", self.description.clone()),
            ("format", self.format.clone()),
            ("bounds", self.bounds.to_mbtiles_string()),
            ("center", format!("{:?},{:?},{}", lon, lat, zoom)),
            ("minzoom", self.min_zoom.to_string()),
            ("maxzoom", self.max_zoom.to_string()),
            ("attribution", self.attribution.clone()),
        ]
    }
}
