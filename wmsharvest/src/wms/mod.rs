//! WMS GetMap request construction.
//!
//! Builds the single request shape the harvester issues: one named layer,
//! rendered as a transparent 256×256 PNG in EPSG:3857, for the Web Mercator
//! bounding box of one tile.
//!
//! # URL Pattern
//!
//! `{endpoint}?authkey={key}&SERVICE=WMS&VERSION=1.1.1&REQUEST=GetMap&LAYERS={layer}
//! &STYLES=&FORMAT=image/png&TRANSPARENT=TRUE&SRS=EPSG:3857&WIDTH=256&HEIGHT=256&BBOX={bbox}`

use std::fmt;

use reqwest::Url;
use thiserror::Error;

use crate::coord::{mercator_bounds_for, TileCoord};

/// Default WMS endpoint.
pub const DEFAULT_ENDPOINT: &str = "https://maps.nationalmap.co.nz/wms";

/// Default layer name.
pub const DEFAULT_LAYER: &str = "NationalMap:NationalMap Emergency Management";

/// Tile edge length in pixels.
pub const TILE_SIZE: u32 = 256;

/// Query parameter carrying the credential.
const AUTH_PARAM: &str = "authkey";

/// Errors raised while building a request.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum WmsError {
    #[error("Invalid WMS endpoint '{endpoint}': {reason}")]
    InvalidEndpoint { endpoint: String, reason: String },
}

/// Keys shorter than this are masked completely.
const MIN_PARTIAL_MASK_LEN: usize = 12;

/// Authentication key for the WMS service.
///
/// The key is never printed: `Debug` and `Display` show a masked form.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    /// Wraps a raw key.
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// The raw key, for placing in the request.
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// Masked form: the first two characters of a long key, nothing of a
    /// short one.
    pub fn masked(&self) -> String {
        if self.0.chars().count() < MIN_PARTIAL_MASK_LEN {
            return "***".to_string();
        }
        let head: String = self.0.chars().take(2).collect();
        format!("{}…", head)
    }

    /// Replaces every occurrence of the key in `text` with its masked form.
    pub fn redact(&self, text: &str) -> String {
        if self.0.is_empty() {
            return text.to_string();
        }
        text.replace(&self.0, &self.masked())
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Credential({})", self.masked())
    }
}

impl fmt::Display for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.masked())
    }
}

/// Service parameters for GetMap requests.
#[derive(Debug, Clone, PartialEq)]
pub struct WmsConfig {
    endpoint: String,
    layer: String,
    width: u32,
    height: u32,
}

impl Default for WmsConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            layer: DEFAULT_LAYER.to_string(),
            width: TILE_SIZE,
            height: TILE_SIZE,
        }
    }
}

impl WmsConfig {
    /// Creates a config with the default endpoint and layer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the service endpoint.
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    /// Set the layer name.
    pub fn with_layer(mut self, layer: impl Into<String>) -> Self {
        self.layer = layer.into();
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn layer(&self) -> &str {
        &self.layer
    }

    /// Checks that the endpoint parses as an absolute URL.
    pub fn validate(&self) -> Result<(), WmsError> {
        self.parse_endpoint().map(|_| ())
    }

    fn parse_endpoint(&self) -> Result<Url, WmsError> {
        Url::parse(&self.endpoint).map_err(|e| WmsError::InvalidEndpoint {
            endpoint: self.endpoint.clone(),
            reason: e.to_string(),
        })
    }

    /// Builds the GetMap URL for one tile.
    pub fn get_map_url(&self, tile: &TileCoord, credential: &Credential) -> Result<Url, WmsError> {
        let bbox = mercator_bounds_for(tile.zoom, tile.col, tile.row).to_string();
        let width = self.width.to_string();
        let height = self.height.to_string();

        let mut url = self.parse_endpoint()?;
        url.query_pairs_mut()
            .append_pair(AUTH_PARAM, credential.expose())
            .append_pair("SERVICE", "WMS")
            .append_pair("VERSION", "1.1.1")
            .append_pair("REQUEST", "GetMap")
            .append_pair("LAYERS", &self.layer)
            .append_pair("STYLES", "")
            .append_pair("FORMAT", "image/png")
            .append_pair("TRANSPARENT", "TRUE")
            .append_pair("SRS", "EPSG:3857")
            .append_pair("WIDTH", &width)
            .append_pair("HEIGHT", &height)
            .append_pair("BBOX", &bbox);

        Ok(url)
    }
}

/// Builds the GetMap URL for one tile with the given service parameters.
pub fn build_get_map_url(
    config: &WmsConfig,
    tile: &TileCoord,
    credential: &Credential,
) -> Result<Url, WmsError> {
    config.get_map_url(tile, credential)
}
