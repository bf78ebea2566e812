use std::{fs, path::Path};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::{search::{PlaceType, PLACE_SEARCH_TYPES}, types::Millis};

/// Runtime configuration of the overlay. Every field has a default, so a config file only needs
/// to name what it overrides.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OverlayConfig {
    /// Credential passed to the geocoding service as the `access_token` query parameter.
    pub access_token: Option<String>,
    pub geocoding_endpoint: String,
    /// ISO country code the geocoder is restricted to.
    pub country: String,
    /// Place types a suburb search is restricted to.
    pub place_types: Vec<PlaceType>,
    pub localities: LocalitiesConfig,
    pub catchments: CatchmentsConfig,
    /// Place names known to exist more than once inside one region.
    pub ambiguous_places: Vec<AmbiguousPlaceConfig>,
    pub timings: Timings,
}

impl Default for OverlayConfig {
    fn default() -> Self {
        Self {
            access_token: None,
            geocoding_endpoint: "https://api.mapbox.com/geocoding/v5/mapbox.places".to_string(),
            country: "AU".to_string(),
            place_types: PLACE_SEARCH_TYPES.to_vec(),
            localities: LocalitiesConfig::default(),
            catchments: CatchmentsConfig::default(),
            ambiguous_places: vec![AmbiguousPlaceConfig {
                name_pattern: "(?i)^red hill$".to_string(),
                region_hint: "Queensland".to_string(),
                bounds: [152.0, -28.0, 154.0, -26.0],
            }],
            timings: Timings::default(),
        }
    }
}

impl OverlayConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        serde_json::from_str(json).context("Failed to parse overlay config")
    }

    pub fn from_json_file(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::from_json_str(&text).with_context(|| format!("Invalid config file: {}", path.display()))
    }

    pub fn with_access_token(mut self, token: impl Into<String>) -> Self {
        self.access_token = Some(token.into());
        self
    }
}

/// The zoom-tiered administrative boundary tileset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LocalitiesConfig {
    pub source_id: String,
    pub tileset_url: String,
    /// Attribute promoted to the feature id (the stable locality code).
    pub id_property: String,
    pub name_property: String,
    pub state_property: String,
}

impl Default for LocalitiesConfig {
    fn default() -> Self {
        Self {
            source_id: "localities".to_string(),
            tileset_url: "mapbox://tommstar25.909daqku".to_string(),
            id_property: "LOC_PID".to_string(),
            name_property: "LOC_NAME".to_string(),
            state_property: "STATE".to_string(),
        }
    }
}

/// School catchment polygons (attributes `type`, `state`, `year_level`) and school points.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CatchmentsConfig {
    pub source_id: String,
    pub tileset_url: String,
    pub source_layer: String,
    pub schools_source_id: String,
    pub schools_tileset_url: String,
    pub schools_source_layer: String,
}

impl Default for CatchmentsConfig {
    fn default() -> Self {
        Self {
            source_id: "school-catchments".to_string(),
            tileset_url: "mapbox://tommstar25.dg9ropwk".to_string(),
            source_layer: "catchments".to_string(),
            schools_source_id: "schools".to_string(),
            schools_tileset_url: "mapbox://tommstar25.5zha3q9v".to_string(),
            schools_source_layer: "schools".to_string(),
        }
    }
}

/// One row of the disambiguation table: when the searched name matches `name_pattern` and the
/// state hint mentions `region_hint`, prefer the candidate inside `bounds` (`[west, south, east, north]`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AmbiguousPlaceConfig {
    pub name_pattern: String,
    pub region_hint: String,
    pub bounds: [f64; 4],
}

/// Delays and fallbacks, all in milliseconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Timings {
    /// Minimum gap between processed pointer moves (~60 Hz).
    pub hover_throttle_ms: Millis,
    /// Delay before hover is cleared after a click.
    pub click_clear_delay_ms: Millis,
    /// Retry of a failed layer insertion if the style-ready notification never arrives.
    pub layer_retry_ms: Millis,
    /// Initialization at mount if the style-ready notification never arrives.
    pub style_wait_ms: Millis,
    /// Added to a camera move's duration before highlighting without a move-end notification.
    pub move_end_fallback_ms: Millis,
    pub suggest_debounce_ms: Millis,
}

impl Default for Timings {
    fn default() -> Self {
        Self {
            hover_throttle_ms: 16,
            click_clear_delay_ms: 50,
            layer_retry_ms: 1000,
            style_wait_ms: 2000,
            move_end_fallback_ms: 300,
            suggest_debounce_ms: 300,
        }
    }
}
