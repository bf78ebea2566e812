//! The rendering-engine capability surface consumed by the overlay.
//!
//! The engine draws vector tiles and answers spatial queries; this crate never renders anything
//! itself. Everything it needs from the engine is expressed by [`MapEngine`], so the same overlay
//! logic drives a browser map (through the WASM binding) or [`MemoryEngine`] in tests.

mod memory;
mod spec;

pub use memory::{CameraCall, MemoryEngine};
pub use spec::{LayerKind, LayerSpec, SourceSpec};

use anyhow::Result;
use geo::{Point, Rect};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::types::LocalityId;

/// Pointer events the overlay subscribes to, scoped to individual style layers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PointerEventKind {
    MouseMove,
    MouseLeave,
    Click,
}

impl PointerEventKind {
    pub const ALL: [PointerEventKind; 3] = [PointerEventKind::MouseMove, PointerEventKind::MouseLeave, PointerEventKind::Click];

    /// Event name understood by the engine's `on`/`off`.
    pub fn to_str(&self) -> &'static str {
        match self {
            PointerEventKind::MouseMove => "mousemove",
            PointerEventKind::MouseLeave => "mouseleave",
            PointerEventKind::Click => "click",
        }
    }

    pub fn from_str(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.to_str() == name)
    }
}

/// Identifies a camera command so its move-end can be told apart from other camera moves.
pub type MoveTag = u64;

/// Notifications the host forwards from the engine to the overlay controller.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    Pointer { kind: PointerEventKind, layer: String, point: ScreenPoint },
    StyleData,
    Load,
    /// The camera stopped. `tag` is the tag of the camera command whose animation ended, `None`
    /// for moves the overlay did not start (panning, scroll zoom).
    MoveEnd { tag: Option<MoveTag> },
}

/// Position in canvas pixels.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ScreenPoint {
    pub x: f64,
    pub y: f64,
}

impl ScreenPoint {
    pub fn new(x: f64, y: f64) -> Self { Self { x, y } }
}

/// Addresses one tier-specific copy of a boundary feature.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FeatureRef {
    pub source: String,
    pub source_layer: String,
    pub id: LocalityId,
}

/// Transient per-feature flags referenced by the paint expressions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StateFlag {
    Hover,
    Search,
}

impl StateFlag {
    pub fn key(&self) -> &'static str {
        match self {
            StateFlag::Hover => "hover",
            StateFlag::Search => "search",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Cursor {
    #[default]
    Default,
    Pointer,
}

impl Cursor {
    /// CSS cursor value for the map canvas.
    pub fn to_css(&self) -> &'static str {
        match self {
            Cursor::Default => "",
            Cursor::Pointer => "pointer",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    Visible,
    None,
}

impl Visibility {
    pub fn to_str(&self) -> &'static str {
        match self {
            Visibility::Visible => "visible",
            Visibility::None => "none",
        }
    }

    pub fn from_bool(visible: bool) -> Self {
        if visible { Visibility::Visible } else { Visibility::None }
    }
}

/// A feature returned by a rendered-feature or source-feature query.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RenderedFeature {
    #[serde(default)]
    pub id: Option<String>,
    /// Style layer that rendered the feature (empty for source queries).
    #[serde(default)]
    pub layer: String,
    #[serde(default)]
    pub source_layer: Option<String>,
    #[serde(default)]
    pub properties: Map<String, Value>,
}

impl RenderedFeature {
    /// String value of a property; numbers are rendered as text.
    pub fn property_str(&self, key: &str) -> Option<String> {
        match self.properties.get(key)? {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }
}

/// Capability surface of the vector-tile rendering engine.
///
/// Every mutating call may fail (style not loaded yet, unknown feature id in a source layer, ...);
/// callers treat failures as recoverable and log them.
pub trait MapEngine {
    /// Whether the base style has finished loading.
    fn is_style_loaded(&self) -> bool;

    /// Current (possibly fractional) zoom level.
    fn zoom(&self) -> f64;

    /// Ids of the layers currently in the style, bottom to top.
    fn style_layer_ids(&self) -> Vec<String>;

    fn has_source(&self, id: &str) -> bool;
    fn add_source(&mut self, id: &str, source: &SourceSpec) -> Result<()>;
    fn remove_source(&mut self, id: &str) -> Result<()>;

    fn has_layer(&self, id: &str) -> bool;
    /// Add a layer, inserted below `before` when given, otherwise on top.
    fn add_layer(&mut self, layer: &LayerSpec, before: Option<&str>) -> Result<()>;
    fn remove_layer(&mut self, id: &str) -> Result<()>;

    fn set_visibility(&mut self, layer: &str, visibility: Visibility) -> Result<()>;
    fn set_filter(&mut self, layer: &str, filter: Option<&Value>) -> Result<()>;

    fn set_feature_state(&mut self, feature: &FeatureRef, flag: StateFlag, value: bool) -> Result<()>;

    /// Features rendered under `at`, or anywhere in the viewport when `at` is `None`.
    fn query_rendered_features(&self, at: Option<ScreenPoint>, layers: &[&str]) -> Result<Vec<RenderedFeature>>;

    /// Features of `source_layer` currently loaded in the engine, rendered or not.
    fn query_source_features(&self, source: &str, source_layer: &str) -> Result<Vec<RenderedFeature>>;

    /// Camera commands. The engine reports `tag` back with the move-end of this animation, also
    /// when a later command interrupts it.
    fn fly_to(&mut self, center: Point<f64>, zoom: f64, duration_ms: u32, tag: MoveTag) -> Result<()>;
    fn fit_bounds(&mut self, bounds: Rect<f64>, padding: f64, max_zoom: f64, duration_ms: u32, tag: MoveTag) -> Result<()>;
    fn zoom_to(&mut self, zoom: f64, duration_ms: u32, tag: MoveTag) -> Result<()>;

    fn set_cursor(&mut self, cursor: Cursor);

    /// Start forwarding `kind` events on `layer` to the host's dispatcher.
    fn subscribe(&mut self, kind: PointerEventKind, layer: &str) -> Result<()>;
    fn unsubscribe(&mut self, kind: PointerEventKind, layer: &str) -> Result<()>;
}
