use anyhow::{Context, Result};
use serde_json::{json, Value};
use tracing::{debug, warn};

use super::style::insertion_point;
use crate::{
    config::CatchmentsConfig,
    engine::{LayerKind, LayerSpec, MapEngine, PointerEventKind, SourceSpec, Visibility},
};

pub const CATCHMENT_FILL: &str = "catchments-fill";
pub const CATCHMENT_LINE: &str = "catchments-line";
pub const SCHOOL_POINTS: &str = "schools-points";
pub const SCHOOL_LABELS: &str = "schools-labels";

/// Catchment layers sit below POI labels so school names stay readable.
const CATCHMENT_ANCHORS: [&str; 1] = ["poi-label"];

/// The catchment polygons plus the school point and label layers drawn over them.
#[derive(Debug)]
pub struct CatchmentLayerSet {
    config: CatchmentsConfig,
    subscribed: bool,
}

impl CatchmentLayerSet {
    pub fn new(config: &CatchmentsConfig) -> Self {
        Self { config: config.clone(), subscribed: false }
    }

    pub const LAYER_IDS: [&'static str; 4] = [CATCHMENT_FILL, CATCHMENT_LINE, SCHOOL_POINTS, SCHOOL_LABELS];

    #[inline] pub fn owns_layer(layer_id: &str) -> bool { Self::LAYER_IDS.contains(&layer_id) }

    fn layer_specs(&self) -> Vec<LayerSpec> {
        let c = &self.config;
        let by_type = |primary: &str, secondary: &str, future: &str| {
            json!(["match", ["get", "type"], "Primary", primary, "Future", future, secondary])
        };
        let by_level = |primary: &str, secondary: &str| {
            json!(["match", ["get", "level"], "primary", primary, secondary])
        };
        let hidden = json!("none");

        vec![
            LayerSpec::new(CATCHMENT_FILL, LayerKind::Fill, &c.source_id, &c.source_layer)
                .paint("fill-color", by_type("#3b82f6", "#10b981", "#f59e0b"))
                .paint("fill-opacity", json!(0.25))
                .layout("visibility", hidden.clone()),
            LayerSpec::new(CATCHMENT_LINE, LayerKind::Line, &c.source_id, &c.source_layer)
                .paint("line-color", by_type("#1d4ed8", "#059669", "#d97706"))
                .paint("line-width", json!(1.5))
                .layout("visibility", hidden.clone()),
            LayerSpec::new(SCHOOL_POINTS, LayerKind::Circle, &c.schools_source_id, &c.schools_source_layer)
                .min_zoom(10.0)
                .paint("circle-radius", json!(5))
                .paint("circle-color", by_level("#1d4ed8", "#059669"))
                .paint("circle-stroke-width", json!(1.5))
                .paint("circle-stroke-color", json!("#ffffff"))
                .layout("visibility", hidden.clone()),
            LayerSpec::new(SCHOOL_LABELS, LayerKind::Symbol, &c.schools_source_id, &c.schools_source_layer)
                .min_zoom(13.0)
                .paint("text-color", json!("#1f2937"))
                .paint("text-halo-color", json!("#ffffff"))
                .paint("text-halo-width", json!(1))
                .layout("text-field", json!(["get", "name"]))
                .layout("text-size", json!(11))
                .layout("text-offset", json!([0, 1.2]))
                .layout("text-anchor", json!("top"))
                .layout("visibility", hidden),
        ]
    }

    /// Add sources and (hidden) layers that are not there yet, and listen for pointer events on
    /// the catchment polygons.
    pub fn ensure(&mut self, engine: &mut dyn MapEngine) -> Result<()> {
        let c = &self.config;
        for (id, url) in [(&c.source_id, &c.tileset_url), (&c.schools_source_id, &c.schools_tileset_url)] {
            if !engine.has_source(id) {
                engine.add_source(id, &SourceSpec::vector(url))
                    .with_context(|| format!("add source {id}"))?;
            }
        }

        let before = insertion_point(&engine.style_layer_ids(), &CATCHMENT_ANCHORS)
            .filter(|anchor| !Self::owns_layer(anchor));
        for spec in self.layer_specs() {
            if engine.has_layer(&spec.id) { continue }
            engine.add_layer(&spec, before.as_deref())
                .with_context(|| format!("add layer {}", spec.id))?;
            debug!(layer = %spec.id, "added catchment layer");
        }

        if !self.subscribed {
            for kind in PointerEventKind::ALL {
                engine.subscribe(kind, CATCHMENT_FILL)?;
            }
            self.subscribed = true;
        }
        Ok(())
    }

    /// Show the polygons matching `filter`. School points are shown for `school_levels`
    /// (`"primary"`, `"secondary"`) and hidden when none is given.
    pub fn show(&self, engine: &mut dyn MapEngine, filter: &Value, school_levels: &[&str]) -> Result<()> {
        for layer in [CATCHMENT_FILL, CATCHMENT_LINE] {
            engine.set_filter(layer, Some(filter))?;
            engine.set_visibility(layer, Visibility::Visible)?;
        }

        let school_filter = (!school_levels.is_empty()).then(|| {
            let mut any = vec![json!("any")];
            any.extend(school_levels.iter().map(|level| json!(["==", ["get", "level"], level])));
            Value::Array(any)
        });
        for layer in [SCHOOL_POINTS, SCHOOL_LABELS] {
            engine.set_filter(layer, school_filter.as_ref())?;
            engine.set_visibility(layer, Visibility::from_bool(school_filter.is_some()))?;
        }
        Ok(())
    }

    /// Hide every catchment and school layer that exists.
    pub fn hide(&self, engine: &mut dyn MapEngine) -> Result<()> {
        for layer in Self::LAYER_IDS {
            if engine.has_layer(layer) {
                engine.set_visibility(layer, Visibility::None)?;
            }
        }
        Ok(())
    }

    /// Remove listeners, layers and sources. Failures are logged; teardown always runs to the end.
    pub fn teardown(&mut self, engine: &mut dyn MapEngine) {
        if self.subscribed {
            for kind in PointerEventKind::ALL {
                if let Err(e) = engine.unsubscribe(kind, CATCHMENT_FILL) {
                    warn!(error = %e, "could not remove catchment listener");
                }
            }
            self.subscribed = false;
        }

        for layer in Self::LAYER_IDS {
            if engine.has_layer(layer) {
                if let Err(e) = engine.remove_layer(layer) {
                    warn!(error = %e, layer, "could not remove layer");
                }
            }
        }

        for source in [&self.config.source_id, &self.config.schools_source_id] {
            if engine.has_source(source) {
                if let Err(e) = engine.remove_source(source) {
                    warn!(error = %e, source = %source, "could not remove source");
                }
            }
        }
    }
}
