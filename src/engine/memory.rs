use std::collections::BTreeMap;

use ahash::{AHashMap, AHashSet};
use anyhow::{anyhow, bail, ensure, Result};
use geo::{Point, Rect};
use serde_json::Value;

use super::{
    Cursor, FeatureRef, LayerSpec, MapEngine, MoveTag, PointerEventKind, RenderedFeature,
    ScreenPoint, SourceSpec, StateFlag, Visibility,
};
use crate::types::LocalityId;

/// Camera commands recorded by [`MemoryEngine`].
#[derive(Debug, Clone, PartialEq)]
pub enum CameraCall {
    FlyTo { center: Point<f64>, zoom: f64, duration_ms: u32, tag: MoveTag },
    FitBounds { bounds: Rect<f64>, padding: f64, max_zoom: f64, duration_ms: u32, tag: MoveTag },
    ZoomTo { zoom: f64, duration_ms: u32, tag: MoveTag },
}

/// A rendered-feature fixture, optionally pinned to a screen position.
#[derive(Debug, Clone)]
struct Fixture {
    at: Option<ScreenPoint>,
    feature: RenderedFeature,
}

/// Deterministic in-memory engine.
///
/// Behaves like the browser engine where the overlay depends on it: writes fail until the style is
/// loaded, a source cannot be removed while layers still use it, layers only render at or above
/// their min zoom and only while visible, and (in strict mode) feature state can only be written to
/// ids present in the addressed source layer.
#[derive(Debug, Default)]
pub struct MemoryEngine {
    style_loaded: bool,
    zoom: f64,
    base_layers: Vec<String>,
    sources: BTreeMap<String, SourceSpec>,
    layers: Vec<LayerSpec>, // bottom to top
    visibility: AHashMap<String, Visibility>,
    filters: AHashMap<String, Value>,
    rejected_filters: AHashSet<String>,
    feature_states: AHashMap<(FeatureRef, StateFlag), bool>,
    known_features: Option<AHashSet<(String, LocalityId)>>, // (source_layer, id) when strict
    fixtures: Vec<Fixture>,
    source_fixtures: Vec<RenderedFeature>,
    subscriptions: Vec<(PointerEventKind, String)>,
    cursor: Cursor,
    camera: Vec<CameraCall>,
    journal: Vec<String>,
}

impl MemoryEngine {
    /// Engine whose style has finished loading, showing `base_layers`.
    pub fn loaded(base_layers: &[&str]) -> Self {
        Self {
            style_loaded: true,
            zoom: 3.5,
            base_layers: base_layers.iter().map(|s| s.to_string()).collect(),
            ..Self::default()
        }
    }

    /// Engine that is still loading its style; layer and source writes fail until [`Self::finish_loading`].
    pub fn loading(base_layers: &[&str]) -> Self {
        Self { style_loaded: false, ..Self::loaded(base_layers) }
    }

    pub fn finish_loading(&mut self) { self.style_loaded = true; }

    pub fn set_zoom(&mut self, zoom: f64) { self.zoom = zoom; }

    /// Reject feature-state writes for ids not registered with [`Self::add_known_feature`].
    pub fn strict_feature_ids(mut self) -> Self {
        self.known_features = Some(AHashSet::new());
        self
    }

    /// Make every filter written to `layer` fail, as the browser engine does for an invalid expression.
    pub fn reject_filter(&mut self, layer: &str) {
        self.rejected_filters.insert(layer.to_string());
    }

    pub fn add_known_feature(&mut self, source_layer: &str, id: impl Into<LocalityId>) {
        if let Some(known) = self.known_features.as_mut() {
            known.insert((source_layer.to_string(), id.into()));
        }
    }

    /// Make `feature` answer rendered-feature queries (at `at` only, when given).
    pub fn add_rendered(&mut self, feature: RenderedFeature, at: Option<ScreenPoint>) {
        self.fixtures.push(Fixture { at, feature });
    }

    pub fn add_source_feature(&mut self, feature: RenderedFeature) {
        self.source_fixtures.push(feature);
    }

    /// Current value of a feature-state flag (unset reads as `false`).
    pub fn feature_state(&self, source: &str, source_layer: &str, id: &str, flag: StateFlag) -> bool {
        let key = FeatureRef { source: source.to_string(), source_layer: source_layer.to_string(), id: LocalityId::new(id) };
        self.feature_states.get(&(key, flag)).copied().unwrap_or(false)
    }

    /// All features that currently have `flag` set.
    pub fn flagged(&self, flag: StateFlag) -> Vec<FeatureRef> {
        let mut out: Vec<FeatureRef> = self.feature_states.iter()
            .filter(|((_, f), value)| *f == flag && **value)
            .map(|((feature, _), _)| feature.clone())
            .collect();
        out.sort_by(|a, b| (&a.source_layer, &a.id).cmp(&(&b.source_layer, &b.id)));
        out
    }

    pub fn layer(&self, id: &str) -> Option<&LayerSpec> { self.layers.iter().find(|l| l.id == id) }

    /// Ids of the layers added on top of the base style, bottom to top.
    pub fn added_layer_ids(&self) -> Vec<&str> { self.layers.iter().map(|l| l.id.as_str()).collect() }

    pub fn visibility(&self, layer: &str) -> Option<Visibility> {
        self.layer(layer)?;
        Some(self.visibility.get(layer).copied().unwrap_or(Visibility::Visible))
    }

    pub fn filter(&self, layer: &str) -> Option<&Value> { self.filters.get(layer) }

    pub fn subscriptions(&self) -> &[(PointerEventKind, String)] { &self.subscriptions }

    pub fn cursor(&self) -> Cursor { self.cursor }

    pub fn camera_calls(&self) -> &[CameraCall] { &self.camera }

    /// Ordered log of structural operations (`add-source`, `add-layer`, `on`, `off`, ...).
    pub fn journal(&self) -> &[String] { &self.journal }

    fn is_rendered(&self, layer_id: &str) -> bool {
        let Some(layer) = self.layer(layer_id) else { return false };
        layer.min_zoom.is_none_or(|min| self.zoom >= min)
            && self.visibility(layer_id) == Some(Visibility::Visible)
    }
}

impl MapEngine for MemoryEngine {
    fn is_style_loaded(&self) -> bool { self.style_loaded }

    fn zoom(&self) -> f64 { self.zoom }

    fn style_layer_ids(&self) -> Vec<String> {
        self.base_layers.iter().cloned()
            .chain(self.layers.iter().map(|l| l.id.clone()))
            .collect()
    }

    fn has_source(&self, id: &str) -> bool { self.sources.contains_key(id) }

    fn add_source(&mut self, id: &str, source: &SourceSpec) -> Result<()> {
        ensure!(self.style_loaded, "Style is not done loading");
        ensure!(!self.sources.contains_key(id), "There is already a source with ID \"{id}\"");
        self.sources.insert(id.to_string(), source.clone());
        self.journal.push(format!("add-source {id}"));
        Ok(())
    }

    fn remove_source(&mut self, id: &str) -> Result<()> {
        if let Some(layer) = self.layers.iter().find(|l| l.source == id) {
            bail!("Source \"{id}\" cannot be removed while layer \"{}\" is using it", layer.id);
        }
        self.sources.remove(id).ok_or_else(|| anyhow!("There is no source with ID \"{id}\""))?;
        self.journal.push(format!("remove-source {id}"));
        Ok(())
    }

    fn has_layer(&self, id: &str) -> bool { self.layer(id).is_some() }

    fn add_layer(&mut self, layer: &LayerSpec, before: Option<&str>) -> Result<()> {
        ensure!(self.style_loaded, "Style is not done loading");
        ensure!(!self.has_layer(&layer.id), "Layer with id \"{}\" already exists on this map", layer.id);
        ensure!(self.sources.contains_key(&layer.source), "Source \"{}\" not found", layer.source);

        // Base-style layers sit below everything added here, so inserting before one of them
        // lands at the bottom of the added stack.
        let index = match before {
            Some(id) if self.base_layers.iter().any(|l| l == id) => 0,
            Some(id) => self.layers.iter().position(|l| l.id == id).unwrap_or(self.layers.len()),
            None => self.layers.len(),
        };
        if layer.initially_hidden() {
            self.visibility.insert(layer.id.clone(), Visibility::None);
        }
        if let Some(filter) = &layer.filter {
            self.filters.insert(layer.id.clone(), filter.clone());
        }
        self.layers.insert(index, layer.clone());
        self.journal.push(format!("add-layer {}", layer.id));
        Ok(())
    }

    fn remove_layer(&mut self, id: &str) -> Result<()> {
        let index = self.layers.iter().position(|l| l.id == id)
            .ok_or_else(|| anyhow!("The layer \"{id}\" does not exist in the map's style"))?;
        self.layers.remove(index);
        self.visibility.remove(id);
        self.filters.remove(id);
        self.journal.push(format!("remove-layer {id}"));
        Ok(())
    }

    fn set_visibility(&mut self, layer: &str, visibility: Visibility) -> Result<()> {
        ensure!(self.has_layer(layer), "The layer \"{layer}\" does not exist in the map's style");
        self.visibility.insert(layer.to_string(), visibility);
        Ok(())
    }

    fn set_filter(&mut self, layer: &str, filter: Option<&Value>) -> Result<()> {
        ensure!(self.has_layer(layer), "The layer \"{layer}\" does not exist in the map's style");
        if filter.is_some() && self.rejected_filters.contains(layer) {
            bail!("layers.{layer}.filter: invalid filter expression");
        }
        match filter {
            Some(filter) => { self.filters.insert(layer.to_string(), filter.clone()); }
            None => { self.filters.remove(layer); }
        }
        Ok(())
    }

    fn set_feature_state(&mut self, feature: &FeatureRef, flag: StateFlag, value: bool) -> Result<()> {
        ensure!(self.sources.contains_key(&feature.source), "The source \"{}\" does not exist in the map's style", feature.source);
        if let Some(known) = &self.known_features {
            ensure!(
                known.contains(&(feature.source_layer.clone(), feature.id.clone())),
                "Feature \"{}\" does not exist in source layer \"{}\"", feature.id, feature.source_layer
            );
        }
        self.feature_states.insert((feature.clone(), flag), value);
        Ok(())
    }

    fn query_rendered_features(&self, at: Option<ScreenPoint>, layers: &[&str]) -> Result<Vec<RenderedFeature>> {
        // Topmost layer first, like the browser engine.
        let mut hits: Vec<(usize, RenderedFeature)> = self.fixtures.iter()
            .filter(|fx| layers.contains(&fx.feature.layer.as_str()))
            .filter(|fx| self.is_rendered(&fx.feature.layer))
            .filter(|fx| match (at, fx.at) {
                (Some(query), Some(pinned)) => query == pinned,
                _ => true,
            })
            .map(|fx| {
                let depth = self.layers.iter().position(|l| l.id == fx.feature.layer).unwrap_or(0);
                (depth, fx.feature.clone())
            })
            .collect();
        hits.sort_by(|a, b| b.0.cmp(&a.0));
        Ok(hits.into_iter().map(|(_, f)| f).collect())
    }

    fn query_source_features(&self, source: &str, source_layer: &str) -> Result<Vec<RenderedFeature>> {
        ensure!(self.sources.contains_key(source), "The source \"{source}\" does not exist in the map's style");
        Ok(self.source_fixtures.iter()
            .filter(|f| f.source_layer.as_deref() == Some(source_layer))
            .cloned()
            .collect())
    }

    fn fly_to(&mut self, center: Point<f64>, zoom: f64, duration_ms: u32, tag: MoveTag) -> Result<()> {
        self.zoom = zoom;
        self.camera.push(CameraCall::FlyTo { center, zoom, duration_ms, tag });
        Ok(())
    }

    fn fit_bounds(&mut self, bounds: Rect<f64>, padding: f64, max_zoom: f64, duration_ms: u32, tag: MoveTag) -> Result<()> {
        // No viewport to fit against; the boxes searched for are small enough to hit the cap.
        self.zoom = max_zoom;
        self.camera.push(CameraCall::FitBounds { bounds, padding, max_zoom, duration_ms, tag });
        Ok(())
    }

    fn zoom_to(&mut self, zoom: f64, duration_ms: u32, tag: MoveTag) -> Result<()> {
        self.zoom = zoom;
        self.camera.push(CameraCall::ZoomTo { zoom, duration_ms, tag });
        Ok(())
    }

    fn set_cursor(&mut self, cursor: Cursor) { self.cursor = cursor; }

    fn subscribe(&mut self, kind: PointerEventKind, layer: &str) -> Result<()> {
        self.subscriptions.push((kind, layer.to_string()));
        self.journal.push(format!("on {} {layer}", kind.to_str()));
        Ok(())
    }

    fn unsubscribe(&mut self, kind: PointerEventKind, layer: &str) -> Result<()> {
        let index = self.subscriptions.iter().position(|(k, l)| *k == kind && l == layer)
            .ok_or_else(|| anyhow!("no {} listener on {layer}", kind.to_str()))?;
        self.subscriptions.remove(index);
        self.journal.push(format!("off {} {layer}", kind.to_str()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::engine::LayerKind;

    fn fill(id: &str, min_zoom: f64) -> LayerSpec {
        LayerSpec::new(id, LayerKind::Fill, "src", "layer").min_zoom(min_zoom)
    }

    #[test]
    fn writes_fail_until_style_loads() {
        let mut engine = MemoryEngine::loading(&["water"]);
        assert!(engine.add_source("src", &SourceSpec::vector("mapbox://x")).is_err());

        engine.finish_loading();
        engine.add_source("src", &SourceSpec::vector("mapbox://x")).unwrap();
        engine.add_layer(&fill("a", 0.0), None).unwrap();
        assert!(engine.has_layer("a"));
    }

    #[test]
    fn source_removal_requires_layers_gone() {
        let mut engine = MemoryEngine::loaded(&[]);
        engine.add_source("src", &SourceSpec::vector("mapbox://x")).unwrap();
        engine.add_layer(&fill("a", 0.0), None).unwrap();

        assert!(engine.remove_source("src").is_err());
        engine.remove_layer("a").unwrap();
        engine.remove_source("src").unwrap();
    }

    #[test]
    fn insertion_before_base_layer_goes_below_added_layers() {
        let mut engine = MemoryEngine::loaded(&["water", "poi-label"]);
        engine.add_source("src", &SourceSpec::vector("mapbox://x")).unwrap();
        engine.add_layer(&fill("a", 0.0), None).unwrap();
        engine.add_layer(&fill("b", 0.0), Some("water")).unwrap();
        assert_eq!(engine.added_layer_ids(), vec!["b", "a"]);
    }

    #[test]
    fn rendered_queries_respect_min_zoom_and_visibility() {
        let mut engine = MemoryEngine::loaded(&[]);
        engine.add_source("src", &SourceSpec::vector("mapbox://x")).unwrap();
        engine.add_layer(&fill("low", 5.0), None).unwrap();
        engine.add_layer(&fill("high", 12.0), None).unwrap();
        for layer in ["low", "high"] {
            engine.add_rendered(RenderedFeature { layer: layer.into(), properties: json!({"n": layer}).as_object().unwrap().clone(), ..Default::default() }, None);
        }

        engine.set_zoom(8.0);
        let hits = engine.query_rendered_features(None, &["low", "high"]).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].layer, "low");

        engine.set_zoom(13.0);
        let hits = engine.query_rendered_features(None, &["low", "high"]).unwrap();
        assert_eq!(hits.iter().map(|f| f.layer.as_str()).collect::<Vec<_>>(), vec!["high", "low"]);

        engine.set_visibility("high", Visibility::None).unwrap();
        assert_eq!(engine.query_rendered_features(None, &["high"]).unwrap().len(), 0);
    }

    #[test]
    fn strict_mode_rejects_unknown_feature_ids() {
        let mut engine = MemoryEngine::loaded(&[]).strict_feature_ids();
        engine.add_source("src", &SourceSpec::vector("mapbox://x")).unwrap();
        engine.add_known_feature("layer", "loc1");

        let known = FeatureRef { source: "src".into(), source_layer: "layer".into(), id: "loc1".into() };
        let unknown = FeatureRef { id: "loc2".into(), ..known.clone() };
        engine.set_feature_state(&known, StateFlag::Hover, true).unwrap();
        assert!(engine.set_feature_state(&unknown, StateFlag::Hover, true).is_err());
        assert!(engine.feature_state("src", "layer", "loc1", StateFlag::Hover));
    }
}
