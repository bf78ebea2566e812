use std::collections::VecDeque;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::{
    notice::{LocalityPreview, OverlayMode, OverlayNotice},
    timers::{Deferred, Timers},
};
use crate::{
    catchments::{all_rules, compile, CatchmentDetails, CatchmentSelection, Category, FilterExpression},
    config::{LocalitiesConfig, OverlayConfig},
    engine::{Cursor, EngineEvent, MapEngine, MoveTag, PointerEventKind, RenderedFeature, ScreenPoint, Visibility},
    features::FeatureStateTracker,
    layers::{CatchmentLayerSet, InitGuard, LayerRegistry, LocalityLayer, RegistryStatus, CATCHMENT_FILL},
    search::{find_rendered_match, GeocodeError, Geocoder, PlaceCandidate, ScoreProvider, SearchOutcome, SearchPipeline, SearchRequest},
    types::{LocalityId, Millis, StateCode, Tier},
};

/// Options of the quick catchment toggle: which categories to show.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CatchmentToggle {
    pub primary: bool,
    pub secondary: bool,
    /// NSW future catchments.
    pub future: bool,
}

/// Top-level coordinator: owns the engine handle once attached, routes engine events to the
/// registry, tracker and search pipeline, and exposes the commands the page calls.
///
/// Time never advances on its own. The host passes a timestamp with every event and calls
/// [`OverlayController::tick`] periodically so deferred work (hover clearing after a click,
/// fallback timeouts) can run. Commands never fail: without an engine they log and do nothing.
pub struct OverlayController<E: MapEngine> {
    config: OverlayConfig,
    engine: Option<E>,
    registry: LayerRegistry,
    catchment_layers: CatchmentLayerSet,
    tracker: FeatureStateTracker,
    search: SearchPipeline,
    timers: Timers,
    notices: VecDeque<OverlayNotice>,
    mode: OverlayMode,
}

impl<E: MapEngine> std::fmt::Debug for OverlayController<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OverlayController")
            .field("attached", &self.engine.is_some())
            .field("mode", &self.mode)
            .field("tracker", &self.tracker)
            .field("search", &self.search)
            .finish_non_exhaustive()
    }
}

fn detached(command: &str) {
    warn!(command, "map engine not attached, ignoring command");
}

impl<E: MapEngine> OverlayController<E> {
    pub fn new(config: OverlayConfig) -> Result<Self> {
        Self::with_guard(config, InitGuard::new())
    }

    /// Controller whose locality layers are initialized at most once across every controller
    /// sharing `guard`.
    pub fn with_guard(config: OverlayConfig, guard: InitGuard) -> Result<Self> {
        Ok(Self {
            registry: LayerRegistry::new(&config, guard),
            catchment_layers: CatchmentLayerSet::new(&config.catchments),
            tracker: FeatureStateTracker::new(&config.localities.source_id, config.timings.hover_throttle_ms),
            search: SearchPipeline::new(&config).context("Failed to build search pipeline")?,
            timers: Timers::new(),
            notices: VecDeque::new(),
            mode: OverlayMode::Suburbs,
            engine: None,
            config,
        })
    }

    /// Replace the placeholder locality scores.
    pub fn with_score_provider(mut self, provider: impl ScoreProvider + 'static) -> Self {
        self.search = self.search.with_score_provider(provider);
        self
    }

    #[inline] pub fn config(&self) -> &OverlayConfig { &self.config }
    #[inline] pub fn mode(&self) -> OverlayMode { self.mode }
    #[inline] pub fn is_attached(&self) -> bool { self.engine.is_some() }
    #[inline] pub fn engine(&self) -> Option<&E> { self.engine.as_ref() }
    #[inline] pub fn engine_mut(&mut self) -> Option<&mut E> { self.engine.as_mut() }
    #[inline] pub fn registry(&self) -> &LayerRegistry { &self.registry }
    #[inline] pub fn tracker(&self) -> &FeatureStateTracker { &self.tracker }
    #[inline] pub fn search(&self) -> &SearchPipeline { &self.search }

    /// Take ownership of the engine and mount the locality layers (now, or once the style loads).
    /// An engine already attached is detached first and dropped.
    pub fn attach(&mut self, mut engine: E, now: Millis) -> RegistryStatus {
        if self.detach().is_some() {
            debug!("dropped previously attached engine");
        }
        let status = self.registry.mount(&mut engine, now);
        info!(?status, zoom = engine.zoom(), "overlay attached");
        self.engine = Some(engine);
        status
    }

    /// Tear everything down (listeners, then layers, then sources) and hand the engine back.
    pub fn detach(&mut self) -> Option<E> {
        let mut engine = self.engine.take()?;
        self.tracker.clear_hover(&mut engine);
        self.tracker.clear_search_highlight(&mut engine);
        self.catchment_layers.teardown(&mut engine);
        self.registry.cleanup(&mut engine);
        self.tracker.forget();
        self.search.cancel();
        self.timers.clear();
        self.mode = OverlayMode::Suburbs;
        info!("overlay detached");
        Some(engine)
    }

    /// Queued notices, oldest first.
    pub fn drain_notices(&mut self) -> Vec<OverlayNotice> { self.notices.drain(..).collect() }

    pub fn handle_event(&mut self, event: EngineEvent, now: Millis) {
        let Some(engine) = self.engine.as_mut() else {
            debug!(?event, "engine event before attach, ignoring");
            return;
        };
        match event {
            EngineEvent::StyleData | EngineEvent::Load => {
                self.registry.on_style_data(engine, now);
            }
            EngineEvent::MoveEnd { tag } => self.on_move_end(tag),
            EngineEvent::Pointer { kind, layer, point } => {
                if CatchmentLayerSet::owns_layer(&layer) {
                    self.on_catchment_pointer(kind, point);
                } else if LocalityLayer::parse(&layer).is_some() {
                    self.on_locality_pointer(kind, point, now);
                } else {
                    debug!(layer = %layer, "pointer event on a layer the overlay does not own");
                }
            }
        }
    }

    /// Run deferred work that is due at `now`.
    pub fn tick(&mut self, now: Millis) {
        let Some(engine) = self.engine.as_mut() else { return };
        self.registry.poll(engine, now);
        for task in self.timers.due(now) {
            match task {
                Deferred::ClearHover => {
                    self.tracker.clear_hover(engine);
                }
            }
        }
        if let Some(name) = self.search.take_expired(now) {
            debug!(name = %name, "no move-end notification, highlighting anyway");
            self.highlight_searched_suburb(&name);
        }
    }

    fn on_move_end(&mut self, tag: Option<MoveTag>) {
        let Some(engine) = self.engine.as_mut() else { return };
        let zoom = engine.zoom();
        if self.tracker.on_zoom(engine, zoom) {
            debug!(zoom, "zoom tier changed, hover cleared");
        }
        if let Some(name) = self.search.take_on_move_end(tag) {
            self.highlight_searched_suburb(&name);
        }
    }

    fn on_locality_pointer(&mut self, kind: PointerEventKind, point: ScreenPoint, now: Millis) {
        let Some(engine) = self.engine.as_mut() else { return };
        let localities = &self.config.localities;
        match kind {
            PointerEventKind::MouseMove => {
                if !self.tracker.admit_move(now) { return }
                let Some(tier) = Tier::for_zoom(engine.zoom()) else {
                    self.tracker.clear_hover(engine);
                    return;
                };
                match feature_at(&*engine, tier, point).and_then(|f| locality_id(&f, localities)) {
                    Some(id) => { self.tracker.set_hover(engine, &id, tier); }
                    None => { self.tracker.clear_hover(engine); }
                }
            }
            PointerEventKind::MouseLeave => {
                self.tracker.clear_hover(engine);
            }
            PointerEventKind::Click => {
                let Some(tier) = Tier::for_zoom(engine.zoom()) else { return };
                let Some(feature) = feature_at(&*engine, tier, point) else { return };
                let Some(code) = locality_id(&feature, localities) else {
                    debug!(tier = tier.layer_suffix(), "clicked locality has no id");
                    return;
                };

                self.timers.schedule(now + self.config.timings.click_clear_delay_ms, Deferred::ClearHover);
                self.tracker.highlight(engine, &code, Some(tier));

                let name = feature.property_str(&localities.name_property).unwrap_or_default();
                let state = feature.property_str(&localities.state_property).unwrap_or_default();
                let score = self.search.score_provider().score(&name);
                info!(locality = %code, name = %name, state = %state, "locality selected");
                self.notices.push_back(OverlayNotice::LocalitySelected(LocalityPreview { name, state, code, score, position: point }));
            }
        }
    }

    fn on_catchment_pointer(&mut self, kind: PointerEventKind, point: ScreenPoint) {
        let Some(engine) = self.engine.as_mut() else { return };
        match kind {
            PointerEventKind::MouseMove => engine.set_cursor(Cursor::Pointer),
            PointerEventKind::MouseLeave => engine.set_cursor(Cursor::Default),
            PointerEventKind::Click => {
                let feature = match engine.query_rendered_features(Some(point), &[CATCHMENT_FILL]) {
                    Ok(features) => features.into_iter().next(),
                    Err(e) => {
                        warn!(error = %e, "catchment query failed");
                        None
                    }
                };
                let Some(feature) = feature else { return };
                let details = CatchmentDetails::from_properties(&feature.properties);
                info!(catchment = %details.display_name, school_type = %details.school_type, "catchment selected");
                self.notices.push_back(OverlayNotice::CatchmentSelected(details));
            }
        }
    }

    /// Geocode `name` (optionally narrowed by a state hint), move the camera there and highlight
    /// the locality once the camera settles.
    pub fn zoom_to_suburb(&mut self, geocoder: &dyn Geocoder, name: &str, state_hint: Option<&str>, now: Millis) -> Option<SearchOutcome> {
        let request = self.begin_search(name, state_hint)?;
        let result = geocoder.geocode(&request.query);
        self.complete_search(request.seq, result, now)
    }

    /// First half of [`Self::zoom_to_suburb`] for hosts that geocode asynchronously.
    pub fn begin_search(&mut self, name: &str, state_hint: Option<&str>) -> Option<SearchRequest> {
        if self.engine.is_none() {
            detached("zoomToSuburb");
            return None;
        }
        if name.trim().is_empty() {
            debug!("empty search, ignoring");
            return None;
        }
        Some(self.search.begin(name, state_hint))
    }

    /// Second half of [`Self::zoom_to_suburb`]. `None` when `seq` was superseded.
    ///
    /// The camera move is tagged with `seq`; only the move-end carrying that tag highlights.
    pub fn complete_search(&mut self, seq: u64, result: Result<Vec<PlaceCandidate>, GeocodeError>, now: Millis) -> Option<SearchOutcome> {
        let outcome = self.search.complete(seq, result)?;
        match &outcome {
            SearchOutcome::Resolved { query, candidate, camera, score, .. } => {
                match self.engine.as_mut() {
                    Some(engine) => match camera.apply(engine, seq) {
                        Ok(()) => self.search.await_move(seq, query, camera, now),
                        Err(e) => warn!(error = %e, query = %query, "camera move failed"),
                    },
                    None => detached("zoomToSuburb"),
                }
                self.notices.push_back(OverlayNotice::SearchResolved {
                    query: query.clone(),
                    place_name: candidate.place_name.clone(),
                    score: *score,
                });
            }
            SearchOutcome::NotFound { query, message } => {
                self.notices.push_back(OverlayNotice::SearchFailed { query: query.clone(), message: message.clone() });
            }
        }
        Some(outcome)
    }

    /// Highlight the rendered locality (topmost tier only) whose name contains `name`.
    pub fn highlight_searched_suburb(&mut self, name: &str) -> bool {
        let Some(engine) = self.engine.as_mut() else {
            detached("highlightSearchedSuburb");
            return false;
        };
        let Some((code, tier)) = find_rendered_match(&*engine, &self.config.localities, name) else {
            debug!(name, "no rendered locality matches the searched name");
            return false;
        };
        if !self.tracker.highlight(engine, &code, Some(tier)) { return false }
        self.notices.push_back(OverlayNotice::LocalityHighlighted { code, tier });
        true
    }

    pub fn clear_search_highlight(&mut self) -> bool {
        let Some(engine) = self.engine.as_mut() else {
            detached("clearSearchHighlight");
            return false;
        };
        self.tracker.clear_search_highlight(engine)
    }

    /// Highlight a locality by code when its tier is unknown.
    pub fn highlight_by_code(&mut self, code: &str) -> bool {
        let Some(engine) = self.engine.as_mut() else {
            detached("highlightByCode");
            return false;
        };
        let code = LocalityId::from(code);
        if !self.tracker.highlight(engine, &code, None) { return false }
        if let Some(tier) = self.tracker.search_highlight().and_then(|h| h.tiers.first().copied()) {
            self.notices.push_back(OverlayNotice::LocalityHighlighted { code, tier });
        }
        true
    }

    /// Show whole categories of catchments, or the suburbs when nothing is enabled.
    pub fn toggle_catchments(&mut self, toggle: CatchmentToggle) -> bool {
        let mut selection = CatchmentSelection::new();
        selection.set_global(Category::Primary, toggle.primary);
        selection.set_global(Category::Secondary, toggle.secondary);
        if toggle.future {
            selection.set_type(StateCode::Nsw, "Future", true);
        }
        self.apply_catchments_filter(compile(&selection).as_ref())
    }

    /// Switch to catchments filtered by `filter`, or back to suburbs for `None`. The two layer
    /// sets are never visible together; a switch that fails part way falls back to suburbs.
    pub fn apply_catchments_filter(&mut self, filter: Option<&FilterExpression>) -> bool {
        let Some(engine) = self.engine.as_mut() else {
            detached("applyCatchmentsFilter");
            return false;
        };

        let previous = self.mode;
        self.mode = OverlayMode::Transitioning;
        let (target, result) = match filter {
            Some(filter) => {
                self.tracker.clear_hover(engine);
                (OverlayMode::Catchments, enter_catchments(&mut self.catchment_layers, engine, filter))
            }
            None => (OverlayMode::Suburbs, enter_suburbs(&self.catchment_layers, engine)),
        };

        match result {
            Ok(()) => {
                self.mode = target;
                if previous != target {
                    info!(mode = ?target, "overlay mode changed");
                    self.notices.push_back(OverlayNotice::ModeChanged { mode: target });
                }
                true
            }
            Err(e) => {
                warn!(error = %e, mode = ?target, "could not switch overlay mode, falling back to suburbs");
                self.mode = match enter_suburbs(&self.catchment_layers, engine) {
                    Ok(()) => OverlayMode::Suburbs,
                    Err(e) => {
                        warn!(error = %e, "could not restore suburbs");
                        previous
                    }
                };
                if self.mode != previous {
                    self.notices.push_back(OverlayNotice::ModeChanged { mode: self.mode });
                }
                false
            }
        }
    }

    /// Back to suburbs.
    #[inline] pub fn reset(&mut self) -> bool { self.apply_catchments_filter(None) }

    /// Number of features per tier currently loaded in the localities source.
    pub fn source_feature_counts(&self) -> Vec<(Tier, usize)> {
        let Some(engine) = self.engine.as_ref() else {
            detached("sourceFeatureCounts");
            return Vec::new();
        };
        Tier::ALL.into_iter()
            .filter_map(|tier| match engine.query_source_features(self.registry.source_id(), tier.source_layer()) {
                Ok(features) => Some((tier, features.len())),
                Err(e) => {
                    debug!(error = %e, tier = tier.layer_suffix(), "source feature query failed");
                    None
                }
            })
            .collect()
    }
}

/// Topmost interactive locality feature of `tier` under `point`.
fn feature_at(engine: &dyn MapEngine, tier: Tier, point: ScreenPoint) -> Option<RenderedFeature> {
    let layers = LocalityLayer::interactive_ids(tier);
    let layers: Vec<&str> = layers.iter().map(String::as_str).collect();
    match engine.query_rendered_features(Some(point), &layers) {
        Ok(features) => features.into_iter().next(),
        Err(e) => {
            debug!(error = %e, tier = tier.layer_suffix(), "rendered feature query failed");
            None
        }
    }
}

fn locality_id(feature: &RenderedFeature, localities: &LocalitiesConfig) -> Option<LocalityId> {
    feature.id.clone()
        .or_else(|| feature.property_str(&localities.id_property))
        .map(LocalityId::from)
}

fn set_locality_visibility(engine: &mut dyn MapEngine, visibility: Visibility) -> Result<()> {
    for id in LocalityLayer::all_ids() {
        if engine.has_layer(&id) {
            engine.set_visibility(&id, visibility).with_context(|| format!("set visibility of {id}"))?;
        }
    }
    Ok(())
}

/// School point levels matching the catchment types in `filter`.
fn school_levels(filter: &FilterExpression) -> Vec<&'static str> {
    let names = filter.type_names();
    Category::ALL.into_iter()
        .filter(|category| {
            names.iter().any(|name| {
                all_rules().iter().any(|rules| rules.school_type(name).is_some_and(|t| t.category == Some(*category)))
            })
        })
        .map(|category| category.school_level())
        .collect()
}

fn enter_catchments(layers: &mut CatchmentLayerSet, engine: &mut dyn MapEngine, filter: &FilterExpression) -> Result<()> {
    layers.ensure(engine)?;
    set_locality_visibility(engine, Visibility::None)?;
    layers.show(engine, &filter.to_json(), &school_levels(filter))
}

fn enter_suburbs(layers: &CatchmentLayerSet, engine: &mut dyn MapEngine) -> Result<()> {
    layers.hide(engine)?;
    set_locality_visibility(engine, Visibility::Visible)
}

#[cfg(test)]
mod tests {
    use geo::Point;
    use serde_json::json;

    use super::*;
    use crate::{
        engine::{CameraCall, MemoryEngine, StateFlag},
        layers::{CATCHMENT_LINE, SCHOOL_POINTS},
        search::GeocodeQuery,
    };

    const BASE: [&str; 3] = ["landcover", "water", "waterway-label"];

    fn attached(zoom: f64) -> OverlayController<MemoryEngine> {
        let mut engine = MemoryEngine::loaded(&BASE);
        engine.set_zoom(zoom);
        let mut controller = OverlayController::new(OverlayConfig::default()).unwrap();
        assert_eq!(controller.attach(engine, 0), RegistryStatus::Ready);
        controller
    }

    fn engine(c: &OverlayController<MemoryEngine>) -> &MemoryEngine { c.engine().unwrap() }

    fn locality(id: &str, layer: &str, name: &str) -> RenderedFeature {
        RenderedFeature {
            id: Some(id.to_string()),
            layer: layer.to_string(),
            properties: json!({ "LOC_NAME": name, "STATE": "QLD" }).as_object().cloned().unwrap(),
            ..Default::default()
        }
    }

    fn pointer(kind: PointerEventKind, layer: &str, point: ScreenPoint) -> EngineEvent {
        EngineEvent::Pointer { kind, layer: layer.to_string(), point }
    }

    fn place(place_name: &str, lng: f64, lat: f64) -> PlaceCandidate {
        PlaceCandidate {
            id: place_name.to_string(),
            text: place_name.split(',').next().unwrap_or_default().to_string(),
            place_name: place_name.to_string(),
            center: Point::new(lng, lat),
            bbox: None,
            place_types: Vec::new(),
            postcode: None,
        }
    }

    #[test]
    fn commands_are_noops_before_attach() {
        let mut c: OverlayController<MemoryEngine> = OverlayController::new(OverlayConfig::default()).unwrap();
        assert!(!c.highlight_by_code("QLD1"));
        assert!(!c.highlight_searched_suburb("Red Hill"));
        assert!(!c.clear_search_highlight());
        assert!(!c.toggle_catchments(CatchmentToggle { primary: true, ..Default::default() }));
        assert!(c.begin_search("Red Hill", None).is_none());
        assert!(c.source_feature_counts().is_empty());
        c.handle_event(EngineEvent::MoveEnd { tag: None }, 0);
        c.tick(1000);
        assert_eq!(c.mode(), OverlayMode::Suburbs);
        assert!(c.drain_notices().is_empty());
    }

    #[test]
    fn hover_follows_pointer_and_is_throttled() {
        let mut c = attached(10.5);
        let (a, b) = (ScreenPoint::new(10.0, 10.0), ScreenPoint::new(50.0, 50.0));
        let layer = LocalityLayer::Fill.id(Tier::Medium);
        let engine_mut = c.engine_mut().unwrap();
        engine_mut.add_rendered(locality("QLD100", &layer, "Ashgrove"), Some(a));
        engine_mut.add_rendered(locality("QLD200", &layer, "Bardon"), Some(b));

        c.handle_event(pointer(PointerEventKind::MouseMove, &layer, a), 0);
        assert!(engine(&c).feature_state("localities", "localities_z10_11", "QLD100", StateFlag::Hover));
        assert_eq!(engine(&c).cursor(), Cursor::Pointer);

        // Within the throttle window: ignored.
        c.handle_event(pointer(PointerEventKind::MouseMove, &layer, b), 5);
        assert_eq!(c.tracker().hovered().map(|h| h.id.as_str()), Some("QLD100"));

        c.handle_event(pointer(PointerEventKind::MouseMove, &layer, b), 40);
        assert!(!engine(&c).feature_state("localities", "localities_z10_11", "QLD100", StateFlag::Hover));
        assert!(engine(&c).feature_state("localities", "localities_z10_11", "QLD200", StateFlag::Hover));

        c.handle_event(pointer(PointerEventKind::MouseLeave, &layer, b), 60);
        assert!(engine(&c).flagged(StateFlag::Hover).is_empty());
        assert_eq!(engine(&c).cursor(), Cursor::Default);
    }

    #[test]
    fn zoom_tier_change_clears_hover() {
        let mut c = attached(8.0);
        let point = ScreenPoint::new(1.0, 1.0);
        let layer = LocalityLayer::Outline.id(Tier::Coarse);
        c.engine_mut().unwrap().add_rendered(locality("QLD100", &layer, "Ashgrove"), Some(point));
        c.handle_event(pointer(PointerEventKind::MouseMove, &layer, point), 0);
        assert!(c.tracker().hovered().is_some());

        c.engine_mut().unwrap().set_zoom(12.5);
        c.handle_event(EngineEvent::MoveEnd { tag: None }, 100);
        assert!(c.tracker().hovered().is_none());
        assert!(engine(&c).flagged(StateFlag::Hover).is_empty());
    }

    #[test]
    fn click_selects_locality_and_clears_hover_later() {
        let mut c = attached(12.0);
        let point = ScreenPoint::new(3.0, 4.0);
        let layer = LocalityLayer::Fill.id(Tier::Fine);
        c.engine_mut().unwrap().add_rendered(locality("QLD300", &layer, "Red Hill"), Some(point));

        c.handle_event(pointer(PointerEventKind::MouseMove, &layer, point), 0);
        c.handle_event(pointer(PointerEventKind::Click, &layer, point), 100);
        assert!(c.tracker().hovered().is_some());
        assert!(engine(&c).feature_state("localities", "localities_z12", "QLD300", StateFlag::Search));

        let notices = c.drain_notices();
        let [OverlayNotice::LocalitySelected(preview)] = notices.as_slice() else { panic!("unexpected notices: {notices:?}") };
        assert_eq!(preview.name, "Red Hill");
        assert_eq!(preview.state, "QLD");
        assert_eq!(preview.code.as_str(), "QLD300");
        assert_eq!(preview.score.score, 84);
        assert_eq!(preview.position, point);

        c.tick(149);
        assert!(c.tracker().hovered().is_some());
        c.tick(150);
        assert!(c.tracker().hovered().is_none());
    }

    #[test]
    fn clicks_below_the_coarsest_tier_are_ignored() {
        let mut c = attached(4.0);
        let point = ScreenPoint::new(0.0, 0.0);
        let layer = LocalityLayer::Fill.id(Tier::Coarse);
        c.engine_mut().unwrap().add_rendered(locality("QLD1", &layer, "Ashgrove"), Some(point));
        c.handle_event(pointer(PointerEventKind::Click, &layer, point), 0);
        assert!(c.drain_notices().is_empty());
    }

    #[test]
    fn search_flies_then_highlights_on_move_end() {
        let mut c = attached(4.0);
        let geocoder = |query: &GeocodeQuery| -> Result<Vec<PlaceCandidate>, GeocodeError> {
            assert_eq!(query.text, "Red Hill, QLD");
            Ok(vec![place("Red Hill, Queensland, Australia", 148.90, -21.50), place("Red Hill, Queensland, Australia", 152.99, -27.45)])
        };
        let outcome = c.zoom_to_suburb(&geocoder, "Red Hill", Some("QLD"), 1000).unwrap();
        let SearchOutcome::Resolved { candidate, .. } = outcome else { panic!("not resolved") };
        assert_eq!(candidate.center, Point::new(152.99, -27.45));
        assert_eq!(engine(&c).camera_calls(), &[CameraCall::FlyTo { center: Point::new(152.99, -27.45), zoom: 14.0, duration_ms: 1000, tag: 1 }]);

        let outline = LocalityLayer::Outline.id(Tier::Fine);
        c.engine_mut().unwrap().add_rendered(locality("QLD300", &outline, "RED HILL"), None);
        c.handle_event(EngineEvent::MoveEnd { tag: Some(1) }, 2000);
        assert!(engine(&c).feature_state("localities", "localities_z12", "QLD300", StateFlag::Search));

        let notices = c.drain_notices();
        assert!(matches!(&notices[0], OverlayNotice::SearchResolved { query, .. } if query == "Red Hill"));
        assert_eq!(notices[1], OverlayNotice::LocalityHighlighted { code: LocalityId::from("QLD300"), tier: Tier::Fine });
    }

    #[test]
    fn interrupted_flight_does_not_take_the_next_highlight() {
        let mut c = attached(4.0);
        let first = c.begin_search("Paddington", None).unwrap();
        c.complete_search(first.seq, Ok(vec![place("Paddington, Queensland, Australia", 152.99, -27.46)]), 0);
        let second = c.begin_search("Red Hill", None).unwrap();
        c.complete_search(second.seq, Ok(vec![place("Red Hill, Queensland, Australia", 152.99, -27.45)]), 10);

        // The first flight stops short when the second starts, and a pan is not a landing either.
        c.handle_event(EngineEvent::MoveEnd { tag: Some(first.seq) }, 20);
        c.handle_event(EngineEvent::MoveEnd { tag: None }, 30);
        assert_eq!(c.search().pending_highlight(), Some("Red Hill"));

        let outline = LocalityLayer::Outline.id(Tier::Fine);
        c.engine_mut().unwrap().add_rendered(locality("QLD2241", &outline, "Red Hill"), None);
        c.handle_event(EngineEvent::MoveEnd { tag: Some(second.seq) }, 1010);
        c.tick(5000);
        assert!(engine(&c).feature_state("localities", "localities_z12", "QLD2241", StateFlag::Search));
        assert_eq!(c.tracker().search_highlight().map(|h| h.id.as_str()), Some("QLD2241"));
    }

    #[test]
    fn failed_switch_to_catchments_keeps_suburbs_visible() {
        let mut c = attached(10.0);
        c.engine_mut().unwrap().reject_filter(CATCHMENT_FILL);
        assert!(!c.toggle_catchments(CatchmentToggle { primary: true, ..Default::default() }));

        assert_eq!(c.mode(), OverlayMode::Suburbs);
        for id in LocalityLayer::all_ids() {
            assert_eq!(engine(&c).visibility(&id), Some(Visibility::Visible), "{id}");
        }
        assert_eq!(engine(&c).visibility(CATCHMENT_FILL), Some(Visibility::None));
        assert_eq!(engine(&c).visibility(CATCHMENT_LINE), Some(Visibility::None));
        assert!(c.drain_notices().is_empty());
    }

    #[test]
    fn failed_filter_change_falls_back_to_suburbs() {
        let mut c = attached(10.0);
        assert!(c.toggle_catchments(CatchmentToggle { primary: true, ..Default::default() }));
        c.drain_notices();

        c.engine_mut().unwrap().reject_filter(CATCHMENT_FILL);
        assert!(!c.toggle_catchments(CatchmentToggle { secondary: true, ..Default::default() }));
        assert_eq!(c.mode(), OverlayMode::Suburbs);
        assert_eq!(c.drain_notices(), vec![OverlayNotice::ModeChanged { mode: OverlayMode::Suburbs }]);
        assert_eq!(engine(&c).visibility(CATCHMENT_FILL), Some(Visibility::None));
        assert!(LocalityLayer::all_ids().iter().all(|id| engine(&c).visibility(id) == Some(Visibility::Visible)));
    }

    #[test]
    fn reattach_moves_the_overlay_to_the_new_engine() {
        let mut c = attached(10.0);
        assert!(c.toggle_catchments(CatchmentToggle { primary: true, ..Default::default() }));

        assert_eq!(c.attach(MemoryEngine::loaded(&BASE), 0), RegistryStatus::Ready);
        assert_eq!(c.mode(), OverlayMode::Suburbs);
        let fresh = engine(&c);
        assert_eq!(fresh.added_layer_ids().len(), 9);
        assert!(fresh.layer(CATCHMENT_FILL).is_none());
        assert!(LocalityLayer::all_ids().iter().all(|id| fresh.visibility(id) == Some(Visibility::Visible)));
    }

    #[test]
    fn highlight_falls_back_without_move_end() {
        let mut c = attached(4.0);
        let request = c.begin_search("Ashgrove", None).unwrap();
        c.complete_search(request.seq, Ok(vec![place("Ashgrove, Queensland, Australia", 152.98, -27.44)]), 0);
        let outline = LocalityLayer::Outline.id(Tier::Fine);
        c.engine_mut().unwrap().add_rendered(locality("QLD7", &outline, "Ashgrove"), None);

        c.tick(1299);
        assert!(c.tracker().search_highlight().is_none());
        c.tick(1300);
        assert_eq!(c.tracker().search_highlight().map(|h| h.id.as_str()), Some("QLD7"));
    }

    #[test]
    fn failed_search_reports_and_leaves_camera() {
        let mut c = attached(4.0);
        let geocoder = |_: &GeocodeQuery| -> Result<Vec<PlaceCandidate>, GeocodeError> { Err(GeocodeError::Status(500)) };
        let outcome = c.zoom_to_suburb(&geocoder, "Nowhere", None, 0).unwrap();
        assert!(matches!(outcome, SearchOutcome::NotFound { .. }));
        assert!(engine(&c).camera_calls().is_empty());
        assert_eq!(c.drain_notices(), vec![OverlayNotice::SearchFailed {
            query: "Nowhere".into(),
            message: "Could not find \"Nowhere\". Please try a different search.".into(),
        }]);
    }

    #[test]
    fn highlight_by_code_tries_every_tier() {
        let mut engine = MemoryEngine::loaded(&BASE).strict_feature_ids();
        engine.set_zoom(12.0);
        engine.add_known_feature("localities_z6_9", "QLD9");
        let mut c = OverlayController::new(OverlayConfig::default()).unwrap();
        c.attach(engine, 0);

        assert!(c.highlight_by_code("QLD9"));
        assert_eq!(c.drain_notices(), vec![OverlayNotice::LocalityHighlighted { code: LocalityId::from("QLD9"), tier: Tier::Coarse }]);
        assert!(c.clear_search_highlight());
        assert!(!c.highlight_by_code("missing"));
    }

    #[test]
    fn catchment_modes_are_exclusive() {
        let mut c = attached(11.0);
        assert!(c.toggle_catchments(CatchmentToggle { primary: true, ..Default::default() }));
        assert_eq!(c.mode(), OverlayMode::Catchments);
        for id in LocalityLayer::all_ids() {
            assert_eq!(engine(&c).visibility(&id), Some(Visibility::None), "{id}");
        }
        assert_eq!(engine(&c).visibility(CATCHMENT_FILL), Some(Visibility::Visible));
        assert_eq!(engine(&c).visibility(CATCHMENT_LINE), Some(Visibility::Visible));
        assert_eq!(engine(&c).visibility(SCHOOL_POINTS), Some(Visibility::Visible));
        assert_eq!(engine(&c).filter(SCHOOL_POINTS), Some(&json!(["any", ["==", ["get", "level"], "primary"]])));

        assert!(c.reset());
        assert_eq!(c.mode(), OverlayMode::Suburbs);
        assert_eq!(engine(&c).visibility(CATCHMENT_FILL), Some(Visibility::None));
        for id in LocalityLayer::all_ids() {
            assert_eq!(engine(&c).visibility(&id), Some(Visibility::Visible), "{id}");
        }
        assert_eq!(c.drain_notices(), vec![
            OverlayNotice::ModeChanged { mode: OverlayMode::Catchments },
            OverlayNotice::ModeChanged { mode: OverlayMode::Suburbs },
        ]);
    }

    #[test]
    fn future_only_hides_school_points() {
        let mut c = attached(11.0);
        assert!(c.toggle_catchments(CatchmentToggle { future: true, ..Default::default() }));
        assert_eq!(engine(&c).visibility(SCHOOL_POINTS), Some(Visibility::None));
        assert_eq!(engine(&c).filter(CATCHMENT_FILL), Some(&json!(["any", ["any", ["all",
            ["==", ["get", "state"], "NSW"], ["==", ["get", "type"], "Future"]]]])));

        assert!(c.toggle_catchments(CatchmentToggle::default()));
        assert_eq!(c.mode(), OverlayMode::Suburbs);
    }

    #[test]
    fn catchment_click_reports_details() {
        let mut c = attached(11.0);
        c.toggle_catchments(CatchmentToggle { secondary: true, ..Default::default() });
        let point = ScreenPoint::new(7.0, 7.0);
        c.engine_mut().unwrap().add_rendered(RenderedFeature {
            id: None,
            layer: CATCHMENT_FILL.to_string(),
            properties: json!({ "type": "Secondary", "state": "VIC", "name": "Balwyn HS", "year_level": 7 }).as_object().cloned().unwrap(),
            ..Default::default()
        }, Some(point));
        c.drain_notices();

        c.handle_event(pointer(PointerEventKind::Click, CATCHMENT_FILL, point), 0);
        let notices = c.drain_notices();
        let [OverlayNotice::CatchmentSelected(details)] = notices.as_slice() else { panic!("unexpected notices: {notices:?}") };
        assert_eq!(details.display_name, "Balwyn HS");
        assert_eq!(details.grades, "Year 7");
    }

    #[test]
    fn switching_before_style_load_is_logged_not_fatal() {
        let mut c = OverlayController::new(OverlayConfig::default()).unwrap();
        assert_eq!(c.attach(MemoryEngine::loading(&BASE), 0), RegistryStatus::AwaitingStyle);
        assert!(!c.toggle_catchments(CatchmentToggle { primary: true, ..Default::default() }));
        assert_eq!(c.mode(), OverlayMode::Suburbs);

        c.engine_mut().unwrap().finish_loading();
        c.handle_event(EngineEvent::StyleData, 10);
        assert!(c.registry().is_ready());
        assert!(c.toggle_catchments(CatchmentToggle { primary: true, ..Default::default() }));
    }

    #[test]
    fn detach_removes_everything() {
        let mut c = attached(11.0);
        c.toggle_catchments(CatchmentToggle { primary: true, ..Default::default() });
        let engine = c.detach().unwrap();
        assert!(engine.added_layer_ids().is_empty());
        assert!(engine.subscriptions().is_empty());
        assert!(!c.is_attached());
        assert!(!c.registry().is_initialized());
    }

    #[test]
    fn counts_loaded_features_per_tier() {
        let mut c = attached(11.0);
        for (id, layer) in [("A", "localities_z6_9"), ("B", "localities_z6_9"), ("C", "localities_z12")] {
            c.engine_mut().unwrap().add_source_feature(RenderedFeature {
                id: Some(id.into()),
                source_layer: Some(layer.into()),
                ..Default::default()
            });
        }
        assert_eq!(c.source_feature_counts(), vec![(Tier::Coarse, 2), (Tier::Medium, 0), (Tier::Fine, 1)]);
    }
}
