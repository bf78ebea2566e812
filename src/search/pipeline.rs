use anyhow::Result;
use serde::Serialize;
use tracing::{debug, info, warn};

use super::{
    camera::CameraMove,
    disambiguate::{Disambiguator, Resolution},
    geocode::{GeocodeError, GeocodeQuery, PlaceCandidate, PlaceType},
    score::{HashScoreProvider, LocalityScore, ScoreProvider},
};
use crate::{
    config::{LocalitiesConfig, OverlayConfig},
    engine::{MapEngine, MoveTag},
    layers::LocalityLayer,
    types::{LocalityId, Millis, Tier},
};

/// A numbered place search, ready to be sent to the geocoder.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchRequest {
    pub seq: u64,
    pub query: GeocodeQuery,
}

/// Result of a completed search.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum SearchOutcome {
    Resolved {
        query: String,
        candidate: PlaceCandidate,
        #[serde(skip)]
        resolution: Resolution,
        camera: CameraMove,
        score: LocalityScore,
    },
    NotFound { query: String, message: String },
}

#[derive(Debug, Clone)]
struct InFlight {
    seq: u64,
    name: String,
    hint: Option<String>,
}

/// A highlight waiting for the camera move tagged `tag` to settle.
#[derive(Debug, Clone)]
struct PendingHighlight {
    name: String,
    tag: MoveTag,
    deadline: Millis,
}

/// Resolves typed place names to a camera move and, once the camera settles, to a rendered
/// locality to highlight.
///
/// Geocoding happens outside: [`SearchPipeline::begin`] hands out a numbered request and
/// [`SearchPipeline::complete`] takes the answer, so the same pipeline works with a blocking HTTP
/// client or with a fetch issued by the page. Only the answer to the latest request is applied.
pub struct SearchPipeline {
    disambiguator: Disambiguator,
    scores: Box<dyn ScoreProvider>,
    latest_seq: u64,
    in_flight: Option<InFlight>,
    pending: Option<PendingHighlight>,
    move_end_fallback_ms: Millis,
    place_types: Vec<PlaceType>,
}

impl std::fmt::Debug for SearchPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SearchPipeline")
            .field("latest_seq", &self.latest_seq)
            .field("in_flight", &self.in_flight)
            .field("pending", &self.pending)
            .finish_non_exhaustive()
    }
}

impl SearchPipeline {
    pub fn new(config: &OverlayConfig) -> Result<Self> {
        Ok(Self {
            disambiguator: Disambiguator::from_config(config)?,
            scores: Box::new(HashScoreProvider),
            latest_seq: 0,
            in_flight: None,
            pending: None,
            move_end_fallback_ms: config.timings.move_end_fallback_ms,
            place_types: config.place_types.clone(),
        })
    }

    /// Replace the placeholder score provider.
    pub fn with_score_provider(mut self, provider: impl ScoreProvider + 'static) -> Self {
        self.scores = Box::new(provider);
        self
    }

    #[inline] pub fn score_provider(&self) -> &dyn ScoreProvider { self.scores.as_ref() }

    /// Name waiting to be highlighted after the current camera move, if any.
    #[inline] pub fn pending_highlight(&self) -> Option<&str> { self.pending.as_ref().map(|p| p.name.as_str()) }

    /// Start a search. Supersedes any search still in flight and any highlight still waiting.
    pub fn begin(&mut self, name: &str, state_hint: Option<&str>) -> SearchRequest {
        self.latest_seq += 1;
        self.pending = None;
        let hint = state_hint.map(str::trim).filter(|h| !h.is_empty()).map(str::to_string);
        self.in_flight = Some(InFlight { seq: self.latest_seq, name: name.trim().to_string(), hint: hint.clone() });
        debug!(seq = self.latest_seq, name, hint = ?hint, "search started");
        let mut query = GeocodeQuery::place(name, hint.as_deref());
        query.types.clone_from(&self.place_types);
        SearchRequest { seq: self.latest_seq, query }
    }

    /// Apply the geocoder's answer to request `seq`. Returns `None` for a superseded request.
    ///
    /// On success the camera move is planned. Nothing is highlighted until the caller has issued
    /// the move and reported it through [`Self::await_move`].
    pub fn complete(&mut self, seq: u64, result: Result<Vec<PlaceCandidate>, GeocodeError>) -> Option<SearchOutcome> {
        if self.in_flight.as_ref().map(|f| f.seq) != Some(seq) {
            debug!(seq, latest = self.latest_seq, "ignoring stale search response");
            return None;
        }
        let in_flight = self.in_flight.take()?;

        let candidates = match result {
            Ok(c) if c.is_empty() => Err(GeocodeError::NoResults),
            other => other,
        };
        let candidates = match candidates {
            Ok(c) => c,
            Err(e) => {
                warn!(error = %e, query = %in_flight.name, "search failed");
                return Some(SearchOutcome::NotFound {
                    message: format!("Could not find \"{}\". Please try a different search.", in_flight.name),
                    query: in_flight.name,
                });
            }
        };

        let (candidate, resolution) = self.disambiguator
            .choose(&in_flight.name, in_flight.hint.as_deref(), &candidates)?;
        let camera = CameraMove::plan(candidate.center, candidate.bbox);
        let score = self.scores.score(&candidate.text);
        info!(query = %in_flight.name, place = %candidate.place_name, ?resolution, "search resolved");

        Some(SearchOutcome::Resolved { query: in_flight.name, candidate: candidate.clone(), resolution, camera, score })
    }

    /// `camera` was issued for the resolved `name` with `tag`: highlight once that move ends, or
    /// at `now` + move duration + fallback if its move-end never arrives.
    pub fn await_move(&mut self, tag: MoveTag, name: &str, camera: &CameraMove, now: Millis) {
        self.pending = Some(PendingHighlight {
            name: name.to_string(),
            tag,
            deadline: now + Millis::from(camera.duration_ms()) + self.move_end_fallback_ms,
        });
    }

    /// A camera move ended: hand out the name to highlight if it was the awaited move.
    pub fn take_on_move_end(&mut self, tag: Option<MoveTag>) -> Option<String> {
        match &self.pending {
            Some(p) if tag == Some(p.tag) => self.pending.take().map(|p| p.name),
            _ => None,
        }
    }

    /// No move-end arrived in time: hand out the name once its deadline has passed.
    pub fn take_expired(&mut self, now: Millis) -> Option<String> {
        match &self.pending {
            Some(p) if now >= p.deadline => self.pending.take().map(|p| p.name),
            _ => None,
        }
    }

    /// Drop any in-flight search and pending highlight.
    pub fn cancel(&mut self) {
        self.in_flight = None;
        self.pending = None;
    }
}

/// Find a rendered locality whose name contains `name` (case-insensitive), looking only at the
/// topmost tier rendered at the current zoom.
pub fn find_rendered_match(engine: &dyn MapEngine, localities: &LocalitiesConfig, name: &str) -> Option<(LocalityId, Tier)> {
    let tier = Tier::for_zoom(engine.zoom())?;
    let layer = LocalityLayer::Outline.id(tier);
    let needle = name.trim().to_lowercase();
    if needle.is_empty() { return None }

    let features = match engine.query_rendered_features(None, &[layer.as_str()]) {
        Ok(features) => features,
        Err(e) => {
            warn!(error = %e, layer = %layer, "rendered feature query failed");
            return None;
        }
    };

    features.iter()
        .find(|f| f.property_str(&localities.name_property).is_some_and(|n| n.to_lowercase().contains(&needle)))
        .and_then(|f| f.id.clone().or_else(|| f.property_str(&localities.id_property)))
        .map(|id| (LocalityId::from(id), tier))
}

#[cfg(test)]
mod tests {
    use geo::{Point, Rect};
    use serde_json::json;

    use super::*;
    use crate::engine::{MemoryEngine, RenderedFeature, SourceSpec};

    fn candidate(place_name: &str, lng: f64, lat: f64, bbox: Option<Rect<f64>>) -> PlaceCandidate {
        PlaceCandidate {
            id: place_name.to_string(),
            text: place_name.split(',').next().unwrap_or_default().to_string(),
            place_name: place_name.to_string(),
            center: Point::new(lng, lat),
            bbox,
            place_types: Vec::new(),
            postcode: None,
        }
    }

    fn pipeline() -> SearchPipeline { SearchPipeline::new(&OverlayConfig::default()).unwrap() }

    #[test]
    fn resolves_and_schedules_highlight() {
        let mut p = pipeline();
        let request = p.begin("Paddington", Some("New South Wales"));
        assert_eq!(request.query.text, "Paddington, New South Wales");

        let bbox = Rect::new((151.21, -33.89), (151.24, -33.88));
        let outcome = p.complete(request.seq, Ok(vec![
            candidate("Paddington, Queensland, Australia", 152.99, -27.46, None),
            candidate("Paddington, New South Wales, Australia", 151.22, -33.885, Some(bbox)),
        ])).unwrap();

        let SearchOutcome::Resolved { candidate, resolution, camera, .. } = outcome else { panic!("not resolved") };
        assert_eq!(candidate.place_name, "Paddington, New South Wales, Australia");
        assert_eq!(resolution, Resolution::StateName);
        assert!(matches!(camera, CameraMove::FitBounds { .. }));
        assert_eq!(p.pending_highlight(), None);

        p.await_move(request.seq, "Paddington", &camera, 1000);
        assert_eq!(p.pending_highlight(), Some("Paddington"));
        assert_eq!(p.take_expired(2299), None);
        assert_eq!(p.take_expired(2300).as_deref(), Some("Paddington"));
        assert_eq!(p.take_on_move_end(Some(request.seq)), None);
    }

    #[test]
    fn only_the_awaited_move_end_highlights() {
        let mut p = pipeline();
        let camera = CameraMove::plan(Point::new(152.99, -27.45), None);
        p.await_move(4, "Red Hill", &camera, 0);

        assert_eq!(p.take_on_move_end(None), None);
        assert_eq!(p.take_on_move_end(Some(3)), None);
        assert_eq!(p.take_on_move_end(Some(4)).as_deref(), Some("Red Hill"));
        assert_eq!(p.take_on_move_end(Some(4)), None);
    }

    #[test]
    fn new_search_drops_waiting_highlight() {
        let mut p = pipeline();
        let camera = CameraMove::plan(Point::new(152.99, -27.45), None);
        p.await_move(1, "Red Hill", &camera, 0);
        p.begin("Bondi", None);
        assert_eq!(p.pending_highlight(), None);
    }

    #[test]
    fn stale_response_is_ignored() {
        let mut p = pipeline();
        let old = p.begin("Red Hill", None);
        let new = p.begin("Bondi", None);

        assert!(p.complete(old.seq, Ok(vec![candidate("Red Hill, Victoria, Australia", 145.0, -38.3, None)])).is_none());
        let outcome = p.complete(new.seq, Ok(vec![candidate("Bondi, New South Wales, Australia", 151.27, -33.89, None)])).unwrap();
        assert!(matches!(outcome, SearchOutcome::Resolved { ref query, .. } if query == "Bondi"));
        // A duplicate answer is stale too.
        assert!(p.complete(new.seq, Ok(vec![])).is_none());
    }

    #[test]
    fn failures_become_not_found() {
        let mut p = pipeline();
        let request = p.begin("Atlantis", None);
        let outcome = p.complete(request.seq, Ok(vec![])).unwrap();
        assert!(matches!(outcome, SearchOutcome::NotFound { ref query, .. } if query == "Atlantis"));

        let request = p.begin("Atlantis", None);
        let outcome = p.complete(request.seq, Err(GeocodeError::Request("offline".into()))).unwrap();
        let SearchOutcome::NotFound { message, .. } = outcome else { panic!("expected not found") };
        assert!(message.contains("Atlantis"));
        assert_eq!(p.pending_highlight(), None);
    }

    #[test]
    fn rendered_match_uses_topmost_tier_only() {
        let mut engine = MemoryEngine::loaded(&[]);
        let config = OverlayConfig::default();
        engine.add_source("localities", &SourceSpec::vector("mapbox://x")).unwrap();
        for tier in Tier::ALL {
            engine.add_layer(&LocalityLayer::Outline.spec(tier, "localities"), None).unwrap();
        }
        let feature = |layer: String, id: &str, name: &str| RenderedFeature {
            id: Some(id.to_string()),
            layer,
            source_layer: None,
            properties: json!({ "LOC_NAME": name }).as_object().unwrap().clone(),
        };
        engine.add_rendered(feature(LocalityLayer::Outline.id(Tier::Coarse), "coarse-1", "Red Hill"), None);
        engine.add_rendered(feature(LocalityLayer::Outline.id(Tier::Fine), "fine-1", "RED HILL"), None);

        engine.set_zoom(8.0);
        assert_eq!(find_rendered_match(&engine, &config.localities, "red hill"), Some((LocalityId::new("coarse-1"), Tier::Coarse)));

        engine.set_zoom(13.0);
        assert_eq!(find_rendered_match(&engine, &config.localities, "Red Hill"), Some((LocalityId::new("fine-1"), Tier::Fine)));
        assert_eq!(find_rendered_match(&engine, &config.localities, "Ashgrove"), None);

        engine.set_zoom(3.0);
        assert_eq!(find_rendered_match(&engine, &config.localities, "Red Hill"), None);
    }
}
