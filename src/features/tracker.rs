use smallvec::SmallVec;
use tracing::{debug, warn};

use super::Throttle;
use crate::{
    engine::{Cursor, FeatureRef, MapEngine, StateFlag},
    types::{LocalityId, Millis, Tier},
};

/// One tier-specific copy of a locality.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TierFeature {
    pub id: LocalityId,
    pub tier: Tier,
}

impl TierFeature {
    pub fn new(id: impl Into<LocalityId>, tier: Tier) -> Self { Self { id: id.into(), tier } }
}

/// The locality carrying the search flag and the tiers the flag was written to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchHighlight {
    pub id: LocalityId,
    pub tiers: SmallVec<[Tier; 3]>,
}

/// Keeps at most one hovered and at most one search-highlighted locality, and mirrors both into
/// engine feature state.
#[derive(Debug)]
pub struct FeatureStateTracker {
    source_id: String,
    hovered: Option<TierFeature>,
    search: Option<SearchHighlight>,
    throttle: Throttle,
}

impl FeatureStateTracker {
    pub fn new(source_id: impl Into<String>, hover_throttle_ms: Millis) -> Self {
        Self {
            source_id: source_id.into(),
            hovered: None,
            search: None,
            throttle: Throttle::new(hover_throttle_ms),
        }
    }

    #[inline] pub fn hovered(&self) -> Option<&TierFeature> { self.hovered.as_ref() }

    #[inline] pub fn search_highlight(&self) -> Option<&SearchHighlight> { self.search.as_ref() }

    /// Throttle gate for pointer moves (~60 Hz by default).
    #[inline] pub fn admit_move(&mut self, now: Millis) -> bool { self.throttle.admit(now) }

    fn feature(&self, id: &LocalityId, tier: Tier) -> FeatureRef {
        FeatureRef { source: self.source_id.clone(), source_layer: tier.source_layer().to_string(), id: id.clone() }
    }

    /// Write one flag on one tier copy. Failures are expected when the id is absent from that
    /// tier's source layer, so they are logged rather than returned.
    fn write(&self, engine: &mut dyn MapEngine, id: &LocalityId, tier: Tier, flag: StateFlag, value: bool) -> bool {
        match engine.set_feature_state(&self.feature(id, tier), flag, value) {
            Ok(()) => true,
            Err(e) => {
                debug!(error = %e, locality = %id, tier = tier.layer_suffix(), flag = flag.key(), value, "feature state write failed");
                false
            }
        }
    }

    fn clear_all_tiers(&self, engine: &mut dyn MapEngine, id: &LocalityId, flag: StateFlag) {
        for tier in Tier::ALL {
            self.write(engine, id, tier, flag, false);
        }
    }

    /// Hover `(id, tier)`. Same pair again is a no-op; a different pair clears the previous hover
    /// on every tier first. Returns whether anything changed.
    pub fn set_hover(&mut self, engine: &mut dyn MapEngine, id: &LocalityId, tier: Tier) -> bool {
        if self.hovered.as_ref().is_some_and(|h| h.id == *id && h.tier == tier) {
            return false;
        }
        if let Some(previous) = self.hovered.take() {
            self.clear_all_tiers(engine, &previous.id, StateFlag::Hover);
        }

        if !self.write(engine, id, tier, StateFlag::Hover, true) {
            warn!(locality = %id, tier = tier.layer_suffix(), "could not set hover state");
        }
        engine.set_cursor(Cursor::Pointer);
        self.hovered = Some(TierFeature { id: id.clone(), tier });
        true
    }

    /// Clear the hover (on every tier) and reset the cursor. No-op when nothing is hovered.
    pub fn clear_hover(&mut self, engine: &mut dyn MapEngine) -> bool {
        let Some(previous) = self.hovered.take() else { return false };
        self.clear_all_tiers(engine, &previous.id, StateFlag::Hover);
        engine.set_cursor(Cursor::Default);
        true
    }

    /// Clear the hover when it belongs to a tier other than the one rendered at `zoom`.
    pub fn on_zoom(&mut self, engine: &mut dyn MapEngine, zoom: f64) -> bool {
        match &self.hovered {
            Some(hovered) if Tier::for_zoom(zoom) != Some(hovered.tier) => self.clear_hover(engine),
            _ => false,
        }
    }

    /// Put the search flag on `id`, replacing any previous search highlight.
    ///
    /// With a known tier only that copy is written. Otherwise the tier rendered at the current
    /// zoom is tried first, then every tier speculatively (each failure logged). Returns whether
    /// at least one write succeeded.
    pub fn highlight(&mut self, engine: &mut dyn MapEngine, id: &LocalityId, tier: Option<Tier>) -> bool {
        self.clear_search_highlight(engine);

        let mut written: SmallVec<[Tier; 3]> = SmallVec::new();
        let first = tier.or_else(|| Tier::for_zoom(engine.zoom()));
        if let Some(t) = first {
            if self.write(engine, id, t, StateFlag::Search, true) {
                written.push(t);
            }
        }
        if written.is_empty() && tier.is_none() {
            for t in Tier::ALL.into_iter().filter(|t| Some(*t) != first) {
                if self.write(engine, id, t, StateFlag::Search, true) {
                    written.push(t);
                }
            }
        }

        if written.is_empty() {
            warn!(locality = %id, "search highlight could not be applied to any tier");
            return false;
        }
        debug!(locality = %id, tiers = ?written, "search highlight applied");
        self.search = Some(SearchHighlight { id: id.clone(), tiers: written });
        true
    }

    /// Remove the search flag from every tier. No-op when nothing is highlighted.
    pub fn clear_search_highlight(&mut self, engine: &mut dyn MapEngine) -> bool {
        let Some(previous) = self.search.take() else { return false };
        self.clear_all_tiers(engine, &previous.id, StateFlag::Search);
        true
    }

    /// Forget all tracked state without touching the engine (its source is already gone).
    pub fn forget(&mut self) {
        self.hovered = None;
        self.search = None;
        self.throttle.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{MemoryEngine, SourceSpec};

    fn engine() -> MemoryEngine {
        let mut engine = MemoryEngine::loaded(&[]);
        engine.add_source("localities", &SourceSpec::vector("mapbox://x")).unwrap();
        engine
    }

    fn tracker() -> FeatureStateTracker { FeatureStateTracker::new("localities", 16) }

    fn id(s: &str) -> LocalityId { LocalityId::new(s) }

    #[test]
    fn set_hover_is_idempotent() {
        let mut engine = engine();
        let mut tracker = tracker();

        assert!(tracker.set_hover(&mut engine, &id("loc1"), Tier::Medium));
        assert!(!tracker.set_hover(&mut engine, &id("loc1"), Tier::Medium));
        assert_eq!(engine.flagged(StateFlag::Hover).len(), 1);
        assert_eq!(engine.cursor(), Cursor::Pointer);
    }

    #[test]
    fn different_id_leaves_exactly_one_hover() {
        let mut engine = engine();
        let mut tracker = tracker();

        tracker.set_hover(&mut engine, &id("loc1"), Tier::Coarse);
        tracker.set_hover(&mut engine, &id("loc2"), Tier::Fine);

        let hovered = engine.flagged(StateFlag::Hover);
        assert_eq!(hovered.len(), 1);
        assert_eq!(hovered[0].id, id("loc2"));
        assert_eq!(hovered[0].source_layer, "localities_z12");
        assert_eq!(tracker.hovered(), Some(&TierFeature::new("loc2", Tier::Fine)));
    }

    #[test]
    fn clear_hover_sweeps_every_tier() {
        let mut engine = engine();
        let mut tracker = tracker();

        // A stale flag on another tier (e.g. left over by a previous session).
        engine.set_feature_state(
            &FeatureRef { source: "localities".into(), source_layer: "localities_z6_9".into(), id: id("loc1") },
            StateFlag::Hover,
            true,
        ).unwrap();
        tracker.set_hover(&mut engine, &id("loc1"), Tier::Fine);

        assert!(tracker.clear_hover(&mut engine));
        assert!(engine.flagged(StateFlag::Hover).is_empty());
        assert_eq!(engine.cursor(), Cursor::Default);
        assert!(!tracker.clear_hover(&mut engine));
    }

    #[test]
    fn zoom_change_across_tier_clears_hover() {
        let mut engine = engine();
        let mut tracker = tracker();
        tracker.set_hover(&mut engine, &id("loc1"), Tier::Medium);

        assert!(!tracker.on_zoom(&mut engine, 11.2));
        assert!(tracker.on_zoom(&mut engine, 12.5));
        assert!(tracker.hovered().is_none());
    }

    #[test]
    fn highlight_uses_tier_for_current_zoom() {
        let mut engine = engine();
        engine.set_zoom(10.5);
        let mut tracker = tracker();

        assert!(tracker.highlight(&mut engine, &id("loc1"), None));
        let flagged = engine.flagged(StateFlag::Search);
        assert_eq!(flagged.len(), 1);
        assert_eq!(flagged[0].source_layer, "localities_z10_11");
    }

    #[test]
    fn highlight_below_all_tiers_writes_speculatively() {
        let mut engine = MemoryEngine::loaded(&[]).strict_feature_ids();
        engine.add_source("localities", &SourceSpec::vector("mapbox://x")).unwrap();
        engine.add_known_feature("localities_z10_11", "loc1");
        engine.add_known_feature("localities_z12", "loc1");
        let mut tracker = tracker();

        assert!(tracker.highlight(&mut engine, &id("loc1"), None));
        assert_eq!(tracker.search_highlight().unwrap().tiers.as_slice(), &[Tier::Medium, Tier::Fine]);
        assert_eq!(engine.flagged(StateFlag::Search).len(), 2);

        assert!(!tracker.highlight(&mut engine, &id("missing"), None));
        assert!(tracker.search_highlight().is_none());
        assert!(engine.flagged(StateFlag::Search).is_empty());
    }

    #[test]
    fn new_highlight_replaces_previous() {
        let mut engine = engine();
        let mut tracker = tracker();
        tracker.highlight(&mut engine, &id("loc1"), Some(Tier::Fine));
        tracker.highlight(&mut engine, &id("loc2"), Some(Tier::Fine));

        let flagged = engine.flagged(StateFlag::Search);
        assert_eq!(flagged.len(), 1);
        assert_eq!(flagged[0].id, id("loc2"));

        assert!(tracker.clear_search_highlight(&mut engine));
        assert!(!tracker.clear_search_highlight(&mut engine));
        assert!(engine.flagged(StateFlag::Search).is_empty());
    }
}
