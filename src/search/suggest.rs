use tracing::{debug, warn};

use super::geocode::{GeocodeError, GeocodeQuery, PlaceCandidate, PlaceType};
use crate::types::Millis;

const MAX_SUGGESTIONS: usize = 8;
const MIN_QUERY_CHARS: usize = 2;

const GOOD_TYPES: [PlaceType; 7] = [
    PlaceType::Place, PlaceType::Neighborhood, PlaceType::Locality, PlaceType::Suburb,
    PlaceType::Postcode, PlaceType::District, PlaceType::Region,
];

const ROAD_TERMS: [&str; 13] = [
    "road", "street", "avenue", "drive", "lane", "court", "way", "highway", "freeway", "close",
    "terrace", "crescent", "boulevard",
];

fn is_suburb_like(c: &PlaceCandidate) -> bool {
    c.has_type(PlaceType::Neighborhood) || c.has_type(PlaceType::Place)
}

fn keep(c: &PlaceCandidate) -> bool {
    if c.text.chars().count() < MIN_QUERY_CHARS { return false }
    if GOOD_TYPES.iter().any(|ty| c.has_type(*ty)) { return true }

    let label = c.place_name.to_lowercase();
    let text = c.text.to_lowercase();
    !ROAD_TERMS.iter().any(|term| label.contains(term) || text.contains(term))
}

/// Filter and order raw type-ahead results: suburb-like places first, then places carrying a
/// postcode, then shorter names. At most eight are kept.
pub fn prioritize(candidates: Vec<PlaceCandidate>) -> Vec<PlaceCandidate> {
    let mut kept: Vec<PlaceCandidate> = candidates.into_iter().filter(keep).collect();
    kept.sort_by_key(|c| (!is_suburb_like(c), c.postcode.is_none(), c.text.chars().count()));
    kept.truncate(MAX_SUGGESTIONS);
    kept
}

/// Split a geocoder label into the place name (first part) and the state (second-to-last part):
/// `"Red Hill, Queensland, Australia"` gives `("Red Hill", Some("Queensland"))`.
pub fn split_place_name(label: &str) -> (String, Option<String>) {
    let parts: Vec<&str> = label.split(',').map(str::trim).collect();
    let name = parts.first().copied().unwrap_or_default().to_string();
    let state = (parts.len() >= 3).then(|| parts[parts.len() - 2].to_string());
    (name, state)
}

/// A numbered type-ahead request.
#[derive(Debug, Clone, PartialEq)]
pub struct SuggestionRequest {
    pub seq: u64,
    pub query: GeocodeQuery,
}

/// Type-ahead state of one search box.
///
/// Input is debounced against host timestamps. Every request carries a sequence number, and a
/// response is only applied if it answers the latest request and no search has been executed
/// since it was issued.
#[derive(Debug, Clone)]
pub struct SuggestionSession {
    debounce_ms: Millis,
    pending: Option<(String, Millis)>, // (text, due)
    latest_seq: u64,
    search_executed: bool,
    suggestions: Vec<PlaceCandidate>,
    visible: bool,
}

impl SuggestionSession {
    pub fn new(debounce_ms: Millis) -> Self {
        Self {
            debounce_ms,
            pending: None,
            latest_seq: 0,
            search_executed: false,
            suggestions: Vec::new(),
            visible: false,
        }
    }

    #[inline] pub fn suggestions(&self) -> &[PlaceCandidate] { &self.suggestions }

    /// Whether the suggestion list should be displayed.
    #[inline] pub fn is_visible(&self) -> bool { self.visible }

    #[inline] pub fn search_executed(&self) -> bool { self.search_executed }

    /// The user typed: hide the list and (re)start the debounce window.
    pub fn input(&mut self, text: &str, now: Millis) {
        self.search_executed = false;
        self.visible = false;
        self.pending = Some((text.to_string(), now + self.debounce_ms));
    }

    /// Issue the debounced request once its window has elapsed. Queries shorter than two
    /// characters clear the list instead.
    pub fn poll(&mut self, now: Millis) -> Option<SuggestionRequest> {
        match &self.pending {
            Some((_, due)) if now >= *due => {}
            _ => return None,
        }
        let (text, _) = self.pending.take()?;

        if text.trim().chars().count() < MIN_QUERY_CHARS {
            self.suggestions.clear();
            self.visible = false;
            return None;
        }
        self.latest_seq += 1;
        Some(SuggestionRequest { seq: self.latest_seq, query: GeocodeQuery::suggestions(&text) })
    }

    /// Apply a response. Returns whether it was applied.
    pub fn complete(&mut self, seq: u64, result: Result<Vec<PlaceCandidate>, GeocodeError>) -> bool {
        if seq != self.latest_seq {
            debug!(seq, latest = self.latest_seq, "ignoring stale suggestion response");
            return false;
        }
        if self.search_executed {
            debug!(seq, "ignoring suggestion response after search was executed");
            return false;
        }

        match result {
            Ok(candidates) => {
                self.suggestions = prioritize(candidates);
                self.visible = !self.suggestions.is_empty();
            }
            Err(e) => {
                warn!(error = %e, "suggestion lookup failed");
                self.suggestions.clear();
                self.visible = false;
            }
        }
        true
    }

    /// A search was executed directly (Enter): hide the list and drop responses still in flight.
    pub fn mark_search_executed(&mut self) {
        self.search_executed = true;
        self.visible = false;
        self.pending = None;
    }

    /// Pick suggestion `index`; returns the place name and state hint to search for.
    pub fn select(&mut self, index: usize) -> Option<(String, Option<String>)> {
        let chosen = self.suggestions.get(index)?;
        let split = split_place_name(&chosen.place_name);
        self.suggestions.clear();
        self.mark_search_executed();
        Some(split)
    }

    /// Escape: hide the list but keep it.
    pub fn dismiss(&mut self) { self.visible = false; }
}
