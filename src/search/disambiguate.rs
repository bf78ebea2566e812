use anyhow::{Context, Result};
use geo::{Contains, Rect};
use regex::Regex;
use tracing::debug;

use super::geocode::PlaceCandidate;
use crate::{config::{AmbiguousPlaceConfig, OverlayConfig}, types::StateCode};

/// A place name that exists more than once inside one region, with the rectangle of the
/// copy users mean when they name that region.
#[derive(Debug, Clone)]
pub struct AmbiguousPlace {
    name: Regex,
    region_hint: String, // lowercase
    bounds: Rect<f64>,
}

impl AmbiguousPlace {
    pub fn new(name_pattern: &str, region_hint: &str, bounds: Rect<f64>) -> Result<Self> {
        let name = Regex::new(name_pattern)
            .with_context(|| format!("invalid ambiguous place pattern: {name_pattern}"))?;
        Ok(Self { name, region_hint: region_hint.to_lowercase(), bounds })
    }

    pub fn from_config(config: &AmbiguousPlaceConfig) -> Result<Self> {
        let [west, south, east, north] = config.bounds;
        Self::new(&config.name_pattern, &config.region_hint, Rect::new((west, south), (east, north)))
    }

    /// Whether this entry governs a search for `name` with `hint`.
    pub fn applies(&self, name: &str, hint: Option<&str>) -> bool {
        self.name.is_match(name.trim())
            && hint.is_some_and(|h| expand_hint(h).contains(&self.region_hint))
    }

    /// Strictly inside the rectangle.
    #[inline] pub fn contains(&self, candidate: &PlaceCandidate) -> bool { self.bounds.contains(&candidate.center) }
}

/// How a candidate was picked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// Matched an ambiguous-place entry and fell inside its rectangle.
    RegionBounds,
    /// Its label contains the hinted state name.
    StateName,
    /// The geocoder's own top result.
    FirstResult,
}

/// Lowercased hint, with a state code (`QLD`) expanded to the full name used in labels.
fn expand_hint(hint: &str) -> String {
    match StateCode::from_str(hint.trim()) {
        Some(state) => state.name().to_lowercase(),
        None => hint.trim().to_lowercase(),
    }
}

/// Picks one candidate out of a ranked list of same-named places.
#[derive(Debug, Clone, Default)]
pub struct Disambiguator {
    table: Vec<AmbiguousPlace>,
}

impl Disambiguator {
    pub fn new(table: Vec<AmbiguousPlace>) -> Self { Self { table } }

    pub fn from_config(config: &OverlayConfig) -> Result<Self> {
        let table = config.ambiguous_places.iter()
            .map(AmbiguousPlace::from_config)
            .collect::<Result<Vec<_>>>()?;
        Ok(Self::new(table))
    }

    /// Choose among `candidates`, in order of preference:
    /// 1. a table entry applies and a candidate lies inside its rectangle;
    /// 2. the first candidate whose label contains the hinted state;
    /// 3. the first candidate.
    ///
    /// Table entries go first because both same-named places can sit in the hinted state, so
    /// the state rule alone would not separate them.
    pub fn choose<'a>(&self, name: &str, hint: Option<&str>, candidates: &'a [PlaceCandidate]) -> Option<(&'a PlaceCandidate, Resolution)> {
        let first = candidates.first()?;

        for entry in self.table.iter().filter(|entry| entry.applies(name, hint)) {
            if let Some(found) = candidates.iter().find(|c| entry.contains(c)) {
                debug!(place = %found.place_name, "resolved ambiguous place by region bounds");
                return Some((found, Resolution::RegionBounds));
            }
        }

        if let Some(hint) = hint.map(expand_hint).filter(|h| !h.is_empty()) {
            if let Some(found) = candidates.iter().find(|c| c.place_name.to_lowercase().contains(&hint)) {
                return Some((found, Resolution::StateName));
            }
        }

        Some((first, Resolution::FirstResult))
    }
}
