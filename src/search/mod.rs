//! Free-text place search: geocoding, disambiguation of same-named places, camera placement,
//! post-move highlighting and type-ahead suggestions.

mod camera;
mod disambiguate;
mod geocode;
mod pipeline;
mod score;
mod suggest;

pub use camera::{zoom_for_extent, CameraMove};
pub use disambiguate::{AmbiguousPlace, Disambiguator, Resolution};
#[cfg(feature = "geocode")]
pub use geocode::MapboxGeocoder;
pub use geocode::{parse_response, GeocodeError, GeocodeQuery, Geocoder, PlaceCandidate, PlaceType, PLACE_SEARCH_TYPES};
pub use pipeline::{find_rendered_match, SearchOutcome, SearchPipeline, SearchRequest};
pub use score::{name_hash, HashScoreProvider, Kpis, LocalityScore, ScoreProvider};
pub use suggest::{prioritize, split_place_name, SuggestionRequest, SuggestionSession};
