#![doc = "Growmap public API: zoom-tiered locality overlays, place search and school catchment filters for a vector-tile map"]
mod catchments;
mod config;
mod controller;
mod engine;
mod features;
mod layers;
mod search;
mod types;

#[doc(inline)]
pub use types::{LocalityId, Millis, StateCode, Tier};

#[doc(inline)]
pub use config::{AmbiguousPlaceConfig, CatchmentsConfig, LocalitiesConfig, OverlayConfig, Timings};

#[doc(inline)]
pub use engine::{
    CameraCall, Cursor, EngineEvent, FeatureRef, LayerKind, LayerSpec, MapEngine, MemoryEngine,
    MoveTag, PointerEventKind, RenderedFeature, ScreenPoint, SourceSpec, StateFlag, Visibility,
};

#[doc(inline)]
pub use layers::{
    insertion_point, CatchmentLayerSet, InitGuard, LayerRegistry, LocalityLayer, RegistryStatus,
    CATCHMENT_FILL, CATCHMENT_LINE, SCHOOL_LABELS, SCHOOL_POINTS,
};

#[doc(inline)]
pub use features::{FeatureStateTracker, SearchHighlight, Throttle, TierFeature};

#[doc(inline)]
pub use search::{
    find_rendered_match, name_hash, parse_response, prioritize, split_place_name, zoom_for_extent,
    AmbiguousPlace, CameraMove, Disambiguator, GeocodeError, GeocodeQuery, Geocoder, HashScoreProvider,
    Kpis, LocalityScore, PlaceCandidate, PlaceType, Resolution, ScoreProvider, SearchOutcome,
    SearchPipeline, SearchRequest, SuggestionRequest, SuggestionSession, PLACE_SEARCH_TYPES,
};

#[cfg(feature = "geocode")]
#[doc(inline)]
pub use search::MapboxGeocoder;

#[doc(inline)]
pub use catchments::{
    active_categories, all_rules, compile, load_selection, parse_schools, rules, save_selection, Attr,
    CatchmentDetails, CatchmentPanel, CatchmentSelection, Category, FileStore, FilterExpression,
    GlobalTypes, Literal, MemoryStore, PreferenceStore, School, SchoolType, SelectionKey, StateRules,
    SELECTION_KEY,
};

#[doc(inline)]
pub use controller::{
    CatchmentToggle, Deferred, LocalityPreview, OverlayController, OverlayMode, OverlayNotice, Timers,
};
