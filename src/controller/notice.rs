use serde::Serialize;

use crate::{
    catchments::CatchmentDetails,
    engine::ScreenPoint,
    search::LocalityScore,
    types::{LocalityId, Tier},
};

/// Display mode of the overlay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OverlayMode {
    #[default]
    Suburbs,
    Catchments,
    /// Layer visibility is being swapped.
    Transitioning,
}

/// A clicked locality, as shown in the suburb toolkit.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LocalityPreview {
    pub name: String,
    pub state: String,
    pub code: LocalityId,
    #[serde(flatten)]
    pub score: LocalityScore,
    pub position: ScreenPoint,
}

/// Things the page should react to, queued by the controller and drained by the host.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum OverlayNotice {
    LocalitySelected(LocalityPreview),
    CatchmentSelected(CatchmentDetails),
    SearchResolved { query: String, place_name: String, score: LocalityScore },
    SearchFailed { query: String, message: String },
    LocalityHighlighted { code: LocalityId, tier: Tier },
    ModeChanged { mode: OverlayMode },
}
