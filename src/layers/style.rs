use serde_json::{json, Value};

use crate::{
    engine::{LayerKind, LayerSpec},
    types::Tier,
};

const OUTLINE_COLOR: &str = "#2563eb";
const HOVER_COLOR: &str = "#dc2626";
const FILL_COLOR: &str = "#3b82f6";
const SEARCH_COLOR: &str = "#dc2626";

/// Preferred anchors (in order) below which locality layers are inserted, so labels stay on top.
const LOCALITY_ANCHORS: [&str; 3] = ["waterway-label", "water", "landcover"];

/// The three layers drawn for each tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LocalityLayer {
    Outline,
    Fill,
    SearchHighlight,
}

impl LocalityLayer {
    pub const ALL: [LocalityLayer; 3] = [LocalityLayer::Outline, LocalityLayer::Fill, LocalityLayer::SearchHighlight];

    /// Layers that receive pointer events (the search highlight layer is purely decorative).
    pub const INTERACTIVE: [LocalityLayer; 2] = [LocalityLayer::Outline, LocalityLayer::Fill];

    /// Style layer id, e.g. `localities-outline-z10-11`.
    pub fn id(&self, tier: Tier) -> String {
        let kind = match self {
            LocalityLayer::Outline => "outline",
            LocalityLayer::Fill => "fill",
            LocalityLayer::SearchHighlight => "search-highlight",
        };
        format!("localities-{kind}-{}", tier.layer_suffix())
    }

    /// Every locality layer id across all tiers, in insertion order.
    pub fn all_ids() -> Vec<String> {
        Self::ALL.iter()
            .flat_map(|layer| Tier::ALL.iter().map(move |tier| layer.id(*tier)))
            .collect()
    }

    /// Ids of the interactive layers of one tier.
    pub fn interactive_ids(tier: Tier) -> Vec<String> {
        Self::INTERACTIVE.iter().map(|layer| layer.id(tier)).collect()
    }

    /// Which locality layer (and tier) a style layer id belongs to.
    pub fn parse(id: &str) -> Option<(LocalityLayer, Tier)> {
        let tier = Tier::from_layer_id(id)?;
        Self::ALL.into_iter().find(|layer| layer.id(tier) == id).map(|layer| (layer, tier))
    }

    /// Build the style layer for `tier`. Hover and search styling are driven by feature state,
    /// so a hover costs one feature-state write and never a paint-property rewrite.
    pub fn spec(&self, tier: Tier, source_id: &str) -> LayerSpec {
        let base = |kind| {
            LayerSpec::new(self.id(tier), kind, source_id, tier.source_layer()).min_zoom(tier.min_zoom())
        };
        match self {
            LocalityLayer::Outline => base(LayerKind::Line)
                .paint("line-color", when_flag("hover", json!(HOVER_COLOR), json!(OUTLINE_COLOR)))
                .paint("line-width", json!(2))
                .layout("line-join", json!("round"))
                .layout("line-cap", json!("round")),
            LocalityLayer::Fill => base(LayerKind::Fill)
                .paint("fill-color", json!(FILL_COLOR))
                .paint("fill-opacity", when_flag("hover", json!(0.25), json!(0.1))),
            LocalityLayer::SearchHighlight => base(LayerKind::Line)
                .paint("line-color", json!(SEARCH_COLOR))
                .paint("line-width", when_flag("search", json!(3), json!(0)))
                .layout("line-join", json!("round"))
                .layout("line-cap", json!("round")),
        }
    }
}

/// `["case", ["boolean", ["feature-state", flag], false], on, off]`
fn when_flag(flag: &str, on: Value, off: Value) -> Value {
    json!(["case", ["boolean", ["feature-state", flag], false], on, off])
}

/// Pick the style layer to insert below: the first preferred anchor present, otherwise the
/// topmost layer of the style, otherwise none (append on top).
pub fn insertion_point(style_layers: &[String], anchors: &[&str]) -> Option<String> {
    anchors.iter()
        .find(|anchor| style_layers.iter().any(|l| l == *anchor))
        .map(|anchor| anchor.to_string())
        .or_else(|| style_layers.last().cloned())
}

pub(crate) fn locality_insertion_point(style_layers: &[String]) -> Option<String> {
    insertion_point(style_layers, &LOCALITY_ANCHORS)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nine_distinct_layer_ids() {
        let ids = LocalityLayer::all_ids();
        assert_eq!(ids.len(), 9);
        assert_eq!(ids[0], "localities-outline-z6-9");
        assert_eq!(ids[8], "localities-search-highlight-z12");

        let mut unique = ids.clone();
        unique.sort();
        unique.dedup();
        assert_eq!(unique.len(), 9);
    }

    #[test]
    fn parse_recovers_layer_and_tier() {
        assert_eq!(LocalityLayer::parse("localities-fill-z10-11"), Some((LocalityLayer::Fill, Tier::Medium)));
        assert_eq!(LocalityLayer::parse("localities-search-highlight-z6-9"), Some((LocalityLayer::SearchHighlight, Tier::Coarse)));
        assert_eq!(LocalityLayer::parse("catchments-fill"), None);
    }

    #[test]
    fn hover_paint_is_feature_state_driven() {
        let fill = LocalityLayer::Fill.spec(Tier::Fine, "localities");
        assert_eq!(fill.source_layer, "localities_z12");
        assert_eq!(fill.min_zoom, Some(12.0));
        assert_eq!(
            fill.paint["fill-opacity"],
            json!(["case", ["boolean", ["feature-state", "hover"], false], 0.25, 0.1])
        );

        let outline = LocalityLayer::Outline.spec(Tier::Coarse, "localities");
        assert_eq!(outline.min_zoom, Some(5.0));
        assert_eq!(outline.paint["line-width"], json!(2));

        let search = LocalityLayer::SearchHighlight.spec(Tier::Medium, "localities");
        assert_eq!(search.paint["line-width"], json!(["case", ["boolean", ["feature-state", "search"], false], 3, 0]));
    }

    #[test]
    fn insertion_prefers_anchors_then_top() {
        let style = vec!["land".to_string(), "water".to_string(), "road".to_string()];
        assert_eq!(locality_insertion_point(&style).as_deref(), Some("water"));

        let style = vec!["land".to_string(), "road".to_string()];
        assert_eq!(locality_insertion_point(&style).as_deref(), Some("road"));

        assert_eq!(locality_insertion_point(&[]), None);
    }
}
