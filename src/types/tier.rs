use serde::{Deserialize, Serialize};

/// Zoom band with its own simplified copy of the locality geometry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    Coarse, // zoom 5-9
    Medium, // zoom 10-11
    Fine,   // zoom 12+
}

impl Tier {
    /// Coarsest first.
    pub const ALL: [Tier; 3] = [Tier::Coarse, Tier::Medium, Tier::Fine];

    /// Source-layer name of this tier inside the localities tileset.
    pub fn source_layer(&self) -> &'static str {
        match self {
            Tier::Coarse => "localities_z6_9",
            Tier::Medium => "localities_z10_11",
            Tier::Fine => "localities_z12",
        }
    }

    /// Suffix used in the ids of the style layers drawn for this tier.
    pub fn layer_suffix(&self) -> &'static str {
        match self {
            Tier::Coarse => "z6-9",
            Tier::Medium => "z10-11",
            Tier::Fine => "z12",
        }
    }

    /// Lowest zoom at which this tier's layers render.
    pub fn min_zoom(&self) -> f64 {
        match self {
            Tier::Coarse => 5.0,
            Tier::Medium => 10.0,
            Tier::Fine => 12.0,
        }
    }

    /// The topmost tier rendered at `zoom`, or `None` when zoomed out past every tier.
    pub fn for_zoom(zoom: f64) -> Option<Tier> {
        Self::ALL.into_iter().rev().find(|tier| zoom >= tier.min_zoom())
    }

    pub fn from_source_layer(name: &str) -> Option<Tier> {
        Self::ALL.into_iter().find(|tier| tier.source_layer() == name)
    }

    /// Recover the tier from a style layer id such as `localities-fill-z10-11`.
    pub fn from_layer_id(id: &str) -> Option<Tier> {
        Self::ALL.into_iter().find(|tier| id.ends_with(&format!("-{}", tier.layer_suffix())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zoom_bands() {
        assert_eq!(Tier::for_zoom(3.5), None);
        assert_eq!(Tier::for_zoom(5.0), Some(Tier::Coarse));
        assert_eq!(Tier::for_zoom(9.99), Some(Tier::Coarse));
        assert_eq!(Tier::for_zoom(10.0), Some(Tier::Medium));
        assert_eq!(Tier::for_zoom(11.5), Some(Tier::Medium));
        assert_eq!(Tier::for_zoom(12.0), Some(Tier::Fine));
        assert_eq!(Tier::for_zoom(18.0), Some(Tier::Fine));
    }

    #[test]
    fn layer_ids_round_trip_to_tier() {
        assert_eq!(Tier::from_layer_id("localities-outline-z6-9"), Some(Tier::Coarse));
        assert_eq!(Tier::from_layer_id("localities-fill-z10-11"), Some(Tier::Medium));
        assert_eq!(Tier::from_layer_id("localities-search-highlight-z12"), Some(Tier::Fine));
        assert_eq!(Tier::from_layer_id("catchments-fill"), None);
        assert_eq!(Tier::from_source_layer("localities_z12"), Some(Tier::Fine));
    }
}
