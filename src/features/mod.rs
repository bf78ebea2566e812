//! Transient `hover` / `search` feature state on locality boundaries.
//!
//! A locality exists once per tier, so every write addresses a `(locality, tier)` pair and every
//! clear sweeps all tiers; a flag left on a tier that is not rendered right now would show up as
//! soon as the user zooms into it.

mod throttle;
mod tracker;

pub use throttle::Throttle;
pub use tracker::{FeatureStateTracker, SearchHighlight, TierFeature};
