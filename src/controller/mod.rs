//! The overlay mode controller: owns the engine handle, routes its events, and exposes the
//! commands the hosting page calls.

mod notice;
mod overlay;
mod timers;

pub use notice::{LocalityPreview, OverlayMode, OverlayNotice};
pub use overlay::{CatchmentToggle, OverlayController};
pub use timers::{Deferred, Timers};
