mod locality_id;
mod state_code;
mod tier;

pub use locality_id::LocalityId;
pub use state_code::StateCode;
pub use tier::Tier;

/// Host-supplied wall-clock timestamp in milliseconds (e.g. `Date.now()` or `performance.now()`).
/// All deferred behavior is driven by these values rather than by a clock owned by the crate.
pub type Millis = u64;
