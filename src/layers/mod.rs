mod catchments;
mod registry;
mod style;

pub use catchments::{CatchmentLayerSet, CATCHMENT_FILL, CATCHMENT_LINE, SCHOOL_LABELS, SCHOOL_POINTS};
pub use registry::{InitGuard, LayerRegistry, RegistryStatus};
pub use style::{insertion_point, LocalityLayer};
