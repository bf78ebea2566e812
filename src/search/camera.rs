use anyhow::Result;
use geo::{Point, Rect};
use serde::Serialize;

use crate::engine::{MapEngine, MoveTag};

/// Above this longest side (degrees) a bounding box is too coarse to frame tightly.
const TIGHT_FRAME_LIMIT: f64 = 0.5;

const FIT_PADDING: f64 = 60.0;
const FIT_MAX_ZOOM: f64 = 16.0;
const FIT_DURATION_MS: u32 = 1000;
const WIDE_FLY_DURATION_MS: u32 = 2000;
const POINT_FLY_ZOOM: f64 = 14.0;
const POINT_FLY_DURATION_MS: u32 = 1000;

/// Camera placement for a resolved place.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum CameraMove {
    FlyTo { center: Point<f64>, zoom: f64, duration_ms: u32 },
    FitBounds { bounds: Rect<f64>, padding: f64, max_zoom: f64, duration_ms: u32 },
}

/// Discrete zoom for a place whose longest side spans `extent` degrees.
pub fn zoom_for_extent(extent: f64) -> f64 {
    match extent {
        e if e > 5.0 => 6.0,
        e if e > 2.0 => 8.0,
        e if e > 1.0 => 10.0,
        e if e > 0.5 => 12.0,
        _ => 14.0,
    }
}

impl CameraMove {
    /// Fit small boxes directly; fly to the point at a thresholded zoom for large boxes; fly to
    /// the point at a fixed zoom when there is no box at all.
    pub fn plan(center: Point<f64>, bbox: Option<Rect<f64>>) -> Self {
        match bbox {
            Some(bounds) => {
                let longest = bounds.width().max(bounds.height());
                if longest > TIGHT_FRAME_LIMIT {
                    CameraMove::FlyTo { center, zoom: zoom_for_extent(longest), duration_ms: WIDE_FLY_DURATION_MS }
                } else {
                    CameraMove::FitBounds { bounds, padding: FIT_PADDING, max_zoom: FIT_MAX_ZOOM, duration_ms: FIT_DURATION_MS }
                }
            }
            None => CameraMove::FlyTo { center, zoom: POINT_FLY_ZOOM, duration_ms: POINT_FLY_DURATION_MS },
        }
    }

    #[inline]
    pub fn duration_ms(&self) -> u32 {
        match self {
            CameraMove::FlyTo { duration_ms, .. } | CameraMove::FitBounds { duration_ms, .. } => *duration_ms,
        }
    }

    pub fn apply(&self, engine: &mut dyn MapEngine, tag: MoveTag) -> Result<()> {
        match *self {
            CameraMove::FlyTo { center, zoom, duration_ms } => engine.fly_to(center, zoom, duration_ms, tag),
            CameraMove::FitBounds { bounds, padding, max_zoom, duration_ms } => engine.fit_bounds(bounds, padding, max_zoom, duration_ms, tag),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{CameraCall, MemoryEngine};

    fn rect(w: f64, h: f64) -> Rect<f64> { Rect::new((150.0, -30.0), (150.0 + w, -30.0 + h)) }

    #[test]
    fn wide_box_flies_at_zoom_six() {
        let center = Point::new(153.0, -29.5);
        let plan = CameraMove::plan(center, Some(rect(6.0, 1.0)));
        assert_eq!(plan, CameraMove::FlyTo { center, zoom: 6.0, duration_ms: 2000 });
    }

    #[test]
    fn small_box_is_fitted_with_zoom_cap() {
        let bounds = rect(0.2, 0.1);
        let plan = CameraMove::plan(Point::new(150.1, -29.95), Some(bounds));
        assert_eq!(plan, CameraMove::FitBounds { bounds, padding: 60.0, max_zoom: 16.0, duration_ms: 1000 });
    }

    #[test]
    fn zoom_thresholds() {
        assert_eq!(zoom_for_extent(5.5), 6.0);
        assert_eq!(zoom_for_extent(5.0), 8.0);
        assert_eq!(zoom_for_extent(2.5), 8.0);
        assert_eq!(zoom_for_extent(1.5), 10.0);
        assert_eq!(zoom_for_extent(0.75), 12.0);
        assert_eq!(zoom_for_extent(0.5), 14.0);
    }

    #[test]
    fn tall_box_uses_height() {
        match CameraMove::plan(Point::new(0.0, 0.0), Some(rect(0.1, 1.5))) {
            CameraMove::FlyTo { zoom, .. } => assert_eq!(zoom, 10.0),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn no_box_flies_to_point() {
        let center = Point::new(151.2, -33.9);
        let plan = CameraMove::plan(center, None);
        assert_eq!(plan, CameraMove::FlyTo { center, zoom: 14.0, duration_ms: 1000 });

        let mut engine = MemoryEngine::loaded(&[]);
        plan.apply(&mut engine, 7).unwrap();
        assert_eq!(engine.camera_calls(), &[CameraCall::FlyTo { center, zoom: 14.0, duration_ms: 1000, tag: 7 }]);
        assert_eq!(engine.zoom(), 14.0);
    }

    #[test]
    fn fitted_box_lands_at_the_zoom_cap() {
        let mut engine = MemoryEngine::loaded(&[]);
        CameraMove::plan(Point::new(150.1, -29.95), Some(rect(0.02, 0.01))).apply(&mut engine, 1).unwrap();
        assert_eq!(engine.zoom(), 16.0);
    }
}
