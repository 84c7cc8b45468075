//! Left/right classification of raw line segments.
//!
//! Rules are applied in order and the first match wins: a segment whose
//! endpoints both lie left of `5W/8` is a left candidate, otherwise one whose
//! endpoints both lie right of `3W/8` is a right candidate, otherwise it is
//! dropped. Segments entirely inside the `(3W/8, 5W/8)` band are therefore
//! always left candidates.

use alloc::vec::Vec;

use serde::{Deserialize, Serialize};

use super::Side;
use crate::utils::math::geometry::{LineFit, LineSegment};

/// Segments bucketed by side, as slope-intercept fits.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Classified {
    pub left: Vec<LineFit>,
    pub right: Vec<LineFit>,
    pub discarded: usize,
}

/// Buckets segments by horizontal position within a frame of fixed width.
#[derive(Debug, Clone, Copy)]
pub struct LineClassifier {
    left_bound: f64,
    right_bound: f64,
}

impl LineClassifier {
    pub fn new(frame_width: u32) -> Self {
        let w = f64::from(frame_width);
        Self {
            left_bound: w * 5.0 / 8.0,
            right_bound: w * 3.0 / 8.0,
        }
    }

    /// Side for a segment by the first-match rule, ignoring its slope.
    pub fn side_of(
        &self,
        segment: &LineSegment,
    ) -> Option<Side> {
        let (x1, x2) = (f64::from(segment.x1), f64::from(segment.x2));
        if x1 < self.left_bound && x2 < self.left_bound {
            Some(Side::Left)
        } else if x1 > self.right_bound && x2 > self.right_bound {
            Some(Side::Right)
        } else {
            None
        }
    }

    /// Classify every segment in input order.
    ///
    /// Vertical segments are discarded before classification since they have
    /// no slope-intercept form.
    pub fn classify(
        &self,
        segments: &[LineSegment],
    ) -> Classified {
        let mut out = Classified::default();
        for segment in segments {
            let Ok(fit) = LineFit::through(segment) else {
                tracing::trace!(?segment, "vertical segment dropped");
                out.discarded += 1;
                continue;
            };
            match self.side_of(segment) {
                Some(Side::Left) => out.left.push(fit),
                Some(Side::Right) => out.right.push(fit),
                None => out.discarded += 1,
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;

    #[test]
    fn test_overlap_band_is_left_only() {
        let c = LineClassifier::new(320);
        let seg = LineSegment::new(150, 240, 150, 100);
        assert_eq!(c.side_of(&seg), Some(Side::Left));

        let slanted = LineSegment::new(130, 240, 190, 100);
        let out = c.classify(&[slanted]);
        assert_eq!(out.left.len(), 1);
        assert!(out.right.is_empty());
    }

    #[test]
    fn test_straddling_segment_is_discarded() {
        let c = LineClassifier::new(320);
        let seg = LineSegment::new(100, 240, 250, 100);
        assert_eq!(c.side_of(&seg), None);
        let out = c.classify(&[seg]);
        assert!(out.left.is_empty() && out.right.is_empty());
        assert_eq!(out.discarded, 1);
    }

    #[test]
    fn test_vertical_segment_is_discarded() {
        let c = LineClassifier::new(320);
        let out = c.classify(&[LineSegment::new(40, 240, 40, 100)]);
        assert!(out.left.is_empty());
        assert_eq!(out.discarded, 1);
    }

    #[test]
    fn test_extreme_columns_are_discarded() {
        let c = LineClassifier::new(320);
        let out = c.classify(&[LineSegment::new(i32::MIN, 0, i32::MAX, 10)]);
        assert!(out.left.is_empty() && out.right.is_empty());
        assert_eq!(out.discarded, 1);
    }

    #[test]
    fn test_bounds_are_strict() {
        let c = LineClassifier::new(320);
        // x = 200 is not < 5W/8, and x = 120 is not > 3W/8.
        assert_eq!(c.side_of(&LineSegment::new(200, 240, 250, 100)), Some(Side::Right));
        assert_eq!(c.side_of(&LineSegment::new(120, 240, 60, 100)), Some(Side::Left));
        assert_eq!(c.side_of(&LineSegment::new(120, 240, 200, 100)), None);
    }

    #[test]
    fn test_mixed_frame_keeps_input_order() {
        let c = LineClassifier::new(320);
        let segments = vec![
            LineSegment::new(50, 240, 120, 100),
            LineSegment::new(270, 240, 200, 100),
            LineSegment::new(40, 240, 110, 100),
            LineSegment::new(10, 200, 300, 180),
        ];
        let out = c.classify(&segments);
        assert_eq!(out.left.len(), 2);
        assert_eq!(out.right.len(), 1);
        assert_eq!(out.discarded, 1);
        assert_eq!(out.left[0], LineFit::new(-2.0, 340.0));
        assert_eq!(out.right[0], LineFit::new(2.0, -300.0));
    }
}
