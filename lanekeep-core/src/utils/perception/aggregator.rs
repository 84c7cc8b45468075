//! Per-side averaging of boundary candidates into a lane estimate.
//!
//! Each non-empty bucket is reduced to its mean slope and intercept, then
//! rebuilt as a segment from the bottom row of the frame up to two fifths of
//! the frame height. A side whose mean fit cannot be rebuilt is reported as a
//! [`SideFailure`] instead of a line.

use heapless::Vec;
use serde::{Deserialize, Serialize};

use super::{classifier::Classified, Side};
use crate::utils::math::geometry::{DegenerateFit, LineFit, LineSegment};

/// Zero, one or two reconstructed boundary lines, left before right.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LaneEstimate {
    lines: Vec<LineSegment, 2>,
}

impl LaneEstimate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build an estimate from up to two segments, ordered `[left, right]`.
    ///
    /// Returns `None` if more than two segments are given.
    pub fn from_lines(lines: &[LineSegment]) -> Option<Self> {
        Vec::from_slice(lines).ok().map(|lines| Self { lines })
    }

    pub fn lines(&self) -> &[LineSegment] {
        &self.lines
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

/// A side whose averaged fit could not be rebuilt into pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SideFailure {
    pub side: Side,
    pub reason: DegenerateFit,
}

/// Aggregation output: the estimate plus any per-side reconstruction failures.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LaneAggregate {
    pub estimate: LaneEstimate,
    pub failures: Vec<SideFailure, 2>,
}

impl LaneAggregate {
    /// Whether any side failed to reconstruct this frame.
    pub fn is_degenerate(&self) -> bool {
        !self.failures.is_empty()
    }
}

/// Reduces classified buckets to one line per side.
#[derive(Debug, Clone, Copy)]
pub struct LaneAggregator {
    y_bottom: i32,
    y_top: i32,
}

impl LaneAggregator {
    pub fn new(frame_height: u32) -> Self {
        let h = frame_height.min(i32::MAX as u32) as i32;
        Self {
            y_bottom: h,
            // floor(2H / 5) for any non-negative height.
            y_top: (h as i64 * 2 / 5) as i32,
        }
    }

    /// Rows spanned by every reconstructed line, `(bottom, top)`.
    pub fn rows(&self) -> (i32, i32) {
        (self.y_bottom, self.y_top)
    }

    /// Mean fit for one bucket rebuilt into a segment, `None` for an empty bucket.
    pub fn reduce(
        &self,
        bucket: &[LineFit],
    ) -> Option<Result<LineSegment, DegenerateFit>> {
        LineFit::mean(bucket).map(|fit| fit.reconstruct(self.y_bottom, self.y_top))
    }

    pub fn aggregate(
        &self,
        classified: &Classified,
    ) -> LaneAggregate {
        let mut out = LaneAggregate::default();
        for (side, bucket) in [
            (Side::Left, classified.left.as_slice()),
            (Side::Right, classified.right.as_slice()),
        ] {
            match self.reduce(bucket) {
                None => {}
                // Capacity is two and each side pushes at most once.
                Some(Ok(line)) => {
                    let _ = out.estimate.lines.push(line);
                }
                Some(Err(reason)) => {
                    tracing::warn!(?side, ?reason, "lane line reconstruction failed");
                    let _ = out.failures.push(SideFailure { side, reason });
                }
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;

    fn classified(
        left: &[LineFit],
        right: &[LineFit],
    ) -> Classified {
        Classified {
            left: left.to_vec(),
            right: right.to_vec(),
            discarded: 0,
        }
    }

    #[test]
    fn test_rows_for_default_frame() {
        assert_eq!(LaneAggregator::new(240).rows(), (240, 96));
        assert_eq!(LaneAggregator::new(101).rows(), (101, 40));
    }

    #[test]
    fn test_both_sides_left_first() {
        let agg = LaneAggregator::new(240);
        let out = agg.aggregate(&classified(
            &[LineFit::new(-2.0, 340.0)],
            &[LineFit::new(2.0, -300.0)],
        ));
        assert!(!out.is_degenerate());
        assert_eq!(
            out.estimate.lines(),
            &[
                LineSegment::new(50, 240, 122, 96),
                LineSegment::new(270, 240, 198, 96)
            ]
        );
    }

    #[test]
    fn test_bucket_mean_is_unweighted() {
        let agg = LaneAggregator::new(240);
        let out = agg.aggregate(&classified(
            &[LineFit::new(-1.0, 300.0), LineFit::new(-3.0, 380.0)],
            &[],
        ));
        // mean fit is y = -2x + 340
        assert_eq!(out.estimate.lines(), &[LineSegment::new(50, 240, 122, 96)]);
    }

    #[test]
    fn test_empty_buckets_give_empty_estimate() {
        let out = LaneAggregator::new(240).aggregate(&Classified::default());
        assert!(out.estimate.is_empty());
        assert!(!out.is_degenerate());
    }

    #[test]
    fn test_zero_slope_side_is_dropped_other_side_kept() {
        let agg = LaneAggregator::new(240);
        let out = agg.aggregate(&classified(
            &[LineFit::new(0.0, 150.0)],
            &[LineFit::new(2.0, -300.0)],
        ));
        assert_eq!(out.estimate.lines(), &[LineSegment::new(270, 240, 198, 96)]);
        assert_eq!(
            out.failures.as_slice(),
            &[SideFailure {
                side: Side::Left,
                reason: DegenerateFit::ZeroSlope
            }]
        );
        assert!(out.is_degenerate());
    }

    #[test]
    fn test_estimate_caps_at_two_lines() {
        let seg = LineSegment::new(0, 240, 10, 96);
        assert!(LaneEstimate::from_lines(&vec![seg; 2]).is_some());
        assert!(LaneEstimate::from_lines(&vec![seg; 3]).is_none());
    }
}
