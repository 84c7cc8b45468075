//! Slope-intercept geometry for detected lane boundary segments.
//!
//! A `LineSegment` is the raw pixel output of the line detector. A `LineFit`
//! is the exact `y = slope * x + intercept` line through a segment's two
//! endpoints, and can be rebuilt into a segment spanning a fixed band of rows.
//!
//! # Example
//! ```rust
//! use lanekeep_core::utils::math::geometry::{LineFit, LineSegment};
//! let fit = LineFit::through(&LineSegment::new(50, 240, 120, 100)).unwrap();
//! let seg = fit.reconstruct(240, 96).unwrap();
//! assert_eq!(seg, LineSegment::new(50, 240, 122, 96));
//! ```

use serde::{Deserialize, Serialize};

/// Decimal digits kept on a fit before it is rebuilt into pixels.
pub const FIT_PRECISION_DIGITS: i32 = 8;

/// Line segment in pixel coordinates, `(x1, y1)` to `(x2, y2)`.
///
/// Deserializes from either `{"x1":..}` objects or `[x1, y1, x2, y2]` arrays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineSegment {
    pub x1: i32,
    pub y1: i32,
    pub x2: i32,
    pub y2: i32,
}

impl LineSegment {
    pub const fn new(
        x1: i32,
        y1: i32,
        x2: i32,
        y2: i32,
    ) -> Self {
        Self { x1, y1, x2, y2 }
    }

    /// Whether both endpoints share a column, leaving the slope undefined.
    pub fn is_vertical(&self) -> bool {
        self.x1 == self.x2
    }

    /// Slope `dy / dx`, or `None` for a vertical segment.
    pub fn slope(&self) -> Option<f64> {
        if self.is_vertical() {
            return None;
        }
        let dy = f64::from(self.y2) - f64::from(self.y1);
        let dx = f64::from(self.x2) - f64::from(self.x1);
        Some(dy / dx)
    }
}

/// Reasons a line cannot be expressed or rebuilt in slope-intercept form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DegenerateFit {
    /// Both endpoints share an x coordinate.
    Vertical,
    /// A horizontal fit never reaches the target rows.
    ZeroSlope,
    /// The solved column is NaN, infinite or outside the pixel range.
    NonFinite,
}

/// A line in slope-intercept form, `y = slope * x + intercept`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LineFit {
    pub slope: f64,
    pub intercept: f64,
}

impl LineFit {
    pub const fn new(
        slope: f64,
        intercept: f64,
    ) -> Self {
        Self { slope, intercept }
    }

    /// Exact line through the two endpoints of `segment`.
    pub fn through(segment: &LineSegment) -> Result<Self, DegenerateFit> {
        let slope = segment.slope().ok_or(DegenerateFit::Vertical)?;
        let intercept = f64::from(segment.y1) - slope * f64::from(segment.x1);
        Ok(Self { slope, intercept })
    }

    /// Unweighted mean of slopes and intercepts, `None` when `fits` is empty.
    pub fn mean(fits: &[LineFit]) -> Option<Self> {
        if fits.is_empty() {
            return None;
        }
        let n = fits.len() as f64;
        let (slope, intercept) = fits
            .iter()
            .fold((0.0, 0.0), |(s, b), f| (s + f.slope, b + f.intercept));
        Some(Self {
            slope: slope / n,
            intercept: intercept / n,
        })
    }

    /// Round slope and intercept to [`FIT_PRECISION_DIGITS`] decimal places.
    pub fn rounded(&self) -> Self {
        Self {
            slope: round_to(self.slope, FIT_PRECISION_DIGITS),
            intercept: round_to(self.intercept, FIT_PRECISION_DIGITS),
        }
    }

    /// Column at which the line crosses row `y`, truncated toward zero.
    pub fn solve_x(
        &self,
        y: i32,
    ) -> Result<i32, DegenerateFit> {
        if self.slope == 0.0 {
            return Err(DegenerateFit::ZeroSlope);
        }
        let x = libm::trunc((f64::from(y) - self.intercept) / self.slope);
        if !x.is_finite() || x < f64::from(i32::MIN) || x > f64::from(i32::MAX) {
            return Err(DegenerateFit::NonFinite);
        }
        Ok(x as i32)
    }

    /// Rebuild a segment from row `y_bottom` to row `y_top` after rounding.
    pub fn reconstruct(
        &self,
        y_bottom: i32,
        y_top: i32,
    ) -> Result<LineSegment, DegenerateFit> {
        let fit = self.rounded();
        let x1 = fit.solve_x(y_bottom)?;
        let x2 = fit.solve_x(y_top)?;
        Ok(LineSegment::new(x1, y_bottom, x2, y_top))
    }
}

fn round_to(
    value: f64,
    digits: i32,
) -> f64 {
    let scale = libm::pow(10.0, f64::from(digits));
    let scaled = value * scale;
    if !scaled.is_finite() {
        return value;
    }
    libm::round(scaled) / scale
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fit_through_two_points() {
        let fit = LineFit::through(&LineSegment::new(50, 240, 120, 100)).unwrap();
        assert_eq!(fit.slope, -2.0);
        assert_eq!(fit.intercept, 340.0);
    }

    #[test]
    fn test_vertical_segment_has_no_fit() {
        let seg = LineSegment::new(80, 10, 80, 200);
        assert!(seg.is_vertical());
        assert_eq!(LineFit::through(&seg), Err(DegenerateFit::Vertical));
    }

    #[test]
    fn test_slope_spans_full_pixel_range() {
        let seg = LineSegment::new(i32::MIN, 0, i32::MAX, 10);
        let slope = seg.slope().unwrap();
        assert!(slope > 0.0 && slope < 1e-8);

        let fit = LineFit::through(&LineSegment::new(i32::MAX, i32::MIN, i32::MIN, i32::MAX)).unwrap();
        assert_eq!(fit.slope, -1.0);
    }

    #[test]
    fn test_mean_is_unweighted() {
        let fits = [LineFit::new(-1.0, 300.0), LineFit::new(-3.0, 100.0)];
        let mean = LineFit::mean(&fits).unwrap();
        assert_eq!(mean, LineFit::new(-2.0, 200.0));
        assert!(LineFit::mean(&[]).is_none());
    }

    #[test]
    fn test_rounding_damps_noise() {
        let fit = LineFit::new(-2.000_000_000_4, 339.999_999_999_7).rounded();
        assert_eq!(fit, LineFit::new(-2.0, 340.0));
    }

    #[test]
    fn test_solve_x_truncates_toward_zero() {
        // x = (96 - 0) / -7 = -13.71..
        let fit = LineFit::new(-7.0, 0.0);
        assert_eq!(fit.solve_x(96), Ok(-13));
        // x = (100 - 0) / 3 = 33.33..
        assert_eq!(LineFit::new(3.0, 0.0).solve_x(100), Ok(33));
    }

    #[test]
    fn test_zero_slope_fails_reconstruction() {
        let fit = LineFit::new(0.0, 150.0);
        assert_eq!(fit.reconstruct(240, 96), Err(DegenerateFit::ZeroSlope));
    }

    #[test]
    fn test_tiny_slope_is_non_finite() {
        let fit = LineFit::new(1e-300, 0.0);
        assert_eq!(fit.solve_x(240), Err(DegenerateFit::NonFinite));
    }

    #[test]
    fn test_reconstruct_spans_rows() {
        let fit = LineFit::new(2.0, -300.0);
        assert_eq!(
            fit.reconstruct(240, 96),
            Ok(LineSegment::new(270, 240, 198, 96))
        );
    }
}
