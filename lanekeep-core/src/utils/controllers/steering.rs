//! Piecewise-gain steering law.
//!
//! The planner maps a [`LaneEstimate`] to a steering/throttle pulse pair:
//!
//! - two lines: steer toward the midpoint of the two top endpoints, with a
//!   gain that grows with the offset from the frame center
//! - one line: steer against the line's slope
//! - no lines: center the wheels and stop
//!
//! The steering pulse is always clamped to `[left_limit, right_limit]`.

use serde::{Deserialize, Serialize};

use crate::utils::{config::PlannerConfig, perception::LaneEstimate};

/// Steering and throttle pulse widths in microseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SteeringCommand {
    pub direction: u16,
    pub speed: u16,
}

impl SteeringCommand {
    pub const fn new(
        direction: u16,
        speed: u16,
    ) -> Self {
        Self { direction, speed }
    }

    /// Wheels centered, throttle at stop.
    pub fn neutral(cfg: &PlannerConfig) -> Self {
        Self::new(cfg.mid, cfg.stop)
    }
}

/// Maps a lane estimate to a clamped steering/throttle command.
pub struct SteeringPlanner {
    cfg: PlannerConfig,
    half_width: f64,
}

impl SteeringPlanner {
    pub fn new(
        cfg: PlannerConfig,
        frame_width: u32,
    ) -> Self {
        Self {
            cfg,
            half_width: f64::from(frame_width) / 2.0,
        }
    }

    pub fn config(&self) -> &PlannerConfig {
        &self.cfg
    }

    /// Compute the command for one frame's estimate.
    ///
    /// `fallback` is the steering pulse used when the single-line slope is
    /// undefined or the law yields a non-finite value; `None` means `mid`.
    pub fn plan(
        &self,
        estimate: &LaneEstimate,
        fallback: Option<u16>,
    ) -> SteeringCommand {
        let c = &self.cfg;
        let mid = f64::from(c.mid);

        let (raw, speed) = match estimate.lines() {
            [left, right] => {
                let offset = (f64::from(left.x2) + f64::from(right.x2)) / 2.0 - self.half_width;
                let magnitude = libm::fabs(offset);
                if magnitude < c.near_threshold {
                    (Some(mid + offset * c.near_gain), c.forward)
                } else if magnitude < c.mid_threshold {
                    (Some(mid + offset * c.mid_gain), c.forward)
                } else {
                    (Some(mid + offset * c.far_gain), c.forward_fast())
                }
            }
            [line] => {
                let raw = line.slope().map(|m| mid - m * c.single_line_gain);
                if raw.is_none() {
                    tracing::warn!(?line, "single lane line is vertical, using fallback steering");
                }
                (raw, c.forward_fast())
            }
            _ => (Some(mid), c.stop),
        };

        let direction = match raw.filter(|d| d.is_finite()) {
            Some(d) => self.clamp(d),
            None => self.clamp(f64::from(fallback.unwrap_or(c.mid))),
        };
        SteeringCommand { direction, speed }
    }

    /// Clamp to the steering limits and truncate to whole microseconds.
    pub fn clamp(
        &self,
        direction: f64,
    ) -> u16 {
        let (lo, hi) = (f64::from(self.cfg.left_limit), f64::from(self.cfg.right_limit));
        let d = if direction < lo {
            lo
        } else if direction > hi {
            hi
        } else {
            direction
        };
        libm::trunc(d) as u16
    }
}
