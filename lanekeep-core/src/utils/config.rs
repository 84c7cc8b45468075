//! Tunable parameters for the lane-keeping controller.
//!
//! Every struct deserializes with `#[serde(default)]`, so a JSON file only
//! needs the fields that differ from the stock 320x240 RC car calibration.
//!
//! # Example
//! ```rust
//! use lanekeep_core::utils::config::LaneKeepConfig;
//! let cfg = LaneKeepConfig::from_json(br#"{"planner":{"single_line_gain":400.0}}"#).unwrap();
//! assert_eq!(cfg.planner.single_line_gain, 400.0);
//! assert_eq!(cfg.frame.width, 320);
//! ```

use serde::{Deserialize, Serialize};

/// Errors raised while loading or validating a configuration.
#[derive(Debug)]
pub enum ConfigError {
    Json(serde_json::Error),
    /// Frame width or height is zero.
    EmptyFrame,
    /// Requires `left_limit <= mid <= right_limit`.
    SteeringLimits { left: u16, mid: u16, right: u16 },
    /// Requires `0 <= near_threshold <= mid_threshold`.
    Thresholds { near: f64, mid: f64 },
    /// ROI band must satisfy `roi_top <= roi_bottom <= height`.
    RegionOfInterest { top: u32, bottom: u32 },
    /// PWM frequency outside what the PCA9685 prescaler can reach.
    PwmFrequency(u32),
    /// Channel index above 15.
    Channel(u8),
}

/// Camera frame geometry and nominal rate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FrameGeometry {
    pub width: u32,
    pub height: u32,
    pub rate_hz: u32,
}

impl Default for FrameGeometry {
    fn default() -> Self {
        Self {
            width: 320,
            height: 240,
            rate_hz: 30,
        }
    }
}

/// Parameters handed to the image filtering and line detection collaborators.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PerceptionConfig {
    /// First row of the region of interest.
    pub roi_top: u32,
    /// Last row of the region of interest.
    pub roi_bottom: u32,
    pub canny_low: u32,
    pub canny_high: u32,
    /// Gaussian blur kernel side, in pixels.
    pub blur_kernel: u32,
    /// Hough distance resolution, in pixels.
    pub rho: f64,
    /// Hough angle resolution, in degrees.
    pub theta_deg: f64,
    pub vote_threshold: u32,
    pub min_line_length: u32,
    pub max_line_gap: u32,
}

impl Default for PerceptionConfig {
    fn default() -> Self {
        Self {
            roi_top: 100,
            roi_bottom: 240,
            canny_low: 60,
            canny_high: 180,
            blur_kernel: 5,
            rho: 1.0,
            theta_deg: 1.0,
            vote_threshold: 50,
            min_line_length: 50,
            max_line_gap: 10,
        }
    }
}

/// Pulse widths (us), gains and thresholds of the steering law.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlannerConfig {
    /// Steering pulse for straight ahead.
    pub mid: u16,
    /// Steering pulse for full left.
    pub left_limit: u16,
    /// Steering pulse for full right.
    pub right_limit: u16,
    /// Throttle pulse for a stopped vehicle.
    pub stop: u16,
    /// Throttle pulse for cruising forward.
    pub forward: u16,
    /// Added to `forward` while correcting hard.
    pub fast_delta: u16,
    /// Slope gain when only one boundary is visible.
    pub single_line_gain: f64,
    /// Offset gain inside `near_threshold`.
    pub near_gain: f64,
    /// Offset gain inside `mid_threshold`.
    pub mid_gain: f64,
    /// Offset gain beyond `mid_threshold`.
    pub far_gain: f64,
    pub near_threshold: f64,
    pub mid_threshold: f64,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            mid: 1400,
            left_limit: 1050,
            right_limit: 1750,
            stop: 1500,
            forward: 1400,
            fast_delta: 5,
            single_line_gain: 480.0,
            near_gain: 6.0,
            mid_gain: 12.0,
            far_gain: 30.0,
            near_threshold: 25.0,
            mid_threshold: 35.0,
        }
    }
}

impl PlannerConfig {
    /// Throttle pulse while correcting hard.
    pub fn forward_fast(&self) -> u16 {
        self.forward.saturating_add(self.fast_delta)
    }
}

/// PCA9685 wiring for the steering servo and the ESC.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ActuatorConfig {
    pub i2c_address: u8,
    pub steering_channel: u8,
    pub throttle_channel: u8,
    pub pwm_frequency_hz: u32,
}

impl Default for ActuatorConfig {
    fn default() -> Self {
        Self {
            i2c_address: 0x40,
            steering_channel: 0,
            throttle_channel: 1,
            pwm_frequency_hz: 50,
        }
    }
}

/// Full controller configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LaneKeepConfig {
    pub frame: FrameGeometry,
    pub perception: PerceptionConfig,
    pub planner: PlannerConfig,
    pub actuator: ActuatorConfig,
}

impl LaneKeepConfig {
    /// Parse a JSON document and validate it.
    pub fn from_json(bytes: &[u8]) -> Result<Self, ConfigError> {
        let cfg: Self = serde_json::from_slice(bytes).map_err(ConfigError::Json)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.frame.width == 0 || self.frame.height == 0 {
            return Err(ConfigError::EmptyFrame);
        }

        let p = &self.planner;
        if !(p.left_limit <= p.mid && p.mid <= p.right_limit) {
            return Err(ConfigError::SteeringLimits {
                left: p.left_limit,
                mid: p.mid,
                right: p.right_limit,
            });
        }
        if !(0.0 <= p.near_threshold && p.near_threshold <= p.mid_threshold) {
            return Err(ConfigError::Thresholds {
                near: p.near_threshold,
                mid: p.mid_threshold,
            });
        }

        let roi = &self.perception;
        if roi.roi_top > roi.roi_bottom || roi.roi_bottom > self.frame.height {
            return Err(ConfigError::RegionOfInterest {
                top: roi.roi_top,
                bottom: roi.roi_bottom,
            });
        }

        let a = &self.actuator;
        // Prescale must land in 3..=255.
        if !(24..=1526).contains(&a.pwm_frequency_hz) {
            return Err(ConfigError::PwmFrequency(a.pwm_frequency_hz));
        }
        for ch in [a.steering_channel, a.throttle_channel] {
            if ch > 15 {
                return Err(ConfigError::Channel(ch));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_validate() {
        let cfg = LaneKeepConfig::default();
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.planner.forward_fast(), 1405);
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let cfg = LaneKeepConfig::from_json(br#"{"frame":{"width":640,"height":480}}"#).unwrap();
        assert_eq!(cfg.frame.width, 640);
        assert_eq!(cfg.frame.rate_hz, 30);
        assert_eq!(cfg.planner, PlannerConfig::default());
    }

    #[test]
    fn test_rejects_unordered_limits() {
        let cfg = LaneKeepConfig::from_json(br#"{"planner":{"left_limit":1500}}"#);
        assert!(matches!(cfg, Err(ConfigError::SteeringLimits { left: 1500, .. })));
    }

    #[test]
    fn test_rejects_unordered_thresholds() {
        let cfg = LaneKeepConfig::from_json(br#"{"planner":{"near_threshold":40.0}}"#);
        assert!(matches!(cfg, Err(ConfigError::Thresholds { .. })));
    }

    #[test]
    fn test_rejects_bad_json() {
        assert!(matches!(
            LaneKeepConfig::from_json(b"{not json"),
            Err(ConfigError::Json(_))
        ));
    }

    #[test]
    fn test_rejects_roi_below_frame() {
        let cfg = LaneKeepConfig::from_json(br#"{"perception":{"roi_bottom":300}}"#);
        assert!(matches!(cfg, Err(ConfigError::RegionOfInterest { .. })));
    }
}
