//! Utility re-exports for the lane-keeping controller.
//!
//! This module re-exports the per-frame pipeline stages and the hardware-facing
//! controllers:
//!
//! - `config`: tunable gains, limits and collaborator parameters
//! - `controllers`: steering planner, PCA9685 actuator, operator input and the control loop
//! - `math`: slope-intercept line fitting and reconstruction
//! - `perception`: left/right classification and per-side averaging of line segments

pub mod config;
pub mod controllers;
pub mod math;
pub mod perception;

pub use config::LaneKeepConfig;
pub use controllers::{ControlLoop, SteeringCommand, SteeringPlanner};
pub use math::geometry::{LineFit, LineSegment};
pub use perception::{LaneAggregator, LaneEstimate, LineClassifier};
