//! Math utilities for the lane-keeping controller.
//!
//! This module provides the slope-intercept geometry shared by the perception stages.

pub mod geometry;
