//! Perception stages that turn raw line segments into a lane estimate.
//!
//! - `classifier`: buckets segments into left/right boundary candidates
//! - `aggregator`: averages each bucket and rebuilds one boundary line per side

pub mod aggregator;
pub mod classifier;

use serde::{Deserialize, Serialize};

pub use aggregator::{LaneAggregate, LaneAggregator, LaneEstimate, SideFailure};
pub use classifier::{Classified, LineClassifier};

/// Lane boundary side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    Left,
    Right,
}
