//! Operator input for the control loop.
//!
//! The loop polls an [`OperatorInput`] once per frame and drains every
//! pending command. A `Channel` from `embassy-sync` is the stock input: any
//! thread or task holding a reference can `try_send` into it.

use embassy_sync::{blocking_mutex::raw::RawMutex, channel::Channel};
use serde::{Deserialize, Serialize};

/// Operator command variants.
///
/// Serialized as JSON with tag `"oc"`.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(tag = "oc", rename_all = "snake_case")]
pub enum OperatorCommand {
    /// Write the neutral command and leave the loop.
    Stop,
    /// Switch the lane preview on or off.
    TogglePreview,
}

impl OperatorCommand {
    /// Keyboard binding: `p` stops, `v` toggles the preview.
    pub fn from_key(key: u8) -> Option<Self> {
        match key.to_ascii_lowercase() {
            b'p' => Some(Self::Stop),
            b'v' => Some(Self::TogglePreview),
            _ => None,
        }
    }

    /// Parse a single key or a JSON command such as `{"oc":"stop"}`.
    pub fn parse(input: &str) -> Option<Self> {
        let input = input.trim();
        match input.as_bytes() {
            [key] => Self::from_key(*key),
            _ => serde_json::from_str(input).ok(),
        }
    }
}

/// Non-blocking source of operator commands.
pub trait OperatorInput {
    fn poll(&self) -> Option<OperatorCommand>;
}

impl<M: RawMutex, const N: usize> OperatorInput for Channel<M, OperatorCommand, N> {
    fn poll(&self) -> Option<OperatorCommand> {
        self.try_receive().ok()
    }
}

/// An input that never issues commands; the loop then runs until its source ends.
pub struct NoOperator;

impl OperatorInput for NoOperator {
    fn poll(&self) -> Option<OperatorCommand> {
        None
    }
}
