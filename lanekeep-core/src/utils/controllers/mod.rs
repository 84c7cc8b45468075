//! Module Exports
//!
//! This file exports the controllers that turn a lane estimate into motion,
//! and hosts the per-frame control loop.
//!
//! - `steering`: piecewise-gain steering law and output clamping
//! - `actuator`: servo/ESC pulse output over a PCA9685
//! - `operator`: stop / preview commands from the operator

pub mod actuator;
pub mod operator;
pub mod steering;

use alloc::vec::Vec;
use serde::{Deserialize, Serialize};

pub use actuator::{Actuator, ActuatorError, Pca9685Actuator};
pub use operator::{NoOperator, OperatorCommand, OperatorInput};
pub use steering::{SteeringCommand, SteeringPlanner};

use crate::utils::{
    config::LaneKeepConfig,
    math::geometry::LineSegment,
    perception::{LaneAggregator, LaneEstimate, LineClassifier, SideFailure},
};

/// Lazy sequence of camera frames. May block until the next frame is ready.
pub trait FrameSource {
    type Frame;
    type Error: core::fmt::Debug;

    /// Next frame, or `None` once the stream has ended.
    fn next_frame(&mut self) -> Result<Option<Self::Frame>, Self::Error>;
}

/// Edge filtering and line-segment detection over one frame.
pub trait LineDetector<F> {
    fn detect(
        &mut self,
        frame: &F,
    ) -> Vec<LineSegment>;
}

/// Optional visualization of each processed frame.
pub trait Preview<F> {
    fn show(
        &mut self,
        frame: &F,
        report: &FrameReport,
    );
}

impl<F> Preview<F> for () {
    fn show(
        &mut self,
        _frame: &F,
        _report: &FrameReport,
    ) {
    }
}

/// Everything the loop decided for one frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameReport {
    pub frame: u64,
    pub segments: usize,
    pub discarded: usize,
    pub estimate: LaneEstimate,
    pub failures: heapless::Vec<SideFailure, 2>,
    pub command: SteeringCommand,
}

/// Why the loop returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownReason {
    OperatorStop,
    EndOfStream,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Shutdown {
    pub reason: ShutdownReason,
    pub frames: u64,
}

/// Fatal boundary I/O failure.
#[derive(Debug)]
pub enum LoopError<S, A> {
    Source(S),
    Actuator(A),
}

/// Single-threaded frame-paced controller.
///
/// Each iteration acquires a frame, detects segments, classifies and
/// aggregates them, plans a command and dispatches it. The only state carried
/// between frames is the last committed command.
pub struct ControlLoop<S, D, A, V = ()> {
    source: S,
    detector: D,
    actuator: A,
    preview: V,
    preview_on: bool,
    classifier: LineClassifier,
    aggregator: LaneAggregator,
    planner: SteeringPlanner,
    last: SteeringCommand,
    frames: u64,
}

impl<S, D, A> ControlLoop<S, D, A>
where
    S: FrameSource,
    D: LineDetector<S::Frame>,
    A: Actuator,
{
    pub fn new(
        cfg: &LaneKeepConfig,
        source: S,
        detector: D,
        actuator: A,
    ) -> Self {
        Self {
            source,
            detector,
            actuator,
            preview: (),
            preview_on: false,
            classifier: LineClassifier::new(cfg.frame.width),
            aggregator: LaneAggregator::new(cfg.frame.height),
            planner: SteeringPlanner::new(cfg.planner, cfg.frame.width),
            last: SteeringCommand::neutral(&cfg.planner),
            frames: 0,
        }
    }
}

impl<S, D, A, V> ControlLoop<S, D, A, V>
where
    S: FrameSource,
    D: LineDetector<S::Frame>,
    A: Actuator,
    V: Preview<S::Frame>,
{
    /// Attach a preview, initially shown or hidden.
    pub fn with_preview<P: Preview<S::Frame>>(
        self,
        preview: P,
        enabled: bool,
    ) -> ControlLoop<S, D, A, P> {
        ControlLoop {
            source: self.source,
            detector: self.detector,
            actuator: self.actuator,
            preview,
            preview_on: enabled,
            classifier: self.classifier,
            aggregator: self.aggregator,
            planner: self.planner,
            last: self.last,
            frames: self.frames,
        }
    }

    /// Last command handed to the actuator.
    pub fn last_command(&self) -> SteeringCommand {
        self.last
    }

    pub fn actuator(&self) -> &A {
        &self.actuator
    }

    pub fn preview(&self) -> &V {
        &self.preview
    }

    /// Run the perception-to-steering pipeline on one frame's segments.
    ///
    /// Pure apart from reading the last committed steering pulse, which is the
    /// fallback unless a side fails to reconstruct this frame, in which case
    /// the fallback is `mid`.
    pub fn evaluate(
        &self,
        segments: &[LineSegment],
    ) -> FrameReport {
        let classified = self.classifier.classify(segments);
        let aggregate = self.aggregator.aggregate(&classified);
        let fallback = if aggregate.is_degenerate() {
            self.planner.config().mid
        } else {
            self.last.direction
        };
        let command = self.planner.plan(&aggregate.estimate, Some(fallback));
        FrameReport {
            frame: self.frames,
            segments: segments.len(),
            discarded: classified.discarded,
            estimate: aggregate.estimate,
            failures: aggregate.failures,
            command,
        }
    }

    /// Process one acquired frame and dispatch its command.
    pub fn step(
        &mut self,
        frame: &S::Frame,
    ) -> Result<FrameReport, A::Error> {
        let segments = self.detector.detect(frame);
        let report = self.evaluate(&segments);
        self.actuator.dispatch(&report.command)?;
        self.last = report.command;
        self.frames += 1;

        tracing::debug!(
            frame = report.frame,
            segments = report.segments,
            lines = report.estimate.len(),
            direction = report.command.direction,
            speed = report.command.speed,
            "frame processed"
        );
        if self.preview_on {
            self.preview.show(frame, &report);
        }
        Ok(report)
    }

    /// Write `(mid, stop)` to the actuator.
    pub fn neutral(&mut self) -> Result<(), A::Error> {
        let neutral = SteeringCommand::neutral(self.planner.config());
        self.actuator.dispatch(&neutral)?;
        self.last = neutral;
        Ok(())
    }

    /// Drive frames until the operator stops the loop or the source ends.
    ///
    /// The neutral command is written on every exit path, including fatal
    /// source or actuator errors, which are returned afterwards.
    pub fn run<O: OperatorInput + ?Sized>(
        &mut self,
        operator: &O,
    ) -> Result<Shutdown, LoopError<S::Error, A::Error>> {
        tracing::info!("control loop started");
        let outcome = self.drive(operator);

        let neutral = self.neutral();
        match (&outcome, neutral) {
            (Ok(shutdown), Ok(())) => {
                tracing::info!(reason = ?shutdown.reason, frames = shutdown.frames, "control loop stopped");
            }
            (Ok(_), Err(e)) => {
                tracing::error!(error = ?e, "failed to write neutral command");
                return Err(LoopError::Actuator(e));
            }
            (Err(e), Ok(())) => tracing::error!(error = ?e, "control loop aborted"),
            (Err(e), Err(ne)) => {
                tracing::error!(error = ?e, neutral = ?ne, "control loop aborted, neutral write failed")
            }
        }
        outcome
    }

    fn drive<O: OperatorInput + ?Sized>(
        &mut self,
        operator: &O,
    ) -> Result<Shutdown, LoopError<S::Error, A::Error>> {
        loop {
            let Some(frame) = self.source.next_frame().map_err(LoopError::Source)? else {
                return Ok(self.shutdown(ShutdownReason::EndOfStream));
            };
            self.step(&frame).map_err(LoopError::Actuator)?;

            while let Some(cmd) = operator.poll() {
                match cmd {
                    OperatorCommand::Stop => {
                        return Ok(self.shutdown(ShutdownReason::OperatorStop));
                    }
                    OperatorCommand::TogglePreview => {
                        self.preview_on = !self.preview_on;
                        tracing::info!(enabled = self.preview_on, "preview toggled");
                    }
                }
            }
        }
    }

    fn shutdown(
        &self,
        reason: ShutdownReason,
    ) -> Shutdown {
        Shutdown {
            reason,
            frames: self.frames,
        }
    }
}
