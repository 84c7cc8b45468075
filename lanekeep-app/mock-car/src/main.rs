use anyhow::{anyhow, Context, Result};
use clap::Parser;
use core::cell::RefCell;
use embassy_sync::{blocking_mutex::raw::CriticalSectionRawMutex, channel::Channel};
use embassy_time::{Duration, Instant};
use embedded_hal::i2c::{ErrorType, I2c, Operation};
use lanekeep_core::utils::config::{LaneKeepConfig, PerceptionConfig};
use lanekeep_core::utils::controllers::{
    ControlLoop, FrameReport, FrameSource, LineDetector, OperatorCommand, Pca9685Actuator, Preview,
};
use lanekeep_core::utils::math::geometry::LineSegment;
use std::convert::Infallible;
use std::io::{BufRead, BufReader};
use std::path::PathBuf;
use tracing::{debug, error, info, warn};

/// Operator commands from stdin, drained by the control loop once per frame.
static OPERATOR_CHANNEL: Channel<CriticalSectionRawMutex, OperatorCommand, 8> = Channel::new();

#[derive(Parser)]
#[clap(version = "1.0")]
struct Opts
{
    /// Recording with one JSON array of [x1, y1, x2, y2] segments per frame line
    #[clap(long)]
    replay: PathBuf,
    /// JSON configuration; missing fields take the stock calibration
    #[clap(long)]
    config: Option<PathBuf>,
    /// start with the lane preview shown
    #[clap(long)]
    preview: bool,
    /// process frames as fast as possible instead of at the camera rate
    #[clap(long)]
    no_pacing: bool,
}

/// Frame replayed from a recording of detector output.
struct ReplayFrame {
    index: u64,
    segments: Vec<LineSegment>,
}

struct ReplaySource {
    lines: std::io::Lines<BufReader<std::fs::File>>,
    index: u64,
    period: Option<Duration>,
    deadline: Option<Instant>,
}

impl ReplaySource {
    fn open(
        path: &PathBuf,
        rate_hz: u32,
        paced: bool,
    ) -> Result<Self> {
        let file = std::fs::File::open(path)
            .with_context(|| format!("opening recording {}", path.display()))?;
        Ok(Self {
            lines: BufReader::new(file).lines(),
            index: 0,
            period: paced.then(|| Duration::from_hz(u64::from(rate_hz.max(1)))),
            deadline: None,
        })
    }

    /// Block until the next frame slot, like a camera at its nominal rate.
    fn pace(&mut self) {
        let Some(period) = self.period else {
            return;
        };
        let now = Instant::now();
        if let Some(deadline) = self.deadline {
            if now < deadline {
                embassy_time::block_for(deadline - now);
            } else {
                debug!(late_us = (now - deadline).as_micros(), "frame deadline missed");
            }
        }
        self.deadline = Some(self.deadline.unwrap_or(now).max(now) + period);
    }
}

impl FrameSource for ReplaySource {
    type Frame = ReplayFrame;
    type Error = anyhow::Error;

    fn next_frame(&mut self) -> Result<Option<ReplayFrame>> {
        let Some(line) = self.lines.next() else {
            return Ok(None);
        };
        let line = line.context("reading recording")?;
        let text = line.trim();
        let segments = if text.is_empty() {
            Vec::new()
        } else {
            serde_json::from_str(text)
                .map_err(|e| anyhow!("frame {}: bad segment list: {e}", self.index))?
        };
        self.pace();
        let frame = ReplayFrame {
            index: self.index,
            segments,
        };
        self.index += 1;
        Ok(Some(frame))
    }
}

/// Keeps segments whose endpoints both fall inside the frame columns and the
/// region-of-interest rows.
struct RoiDetector {
    top: i32,
    bottom: i32,
    width: i32,
}

impl RoiDetector {
    fn new(
        cfg: &PerceptionConfig,
        frame_width: u32,
    ) -> Self {
        Self {
            top: cfg.roi_top as i32,
            bottom: cfg.roi_bottom as i32,
            width: i32::try_from(frame_width).unwrap_or(i32::MAX),
        }
    }

    fn keeps(
        &self,
        s: &LineSegment,
    ) -> bool {
        let row = |y: i32| (self.top..=self.bottom).contains(&y);
        let col = |x: i32| (0..=self.width).contains(&x);
        row(s.y1) && row(s.y2) && col(s.x1) && col(s.x2)
    }
}

impl LineDetector<ReplayFrame> for RoiDetector {
    fn detect(
        &mut self,
        frame: &ReplayFrame,
    ) -> Vec<LineSegment> {
        let kept: Vec<LineSegment> = frame
            .segments
            .iter()
            .copied()
            .filter(|s| self.keeps(s))
            .collect();
        if kept.len() < frame.segments.len() {
            debug!(
                frame = frame.index,
                dropped = frame.segments.len() - kept.len(),
                "segments outside ROI"
            );
        }
        kept
    }
}

/// Prints every report as one JSON line on stdout.
struct JsonPreview;

impl Preview<ReplayFrame> for JsonPreview {
    fn show(
        &mut self,
        _frame: &ReplayFrame,
        report: &FrameReport,
    ) {
        match serde_json::to_string(report) {
            Ok(line) => println!("{line}"),
            Err(e) => warn!("preview serialization failed: {e}"),
        }
    }
}

/// I2C bus that logs every transfer instead of touching hardware.
struct ConsoleI2c;

impl ErrorType for ConsoleI2c {
    type Error = Infallible;
}

impl I2c for ConsoleI2c {
    fn transaction(
        &mut self,
        address: u8,
        operations: &mut [Operation<'_>],
    ) -> Result<(), Self::Error> {
        for op in operations {
            match op {
                Operation::Write(bytes) => debug!("I2C 0x{:02X} <- {:02X?}", address, bytes),
                Operation::Read(buf) => {
                    buf.fill(0);
                    debug!("I2C 0x{:02X} -> {} bytes", address, buf.len());
                }
            }
        }
        Ok(())
    }
}

fn load_config(path: Option<&PathBuf>) -> Result<LaneKeepConfig> {
    let Some(path) = path else {
        info!("no config given, using stock calibration");
        return Ok(LaneKeepConfig::default());
    };
    let bytes =
        std::fs::read(path).with_context(|| format!("reading config {}", path.display()))?;
    LaneKeepConfig::from_json(&bytes).map_err(|e| anyhow!("invalid config {}: {e:?}", path.display()))
}

/// Forward operator keys typed on stdin (`p` stop, `v` preview) to the loop.
fn spawn_operator_input() {
    std::thread::spawn(|| {
        for line in std::io::stdin().lock().lines() {
            let Ok(line) = line else { break };
            match OperatorCommand::parse(&line) {
                Some(cmd) => {
                    if OPERATOR_CHANNEL.try_send(cmd).is_err() {
                        warn!("operator queue full, dropped {:?}", cmd);
                    }
                }
                None => warn!("unknown operator input {:?}", line.trim()),
            }
        }
    });
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let opts: Opts = Opts::parse();
    let cfg = load_config(opts.config.as_ref())?;
    info!(frame = ?cfg.frame, perception = ?cfg.perception, "perception parameters");

    let i2c_bus = RefCell::new(ConsoleI2c);
    let mut actuator = Pca9685Actuator::new(&i2c_bus, &cfg.actuator)
        .map_err(|e| anyhow!("PCA9685 setup failed: {e:?}"))?;
    actuator
        .configure()
        .map_err(|e| anyhow!("PCA9685 configure failed: {e:?}"))?;

    let source = ReplaySource::open(&opts.replay, cfg.frame.rate_hz, !opts.no_pacing)?;
    let detector = RoiDetector::new(&cfg.perception, cfg.frame.width);
    let mut control =
        ControlLoop::new(&cfg, source, detector, actuator).with_preview(JsonPreview, opts.preview);

    spawn_operator_input();

    match control.run(&OPERATOR_CHANNEL) {
        Ok(shutdown) => {
            info!(reason = ?shutdown.reason, frames = shutdown.frames, "mock car stopped");
            Ok(())
        }
        Err(e) => {
            error!("control loop failed: {:?}", e);
            Err(anyhow!("control loop failed: {e:?}"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn detector() -> RoiDetector {
        let cfg = LaneKeepConfig::default();
        RoiDetector::new(&cfg.perception, cfg.frame.width)
    }

    fn frame(segments: Vec<LineSegment>) -> ReplayFrame {
        ReplayFrame { index: 0, segments }
    }

    #[test]
    fn test_roi_drops_segments_outside_frame_columns() {
        let mut d = detector();
        let (top, bottom) = (d.top, d.bottom);
        let kept = d.detect(&frame(vec![
            LineSegment::new(50, bottom, 120, top),
            LineSegment::new(-10, bottom, 120, top),
            LineSegment::new(200, bottom, 321, top),
            LineSegment::new(i32::MIN, bottom, i32::MAX, top),
            LineSegment::new(0, bottom, 320, top),
        ]));
        assert_eq!(
            kept,
            vec![
                LineSegment::new(50, bottom, 120, top),
                LineSegment::new(0, bottom, 320, top),
            ]
        );
    }

    #[test]
    fn test_roi_drops_segments_outside_rows() {
        let mut d = detector();
        let (top, bottom) = (d.top, d.bottom);
        let kept = d.detect(&frame(vec![
            LineSegment::new(50, bottom + 1, 120, top),
            LineSegment::new(50, bottom, 120, top - 1),
        ]));
        assert!(kept.is_empty());
    }
}
