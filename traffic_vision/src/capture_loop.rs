// THEORY:
// The `capture_loop` module is the top-level driver of the monitor. It owns a
// video source and a display surface for its whole lifetime and runs a strictly
// sequential loop over them:
//
//   fetch frame -> analyze -> decide -> report -> show -> poll stop -> pause
//
// Key architectural principles:
// 1.  **Backend Independence**: Sources and displays are traits. The OpenCV
//     camera and window live in the `traffic_monitor` binary; tests plug in
//     synthetic ones.
// 2.  **Scoped Ownership**: `run` consumes the loop. Whatever way the loop ends
//     (source exhausted, fetch failure, user stop, unexpected fault) the source
//     and display are dropped on return, and their `Drop` impls release the
//     underlying handles.
// 3.  **Explicit Outcomes**: Every iteration returns a `Step`. A frame that
//     fails analysis is skipped and the loop moves straight to the next fetch,
//     with no limit on consecutive skips. Anything else that goes wrong inside
//     an iteration ends the loop with a recorded `StopReason` instead of
//     unwinding.

use crate::core_modules::frame::Frame;
use crate::core_modules::frame_analyzer::{EdgeThresholds, FrameAnalyzer};
use crate::core_modules::traffic_optimizer::Decision;
use crate::error::CaptureError;
use std::io::Write;
use std::thread;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// A producer of frames, typically a camera or a video file.
///
/// Implementations release their underlying handle in `Drop`.
pub trait FrameSource {
    /// Blocks until the next frame is available.
    ///
    /// Returns `Ok(None)` once the source is exhausted and `Err` on a device fault.
    fn read_frame(&mut self) -> Result<Option<Frame>, CaptureError>;
}

/// Somewhere to render frames and to ask the user whether to stop.
pub trait DisplaySurface {
    fn show(&mut self, frame: &Frame) -> Result<(), CaptureError>;

    /// Polled once per reported frame.
    fn stop_requested(&mut self) -> Result<bool, CaptureError>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct LoopSettings {
    pub thresholds: EdgeThresholds,
    /// Throttle applied after every reported frame.
    pub frame_delay: Duration,
}

impl Default for LoopSettings {
    fn default() -> Self {
        Self {
            thresholds: EdgeThresholds::default(),
            frame_delay: Duration::from_millis(100),
        }
    }
}

/// Why the loop ended.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum StopReason {
    /// The source reported end of stream.
    #[default]
    SourceExhausted,
    /// The source failed while fetching a frame.
    FetchFailed(String),
    /// The user pressed the stop key.
    UserStop,
    /// Reporting or display failed mid-iteration.
    Fault(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RunSummary {
    pub frames_read: u64,
    pub frames_reported: u64,
    pub frames_skipped: u64,
    pub reason: StopReason,
}

enum Step {
    Continue,
    Stop(StopReason),
}

pub struct CaptureLoop<S, D, W> {
    source: S,
    display: D,
    out: W,
    analyzer: FrameAnalyzer,
    frame_delay: Duration,
}

impl<S, D, W> CaptureLoop<S, D, W>
where
    S: FrameSource,
    D: DisplaySurface,
    W: Write,
{
    /// `out` receives one `Congestion Level: <n>, Decision: <text>` line per reported frame.
    pub fn new(source: S, display: D, out: W, settings: &LoopSettings) -> Self {
        Self {
            source,
            display,
            out,
            analyzer: FrameAnalyzer::new(settings.thresholds),
            frame_delay: settings.frame_delay,
        }
    }

    /// Runs until the source ends, the user stops, or an iteration faults.
    /// The source and display are released before this returns.
    pub fn run(mut self) -> RunSummary {
        info!(
            low = self.analyzer.thresholds().low,
            high = self.analyzer.thresholds().high,
            delay_ms = self.frame_delay.as_millis() as u64,
            "Capture loop started"
        );

        let mut summary = RunSummary::default();
        let reason = loop {
            match self.step(&mut summary) {
                Ok(Step::Continue) => {}
                Ok(Step::Stop(reason)) => break reason,
                Err(e) => {
                    error!(error = %e, "Unexpected error during main loop");
                    break StopReason::Fault(e.to_string());
                }
            }
        };
        summary.reason = reason;

        info!(
            frames_read = summary.frames_read,
            frames_reported = summary.frames_reported,
            frames_skipped = summary.frames_skipped,
            reason = ?summary.reason,
            "Capture loop finished"
        );
        summary
    }

    fn step(&mut self, summary: &mut RunSummary) -> Result<Step, CaptureError> {
        let frame = match self.source.read_frame() {
            Ok(Some(frame)) => frame,
            Ok(None) => {
                info!("Video source exhausted");
                return Ok(Step::Stop(StopReason::SourceExhausted));
            }
            Err(e) => {
                error!(error = %e, "Failed to grab a frame");
                return Ok(Step::Stop(StopReason::FetchFailed(e.to_string())));
            }
        };
        summary.frames_read += 1;

        let level = match self.analyzer.analyze(&frame) {
            Ok(level) => level,
            Err(e) => {
                warn!(frame = summary.frames_read, error = %e, "Skipping frame due to error");
                summary.frames_skipped += 1;
                return Ok(Step::Continue);
            }
        };

        let decision = Decision::for_level(level);
        writeln!(self.out, "Congestion Level: {level}, Decision: {decision}")?;
        self.out.flush()?;
        summary.frames_reported += 1;
        debug!(frame = summary.frames_read, level = level.value(), ?decision, "Frame reported");

        self.display.show(&frame)?;
        if self.display.stop_requested()? {
            info!("Stop key pressed");
            return Ok(Step::Stop(StopReason::UserStop));
        }

        if !self.frame_delay.is_zero() {
            thread::sleep(self.frame_delay);
        }
        Ok(Step::Continue)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::collections::VecDeque;
    use std::rc::Rc;

    const BLACK: [u8; 3] = [0, 0, 0];
    const WHITE: [u8; 3] = [255, 255, 255];

    fn black_frame() -> Frame {
        Frame::filled(64, 64, BLACK)
    }

    /// One-pixel white columns every four pixels: enough edges for balanced flow.
    fn stripes_frame() -> Frame {
        Frame::from_fn(40, 40, |x, _| if x % 4 == 0 { WHITE } else { BLACK })
    }

    fn settings() -> LoopSettings {
        LoopSettings {
            frame_delay: Duration::ZERO,
            ..LoopSettings::default()
        }
    }

    /// Scripted source: each entry is what one `read_frame` call returns.
    /// Once the script runs out it reports end of stream.
    struct ScriptedSource {
        script: VecDeque<Result<Option<Frame>, CaptureError>>,
        reads: Rc<Cell<usize>>,
        released: Rc<Cell<bool>>,
    }

    impl ScriptedSource {
        fn new(script: Vec<Result<Option<Frame>, CaptureError>>) -> Self {
            Self {
                script: script.into(),
                reads: Rc::new(Cell::new(0)),
                released: Rc::new(Cell::new(false)),
            }
        }

        fn frames(frames: Vec<Frame>) -> Self {
            Self::new(frames.into_iter().map(|f| Ok(Some(f))).collect())
        }
    }

    impl FrameSource for ScriptedSource {
        fn read_frame(&mut self) -> Result<Option<Frame>, CaptureError> {
            self.reads.set(self.reads.get() + 1);
            self.script.pop_front().unwrap_or(Ok(None))
        }
    }

    impl Drop for ScriptedSource {
        fn drop(&mut self) {
            self.released.set(true);
        }
    }

    #[derive(Default)]
    struct RecordingDisplay {
        shown: Rc<Cell<usize>>,
        polls: Rc<Cell<usize>>,
        stop_after: Option<usize>,
        fail_show: bool,
    }

    impl DisplaySurface for RecordingDisplay {
        fn show(&mut self, _frame: &Frame) -> Result<(), CaptureError> {
            if self.fail_show {
                return Err(CaptureError::Display("window closed".into()));
            }
            self.shown.set(self.shown.get() + 1);
            Ok(())
        }

        fn stop_requested(&mut self) -> Result<bool, CaptureError> {
            self.polls.set(self.polls.get() + 1);
            Ok(self.stop_after.is_some_and(|n| self.polls.get() >= n))
        }
    }

    fn report_lines(out: &[u8]) -> Vec<String> {
        String::from_utf8(out.to_vec())
            .expect("utf-8 output")
            .lines()
            .map(str::to_owned)
            .collect()
    }

    fn level_of(line: &str) -> i32 {
        line.strip_prefix("Congestion Level: ")
            .and_then(|rest| rest.split(',').next())
            .and_then(|n| n.parse().ok())
            .expect("report line starts with a level")
    }

    #[test]
    fn alternating_video_reports_every_frame() {
        let frames = (0..10)
            .map(|i| if i % 2 == 0 { black_frame() } else { stripes_frame() })
            .collect();
        let source = ScriptedSource::frames(frames);
        let released = Rc::clone(&source.released);
        let display = RecordingDisplay::default();
        let shown = Rc::clone(&display.shown);
        let mut out = Vec::new();

        let summary = CaptureLoop::new(source, display, &mut out, &settings()).run();

        let lines = report_lines(&out);
        assert_eq!(lines.len(), 10);
        for (i, line) in lines.iter().enumerate() {
            if i % 2 == 0 {
                assert_eq!(line, "Congestion Level: 0, Decision: Optimize for faster movement");
            } else {
                assert!(level_of(line) >= 3, "frame {i}: {line}");
                assert!(
                    line.ends_with(", Decision: Optimize for balanced flow"),
                    "frame {i}: {line}"
                );
            }
        }
        assert_eq!(summary.frames_read, 10);
        assert_eq!(summary.frames_reported, 10);
        assert_eq!(summary.reason, StopReason::SourceExhausted);
        assert_eq!(shown.get(), 10);
        assert!(released.get());
    }

    #[test]
    fn exhaustion_at_frame_five_reports_four_lines() {
        let source = ScriptedSource::new(vec![
            Ok(Some(black_frame())),
            Ok(Some(stripes_frame())),
            Ok(Some(black_frame())),
            Ok(Some(stripes_frame())),
            Ok(None),
            Ok(Some(black_frame())),
        ]);
        let reads = Rc::clone(&source.reads);
        let released = Rc::clone(&source.released);
        let mut out = Vec::new();

        let summary = CaptureLoop::new(source, RecordingDisplay::default(), &mut out, &settings()).run();

        assert_eq!(report_lines(&out).len(), 4);
        assert_eq!(reads.get(), 5);
        assert_eq!(summary.reason, StopReason::SourceExhausted);
        assert!(released.get());
    }

    #[test]
    fn fetch_failure_terminates_without_retry() {
        let source = ScriptedSource::new(vec![
            Ok(Some(black_frame())),
            Ok(Some(black_frame())),
            Ok(Some(black_frame())),
            Ok(Some(black_frame())),
            Err(CaptureError::Fetch("device unplugged".into())),
            Ok(Some(black_frame())),
        ]);
        let reads = Rc::clone(&source.reads);
        let released = Rc::clone(&source.released);
        let mut out = Vec::new();

        let summary = CaptureLoop::new(source, RecordingDisplay::default(), &mut out, &settings()).run();

        assert_eq!(report_lines(&out).len(), 4);
        assert_eq!(reads.get(), 5);
        assert!(matches!(summary.reason, StopReason::FetchFailed(ref msg) if msg.contains("device unplugged")));
        assert!(released.get());
    }

    #[test]
    fn malformed_frames_are_skipped_without_display_or_poll() {
        let source = ScriptedSource::frames(vec![
            Frame::new(0, 0, Vec::new()),
            black_frame(),
            Frame::new(4, 4, vec![0; 5]),
            Frame::new(4, 4, vec![0; 5]),
            stripes_frame(),
        ]);
        let display = RecordingDisplay::default();
        let (shown, polls) = (Rc::clone(&display.shown), Rc::clone(&display.polls));
        let mut out = Vec::new();

        let summary = CaptureLoop::new(source, display, &mut out, &settings()).run();

        assert_eq!(report_lines(&out).len(), 2);
        assert_eq!(summary.frames_read, 5);
        assert_eq!(summary.frames_skipped, 3);
        assert_eq!(summary.frames_reported, 2);
        assert_eq!(shown.get(), 2);
        assert_eq!(polls.get(), 2);
    }

    #[test]
    fn stop_key_ends_the_loop_and_releases_the_source() {
        let source = ScriptedSource::frames((0..10).map(|_| black_frame()).collect());
        let reads = Rc::clone(&source.reads);
        let released = Rc::clone(&source.released);
        let display = RecordingDisplay {
            stop_after: Some(3),
            ..RecordingDisplay::default()
        };
        let mut out = Vec::new();

        let summary = CaptureLoop::new(source, display, &mut out, &settings()).run();

        assert_eq!(summary.reason, StopReason::UserStop);
        assert_eq!(report_lines(&out).len(), 3);
        assert_eq!(reads.get(), 3);
        assert!(released.get());
    }

    #[test]
    fn display_fault_ends_the_loop() {
        let source = ScriptedSource::frames(vec![black_frame(), black_frame()]);
        let released = Rc::clone(&source.released);
        let display = RecordingDisplay {
            fail_show: true,
            ..RecordingDisplay::default()
        };
        let mut out = Vec::new();

        let summary = CaptureLoop::new(source, display, &mut out, &settings()).run();

        assert!(matches!(summary.reason, StopReason::Fault(ref msg) if msg.contains("window closed")));
        assert_eq!(summary.frames_read, 1);
        assert!(released.get());
    }

    #[test]
    fn empty_source_reports_nothing() {
        let source = ScriptedSource::new(Vec::new());
        let mut out = Vec::new();
        let summary = CaptureLoop::new(source, RecordingDisplay::default(), &mut out, &settings()).run();
        assert!(out.is_empty());
        assert_eq!(summary, RunSummary::default());
    }
}
