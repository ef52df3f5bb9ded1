// THEORY:
// The `FrameAnalyzer` turns one captured frame into a single number: the
// congestion level. It is a heuristic, not a detector. More edges in the scene
// are read as more vehicles, so the score is simply the edge density of the
// frame scaled onto a nominal 0..=10 range.
//
// Pipeline for one frame:
// 1.  Validate the buffer and copy it into a `CV_8UC3` matrix.
// 2.  `cvt_color(BGR2GRAY)`.
// 3.  `canny` with the configured thresholds, aperture 3, L1 gradient.
// 4.  Sum all edge intensities, divide by `width * height * 255`, multiply by
//     10 and truncate toward zero.
//
// The level is not clamped. A frame that is nothing but edges scores above 10.
// Failures never panic and never abort the caller: `analyze` returns an
// `AnalysisError`, and `congestion_level` folds that error into the sentinel
// level `-1`.

use crate::core_modules::frame::Frame;
use crate::error::AnalysisError;
use opencv::{core, core::Mat, imgproc};
use std::fmt;
use tracing::warn;

/// Upper end of the nominal congestion scale.
pub const CONGESTION_SCALE: f64 = 10.0;
const CANNY_APERTURE: i32 = 3;
const MAX_EDGE_INTENSITY: f64 = 255.0;

/// Canny hysteresis thresholds, in gradient-magnitude units.
/// OpenCV swaps them if they are given in reverse order.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EdgeThresholds {
    pub low: f64,
    pub high: f64,
}

impl Default for EdgeThresholds {
    fn default() -> Self {
        Self {
            low: 50.0,
            high: 150.0,
        }
    }
}

impl EdgeThresholds {
    pub fn new(low: f64, high: f64) -> Self {
        Self { low, high }
    }
}

/// Congestion estimate for a single frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CongestionLevel(i32);

impl CongestionLevel {
    /// Marks a frame whose analysis failed.
    pub const SENTINEL: CongestionLevel = CongestionLevel(-1);

    pub const fn new(level: i32) -> Self {
        Self(level)
    }

    pub const fn value(self) -> i32 {
        self.0
    }

    pub const fn is_sentinel(self) -> bool {
        self.0 == Self::SENTINEL.0
    }
}

impl fmt::Display for CongestionLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Scores frames by edge density.
#[derive(Debug, Clone, Default)]
pub struct FrameAnalyzer {
    thresholds: EdgeThresholds,
}

impl FrameAnalyzer {
    pub fn new(thresholds: EdgeThresholds) -> Self {
        Self { thresholds }
    }

    pub fn thresholds(&self) -> EdgeThresholds {
        self.thresholds
    }

    /// Scores `frame`, or says why it could not be scored.
    /// This is what the capture loop uses to decide whether to skip a frame.
    pub fn analyze(&self, frame: &Frame) -> Result<CongestionLevel, AnalysisError> {
        let bgr = frame.to_mat()?;

        let mut gray = Mat::default();
        imgproc::cvt_color(&bgr, &mut gray, imgproc::COLOR_BGR2GRAY, 0)?;

        let mut edges = Mat::default();
        imgproc::canny(
            &gray,
            &mut edges,
            self.thresholds.low,
            self.thresholds.high,
            CANNY_APERTURE,
            false,
        )?;

        let edge_sum = core::sum_elems(&edges)?.0[0];
        let area = frame.width as f64 * frame.height as f64;
        let density = edge_sum / (area * MAX_EDGE_INTENSITY);

        // `as` truncates toward zero, matching integer conversion of the score.
        Ok(CongestionLevel((density * CONGESTION_SCALE) as i32))
    }

    /// The sentinel form of `analyze` for callers that only want the scalar:
    /// any failure is logged and reported as `CongestionLevel::SENTINEL` (`-1`).
    pub fn congestion_level(&self, frame: &Frame) -> CongestionLevel {
        match self.analyze(frame) {
            Ok(level) => level,
            Err(e) => {
                warn!(error = %e, "Error analyzing frame");
                CongestionLevel::SENTINEL
            }
        }
    }
}
