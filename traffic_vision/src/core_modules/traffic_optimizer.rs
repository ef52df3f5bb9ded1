// THEORY:
// The `TrafficOptimizer` is the decision stage. It maps a congestion level onto
// one of three fixed recommendations by plain thresholding:
//
//   level < 3        -> "Optimize for faster movement"
//   3 <= level < 7   -> "Optimize for balanced flow"
//   level >= 7       -> "Optimize for congestion reduction"
//
// It is pure and total over every `i32`: no state, no failure path. The
// sentinel level `-1` is deliberately not special-cased and lands in the
// lowest band like any other value below 3. The capture loop never asks for a
// decision on a failed frame, so the sentinel only reaches this function when a
// caller passes it on purpose.

use crate::core_modules::frame_analyzer::CongestionLevel;
use std::fmt;

/// First level that asks for balanced flow.
pub const BALANCED_FLOW_FLOOR: i32 = 3;
/// First level that asks for congestion reduction.
pub const CONGESTION_REDUCTION_FLOOR: i32 = 7;

/// A signal-timing recommendation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Decision {
    FasterMovement,
    BalancedFlow,
    CongestionReduction,
}

impl Decision {
    pub fn as_str(&self) -> &'static str {
        match self {
            Decision::FasterMovement => "Optimize for faster movement",
            Decision::BalancedFlow => "Optimize for balanced flow",
            Decision::CongestionReduction => "Optimize for congestion reduction",
        }
    }

    pub fn for_level(level: CongestionLevel) -> Self {
        optimize_traffic(level.value())
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub fn optimize_traffic(level: i32) -> Decision {
    if level < BALANCED_FLOW_FLOOR {
        Decision::FasterMovement
    } else if level < CONGESTION_REDUCTION_FLOOR {
        Decision::BalancedFlow
    } else {
        Decision::CongestionReduction
    }
}
