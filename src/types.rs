//! Type definitions and aliases

use serde::{Deserialize, Serialize};
use std::fmt;

// Re-export commonly used types
pub use crate::error::{AppError, Result};

/// Stages of one speed test run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TestPhase {
    /// No run has started yet, or the last run was aborted
    Idle,
    /// Sequential latency probing
    Ping,
    /// Download throughput measurement
    Download,
    /// Settling pause between download and upload
    Transition,
    /// Upload throughput measurement
    Upload,
    /// The last run finished and produced a result
    Complete,
}

impl TestPhase {
    /// A new run may only start from a phase at rest
    pub fn is_at_rest(&self) -> bool {
        matches!(self, TestPhase::Idle | TestPhase::Complete)
    }

    /// Whether this phase moves bytes for a throughput measurement
    pub fn is_measuring(&self) -> bool {
        matches!(self, TestPhase::Download | TestPhase::Upload)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TestPhase::Idle => "IDLE",
            TestPhase::Ping => "PING",
            TestPhase::Download => "DOWNLOAD",
            TestPhase::Transition => "TRANSITION",
            TestPhase::Upload => "UPLOAD",
            TestPhase::Complete => "COMPLETE",
        }
    }
}

impl fmt::Display for TestPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Default for TestPhase {
    fn default() -> Self {
        TestPhase::Idle
    }
}

/// Transfer direction measured by a throughput phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    Download,
    Upload,
}

impl Direction {
    /// The phase during which this direction is measured
    pub fn phase(&self) -> TestPhase {
        match self {
            Direction::Download => TestPhase::Download,
            Direction::Upload => TestPhase::Upload,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Download => "download",
            Direction::Upload => "upload",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rest_phases() {
        assert!(TestPhase::Idle.is_at_rest());
        assert!(TestPhase::Complete.is_at_rest());
        for phase in [TestPhase::Ping, TestPhase::Download, TestPhase::Transition, TestPhase::Upload] {
            assert!(!phase.is_at_rest(), "{} should not be at rest", phase);
        }
    }

    #[test]
    fn test_direction_phase_mapping() {
        assert_eq!(Direction::Download.phase(), TestPhase::Download);
        assert_eq!(Direction::Upload.phase(), TestPhase::Upload);
        assert!(Direction::Upload.phase().is_measuring());
        assert!(!TestPhase::Transition.is_measuring());
    }

    #[test]
    fn test_phase_display() {
        assert_eq!(TestPhase::Transition.to_string(), "TRANSITION");
        assert_eq!(Direction::Download.to_string(), "download");
    }
}
