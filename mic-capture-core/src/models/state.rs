use std::fmt;

use super::error::CaptureError;

/// Pipeline controller lifecycle.
///
/// State transitions:
/// ```text
/// uninitialized → configured → running → stopped
///                     ↓           ↓         ↓
///                   failed ←──────┘      running (restart)
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineState {
    Uninitialized,
    Configured,
    Running,
    Stopped,
    Failed(CaptureError),
}

impl PipelineState {
    pub fn is_running(&self) -> bool {
        matches!(self, Self::Running)
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed(_))
    }

    /// Whether `start()` may be called from this state.
    pub fn can_start(&self) -> bool {
        matches!(self, Self::Configured | Self::Stopped | Self::Failed(_))
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Uninitialized => "uninitialized",
            Self::Configured => "configured",
            Self::Running => "running",
            Self::Stopped => "stopped",
            Self::Failed(_) => "failed",
        }
    }
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Acquisition engine lifecycle.
///
/// ```text
/// idle → starting → running → stopping → idle
///                      ↓
///                    failed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Idle,
    Starting,
    Running,
    Stopping,
    Failed,
}

impl EngineState {
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Starting | Self::Running)
    }
}
