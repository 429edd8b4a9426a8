use serde::{Deserialize, Serialize};

use super::capability::NegotiatedFormat;
use super::error::CaptureError;

/// Live counters for a running pipeline.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineStats {
    /// Frames the producer managed to enqueue.
    pub frames_captured: u64,
    /// Frames normalized and handed to the consumer.
    pub frames_forwarded: u64,
    /// Frames left in the buffer at stop and dropped per the consumer's stop contract.
    pub frames_discarded: u64,
    /// Frames dropped by the producer because the buffer was full.
    pub overruns: u64,
    /// Completed drain passes of the pipeline loop.
    pub drain_cycles: u64,
}

/// Summary returned by `PipelineController::stop()` for one acquisition run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaptureReport {
    pub id: String,
    pub started_at: String,
    pub duration_secs: f64,
    pub format: NegotiatedFormat,
    pub stats: PipelineStats,
}

impl CaptureReport {
    pub fn new(
        started_at: chrono::DateTime<chrono::Utc>,
        duration_secs: f64,
        format: NegotiatedFormat,
        stats: PipelineStats,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            started_at: started_at.to_rfc3339(),
            duration_secs,
            format,
            stats,
        }
    }

    /// Frames the producer lost to overruns, as a fraction of everything it produced.
    pub fn overrun_ratio(&self) -> f64 {
        let produced = self.stats.frames_captured + self.stats.overruns;
        if produced == 0 {
            return 0.0;
        }
        self.stats.overruns as f64 / produced as f64
    }

    /// Pretty JSON for handing the report to whatever front-end started the run.
    pub fn to_json(&self) -> Result<String, CaptureError> {
        serde_json::to_string_pretty(self)
            .map_err(|e| CaptureError::InvalidState(format!("failed to serialize report: {}", e)))
    }
}
