use crate::models::error::CaptureError;
use crate::models::report::CaptureReport;
use crate::models::state::PipelineState;

/// Event delegate for pipeline notifications.
///
/// Called from whichever thread drives the change: the caller of
/// `setup`/`start`/`stop`, or the pipeline drain thread.
pub trait PipelineDelegate: Send + Sync {
    /// Called when the pipeline state changes.
    fn on_state_changed(&self, state: &PipelineState);

    /// Called when a drain pass observes new overruns. `total` is cumulative for the run.
    fn on_overrun(&self, total: u64) {
        let _ = total;
    }

    /// Called when setup, start, stop or the running peripheral fails.
    fn on_error(&self, error: &CaptureError);

    /// Called once a run has been stopped and drained.
    fn on_stopped(&self, report: &CaptureReport);
}
