use crate::models::capability::{CapabilityOffer, CapabilityRequest, NegotiatedFormat};
use crate::models::frame::OutputFrame;

/// What happens to frames still buffered when the pipeline stops.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StopPolicy {
    /// Normalize and forward them before `on_stop`.
    #[default]
    Forward,
    /// Drop them; they are counted as discarded.
    Discard,
}

/// Downstream pipeline element that receives the normalized stream.
///
/// All methods run on the pipeline (consumer) context, never on the
/// acquisition context.
pub trait FrameConsumer: Send {
    /// Pick a subset of the microphone's offer.
    ///
    /// The default returns `None`, which is how consumers that predate the
    /// capability exchange behave: they receive the full offer.
    fn capability_request(&mut self, offer: &CapabilityOffer) -> Option<CapabilityRequest> {
        let _ = offer;
        None
    }

    /// Called once per run with the agreed format, before the first frame.
    fn on_format(&mut self, format: &NegotiatedFormat) {
        let _ = format;
    }

    /// Receive one frame. Must not block for longer than a bounded time.
    fn accept_frame(&mut self, frame: OutputFrame);

    fn stop_policy(&self) -> StopPolicy {
        StopPolicy::Forward
    }

    /// Called after the final drain of a run.
    fn on_stop(&mut self) {}
}
