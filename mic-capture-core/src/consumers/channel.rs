use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crossbeam_channel::{Receiver, Sender, TrySendError};

use crate::models::capability::{CapabilityOffer, CapabilityRequest, NegotiatedFormat};
use crate::models::frame::OutputFrame;
use crate::traits::frame_consumer::{FrameConsumer, StopPolicy};

/// What a [`ChannelConsumer`] hands to the receiving side.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    /// Start of a run, before any frame.
    Format(NegotiatedFormat),
    Frame(OutputFrame),
    /// End of a run, after the final drain.
    Stopped,
}

/// Forwards the pipeline's output over a bounded channel.
///
/// `accept_frame` never blocks: when the receiver falls behind the frame is
/// dropped and counted.
pub struct ChannelConsumer {
    sender: Sender<StreamEvent>,
    dropped: Arc<AtomicU64>,
    request: Option<CapabilityRequest>,
    policy: StopPolicy,
}

impl ChannelConsumer {
    /// Create a consumer with room for `capacity` queued events, plus its receiver.
    pub fn bounded(capacity: usize) -> (Self, Receiver<StreamEvent>) {
        let (sender, receiver) = crossbeam_channel::bounded(capacity.max(1));
        (
            Self {
                sender,
                dropped: Arc::new(AtomicU64::new(0)),
                request: None,
                policy: StopPolicy::Forward,
            },
            receiver,
        )
    }

    /// Ask for a narrower format than the full offer.
    pub fn with_request(mut self, request: CapabilityRequest) -> Self {
        self.request = Some(request);
        self
    }

    pub fn with_stop_policy(mut self, policy: StopPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Shared counter of frames dropped because the channel was full.
    pub fn dropped_counter(&self) -> Arc<AtomicU64> {
        Arc::clone(&self.dropped)
    }

    fn send(&self, event: StreamEvent) {
        if let Err(err) = self.sender.try_send(event) {
            match err {
                TrySendError::Full(_) => {
                    self.dropped.fetch_add(1, Ordering::Relaxed);
                }
                TrySendError::Disconnected(_) => {}
            }
        }
    }
}

impl FrameConsumer for ChannelConsumer {
    fn capability_request(&mut self, _offer: &CapabilityOffer) -> Option<CapabilityRequest> {
        self.request.clone()
    }

    fn on_format(&mut self, format: &NegotiatedFormat) {
        self.send(StreamEvent::Format(*format));
    }

    fn accept_frame(&mut self, frame: OutputFrame) {
        self.send(StreamEvent::Frame(frame));
    }

    fn stop_policy(&self) -> StopPolicy {
        self.policy
    }

    fn on_stop(&mut self) {
        // Markers are worth a short wait; frames are not.
        if self
            .sender
            .send_timeout(StreamEvent::Stopped, std::time::Duration::from_millis(50))
            .is_err()
        {
            log::warn!("stream receiver did not take the stop marker");
        }
    }
}
