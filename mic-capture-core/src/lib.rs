//! # mic-capture-core
//!
//! Platform-agnostic microphone capture core.
//!
//! Validates a microphone configuration against the running chip variant,
//! buffers peripheral samples in a lock-free SPSC ring, negotiates the output
//! format with the downstream consumer and drives the capture lifecycle.
//! Hardware drivers implement the `MicPeripheral` trait and plug into the
//! generic `PipelineController`.
//!
//! ## Architecture
//!
//! ```text
//! mic-capture-core (this crate)
//! ├── traits/       ← MicPeripheral, FrameConsumer, PipelineDelegate, PlatformIdentity
//! ├── models/       ← ConfigError, CaptureError, MicrophoneConfig, frames, states, report
//! ├── hardware/     ← variant capability table, channel/pin resolver, validator, bus claims
//! ├── processing/   ← SampleBuffer (SPSC ring), FormatNormalizer
//! ├── session/      ← AcquisitionEngine, capability negotiator, PipelineController
//! └── consumers/    ← ChannelConsumer (bounded crossbeam channel)
//! ```

pub mod consumers;
pub mod hardware;
pub mod models;
pub mod processing;
pub mod session;
pub mod traits;

// Re-export key types at crate root for convenience.
pub use consumers::channel::{ChannelConsumer, StreamEvent};
pub use hardware::bus::{PeripheralBus, PeripheralClaim};
pub use hardware::channel_map::{resolve, ChannelSelector, ConcreteChannel, I2sChannelFormat};
pub use hardware::registry::VariantCapabilities;
pub use hardware::validator::{resolve_config, validate};
pub use models::capability::{CapabilityOffer, CapabilityRequest, NegotiatedFormat};
pub use models::config::{
    AcquisitionConfig, AdcSettings, ChannelSlot, ExternalParams, I2sRole, MicrophoneConfig,
    PipelineSettings, MAX_BUFFER_FRAMES,
};
pub use models::error::{CaptureError, ConfigError};
pub use models::frame::{BitDepth, OutputFrame, RawFrame};
pub use models::report::{CaptureReport, PipelineStats};
pub use models::state::{EngineState, PipelineState};
pub use models::variant::{AcquisitionMode, HardwareVariant};
pub use processing::normalizer::FormatNormalizer;
pub use processing::sample_buffer::{sample_buffer, BufferMonitor, FrameSink, SampleBuffer};
pub use session::controller::PipelineController;
pub use session::engine::AcquisitionEngine;
pub use session::negotiator::negotiate;
pub use traits::frame_consumer::{FrameConsumer, StopPolicy};
pub use traits::peripheral::{MicPeripheral, PeripheralParams};
pub use traits::pipeline_delegate::PipelineDelegate;
pub use traits::platform::PlatformIdentity;
