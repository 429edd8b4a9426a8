//! # mic-capture-sim
//!
//! Host backend for mic-capture-core.
//!
//! Provides:
//! - `SimulatedMic` — clocked `MicPeripheral` that plays a test waveform
//! - `SimBoard` — `PlatformIdentity` for a chosen variant with a shared `I2S0` unit
//! - `Waveform` — sine, ramp, constant and silent test signals
//!
//! ## Usage
//! ```ignore
//! use mic_capture_core::{ChannelConsumer, HardwareVariant, MicrophoneConfig, PipelineController};
//! use mic_capture_sim::{SimBoard, Waveform};
//!
//! let board = SimBoard::new(HardwareVariant::Esp32);
//! let (consumer, events) = ChannelConsumer::bounded(4096);
//! let mut pipeline = PipelineController::new(board.microphone(Waveform::default()), Box::new(consumer));
//! pipeline.setup(&board, &MicrophoneConfig::internal(34))?;
//! pipeline.start()?;
//! ```

pub mod board;
pub mod simulated_mic;
pub mod waveform;

pub use board::SimBoard;
pub use simulated_mic::SimulatedMic;
pub use waveform::{Waveform, WaveformGenerator};
