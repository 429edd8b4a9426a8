use std::sync::Arc;

use crate::hardware::bus::PeripheralBus;
use crate::models::config::AcquisitionConfig;
use crate::models::error::CaptureError;
use crate::processing::sample_buffer::FrameSink;

/// Everything a driver needs to program the peripheral for one run.
#[derive(Debug, Clone, Copy)]
pub struct PeripheralParams<'a> {
    pub config: &'a AcquisitionConfig,
    /// Frames per DMA transfer the driver should aim for.
    pub block_frames: usize,
}

/// Interface for microphone peripheral drivers (I2S RX, ADC-over-I2S, PDM RX).
///
/// Implemented by:
/// - `SimulatedMic` (mic-capture-sim, clocked host thread)
/// - firmware drivers wrapping the HAL's I2S/DMA API
pub trait MicPeripheral: Send {
    /// The hardware unit this driver programs. Drivers for the same unit
    /// must return the same bus.
    fn bus(&self) -> Arc<PeripheralBus>;

    /// Configure the peripheral and start delivering frames into `sink`.
    ///
    /// `sink` is the only producer handle for this run: move it into the
    /// ISR/DMA-completion context. Return `PeripheralInitError` when the
    /// parameters are rejected; nothing may keep running in that case.
    fn open(&mut self, params: &PeripheralParams<'_>, sink: FrameSink) -> Result<(), CaptureError>;

    /// Stop the peripheral. When this returns, no further frames may be
    /// produced and the sink must have been dropped. Must be idempotent.
    fn close(&mut self) -> Result<(), CaptureError>;

    /// Human-readable description for logs.
    fn describe(&self) -> String;
}
