use crate::hardware::bus::PeripheralClaim;
use crate::models::config::AcquisitionConfig;
use crate::models::error::CaptureError;
use crate::models::state::EngineState;
use crate::processing::sample_buffer::{sample_buffer, BufferMonitor, SampleBuffer};
use crate::traits::peripheral::{MicPeripheral, PeripheralParams};

/// Owns one microphone peripheral and feeds a fresh [`SampleBuffer`] on every run.
///
/// ```text
/// [MicPeripheral ISR/DMA] → FrameSink ═(SPSC ring)═ SampleBuffer → pipeline loop
/// ```
pub struct AcquisitionEngine<P: MicPeripheral> {
    peripheral: P,
    state: EngineState,
    claim: Option<PeripheralClaim>,
    monitor: Option<BufferMonitor>,
}

impl<P: MicPeripheral> AcquisitionEngine<P> {
    pub fn new(peripheral: P) -> Self {
        Self {
            peripheral,
            state: EngineState::Idle,
            claim: None,
            monitor: None,
        }
    }

    /// Current state. A running engine whose driver reported a fault is `Failed`.
    pub fn state(&self) -> EngineState {
        if self.state == EngineState::Running && self.fault().is_some() {
            return EngineState::Failed;
        }
        self.state
    }

    /// The fault reported by the driver during the current run, if any.
    pub fn fault(&self) -> Option<CaptureError> {
        self.monitor
            .as_ref()
            .and_then(|m| m.fault())
            .map(|reason| CaptureError::PeripheralFault(reason.to_string()))
    }

    pub fn peripheral(&self) -> &P {
        &self.peripheral
    }

    /// Claim the peripheral and start producing into a new buffer of
    /// `capacity` frames. Returns the consumer half.
    ///
    /// On failure nothing stays claimed and the engine is `Failed`.
    pub fn start(
        &mut self,
        config: &AcquisitionConfig,
        capacity: usize,
        block_frames: usize,
    ) -> Result<SampleBuffer, CaptureError> {
        if self.state.is_active() {
            return Err(CaptureError::InvalidState(
                "acquisition engine already running".into(),
            ));
        }
        if self.claim.is_some() {
            // Previous run failed at runtime and was never stopped.
            self.stop()?;
        }

        self.state = EngineState::Starting;

        let bus = self.peripheral.bus();
        let Some(claim) = bus.try_claim() else {
            log::error!("{} is already claimed", bus.name());
            self.state = EngineState::Failed;
            return Err(CaptureError::PeripheralBusy);
        };

        let (sink, buffer) = match sample_buffer(capacity) {
            Ok(halves) => halves,
            Err(e) => {
                log::error!("failed to start {}: {}", self.peripheral.describe(), e);
                drop(claim);
                self.state = EngineState::Failed;
                return Err(e);
            }
        };
        let monitor = buffer.monitor();
        let params = PeripheralParams {
            config,
            block_frames,
        };

        if let Err(e) = self.peripheral.open(&params, sink) {
            log::error!("failed to open {}: {}", self.peripheral.describe(), e);
            monitor.close();
            // Roll back anything the driver may have half-configured.
            if let Err(close_err) = self.peripheral.close() {
                log::warn!(
                    "rollback close of {} failed: {}",
                    self.peripheral.describe(),
                    close_err
                );
            }
            drop(claim);
            self.state = EngineState::Failed;
            return Err(e);
        }

        log::info!(
            "acquisition started on {} ({} Hz, {}, buffer {} frames)",
            self.peripheral.describe(),
            config.sample_rate,
            config.bit_depth,
            buffer.capacity()
        );

        self.claim = Some(claim);
        self.monitor = Some(monitor);
        self.state = EngineState::Running;
        Ok(buffer)
    }

    /// Stop producing and release the peripheral.
    ///
    /// Once this returns the old buffer receives no further frames. Safe to
    /// call in any state; a no-op when idle.
    pub fn stop(&mut self) -> Result<(), CaptureError> {
        if self.state == EngineState::Idle && self.claim.is_none() {
            return Ok(());
        }

        self.state = EngineState::Stopping;

        if let Some(monitor) = self.monitor.take() {
            monitor.close();
        }

        let result = if self.claim.is_some() {
            self.peripheral.close()
        } else {
            Ok(())
        };

        if let Some(claim) = self.claim.take() {
            log::info!("acquisition stopped, released {}", claim.bus_name());
        }

        self.state = EngineState::Idle;
        result
    }
}

impl<P: MicPeripheral> Drop for AcquisitionEngine<P> {
    fn drop(&mut self) {
        if let Err(e) = self.stop() {
            log::error!("failed to stop acquisition engine on drop: {}", e);
        }
    }
}
