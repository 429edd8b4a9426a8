//! A host stand-in for one chip: its variant and its peripheral units.

use std::sync::Arc;

use mic_capture_core::hardware::bus::PeripheralBus;
use mic_capture_core::models::variant::HardwareVariant;
use mic_capture_core::traits::platform::PlatformIdentity;

use crate::simulated_mic::SimulatedMic;
use crate::waveform::Waveform;

/// Simulated chip. Every microphone built from the same board shares its
/// `I2S0` unit, so two pipelines on one board contend for it.
#[derive(Debug, Clone)]
pub struct SimBoard {
    variant: HardwareVariant,
    i2s0: Arc<PeripheralBus>,
}

impl SimBoard {
    pub fn new(variant: HardwareVariant) -> Self {
        Self {
            variant,
            i2s0: PeripheralBus::new("I2S0"),
        }
    }

    pub fn i2s0(&self) -> Arc<PeripheralBus> {
        Arc::clone(&self.i2s0)
    }

    /// A microphone wired to this board's `I2S0`.
    pub fn microphone(&self, waveform: Waveform) -> SimulatedMic {
        SimulatedMic::new(self.i2s0(), waveform)
    }
}

impl PlatformIdentity for SimBoard {
    fn current_variant(&self) -> HardwareVariant {
        self.variant
    }
}
