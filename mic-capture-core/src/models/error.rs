use thiserror::Error;

use super::variant::{AcquisitionMode, HardwareVariant};

/// Configuration problems detected before any peripheral is touched.
///
/// Always fatal to `setup()` / `start()` and never retried automatically.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{variant} does not support {mode} acquisition with PDM")]
    UnsupportedModeForVariant {
        variant: HardwareVariant,
        mode: AcquisitionMode,
    },

    #[error("{variant} does not have an internal ADC")]
    NoInternalAdc { variant: HardwareVariant },

    #[error("invalid channel selector {selector} for {mode} acquisition on {variant}")]
    InvalidChannelSelector {
        variant: HardwareVariant,
        mode: AcquisitionMode,
        selector: String,
    },

    #[error("GPIO{pin} is not a usable data pin on {variant}")]
    InvalidDataPin { variant: HardwareVariant, pin: u8 },

    #[error("unsupported bit depth: {0} (expected 16 or 32)")]
    UnsupportedBitDepth(u8),

    #[error("invalid sample rate: {0} Hz")]
    InvalidSampleRate(u32),

    #[error("gain_log2 must be in 0..=7, got {0}")]
    InvalidGain(u8),

    #[error("capability mismatch: {0}")]
    CapabilityMismatch(String),
}

/// Errors surfaced by the acquisition engine and pipeline controller.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CaptureError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("peripheral is already claimed by another acquisition engine")]
    PeripheralBusy,

    #[error("peripheral init failed: {0}")]
    PeripheralInitError(String),

    #[error("peripheral fault: {0}")]
    PeripheralFault(String),

    #[error("invalid state: {0}")]
    InvalidState(String),

    #[error("pipeline thread error: {0}")]
    Thread(String),
}

impl CaptureError {
    /// Whether the error was raised by configuration checks rather than hardware.
    pub fn is_config(&self) -> bool {
        matches!(self, Self::Config(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_error_display() {
        let err = ConfigError::NoInternalAdc {
            variant: HardwareVariant::Esp32S3,
        };
        assert_eq!(err.to_string(), "ESP32-S3 does not have an internal ADC");
    }

    #[test]
    fn capture_error_wraps_config_transparently() {
        let err: CaptureError = ConfigError::UnsupportedBitDepth(24).into();
        assert!(err.is_config());
        assert_eq!(err.to_string(), "unsupported bit depth: 24 (expected 16 or 32)");
    }

    #[test]
    fn runtime_errors_are_not_config() {
        assert!(!CaptureError::PeripheralBusy.is_config());
        assert!(!CaptureError::PeripheralInitError("rate".into()).is_config());
    }
}
