use std::fmt;

use serde::{Deserialize, Serialize};

use crate::models::config::ChannelSlot;
use crate::models::error::ConfigError;
use crate::models::variant::{AcquisitionMode, HardwareVariant};

/// Abstract channel selection as written in the microphone record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChannelSelector {
    /// GPIO number wired to an ADC1 input (internal mode).
    Pin(u8),
    /// I2S slot the transducer drives (external mode).
    Slot(ChannelSlot),
}

impl fmt::Display for ChannelSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pin(pin) => write!(f, "GPIO{}", pin),
            Self::Slot(ChannelSlot::Left) => f.write_str("left"),
            Self::Slot(ChannelSlot::Right) => f.write_str("right"),
        }
    }
}

/// I2S channel format register value for a mono transducer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum I2sChannelFormat {
    OnlyLeft,
    OnlyRight,
}

/// Peripheral channel the acquisition engine programs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConcreteChannel {
    Adc1(u8),
    I2s(I2sChannelFormat),
}

/// Map a selector to the concrete peripheral channel for `variant` in `mode`.
///
/// Internal mode looks the GPIO up in the variant's ADC1 table. External mode
/// maps `left`/`right` to the channel format, independent of variant. A
/// selector of the wrong kind for the mode never resolves.
pub fn resolve(
    variant: HardwareVariant,
    mode: AcquisitionMode,
    selector: ChannelSelector,
) -> Result<ConcreteChannel, ConfigError> {
    let resolved = match (mode, selector) {
        (AcquisitionMode::Internal, ChannelSelector::Pin(pin)) => variant
            .capabilities()
            .adc1_channel(pin)
            .map(ConcreteChannel::Adc1),
        (AcquisitionMode::External, ChannelSelector::Slot(ChannelSlot::Left)) => {
            Some(ConcreteChannel::I2s(I2sChannelFormat::OnlyLeft))
        }
        (AcquisitionMode::External, ChannelSelector::Slot(ChannelSlot::Right)) => {
            Some(ConcreteChannel::I2s(I2sChannelFormat::OnlyRight))
        }
        _ => None,
    };

    resolved.ok_or_else(|| ConfigError::InvalidChannelSelector {
        variant,
        mode,
        selector: selector.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn internal_pin_resolves_through_adc1_table() {
        let channel = resolve(
            HardwareVariant::Esp32,
            AcquisitionMode::Internal,
            ChannelSelector::Pin(34),
        );
        assert_eq!(channel, Ok(ConcreteChannel::Adc1(6)));
    }

    #[test]
    fn internal_pin_uses_variant_table() {
        // GPIO4 is ADC1 channel 3 on the S3, but not an ADC1 pin on the ESP32.
        assert_eq!(
            resolve(
                HardwareVariant::Esp32S3,
                AcquisitionMode::Internal,
                ChannelSelector::Pin(4)
            ),
            Ok(ConcreteChannel::Adc1(3))
        );
        assert!(resolve(
            HardwareVariant::Esp32,
            AcquisitionMode::Internal,
            ChannelSelector::Pin(4)
        )
        .is_err());
    }

    #[test]
    fn unknown_pin_is_invalid_selector() {
        let err = resolve(
            HardwareVariant::Esp32,
            AcquisitionMode::Internal,
            ChannelSelector::Pin(25),
        )
        .unwrap_err();
        assert_eq!(
            err,
            ConfigError::InvalidChannelSelector {
                variant: HardwareVariant::Esp32,
                mode: AcquisitionMode::Internal,
                selector: "GPIO25".into(),
            }
        );
    }

    #[test]
    fn external_slot_is_variant_independent() {
        for variant in HardwareVariant::ALL {
            assert_eq!(
                resolve(
                    variant,
                    AcquisitionMode::External,
                    ChannelSelector::Slot(ChannelSlot::Left)
                ),
                Ok(ConcreteChannel::I2s(I2sChannelFormat::OnlyLeft))
            );
            assert_eq!(
                resolve(
                    variant,
                    AcquisitionMode::External,
                    ChannelSelector::Slot(ChannelSlot::Right)
                ),
                Ok(ConcreteChannel::I2s(I2sChannelFormat::OnlyRight))
            );
        }
    }

    #[test]
    fn selector_kind_must_match_mode() {
        assert!(resolve(
            HardwareVariant::Esp32,
            AcquisitionMode::External,
            ChannelSelector::Pin(34)
        )
        .is_err());
        assert!(resolve(
            HardwareVariant::Esp32,
            AcquisitionMode::Internal,
            ChannelSelector::Slot(ChannelSlot::Left)
        )
        .is_err());
    }

    #[test]
    fn resolve_is_idempotent() {
        let first = resolve(
            HardwareVariant::Esp32,
            AcquisitionMode::Internal,
            ChannelSelector::Pin(39),
        );
        let second = resolve(
            HardwareVariant::Esp32,
            AcquisitionMode::Internal,
            ChannelSelector::Pin(39),
        );
        assert_eq!(first, second);
        assert_eq!(first, Ok(ConcreteChannel::Adc1(3)));
    }
}
