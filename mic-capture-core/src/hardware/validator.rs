use crate::hardware::channel_map;
use crate::models::config::{AcquisitionConfig, AdcSettings, ExternalParams, MicrophoneConfig, MAX_GAIN_LOG2};
use crate::models::error::ConfigError;
use crate::models::frame::BitDepth;
use crate::models::variant::{AcquisitionMode, HardwareVariant};

/// Check `config` against `variant` without building anything.
///
/// Rules run in a fixed order and the first failure is returned:
/// PDM support, internal ADC presence, channel selector, data pin,
/// bit depth, sample rate, gain.
pub fn validate(variant: HardwareVariant, config: &MicrophoneConfig) -> Result<(), ConfigError> {
    resolve_config(variant, config).map(|_| ())
}

/// Validate `config` and resolve it into the immutable [`AcquisitionConfig`].
///
/// Pure: touches no peripheral.
pub fn resolve_config(
    variant: HardwareVariant,
    config: &MicrophoneConfig,
) -> Result<AcquisitionConfig, ConfigError> {
    let caps = variant.capabilities();
    let mode = config.mode();

    if config.is_pdm() && !caps.pdm {
        return Err(ConfigError::UnsupportedModeForVariant { variant, mode });
    }

    if !caps.supports(mode) {
        return Err(ConfigError::NoInternalAdc { variant });
    }

    let channel = channel_map::resolve(variant, mode, config.selector())?;

    let external = match &config.adc {
        AdcSettings::Internal { .. } => None,
        AdcSettings::External {
            i2s_din_pin,
            pdm,
            i2s_adc,
            i2s_mode,
        } => {
            if !caps.has_gpio(*i2s_din_pin) {
                return Err(ConfigError::InvalidDataPin {
                    variant,
                    pin: *i2s_din_pin,
                });
            }
            Some(ExternalParams {
                data_pin: *i2s_din_pin,
                pdm: *pdm,
                adc_model: i2s_adc.clone(),
                role: *i2s_mode,
            })
        }
    };

    let bit_depth = BitDepth::try_from(config.bits_per_sample)?;

    if config.sample_rate < 1 {
        return Err(ConfigError::InvalidSampleRate(config.sample_rate));
    }

    if config.gain_log2 > MAX_GAIN_LOG2 {
        return Err(ConfigError::InvalidGain(config.gain_log2));
    }

    debug_assert_eq!(external.is_some(), mode == AcquisitionMode::External);

    Ok(AcquisitionConfig {
        variant,
        mode,
        channel,
        sample_rate: config.sample_rate,
        bit_depth,
        gain_log2: config.gain_log2,
        use_apll: config.use_apll,
        external,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hardware::channel_map::{ConcreteChannel, I2sChannelFormat};
    use crate::models::config::ChannelSlot;

    #[test]
    fn internal_esp32_resolves() {
        let config = resolve_config(HardwareVariant::Esp32, &MicrophoneConfig::internal(34)).unwrap();
        assert_eq!(config.mode, AcquisitionMode::Internal);
        assert_eq!(config.channel, ConcreteChannel::Adc1(6));
        assert_eq!(config.bit_depth, BitDepth::Bits32);
        assert_eq!(config.sample_rate, 16_000);
        assert!(config.external.is_none());
    }

    #[test]
    fn pdm_on_non_pdm_variant_fails_before_pin_resolution() {
        // The channel selector would be fine, the data pin would not: rule 1 must win anyway.
        let config = MicrophoneConfig::external(200, true);
        let err = validate(HardwareVariant::Esp32C3, &config).unwrap_err();
        assert_eq!(
            err,
            ConfigError::UnsupportedModeForVariant {
                variant: HardwareVariant::Esp32C3,
                mode: AcquisitionMode::External,
            }
        );
    }

    #[test]
    fn pdm_on_s3_is_accepted() {
        let config = resolve_config(HardwareVariant::Esp32S3, &MicrophoneConfig::external(41, true)).unwrap();
        let external = config.external.unwrap();
        assert!(external.pdm);
        assert_eq!(external.data_pin, 41);
        assert_eq!(config.channel, ConcreteChannel::I2s(I2sChannelFormat::OnlyRight));
    }

    #[test]
    fn non_pdm_external_allowed_on_every_variant() {
        for variant in HardwareVariant::ALL {
            assert_eq!(validate(variant, &MicrophoneConfig::external(3, false)), Ok(()));
        }
    }

    #[test]
    fn internal_without_adc_is_rejected() {
        for variant in HardwareVariant::ALL {
            if variant == HardwareVariant::Esp32 {
                continue;
            }
            // Pin 4 is a valid ADC1 pin on most of these; rule 2 must fire first.
            assert_eq!(
                validate(variant, &MicrophoneConfig::internal(4)),
                Err(ConfigError::NoInternalAdc { variant })
            );
        }
    }

    #[test]
    fn invalid_internal_pin() {
        let err = validate(HardwareVariant::Esp32, &MicrophoneConfig::internal(25)).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidChannelSelector { .. }));
    }

    #[test]
    fn invalid_data_pin() {
        let err = validate(HardwareVariant::Esp32C3, &MicrophoneConfig::external(30, false)).unwrap_err();
        assert_eq!(
            err,
            ConfigError::InvalidDataPin {
                variant: HardwareVariant::Esp32C3,
                pin: 30
            }
        );
    }

    #[test]
    fn unsupported_bit_depth() {
        let mut config = MicrophoneConfig::internal(34);
        config.bits_per_sample = 24;
        config.sample_rate = 0;
        // Bit depth is checked before sample rate.
        assert_eq!(
            validate(HardwareVariant::Esp32, &config),
            Err(ConfigError::UnsupportedBitDepth(24))
        );
    }

    #[test]
    fn zero_sample_rate() {
        let mut config = MicrophoneConfig::external(5, false);
        config.sample_rate = 0;
        assert_eq!(
            validate(HardwareVariant::Esp32S3, &config),
            Err(ConfigError::InvalidSampleRate(0))
        );

        config.sample_rate = 1;
        assert_eq!(validate(HardwareVariant::Esp32S3, &config), Ok(()));
    }

    #[test]
    fn gain_out_of_range() {
        let mut config = MicrophoneConfig::external(5, false);
        config.gain_log2 = 8;
        assert_eq!(
            validate(HardwareVariant::Esp32S3, &config),
            Err(ConfigError::InvalidGain(8))
        );
        config.gain_log2 = 7;
        assert_eq!(validate(HardwareVariant::Esp32S3, &config), Ok(()));
    }

    #[test]
    fn left_slot_and_apll_are_carried_through() {
        let mut config = MicrophoneConfig::external(5, false);
        config.channel = ChannelSlot::Left;
        config.use_apll = true;
        config.bits_per_sample = 16;

        let resolved = resolve_config(HardwareVariant::Esp32, &config).unwrap();
        assert_eq!(resolved.channel, ConcreteChannel::I2s(I2sChannelFormat::OnlyLeft));
        assert_eq!(resolved.bit_depth, BitDepth::Bits16);
        assert!(resolved.use_apll);
    }
}
