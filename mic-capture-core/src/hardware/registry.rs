//! Static capability table for every supported hardware variant.

use crate::models::variant::{AcquisitionMode, HardwareVariant};

/// What one variant's silicon can do for microphone capture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VariantCapabilities {
    /// The I2S peripheral can sample the on-die ADC directly.
    pub internal_adc: bool,
    /// The I2S peripheral has a PDM receiver.
    pub pdm: bool,
    /// ADC1 `(gpio, channel)` pairs.
    pub adc1_pins: &'static [(u8, u8)],
    /// Number of GPIOs (`0..gpio_count`).
    pub gpio_count: u8,
}

impl VariantCapabilities {
    pub fn supports(&self, mode: AcquisitionMode) -> bool {
        match mode {
            AcquisitionMode::Internal => self.internal_adc,
            AcquisitionMode::External => true,
        }
    }

    pub fn adc1_channel(&self, gpio: u8) -> Option<u8> {
        self.adc1_pins
            .iter()
            .find(|(pin, _)| *pin == gpio)
            .map(|(_, channel)| *channel)
    }

    pub fn has_gpio(&self, gpio: u8) -> bool {
        gpio < self.gpio_count
    }
}

const ESP32_ADC1: &[(u8, u8)] = &[
    (36, 0),
    (37, 1),
    (38, 2),
    (39, 3),
    (32, 4),
    (33, 5),
    (34, 6),
    (35, 7),
];

// S2 and S3 share the GPIO1..=10 layout.
const ESP32_S2_S3_ADC1: &[(u8, u8)] = &[
    (1, 0),
    (2, 1),
    (3, 2),
    (4, 3),
    (5, 4),
    (6, 5),
    (7, 6),
    (8, 7),
    (9, 8),
    (10, 9),
];

const ESP32_C3_ADC1: &[(u8, u8)] = &[(0, 0), (1, 1), (2, 2), (3, 3), (4, 4)];

const ESP32_C6_ADC1: &[(u8, u8)] = &[(0, 0), (1, 1), (2, 2), (3, 3), (4, 4), (5, 5), (6, 6)];

const ESP32_H2_ADC1: &[(u8, u8)] = &[(1, 0), (2, 1), (3, 2), (4, 3), (5, 4)];

impl HardwareVariant {
    pub fn capabilities(&self) -> &'static VariantCapabilities {
        match self {
            Self::Esp32 => &ESP32,
            Self::Esp32S2 => &ESP32_S2,
            Self::Esp32S3 => &ESP32_S3,
            Self::Esp32C3 => &ESP32_C3,
            Self::Esp32C6 => &ESP32_C6,
            Self::Esp32H2 => &ESP32_H2,
        }
    }
}

static ESP32: VariantCapabilities = VariantCapabilities {
    internal_adc: true,
    pdm: true,
    adc1_pins: ESP32_ADC1,
    gpio_count: 40,
};

static ESP32_S2: VariantCapabilities = VariantCapabilities {
    internal_adc: false,
    pdm: false,
    adc1_pins: ESP32_S2_S3_ADC1,
    gpio_count: 47,
};

static ESP32_S3: VariantCapabilities = VariantCapabilities {
    internal_adc: false,
    pdm: true,
    adc1_pins: ESP32_S2_S3_ADC1,
    gpio_count: 49,
};

static ESP32_C3: VariantCapabilities = VariantCapabilities {
    internal_adc: false,
    pdm: false,
    adc1_pins: ESP32_C3_ADC1,
    gpio_count: 22,
};

static ESP32_C6: VariantCapabilities = VariantCapabilities {
    internal_adc: false,
    pdm: false,
    adc1_pins: ESP32_C6_ADC1,
    gpio_count: 31,
};

static ESP32_H2: VariantCapabilities = VariantCapabilities {
    internal_adc: false,
    pdm: false,
    adc1_pins: ESP32_H2_ADC1,
    gpio_count: 28,
};

/// Variants whose I2S peripheral has a PDM receiver.
pub fn pdm_variants() -> impl Iterator<Item = HardwareVariant> {
    HardwareVariant::ALL
        .into_iter()
        .filter(|v| v.capabilities().pdm)
}
