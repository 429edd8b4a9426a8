use std::fmt;

use serde::{Deserialize, Serialize};

/// Physical platform family the firmware runs on.
///
/// Capabilities per variant live in [`crate::hardware::registry`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HardwareVariant {
    #[serde(rename = "ESP32")]
    Esp32,
    #[serde(rename = "ESP32S2")]
    Esp32S2,
    #[serde(rename = "ESP32S3")]
    Esp32S3,
    #[serde(rename = "ESP32C3")]
    Esp32C3,
    #[serde(rename = "ESP32C6")]
    Esp32C6,
    #[serde(rename = "ESP32H2")]
    Esp32H2,
}

impl HardwareVariant {
    pub const ALL: [HardwareVariant; 6] = [
        Self::Esp32,
        Self::Esp32S2,
        Self::Esp32S3,
        Self::Esp32C3,
        Self::Esp32C6,
        Self::Esp32H2,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Self::Esp32 => "ESP32",
            Self::Esp32S2 => "ESP32-S2",
            Self::Esp32S3 => "ESP32-S3",
            Self::Esp32C3 => "ESP32-C3",
            Self::Esp32C6 => "ESP32-C6",
            Self::Esp32H2 => "ESP32-H2",
        }
    }
}

impl fmt::Display for HardwareVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// How samples reach the chip: the on-die ADC, or an external I2S/PDM transducer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AcquisitionMode {
    Internal,
    External,
}

impl fmt::Display for AcquisitionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Internal => f.write_str("internal"),
            Self::External => f.write_str("external"),
        }
    }
}
