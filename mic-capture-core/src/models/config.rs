use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::frame::BitDepth;
use super::variant::{AcquisitionMode, HardwareVariant};
use crate::hardware::channel_map::{ChannelSelector, ConcreteChannel};

pub const DEFAULT_SAMPLE_RATE: u32 = 16_000;
pub const DEFAULT_BITS_PER_SAMPLE: u8 = 32;
pub const MAX_GAIN_LOG2: u8 = 7;

/// I2S slot the mono transducer drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelSlot {
    Left,
    #[default]
    Right,
}

/// Clock role of the I2S port the microphone is attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum I2sRole {
    #[default]
    Primary,
    Secondary,
}

fn default_adc_model() -> String {
    "generic".into()
}

/// Mode-specific part of a microphone record, tagged by `adc_type`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "adc_type", rename_all = "lowercase")]
pub enum AdcSettings {
    Internal {
        adc_pin: u8,
    },
    External {
        i2s_din_pin: u8,
        pdm: bool,
        #[serde(default = "default_adc_model")]
        i2s_adc: String,
        #[serde(default)]
        i2s_mode: I2sRole,
    },
}

fn default_sample_rate() -> u32 {
    DEFAULT_SAMPLE_RATE
}

fn default_bits_per_sample() -> u8 {
    DEFAULT_BITS_PER_SAMPLE
}

/// Typed microphone record handed over by the configuration front-end.
///
/// Values are already parsed; hardware constraints are re-checked by
/// [`crate::hardware::validator::validate`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MicrophoneConfig {
    #[serde(flatten)]
    pub adc: AdcSettings,

    #[serde(default)]
    pub channel: ChannelSlot,

    #[serde(default = "default_sample_rate")]
    pub sample_rate: u32,

    #[serde(default = "default_bits_per_sample")]
    pub bits_per_sample: u8,

    /// Drive the I2S clock from the audio PLL.
    #[serde(default)]
    pub use_apll: bool,

    /// Power-of-two gain applied during normalization (0..=7).
    #[serde(default)]
    pub gain_log2: u8,
}

impl MicrophoneConfig {
    /// Internal-ADC microphone on `adc_pin` with default rate, depth and gain.
    pub fn internal(adc_pin: u8) -> Self {
        Self::with_adc(AdcSettings::Internal { adc_pin })
    }

    /// External I2S microphone reading data from `din_pin`.
    pub fn external(din_pin: u8, pdm: bool) -> Self {
        Self::with_adc(AdcSettings::External {
            i2s_din_pin: din_pin,
            pdm,
            i2s_adc: default_adc_model(),
            i2s_mode: I2sRole::default(),
        })
    }

    fn with_adc(adc: AdcSettings) -> Self {
        Self {
            adc,
            channel: ChannelSlot::default(),
            sample_rate: DEFAULT_SAMPLE_RATE,
            bits_per_sample: DEFAULT_BITS_PER_SAMPLE,
            use_apll: false,
            gain_log2: 0,
        }
    }

    pub fn mode(&self) -> AcquisitionMode {
        match self.adc {
            AdcSettings::Internal { .. } => AcquisitionMode::Internal,
            AdcSettings::External { .. } => AcquisitionMode::External,
        }
    }

    pub fn is_pdm(&self) -> bool {
        matches!(self.adc, AdcSettings::External { pdm: true, .. })
    }

    /// The selector the resolver has to map: a GPIO for internal mode, an I2S slot otherwise.
    pub fn selector(&self) -> ChannelSelector {
        match self.adc {
            AdcSettings::Internal { adc_pin } => ChannelSelector::Pin(adc_pin),
            AdcSettings::External { .. } => ChannelSelector::Slot(self.channel),
        }
    }
}

/// Parameters only meaningful for an external transducer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExternalParams {
    pub data_pin: u8,
    pub pdm: bool,
    pub adc_model: String,
    pub role: I2sRole,
}

/// Resolved and validated configuration for one microphone.
///
/// Produced by [`crate::hardware::validator::resolve_config`]; immutable afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AcquisitionConfig {
    pub variant: HardwareVariant,
    pub mode: AcquisitionMode,
    pub channel: ConcreteChannel,
    pub sample_rate: u32,
    pub bit_depth: BitDepth,
    pub gain_log2: u8,
    pub use_apll: bool,
    pub external: Option<ExternalParams>,
}

/// Upper bound on the ring capacity, in frames.
pub const MAX_BUFFER_FRAMES: usize = 1 << 20;

/// Host-side tuning for the drain loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineSettings {
    /// Sleep between drain passes of the pipeline loop.
    pub drain_interval: Duration,

    /// Worst-case delay the host scheduler may add on top of `drain_interval`.
    pub scheduling_jitter: Duration,

    /// Frames per completed DMA transfer.
    pub dma_block_frames: usize,
}

impl PipelineSettings {
    /// Ring capacity (in frames) that survives one drain interval plus the
    /// worst-case jitter, with one extra DMA block of headroom.
    ///
    /// Never exceeds [`MAX_BUFFER_FRAMES`].
    pub fn buffer_capacity(&self, sample_rate: u32) -> usize {
        let window = self
            .drain_interval
            .saturating_add(self.scheduling_jitter)
            .as_secs_f64();
        let frames = (sample_rate as f64 * window).ceil() as usize;
        frames
            .max(1)
            .checked_add(self.dma_block_frames)
            .map_or(MAX_BUFFER_FRAMES, |n| n.min(MAX_BUFFER_FRAMES))
    }
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            drain_interval: Duration::from_millis(10),
            scheduling_jitter: Duration::from_millis(100),
            dma_block_frames: 256,
        }
    }
}
