use std::fmt;

use serde::{Deserialize, Serialize};

use super::error::ConfigError;

/// Widest frame the core moves around (stereo).
pub const MAX_FRAME_CHANNELS: usize = 2;

/// PCM sample width. Only 16- and 32-bit slots are supported by the I2S peripheral.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum BitDepth {
    Bits16,
    Bits32,
}

impl BitDepth {
    pub const SUPPORTED: [BitDepth; 2] = [BitDepth::Bits16, BitDepth::Bits32];

    pub fn bits(&self) -> u8 {
        match self {
            Self::Bits16 => 16,
            Self::Bits32 => 32,
        }
    }

    pub fn bytes_per_sample(&self) -> usize {
        self.bits() as usize / 8
    }

    /// Smallest representable sample value.
    pub fn min_value(&self) -> i32 {
        match self {
            Self::Bits16 => i16::MIN as i32,
            Self::Bits32 => i32::MIN,
        }
    }

    /// Largest representable sample value.
    pub fn max_value(&self) -> i32 {
        match self {
            Self::Bits16 => i16::MAX as i32,
            Self::Bits32 => i32::MAX,
        }
    }
}

impl TryFrom<u8> for BitDepth {
    type Error = ConfigError;

    fn try_from(bits: u8) -> Result<Self, Self::Error> {
        match bits {
            16 => Ok(Self::Bits16),
            32 => Ok(Self::Bits32),
            other => Err(ConfigError::UnsupportedBitDepth(other)),
        }
    }
}

impl From<BitDepth> for u8 {
    fn from(depth: BitDepth) -> Self {
        depth.bits()
    }
}

impl fmt::Display for BitDepth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}bit", self.bits())
    }
}

/// One frame of raw peripheral words, as delivered by the DMA/ISR path.
///
/// Words are sign-extended into `i32` regardless of the slot width.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawFrame {
    samples: [i32; MAX_FRAME_CHANNELS],
    channels: u8,
}

impl RawFrame {
    pub fn mono(sample: i32) -> Self {
        Self {
            samples: [sample, 0],
            channels: 1,
        }
    }

    /// Build a frame from per-channel words. Extra channels beyond
    /// [`MAX_FRAME_CHANNELS`] are ignored; an empty slice yields a silent mono frame.
    pub fn from_slice(words: &[i32]) -> Self {
        if words.is_empty() {
            return Self::mono(0);
        }
        let channels = words.len().min(MAX_FRAME_CHANNELS);
        let mut samples = [0; MAX_FRAME_CHANNELS];
        samples[..channels].copy_from_slice(&words[..channels]);
        Self {
            samples,
            channels: channels as u8,
        }
    }

    pub fn samples(&self) -> &[i32] {
        &self.samples[..self.channels as usize]
    }

    pub fn channels(&self) -> u8 {
        self.channels
    }
}

/// A normalized frame in the format agreed during negotiation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutputFrame {
    samples: [i32; MAX_FRAME_CHANNELS],
    channels: u8,
    bit_depth: BitDepth,
}

impl OutputFrame {
    pub(crate) fn new(samples: [i32; MAX_FRAME_CHANNELS], channels: u8, bit_depth: BitDepth) -> Self {
        Self {
            samples,
            channels,
            bit_depth,
        }
    }

    pub fn samples(&self) -> &[i32] {
        &self.samples[..self.channels as usize]
    }

    pub fn channels(&self) -> u8 {
        self.channels
    }

    pub fn bit_depth(&self) -> BitDepth {
        self.bit_depth
    }

    /// Append the frame as interleaved little-endian PCM.
    ///
    /// 16-bit frames emit 2 bytes per sample, 32-bit frames 4 bytes.
    pub fn write_le_bytes(&self, out: &mut Vec<u8>) {
        for &sample in self.samples() {
            match self.bit_depth {
                BitDepth::Bits16 => out.extend_from_slice(&(sample as i16).to_le_bytes()),
                BitDepth::Bits32 => out.extend_from_slice(&sample.to_le_bytes()),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bit_depth_from_u8() {
        assert_eq!(BitDepth::try_from(16), Ok(BitDepth::Bits16));
        assert_eq!(BitDepth::try_from(32), Ok(BitDepth::Bits32));
        assert_eq!(
            BitDepth::try_from(24),
            Err(ConfigError::UnsupportedBitDepth(24))
        );
    }

    #[test]
    fn bit_depth_ranges() {
        assert_eq!(BitDepth::Bits16.min_value(), -32768);
        assert_eq!(BitDepth::Bits16.max_value(), 32767);
        assert_eq!(BitDepth::Bits32.max_value(), i32::MAX);
        assert_eq!(BitDepth::Bits32.bytes_per_sample(), 4);
    }

    #[test]
    fn raw_frame_from_slice_truncates() {
        let frame = RawFrame::from_slice(&[1, 2, 3]);
        assert_eq!(frame.channels(), 2);
        assert_eq!(frame.samples(), &[1, 2]);

        let empty = RawFrame::from_slice(&[]);
        assert_eq!(empty.samples(), &[0]);
    }

    #[test]
    fn output_frame_le_bytes() {
        let frame = OutputFrame::new([-2, 0], 1, BitDepth::Bits16);
        let mut bytes = Vec::new();
        frame.write_le_bytes(&mut bytes);
        assert_eq!(bytes, vec![0xFE, 0xFF]);

        let frame = OutputFrame::new([1, 2], 2, BitDepth::Bits32);
        bytes.clear();
        frame.write_le_bytes(&mut bytes);
        assert_eq!(bytes, vec![1, 0, 0, 0, 2, 0, 0, 0]);
    }
}
