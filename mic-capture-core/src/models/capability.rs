use serde::{Deserialize, Serialize};

use super::frame::BitDepth;

/// What the microphone can deliver, advertised once before acquisition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapabilityOffer {
    pub max_channels: u8,
    pub supported_bit_depths: Vec<BitDepth>,
    pub supported_sample_rates: Vec<u32>,
}

/// The consumer's chosen subset of an offer. `None` fields mean "as offered".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapabilityRequest {
    pub max_channels: Option<u8>,
    pub bit_depth: Option<BitDepth>,
    pub sample_rate: Option<u32>,
}

impl CapabilityRequest {
    pub fn channels(max_channels: u8) -> Self {
        Self {
            max_channels: Some(max_channels),
            ..Default::default()
        }
    }

    pub fn with_bit_depth(mut self, bit_depth: BitDepth) -> Self {
        self.bit_depth = Some(bit_depth);
        self
    }

    pub fn with_sample_rate(mut self, sample_rate: u32) -> Self {
        self.sample_rate = Some(sample_rate);
        self
    }
}

/// Output format both sides agreed on; fixed for the lifetime of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NegotiatedFormat {
    pub channels: u8,
    pub bit_depth: BitDepth,
    pub sample_rate: u32,
}
