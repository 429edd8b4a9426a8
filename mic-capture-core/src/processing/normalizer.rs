use crate::models::capability::NegotiatedFormat;
use crate::models::frame::{BitDepth, OutputFrame, RawFrame, MAX_FRAME_CHANNELS};

/// Converts raw peripheral words into the negotiated output format.
///
/// Per frame, in order:
/// 1. pad or truncate to the output channel count (missing channels repeat
///    the last hardware channel, so mono fans out to both sides),
/// 2. clamp each word to the capture depth,
/// 3. apply the gain as a left shift by `gain_log2`, saturating at the
///    capture depth's range,
/// 4. rescale to the output depth (MSB-aligned, like an I2S slot).
///
/// Pure and allocation-free.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FormatNormalizer {
    input_depth: BitDepth,
    output_depth: BitDepth,
    output_channels: u8,
    gain_log2: u8,
}

impl FormatNormalizer {
    pub fn new(input_depth: BitDepth, format: &NegotiatedFormat, gain_log2: u8) -> Self {
        Self {
            input_depth,
            output_depth: format.bit_depth,
            output_channels: format.channels.clamp(1, MAX_FRAME_CHANNELS as u8),
            gain_log2,
        }
    }

    pub fn normalize(&self, raw: &RawFrame) -> OutputFrame {
        let words = raw.samples();
        let mut samples = [0i32; MAX_FRAME_CHANNELS];

        for (channel, slot) in samples
            .iter_mut()
            .take(self.output_channels as usize)
            .enumerate()
        {
            let word = words[channel.min(words.len() - 1)];
            let clamped = saturate(word as i64, self.input_depth);
            let gained = apply_gain(clamped, self.gain_log2, self.input_depth);
            *slot = rescale(gained, self.input_depth, self.output_depth);
        }

        OutputFrame::new(samples, self.output_channels, self.output_depth)
    }

    pub fn output_channels(&self) -> u8 {
        self.output_channels
    }

    pub fn output_depth(&self) -> BitDepth {
        self.output_depth
    }
}

fn saturate(value: i64, depth: BitDepth) -> i32 {
    value.clamp(depth.min_value() as i64, depth.max_value() as i64) as i32
}

/// Multiply by `2^gain_log2` without wrapping.
pub fn apply_gain(sample: i32, gain_log2: u8, depth: BitDepth) -> i32 {
    if gain_log2 == 0 {
        return sample;
    }
    saturate((sample as i64) << gain_log2.min(31), depth)
}

fn rescale(sample: i32, from: BitDepth, to: BitDepth) -> i32 {
    match (from, to) {
        (BitDepth::Bits32, BitDepth::Bits16) => sample >> 16,
        (BitDepth::Bits16, BitDepth::Bits32) => sample << 16,
        _ => sample,
    }
}
