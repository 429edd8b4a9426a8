//! Test signals for the simulated transducer.

use std::f64::consts::TAU;

use mic_capture_core::models::frame::{BitDepth, RawFrame};

/// Signal the simulated microphone "hears".
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Waveform {
    /// `amplitude` is a fraction of full scale (0.0..=1.0).
    Sine { frequency_hz: f64, amplitude: f64 },
    /// Counts up by `step` per frame, wrapping within the sample range.
    /// Useful for checking order and gaps downstream.
    Ramp { step: i32 },
    /// The same raw word every frame.
    Constant(i32),
    Silence,
}

impl Default for Waveform {
    fn default() -> Self {
        Self::Sine {
            frequency_hz: 440.0,
            amplitude: 0.5,
        }
    }
}

/// Produces raw words for one run at a fixed sample rate and slot width.
#[derive(Debug, Clone)]
pub struct WaveformGenerator {
    waveform: Waveform,
    sample_rate: u32,
    depth: BitDepth,
    index: u64,
}

impl WaveformGenerator {
    pub fn new(waveform: Waveform, sample_rate: u32, depth: BitDepth) -> Self {
        Self {
            waveform,
            sample_rate: sample_rate.max(1),
            depth,
            index: 0,
        }
    }

    /// Frames generated so far.
    pub fn position(&self) -> u64 {
        self.index
    }

    pub fn next_frame(&mut self) -> RawFrame {
        let value = self.sample_at(self.index);
        self.index += 1;
        RawFrame::mono(value)
    }

    /// Append `count` frames to `out`.
    pub fn fill(&mut self, out: &mut Vec<RawFrame>, count: usize) {
        out.reserve(count);
        for _ in 0..count {
            out.push(self.next_frame());
        }
    }

    fn sample_at(&self, index: u64) -> i32 {
        let max = self.depth.max_value();
        match self.waveform {
            Waveform::Sine {
                frequency_hz,
                amplitude,
            } => {
                let t = index as f64 / self.sample_rate as f64;
                let value = (TAU * frequency_hz * t).sin() * amplitude.clamp(0.0, 1.0);
                (value * max as f64).round() as i32
            }
            Waveform::Ramp { step } => {
                let raw = (index as i64).wrapping_mul(step as i64);
                match self.depth {
                    BitDepth::Bits16 => raw as i16 as i32,
                    BitDepth::Bits32 => raw as i32,
                }
            }
            Waveform::Constant(value) => value,
            Waveform::Silence => 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn values(generator: &mut WaveformGenerator, count: usize) -> Vec<i32> {
        (0..count).map(|_| generator.next_frame().samples()[0]).collect()
    }

    #[test]
    fn sine_peaks_at_amplitude() {
        let mut generator = WaveformGenerator::new(
            Waveform::Sine {
                frequency_hz: 100.0,
                amplitude: 0.5,
            },
            16_000,
            BitDepth::Bits16,
        );
        let samples = values(&mut generator, 16_000);

        let peak = samples.iter().map(|s| s.abs()).max().unwrap() as f64;
        assert_abs_diff_eq!(peak / i16::MAX as f64, 0.5, epsilon = 1e-3);

        let mean = samples.iter().map(|&s| s as f64).sum::<f64>() / samples.len() as f64;
        assert_abs_diff_eq!(mean, 0.0, epsilon = 1.0);
    }

    #[test]
    fn sine_amplitude_is_clamped_to_full_scale() {
        let mut generator = WaveformGenerator::new(
            Waveform::Sine {
                frequency_hz: 1000.0,
                amplitude: 4.0,
            },
            8_000,
            BitDepth::Bits32,
        );
        for value in values(&mut generator, 800) {
            assert!(value > i32::MIN);
        }
    }

    #[test]
    fn ramp_counts_by_step() {
        let mut generator = WaveformGenerator::new(Waveform::Ramp { step: 3 }, 16_000, BitDepth::Bits32);
        assert_eq!(values(&mut generator, 4), vec![0, 3, 6, 9]);
        assert_eq!(generator.position(), 4);
    }

    #[test]
    fn ramp_wraps_within_16_bit_range() {
        let mut generator = WaveformGenerator::new(Waveform::Ramp { step: 1 }, 16_000, BitDepth::Bits16);
        let samples = values(&mut generator, 70_000);
        assert_eq!(samples[32_767], i16::MAX as i32);
        assert_eq!(samples[32_768], i16::MIN as i32);
        assert!(samples
            .iter()
            .all(|&s| s >= i16::MIN as i32 && s <= i16::MAX as i32));
    }

    #[test]
    fn fill_appends_frames() {
        let mut generator = WaveformGenerator::new(Waveform::Constant(7), 16_000, BitDepth::Bits16);
        let mut out = Vec::new();
        generator.fill(&mut out, 3);
        generator.fill(&mut out, 2);
        assert_eq!(out.len(), 5);
        assert!(out.iter().all(|f| f.samples() == [7]));
    }

    #[test]
    fn silence_is_zero() {
        let mut generator = WaveformGenerator::new(Waveform::Silence, 16_000, BitDepth::Bits16);
        assert!(values(&mut generator, 10).iter().all(|&s| s == 0));
    }
}
