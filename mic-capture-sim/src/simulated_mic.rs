//! Clocked microphone peripheral for host runs.
//!
//! A dedicated thread plays the role of the I2S DMA engine: every block
//! period it fills one block of frames from a [`Waveform`] and hands it to
//! the [`FrameSink`] like a transfer-complete interrupt would.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use mic_capture_core::hardware::bus::PeripheralBus;
use mic_capture_core::hardware::channel_map::ConcreteChannel;
use mic_capture_core::models::error::CaptureError;
use mic_capture_core::processing::sample_buffer::FrameSink;
use mic_capture_core::traits::peripheral::{MicPeripheral, PeripheralParams};

use crate::waveform::{Waveform, WaveformGenerator};

/// Highest rate the simulated I2S clock divider can reach.
pub const DEFAULT_MAX_SAMPLE_RATE: u32 = 48_000;

/// Simulated I2S / ADC-over-I2S / PDM receiver.
pub struct SimulatedMic {
    bus: Arc<PeripheralBus>,
    waveform: Waveform,
    max_sample_rate: u32,
    clock_scale: f64,
    fault_after: Option<u64>,
    running: Arc<AtomicBool>,
    produced: Arc<AtomicU64>,
    capture_handle: Mutex<Option<thread::JoinHandle<()>>>,
}

impl SimulatedMic {
    pub fn new(bus: Arc<PeripheralBus>, waveform: Waveform) -> Self {
        Self {
            bus,
            waveform,
            max_sample_rate: DEFAULT_MAX_SAMPLE_RATE,
            clock_scale: 1.0,
            fault_after: None,
            running: Arc::new(AtomicBool::new(false)),
            produced: Arc::new(AtomicU64::new(0)),
            capture_handle: Mutex::new(None),
        }
    }

    /// Reject configurations above `rate` with `PeripheralInitError`.
    pub fn with_max_sample_rate(mut self, rate: u32) -> Self {
        self.max_sample_rate = rate;
        self
    }

    /// Run the clock `scale` times faster than real time.
    pub fn with_clock_scale(mut self, scale: f64) -> Self {
        self.clock_scale = if scale > 0.0 { scale } else { 1.0 };
        self
    }

    /// Report a DMA fault once `frames` frames have been produced in a run.
    pub fn with_fault_after(mut self, frames: u64) -> Self {
        self.fault_after = Some(frames);
        self
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Frames produced during the current or last run, including dropped ones.
    pub fn frames_produced(&self) -> u64 {
        self.produced.load(Ordering::Relaxed)
    }

    fn check_params(&self, params: &PeripheralParams<'_>) -> Result<(), CaptureError> {
        let config = params.config;
        if config.sample_rate > self.max_sample_rate {
            return Err(CaptureError::PeripheralInitError(format!(
                "sample rate {} Hz exceeds the {} Hz clock limit",
                config.sample_rate, self.max_sample_rate
            )));
        }
        match (config.external.as_ref(), config.channel) {
            (None, ConcreteChannel::Adc1(_)) | (Some(_), ConcreteChannel::I2s(_)) => Ok(()),
            _ => Err(CaptureError::PeripheralInitError(format!(
                "channel {:?} does not match {} acquisition",
                config.channel, config.mode
            ))),
        }
    }
}

impl MicPeripheral for SimulatedMic {
    fn bus(&self) -> Arc<PeripheralBus> {
        Arc::clone(&self.bus)
    }

    fn open(&mut self, params: &PeripheralParams<'_>, sink: FrameSink) -> Result<(), CaptureError> {
        if self.running.load(Ordering::SeqCst) {
            return Err(CaptureError::InvalidState(
                "simulated mic already running".into(),
            ));
        }
        self.check_params(params)?;

        let config = params.config;
        let generator = WaveformGenerator::new(self.waveform, config.sample_rate, config.bit_depth);
        let block_frames = params.block_frames.max(1);
        let block_period = Duration::from_secs_f64(
            block_frames as f64 / (config.sample_rate as f64 * self.clock_scale),
        );

        self.running.store(true, Ordering::SeqCst);
        self.produced.store(0, Ordering::Relaxed);

        let clock = ClockLoop {
            running: Arc::clone(&self.running),
            produced: Arc::clone(&self.produced),
            generator,
            sink,
            block_frames,
            block_period,
            fault_after: self.fault_after,
        };

        let handle = thread::Builder::new()
            .name("sim-mic-capture".into())
            .spawn(move || clock.run())
            .map_err(|e| {
                self.running.store(false, Ordering::SeqCst);
                CaptureError::PeripheralInitError(format!("failed to spawn mic thread: {}", e))
            })?;

        *self.capture_handle.lock() = Some(handle);
        log::debug!("{} opened, block period {:?}", self.describe(), block_period);
        Ok(())
    }

    fn close(&mut self) -> Result<(), CaptureError> {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.capture_handle.lock().take() {
            handle
                .join()
                .map_err(|_| CaptureError::PeripheralFault("simulated mic thread panicked".into()))?;
        }
        Ok(())
    }

    fn describe(&self) -> String {
        format!("simulated mic on {}", self.bus.name())
    }
}

impl Drop for SimulatedMic {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            log::warn!("failed to close {} on drop: {}", self.describe(), e);
        }
    }
}

/// State moved into the capture thread.
struct ClockLoop {
    running: Arc<AtomicBool>,
    produced: Arc<AtomicU64>,
    generator: WaveformGenerator,
    sink: FrameSink,
    block_frames: usize,
    block_period: Duration,
    fault_after: Option<u64>,
}

impl ClockLoop {
    fn run(mut self) {
        let mut block = Vec::with_capacity(self.block_frames);
        let mut next_tick = Instant::now() + self.block_period;

        while self.running.load(Ordering::SeqCst) && self.sink.is_open() {
            let now = Instant::now();
            if next_tick > now {
                thread::sleep(next_tick - now);
            }
            next_tick += self.block_period;

            block.clear();
            self.generator.fill(&mut block, self.block_frames);
            self.sink.push_block(&block);
            let total = self
                .produced
                .fetch_add(block.len() as u64, Ordering::Relaxed)
                + block.len() as u64;

            if self.fault_after.is_some_and(|limit| total >= limit) {
                log::error!("simulated DMA fault after {} frames", total);
                self.sink.report_fault("simulated DMA fault");
                break;
            }
        }
        // Dropping the sink here ends production for this run.
    }
}
