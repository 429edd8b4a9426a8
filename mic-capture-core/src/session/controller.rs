use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Instant;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;

use crate::hardware::validator::resolve_config;
use crate::models::capability::NegotiatedFormat;
use crate::models::config::{AcquisitionConfig, MicrophoneConfig, PipelineSettings};
use crate::models::error::CaptureError;
use crate::models::frame::RawFrame;
use crate::models::report::{CaptureReport, PipelineStats};
use crate::models::state::PipelineState;
use crate::processing::normalizer::FormatNormalizer;
use crate::processing::sample_buffer::{BufferMonitor, SampleBuffer};
use crate::session::engine::AcquisitionEngine;
use crate::session::negotiator;
use crate::traits::frame_consumer::{FrameConsumer, StopPolicy};
use crate::traits::peripheral::MicPeripheral;
use crate::traits::pipeline_delegate::PipelineDelegate;
use crate::traits::platform::PlatformIdentity;

type SharedConsumer = Arc<Mutex<Box<dyn FrameConsumer>>>;

/// Controller state shared with the drain thread.
struct PipelineShared {
    state: PipelineState,
    stats: PipelineStats,
}

/// Bookkeeping for the run between `start()` and `stop()`.
struct ActiveRun {
    handle: thread::JoinHandle<SampleBuffer>,
    normalizer: FormatNormalizer,
    format: NegotiatedFormat,
    started_at: DateTime<Utc>,
    started: Instant,
}

/// Drives one microphone from configuration to a stream of normalized frames.
///
/// ```text
/// setup(): MicrophoneConfig → validator/resolver → AcquisitionConfig
/// start(): negotiator → engine.start → drain thread
///
/// [MicPeripheral] → SampleBuffer ─(drain thread)→ FormatNormalizer → FrameConsumer
/// ```
pub struct PipelineController<P: MicPeripheral> {
    engine: AcquisitionEngine<P>,
    consumer: SharedConsumer,
    settings: PipelineSettings,
    config: Option<AcquisitionConfig>,
    format: Option<NegotiatedFormat>,
    shared: Arc<Mutex<PipelineShared>>,
    delegate: Option<Arc<dyn PipelineDelegate>>,
    running: Arc<AtomicBool>,
    run: Option<ActiveRun>,
}

impl<P: MicPeripheral> PipelineController<P> {
    pub fn new(peripheral: P, consumer: Box<dyn FrameConsumer>) -> Self {
        Self::with_settings(peripheral, consumer, PipelineSettings::default())
    }

    pub fn with_settings(
        peripheral: P,
        consumer: Box<dyn FrameConsumer>,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            engine: AcquisitionEngine::new(peripheral),
            consumer: Arc::new(Mutex::new(consumer)),
            settings,
            config: None,
            format: None,
            shared: Arc::new(Mutex::new(PipelineShared {
                state: PipelineState::Uninitialized,
                stats: PipelineStats::default(),
            })),
            delegate: None,
            running: Arc::new(AtomicBool::new(false)),
            run: None,
        }
    }

    pub fn set_delegate(&mut self, delegate: Arc<dyn PipelineDelegate>) {
        self.delegate = Some(delegate);
    }

    pub fn state(&self) -> PipelineState {
        self.shared.lock().state.clone()
    }

    /// Counters of the current run, or of the last one once stopped.
    pub fn stats(&self) -> PipelineStats {
        self.shared.lock().stats
    }

    /// Format agreed with the consumer for the current or last run.
    pub fn format(&self) -> Option<NegotiatedFormat> {
        self.format
    }

    /// Resolved configuration from the last successful `setup()`.
    pub fn config(&self) -> Option<&AcquisitionConfig> {
        self.config.as_ref()
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    pub fn engine(&self) -> &AcquisitionEngine<P> {
        &self.engine
    }

    /// Validate `config` for the platform's variant and store the result.
    /// Transitions: uninitialized/configured/stopped/failed → configured.
    ///
    /// A run that already failed is stopped first. Otherwise the peripheral
    /// is never touched. On error the state is unchanged.
    pub fn setup(
        &mut self,
        platform: &dyn PlatformIdentity,
        config: &MicrophoneConfig,
    ) -> Result<(), CaptureError> {
        if self.state().is_running() {
            return Err(CaptureError::InvalidState(
                "cannot reconfigure a running pipeline".into(),
            ));
        }
        // A run that failed at runtime is still holding its thread and claim.
        if self.run.is_some() {
            self.stop()?;
        }

        let variant = platform.current_variant();
        let resolved = match resolve_config(variant, config) {
            Ok(resolved) => resolved,
            Err(e) => {
                log::error!("microphone configuration rejected for {}: {}", variant, e);
                let err = CaptureError::from(e);
                self.notify_error(&err);
                return Err(err);
            }
        };

        log::debug!(
            "resolved {} microphone on {}: {:?}",
            resolved.mode,
            variant,
            resolved.channel
        );

        self.config = Some(resolved);
        self.set_state(PipelineState::Configured);
        Ok(())
    }

    /// Negotiate the output format, start acquisition and the drain thread.
    /// Transitions: configured/stopped/failed → running.
    ///
    /// A capability mismatch leaves the state unchanged. Peripheral errors
    /// move the pipeline to `Failed` with nothing left claimed.
    pub fn start(&mut self) -> Result<(), CaptureError> {
        let state = self.state();
        if !state.can_start() {
            return Err(CaptureError::InvalidState(format!(
                "cannot start from {} state",
                state
            )));
        }
        let config = self
            .config
            .clone()
            .ok_or_else(|| CaptureError::InvalidState("not configured".into()))?;

        // A run that failed at runtime is still holding its thread and claim.
        if self.run.is_some() {
            self.stop()?;
        }

        let format = {
            let mut consumer = self.consumer.lock();
            match negotiator::negotiate_with(&mut **consumer, &config) {
                Ok(format) => format,
                Err(e) => {
                    drop(consumer);
                    log::error!("capability negotiation failed: {}", e);
                    let err = CaptureError::from(e);
                    self.notify_error(&err);
                    return Err(err);
                }
            }
        };
        let normalizer = FormatNormalizer::new(config.bit_depth, &format, config.gain_log2);

        let capacity = self.settings.buffer_capacity(config.sample_rate);
        let buffer = match self
            .engine
            .start(&config, capacity, self.settings.dma_block_frames)
        {
            Ok(buffer) => buffer,
            Err(e) => {
                self.fail(e.clone());
                return Err(e);
            }
        };

        self.consumer.lock().on_format(&format);
        {
            let mut s = self.shared.lock();
            s.stats = PipelineStats::default();
        }
        self.format = Some(format);
        self.set_state(PipelineState::Running);

        let started_at = Utc::now();
        let started = Instant::now();
        let handle = match self.spawn_drain_thread(buffer, normalizer) {
            Ok(handle) => handle,
            Err(e) => {
                self.running.store(false, Ordering::SeqCst);
                if let Err(stop_err) = self.engine.stop() {
                    log::error!("failed to stop acquisition after spawn error: {}", stop_err);
                }
                self.fail(e.clone());
                return Err(e);
            }
        };

        self.run = Some(ActiveRun {
            handle,
            normalizer,
            format,
            started_at,
            started,
        });

        log::info!(
            "pipeline running: {} channel(s), {}, {} Hz",
            format.channels,
            format.bit_depth,
            format.sample_rate
        );
        Ok(())
    }

    /// Stop acquisition, drain what is left and report on the run.
    /// Transitions: running/failed → stopped.
    ///
    /// Once this returns the consumer receives nothing more from this run.
    pub fn stop(&mut self) -> Result<CaptureReport, CaptureError> {
        let Some(run) = self.run.take() else {
            return Err(CaptureError::InvalidState("pipeline is not running".into()));
        };

        self.running.store(false, Ordering::SeqCst);

        // The peripheral first: after this the buffer only shrinks.
        let engine_result = self.engine.stop();

        let mut buffer = match run.handle.join() {
            Ok(buffer) => buffer,
            Err(_) => {
                let err = CaptureError::Thread("pipeline drain thread panicked".into());
                log::error!("{}", err);
                self.fail(err.clone());
                return Err(err);
            }
        };
        let monitor = buffer.monitor();

        let policy = self.consumer.lock().stop_policy();
        match policy {
            StopPolicy::Forward => {
                let forwarded = forward_all(&mut buffer, &run.normalizer, &self.consumer);
                self.shared.lock().stats.frames_forwarded += forwarded;
            }
            StopPolicy::Discard => {
                let mut discarded = 0u64;
                while buffer.pop().is_some() {
                    discarded += 1;
                }
                if discarded > 0 {
                    log::warn!("discarded {} buffered frame(s) at stop", discarded);
                }
                self.shared.lock().stats.frames_discarded += discarded;
            }
        }
        record_counters(&self.shared, &monitor, self.delegate.as_deref());
        self.consumer.lock().on_stop();

        if let Err(e) = engine_result {
            log::error!("peripheral did not close cleanly: {}", e);
            self.notify_error(&e);
        }

        let stats = self.stats();
        let report = CaptureReport::new(
            run.started_at,
            run.started.elapsed().as_secs_f64(),
            run.format,
            stats,
        );

        log::info!(
            "pipeline stopped: {} forwarded, {} discarded, {} overrun(s)",
            stats.frames_forwarded,
            stats.frames_discarded,
            stats.overruns
        );

        self.set_state(PipelineState::Stopped);
        if let Some(ref delegate) = self.delegate {
            delegate.on_stopped(&report);
        }

        Ok(report)
    }

    // --- Internal helpers ---

    fn set_state(&self, new_state: PipelineState) {
        publish_state(&self.shared, self.delegate.as_deref(), new_state);
    }

    fn fail(&self, error: CaptureError) {
        log::error!("pipeline failed: {}", error);
        self.notify_error(&error);
        self.set_state(PipelineState::Failed(error));
    }

    fn notify_error(&self, error: &CaptureError) {
        if let Some(ref delegate) = self.delegate {
            delegate.on_error(error);
        }
    }

    /// Spawn the loop that drains the buffer every `drain_interval`.
    /// The thread hands the buffer back when it exits so `stop()` can flush it.
    fn spawn_drain_thread(
        &self,
        mut buffer: SampleBuffer,
        normalizer: FormatNormalizer,
    ) -> Result<thread::JoinHandle<SampleBuffer>, CaptureError> {
        self.running.store(true, Ordering::SeqCst);

        let running = Arc::clone(&self.running);
        let shared = Arc::clone(&self.shared);
        let consumer = Arc::clone(&self.consumer);
        let delegate = self.delegate.clone();
        let interval = self.settings.drain_interval;

        thread::Builder::new()
            .name("mic-pipeline".into())
            .spawn(move || {
                let monitor = buffer.monitor();
                loop {
                    thread::sleep(interval);
                    if !running.load(Ordering::SeqCst) {
                        break;
                    }
                    let healthy = drain_pass(
                        &mut buffer,
                        &normalizer,
                        &consumer,
                        &shared,
                        &monitor,
                        delegate.as_deref(),
                    );
                    if !healthy {
                        break;
                    }
                }
                buffer
            })
            .map_err(|e| CaptureError::Thread(format!("failed to spawn pipeline thread: {}", e)))
    }
}

impl<P: MicPeripheral> Drop for PipelineController<P> {
    fn drop(&mut self) {
        if self.run.is_some() {
            if let Err(e) = self.stop() {
                log::error!("failed to stop pipeline on drop: {}", e);
            }
        }
    }
}

fn publish_state(
    shared: &Mutex<PipelineShared>,
    delegate: Option<&dyn PipelineDelegate>,
    new_state: PipelineState,
) {
    {
        let mut s = shared.lock();
        s.state = new_state.clone();
    }
    if let Some(delegate) = delegate {
        delegate.on_state_changed(&new_state);
    }
}

/// Normalize and forward everything currently queued. Returns the count.
fn forward_all(
    buffer: &mut SampleBuffer,
    normalizer: &FormatNormalizer,
    consumer: &Mutex<Box<dyn FrameConsumer>>,
) -> u64 {
    let mut frames: Vec<RawFrame> = Vec::with_capacity(buffer.len());
    buffer.drain_into(&mut frames, usize::MAX);
    if frames.is_empty() {
        return 0;
    }

    let mut consumer = consumer.lock();
    for frame in &frames {
        consumer.accept_frame(normalizer.normalize(frame));
    }
    frames.len() as u64
}

/// Copy the producer counters into the stats and report new overruns.
fn record_counters(
    shared: &Mutex<PipelineShared>,
    monitor: &BufferMonitor,
    delegate: Option<&dyn PipelineDelegate>,
) {
    let overruns = monitor.overruns();
    let new_overruns = {
        let mut s = shared.lock();
        let previous = s.stats.overruns;
        s.stats.frames_captured = monitor.frames_captured();
        s.stats.overruns = overruns;
        overruns.saturating_sub(previous)
    };

    if new_overruns > 0 {
        log::warn!(
            "sample buffer overrun: {} frame(s) dropped ({} total)",
            new_overruns,
            overruns
        );
        if let Some(delegate) = delegate {
            delegate.on_overrun(overruns);
        }
    }
}

/// One pass of the drain thread. Returns `false` once the peripheral faulted.
fn drain_pass(
    buffer: &mut SampleBuffer,
    normalizer: &FormatNormalizer,
    consumer: &Mutex<Box<dyn FrameConsumer>>,
    shared: &Mutex<PipelineShared>,
    monitor: &BufferMonitor,
    delegate: Option<&dyn PipelineDelegate>,
) -> bool {
    let forwarded = forward_all(buffer, normalizer, consumer);
    {
        let mut s = shared.lock();
        s.stats.frames_forwarded += forwarded;
        s.stats.drain_cycles += 1;
    }
    record_counters(shared, monitor, delegate);

    if let Some(reason) = monitor.fault() {
        let err = CaptureError::PeripheralFault(reason.to_string());
        log::error!("{}", err);
        if let Some(delegate) = delegate {
            delegate.on_error(&err);
        }
        publish_state(shared, delegate, PipelineState::Failed(err));
        return false;
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use crate::hardware::bus::PeripheralBus;
    use crate::hardware::channel_map::ConcreteChannel;
    use crate::models::capability::{CapabilityOffer, CapabilityRequest};
    use crate::models::error::ConfigError;
    use crate::models::frame::{BitDepth, OutputFrame};
    use crate::models::variant::HardwareVariant;
    use crate::session::engine::tests::ManualMic;

    #[derive(Default)]
    struct Collected {
        frames: Vec<OutputFrame>,
        formats: Vec<NegotiatedFormat>,
        stops: usize,
    }

    struct CollectingConsumer {
        out: Arc<Mutex<Collected>>,
        request: Option<CapabilityRequest>,
        policy: StopPolicy,
    }

    impl CollectingConsumer {
        fn boxed(out: &Arc<Mutex<Collected>>) -> Box<dyn FrameConsumer> {
            Box::new(Self {
                out: Arc::clone(out),
                request: None,
                policy: StopPolicy::Forward,
            })
        }
    }

    impl FrameConsumer for CollectingConsumer {
        fn capability_request(&mut self, _offer: &CapabilityOffer) -> Option<CapabilityRequest> {
            self.request.clone()
        }

        fn on_format(&mut self, format: &NegotiatedFormat) {
            self.out.lock().formats.push(*format);
        }

        fn accept_frame(&mut self, frame: OutputFrame) {
            self.out.lock().frames.push(frame);
        }

        fn stop_policy(&self) -> StopPolicy {
            self.policy
        }

        fn on_stop(&mut self) {
            self.out.lock().stops += 1;
        }
    }

    #[derive(Default)]
    struct RecordingDelegate {
        states: Mutex<Vec<String>>,
        errors: Mutex<Vec<CaptureError>>,
        overruns: Mutex<Vec<u64>>,
        reports: Mutex<Vec<CaptureReport>>,
    }

    impl PipelineDelegate for RecordingDelegate {
        fn on_state_changed(&self, state: &PipelineState) {
            self.states.lock().push(state.to_string());
        }

        fn on_overrun(&self, total: u64) {
            self.overruns.lock().push(total);
        }

        fn on_error(&self, error: &CaptureError) {
            self.errors.lock().push(error.clone());
        }

        fn on_stopped(&self, report: &CaptureReport) {
            self.reports.lock().push(report.clone());
        }
    }

    fn fast_settings() -> PipelineSettings {
        PipelineSettings {
            drain_interval: Duration::from_millis(2),
            ..Default::default()
        }
    }

    fn values(out: &Arc<Mutex<Collected>>) -> Vec<i32> {
        out.lock().frames.iter().map(|f| f.samples()[0]).collect()
    }

    fn wait_for(mut condition: impl FnMut() -> bool) -> bool {
        for _ in 0..500 {
            if condition() {
                return true;
            }
            thread::sleep(Duration::from_millis(2));
        }
        false
    }

    fn configured(
        mic: ManualMic,
        consumer: Box<dyn FrameConsumer>,
        settings: PipelineSettings,
    ) -> PipelineController<ManualMic> {
        let mut controller = PipelineController::with_settings(mic, consumer, settings);
        controller
            .setup(&HardwareVariant::Esp32, &MicrophoneConfig::internal(34))
            .unwrap();
        controller
    }

    #[test]
    fn setup_moves_to_configured() {
        let out = Arc::new(Mutex::new(Collected::default()));
        let controller = configured(ManualMic::new(), CollectingConsumer::boxed(&out), fast_settings());
        assert_eq!(controller.state(), PipelineState::Configured);
        assert_eq!(controller.config().map(|c| c.sample_rate), Some(16_000));
    }

    #[test]
    fn invalid_config_never_touches_peripheral() {
        let mic = ManualMic::new();
        let out = Arc::new(Mutex::new(Collected::default()));
        let mut controller = PipelineController::new(mic.clone(), CollectingConsumer::boxed(&out));
        let delegate = Arc::new(RecordingDelegate::default());
        controller.set_delegate(delegate.clone());

        let err = controller
            .setup(&HardwareVariant::Esp32S3, &MicrophoneConfig::internal(34))
            .unwrap_err();

        assert_eq!(
            err,
            CaptureError::Config(ConfigError::NoInternalAdc {
                variant: HardwareVariant::Esp32S3
            })
        );
        assert_eq!(controller.state(), PipelineState::Uninitialized);
        assert_eq!(delegate.errors.lock().len(), 1);
        assert_eq!(mic.opens.load(Ordering::SeqCst), 0);

        // Not configured, so start is refused.
        assert!(matches!(controller.start(), Err(CaptureError::InvalidState(_))));
    }

    #[test]
    fn start_forward_stop() {
        let mic = ManualMic::new();
        let out = Arc::new(Mutex::new(Collected::default()));
        let mut controller = configured(mic.clone(), CollectingConsumer::boxed(&out), fast_settings());
        let delegate = Arc::new(RecordingDelegate::default());
        controller.set_delegate(delegate.clone());

        controller.start().unwrap();
        assert_eq!(controller.state(), PipelineState::Running);
        assert_eq!(
            controller.format(),
            Some(NegotiatedFormat {
                channels: 1,
                bit_depth: BitDepth::Bits32,
                sample_rate: 16_000,
            })
        );

        for value in [10, 20, 30] {
            assert!(mic.fire(value));
        }
        assert!(wait_for(|| controller.stats().frames_forwarded == 3));
        mic.fire(40);

        let report = controller.stop().unwrap();
        assert_eq!(controller.state(), PipelineState::Stopped);
        assert_eq!(values(&out), vec![10, 20, 30, 40]);
        assert_eq!(out.lock().stops, 1);
        assert_eq!(out.lock().formats.len(), 1);

        assert_eq!(report.stats.frames_captured, 4);
        assert_eq!(report.stats.frames_forwarded, 4);
        assert_eq!(report.stats.overruns, 0);
        assert!(report.stats.drain_cycles > 0);
        assert_eq!(delegate.reports.lock().len(), 1);
        assert_eq!(
            *delegate.states.lock(),
            vec!["running".to_string(), "stopped".to_string()]
        );
        assert!(!mic.is_open());
    }

    #[test]
    fn discard_policy_drops_leftovers() {
        let mic = ManualMic::new();
        let out = Arc::new(Mutex::new(Collected::default()));
        let consumer = Box::new(CollectingConsumer {
            out: Arc::clone(&out),
            request: None,
            policy: StopPolicy::Discard,
        });
        let settings = PipelineSettings {
            drain_interval: Duration::from_millis(200),
            ..Default::default()
        };
        let mut controller = configured(mic.clone(), consumer, settings);

        controller.start().unwrap();
        for value in 0..5 {
            mic.fire(value);
        }
        let report = controller.stop().unwrap();

        let received = out.lock().frames.len() as u64;
        assert_eq!(report.stats.frames_forwarded, received);
        assert_eq!(report.stats.frames_forwarded + report.stats.frames_discarded, 5);
        assert_eq!(out.lock().stops, 1);
    }

    #[test]
    fn restart_only_delivers_new_frames() {
        let mic = ManualMic::new();
        let out = Arc::new(Mutex::new(Collected::default()));
        let mut controller = configured(mic.clone(), CollectingConsumer::boxed(&out), fast_settings());

        controller.start().unwrap();
        mic.fire(1);
        let first = controller.stop().unwrap();
        assert_eq!(first.stats.frames_forwarded, 1);

        controller.start().unwrap();
        mic.fire(2);
        let second = controller.stop().unwrap();

        assert_eq!(second.stats.frames_forwarded, 1);
        assert_eq!(values(&out), vec![1, 2]);
        assert_ne!(first.id, second.id);
        assert_eq!(out.lock().formats.len(), 2);
    }

    #[test]
    fn overruns_are_counted_and_reported() {
        let mic = ManualMic::new();
        let out = Arc::new(Mutex::new(Collected::default()));
        // 4 Hz over a 500 ms window: room for two frames.
        let settings = PipelineSettings {
            drain_interval: Duration::from_millis(500),
            scheduling_jitter: Duration::ZERO,
            dma_block_frames: 0,
        };
        let mut controller =
            PipelineController::with_settings(mic.clone(), CollectingConsumer::boxed(&out), settings);
        let delegate = Arc::new(RecordingDelegate::default());
        controller.set_delegate(delegate.clone());
        let config = MicrophoneConfig {
            sample_rate: 4,
            ..MicrophoneConfig::internal(34)
        };
        controller.setup(&HardwareVariant::Esp32, &config).unwrap();

        controller.start().unwrap();
        for value in 0..5 {
            mic.fire(value);
        }
        let report = controller.stop().unwrap();

        // The first drain pass is 500 ms away, so frames 2..5 find the ring full.
        assert_eq!(report.stats.frames_captured, 2);
        assert_eq!(report.stats.overruns, 3);
        assert_eq!(report.stats.frames_forwarded, 2);
        assert_eq!(values(&out), vec![0, 1]);
        assert_eq!(delegate.overruns.lock().last(), Some(&3));
        // Overruns are counters, never errors.
        assert!(delegate.errors.lock().is_empty());
        assert_eq!(controller.state(), PipelineState::Stopped);
    }

    #[test]
    fn capability_mismatch_keeps_state() {
        let mic = ManualMic::new();
        let out = Arc::new(Mutex::new(Collected::default()));
        let consumer = Box::new(CollectingConsumer {
            out: Arc::clone(&out),
            request: Some(CapabilityRequest::channels(2)),
            policy: StopPolicy::Forward,
        });
        let mut controller = configured(mic.clone(), consumer, fast_settings());

        let err = controller.start().unwrap_err();
        assert!(matches!(
            err,
            CaptureError::Config(ConfigError::CapabilityMismatch(_))
        ));
        assert_eq!(controller.state(), PipelineState::Configured);
        assert_eq!(mic.opens.load(Ordering::SeqCst), 0);
        assert!(out.lock().formats.is_empty());
    }

    #[test]
    fn narrower_request_changes_output_depth() {
        let mic = ManualMic::new();
        let out = Arc::new(Mutex::new(Collected::default()));
        let consumer = Box::new(CollectingConsumer {
            out: Arc::clone(&out),
            request: Some(CapabilityRequest::channels(1).with_bit_depth(BitDepth::Bits16)),
            policy: StopPolicy::Forward,
        });
        let mut controller = configured(mic.clone(), consumer, fast_settings());

        controller.start().unwrap();
        mic.fire(0x0001_0000);
        controller.stop().unwrap();

        let frames = &out.lock().frames;
        assert_eq!(frames[0].bit_depth(), BitDepth::Bits16);
        assert_eq!(frames[0].samples(), &[1]);
    }

    #[test]
    fn busy_peripheral_fails_second_pipeline() {
        let bus = PeripheralBus::new("I2S0");
        let out = Arc::new(Mutex::new(Collected::default()));
        let mut first = configured(
            ManualMic::on_bus(Arc::clone(&bus)),
            CollectingConsumer::boxed(&out),
            fast_settings(),
        );
        let mut second = configured(
            ManualMic::on_bus(Arc::clone(&bus)),
            CollectingConsumer::boxed(&out),
            fast_settings(),
        );

        first.start().unwrap();
        assert_eq!(second.start(), Err(CaptureError::PeripheralBusy));
        assert_eq!(second.state(), PipelineState::Failed(CaptureError::PeripheralBusy));
        assert!(bus.is_claimed());
        assert!(first.state().is_running());
        // Only the running pipeline announced a format.
        assert_eq!(out.lock().formats.len(), 1);

        first.stop().unwrap();
        assert!(!bus.is_claimed());
        // Failed pipelines can be started again once the unit is free.
        second.start().unwrap();
        second.stop().unwrap();
    }

    #[test]
    fn init_error_fails_and_releases() {
        let mic = ManualMic::rejecting("unsupported clock");
        let out = Arc::new(Mutex::new(Collected::default()));
        let mut controller = configured(mic.clone(), CollectingConsumer::boxed(&out), fast_settings());

        let err = controller.start().unwrap_err();
        assert_eq!(err, CaptureError::PeripheralInitError("unsupported clock".into()));
        assert!(controller.state().is_failed());
        assert!(!mic.bus().is_claimed());
        // The consumer never saw a format for a run that did not start.
        assert!(out.lock().formats.is_empty());
        assert_eq!(out.lock().stops, 0);
        assert!(matches!(controller.stop(), Err(CaptureError::InvalidState(_))));
    }

    #[test]
    fn peripheral_fault_fails_running_pipeline() {
        let mic = ManualMic::new();
        let out = Arc::new(Mutex::new(Collected::default()));
        let mut controller = configured(mic.clone(), CollectingConsumer::boxed(&out), fast_settings());
        let delegate = Arc::new(RecordingDelegate::default());
        controller.set_delegate(delegate.clone());

        controller.start().unwrap();
        mic.fault("I2S DMA timeout");
        assert!(wait_for(|| controller.state().is_failed()));
        assert_eq!(
            controller.state(),
            PipelineState::Failed(CaptureError::PeripheralFault("I2S DMA timeout".into()))
        );
        assert_eq!(delegate.errors.lock().len(), 1);

        controller.stop().unwrap();
        assert_eq!(controller.state(), PipelineState::Stopped);
        assert!(!mic.bus().is_claimed());
    }

    #[test]
    fn setup_after_peripheral_fault_reconfigures() {
        let mic = ManualMic::new();
        let out = Arc::new(Mutex::new(Collected::default()));
        let mut controller = configured(mic.clone(), CollectingConsumer::boxed(&out), fast_settings());

        controller.start().unwrap();
        mic.fault("I2S DMA timeout");
        assert!(wait_for(|| controller.state().is_failed()));

        controller
            .setup(&HardwareVariant::Esp32, &MicrophoneConfig::internal(35))
            .unwrap();
        assert_eq!(controller.state(), PipelineState::Configured);
        assert_eq!(
            controller.config().map(|c| c.channel),
            Some(ConcreteChannel::Adc1(7))
        );
        assert!(!mic.is_open());
        assert!(!mic.bus().is_claimed());
        assert_eq!(out.lock().stops, 1);

        controller.start().unwrap();
        mic.fire(9);
        controller.stop().unwrap();
        assert_eq!(values(&out).last(), Some(&9));
    }

    #[test]
    fn start_while_running_is_rejected() {
        let out = Arc::new(Mutex::new(Collected::default()));
        let mut controller = configured(ManualMic::new(), CollectingConsumer::boxed(&out), fast_settings());
        controller.start().unwrap();
        assert!(matches!(controller.start(), Err(CaptureError::InvalidState(_))));
        assert!(matches!(
            controller.setup(&HardwareVariant::Esp32, &MicrophoneConfig::internal(34)),
            Err(CaptureError::InvalidState(_))
        ));
        controller.stop().unwrap();
    }

    #[test]
    fn drop_stops_running_pipeline() {
        let mic = ManualMic::new();
        let out = Arc::new(Mutex::new(Collected::default()));
        {
            let mut controller = configured(mic.clone(), CollectingConsumer::boxed(&out), fast_settings());
            controller.start().unwrap();
            mic.fire(5);
        }
        assert!(!mic.is_open());
        assert!(!mic.bus().is_claimed());
        assert_eq!(values(&out), vec![5]);
    }
}
