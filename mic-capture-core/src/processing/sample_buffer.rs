//! Lock-free single-producer/single-consumer frame buffer between the
//! acquisition context (ISR, DMA completion, driver thread) and the pipeline loop.
//!
//! The producer half never blocks: when the ring is full the incoming frame
//! is dropped and counted as an overrun. Already-queued frames are never
//! overwritten, so the consumer sees frames in production order with gaps
//! only where overruns happened.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};

use ringbuf::traits::{Consumer, Observer, Producer, Split};
use ringbuf::{HeapCons, HeapProd, HeapRb};

use crate::models::error::CaptureError;
use crate::models::frame::RawFrame;

/// State shared by both halves and the engine's monitor.
#[derive(Debug, Default)]
struct Shared {
    captured: AtomicU64,
    overruns: AtomicU64,
    closed: AtomicBool,
    fault: OnceLock<String>,
}

/// Producer half, moved into the peripheral's acquisition context.
pub struct FrameSink {
    producer: HeapProd<RawFrame>,
    shared: Arc<Shared>,
}

impl FrameSink {
    /// Enqueue one frame. Returns `false` if it was dropped.
    ///
    /// Frames pushed after the buffer was closed are ignored. They count
    /// neither as captured nor as overruns.
    pub fn push(&mut self, frame: RawFrame) -> bool {
        if self.shared.closed.load(Ordering::Acquire) {
            return false;
        }
        match self.producer.try_push(frame) {
            Ok(()) => {
                self.shared.captured.fetch_add(1, Ordering::Relaxed);
                true
            }
            Err(_) => {
                self.shared.overruns.fetch_add(1, Ordering::Relaxed);
                false
            }
        }
    }

    /// Enqueue a completed DMA block. Returns how many frames were accepted;
    /// the tail that did not fit is counted as overruns.
    pub fn push_block(&mut self, frames: &[RawFrame]) -> usize {
        if frames.is_empty() || self.shared.closed.load(Ordering::Acquire) {
            return 0;
        }
        let accepted = self.producer.push_slice(frames);
        let dropped = frames.len() - accepted;
        self.shared
            .captured
            .fetch_add(accepted as u64, Ordering::Relaxed);
        if dropped > 0 {
            self.shared
                .overruns
                .fetch_add(dropped as u64, Ordering::Relaxed);
        }
        accepted
    }

    /// Whether the consumer side still wants frames.
    pub fn is_open(&self) -> bool {
        !self.shared.closed.load(Ordering::Acquire)
    }

    /// Flag an unrecoverable peripheral error. Only the first report is kept.
    pub fn report_fault(&self, reason: impl Into<String>) {
        let _ = self.shared.fault.set(reason.into());
    }
}

/// Consumer half, drained by the pipeline loop.
pub struct SampleBuffer {
    consumer: HeapCons<RawFrame>,
    shared: Arc<Shared>,
}

impl std::fmt::Debug for SampleBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SampleBuffer")
            .field("shared", &self.shared)
            .finish_non_exhaustive()
    }
}

impl SampleBuffer {
    /// Dequeue the oldest frame.
    pub fn pop(&mut self) -> Option<RawFrame> {
        self.consumer.try_pop()
    }

    /// Move up to `max` frames into `out`, oldest first. Returns the count moved.
    pub fn drain_into(&mut self, out: &mut Vec<RawFrame>, max: usize) -> usize {
        let mut moved = 0;
        while moved < max {
            match self.consumer.try_pop() {
                Some(frame) => {
                    out.push(frame);
                    moved += 1;
                }
                None => break,
            }
        }
        moved
    }

    /// Frames currently queued.
    pub fn len(&self) -> usize {
        self.consumer.occupied_len()
    }

    pub fn is_empty(&self) -> bool {
        self.consumer.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.consumer.capacity().get()
    }

    /// Handle for observing counters and closing the buffer from outside the loop.
    pub fn monitor(&self) -> BufferMonitor {
        BufferMonitor {
            shared: Arc::clone(&self.shared),
        }
    }
}

/// Cheap, cloneable view of the buffer counters.
#[derive(Debug, Clone)]
pub struct BufferMonitor {
    shared: Arc<Shared>,
}

impl BufferMonitor {
    pub fn frames_captured(&self) -> u64 {
        self.shared.captured.load(Ordering::Relaxed)
    }

    pub fn overruns(&self) -> u64 {
        self.shared.overruns.load(Ordering::Relaxed)
    }

    /// Refuse any further frames from the producer half.
    pub fn close(&self) {
        self.shared.closed.store(true, Ordering::Release);
    }

    pub fn is_closed(&self) -> bool {
        self.shared.closed.load(Ordering::Acquire)
    }

    pub fn fault(&self) -> Option<&str> {
        self.shared.fault.get().map(String::as_str)
    }
}

/// Create a buffer holding `capacity` frames (at least one).
///
/// Fails with `PeripheralInitError` when the ring cannot be allocated.
pub fn sample_buffer(capacity: usize) -> Result<(FrameSink, SampleBuffer), CaptureError> {
    let capacity = capacity.max(1);
    let ring = HeapRb::<RawFrame>::try_new(capacity).map_err(|e| {
        CaptureError::PeripheralInitError(format!(
            "cannot allocate a {} frame sample buffer: {}",
            capacity, e
        ))
    })?;
    let (producer, consumer) = ring.split();
    let shared = Arc::new(Shared::default());

    Ok((
        FrameSink {
            producer,
            shared: Arc::clone(&shared),
        },
        SampleBuffer { consumer, shared },
    ))
}
