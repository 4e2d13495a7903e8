//! Audio handoff from the core to the host

use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

/// Interleaved stereo samples produced during one `run()`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AudioChunk {
    /// L, R, L, R, ...
    pub samples: Vec<i16>,
    pub sample_rate: f64,
}

impl AudioChunk {
    /// Number of stereo frames
    pub fn frames(&self) -> usize {
        self.samples.len() / 2
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// Receives the audio of each frame
pub trait AudioSink: Send {
    fn configure(&mut self, _sample_rate: f64) {}

    /// Must not block the frame loop
    fn push(&mut self, samples: &[i16]);
}

/// Bounded FIFO between the frame loop and a playback thread.
///
/// On overflow the oldest samples are discarded; the producer never waits.
/// Samples enter and leave in whole stereo frames, so the head of the queue
/// is always a left-channel sample.
#[derive(Debug)]
pub struct AudioQueue {
    buffer: Mutex<VecDeque<i16>>,
    capacity: usize,
    muted: AtomicBool,
    volume: Mutex<f32>,
    dropped: AtomicU64,
}

impl AudioQueue {
    /// Queue holding at most `capacity` samples (not frames), rounded down
    /// to whole stereo frames
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(2) & !1;
        Self {
            buffer: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
            muted: AtomicBool::new(false),
            volume: Mutex::new(1.0),
            dropped: AtomicU64::new(0),
        }
    }

    /// Queue sized for `duration_ms` of stereo audio
    pub fn with_duration(sample_rate: f64, duration_ms: u32) -> Self {
        let frames = (sample_rate * f64::from(duration_ms) / 1000.0).ceil() as usize;
        Self::new(frames * 2)
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.buffer.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.lock().is_empty()
    }

    pub fn set_muted(&self, muted: bool) {
        self.muted.store(muted, Ordering::Relaxed);
    }

    pub fn is_muted(&self) -> bool {
        self.muted.load(Ordering::Relaxed)
    }

    pub fn set_volume(&self, volume: f32) {
        *self.volume.lock() = volume.clamp(0.0, 1.0);
    }

    /// Samples discarded because the consumer fell behind
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Append samples, evicting the oldest on overflow
    pub fn push_samples(&self, samples: &[i16]) {
        if self.is_muted() {
            return;
        }
        let volume = *self.volume.lock();

        // An unpaired trailing sample has no partner channel
        if samples.len() % 2 != 0 {
            tracing::trace!("Ignoring unpaired audio sample");
            self.dropped.fetch_add(1, Ordering::Relaxed);
        }
        let samples = &samples[..samples.len() & !1];

        // Only the newest `capacity` samples can survive
        let samples = if samples.len() > self.capacity {
            let skip = samples.len() - self.capacity;
            self.dropped.fetch_add(skip as u64, Ordering::Relaxed);
            &samples[skip..]
        } else {
            samples
        };

        let mut buffer = self.buffer.lock();
        let overflow = (buffer.len() + samples.len()).saturating_sub(self.capacity);
        if overflow > 0 {
            buffer.drain(..overflow);
            self.dropped.fetch_add(overflow as u64, Ordering::Relaxed);
        }
        if volume >= 1.0 {
            buffer.extend(samples.iter().copied());
        } else {
            buffer.extend(samples.iter().map(|&s| (f32::from(s) * volume) as i16));
        }
    }

    /// Fill `out` from the queue, padding with silence. Returns samples read,
    /// always a whole number of stereo frames.
    pub fn pop_into(&self, out: &mut [i16]) -> usize {
        let mut buffer = self.buffer.lock();
        let n = out.len().min(buffer.len()) & !1;
        for (dst, src) in out.iter_mut().zip(buffer.drain(..n)) {
            *dst = src;
        }
        out[n..].fill(0);
        n
    }

    pub fn clear(&self) {
        self.buffer.lock().clear();
    }
}

impl AudioSink for Arc<AudioQueue> {
    fn push(&mut self, samples: &[i16]) {
        self.push_samples(samples);
    }
}
