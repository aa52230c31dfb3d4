use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

/// Interleaved stereo samples plus the flags the mixer and caller share
///
/// The caller keeps an `Arc` to the buffer and may reuse it once
/// [`is_finished`](Self::is_finished) returns true.
#[derive(Debug)]
pub struct AudioBuffer {
    samples: Vec<f32>,
    multiplier: AtomicU32,
    active: AtomicBool,
    discard: AtomicBool,
    finished: AtomicBool,
}

impl AudioBuffer {
    /// Active buffer with unit gain
    pub fn from_samples(samples: Vec<f32>) -> Self {
        Self {
            samples,
            multiplier: AtomicU32::new(1.0f32.to_bits()),
            active: AtomicBool::new(true),
            discard: AtomicBool::new(false),
            finished: AtomicBool::new(false),
        }
    }

    /// Interleaved sample data
    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    /// Number of samples (two per stereo frame)
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// True when there is nothing to play
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Gain applied while mixing
    pub fn multiplier(&self) -> f32 {
        f32::from_bits(self.multiplier.load(Ordering::Acquire))
    }

    /// Change the gain; takes effect from the next callback block
    pub fn set_multiplier(&self, multiplier: f32) {
        self.multiplier.store(multiplier.to_bits(), Ordering::Release);
    }

    /// Builder form of [`set_multiplier`](Self::set_multiplier)
    pub fn with_multiplier(self, multiplier: f32) -> Self {
        self.set_multiplier(multiplier);
        self
    }

    /// Whether the mixer plays this buffer
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    /// Pause or resume; a paused buffer keeps its place and its read position
    pub fn set_active(&self, active: bool) {
        self.active.store(active, Ordering::Release);
    }

    /// Ask the mixer to drop the buffer without playing the rest of it
    pub fn discard(&self) {
        self.discard.store(true, Ordering::Release);
    }

    /// Withdraw a discard request so the buffer can be submitted again
    pub fn clear_discard(&self) {
        self.discard.store(false, Ordering::Release);
    }

    /// True once discard has been requested
    pub fn is_discarded(&self) -> bool {
        self.discard.load(Ordering::Acquire)
    }

    /// True once the mixer has let go of the buffer
    pub fn is_finished(&self) -> bool {
        self.finished.load(Ordering::Acquire)
    }

    pub(crate) fn prepare_submit(&self) {
        self.finished.store(false, Ordering::Release);
    }

    pub(crate) fn mark_finished(&self) {
        self.finished.store(true, Ordering::Release);
    }
}
