use super::{AudioBuffer, AudioError};
use crate::config::AudioConfig;
use crate::foundation::ring_buffer::{InsertMode, RingBuffer};
use parking_lot::Mutex;
use std::sync::Arc;

struct MixerShared {
    // Submitters insert under the ring's own lock; the callback is the only reader.
    pending: RingBuffer<Arc<AudioBuffer>>,
    // The callback is the only writer; submitters read under `reclaim_lock`.
    finished: RingBuffer<Arc<AudioBuffer>>,
    reclaim_lock: Mutex<()>,
}

/// Submission side of the mixer, cheap to clone across threads
#[derive(Clone)]
pub struct AudioMixer {
    shared: Arc<MixerShared>,
}

impl AudioMixer {
    /// Create the mixer and the callback that plays what it submits
    pub fn new(config: &AudioConfig) -> (Self, MixerCallback) {
        let max_voices = config.max_voices.max(1);
        let shared = Arc::new(MixerShared {
            pending: RingBuffer::new(config.queue_capacity, InsertMode::Locked),
            // Everything submitted since the last reclaim plus everything playing.
            finished: RingBuffer::new(config.queue_capacity + max_voices, InsertMode::SingleProducer),
            reclaim_lock: Mutex::new(()),
        });

        let callback = MixerCallback {
            shared: Arc::clone(&shared),
            voices: (0..max_voices)
                .map(|i| Slot {
                    voice: None,
                    next: (i + 1 < max_voices).then_some(i + 1),
                })
                .collect(),
            head: None,
            free: Some(0),
        };

        (Self { shared }, callback)
    }

    /// Queue a buffer for playback from its start
    ///
    /// A buffer still marked discarded finishes without being played; call
    /// [`AudioBuffer::clear_discard`] first to play it again. Also releases the mixer's references to buffers that finished since
    /// the last call.
    pub fn submit(&self, buffer: Arc<AudioBuffer>) -> Result<(), AudioError> {
        buffer.prepare_submit();
        let result = self.shared.pending.insert(buffer).map_err(|rejected| {
            rejected.mark_finished();
            AudioError::QueueFull {
                capacity: self.shared.pending.capacity(),
            }
        });
        self.reclaim();
        result
    }

    /// Drop the mixer's references to finished buffers, returning how many
    pub fn reclaim(&self) -> usize {
        let _lock = self.shared.reclaim_lock.lock();
        self.shared.finished.drain().count()
    }

    /// Buffers submitted but not yet admitted by the callback
    pub fn pending(&self) -> usize {
        self.shared.pending.len()
    }
}

struct Voice {
    buffer: Arc<AudioBuffer>,
    position: usize,
}

struct Slot {
    voice: Option<Voice>,
    next: Option<usize>,
}

/// Real-time side of the mixer
///
/// [`render`](Self::render) fills one interleaved stereo block. It is meant
/// to be called from the audio thread only and never blocks or allocates.
pub struct MixerCallback {
    shared: Arc<MixerShared>,
    voices: Box<[Slot]>,
    head: Option<usize>,
    free: Option<usize>,
}

impl MixerCallback {
    /// Number of buffers currently in the active list
    pub fn active_voices(&self) -> usize {
        std::iter::successors(self.head, |&index| self.voices[index].next).count()
    }

    /// Mix every active buffer into `out`
    pub fn render(&mut self, out: &mut [f32]) {
        self.admit_pending();
        out.fill(0.0);

        let mut previous: Option<usize> = None;
        let mut cursor = self.head;

        while let Some(index) = cursor {
            let next = self.voices[index].next;
            if self.mix_voice(index, out) {
                self.unlink(index, previous, next);
            } else {
                previous = Some(index);
            }
            cursor = next;
        }
    }

    /// Move submitted buffers to the head of the active list while slots last
    fn admit_pending(&mut self) {
        while let Some(index) = self.free {
            let Some(buffer) = self.shared.pending.get() else {
                break;
            };
            let slot = &mut self.voices[index];
            self.free = slot.next;
            slot.voice = Some(Voice { buffer, position: 0 });
            slot.next = self.head;
            self.head = Some(index);
        }
    }

    /// Mix one voice into `out`; true when it is done and should leave the list
    fn mix_voice(&mut self, index: usize, out: &mut [f32]) -> bool {
        let Some(voice) = self.voices[index].voice.as_mut() else {
            return true;
        };
        let buffer = &voice.buffer;

        if buffer.is_discarded() {
            return true;
        }
        if !buffer.is_active() {
            return false;
        }

        let samples = &buffer.samples()[voice.position..];
        let count = samples.len().min(out.len());
        let multiplier = buffer.multiplier();
        for (output, sample) in out[..count].iter_mut().zip(&samples[..count]) {
            *output += sample * multiplier;
        }
        voice.position += count;

        voice.position >= buffer.len()
    }

    fn unlink(&mut self, index: usize, previous: Option<usize>, next: Option<usize>) {
        match previous {
            Some(previous) => self.voices[previous].next = next,
            None => self.head = next,
        }

        let slot = &mut self.voices[index];
        slot.next = self.free;
        self.free = Some(index);

        if let Some(voice) = slot.voice.take() {
            voice.buffer.mark_finished();
            // Sized to hold every buffer that can be in flight, so this only
            // fails if that bound is broken; dropping here is then the fallback.
            let _ = self.shared.finished.insert(voice.buffer);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    const BLOCK: usize = 8;

    fn mixer(max_voices: usize) -> (AudioMixer, MixerCallback) {
        AudioMixer::new(&AudioConfig {
            max_voices,
            queue_capacity: 16,
            ..AudioConfig::default()
        })
    }

    #[test]
    fn test_invocations_until_finished() {
        let (mixer, mut callback) = mixer(4);
        let buffer = Arc::new(AudioBuffer::from_samples(vec![1.0; 20]));
        mixer.submit(Arc::clone(&buffer)).unwrap();

        let mut out = [0.0; BLOCK];
        let mut invocations = 0;
        while !buffer.is_finished() {
            callback.render(&mut out);
            invocations += 1;
            assert!(invocations <= 10, "buffer never finished");
        }

        assert_eq!(invocations, 20usize.div_ceil(BLOCK));
        assert_eq!(out[..4], [1.0; 4]);
        assert_eq!(out[4..], [0.0; 4]);
        assert_eq!(callback.active_voices(), 0);
    }

    #[test]
    fn test_exact_multiple_finishes_on_last_block() {
        let (mixer, mut callback) = mixer(4);
        let buffer = Arc::new(AudioBuffer::from_samples(vec![0.5; 2 * BLOCK]));
        mixer.submit(Arc::clone(&buffer)).unwrap();

        let mut out = [0.0; BLOCK];
        callback.render(&mut out);
        assert!(!buffer.is_finished());
        callback.render(&mut out);
        assert!(buffer.is_finished());
    }

    #[test]
    fn test_mixing_scales_and_sums() {
        let (mixer, mut callback) = mixer(4);
        let first = Arc::new(AudioBuffer::from_samples(vec![1.0; BLOCK]).with_multiplier(0.5));
        let second = Arc::new(AudioBuffer::from_samples((0..4).map(|i| i as f32).collect()).with_multiplier(2.0));
        mixer.submit(first).unwrap();
        mixer.submit(second).unwrap();

        let mut out = [9.0; BLOCK];
        callback.render(&mut out);

        let expected = [0.5, 2.5, 4.5, 6.5, 0.5, 0.5, 0.5, 0.5];
        for (actual, expected) in out.iter().zip(expected) {
            assert_relative_eq!(*actual, expected);
        }
    }

    #[test]
    fn test_discard_finishes_without_mixing() {
        let (mixer, mut callback) = mixer(4);
        let buffer = Arc::new(AudioBuffer::from_samples(vec![1.0; 4 * BLOCK]));
        mixer.submit(Arc::clone(&buffer)).unwrap();

        let mut out = [0.0; BLOCK];
        callback.render(&mut out);
        assert_eq!(out, [1.0; BLOCK]);

        buffer.discard();
        callback.render(&mut out);
        assert_eq!(out, [0.0; BLOCK]);
        assert!(buffer.is_finished());
        assert_eq!(callback.active_voices(), 0);
    }

    #[test]
    fn test_buffer_discarded_before_submit_is_never_mixed() {
        let (mixer, mut callback) = mixer(4);
        let buffer = Arc::new(AudioBuffer::from_samples(vec![1.0; BLOCK]));
        buffer.discard();
        mixer.submit(Arc::clone(&buffer)).unwrap();

        let mut out = [0.0; BLOCK];
        callback.render(&mut out);
        assert_eq!(out, [0.0; BLOCK]);
        assert!(buffer.is_finished());

        buffer.clear_discard();
        mixer.submit(Arc::clone(&buffer)).unwrap();
        callback.render(&mut out);
        assert_eq!(out, [1.0; BLOCK]);
    }

    #[test]
    fn test_inactive_buffer_keeps_its_place() {
        let (mixer, mut callback) = mixer(4);
        let buffer = Arc::new(AudioBuffer::from_samples((0..2 * BLOCK).map(|i| i as f32).collect()));
        buffer.set_active(false);
        mixer.submit(Arc::clone(&buffer)).unwrap();

        let mut out = [0.0; BLOCK];
        callback.render(&mut out);
        assert_eq!(out, [0.0; BLOCK]);
        assert_eq!(callback.active_voices(), 1);

        buffer.set_active(true);
        callback.render(&mut out);
        assert_relative_eq!(out[0], 0.0);
        assert_relative_eq!(out[7], 7.0);
        callback.render(&mut out);
        assert_relative_eq!(out[0], 8.0);
        assert!(buffer.is_finished());
    }

    #[test]
    fn test_admission_is_lifo() {
        let (mixer, mut callback) = mixer(4);
        let long = Arc::new(AudioBuffer::from_samples(vec![1.0; 10 * BLOCK]));
        let first = Arc::new(AudioBuffer::from_samples(vec![1.0; 10 * BLOCK]));
        let second = Arc::new(AudioBuffer::from_samples(vec![1.0; 10 * BLOCK]));
        for buffer in [&long, &first, &second] {
            mixer.submit(Arc::clone(buffer)).unwrap();
        }

        let mut out = [0.0; BLOCK];
        callback.render(&mut out);

        let order: Vec<_> = std::iter::successors(callback.head, |&i| callback.voices[i].next)
            .filter_map(|i| callback.voices[i].voice.as_ref().map(|voice| Arc::as_ptr(&voice.buffer)))
            .collect();
        assert_eq!(order, vec![Arc::as_ptr(&second), Arc::as_ptr(&first), Arc::as_ptr(&long)]);
    }

    #[test]
    fn test_voices_beyond_slab_wait_in_queue() {
        let (mixer, mut callback) = mixer(1);
        let first = Arc::new(AudioBuffer::from_samples(vec![1.0; BLOCK]));
        let second = Arc::new(AudioBuffer::from_samples(vec![2.0; BLOCK]));
        mixer.submit(Arc::clone(&first)).unwrap();
        mixer.submit(Arc::clone(&second)).unwrap();

        let mut out = [0.0; BLOCK];
        callback.render(&mut out);
        assert_eq!(out, [1.0; BLOCK]);
        assert!(first.is_finished());
        assert_eq!(mixer.pending(), 1);

        callback.render(&mut out);
        assert_eq!(out, [2.0; BLOCK]);
        assert!(second.is_finished());
    }

    #[test]
    fn test_submit_reclaims_finished_buffers() {
        let (mixer, mut callback) = mixer(4);
        let buffer = Arc::new(AudioBuffer::from_samples(vec![1.0; BLOCK]));
        mixer.submit(Arc::clone(&buffer)).unwrap();

        let mut out = [0.0; BLOCK];
        callback.render(&mut out);
        assert!(buffer.is_finished());
        assert_eq!(Arc::strong_count(&buffer), 2);

        let other = Arc::new(AudioBuffer::from_samples(vec![1.0; BLOCK]));
        mixer.submit(other).unwrap();
        assert_eq!(Arc::strong_count(&buffer), 1);
    }

    #[test]
    fn test_resubmit_plays_again() {
        let (mixer, mut callback) = mixer(4);
        let buffer = Arc::new(AudioBuffer::from_samples(vec![1.0; BLOCK]));
        let mut out = [0.0; BLOCK];

        for _ in 0..3 {
            mixer.submit(Arc::clone(&buffer)).unwrap();
            assert!(!buffer.is_finished());
            callback.render(&mut out);
            assert!(buffer.is_finished());
            assert_eq!(out, [1.0; BLOCK]);
        }
    }

    #[test]
    fn test_queue_full_is_reported() {
        let (mixer, _callback) = AudioMixer::new(&AudioConfig {
            max_voices: 1,
            queue_capacity: 1,
            ..AudioConfig::default()
        });
        mixer.submit(Arc::new(AudioBuffer::from_samples(vec![0.0; 2]))).unwrap();

        let rejected = Arc::new(AudioBuffer::from_samples(vec![0.0; 2]));
        let err = mixer.submit(Arc::clone(&rejected)).unwrap_err();
        assert!(matches!(err, AudioError::QueueFull { capacity: 1 }));
        assert!(rejected.is_finished());
    }
}
