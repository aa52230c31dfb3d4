//! Fixed-capacity ring buffer for cross-thread message passing
//!
//! One consumer drains the buffer; producers either share an insert lock
//! ([`InsertMode::Locked`]) or there is exactly one of them
//! ([`InsertMode::SingleProducer`]), in which case inserting never blocks and
//! is safe to call from a real-time thread. Storage is a crossbeam
//! [`ArrayQueue`].
//!
//! Capacity is fixed at construction. Inserting into a full buffer is an
//! explicit error that hands the rejected item back; nothing is overwritten.

use crossbeam::queue::ArrayQueue;
use parking_lot::Mutex;

/// How producers are serialized
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertMode {
    /// Producers take a mutex around each insert
    Locked,
    /// Exactly one producer thread; inserts are lock-free
    SingleProducer,
}

/// Fixed-capacity FIFO queue shared between producer threads and one consumer
pub struct RingBuffer<T> {
    // `ArrayQueue` cannot be empty-sized; `None` is a zero-capacity buffer.
    queue: Option<ArrayQueue<T>>,
    insert_lock: Option<Mutex<()>>,
}

impl<T> RingBuffer<T> {
    /// Create a ring buffer that holds up to `capacity` items
    pub fn new(capacity: usize, mode: InsertMode) -> Self {
        Self {
            queue: (capacity > 0).then(|| ArrayQueue::new(capacity)),
            insert_lock: match mode {
                InsertMode::Locked => Some(Mutex::new(())),
                InsertMode::SingleProducer => None,
            },
        }
    }

    /// Maximum number of items the buffer holds
    pub fn capacity(&self) -> usize {
        self.queue.as_ref().map_or(0, ArrayQueue::capacity)
    }

    /// Producer serialization mode
    pub fn mode(&self) -> InsertMode {
        if self.insert_lock.is_some() {
            InsertMode::Locked
        } else {
            InsertMode::SingleProducer
        }
    }

    /// True when every inserted item has been consumed
    pub fn is_empty(&self) -> bool {
        self.queue.as_ref().map_or(true, ArrayQueue::is_empty)
    }

    /// Number of items currently queued (a snapshot under concurrent use)
    pub fn len(&self) -> usize {
        self.queue.as_ref().map_or(0, ArrayQueue::len)
    }

    /// Append an item, handing it back if the buffer is full
    pub fn insert(&self, item: T) -> Result<(), T> {
        let Some(queue) = &self.queue else {
            return Err(item);
        };

        let _lock = self.insert_lock.as_ref().map(Mutex::lock);
        queue.push(item)
    }

    /// Remove the oldest item
    pub fn get(&self) -> Option<T> {
        self.queue.as_ref()?.pop()
    }

    /// Consume items until the buffer is observed empty
    pub fn drain(&self) -> impl Iterator<Item = T> + '_ {
        std::iter::from_fn(move || self.get())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_fifo_up_to_capacity() {
        let ring = RingBuffer::new(4, InsertMode::Locked);
        assert!(ring.is_empty());

        for i in 0..4 {
            ring.insert(i).unwrap();
        }
        assert!(!ring.is_empty());
        assert_eq!(ring.len(), 4);

        let items: Vec<_> = (0..4).map(|_| ring.get().unwrap()).collect();
        assert_eq!(items, vec![0, 1, 2, 3]);
        assert!(ring.is_empty());
        assert_eq!(ring.get(), None);
    }

    #[test]
    fn test_overflow_is_rejected() {
        let ring = RingBuffer::new(2, InsertMode::SingleProducer);
        ring.insert("a").unwrap();
        ring.insert("b").unwrap();

        assert_eq!(ring.insert("c"), Err("c"));
        assert_eq!(ring.get(), Some("a"));

        ring.insert("c").unwrap();
        assert_eq!(ring.drain().collect::<Vec<_>>(), vec!["b", "c"]);
    }

    #[test]
    fn test_wraparound_keeps_order() {
        let ring = RingBuffer::new(3, InsertMode::SingleProducer);
        let mut expected = 0;

        for round in 0..50 {
            let batch = round % 3 + 1;
            for i in 0..batch {
                ring.insert(round * 10 + i).unwrap();
            }
            for i in 0..batch {
                assert_eq!(ring.get(), Some(round * 10 + i));
                expected += 1;
            }
            assert!(ring.is_empty());
        }

        assert_eq!(expected, (0..50).map(|r| r % 3 + 1).sum::<usize>());
    }

    #[test]
    fn test_zero_capacity_rejects_everything() {
        let ring = RingBuffer::new(0, InsertMode::Locked);
        assert_eq!(ring.capacity(), 0);
        assert_eq!(ring.insert(1), Err(1));
        assert!(ring.is_empty());
        assert_eq!(ring.len(), 0);
        assert_eq!(ring.get(), None);
    }

    #[test]
    fn test_locked_multi_producer() {
        const PRODUCERS: usize = 4;
        const PER_PRODUCER: usize = 500;

        let ring = Arc::new(RingBuffer::new(PRODUCERS * PER_PRODUCER, InsertMode::Locked));
        let producers: Vec<_> = (0..PRODUCERS)
            .map(|p| {
                let ring = Arc::clone(&ring);
                thread::spawn(move || {
                    for i in 0..PER_PRODUCER {
                        ring.insert((p, i)).unwrap();
                    }
                })
            })
            .collect();
        for producer in producers {
            producer.join().unwrap();
        }

        let mut next = [0usize; PRODUCERS];
        for (p, i) in ring.drain() {
            assert_eq!(i, next[p], "producer {p} items out of order");
            next[p] += 1;
        }
        assert!(next.iter().all(|&n| n == PER_PRODUCER));
    }

    #[test]
    fn test_concurrent_producer_and_consumer() {
        let ring = Arc::new(RingBuffer::new(8, InsertMode::SingleProducer));
        let producer = {
            let ring = Arc::clone(&ring);
            thread::spawn(move || {
                for i in 0..10_000u32 {
                    let mut item = i;
                    while let Err(rejected) = ring.insert(item) {
                        item = rejected;
                        thread::yield_now();
                    }
                }
            })
        };

        let mut received = 0u32;
        while received < 10_000 {
            match ring.get() {
                Some(item) => {
                    assert_eq!(item, received);
                    received += 1;
                }
                None => thread::yield_now(),
            }
        }
        producer.join().unwrap();
        assert!(ring.is_empty());
    }

    #[test]
    fn test_drop_releases_queued_items() {
        let token = Arc::new(());
        {
            let ring = RingBuffer::new(4, InsertMode::Locked);
            ring.insert(Arc::clone(&token)).unwrap();
            ring.insert(Arc::clone(&token)).unwrap();
            ring.get();
            ring.insert(Arc::clone(&token)).unwrap();
            assert_eq!(Arc::strong_count(&token), 3);
        }
        assert_eq!(Arc::strong_count(&token), 1);
    }
}
