//! Task scheduler
//!
//! A fixed pool of worker threads consuming a shared FIFO queue. Tasks are
//! either waitable, in which case they get a small reusable id that
//! [`TaskScheduler::wait`] and [`TaskScheduler::wait_all`] can observe, or
//! detached, in which case nobody tracks them.

use crate::foundation::sync::Semaphore;
use parking_lot::{Condvar, Mutex};
use std::collections::{HashSet, VecDeque};
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use thiserror::Error;

/// Id of a waitable task. Detached tasks report [`UNTRACKED`].
pub type TaskId = u32;

/// Id handed out for detached tasks
pub const UNTRACKED: TaskId = 0;

type Job = Box<dyn FnOnce() + Send + 'static>;

/// Scheduler errors
#[derive(Error, Debug)]
pub enum SchedulerError {
    /// The OS refused to start a worker thread
    #[error("Failed to spawn worker thread {index}: {source}")]
    Spawn {
        /// Index of the worker that failed to start
        index: usize,
        /// Underlying OS error
        #[source]
        source: std::io::Error,
    },
}

struct Task {
    job: Job,
    id: TaskId,
}

#[derive(Default)]
struct Queue {
    tasks: VecDeque<Task>,
    in_flight: HashSet<TaskId>,
    last_id: TaskId,
    outstanding: usize,
}

impl Queue {
    /// Advance the id cursor past 0 and every id still in flight
    fn allocate_id(&mut self) -> TaskId {
        if self.in_flight.is_empty() {
            self.last_id = UNTRACKED;
        }

        loop {
            self.last_id = self.last_id.wrapping_add(1);
            if self.last_id != UNTRACKED && !self.in_flight.contains(&self.last_id) {
                return self.last_id;
            }
        }
    }
}

struct Shared {
    queue: Mutex<Queue>,
    completed: Condvar,
    ready: Semaphore,
    shutdown: AtomicBool,
}

/// Thread pool with waitable and fire-and-forget tasks
pub struct TaskScheduler {
    shared: Arc<Shared>,
    workers: Vec<JoinHandle<()>>,
}

impl TaskScheduler {
    /// Start a pool with an explicit number of workers
    pub fn new(threads: usize) -> Result<Self, SchedulerError> {
        Self::named("vesper-worker", threads)
    }

    /// Start a pool sized from the available parallelism
    pub fn with_default_threads() -> Result<Self, SchedulerError> {
        Self::new(default_thread_count())
    }

    /// Start a pool whose threads are named `{name}-{index}`
    pub fn named(name: &str, threads: usize) -> Result<Self, SchedulerError> {
        let shared = Arc::new(Shared {
            queue: Mutex::new(Queue::default()),
            completed: Condvar::new(),
            ready: Semaphore::new(0),
            shutdown: AtomicBool::new(false),
        });

        let mut scheduler = Self {
            shared,
            workers: Vec::with_capacity(threads),
        };

        for index in 0..threads {
            let shared = Arc::clone(&scheduler.shared);
            let handle = thread::Builder::new()
                .name(format!("{name}-{index}"))
                .spawn(move || worker_loop(&shared, index))
                .map_err(|source| SchedulerError::Spawn { index, source })?;
            scheduler.workers.push(handle);
        }

        log::debug!("TaskScheduler '{name}' created with {threads} threads");
        Ok(scheduler)
    }

    /// Number of worker threads
    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    /// Queue a task. Waitable tasks get a nonzero id; detached ones get 0.
    pub fn enqueue<F>(&self, action: F, waitable: bool) -> TaskId
    where
        F: FnOnce() + Send + 'static,
    {
        let id = {
            let mut queue = self.shared.queue.lock();
            let id = if waitable {
                let id = queue.allocate_id();
                queue.in_flight.insert(id);
                queue.outstanding += 1;
                id
            } else {
                UNTRACKED
            };
            queue.tasks.push_back(Task {
                job: Box::new(action),
                id,
            });
            id
        };

        self.shared.ready.up();
        id
    }

    /// Queue a task that [`wait`](Self::wait) and [`wait_all`](Self::wait_all) observe
    pub fn enqueue_waitable<F>(&self, action: F) -> TaskId
    where
        F: FnOnce() + Send + 'static,
    {
        self.enqueue(action, true)
    }

    /// Queue a fire-and-forget task
    pub fn enqueue_detached<F>(&self, action: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.enqueue(action, false);
    }

    /// Block until the task with `id` has finished running
    ///
    /// Returns immediately for [`UNTRACKED`] or an id that is not in flight.
    pub fn wait(&self, id: TaskId) {
        if id == UNTRACKED {
            return;
        }

        let mut queue = self.shared.queue.lock();
        while queue.in_flight.contains(&id) {
            self.shared.completed.wait(&mut queue);
        }
    }

    /// Block until no waitable task is queued or running
    pub fn wait_all(&self) {
        let mut queue = self.shared.queue.lock();
        while queue.outstanding > 0 {
            self.shared.completed.wait(&mut queue);
        }
    }

    /// Number of waitable tasks not yet finished
    pub fn outstanding(&self) -> usize {
        self.shared.queue.lock().outstanding
    }
}

impl Drop for TaskScheduler {
    fn drop(&mut self) {
        self.shared.shutdown.store(true, Ordering::Release);
        self.shared.ready.up_many(self.workers.len());

        for handle in self.workers.drain(..) {
            if handle.join().is_err() {
                log::error!("Worker thread exited abnormally");
            }
        }

        let dropped = self.shared.queue.lock().tasks.len();
        if dropped > 0 {
            log::debug!("TaskScheduler stopped, {dropped} queued tasks dropped");
        } else {
            log::debug!("TaskScheduler stopped");
        }
    }
}

fn worker_loop(shared: &Shared, index: usize) {
    loop {
        shared.ready.down();

        if shared.shutdown.load(Ordering::Acquire) {
            break;
        }

        let Some(task) = shared.queue.lock().tasks.pop_front() else {
            continue;
        };

        if panic::catch_unwind(AssertUnwindSafe(task.job)).is_err() {
            log::error!("Task panicked on worker {index}, aborting");
            std::process::abort();
        }

        if task.id != UNTRACKED {
            let mut queue = shared.queue.lock();
            queue.in_flight.remove(&task.id);
            queue.outstanding -= 1;
            shared.completed.notify_all();
        }
    }
}

/// Available parallelism minus two, never fewer than two workers
pub fn default_thread_count() -> usize {
    match thread::available_parallelism() {
        Ok(n) => n.get().saturating_sub(2).max(2),
        Err(err) => {
            log::warn!("Failed to determine thread count ({err}). Default: 2");
            2
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam::channel;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    #[test]
    fn test_wait_observes_completion() {
        let scheduler = TaskScheduler::new(2).unwrap();
        let done = Arc::new(AtomicBool::new(false));

        let id = {
            let done = Arc::clone(&done);
            scheduler.enqueue_waitable(move || {
                thread::sleep(Duration::from_millis(20));
                done.store(true, Ordering::Release);
            })
        };

        assert_ne!(id, UNTRACKED);
        scheduler.wait(id);
        assert!(done.load(Ordering::Acquire));
    }

    #[test]
    fn test_wait_with_reused_ids() {
        let scheduler = TaskScheduler::new(2).unwrap();
        let counter = Arc::new(AtomicUsize::new(0));

        for round in 1..=20 {
            let id = {
                let counter = Arc::clone(&counter);
                scheduler.enqueue_waitable(move || {
                    counter.fetch_add(1, Ordering::SeqCst);
                })
            };
            scheduler.wait(id);
            assert_eq!(counter.load(Ordering::SeqCst), round);
        }
    }

    #[test]
    fn test_wait_all_then_reuse_lowest_ids() {
        let scheduler = TaskScheduler::new(2).unwrap();
        let counter = Arc::new(AtomicUsize::new(0));

        let ids: Vec<_> = (0..5)
            .map(|_| {
                let counter = Arc::clone(&counter);
                scheduler.enqueue_waitable(move || {
                    counter.fetch_add(1, Ordering::SeqCst);
                })
            })
            .collect();
        assert_eq!(ids, vec![1, 2, 3, 4, 5]);

        scheduler.wait_all();
        assert_eq!(counter.load(Ordering::SeqCst), 5);
        assert_eq!(scheduler.outstanding(), 0);

        assert_eq!(scheduler.enqueue_waitable(|| {}), 1);
        assert_eq!(scheduler.enqueue_waitable(|| {}), 2);
        scheduler.wait_all();
    }

    #[test]
    fn test_detached_tasks_are_not_tracked() {
        let scheduler = TaskScheduler::new(2).unwrap();
        let (release_tx, release_rx) = channel::bounded::<()>(0);

        let id = scheduler.enqueue(
            move || {
                let _ = release_rx.recv();
            },
            false,
        );
        assert_eq!(id, UNTRACKED);

        // Returns while the detached task is still blocked.
        scheduler.wait_all();
        scheduler.wait(id);
        assert_eq!(scheduler.outstanding(), 0);

        release_tx.send(()).unwrap();
    }

    #[test]
    fn test_fifo_order_on_single_worker() {
        let scheduler = TaskScheduler::new(1).unwrap();
        let order = Arc::new(Mutex::new(Vec::new()));

        for i in 0..10 {
            let order = Arc::clone(&order);
            scheduler.enqueue_waitable(move || order.lock().push(i));
        }
        scheduler.wait_all();

        assert_eq!(*order.lock(), (0..10).collect::<Vec<_>>());
    }

    #[test]
    fn test_id_allocation_skips_in_flight_and_zero() {
        let mut queue = Queue {
            last_id: TaskId::MAX - 1,
            ..Queue::default()
        };
        queue.in_flight.extend([TaskId::MAX, 1, 2]);

        assert_eq!(queue.allocate_id(), 3);
    }

    #[test]
    fn test_drop_discards_queued_tasks() {
        let scheduler = TaskScheduler::new(1).unwrap();
        let executed = Arc::new(AtomicUsize::new(0));
        let (started_tx, started_rx) = channel::bounded::<()>(1);
        let (release_tx, release_rx) = channel::bounded::<()>(1);

        scheduler.enqueue_detached(move || {
            started_tx.send(()).unwrap();
            release_rx.recv().unwrap();
        });
        for _ in 0..5 {
            let executed = Arc::clone(&executed);
            scheduler.enqueue_detached(move || {
                executed.fetch_add(1, Ordering::SeqCst);
            });
        }

        started_rx.recv().unwrap();
        let releaser = thread::spawn(move || {
            thread::sleep(Duration::from_millis(30));
            release_tx.send(()).unwrap();
        });

        drop(scheduler);
        releaser.join().unwrap();
        assert_eq!(executed.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_default_thread_count_floor() {
        assert!(default_thread_count() >= 2);
    }
}
