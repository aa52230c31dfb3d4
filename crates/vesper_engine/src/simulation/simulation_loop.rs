use super::{Actor, PhysicalEngine};
use crate::config::SimulationConfig;
use crate::foundation::collections::{ActorId, EngineId, SlotMap};
use crate::foundation::sync::{RunFlag, StopHandle};
use crate::foundation::time::{Stopwatch, TickBudget};
use crate::scheduler::{SchedulerError, TaskScheduler};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// Receives the end-of-tick signal to publish the staged scene
pub trait SceneSubmitter: Send + Sync {
    /// Copy the staged scene into the submitted snapshot
    fn submit(&self);
}

/// Counters describing how well the loop keeps its cadence
#[derive(Debug, Default)]
pub struct TickStats {
    ticks: AtomicU64,
    overruns: AtomicU64,
    short_sleeps: AtomicU64,
}

impl TickStats {
    /// Completed ticks
    pub fn ticks(&self) -> u64 {
        self.ticks.load(Ordering::Relaxed)
    }

    /// Ticks that used up their whole budget
    pub fn overruns(&self) -> u64 {
        self.overruns.load(Ordering::Relaxed)
    }

    /// Ticks that left less than a quarter of their budget to sleep
    pub fn short_sleeps(&self) -> u64 {
        self.short_sleeps.load(Ordering::Relaxed)
    }
}

/// Fixed-step driver for actors and physical engines
pub struct SimulationLoop {
    tick_delay: Duration,
    scheduler: TaskScheduler,
    actors: Mutex<SlotMap<ActorId, Arc<dyn Actor>>>,
    engines: Mutex<SlotMap<EngineId, Arc<dyn PhysicalEngine>>>,
    submitter: Option<Arc<dyn SceneSubmitter>>,
    run_flag: Arc<RunFlag>,
    stats: TickStats,
}

impl SimulationLoop {
    /// Create a loop and its worker pool
    pub fn new(config: &SimulationConfig) -> Result<Self, SchedulerError> {
        let scheduler = match config.worker_threads {
            Some(threads) => TaskScheduler::new(threads)?,
            None => TaskScheduler::with_default_threads()?,
        };

        log::debug!("Simulation loop created, tick delay {} ms", config.tick_delay_ms);

        Ok(Self {
            tick_delay: config.tick_delay(),
            scheduler,
            actors: Mutex::new(SlotMap::with_key()),
            engines: Mutex::new(SlotMap::with_key()),
            submitter: None,
            run_flag: Arc::new(RunFlag::new()),
            stats: TickStats::default(),
        })
    }

    /// Attach the collaborator notified at the end of every tick
    pub fn with_submitter(mut self, submitter: Arc<dyn SceneSubmitter>) -> Self {
        self.submitter = Some(submitter);
        self
    }

    /// Fixed tick period
    pub fn tick_delay(&self) -> Duration {
        self.tick_delay
    }

    /// The pool actor waves run on
    pub fn scheduler(&self) -> &TaskScheduler {
        &self.scheduler
    }

    /// Cadence counters
    pub fn stats(&self) -> &TickStats {
        &self.stats
    }

    /// Start ticking an actor from the next tick on
    pub fn register_actor(&self, actor: Arc<dyn Actor>) -> ActorId {
        self.actors.lock().insert(actor)
    }

    /// Stop ticking an actor
    ///
    /// A wave already dispatched keeps its own reference and finishes with it.
    pub fn remove_actor(&self, id: ActorId) -> Option<Arc<dyn Actor>> {
        self.actors.lock().remove(id)
    }

    /// Number of registered actors
    pub fn actor_count(&self) -> usize {
        self.actors.lock().len()
    }

    /// Run a physical engine between the actor waves from the next tick on
    pub fn register_engine(&self, engine: Arc<dyn PhysicalEngine>) -> EngineId {
        self.engines.lock().insert(engine)
    }

    /// Stop running a physical engine
    pub fn remove_engine(&self, id: EngineId) -> Option<Arc<dyn PhysicalEngine>> {
        self.engines.lock().remove(id)
    }

    /// Handle that stops [`main_loop`](Self::main_loop) from another thread
    pub fn stop_handle(&self) -> StopHandle {
        StopHandle::new(Arc::clone(&self.run_flag))
    }

    /// Request the loop to return after the current tick
    pub fn stop(&self) {
        self.run_flag.request_stop();
    }

    /// True while [`main_loop`](Self::main_loop) is ticking
    pub fn is_running(&self) -> bool {
        self.run_flag.is_running()
    }

    /// Tick at the configured rate until stopped
    ///
    /// A stop requested before this is entered makes it return immediately.
    pub fn main_loop(&self) {
        if !self.run_flag.enter() {
            return;
        }
        log::info!("Simulation loop started");

        while self.run_flag.is_running() {
            let stopwatch = Stopwatch::start_new();
            self.tick_once();
            if let Some(sleep) = self.pace(stopwatch.elapsed()) {
                thread::sleep(sleep);
            }
        }

        self.run_flag.exit();
        log::info!("Simulation loop stopped after {} ticks", self.stats.ticks());
    }

    /// Run one tick without pacing
    pub fn tick_once(&self) {
        let dt = self.tick_delay.as_secs_f64();

        let actors: Vec<Arc<dyn Actor>> = self.actors.lock().values().cloned().collect();

        for actor in &actors {
            let actor = Arc::clone(actor);
            self.scheduler.enqueue_waitable(move || actor.tick_early(dt));
        }
        self.scheduler.wait_all();

        let engines: Vec<Arc<dyn PhysicalEngine>> = self.engines.lock().values().cloned().collect();
        for engine in &engines {
            engine.run(&self.scheduler, dt);
        }

        for actor in actors {
            self.scheduler.enqueue_waitable(move || actor.tick(dt));
        }
        self.scheduler.wait_all();

        if let Some(submitter) = &self.submitter {
            submitter.submit();
        }

        self.stats.ticks.fetch_add(1, Ordering::Relaxed);
    }

    /// Classify a tick's duration, log cadence problems and return the sleep
    fn pace(&self, elapsed: Duration) -> Option<Duration> {
        let budget = TickBudget::evaluate(self.tick_delay, elapsed);

        match budget {
            TickBudget::Sleep(_) => {}
            TickBudget::ShortSleep(remaining) => {
                self.stats.short_sleeps.fetch_add(1, Ordering::Relaxed);
                log::warn!(
                    "Delay {} ms. Sleeping {} ms.",
                    self.tick_delay.as_millis(),
                    remaining.as_millis()
                );
            }
            TickBudget::Overrun => {
                self.stats.overruns.fetch_add(1, Ordering::Relaxed);
                log::warn!(
                    "Tick processing took {} ms, over the {} ms tick delay",
                    elapsed.as_millis(),
                    self.tick_delay.as_millis()
                );
            }
        }

        budget.sleep_duration()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    type Journal = Arc<Mutex<Vec<&'static str>>>;

    struct Recorder {
        journal: Journal,
    }

    impl Actor for Recorder {
        fn tick_early(&self, _dt: f64) {
            self.journal.lock().push("early");
        }

        fn tick(&self, _dt: f64) {
            self.journal.lock().push("late");
        }
    }

    impl PhysicalEngine for Recorder {
        fn run(&self, _scheduler: &TaskScheduler, _dt: f64) {
            self.journal.lock().push("physics");
        }
    }

    impl SceneSubmitter for Recorder {
        fn submit(&self) {
            self.journal.lock().push("submit");
        }
    }

    struct DtRecorder(Mutex<Vec<f64>>);

    impl Actor for DtRecorder {
        fn tick(&self, dt: f64) {
            self.0.lock().push(dt);
        }
    }

    fn config(tick_delay_ms: u64) -> SimulationConfig {
        SimulationConfig::default()
            .with_tick_delay_ms(tick_delay_ms)
            .with_worker_threads(2)
    }

    #[test]
    fn test_phase_ordering() {
        let journal = Journal::default();
        let recorder = Arc::new(Recorder {
            journal: Arc::clone(&journal),
        });

        let simulation = SimulationLoop::new(&config(20))
            .unwrap()
            .with_submitter(recorder.clone());
        for _ in 0..4 {
            simulation.register_actor(recorder.clone());
        }
        simulation.register_engine(recorder);

        simulation.tick_once();

        let journal = journal.lock();
        let expected: Vec<&str> = ["early"; 4]
            .into_iter()
            .chain(["physics"])
            .chain(["late"; 4])
            .chain(["submit"])
            .collect();
        assert_eq!(*journal, expected);
        assert_eq!(simulation.stats().ticks(), 1);
    }

    #[test]
    fn test_dt_is_configured_delay() {
        let recorder = Arc::new(DtRecorder(Mutex::new(Vec::new())));
        let simulation = SimulationLoop::new(&config(15)).unwrap();
        simulation.register_actor(recorder.clone());

        simulation.tick_once();
        simulation.tick_once();

        assert_eq!(*recorder.0.lock(), vec![0.015, 0.015]);
    }

    #[test]
    fn test_removed_actor_is_not_ticked() {
        let recorder = Arc::new(DtRecorder(Mutex::new(Vec::new())));
        let simulation = SimulationLoop::new(&config(10)).unwrap();
        let id = simulation.register_actor(recorder.clone());

        simulation.tick_once();
        assert!(simulation.remove_actor(id).is_some());
        simulation.tick_once();

        assert_eq!(recorder.0.lock().len(), 1);
        assert_eq!(simulation.actor_count(), 0);
    }

    #[test]
    fn test_engine_parallelizes_on_scheduler() {
        struct Splitter(Arc<std::sync::atomic::AtomicUsize>);

        impl PhysicalEngine for Splitter {
            fn run(&self, scheduler: &TaskScheduler, _dt: f64) {
                for _ in 0..8 {
                    let counter = Arc::clone(&self.0);
                    scheduler.enqueue_waitable(move || {
                        counter.fetch_add(1, Ordering::SeqCst);
                    });
                }
                scheduler.wait_all();
            }
        }

        let counter = Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let simulation = SimulationLoop::new(&config(10)).unwrap();
        let id = simulation.register_engine(Arc::new(Splitter(Arc::clone(&counter))));

        simulation.tick_once();
        assert_eq!(counter.load(Ordering::SeqCst), 8);

        simulation.remove_engine(id);
        simulation.tick_once();
        assert_eq!(counter.load(Ordering::SeqCst), 8);
    }

    #[test]
    fn test_pacing_counts_overruns_and_short_sleeps() {
        let _ = env_logger::builder().is_test(true).try_init();
        let simulation = SimulationLoop::new(&config(20)).unwrap();

        assert_eq!(
            simulation.pace(Duration::from_millis(5)),
            Some(Duration::from_millis(15))
        );
        assert_eq!(
            simulation.pace(Duration::from_millis(18)),
            Some(Duration::from_millis(2))
        );
        assert_eq!(simulation.pace(Duration::from_millis(25)), None);

        assert_eq!(simulation.stats().short_sleeps(), 1);
        assert_eq!(simulation.stats().overruns(), 1);
    }

    #[test]
    fn test_main_loop_stops_cooperatively() {
        let recorder = Arc::new(DtRecorder(Mutex::new(Vec::new())));
        let simulation = Arc::new(SimulationLoop::new(&config(2)).unwrap());
        simulation.register_actor(recorder.clone());
        let stop = simulation.stop_handle();

        let runner = {
            let simulation = Arc::clone(&simulation);
            thread::spawn(move || simulation.main_loop())
        };

        while recorder.0.lock().len() < 3 {
            thread::sleep(Duration::from_millis(1));
        }
        stop.stop();
        runner.join().unwrap();

        assert!(!simulation.is_running());
        let ticks = simulation.stats().ticks();
        assert!(ticks >= 3);
        assert_eq!(recorder.0.lock().len() as u64, ticks);
    }

    #[test]
    fn test_stop_before_main_loop_returns_immediately() {
        let simulation = SimulationLoop::new(&config(10)).unwrap();
        simulation.stop();
        simulation.main_loop();
        assert_eq!(simulation.stats().ticks(), 0);
    }
}
