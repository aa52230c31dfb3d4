use crate::scheduler::TaskScheduler;

/// Opaque physics step run between the two actor waves
///
/// Engines run one after another, but each may spread its own work over the
/// scheduler it is handed. Any task it enqueues must be finished before `run`
/// returns; the late actor wave starts right after.
pub trait PhysicalEngine: Send + Sync {
    /// Advance the simulation by `dt` seconds
    fn run(&self, scheduler: &TaskScheduler, dt: f64);
}
