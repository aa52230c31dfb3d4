/// Simulation entity ticked once per wave
///
/// Both hooks run on worker threads, in parallel with every other actor of
/// the same wave, so implementations synchronize their own state.
pub trait Actor: Send + Sync {
    /// Early wave, before the physical engines run
    fn tick_early(&self, _dt: f64) {}

    /// Late wave, after the physical engines ran
    fn tick(&self, dt: f64);
}
