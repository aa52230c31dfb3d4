//! Time management utilities

use std::time::{Duration, Instant};

/// Outcome of fitting one tick into its fixed time budget
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickBudget {
    /// Enough budget left; sleep for the remainder
    Sleep(Duration),
    /// Less than a quarter of the budget left; still sleep, but warn
    ShortSleep(Duration),
    /// The tick used the whole budget; continue immediately
    Overrun,
}

impl TickBudget {
    /// Classify the time spent on a tick against the configured delay
    pub fn evaluate(tick_delay: Duration, elapsed: Duration) -> Self {
        match tick_delay.checked_sub(elapsed) {
            Some(remaining) if !remaining.is_zero() => {
                if remaining < tick_delay / 4 {
                    Self::ShortSleep(remaining)
                } else {
                    Self::Sleep(remaining)
                }
            }
            _ => Self::Overrun,
        }
    }

    /// How long the loop should sleep, if at all
    pub fn sleep_duration(self) -> Option<Duration> {
        match self {
            Self::Sleep(d) | Self::ShortSleep(d) => Some(d),
            Self::Overrun => None,
        }
    }
}

/// Counts frames over one-second windows
pub struct FrameRateMonitor {
    window_start: Instant,
    frames: u32,
}

impl Default for FrameRateMonitor {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameRateMonitor {
    /// Create a monitor whose first window starts now
    pub fn new() -> Self {
        Self {
            window_start: Instant::now(),
            frames: 0,
        }
    }

    /// Record one frame; returns the frame count when a window closes
    pub fn frame(&mut self) -> Option<u32> {
        self.frame_at(Instant::now())
    }

    fn frame_at(&mut self, now: Instant) -> Option<u32> {
        self.frames += 1;

        if now.duration_since(self.window_start) >= Duration::from_secs(1) {
            let frames = self.frames;
            self.window_start = now;
            self.frames = 0;
            Some(frames)
        } else {
            None
        }
    }
}

/// Simple stopwatch for measuring elapsed time
pub struct Stopwatch {
    start_time: Instant,
}

impl Default for Stopwatch {
    fn default() -> Self {
        Self::start_new()
    }
}

impl Stopwatch {
    /// Create a new stopwatch and start it immediately
    pub fn start_new() -> Self {
        Self {
            start_time: Instant::now(),
        }
    }

    /// Get the elapsed time
    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_budget_sleep() {
        let budget = TickBudget::evaluate(Duration::from_millis(20), Duration::from_millis(5));
        assert_eq!(budget, TickBudget::Sleep(Duration::from_millis(15)));
    }

    #[test]
    fn test_budget_short_sleep() {
        let budget = TickBudget::evaluate(Duration::from_millis(20), Duration::from_millis(17));
        assert_eq!(budget, TickBudget::ShortSleep(Duration::from_millis(3)));
        assert_eq!(budget.sleep_duration(), Some(Duration::from_millis(3)));
    }

    #[test]
    fn test_budget_overrun() {
        let delay = Duration::from_millis(20);
        assert_eq!(TickBudget::evaluate(delay, delay), TickBudget::Overrun);
        assert_eq!(
            TickBudget::evaluate(delay, Duration::from_millis(35)),
            TickBudget::Overrun
        );
        assert_eq!(TickBudget::Overrun.sleep_duration(), None);
    }

    #[test]
    fn test_frame_rate_window() {
        let mut monitor = FrameRateMonitor::new();
        let start = monitor.window_start;

        assert_eq!(monitor.frame_at(start + Duration::from_millis(100)), None);
        assert_eq!(monitor.frame_at(start + Duration::from_millis(500)), None);
        assert_eq!(monitor.frame_at(start + Duration::from_millis(1000)), Some(3));
        assert_eq!(monitor.frame_at(start + Duration::from_millis(1100)), None);
    }
}
