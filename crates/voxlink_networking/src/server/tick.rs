//! # Server Tick Loop
//!
//! Deadline scheduler driving [`NetworkServer::tick`](super::NetworkServer::tick).
//!
//! ```text
//!   next_due ──run──▶ next_due + period ──run──▶ ...
//!       │
//!       └─ more than MAX_BACKLOG periods behind: rebase to now
//! ```
//!
//! A slow tick is followed by back-to-back catch-up ticks until the schedule
//! is met again. A long stall drops the backlog instead of replaying it.

use std::time::{Duration, Instant};

use crate::config::DEFAULT_TICK_RATE;

/// Periods the schedule may fall behind before the backlog is dropped.
const MAX_BACKLOG: u32 = 10;

/// Timing of the ticks run so far.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TickStats {
    /// Ticks that took longer than one period.
    pub late_ticks: u64,
    /// Moving average of tick duration in microseconds.
    pub avg_tick_us: u64,
}

/// Fixed-rate tick scheduler.
pub struct TickLoop {
    period: Duration,
    next_due: Instant,
    ticks: u64,
    stats: TickStats,
}

impl TickLoop {
    /// Creates a loop running `tick_rate` times per second. Zero runs once
    /// per second.
    #[must_use]
    pub fn new(tick_rate: u32) -> Self {
        let period = Duration::from_micros(1_000_000 / u64::from(tick_rate.max(1)));
        Self {
            period,
            next_due: Instant::now() + period,
            ticks: 0,
            stats: TickStats::default(),
        }
    }

    /// Returns true once the next tick's deadline has passed.
    #[must_use]
    pub fn is_due(&self) -> bool {
        Instant::now() >= self.next_due
    }

    /// Runs one tick and schedules the next.
    pub fn run(&mut self, tick: impl FnOnce()) {
        let start = Instant::now();
        tick();
        let took = start.elapsed();

        self.ticks += 1;
        let took_us = u64::try_from(took.as_micros()).unwrap_or(u64::MAX);
        self.stats.avg_tick_us = if self.ticks == 1 {
            took_us
        } else {
            (self.stats.avg_tick_us.saturating_mul(15).saturating_add(took_us)) / 16
        };
        if took > self.period {
            self.stats.late_ticks += 1;
            tracing::debug!(tick = self.ticks, took_us, "late tick");
        }

        self.next_due += self.period;
        let now = Instant::now();
        if now > self.next_due + self.period * MAX_BACKLOG {
            tracing::warn!(behind_ms = (now - self.next_due).as_millis(), "tick backlog dropped");
            self.next_due = now;
        }
    }

    /// Sleeps until the next tick is due.
    pub fn sleep_until_due(&self) {
        let now = Instant::now();
        if self.next_due > now {
            std::thread::sleep(self.next_due - now);
        }
    }

    /// Ticks run so far.
    #[must_use]
    pub const fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Timing of the ticks run so far.
    #[must_use]
    pub const fn stats(&self) -> &TickStats {
        &self.stats
    }

    /// Time between ticks.
    #[must_use]
    pub const fn period(&self) -> Duration {
        self.period
    }
}

impl Default for TickLoop {
    fn default() -> Self {
        Self::new(DEFAULT_TICK_RATE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_period_from_rate() {
        assert_eq!(TickLoop::default().period(), Duration::from_millis(50));
        assert_eq!(TickLoop::new(0).period(), Duration::from_secs(1));
        assert!(!TickLoop::new(1).is_due());
    }

    #[test]
    fn test_run_counts_and_reschedules() {
        let mut ticks = TickLoop::new(1000);
        std::thread::sleep(Duration::from_millis(2));
        assert!(ticks.is_due());

        let mut ran = 0;
        while ticks.is_due() && ran < 100 {
            ticks.run(|| ran += 1);
        }
        assert_eq!(ticks.ticks(), ran);
        assert!(ran >= 1);
        assert_eq!(ticks.stats().late_ticks, 0);
    }

    #[test]
    fn test_stall_drops_backlog() {
        let mut ticks = TickLoop::new(1000);
        std::thread::sleep(Duration::from_millis(60));

        let mut ran = 0u32;
        while ticks.is_due() && ran < 100 {
            ticks.run(|| ran += 1);
        }
        // Sixty periods overdue, but only a handful replayed.
        assert!(ran <= MAX_BACKLOG, "replayed {ran} ticks");
    }

    #[test]
    fn test_slow_tick_is_late() {
        let mut ticks = TickLoop::new(1000);
        ticks.run(|| std::thread::sleep(Duration::from_millis(3)));
        assert_eq!(ticks.stats().late_ticks, 1);
        assert!(ticks.stats().avg_tick_us >= 3_000);
        ticks.sleep_until_due();
    }
}
