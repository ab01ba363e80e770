use std::time::{Duration, Instant};

/// Timing for one frame.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct FrameTime {
    /// Seconds since the first tick.
    pub elapsed: f32,
    /// Seconds since the previous tick, zero on the first.
    pub delta: f32,
}

/// Monotonic frame clock starting at zero on its first tick.
#[derive(Clone, Copy, Debug, Default)]
pub struct FrameClock {
    start: Option<Instant>,
    previous: Duration,
}

impl FrameClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sample the clock at `now`.
    ///
    /// `delta` is always the difference between this and the previous
    /// `elapsed`, so the deltas sum to the elapsed time.
    pub fn tick(&mut self, now: Instant) -> FrameTime {
        let start = *self.start.get_or_insert(now);
        let elapsed = now.saturating_duration_since(start).max(self.previous);
        let delta = elapsed - self.previous;
        self.previous = elapsed;
        FrameTime {
            elapsed: elapsed.as_secs_f32(),
            delta: delta.as_secs_f32(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_tick_starts_at_zero() {
        let mut clock = FrameClock::new();
        let t = clock.tick(Instant::now());
        assert_eq!(t, FrameTime::default());
    }

    #[test]
    fn delta_is_difference_of_elapsed() {
        let mut clock = FrameClock::new();
        let t0 = Instant::now();
        clock.tick(t0);
        let a = clock.tick(t0 + Duration::from_millis(16));
        let b = clock.tick(t0 + Duration::from_millis(50));
        assert!((a.delta - 0.016).abs() < 1e-6);
        assert!((b.delta - (b.elapsed - a.elapsed)).abs() < 1e-6);
        assert!((b.elapsed - 0.05).abs() < 1e-6);
    }

    #[test]
    fn never_runs_backwards() {
        let mut clock = FrameClock::new();
        let t0 = Instant::now() + Duration::from_secs(1);
        clock.tick(t0);
        clock.tick(t0 + Duration::from_millis(20));
        let t = clock.tick(t0 + Duration::from_millis(10));
        assert_eq!(t.delta, 0.0);
        assert!((t.elapsed - 0.02).abs() < 1e-6);
    }
}
