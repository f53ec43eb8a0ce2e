//! Simulation clock
//!
//! Time is measured in seconds since the simulation started. The clock only
//! moves forward; the effect registry never reads it directly and instead
//! receives `now` as an argument so that a whole update pass sees one time.

/// Anything that can report the current simulation time
pub trait TimeSource {
    /// Current simulation time in seconds
    fn now(&self) -> f32;
}

/// Monotonic simulated clock
#[derive(Debug, Clone, Default)]
pub struct SimClock {
    /// Current simulated time
    now: f32,

    /// Number of times the clock has been advanced
    ticks: u64,
}

impl SimClock {
    /// Create a clock at time zero
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a clock starting at the given time
    pub fn starting_at(now: f32) -> Self {
        Self { now, ticks: 0 }
    }

    /// Advance the clock by `delta` seconds. Negative deltas are ignored.
    pub fn advance(&mut self, delta: f32) -> f32 {
        if delta.is_nan() || delta < 0.0 {
            tracing::warn!(delta, now = self.now, "Ignoring non-forward clock advance");
            return self.now;
        }
        self.now += delta;
        self.ticks += 1;
        self.now
    }

    /// Move the clock to an absolute time. Times in the past are ignored.
    pub fn advance_to(&mut self, time: f32) -> f32 {
        if time.is_nan() || time < self.now {
            tracing::warn!(time, now = self.now, "Ignoring clock regression");
            return self.now;
        }
        self.now = time;
        self.ticks += 1;
        self.now
    }

    /// How many successful advances have happened
    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Format the current time as MM:SS.ms
    pub fn format_time(&self) -> String {
        let mins = (self.now / 60.0).floor() as u32;
        let secs_remainder = self.now % 60.0;
        format!("{:02}:{:05.2}", mins, secs_remainder)
    }
}

impl TimeSource for SimClock {
    fn now(&self) -> f32 {
        self.now
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_advance() {
        let mut clock = SimClock::new();
        assert_eq!(clock.now(), 0.0);

        clock.advance(1.5);
        clock.advance(0.5);
        assert!((clock.now() - 2.0).abs() < 0.001);
        assert_eq!(clock.ticks(), 2);
    }

    #[test]
    fn test_never_moves_backwards() {
        let mut clock = SimClock::starting_at(10.0);

        clock.advance(-3.0);
        assert_eq!(clock.now(), 10.0);

        clock.advance_to(4.0);
        assert_eq!(clock.now(), 10.0);
        assert_eq!(clock.ticks(), 0);

        clock.advance_to(12.25);
        assert_eq!(clock.now(), 12.25);
    }

    #[test]
    fn test_format_time() {
        let mut clock = SimClock::new();

        clock.advance_to(15.23);
        assert_eq!(clock.format_time(), "00:15.23");

        clock.advance_to(165.5);
        assert_eq!(clock.format_time(), "02:45.50");
    }
}
