use std::time::{Duration, Instant};

const DT_MIN: Duration = Duration::from_micros(100);
const DT_MAX: Duration = Duration::from_millis(250);

/// Frame timing snapshot.
#[derive(Debug, Copy, Clone)]
pub struct FrameTime {
    /// Seconds since the previous tick, clamped.
    pub dt: f32,
    /// Seconds since the clock started, unclamped.
    pub elapsed: f32,
    pub now: Instant,
    pub frame_index: u64,
}

impl FrameTime {
    pub fn elapsed_ms(&self) -> f64 {
        f64::from(self.elapsed) * 1000.0
    }
}

/// Monotonic clock producing one `FrameTime` per rendered frame.
///
/// `dt` is clamped so a stalled or minimized window does not produce a huge
/// step when it resumes.
#[derive(Debug, Clone)]
pub struct FrameClock {
    start: Instant,
    last: Instant,
    frame_index: u64,
}

impl FrameClock {
    pub fn new() -> Self {
        Self::starting_at(Instant::now())
    }

    pub fn starting_at(start: Instant) -> Self {
        Self {
            start,
            last: start,
            frame_index: 0,
        }
    }

    /// Restarts elapsed time and the frame counter.
    pub fn reset(&mut self, now: Instant) {
        self.start = now;
        self.last = now;
        self.frame_index = 0;
    }

    pub fn tick(&mut self) -> FrameTime {
        self.tick_at(Instant::now())
    }

    pub fn tick_at(&mut self, now: Instant) -> FrameTime {
        let dt = now
            .saturating_duration_since(self.last)
            .clamp(DT_MIN, DT_MAX);
        self.last = now;

        let time = FrameTime {
            dt: dt.as_secs_f32(),
            elapsed: now.saturating_duration_since(self.start).as_secs_f32(),
            now,
            frame_index: self.frame_index,
        };
        self.frame_index = self.frame_index.wrapping_add(1);
        time
    }
}

impl Default for FrameClock {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tick_clamps_dt() {
        let start = Instant::now();
        let mut clock = FrameClock::starting_at(start);

        let first = clock.tick_at(start);
        assert_eq!(first.frame_index, 0);
        assert!((first.dt - 0.0001).abs() < 1e-6);

        let second = clock.tick_at(start + Duration::from_millis(16));
        assert_eq!(second.frame_index, 1);
        assert!((second.dt - 0.016).abs() < 1e-6);

        let stalled = clock.tick_at(start + Duration::from_secs(5));
        assert!((stalled.dt - 0.25).abs() < 1e-6);
        assert!((stalled.elapsed - 5.0).abs() < 1e-6);
    }

    #[test]
    fn test_reset_restarts_counters() {
        let start = Instant::now();
        let mut clock = FrameClock::starting_at(start);
        clock.tick_at(start + Duration::from_millis(10));
        clock.reset(start + Duration::from_secs(1));
        let time = clock.tick_at(start + Duration::from_millis(1500));
        assert_eq!(time.frame_index, 0);
        assert!((time.elapsed - 0.5).abs() < 1e-6);
        assert!((time.elapsed_ms() - 500.0).abs() < 1e-3);
    }
}
