//! Frame rate tracking for the window title.

use std::time::{Duration, Instant};

/// Counts frames and reports the average rate once per interval.
#[derive(Debug)]
pub struct FpsCounter {
    interval: Duration,
    window_start: Instant,
    frames: u32,
    min_fps: f64,
    max_fps: f64,
}

impl FpsCounter {
    pub fn new(interval: Duration, now: Instant) -> Self {
        Self {
            interval,
            window_start: now,
            frames: 0,
            min_fps: f64::MAX,
            max_fps: 0.0,
        }
    }

    /// Count one frame. Returns the average rate when an interval closed.
    pub fn tick(&mut self, now: Instant) -> Option<f64> {
        self.frames += 1;
        let elapsed = now.duration_since(self.window_start);
        if elapsed < self.interval {
            return None;
        }

        let fps = f64::from(self.frames) / elapsed.as_secs_f64();
        self.min_fps = self.min_fps.min(fps);
        self.max_fps = self.max_fps.max(fps);
        self.frames = 0;
        self.window_start = now;
        Some(fps)
    }

    /// Lowest and highest interval averages so far.
    pub fn range(&self) -> Option<(f64, f64)> {
        (self.max_fps > 0.0).then_some((self.min_fps, self.max_fps))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn reports_once_per_interval() {
        let start = Instant::now();
        let mut counter = FpsCounter::new(Duration::from_secs(1), start);

        for i in 1..60 {
            assert!(counter.tick(start + Duration::from_millis(i * 10)).is_none());
        }
        let fps = counter.tick(start + Duration::from_secs(1)).unwrap();
        assert_relative_eq!(fps, 60.0);

        assert!(counter.tick(start + Duration::from_millis(1500)).is_none());
    }

    #[test]
    fn tracks_range_across_intervals() {
        let start = Instant::now();
        let mut counter = FpsCounter::new(Duration::from_secs(1), start);
        assert!(counter.range().is_none());

        counter.tick(start + Duration::from_secs(1));
        for _ in 0..3 {
            counter.tick(start + Duration::from_millis(1500));
        }
        counter.tick(start + Duration::from_secs(2));

        let (min, max) = counter.range().unwrap();
        assert_relative_eq!(min, 1.0);
        assert_relative_eq!(max, 4.0);
    }
}
