pub const DEFAULT_UPDATE_INTERVAL_MS: i64 = 500;
pub const PLACEHOLDER: &str = "-- FPS";

/// Frames-per-second readout refreshed every `update_interval` milliseconds.
#[derive(Debug, Clone)]
pub struct FpsCounter {
    frames: u32,
    last_update: Option<f64>,
    interval_ms: f64,
    fps: Option<f64>,
    label: String,
}

impl FpsCounter {
    /// A non-positive interval falls back to the default.
    pub fn new(update_interval_ms: i64) -> Self {
        let interval = if update_interval_ms > 0 {
            update_interval_ms
        } else {
            DEFAULT_UPDATE_INTERVAL_MS
        };
        Self {
            frames: 0,
            last_update: None,
            interval_ms: interval as f64,
            fps: None,
            label: PLACEHOLDER.to_string(),
        }
    }

    pub fn update_interval_ms(&self) -> f64 {
        self.interval_ms
    }

    pub fn reset(&mut self) {
        self.frames = 0;
        self.last_update = None;
        self.fps = None;
        self.label = PLACEHOLDER.to_string();
    }

    /// Counts one frame at `time_ms`. Returns true when the label changed.
    pub fn update(&mut self, time_ms: f64) -> bool {
        if time_ms.is_nan() {
            return false;
        }
        let last = *self.last_update.get_or_insert(time_ms);

        self.frames += 1;
        let elapsed = time_ms - last;
        if elapsed < self.interval_ms {
            return false;
        }

        let fps = f64::from(self.frames) * 1000.0 / elapsed;
        self.fps = Some(fps);
        self.label = format!("{fps:.1} FPS");
        self.frames = 0;
        self.last_update = Some(time_ms);
        true
    }

    pub fn fps(&self) -> Option<f64> {
        self.fps
    }

    pub fn label(&self) -> &str {
        &self.label
    }
}

impl Default for FpsCounter {
    fn default() -> Self {
        Self::new(DEFAULT_UPDATE_INTERVAL_MS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_placeholder_until_interval_elapses() {
        let mut counter = FpsCounter::default();
        assert_eq!(counter.label(), PLACEHOLDER);
        assert!(!counter.update(1000.0));
        assert!(!counter.update(1250.0));
        assert_eq!(counter.label(), PLACEHOLDER);
        assert_eq!(counter.fps(), None);
    }

    #[test]
    fn test_label_after_interval() {
        let mut counter = FpsCounter::default();
        // Baseline frame plus 30 frames over 500 ms.
        counter.update(100.0);
        let mut changed = false;
        for i in 1..=30 {
            changed = counter.update(100.0 + f64::from(i) * 500.0 / 30.0);
        }
        assert!(changed);
        assert_eq!(counter.label(), "62.0 FPS");
    }

    #[test]
    fn test_nan_is_ignored() {
        let mut counter = FpsCounter::new(100);
        counter.update(0.0);
        assert!(!counter.update(f64::NAN));
        assert!(counter.update(100.0));
        // Two counted frames over 100 ms.
        assert_eq!(counter.label(), "20.0 FPS");
    }

    #[test]
    fn test_non_positive_interval_uses_default() {
        assert_eq!(FpsCounter::new(0).update_interval_ms(), 500.0);
        assert_eq!(FpsCounter::new(-20).update_interval_ms(), 500.0);
        assert_eq!(FpsCounter::new(250).update_interval_ms(), 250.0);
    }

    #[test]
    fn test_reset_restores_placeholder() {
        let mut counter = FpsCounter::new(10);
        counter.update(0.0);
        counter.update(20.0);
        assert_ne!(counter.label(), PLACEHOLDER);
        counter.reset();
        assert_eq!(counter.label(), PLACEHOLDER);
        assert_eq!(counter.fps(), None);
    }
}
