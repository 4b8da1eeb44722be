//! Frame rate admission and rolling average fps

/// Decides whether an arriving frame is due at the target frame rate
///
/// Time zero is the first frame offered after (re)initialisation; from then
/// on frame `n` is admitted once `elapsed * fps >= n`.
#[derive(Debug, Clone)]
pub struct FrameRateController {
    fps: f32,
    start_ms: Option<u64>,
    admitted: u64,
}

impl FrameRateController {
    pub fn new(fps: f32) -> Self {
        Self {
            fps,
            start_ms: None,
            admitted: 0,
        }
    }

    pub fn fps(&self) -> f32 {
        self.fps
    }

    pub fn reset(&mut self, fps: f32) {
        *self = Self::new(fps);
    }

    /// Admission decision for a frame arriving at `now_ms`
    pub fn admit(&mut self, now_ms: u64) -> bool {
        let start = *self.start_ms.get_or_insert(now_ms);
        let elapsed_ms = now_ms.saturating_sub(start) as f64;
        let due = (elapsed_ms * self.fps as f64 / 1000.0) as u64;
        if due >= self.admitted {
            self.admitted += 1;
            true
        } else {
            false
        }
    }
}

/// Rolling average of the delivered frame rate
#[derive(Debug, Clone)]
pub struct AverageFps {
    expected_fps: f32,
    last_frame_ms: Option<u64>,
    last_report_ms: u64,
    mean_interval_secs: f64,
}

impl AverageFps {
    /// Interval between log reports of the measured rate
    pub const REPORT_INTERVAL_MS: u64 = 5_000;

    pub fn new(expected_fps: f32) -> Self {
        Self {
            expected_fps,
            last_frame_ms: None,
            last_report_ms: 0,
            mean_interval_secs: 0.0,
        }
    }

    pub fn reset(&mut self, expected_fps: f32) {
        *self = Self::new(expected_fps);
    }

    /// Record a frame delivered at `now_ms`.
    ///
    /// Returns `true` when the measured rate was reported to the log.
    pub fn update(&mut self, now_ms: u64) -> bool {
        match self.last_frame_ms {
            Some(last) => {
                let interval = now_ms.saturating_sub(last) as f64 / 1000.0;
                self.mean_interval_secs = if self.mean_interval_secs == 0.0 {
                    interval
                } else {
                    0.8 * self.mean_interval_secs + 0.2 * interval
                };
            }
            None => self.last_report_ms = now_ms,
        }
        self.last_frame_ms = Some(now_ms);

        if now_ms.saturating_sub(self.last_report_ms) > Self::REPORT_INTERVAL_MS
            && self.mean_interval_secs != 0.0
        {
            log::info!(
                "[Capture] Captured mean fps={:.2}, expected={:.2}",
                self.get(),
                self.expected_fps
            );
            self.last_report_ms = now_ms;
            return true;
        }
        false
    }

    /// Measured frames per second, 0 until two frames were seen
    pub fn get(&self) -> f32 {
        if self.mean_interval_secs != 0.0 {
            (1.0 / self.mean_interval_secs) as f32
        } else {
            0.0
        }
    }

    pub fn expected(&self) -> f32 {
        self.expected_fps
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_frame_always_admitted() {
        let mut ctrl = FrameRateController::new(5.0);
        assert!(ctrl.admit(12_345));
    }

    #[test]
    fn test_admits_at_target_rate() {
        let mut ctrl = FrameRateController::new(10.0);
        // frames arriving every 25ms (40 fps) over one second
        let admitted = (0..40).filter(|i| ctrl.admit(i * 25)).count();
        assert_eq!(admitted, 10);
    }

    #[test]
    fn test_reset_restarts_timebase() {
        let mut ctrl = FrameRateController::new(1.0);
        assert!(ctrl.admit(0));
        assert!(!ctrl.admit(500));
        ctrl.reset(1.0);
        assert!(ctrl.admit(600));
    }

    #[test]
    fn test_average_fps_converges() {
        let mut avg = AverageFps::new(20.0);
        assert_eq!(avg.get(), 0.0);
        for i in 0..50 {
            avg.update(i * 50);
        }
        assert!((avg.get() - 20.0).abs() < 0.01);
    }

    #[test]
    fn test_average_fps_reports_every_five_seconds() {
        let mut avg = AverageFps::new(10.0);
        let reports = (0..=120).filter(|i| avg.update(i * 100)).count();
        // 12 seconds of frames: reports after 5.1s and 10.2s
        assert_eq!(reports, 2);
    }
}
