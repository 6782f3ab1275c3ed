use std::time::Instant;

const FPS_UPDATE_INTERVAL: f32 = 0.5;

/// Frames-per-second and average frame time over the last sampling window.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FpsSample {
    pub fps: f32,
    pub frame_time_ms: f32,
}

/// Measures frame deltas and aggregates them into FPS samples every half second.
#[derive(Debug)]
pub struct FrameTimer {
    last: Instant,
    window_time: f32,
    window_frames: u32,
}

impl FrameTimer {
    pub fn new() -> Self {
        Self {
            last: Instant::now(),
            window_time: 0.0,
            window_frames: 0,
        }
    }

    /// Seconds since the previous call.
    pub fn tick(&mut self) -> f32 {
        let now = Instant::now();
        let dt = now.duration_since(self.last).as_secs_f32();
        self.last = now;
        dt
    }

    /// Accumulates one frame of `dt` seconds and yields a sample once the window fills.
    pub fn record(&mut self, dt: f32) -> Option<FpsSample> {
        self.window_time += dt.max(0.0);
        self.window_frames += 1;
        if self.window_time < FPS_UPDATE_INTERVAL {
            return None;
        }

        let average = self.window_time / self.window_frames as f32;
        let sample = FpsSample {
            fps: if average > 0.0 { 1.0 / average } else { 0.0 },
            frame_time_ms: average * 1000.0,
        };
        self.window_time = 0.0;
        self.window_frames = 0;
        Some(sample)
    }
}

impl Default for FrameTimer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sample_emitted_after_half_second() {
        let mut timer = FrameTimer::new();
        for _ in 0..3 {
            assert!(timer.record(0.125).is_none());
        }
        let sample = timer.record(0.125).expect("window should be full");
        assert!((sample.fps - 8.0).abs() < 1e-3);
        assert!((sample.frame_time_ms - 125.0).abs() < 1e-3);

        assert!(timer.record(0.125).is_none());
    }
}
