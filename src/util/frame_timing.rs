use web_time::{Duration, Instant};

/// Frame clock: elapsed time for the `time` uniform, smoothed FPS and an
/// optional frame cap.
pub struct FrameTiming {
    /// Frame cap (0 = unlimited).
    target_fps: u32,
    min_frame_duration: Duration,
    start: Instant,
    last_frame: Instant,
    frames: u64,
    /// Exponential moving average of the frame rate.
    smoothed_fps: f32,
    /// Weight of the newest sample (0.0-1.0).
    smoothing: f32,
}

impl FrameTiming {
    /// Start the clock with the given cap (0 = unlimited).
    pub fn new(target_fps: u32) -> Self {
        let min_frame_duration = if target_fps > 0 {
            Duration::from_secs_f64(1.0 / f64::from(target_fps))
        } else {
            Duration::ZERO
        };
        let now = Instant::now();
        Self {
            target_fps,
            min_frame_duration,
            start: now,
            last_frame: now,
            frames: 0,
            smoothed_fps: 60.0,
            smoothing: 0.05,
        }
    }

    /// Whether the cap allows another frame yet.
    pub fn should_render(&self) -> bool {
        if self.target_fps == 0 {
            return true;
        }
        self.last_frame.elapsed() >= self.min_frame_duration
    }

    /// Record a finished frame.
    pub fn end_frame(&mut self) {
        let now = Instant::now();
        let frame_time = now.duration_since(self.last_frame).as_secs_f32();
        self.last_frame = now;
        self.frames += 1;

        if frame_time > 0.0 {
            self.smoothed_fps = self.smoothed_fps * (1.0 - self.smoothing)
                + frame_time.recip() * self.smoothing;
        }
        if self.frames % 600 == 0 {
            log::debug!("frame {}: {:.1} fps", self.frames, self.smoothed_fps);
        }
    }

    /// Seconds since the clock started.
    pub fn seconds(&self) -> f32 {
        self.start.elapsed().as_secs_f32()
    }

    /// Frames recorded so far.
    pub fn frames(&self) -> u64 {
        self.frames
    }

    /// Smoothed frames per second.
    pub fn fps(&self) -> f32 {
        self.smoothed_fps
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unlimited_always_renders() {
        let mut timing = FrameTiming::new(0);
        assert!(timing.should_render());
        timing.end_frame();
        assert!(timing.should_render());
        assert_eq!(timing.frames(), 1);
    }

    #[test]
    fn cap_blocks_an_immediate_second_frame() {
        let mut timing = FrameTiming::new(1);
        timing.end_frame();
        assert!(!timing.should_render());
        assert!(timing.seconds() >= 0.0);
        assert!(timing.fps() > 0.0);
    }
}
