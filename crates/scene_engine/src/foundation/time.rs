//! Time management utilities

use std::time::Instant;

/// Per-frame time sample handed to every pipeline phase
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Clock {
    /// Seconds elapsed since the previous frame
    pub delta: f32,
    /// Seconds elapsed since the timer was created
    pub total: f32,
    /// Frame counter
    pub frame: u64,
}

impl Clock {
    /// Build a clock sample by hand (useful for fixed-step simulation and tests)
    pub fn fixed(delta: f32, total: f32, frame: u64) -> Self {
        Self { delta, total, frame }
    }
}

/// High-precision timer for frame timing
pub struct Timer {
    last_frame: Instant,
    delta_time: f32,
    total_time: f32,
    frame_count: u64,
}

impl Default for Timer {
    fn default() -> Self {
        Self::new()
    }
}

impl Timer {
    /// Create a new timer
    pub fn new() -> Self {
        Self {
            last_frame: Instant::now(),
            delta_time: 0.0,
            total_time: 0.0,
            frame_count: 0,
        }
    }

    /// Update the timer (should be called once per frame)
    pub fn update(&mut self) -> Clock {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_frame);
        self.delta_time = elapsed.as_secs_f32();
        self.total_time += self.delta_time;
        self.last_frame = now;
        self.frame_count += 1;
        self.clock()
    }

    /// Current clock sample without advancing
    pub fn clock(&self) -> Clock {
        Clock {
            delta: self.delta_time,
            total: self.total_time,
            frame: self.frame_count,
        }
    }

    /// Get the time since the last frame in seconds
    pub fn delta_time(&self) -> f32 {
        self.delta_time
    }

    /// Get the current frame count
    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }
}
