use std::time::{Duration, Instant};

/// Frame-stepped media clock.
///
/// Elapsed media time advances by exactly `1000 / fps` ms per tick, so the
/// sequence of sampled times is independent of how fast frames encode.
#[derive(Debug, Clone)]
pub struct RenderClock {
    fps: u32,
    ticks: u64,
    started: Instant,
}

impl RenderClock {
    pub fn new(fps: u32) -> Self {
        Self {
            fps: fps.max(1),
            ticks: 0,
            started: Instant::now(),
        }
    }

    pub fn fps(&self) -> u32 {
        self.fps
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    pub fn frame_interval_ms(&self) -> f64 {
        1000.0 / self.fps as f64
    }

    /// Media time at the current tick.
    pub fn elapsed_ms(&self) -> f64 {
        self.ticks as f64 * 1000.0 / self.fps as f64
    }

    pub fn tick(&mut self) {
        self.ticks += 1;
    }

    pub fn wall_elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Media time rendered per second of wall time.
    pub fn speed(&self) -> f64 {
        let wall = self.wall_elapsed().as_secs_f64();
        if wall <= 0.0 {
            0.0
        } else {
            self.elapsed_ms() / 1000.0 / wall
        }
    }

    /// Frames needed to cover `ms` at this rate, rounded up.
    pub fn frames_for(&self, ms: u64) -> u64 {
        (ms * self.fps as u64).div_ceil(1000)
    }
}
