//! Fixed-timestep clock
//!
//! Frame time goes in, a count of simulation ticks comes out. The leftover
//! lag is exposed as `alpha` for render interpolation.

use crate::consts::{MAX_SUBSTEPS, SEC_PER_UPDATE};

/// Longest frame the clock will account for (seconds)
const MAX_FRAME_TIME: f32 = 0.1;

#[derive(Debug, Clone)]
pub struct FixedStep {
    accumulator: f32,
    step: f32,
    max_substeps: u32,
}

impl Default for FixedStep {
    fn default() -> Self {
        Self::new(SEC_PER_UPDATE, MAX_SUBSTEPS)
    }
}

impl FixedStep {
    pub fn new(step: f32, max_substeps: u32) -> Self {
        Self {
            accumulator: 0.0,
            step,
            max_substeps,
        }
    }

    pub fn step(&self) -> f32 {
        self.step
    }

    /// Add `dt` seconds of frame time and return how many ticks to run.
    ///
    /// Stalls are clamped and at most `max_substeps` ticks are handed out per
    /// frame. Lag beyond that cap is dropped.
    pub fn advance(&mut self, dt: f32) -> u32 {
        self.accumulator += dt.clamp(0.0, MAX_FRAME_TIME);

        let mut ticks = 0;
        while self.accumulator >= self.step && ticks < self.max_substeps {
            self.accumulator -= self.step;
            ticks += 1;
        }
        if ticks == self.max_substeps && self.accumulator >= self.step {
            log::debug!("Dropping {:.4}s of simulation lag", self.accumulator);
            self.accumulator %= self.step;
        }
        ticks
    }

    /// Fraction of a tick left in the accumulator, in `[0, 1)`
    pub fn alpha(&self) -> f32 {
        self.accumulator / self.step
    }
}
