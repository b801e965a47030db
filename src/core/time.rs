//! Simulation clock
//!
//! Tracks simulated time for the tick-driven AI. Time is advanced explicitly
//! by the host so runs are reproducible and tests can step in exact
//! increments.

/// Simulated time source with a fixed-step accumulator.
#[derive(Debug, Clone)]
pub struct SimClock {
    /// Seconds since the clock started
    elapsed: f32,
    /// Scaled delta of the last frame
    delta: f32,
    /// Frames advanced so far
    frame: u64,
    /// Fixed timestep length
    fixed_step: f32,
    /// Unconsumed time for fixed steps
    accumulator: f32,
    /// Multiplier applied to every advance
    time_scale: f32,
}

impl SimClock {
    /// Upper bound on fixed steps per frame, avoids a spiral after a stall.
    const MAX_FIXED_STEPS: u32 = 8;

    /// Create a clock with the given fixed timestep.
    #[must_use]
    pub fn new(fixed_step: f32) -> Self {
        Self {
            elapsed: 0.0,
            delta: 0.0,
            frame: 0,
            fixed_step: fixed_step.max(f32::EPSILON),
            accumulator: 0.0,
            time_scale: 1.0,
        }
    }

    /// Advance by a frame delta.
    ///
    /// Returns how many fixed steps should run this frame.
    pub fn advance(&mut self, dt: f32) -> u32 {
        self.delta = dt.max(0.0) * self.time_scale;
        self.elapsed += self.delta;
        self.frame += 1;
        self.accumulator += self.delta;

        let mut steps = 0;
        while self.accumulator >= self.fixed_step && steps < Self::MAX_FIXED_STEPS {
            self.accumulator -= self.fixed_step;
            steps += 1;
        }
        if steps == Self::MAX_FIXED_STEPS {
            self.accumulator = self.accumulator.min(self.fixed_step);
        }
        steps
    }

    /// Seconds since start.
    #[must_use]
    pub fn elapsed(&self) -> f32 {
        self.elapsed
    }

    /// Delta of the last frame.
    #[must_use]
    pub fn delta(&self) -> f32 {
        self.delta
    }

    /// Frames advanced.
    #[must_use]
    pub fn frame(&self) -> u64 {
        self.frame
    }

    /// Fixed timestep length.
    #[must_use]
    pub fn fixed_step(&self) -> f32 {
        self.fixed_step
    }

    /// Set the time scale (0 freezes the simulation).
    pub fn set_time_scale(&mut self, scale: f32) {
        self.time_scale = scale.max(0.0);
    }

    /// Current time scale.
    #[must_use]
    pub fn time_scale(&self) -> f32 {
        self.time_scale
    }
}

impl Default for SimClock {
    fn default() -> Self {
        Self::new(1.0 / 50.0)
    }
}
