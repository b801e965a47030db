//! Steering behaviors for path following
//!
//! Agent bodies in the reference host follow their path waypoints with
//! [`Seek`] and slow into the final waypoint with [`Arrive`].

use glam::Vec3;

/// Output from a steering behavior
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SteeringOutput {
    /// Linear acceleration
    pub linear: Vec3,
}

impl SteeringOutput {
    /// Zero steering
    pub const ZERO: Self = Self { linear: Vec3::ZERO };

    /// Integrate into a velocity, clamped to `max_speed`.
    #[must_use]
    pub fn integrate(self, velocity: Vec3, dt: f32, max_speed: f32) -> Vec3 {
        (velocity + self.linear * dt).clamp_length_max(max_speed)
    }
}

/// Trait for steering behaviors
pub trait SteeringBehavior {
    /// Calculate steering from the agent's position and velocity
    fn calculate(&self, position: Vec3, velocity: Vec3) -> SteeringOutput;
}

/// Seek behavior - accelerate flat out towards a target
#[derive(Debug, Clone)]
pub struct Seek {
    /// Target position
    pub target: Vec3,
    /// Maximum speed
    pub max_speed: f32,
    /// Maximum acceleration
    pub max_acceleration: f32,
}

impl Seek {
    /// Create a new seek behavior
    #[must_use]
    pub fn new(target: Vec3, max_speed: f32, max_acceleration: f32) -> Self {
        Self {
            target,
            max_speed,
            max_acceleration,
        }
    }
}

impl SteeringBehavior for Seek {
    fn calculate(&self, position: Vec3, velocity: Vec3) -> SteeringOutput {
        let desired = (self.target - position).normalize_or_zero() * self.max_speed;
        SteeringOutput {
            linear: (desired - velocity).clamp_length_max(self.max_acceleration),
        }
    }
}

/// Arrive behavior - move towards target and slow down
#[derive(Debug, Clone)]
pub struct Arrive {
    /// Target position
    pub target: Vec3,
    /// Maximum acceleration
    pub max_acceleration: f32,
    /// Maximum speed
    pub max_speed: f32,
    /// Slowing distance
    pub slow_radius: f32,
    /// Stopping distance
    pub target_radius: f32,
}

impl Arrive {
    /// Create a new arrive behavior
    #[must_use]
    pub fn new(target: Vec3, max_acceleration: f32, max_speed: f32) -> Self {
        Self {
            target,
            max_acceleration,
            max_speed,
            slow_radius: 2.0,
            target_radius: 0.1,
        }
    }
}

impl SteeringBehavior for Arrive {
    fn calculate(&self, position: Vec3, velocity: Vec3) -> SteeringOutput {
        let to_target = self.target - position;
        let distance = to_target.length();

        if distance < self.target_radius {
            // Brake to a standstill
            return SteeringOutput {
                linear: (-velocity).clamp_length_max(self.max_acceleration),
            };
        }

        let target_speed = if distance > self.slow_radius {
            self.max_speed
        } else {
            self.max_speed * distance / self.slow_radius
        };

        let target_velocity = to_target.normalize_or_zero() * target_speed;
        SteeringOutput {
            linear: (target_velocity - velocity).clamp_length_max(self.max_acceleration),
        }
    }
}
