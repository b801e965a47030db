//! Arena components

use glam::{Quat, Vec3};

use crate::physics::RigidBodyHandle;

/// Position and facing of an entity
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    /// Foot position in world space
    pub position: Vec3,
    /// Rotation around the up axis
    pub rotation: Quat,
}

impl Transform {
    /// Create a transform with just a position
    #[must_use]
    pub fn from_position(position: Vec3) -> Self {
        Self {
            position,
            ..Default::default()
        }
    }

    /// Get the forward direction (negative Z in local space)
    #[must_use]
    pub fn forward(&self) -> Vec3 {
        self.rotation * Vec3::NEG_Z
    }

    /// Turn on the ground plane to face `target`
    pub fn look_at_flat(&mut self, target: Vec3) {
        let offset = Vec3::new(target.x - self.position.x, 0.0, target.z - self.position.z);
        if let Some(direction) = offset.try_normalize() {
            self.rotation = Quat::from_rotation_arc(Vec3::NEG_Z, direction);
        }
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            rotation: Quat::IDENTITY,
        }
    }
}

/// Linear velocity
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Velocity(pub Vec3);

/// Name component for debugging
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Name(pub String);

impl Name {
    /// Create a name
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }
}

/// Path-following state of a moving body
#[derive(Debug, Clone, PartialEq)]
pub struct Navigator {
    /// Final destination, `None` when idle
    pub destination: Option<Vec3>,
    /// Remaining waypoints
    pub path: Vec<Vec3>,
    /// Top speed
    pub speed: f32,
    /// Halted by `stop` until `resume`
    pub stopped: bool,
    /// Navigation switched off entirely
    pub enabled: bool,
}

impl Navigator {
    /// Idle navigator with a top speed
    #[must_use]
    pub fn new(speed: f32) -> Self {
        Self {
            destination: None,
            path: Vec::new(),
            speed,
            stopped: false,
            enabled: true,
        }
    }

    /// Check whether the body should move this step
    #[must_use]
    pub fn is_moving(&self) -> bool {
        self.enabled && !self.stopped && !self.path.is_empty()
    }
}

/// Health pool
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Vitals {
    /// Current health
    pub current: f32,
    /// Maximum health
    pub max: f32,
    /// Immune to damage
    pub invulnerable: bool,
}

impl Vitals {
    /// Full health pool
    #[must_use]
    pub fn new(max: f32) -> Self {
        Self {
            current: max,
            max,
            invulnerable: false,
        }
    }

    /// Check if any health remains
    #[must_use]
    pub fn is_alive(&self) -> bool {
        self.current > 0.0
    }
}

/// Marks an entity agents can see and hear
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Perceivable {
    /// Hearing range multiplier
    pub noise: f32,
    /// Target priority
    pub priority: i32,
}

impl Default for Perceivable {
    fn default() -> Self {
        Self {
            noise: 1.0,
            priority: 0,
        }
    }
}

/// Physics body owned by an entity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Body(pub RigidBodyHandle);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_look_at_flat() {
        let mut transform = Transform::from_position(Vec3::new(1.0, 0.0, 1.0));
        assert!(transform.forward().distance(Vec3::NEG_Z) < 1e-5);

        transform.look_at_flat(Vec3::new(5.0, 3.0, 1.0));
        assert!(transform.forward().distance(Vec3::X) < 1e-5);

        // Looking at its own position keeps the old facing
        transform.look_at_flat(Vec3::new(1.0, 0.0, 1.0));
        assert!(transform.forward().distance(Vec3::X) < 1e-5);
    }

    #[test]
    fn test_navigator_moving() {
        let mut navigator = Navigator::new(3.0);
        assert!(!navigator.is_moving());
        navigator.path.push(Vec3::X);
        assert!(navigator.is_moving());
        navigator.stopped = true;
        assert!(!navigator.is_moving());
    }

    #[test]
    fn test_vitals() {
        let mut vitals = Vitals::new(50.0);
        assert!(vitals.is_alive());
        vitals.current = 0.0;
        assert!(!vitals.is_alive());
    }
}
