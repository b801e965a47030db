//! Capability interfaces consumed by the behavior core
//!
//! The AI never talks to physics, navigation, health or animation systems
//! directly. Each agent is handed boxed implementations of these traits, which
//! keeps the state library testable with lightweight mocks and lets hosts
//! plug in their own engines.

use std::rc::Rc;

use glam::Vec3;
use hecs::Entity;

use super::archetype::AbilityDescriptor;

/// Filter applied to overlap queries.
#[derive(Debug, Clone, Copy, Default)]
pub struct OverlapFilter {
    /// Entity left out of the results (usually the querying agent)
    pub exclude: Option<Entity>,
}

impl OverlapFilter {
    /// Filter excluding a single entity.
    #[must_use]
    pub fn excluding(entity: Entity) -> Self {
        Self {
            exclude: Some(entity),
        }
    }
}

/// Point-in-time spatial queries against the world.
pub trait SpatialQuery {
    /// Straight-line distance between two points.
    fn distance(&self, a: Vec3, b: Vec3) -> f32 {
        a.distance(b)
    }

    /// Distance along `from -> to` of the first blocking hit, ignoring
    /// colliders owned by `ignore`. `None` means the segment is clear.
    fn first_obstruction(&self, from: Vec3, to: Vec3, ignore: Option<Entity>) -> Option<f32>;

    /// Check whether nothing blocks the segment before `to`.
    fn is_line_clear(&self, from: Vec3, to: Vec3, ignore: Option<Entity>) -> bool {
        let length = from.distance(to);
        self.first_obstruction(from, to, ignore)
            .is_none_or(|hit| hit >= length)
    }

    /// Perceivable entities within `radius` of `center`.
    fn overlap_sphere(&self, center: Vec3, radius: f32, filter: OverlapFilter) -> Vec<Entity>;

    /// Closest traversable point within `search_radius`, if any.
    fn nearest_traversable(&self, point: Vec3, search_radius: f32) -> Option<Vec3>;

    /// Current position of an entity, `None` once it no longer exists.
    fn position_of(&self, entity: Entity) -> Option<Vec3>;

    /// Loudness multiplier applied to hearing range.
    fn noise_level(&self, _entity: Entity) -> f32 {
        1.0
    }

    /// Target priority used when scoring perception candidates.
    fn target_priority(&self, _entity: Entity) -> i32 {
        0
    }

    /// Check whether an entity handle still refers to something.
    fn is_valid(&self, entity: Entity) -> bool {
        self.position_of(entity).is_some()
    }
}

/// Movement and navigation for one agent body.
pub trait Movement {
    /// Current position.
    fn position(&self) -> Vec3;

    /// Facing direction on the ground plane.
    fn forward(&self) -> Vec3;

    /// Start moving toward `point`. Returns `false` if no route exists.
    fn set_destination(&mut self, point: Vec3) -> bool;

    /// Current destination, if any.
    fn destination(&self) -> Option<Vec3>;

    /// Halt in place and clear the destination.
    fn stop(&mut self);

    /// Allow movement again after `stop`.
    fn resume(&mut self);

    /// Check whether the agent is within `threshold` of its destination.
    fn has_reached_destination(&self, threshold: f32) -> bool;

    /// Set the movement speed.
    fn set_speed(&mut self, speed: f32);

    /// Current movement speed.
    fn speed(&self) -> f32;

    /// Rotate in place toward a point.
    fn face_towards(&mut self, point: Vec3);

    /// Enable or disable navigation entirely.
    fn set_enabled(&mut self, enabled: bool);

    /// Toggle the solid (non-trigger) colliders of the body.
    fn set_solid(&mut self, solid: bool);
}

/// Health pool of one agent.
pub trait Health {
    /// Current health.
    fn current(&self) -> f32;

    /// Maximum health.
    fn max(&self) -> f32;

    /// Current health as a fraction of maximum.
    fn fraction(&self) -> f32 {
        let max = self.max();
        if max > 0.0 {
            (self.current() / max).clamp(0.0, 1.0)
        } else {
            0.0
        }
    }

    /// Check if any health remains.
    fn is_alive(&self) -> bool {
        self.current() > 0.0
    }

    /// Toggle damage immunity.
    fn set_invulnerable(&mut self, invulnerable: bool);

    /// Check damage immunity.
    fn is_invulnerable(&self) -> bool;

    /// Apply damage, returning the amount actually removed.
    fn apply_damage(&mut self, amount: f32) -> f32;

    /// Restore health, clamped to maximum.
    fn heal(&mut self, amount: f32);
}

/// Fire-and-forget animation triggers.
pub trait Animator {
    /// Fire a named trigger.
    fn fire_trigger(&mut self, name: &str);
}

/// Side-effecting ability execution.
pub trait AbilityExecutor {
    /// Execute an ability once. Damage resolution belongs to the executor.
    fn execute(
        &mut self,
        ability: &AbilityDescriptor,
        source: Entity,
        target: Option<Entity>,
        damage_multiplier: f32,
    );

    /// Cancel anything still in flight.
    fn interrupt(&mut self) {}
}

/// Kinds of registered landmarks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LandmarkKind {
    /// Safe spot fleeing agents head for
    Refuge,
    /// Resupply point
    Depot,
}

/// Queryable registry for "nearest landmark of kind X" lookups.
pub trait LandmarkRegistry {
    /// Closest landmark of `kind` within `max_distance` of `from`.
    fn nearest(&self, kind: LandmarkKind, from: Vec3, max_distance: f32) -> Option<Vec3>;
}

/// Everything an agent needs from its host.
pub struct Capabilities {
    /// Movement for the agent's body
    pub movement: Box<dyn Movement>,
    /// The agent's health pool
    pub health: Box<dyn Health>,
    /// Animation triggers
    pub animator: Box<dyn Animator>,
    /// Ability execution
    pub abilities: Box<dyn AbilityExecutor>,
    /// Shared spatial queries
    pub spatial: Rc<dyn SpatialQuery>,
    /// Optional landmark lookups
    pub landmarks: Option<Rc<dyn LandmarkRegistry>>,
}
