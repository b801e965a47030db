//! Reference arena
//!
//! A small headless world that implements the capability traits the agent
//! core consumes: a hecs world for entity data, rapier for sight lines and
//! proximity, and a navigation grid for paths.

use std::cell::RefCell;

use glam::Vec3;
use hecs::{Entity, World};

use super::components::{Body, Name, Navigator, Perceivable, Transform, Velocity, Vitals};
use crate::ai::{LandmarkKind, LandmarkRegistry, OverlapFilter, SpatialQuery};
use crate::nav::{Arrive, NavGrid, Seek, SteeringBehavior};
use crate::physics::Physics;

/// Capsule radius of every body.
const BODY_RADIUS: f32 = 0.4;
/// Capsule half height of every body.
const BODY_HALF_HEIGHT: f32 = 0.5;
/// Acceleration used by path-following steering.
const MAX_ACCELERATION: f32 = 40.0;
/// Distance at which a waypoint counts as reached.
const WAYPOINT_RADIUS: f32 = 0.3;
/// Extra reach granted when resolving hits.
const HIT_SLACK: f32 = 0.5;

/// Damage waiting to be applied by the host.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PendingHit {
    /// Attacker
    pub source: Entity,
    /// Victim
    pub target: Entity,
    /// Damage after multipliers
    pub damage: f32,
    /// Reach of the ability that produced the hit
    pub range: f32,
}

/// Shared headless world.
pub struct Arena {
    world: RefCell<World>,
    physics: RefCell<Physics>,
    grid: NavGrid,
    landmarks: Vec<(LandmarkKind, Vec3)>,
    triggers: RefCell<Vec<(Entity, String)>>,
    hits: RefCell<Vec<PendingHit>>,
}

impl Arena {
    /// Create an empty square arena of `half_extent` around the origin.
    #[must_use]
    pub fn new(half_extent: f32, cell_size: f32) -> Self {
        Self {
            world: RefCell::new(World::new()),
            physics: RefCell::new(Physics::with_gravity(Vec3::ZERO)),
            grid: NavGrid::centered(half_extent, cell_size),
            landmarks: Vec::new(),
            triggers: RefCell::new(Vec::new()),
            hits: RefCell::new(Vec::new()),
        }
    }

    /// Add an axis-aligned wall that blocks both sight and navigation.
    pub fn add_wall(&mut self, center: Vec3, half_extents: Vec3) {
        self.physics.get_mut().add_static_box(center, half_extents);
        self.grid
            .block_box(center, half_extents + Vec3::splat(BODY_RADIUS));
    }

    /// Register a landmark.
    pub fn add_landmark(&mut self, kind: LandmarkKind, position: Vec3) {
        self.landmarks.push((kind, position));
    }

    /// Navigation grid.
    #[must_use]
    pub fn grid(&self) -> &NavGrid {
        &self.grid
    }

    /// Spawn an agent body.
    pub fn spawn_agent(&self, name: &str, position: Vec3, max_health: f32, speed: f32) -> Entity {
        let entity = self.world.borrow_mut().spawn((
            Name::new(name),
            Transform::from_position(position),
            Velocity::default(),
            Navigator::new(speed),
            Vitals::new(max_health),
        ));
        self.attach_body(entity, position);
        entity
    }

    /// Spawn something agents can perceive and attack.
    pub fn spawn_target(
        &self,
        name: &str,
        position: Vec3,
        max_health: f32,
        speed: f32,
        perceivable: Perceivable,
    ) -> Entity {
        let entity = self.spawn_agent(name, position, max_health, speed);
        if self.world.borrow_mut().insert_one(entity, perceivable).is_err() {
            log::warn!("Failed to mark {entity:?} perceivable");
        }
        entity
    }

    fn attach_body(&self, entity: Entity, position: Vec3) {
        let body = self
            .physics
            .borrow_mut()
            .add_agent_body(entity, position, BODY_RADIUS, BODY_HALF_HEIGHT);
        if self.world.borrow_mut().insert_one(entity, Body(body)).is_err() {
            log::warn!("Failed to attach a body to {entity:?}");
        }
    }

    /// Remove an entity and its body.
    pub fn despawn(&self, entity: Entity) {
        let body = self.component::<Body>(entity);
        if let Some(Body(handle)) = body {
            self.physics.borrow_mut().remove_body(handle);
        }
        if self.world.borrow_mut().despawn(entity).is_err() {
            log::debug!("Despawn of unknown entity {entity:?}");
        }
    }

    /// Copy of one component.
    #[must_use]
    pub fn component<T: hecs::Component + Copy>(&self, entity: Entity) -> Option<T> {
        self.world.borrow().get::<&T>(entity).ok().map(|c| *c)
    }

    /// Mutate one component in place. Returns `None` if it is missing.
    pub fn with_component<T: hecs::Component, R>(
        &self,
        entity: Entity,
        f: impl FnOnce(&mut T) -> R,
    ) -> Option<R> {
        let world = self.world.borrow();
        let mut component = world.get::<&mut T>(entity).ok()?;
        Some(f(&mut component))
    }

    /// Display name of an entity.
    #[must_use]
    pub fn name(&self, entity: Entity) -> Option<String> {
        self.world
            .borrow()
            .get::<&Name>(entity)
            .ok()
            .map(|name| name.0.clone())
    }

    /// Current position, dead or alive.
    #[must_use]
    pub fn position(&self, entity: Entity) -> Option<Vec3> {
        self.component::<Transform>(entity).map(|t| t.position)
    }

    /// Health pool of an entity.
    #[must_use]
    pub fn vitals(&self, entity: Entity) -> Option<Vitals> {
        self.component::<Vitals>(entity)
    }

    /// Damage a non-agent entity directly. Returns the damage dealt.
    pub fn damage(&self, entity: Entity, amount: f32) -> f32 {
        self.with_component::<Vitals, _>(entity, |vitals| {
            if vitals.invulnerable {
                return 0.0;
            }
            let dealt = amount.min(vitals.current).max(0.0);
            vitals.current -= dealt;
            dealt
        })
        .unwrap_or(0.0)
    }

    /// Path-find `entity` to `point`. Returns `false` if no route exists.
    pub fn navigate(&self, entity: Entity, point: Vec3) -> bool {
        let Some(start) = self.position(entity) else {
            return false;
        };
        let Some(path) = crate::nav::find_path(&self.grid, start, point) else {
            return false;
        };
        self.with_component::<Navigator, _>(entity, |navigator| {
            navigator.destination = Some(point);
            navigator.path = path.waypoints;
        })
        .is_some()
    }

    // ------------------------------------------------------------------
    // Simulation
    // ------------------------------------------------------------------

    /// Move every navigating body and step physics.
    pub fn step(&self, dt: f32) {
        let mut moved = Vec::new();
        {
            let mut world = self.world.borrow_mut();
            for (_, (transform, velocity, navigator, body)) in world
                .query_mut::<(&mut Transform, &mut Velocity, &mut Navigator, &Body)>()
            {
                if !navigator.is_moving() {
                    velocity.0 = Vec3::ZERO;
                    continue;
                }
                Self::follow_path(transform, velocity, navigator, dt);
                moved.push((*body, transform.position));
            }
        }

        let mut physics = self.physics.borrow_mut();
        for (Body(handle), position) in moved {
            physics.set_kinematic_position(handle, position);
        }
        physics.step(dt);
    }

    fn follow_path(transform: &mut Transform, velocity: &mut Velocity, navigator: &mut Navigator, dt: f32) {
        let Some(&waypoint) = navigator.path.first() else {
            return;
        };
        let last = navigator.path.len() == 1;
        let steering = if last {
            Arrive::new(waypoint, MAX_ACCELERATION, navigator.speed).calculate(transform.position, velocity.0)
        } else {
            Seek::new(waypoint, navigator.speed, MAX_ACCELERATION).calculate(transform.position, velocity.0)
        };
        velocity.0 = steering.integrate(velocity.0, dt, navigator.speed);

        let remaining = transform.position.distance(waypoint);
        let travel = velocity.0.length() * dt;
        if travel >= remaining || remaining <= WAYPOINT_RADIUS {
            // Snap instead of orbiting the waypoint
            transform.position = waypoint;
            navigator.path.remove(0);
            if navigator.path.is_empty() {
                velocity.0 = Vec3::ZERO;
            }
        } else {
            transform.position += velocity.0 * dt;
        }
        if let Some(next) = navigator.path.first() {
            transform.look_at_flat(*next);
        }
    }

    // ------------------------------------------------------------------
    // Capability plumbing
    // ------------------------------------------------------------------

    /// Record an animation trigger.
    pub fn fire_trigger(&self, entity: Entity, name: &str) {
        log::trace!("{entity:?} trigger {name}");
        self.triggers.borrow_mut().push((entity, name.to_string()));
    }

    /// Take every recorded trigger.
    pub fn take_triggers(&self) -> Vec<(Entity, String)> {
        std::mem::take(&mut *self.triggers.borrow_mut())
    }

    /// Queue a hit for the host to resolve.
    pub fn queue_hit(&self, hit: PendingHit) {
        self.hits.borrow_mut().push(hit);
    }

    /// Drop unresolved hits from one source.
    pub fn cancel_hits(&self, source: Entity) {
        self.hits.borrow_mut().retain(|hit| hit.source != source);
    }

    /// Take the queued hits that still connect.
    ///
    /// A hit connects while both ends exist, the victim is alive and within
    /// reach of the attacker.
    pub fn take_hits(&self) -> Vec<PendingHit> {
        let hits = std::mem::take(&mut *self.hits.borrow_mut());
        hits.into_iter()
            .filter(|hit| {
                let (Some(from), Some(to)) = (self.position(hit.source), self.position_of(hit.target))
                else {
                    return false;
                };
                from.distance(to) <= hit.range + HIT_SLACK
            })
            .collect()
    }

    /// Physics body of an entity.
    #[must_use]
    pub fn body(&self, entity: Entity) -> Option<Body> {
        self.component::<Body>(entity)
    }

    /// Run `f` with the physics world.
    pub fn with_physics<R>(&self, f: impl FnOnce(&mut Physics) -> R) -> R {
        f(&mut self.physics.borrow_mut())
    }
}

impl std::fmt::Debug for Arena {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Arena")
            .field("entities", &self.world.borrow().len())
            .field("landmarks", &self.landmarks.len())
            .finish_non_exhaustive()
    }
}

impl SpatialQuery for Arena {
    fn first_obstruction(&self, from: Vec3, to: Vec3, _ignore: Option<Entity>) -> Option<f32> {
        // Only static geometry occludes, so the ignored body never matters
        let length = from.distance(to);
        self.physics
            .borrow()
            .raycast_static(from, to - from, length)
            .map(|hit| hit.distance)
    }

    fn overlap_sphere(&self, center: Vec3, radius: f32, filter: OverlapFilter) -> Vec<Entity> {
        let found = self.physics.borrow().overlap_sphere(center, radius);
        found
            .into_iter()
            .filter(|entity| Some(*entity) != filter.exclude)
            .filter(|entity| self.component::<Perceivable>(*entity).is_some())
            .filter(|entity| self.position_of(*entity).is_some())
            .collect()
    }

    fn nearest_traversable(&self, point: Vec3, search_radius: f32) -> Option<Vec3> {
        self.grid.nearest_walkable(point, search_radius)
    }

    fn position_of(&self, entity: Entity) -> Option<Vec3> {
        let alive = self.vitals(entity).is_none_or(|vitals| vitals.is_alive());
        if alive { self.position(entity) } else { None }
    }

    fn noise_level(&self, entity: Entity) -> f32 {
        self.component::<Perceivable>(entity).map_or(1.0, |p| p.noise)
    }

    fn target_priority(&self, entity: Entity) -> i32 {
        self.component::<Perceivable>(entity).map_or(0, |p| p.priority)
    }
}

impl LandmarkRegistry for Arena {
    fn nearest(&self, kind: LandmarkKind, from: Vec3, max_distance: f32) -> Option<Vec3> {
        self.landmarks
            .iter()
            .filter(|(k, _)| *k == kind)
            .map(|(_, position)| (*position, position.distance(from)))
            .filter(|(_, distance)| *distance <= max_distance)
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(position, _)| position)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DT: f32 = 0.05;

    fn arena() -> Arena {
        let mut arena = Arena::new(20.0, 1.0);
        arena.add_wall(Vec3::new(0.0, 1.0, -6.0), Vec3::new(3.0, 1.0, 0.5));
        arena.add_landmark(LandmarkKind::Refuge, Vec3::new(15.0, 0.0, 15.0));
        arena.add_landmark(LandmarkKind::Refuge, Vec3::new(-10.0, 0.0, 0.0));
        arena
    }

    #[test]
    fn test_wall_occludes_and_blocks_grid() {
        let arena = arena();
        arena.step(DT);
        let eye = Vec3::new(0.0, 1.5, 0.0);
        assert!(!arena.is_line_clear(eye, Vec3::new(0.0, 1.5, -10.0), None));
        assert!(arena.is_line_clear(eye, Vec3::new(0.0, 1.5, 10.0), None));
        assert!(!arena.grid().is_walkable_at(Vec3::new(0.0, 0.0, -6.0)));
    }

    #[test]
    fn test_overlap_only_reports_living_perceivables() {
        let arena = arena();
        let agent = arena.spawn_agent("grunt", Vec3::ZERO, 50.0, 3.0);
        let player = arena.spawn_target("player", Vec3::new(3.0, 0.0, 0.0), 100.0, 4.0, Perceivable::default());
        arena.step(DT);

        let seen = arena.overlap_sphere(Vec3::ZERO, 10.0, OverlapFilter::excluding(agent));
        assert_eq!(seen, vec![player]);

        arena.damage(player, 500.0);
        assert!(arena.overlap_sphere(Vec3::ZERO, 10.0, OverlapFilter::default()).is_empty());
        assert_eq!(arena.position_of(player), None);
        assert_eq!(arena.position(player), Some(Vec3::new(3.0, 0.0, 0.0)));
    }

    #[test]
    fn test_navigate_and_step() {
        let arena = arena();
        let agent = arena.spawn_agent("runner", Vec3::ZERO, 50.0, 4.0);
        let goal = Vec3::new(0.5, 0.0, -10.5);
        assert!(arena.navigate(agent, goal));

        for _ in 0..200 {
            arena.step(DT);
        }
        let position = arena.position(agent).expect("agent position");
        assert!(position.distance(goal) < 1e-3);
        assert!(!arena.navigate(agent, Vec3::new(0.0, 0.0, -6.0)));
    }

    #[test]
    fn test_nearest_landmark() {
        let arena = arena();
        let refuge = arena.nearest(LandmarkKind::Refuge, Vec3::ZERO, 50.0);
        assert_eq!(refuge, Some(Vec3::new(-10.0, 0.0, 0.0)));
        assert_eq!(arena.nearest(LandmarkKind::Refuge, Vec3::ZERO, 5.0), None);
        assert_eq!(arena.nearest(LandmarkKind::Depot, Vec3::ZERO, 50.0), None);
    }

    #[test]
    fn test_hits_need_reach() {
        let arena = arena();
        let attacker = arena.spawn_agent("grunt", Vec3::ZERO, 50.0, 3.0);
        let near = arena.spawn_target("near", Vec3::new(1.5, 0.0, 0.0), 100.0, 0.0, Perceivable::default());
        let far = arena.spawn_target("far", Vec3::new(9.0, 0.0, 0.0), 100.0, 0.0, Perceivable::default());

        for target in [near, far] {
            arena.queue_hit(PendingHit {
                source: attacker,
                target,
                damage: 10.0,
                range: 2.0,
            });
        }
        let hits = arena.take_hits();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].target, near);
        assert!(arena.take_hits().is_empty());

        arena.queue_hit(hits[0]);
        arena.cancel_hits(attacker);
        assert!(arena.take_hits().is_empty());
    }
}
