//! Arena-backed capabilities
//!
//! Thin handles that route each capability call to the shared [`Arena`].

use std::rc::Rc;

use glam::Vec3;
use hecs::Entity;

use super::arena::{Arena, PendingHit};
use super::components::{Navigator, Transform, Velocity, Vitals};
use crate::ai::{AbilityDescriptor, AbilityExecutor, Animator, Capabilities, Health, Movement};

/// Build the full capability set for an arena entity.
#[must_use]
pub fn arena_capabilities(arena: &Rc<Arena>, entity: Entity) -> Capabilities {
    Capabilities {
        movement: Box::new(ArenaMover::new(Rc::clone(arena), entity)),
        health: Box::new(ArenaHealth::new(Rc::clone(arena), entity)),
        animator: Box::new(ArenaAnimator::new(Rc::clone(arena), entity)),
        abilities: Box::new(ArenaAbilities::new(Rc::clone(arena), entity)),
        spatial: Rc::clone(arena) as Rc<dyn crate::ai::SpatialQuery>,
        landmarks: Some(Rc::clone(arena) as Rc<dyn crate::ai::LandmarkRegistry>),
    }
}

/// Path-following movement for one arena body.
pub struct ArenaMover {
    arena: Rc<Arena>,
    entity: Entity,
}

impl ArenaMover {
    /// Movement handle for `entity`.
    #[must_use]
    pub fn new(arena: Rc<Arena>, entity: Entity) -> Self {
        Self { arena, entity }
    }

    fn navigator<R>(&self, f: impl FnOnce(&mut Navigator) -> R) -> Option<R> {
        self.arena.with_component::<Navigator, _>(self.entity, f)
    }
}

impl Movement for ArenaMover {
    fn position(&self) -> Vec3 {
        self.arena.position(self.entity).unwrap_or(Vec3::ZERO)
    }

    fn forward(&self) -> Vec3 {
        self.arena
            .component::<Transform>(self.entity)
            .map_or(Vec3::NEG_Z, |transform| transform.forward())
    }

    fn set_destination(&mut self, point: Vec3) -> bool {
        self.arena.navigate(self.entity, point)
    }

    fn destination(&self) -> Option<Vec3> {
        self.navigator(|navigator| navigator.destination).flatten()
    }

    fn stop(&mut self) {
        self.navigator(|navigator| {
            navigator.stopped = true;
            navigator.destination = None;
            navigator.path.clear();
        });
        self.arena
            .with_component::<Velocity, _>(self.entity, |velocity| velocity.0 = Vec3::ZERO);
    }

    fn resume(&mut self) {
        self.navigator(|navigator| navigator.stopped = false);
    }

    fn has_reached_destination(&self, threshold: f32) -> bool {
        let Some(destination) = self.destination() else {
            return true;
        };
        let position = self.position();
        let flat = Vec3::new(destination.x - position.x, 0.0, destination.z - position.z);
        flat.length() <= threshold
    }

    fn set_speed(&mut self, speed: f32) {
        self.navigator(|navigator| navigator.speed = speed.max(0.0));
    }

    fn speed(&self) -> f32 {
        self.navigator(|navigator| navigator.speed).unwrap_or(0.0)
    }

    fn face_towards(&mut self, point: Vec3) {
        self.arena
            .with_component::<Transform, _>(self.entity, |transform| transform.look_at_flat(point));
    }

    fn set_enabled(&mut self, enabled: bool) {
        self.navigator(|navigator| navigator.enabled = enabled);
        if let Some(body) = self.arena.body(self.entity) {
            self.arena
                .with_physics(|physics| physics.set_body_enabled(body.0, enabled));
        }
    }

    fn set_solid(&mut self, solid: bool) {
        if let Some(body) = self.arena.body(self.entity) {
            self.arena
                .with_physics(|physics| physics.set_body_solid(body.0, solid));
        }
    }
}

/// Health pool stored in the arena.
pub struct ArenaHealth {
    arena: Rc<Arena>,
    entity: Entity,
}

impl ArenaHealth {
    /// Health handle for `entity`.
    #[must_use]
    pub fn new(arena: Rc<Arena>, entity: Entity) -> Self {
        Self { arena, entity }
    }

    fn vitals(&self) -> Vitals {
        self.arena.vitals(self.entity).unwrap_or(Vitals {
            current: 0.0,
            max: 0.0,
            invulnerable: false,
        })
    }
}

impl Health for ArenaHealth {
    fn current(&self) -> f32 {
        self.vitals().current
    }

    fn max(&self) -> f32 {
        self.vitals().max
    }

    fn set_invulnerable(&mut self, invulnerable: bool) {
        self.arena
            .with_component::<Vitals, _>(self.entity, |vitals| vitals.invulnerable = invulnerable);
    }

    fn is_invulnerable(&self) -> bool {
        self.vitals().invulnerable
    }

    fn apply_damage(&mut self, amount: f32) -> f32 {
        self.arena.damage(self.entity, amount)
    }

    fn heal(&mut self, amount: f32) {
        self.arena.with_component::<Vitals, _>(self.entity, |vitals| {
            vitals.current = (vitals.current + amount.max(0.0)).min(vitals.max);
        });
    }
}

/// Animation triggers recorded by the arena.
pub struct ArenaAnimator {
    arena: Rc<Arena>,
    entity: Entity,
}

impl ArenaAnimator {
    /// Animator handle for `entity`.
    #[must_use]
    pub fn new(arena: Rc<Arena>, entity: Entity) -> Self {
        Self { arena, entity }
    }
}

impl Animator for ArenaAnimator {
    fn fire_trigger(&mut self, name: &str) {
        self.arena.fire_trigger(self.entity, name);
    }
}

/// Ability execution that queues hits for the host to resolve.
pub struct ArenaAbilities {
    arena: Rc<Arena>,
    entity: Entity,
}

impl ArenaAbilities {
    /// Executor handle for `entity`.
    #[must_use]
    pub fn new(arena: Rc<Arena>, entity: Entity) -> Self {
        Self { arena, entity }
    }
}

impl AbilityExecutor for ArenaAbilities {
    fn execute(
        &mut self,
        ability: &AbilityDescriptor,
        source: Entity,
        target: Option<Entity>,
        damage_multiplier: f32,
    ) {
        let Some(target) = target else {
            log::debug!("{source:?} used {} on nothing", ability.name);
            return;
        };
        self.arena.queue_hit(PendingHit {
            source,
            target,
            damage: ability.damage * damage_multiplier,
            range: ability.range,
        });
    }

    fn interrupt(&mut self) {
        self.arena.cancel_hits(self.entity);
    }
}
