//! Recording capability mocks shared by the AI unit tests.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use glam::Vec3;
use hecs::Entity;
use rustc_hash::FxHashMap;

use super::archetype::{AbilityDescriptor, Archetype};
use super::capabilities::{
    AbilityExecutor, Animator, Capabilities, Health, LandmarkKind, LandmarkRegistry, Movement,
    OverlapFilter, SpatialQuery,
};
use super::context::AgentContext;

thread_local! {
    static HANDLES: RefCell<hecs::World> = RefCell::new(hecs::World::new());
}

/// Spawn `count` entity handles, distinct across the whole test thread.
pub(crate) fn entities(count: usize) -> Vec<Entity> {
    HANDLES.with(|world| {
        let mut world = world.borrow_mut();
        (0..count).map(|_| world.spawn(())).collect()
    })
}

// ============================================================================
// World
// ============================================================================

#[derive(Debug, Clone, Copy)]
pub(crate) struct Prop {
    pub position: Vec3,
    pub noise: f32,
    pub priority: i32,
}

/// Spatial world made of point entities and spherical blockers.
#[derive(Default)]
pub(crate) struct MockWorld {
    pub props: RefCell<FxHashMap<Entity, Prop>>,
    pub blockers: RefCell<Vec<(Vec3, f32)>>,
    pub landmarks: RefCell<Vec<(LandmarkKind, Vec3)>>,
    pub no_traversable: Cell<bool>,
}

impl MockWorld {
    pub fn place(&self, entity: Entity, position: Vec3) {
        self.props.borrow_mut().insert(
            entity,
            Prop {
                position,
                noise: 1.0,
                priority: 0,
            },
        );
    }

    pub fn set_noise(&self, entity: Entity, noise: f32) {
        if let Some(prop) = self.props.borrow_mut().get_mut(&entity) {
            prop.noise = noise;
        }
    }

    pub fn set_priority(&self, entity: Entity, priority: i32) {
        if let Some(prop) = self.props.borrow_mut().get_mut(&entity) {
            prop.priority = priority;
        }
    }

    pub fn remove(&self, entity: Entity) {
        self.props.borrow_mut().remove(&entity);
    }

    pub fn block(&self, center: Vec3, radius: f32) {
        self.blockers.borrow_mut().push((center, radius));
    }
}

impl SpatialQuery for MockWorld {
    fn first_obstruction(&self, from: Vec3, to: Vec3, _ignore: Option<Entity>) -> Option<f32> {
        let length = from.distance(to);
        let dir = (to - from).normalize_or_zero();
        self.blockers
            .borrow()
            .iter()
            .filter_map(|&(center, radius)| {
                let along = (center - from).dot(dir);
                let closest = from + dir * along.clamp(0.0, length);
                (closest.distance(center) <= radius).then(|| along.clamp(0.0, length))
            })
            .min_by(f32::total_cmp)
    }

    fn overlap_sphere(&self, center: Vec3, radius: f32, filter: OverlapFilter) -> Vec<Entity> {
        let mut found: Vec<(Entity, Vec3)> = self
            .props
            .borrow()
            .iter()
            .filter(|(entity, prop)| {
                Some(**entity) != filter.exclude && prop.position.distance(center) <= radius
            })
            .map(|(entity, prop)| (*entity, prop.position))
            .collect();
        found.sort_by_key(|(entity, _)| *entity);
        found.into_iter().map(|(entity, _)| entity).collect()
    }

    fn nearest_traversable(&self, point: Vec3, _search_radius: f32) -> Option<Vec3> {
        (!self.no_traversable.get()).then_some(point)
    }

    fn position_of(&self, entity: Entity) -> Option<Vec3> {
        self.props.borrow().get(&entity).map(|prop| prop.position)
    }

    fn noise_level(&self, entity: Entity) -> f32 {
        self.props.borrow().get(&entity).map_or(1.0, |prop| prop.noise)
    }

    fn target_priority(&self, entity: Entity) -> i32 {
        self.props.borrow().get(&entity).map_or(0, |prop| prop.priority)
    }
}

impl LandmarkRegistry for MockWorld {
    fn nearest(&self, kind: LandmarkKind, from: Vec3, max_distance: f32) -> Option<Vec3> {
        self.landmarks
            .borrow()
            .iter()
            .filter(|(k, p)| *k == kind && p.distance(from) <= max_distance)
            .map(|(_, p)| *p)
            .min_by(|a, b| a.distance(from).total_cmp(&b.distance(from)))
    }
}

// ============================================================================
// Body
// ============================================================================

#[derive(Debug)]
pub(crate) struct Body {
    pub position: Vec3,
    pub forward: Vec3,
    pub destination: Option<Vec3>,
    pub speed: f32,
    pub stopped: bool,
    pub enabled: bool,
    pub solid: bool,
    pub faced: Vec<Vec3>,
    pub reachable: bool,
}

impl Default for Body {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            forward: Vec3::NEG_Z,
            destination: None,
            speed: 0.0,
            stopped: false,
            enabled: true,
            solid: true,
            faced: Vec::new(),
            reachable: true,
        }
    }
}

pub(crate) struct MockMovement(pub Rc<RefCell<Body>>);

impl Movement for MockMovement {
    fn position(&self) -> Vec3 {
        self.0.borrow().position
    }

    fn forward(&self) -> Vec3 {
        self.0.borrow().forward
    }

    fn set_destination(&mut self, point: Vec3) -> bool {
        let mut body = self.0.borrow_mut();
        if !body.reachable {
            return false;
        }
        body.destination = Some(point);
        body.stopped = false;
        true
    }

    fn destination(&self) -> Option<Vec3> {
        self.0.borrow().destination
    }

    fn stop(&mut self) {
        let mut body = self.0.borrow_mut();
        body.destination = None;
        body.stopped = true;
    }

    fn resume(&mut self) {
        self.0.borrow_mut().stopped = false;
    }

    fn has_reached_destination(&self, threshold: f32) -> bool {
        let body = self.0.borrow();
        body.destination
            .is_none_or(|dest| body.position.distance(dest) <= threshold)
    }

    fn set_speed(&mut self, speed: f32) {
        self.0.borrow_mut().speed = speed;
    }

    fn speed(&self) -> f32 {
        self.0.borrow().speed
    }

    fn face_towards(&mut self, point: Vec3) {
        let mut body = self.0.borrow_mut();
        let offset = Vec3::new(point.x - body.position.x, 0.0, point.z - body.position.z);
        if let Some(direction) = offset.try_normalize() {
            body.forward = direction;
        }
        body.faced.push(point);
    }

    fn set_enabled(&mut self, enabled: bool) {
        self.0.borrow_mut().enabled = enabled;
    }

    fn set_solid(&mut self, solid: bool) {
        self.0.borrow_mut().solid = solid;
    }
}

// ============================================================================
// Health, animation, abilities
// ============================================================================

#[derive(Debug)]
pub(crate) struct Vitals {
    pub current: f32,
    pub max: f32,
    pub invulnerable: bool,
}

pub(crate) struct MockHealth(pub Rc<RefCell<Vitals>>);

impl Health for MockHealth {
    fn current(&self) -> f32 {
        self.0.borrow().current
    }

    fn max(&self) -> f32 {
        self.0.borrow().max
    }

    fn set_invulnerable(&mut self, invulnerable: bool) {
        self.0.borrow_mut().invulnerable = invulnerable;
    }

    fn is_invulnerable(&self) -> bool {
        self.0.borrow().invulnerable
    }

    fn apply_damage(&mut self, amount: f32) -> f32 {
        let mut vitals = self.0.borrow_mut();
        if vitals.invulnerable {
            return 0.0;
        }
        let dealt = amount.min(vitals.current).max(0.0);
        vitals.current -= dealt;
        dealt
    }

    fn heal(&mut self, amount: f32) {
        let mut vitals = self.0.borrow_mut();
        vitals.current = (vitals.current + amount).min(vitals.max);
    }
}

pub(crate) struct MockAnimator(pub Rc<RefCell<Vec<String>>>);

impl Animator for MockAnimator {
    fn fire_trigger(&mut self, name: &str) {
        self.0.borrow_mut().push(name.to_string());
    }
}

#[derive(Debug, Default)]
pub(crate) struct AbilityLog {
    pub executed: Vec<(String, Option<Entity>, f32)>,
    pub interrupts: u32,
}

pub(crate) struct MockExecutor(pub Rc<RefCell<AbilityLog>>);

impl AbilityExecutor for MockExecutor {
    fn execute(
        &mut self,
        ability: &AbilityDescriptor,
        _source: Entity,
        target: Option<Entity>,
        damage_multiplier: f32,
    ) {
        self.0
            .borrow_mut()
            .executed
            .push((ability.name.clone(), target, damage_multiplier));
    }

    fn interrupt(&mut self) {
        self.0.borrow_mut().interrupts += 1;
    }
}

// ============================================================================
// Harness
// ============================================================================

/// Handles into the mocks backing one test agent.
pub(crate) struct Mocks {
    pub id: Entity,
    pub world: Rc<MockWorld>,
    pub body: Rc<RefCell<Body>>,
    pub vitals: Rc<RefCell<Vitals>>,
    pub triggers: Rc<RefCell<Vec<String>>>,
    pub abilities: Rc<RefCell<AbilityLog>>,
}

impl Mocks {
    pub fn set_position(&self, position: Vec3) {
        self.body.borrow_mut().position = position;
    }

    pub fn set_health(&self, current: f32) {
        self.vitals.borrow_mut().current = current;
    }

    pub fn fired(&self, trigger: &str) -> bool {
        self.triggers.borrow().iter().any(|t| t == trigger)
    }
}

/// Build capabilities over fresh mocks.
pub(crate) fn capabilities(id: Entity, max_health: f32) -> (Capabilities, Mocks) {
    let world = Rc::new(MockWorld::default());
    let body = Rc::new(RefCell::new(Body::default()));
    let vitals = Rc::new(RefCell::new(Vitals {
        current: max_health,
        max: max_health,
        invulnerable: false,
    }));
    let triggers = Rc::new(RefCell::new(Vec::new()));
    let abilities = Rc::new(RefCell::new(AbilityLog::default()));

    let caps = Capabilities {
        movement: Box::new(MockMovement(Rc::clone(&body))),
        health: Box::new(MockHealth(Rc::clone(&vitals))),
        animator: Box::new(MockAnimator(Rc::clone(&triggers))),
        abilities: Box::new(MockExecutor(Rc::clone(&abilities))),
        spatial: Rc::clone(&world) as Rc<dyn SpatialQuery>,
        landmarks: Some(Rc::clone(&world) as Rc<dyn LandmarkRegistry>),
    };
    let mocks = Mocks {
        id,
        world,
        body,
        vitals,
        triggers,
        abilities,
    };
    (caps, mocks)
}

/// Build a context for a fresh agent at the origin.
pub(crate) fn context(archetype: Archetype) -> (AgentContext, Mocks) {
    let id = entities(1)[0];
    let (caps, mocks) = capabilities(id, archetype.max_health);
    (AgentContext::new(id, Rc::new(archetype), caps, 7), mocks)
}
