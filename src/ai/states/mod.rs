//! Behavior state library
//!
//! One stateless behavior per [`AgentState`]. Every behavior reads and writes
//! only the [`AgentContext`] it is handed, so a single [`StateLibrary`] can be
//! shared by every agent in a simulation.

mod attack;
mod boss_phase;
mod chase;
mod dead;
mod flee;
mod hurt;
mod idle;
mod inactive;
mod investigate;
mod patrol;
mod positioning;

use std::fmt;
use std::rc::Rc;

use glam::{Quat, Vec3};
use serde::{Deserialize, Serialize};

use super::context::AgentContext;
use super::fsm::{StateBehavior, Transition, TransitionTable};

pub use attack::AttackBehavior;
pub use boss_phase::BossPhaseBehavior;
pub use chase::ChaseBehavior;
pub use dead::DeadBehavior;
pub use flee::FleeBehavior;
pub use hurt::HurtBehavior;
pub use idle::IdleBehavior;
pub use inactive::InactiveBehavior;
pub use investigate::InvestigateBehavior;
pub use patrol::PatrolBehavior;
pub use positioning::PositioningBehavior;

/// Behavior states of an agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum AgentState {
    /// Dormant, navigation disabled
    Inactive,
    /// Standing still, waiting for something to do
    Idle,
    /// Wandering around home
    Patrol,
    /// Checking out a point of interest
    Investigate,
    /// Closing in on the target
    Chase,
    /// Finding a spot with a clear shot
    Positioning,
    /// Executing an ability
    Attack,
    /// Staggered by damage
    Hurt,
    /// Running from a threat
    Flee,
    /// Switching boss phases
    BossPhaseTransition,
    /// Dead, waiting for removal
    Dead,
}

impl AgentState {
    /// Every state, in declaration order.
    pub const ALL: [AgentState; 11] = [
        AgentState::Inactive,
        AgentState::Idle,
        AgentState::Patrol,
        AgentState::Investigate,
        AgentState::Chase,
        AgentState::Positioning,
        AgentState::Attack,
        AgentState::Hurt,
        AgentState::Flee,
        AgentState::BossPhaseTransition,
        AgentState::Dead,
    ];

    /// Display name.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Inactive => "Inactive",
            Self::Idle => "Idle",
            Self::Patrol => "Patrol",
            Self::Investigate => "Investigate",
            Self::Chase => "Chase",
            Self::Positioning => "Positioning",
            Self::Attack => "Attack",
            Self::Hurt => "Hurt",
            Self::Flee => "Flee",
            Self::BossPhaseTransition => "BossPhaseTransition",
            Self::Dead => "Dead",
        }
    }

    /// Check whether the agent is actively fighting its target.
    #[must_use]
    pub fn is_engaged(self) -> bool {
        matches!(self, Self::Chase | Self::Positioning | Self::Attack)
    }
}

impl fmt::Display for AgentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Agent-specific state hooks.
///
/// Implementors get a [`StateBehavior`] for free; entering a state records
/// the entry time in the context before `on_enter` runs.
pub trait AgentBehavior {
    /// State this behavior backs.
    const STATE: AgentState;

    /// Called after the entry time is recorded.
    fn on_enter(&self, _ctx: &mut AgentContext) {}

    /// Per-frame update.
    fn on_update(&self, ctx: &mut AgentContext) -> Transition<AgentState>;

    /// Fixed-timestep update.
    fn on_fixed_update(&self, _ctx: &mut AgentContext) -> Transition<AgentState> {
        Transition::None
    }

    /// Called when leaving the state.
    fn on_exit(&self, _ctx: &mut AgentContext) {}
}

impl<T: AgentBehavior> StateBehavior<AgentState, AgentContext> for T {
    fn name(&self) -> &'static str {
        T::STATE.name()
    }

    fn enter(&self, ctx: &mut AgentContext) {
        ctx.begin_state();
        self.on_enter(ctx);
    }

    fn update(&self, ctx: &mut AgentContext) -> Transition<AgentState> {
        self.on_update(ctx)
    }

    fn fixed_update(&self, ctx: &mut AgentContext) -> Transition<AgentState> {
        self.on_fixed_update(ctx)
    }

    fn exit(&self, ctx: &mut AgentContext) {
        self.on_exit(ctx);
    }
}

/// Shared behavior object for a state.
pub type SharedBehavior = Rc<dyn StateBehavior<AgentState, AgentContext>>;

/// One shared behavior object per state.
#[derive(Clone)]
pub struct StateLibrary {
    behaviors: Vec<(AgentState, SharedBehavior)>,
}

impl StateLibrary {
    /// Build the standard library.
    #[must_use]
    pub fn new() -> Self {
        let behaviors: Vec<(AgentState, SharedBehavior)> = vec![
            (AgentState::Inactive, Rc::new(InactiveBehavior)),
            (AgentState::Idle, Rc::new(IdleBehavior)),
            (AgentState::Patrol, Rc::new(PatrolBehavior)),
            (AgentState::Investigate, Rc::new(InvestigateBehavior)),
            (AgentState::Chase, Rc::new(ChaseBehavior)),
            (AgentState::Positioning, Rc::new(PositioningBehavior)),
            (AgentState::Attack, Rc::new(AttackBehavior)),
            (AgentState::Hurt, Rc::new(HurtBehavior)),
            (AgentState::Flee, Rc::new(FleeBehavior)),
            (AgentState::BossPhaseTransition, Rc::new(BossPhaseBehavior)),
            (AgentState::Dead, Rc::new(DeadBehavior)),
        ];
        Self { behaviors }
    }

    /// Replace the behavior of one state.
    pub fn replace(&mut self, state: AgentState, behavior: SharedBehavior) {
        match self.behaviors.iter_mut().find(|(s, _)| *s == state) {
            Some(entry) => entry.1 = behavior,
            None => self.behaviors.push((state, behavior)),
        }
    }

    /// Drop the behavior of one state. Agents built afterwards cannot enter it.
    pub fn remove(&mut self, state: AgentState) -> Option<SharedBehavior> {
        let index = self.behaviors.iter().position(|(s, _)| *s == state)?;
        Some(self.behaviors.remove(index).1)
    }

    /// Shared behavior for a state.
    #[must_use]
    pub fn get(&self, state: AgentState) -> Option<SharedBehavior> {
        self.behaviors
            .iter()
            .find(|(s, _)| *s == state)
            .map(|(_, behavior)| Rc::clone(behavior))
    }

    /// Every registered (state, behavior) pair.
    pub fn iter(&self) -> impl Iterator<Item = (AgentState, SharedBehavior)> + '_ {
        self.behaviors
            .iter()
            .map(|(state, behavior)| (*state, Rc::clone(behavior)))
    }
}

impl Default for StateLibrary {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for StateLibrary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.behaviors.iter().map(|(state, _)| state))
            .finish()
    }
}

/// Legal non-forced transitions between agent states.
#[must_use]
pub fn default_transition_table() -> TransitionTable<AgentState> {
    use AgentState::*;

    let mut table = TransitionTable::new();
    table
        .allow(Inactive, Idle)
        .allow_many(Idle, &[Patrol, Investigate, Chase, Hurt, Dead])
        .allow_many(Patrol, &[Idle, Investigate, Chase, Hurt, Dead])
        .allow_many(Investigate, &[Idle, Chase, Hurt, Dead])
        .allow_many(Chase, &[Idle, Attack, Positioning, Hurt, Dead])
        .allow_many(Positioning, &[Idle, Chase, Attack, Hurt, Dead])
        .allow_many(Attack, &[Idle, Chase, Positioning, Hurt, Dead])
        .allow_many(Hurt, &[Idle, Chase, Flee, Dead])
        .allow_many(Flee, &[Idle, Dead])
        .allow_many(BossPhaseTransition, &[Idle, Chase, Dead]);
    table
}

// ============================================================================
// Shared helpers
// ============================================================================

/// Chase if a target is known, otherwise idle.
fn engage_or_idle(ctx: &AgentContext) -> Transition<AgentState> {
    if ctx.has_target() {
        Transition::To(AgentState::Chase)
    } else {
        Transition::To(AgentState::Idle)
    }
}

/// Rotate a ground-plane direction around the up axis.
fn rotate_flat(direction: Vec3, degrees: f32) -> Vec3 {
    Quat::from_rotation_y(degrees.to_radians()) * direction
}

/// Ground-plane unit direction from `from` to `to`, or `fallback` if they coincide.
fn flat_direction(from: Vec3, to: Vec3, fallback: Vec3) -> Vec3 {
    let offset = Vec3::new(to.x - from.x, 0.0, to.z - from.z);
    offset.try_normalize().unwrap_or(fallback)
}

/// Snap `point` onto traversable space and send the agent there.
fn travel_to(ctx: &mut AgentContext, point: Vec3) -> bool {
    let radius = ctx.archetype().tuning.traversable_search_radius;
    match ctx.spatial.nearest_traversable(point, radius) {
        Some(snapped) => ctx.movement.set_destination(snapped),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_library_covers_every_state() {
        let library = StateLibrary::new();
        for state in AgentState::ALL {
            let behavior = library.get(state);
            assert_eq!(behavior.map(|b| b.name()), Some(state.name()));
        }
    }

    #[test]
    fn test_table_shape() {
        use AgentState::*;

        let table = default_transition_table();
        assert!(table.allows(Inactive, Idle));
        assert!(table.allows(Hurt, Flee));
        assert!(!table.allows(Flee, Chase));
        assert!(!table.allows(Idle, Attack));
        assert!(!table.allows(Idle, BossPhaseTransition));
        assert!(!table.allows(Dead, Idle));
        for state in AgentState::ALL {
            if !matches!(state, Inactive | Dead) {
                assert!(table.allows(state, Dead), "{state} cannot reach Dead");
            }
        }
    }

    #[test]
    fn test_rotate_flat() {
        let rotated = rotate_flat(Vec3::X, 90.0);
        assert!(rotated.distance(Vec3::NEG_Z) < 1e-5);
    }
}
