//! Agent AI module
//!
//! Provides the generic finite state machine, the agent behavior state
//! library, perception, boss phases, group tactics, and the controller and
//! roster that tie them together.

mod archetype;
mod capabilities;
mod context;
mod controller;
mod fsm;
mod group;
mod perception;
mod phase;
mod roster;
mod states;
pub mod tactics;

#[cfg(test)]
mod testing;

pub use archetype::{
    AbilityDescriptor, Archetype, ArchetypeError, BehaviorTuning, BossPhase, PerceptionSettings,
};
pub use capabilities::{
    AbilityExecutor, Animator, Capabilities, Health, LandmarkKind, LandmarkRegistry, Movement,
    OverlapFilter, SpatialQuery,
};
pub use context::{AgentCommand, AgentContext, AttackPhase, EventOutbox};
pub use controller::AgentController;
pub use fsm::{
    FsmError, GenericStateMachine, StateBehavior, StateChange, StateId, StateListener, Transition,
    TransitionTable,
};
pub use group::{AgentGroup, GroupMembers, GroupSettings};
pub use perception::{PerceptionTarget, PerceptionTracker};
pub use phase::{PhaseManager, select_phase};
pub use roster::AgentRoster;
pub use states::{
    AgentBehavior, AgentState, AttackBehavior, BossPhaseBehavior, ChaseBehavior, DeadBehavior,
    FleeBehavior, HurtBehavior, IdleBehavior, InactiveBehavior, InvestigateBehavior,
    PatrolBehavior, PositioningBehavior, SharedBehavior, StateLibrary, default_transition_table,
};
pub use tactics::FlankSide;
