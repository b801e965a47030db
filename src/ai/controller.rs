//! Agent controller
//!
//! Glue that owns one agent's state machine and perception and drives them in
//! a fixed order every tick: death check, perception, boss phase evaluation,
//! then the current state.

use std::rc::Rc;

use glam::Vec3;
use hecs::Entity;

use super::archetype::Archetype;
use super::capabilities::Capabilities;
use super::context::{AgentCommand, AgentContext};
use super::fsm::{FsmError, GenericStateMachine, StateChange};
use super::perception::PerceptionTracker;
use super::phase::PhaseManager;
use super::states::{AgentState, StateLibrary, default_transition_table};
use crate::core::AgentEvent;

/// One simulated agent.
pub struct AgentController {
    machine: GenericStateMachine<AgentState, AgentContext>,
    perception: PerceptionTracker,
}

impl AgentController {
    /// Build an agent that starts in Idle.
    ///
    /// # Errors
    ///
    /// Returns an error if the library lacks the start state.
    pub fn new(
        id: Entity,
        archetype: Rc<Archetype>,
        capabilities: Capabilities,
        library: &StateLibrary,
        seed: u64,
    ) -> Result<Self, FsmError<AgentState>> {
        Self::with_start_state(id, archetype, capabilities, library, seed, AgentState::Idle)
    }

    /// Build an agent that starts in `start` (usually Idle or Inactive).
    ///
    /// # Errors
    ///
    /// Returns an error if the library lacks the start state.
    pub fn with_start_state(
        id: Entity,
        archetype: Rc<Archetype>,
        capabilities: Capabilities,
        library: &StateLibrary,
        seed: u64,
        start: AgentState,
    ) -> Result<Self, FsmError<AgentState>> {
        let context = AgentContext::new(id, archetype, capabilities, seed);
        let outbox = context.outbox();

        let mut machine = GenericStateMachine::new(context);
        for (state, behavior) in library.iter() {
            machine.register_state(state, behavior);
        }
        machine.set_transition_table(default_transition_table());
        machine.subscribe(move |change: &StateChange<AgentState>| {
            outbox.borrow_mut().push(AgentEvent::StateChanged {
                agent: id,
                previous: change.previous,
                next: change.next,
            });
        });
        machine.initialize(start)?;

        Ok(Self {
            machine,
            perception: PerceptionTracker::new(),
        })
    }

    /// Advance the agent to simulated time `now`.
    pub fn tick(&mut self, now: f32, dt: f32) {
        {
            let ctx = self.machine.context_mut();
            ctx.now = now;
            ctx.delta = dt;
        }

        let Some(state) = self.machine.current() else {
            return;
        };
        if state == AgentState::Dead {
            return;
        }
        if !self.machine.context().health.is_alive() {
            self.kill();
            return;
        }
        if state == AgentState::Inactive || self.machine.is_paused() {
            return;
        }

        self.perception.update(self.machine.context_mut());

        if state != AgentState::BossPhaseTransition
            && PhaseManager::evaluate(self.machine.context_mut())
        {
            if let Err(err) = self.machine.force_transition(AgentState::BossPhaseTransition) {
                log::error!("{:?} could not enter BossPhaseTransition: {err}", self.id());
                PhaseManager::abort(self.machine.context_mut());
            }
        }

        self.machine.tick();
    }

    /// Run the fixed-timestep hook of the current state.
    pub fn fixed_tick(&mut self) {
        self.machine.fixed_tick();
    }

    fn kill(&mut self) {
        if self.machine.is_in_state(AgentState::Dead) {
            return;
        }
        if let Err(err) = self.machine.force_transition(AgentState::Dead) {
            log::error!("{:?} could not enter Dead: {err}", self.id());
        }
    }

    // ------------------------------------------------------------------
    // External entry points
    // ------------------------------------------------------------------

    /// Apply damage, optionally revealing its source to perception.
    ///
    /// Returns the damage actually dealt.
    pub fn take_damage(&mut self, amount: f32, source: Option<Entity>) -> f32 {
        if self.is_dead() {
            return 0.0;
        }
        let dealt = self.machine.context_mut().health.apply_damage(amount);

        if let Some(source) = source {
            let ctx = self.machine.context();
            if let Some(position) = ctx.spatial.position_of(source) {
                let (now, origin) = (ctx.now, ctx.position());
                self.perception.alert(source, position, now, origin);
            }
        }

        if !self.machine.context().health.is_alive() {
            self.kill();
        } else if dealt > 0.0 && self.machine.context().archetype().can_stagger {
            self.stagger();
        }
        dealt
    }

    fn stagger(&mut self) {
        let Some(state) = self.machine.current() else {
            return;
        };
        if state == AgentState::Hurt {
            // Restart the stagger
            let _ = self.machine.force_transition(AgentState::Hurt);
        } else if self.machine.transition_table().allows(state, AgentState::Hurt) {
            let _ = self.machine.request_transition(AgentState::Hurt);
        }
    }

    /// Restore health.
    pub fn heal(&mut self, amount: f32) {
        if !self.is_dead() {
            self.machine.context_mut().health.heal(amount);
        }
    }

    /// Report a disturbance at `position`.
    ///
    /// A known source becomes a heard target; an anonymous noise is queued
    /// for investigation.
    pub fn alert_to_position(&mut self, position: Vec3, source: Option<Entity>) {
        let ctx = self.machine.context_mut();
        match source {
            Some(source) => {
                let (now, origin) = (ctx.now, ctx.position());
                self.perception.alert(source, position, now, origin);
            }
            None => ctx.pending_investigation = Some(position),
        }
    }

    /// Queue a point for the agent to investigate when it is next free.
    pub fn investigate(&mut self, position: Vec3) {
        self.machine.context_mut().pending_investigation = Some(position);
    }

    /// Wake an inactive agent.
    ///
    /// # Errors
    ///
    /// Returns an error if the agent is not in a state that may go Idle.
    pub fn activate(&mut self) -> Result<(), FsmError<AgentState>> {
        if self.machine.is_in_state(AgentState::Inactive) {
            self.machine.request_transition(AgentState::Idle)
        } else {
            Ok(())
        }
    }

    /// Put a living agent to sleep.
    ///
    /// # Errors
    ///
    /// Returns an error if the agent is dead.
    pub fn deactivate(&mut self) -> Result<(), FsmError<AgentState>> {
        match self.machine.current() {
            Some(AgentState::Dead) => Err(FsmError::InvalidTransition {
                from: AgentState::Dead,
                to: AgentState::Inactive,
            }),
            Some(AgentState::Inactive) => Ok(()),
            _ => {
                self.perception.clear();
                self.machine.context_mut().clear_target();
                self.machine.force_transition(AgentState::Inactive)
            }
        }
    }

    /// Suspend ticking without changing state.
    pub fn pause(&mut self) {
        self.machine.pause();
    }

    /// Resume ticking.
    pub fn resume(&mut self) {
        self.machine.resume();
    }

    /// Subscribe to accepted state changes.
    pub fn subscribe(&mut self, listener: impl FnMut(&StateChange<AgentState>) + 'static) {
        self.machine.subscribe(listener);
    }

    /// Take every event emitted since the last call.
    pub fn take_events(&mut self) -> Vec<AgentEvent> {
        self.machine.context().take_events()
    }

    /// Take every host request made since the last call.
    pub fn take_commands(&mut self) -> Vec<AgentCommand> {
        self.machine.context_mut().take_commands()
    }

    // ------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------

    /// Identity of the agent.
    #[must_use]
    pub fn id(&self) -> Entity {
        self.machine.context().id()
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> Option<AgentState> {
        self.machine.current()
    }

    /// Previous state.
    #[must_use]
    pub fn previous_state(&self) -> Option<AgentState> {
        self.machine.previous()
    }

    /// Check whether the agent is dead.
    #[must_use]
    pub fn is_dead(&self) -> bool {
        self.machine.is_in_state(AgentState::Dead)
    }

    /// Current primary target.
    #[must_use]
    pub fn target(&self) -> Option<Entity> {
        self.machine.context().target
    }

    /// Distance to the best known target position.
    #[must_use]
    pub fn distance_to_target(&self) -> Option<f32> {
        self.machine.context().distance_to_target()
    }

    /// Ground-plane direction to the best known target position.
    #[must_use]
    pub fn direction_to_target(&self) -> Option<Vec3> {
        self.machine.context().direction_to_target()
    }

    /// Committed boss phase (0 = base).
    #[must_use]
    pub fn current_phase(&self) -> usize {
        self.machine.context().current_phase
    }

    /// Shared blackboard.
    #[must_use]
    pub fn context(&self) -> &AgentContext {
        self.machine.context()
    }

    /// Mutable blackboard, for group coordination and tooling.
    pub fn context_mut(&mut self) -> &mut AgentContext {
        self.machine.context_mut()
    }

    /// Perception memory.
    #[must_use]
    pub fn perception(&self) -> &PerceptionTracker {
        &self.perception
    }

    /// Underlying state machine.
    #[must_use]
    pub fn machine(&self) -> &GenericStateMachine<AgentState, AgentContext> {
        &self.machine
    }
}

impl std::fmt::Debug for AgentController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentController")
            .field("id", &self.id())
            .field("state", &self.state())
            .field("target", &self.target())
            .finish_non_exhaustive()
    }
}
