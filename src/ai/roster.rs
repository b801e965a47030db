//! Agent roster
//!
//! Owns every live [`AgentController`] of a simulation together with the
//! frame event queue and the deferred despawn tasks. Agents are ticked in
//! entity order so runs are reproducible.

use std::collections::BTreeMap;
use std::rc::Rc;

use glam::Vec3;
use hecs::Entity;

use super::archetype::Archetype;
use super::capabilities::Capabilities;
use super::context::AgentCommand;
use super::controller::AgentController;
use super::fsm::FsmError;
use super::group::GroupMembers;
use super::states::{AgentState, StateLibrary};
use crate::core::{AgentEvent, DeferredTasks, EventQueue};

/// Deferred work owned by the roster.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RosterTask {
    Despawn,
}

/// Every agent of a simulation.
pub struct AgentRoster {
    agents: BTreeMap<Entity, AgentController>,
    library: StateLibrary,
    events: EventQueue,
    tasks: DeferredTasks<Entity, RosterTask>,
    despawned: Vec<Entity>,
    now: f32,
}

impl AgentRoster {
    /// Create an empty roster using the standard state library.
    #[must_use]
    pub fn new() -> Self {
        Self::with_library(StateLibrary::new())
    }

    /// Create an empty roster with a custom state library.
    #[must_use]
    pub fn with_library(library: StateLibrary) -> Self {
        Self {
            agents: BTreeMap::new(),
            library,
            events: EventQueue::new(),
            tasks: DeferredTasks::new(),
            despawned: Vec::new(),
            now: 0.0,
        }
    }

    /// Spawn an agent that starts in Idle.
    ///
    /// # Errors
    ///
    /// Returns an error if the controller cannot be initialized.
    pub fn spawn(
        &mut self,
        id: Entity,
        archetype: Rc<Archetype>,
        capabilities: Capabilities,
        seed: u64,
    ) -> Result<(), FsmError<AgentState>> {
        self.spawn_in(id, archetype, capabilities, seed, AgentState::Idle)
    }

    /// Spawn an agent in a specific start state.
    ///
    /// # Errors
    ///
    /// Returns an error if the controller cannot be initialized.
    pub fn spawn_in(
        &mut self,
        id: Entity,
        archetype: Rc<Archetype>,
        capabilities: Capabilities,
        seed: u64,
        start: AgentState,
    ) -> Result<(), FsmError<AgentState>> {
        let name = archetype.name.clone();
        let controller = AgentController::with_start_state(
            id,
            archetype,
            capabilities,
            &self.library,
            seed,
            start,
        )
        .inspect_err(|err| log::error!("Failed to spawn {name} as {id:?}: {err}"))?;

        if self.agents.insert(id, controller).is_some() {
            log::warn!("Replaced existing agent {id:?}");
        }
        log::debug!("Spawned {name} as {id:?} in {start}");
        Ok(())
    }

    /// Advance every agent to simulated time `now`.
    ///
    /// Events emitted during this tick become readable after the next one.
    pub fn tick(&mut self, now: f32, dt: f32) {
        self.now = now;
        self.events.swap();

        for (id, agent) in &mut self.agents {
            agent.tick(now, dt);
            self.events.extend(agent.take_events());
            for command in agent.take_commands() {
                match command {
                    AgentCommand::ScheduleDespawn { delay } => {
                        self.tasks.schedule(*id, now + delay, RosterTask::Despawn);
                    }
                }
            }
        }

        for task in self.tasks.run_due(now) {
            self.run_task(task.key, task.action);
        }
    }

    /// Run the fixed-timestep hook of every agent.
    pub fn fixed_tick(&mut self) {
        for agent in self.agents.values_mut() {
            agent.fixed_tick();
            self.events.extend(agent.take_events());
        }
    }

    fn run_task(&mut self, id: Entity, task: RosterTask) {
        match task {
            RosterTask::Despawn => {
                // The agent may have been removed or revived since scheduling
                if !self.agents.get(&id).is_some_and(AgentController::is_dead) {
                    log::debug!("Skipping despawn of {id:?}: no longer dead");
                    return;
                }
                self.agents.remove(&id);
                self.events.push(AgentEvent::Despawned { agent: id });
                self.despawned.push(id);
                log::debug!("Despawned {id:?}");
            }
        }
    }

    /// Damage one agent. Returns the damage dealt, `None` if it is unknown.
    pub fn take_damage(&mut self, id: Entity, amount: f32, source: Option<Entity>) -> Option<f32> {
        let agent = self.agents.get_mut(&id)?;
        let dealt = agent.take_damage(amount, source);
        self.events.extend(agent.take_events());
        Some(dealt)
    }

    /// Run every pending task immediately, then drop all remaining agents.
    ///
    /// Returns the entities the host should destroy.
    pub fn shutdown(&mut self) -> Vec<Entity> {
        for task in self.tasks.drain_all() {
            self.run_task(task.key, task.action);
        }
        let remaining: Vec<Entity> = self.agents.keys().copied().collect();
        self.agents.clear();
        let mut removed = std::mem::take(&mut self.despawned);
        removed.extend(remaining);
        log::info!("Roster shut down, {} agents removed", removed.len());
        removed
    }

    /// Remove an agent immediately, cancelling its pending tasks.
    pub fn remove(&mut self, id: Entity) -> Option<AgentController> {
        self.tasks.cancel_key(&id);
        self.agents.remove(&id)
    }

    /// Agents despawned since the last call, for the host to destroy.
    pub fn take_despawned(&mut self) -> Vec<Entity> {
        std::mem::take(&mut self.despawned)
    }

    /// One agent.
    #[must_use]
    pub fn get(&self, id: Entity) -> Option<&AgentController> {
        self.agents.get(&id)
    }

    /// One agent, mutably.
    pub fn get_mut(&mut self, id: Entity) -> Option<&mut AgentController> {
        self.agents.get_mut(&id)
    }

    /// Agents in tick order.
    pub fn iter(&self) -> impl Iterator<Item = (Entity, &AgentController)> + '_ {
        self.agents.iter().map(|(id, agent)| (*id, agent))
    }

    /// Check if an agent is registered.
    #[must_use]
    pub fn contains(&self, id: Entity) -> bool {
        self.agents.contains_key(&id)
    }

    /// Number of registered agents.
    #[must_use]
    pub fn len(&self) -> usize {
        self.agents.len()
    }

    /// Check if no agent is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }

    /// Events from the previous tick.
    #[must_use]
    pub fn events(&self) -> &EventQueue {
        &self.events
    }

    /// Drain the events from the previous tick.
    pub fn drain_events(&mut self) -> impl Iterator<Item = AgentEvent> + '_ {
        self.events.drain()
    }

    /// Simulated time of the last tick.
    #[must_use]
    pub fn now(&self) -> f32 {
        self.now
    }
}

impl Default for AgentRoster {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for AgentRoster {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentRoster")
            .field("agents", &self.agents.len())
            .field("pending_tasks", &self.tasks.len())
            .field("now", &self.now)
            .finish()
    }
}

impl GroupMembers for AgentRoster {
    fn member_state(&self, member: Entity) -> Option<AgentState> {
        self.agents.get(&member).and_then(AgentController::state)
    }

    fn member_position(&self, member: Entity) -> Option<Vec3> {
        self.agents.get(&member).map(|agent| agent.context().position())
    }

    fn member_health(&self, member: Entity) -> Option<f32> {
        self.agents
            .get(&member)
            .map(|agent| agent.context().health.fraction())
    }

    fn member_target_position(&self, member: Entity) -> Option<Vec3> {
        self.agents
            .get(&member)
            .and_then(|agent| agent.context().target_position())
    }

    fn set_attack_permitted(&mut self, member: Entity, permitted: bool) {
        if let Some(agent) = self.agents.get_mut(&member) {
            agent.context_mut().attack_permitted = permitted;
        }
    }

    fn set_tactical_destination(&mut self, member: Entity, destination: Option<Vec3>) {
        if let Some(agent) = self.agents.get_mut(&member) {
            agent.context_mut().tactical_destination = destination;
        }
    }
}
