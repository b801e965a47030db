//! Agent blackboard
//!
//! [`AgentContext`] holds every piece of mutable per-agent data the behavior
//! states read and write. States themselves are shared singletons, so nothing
//! agent-specific may live anywhere else.

use std::cell::RefCell;
use std::rc::Rc;

use glam::Vec3;
use hecs::Entity;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use super::archetype::{AbilityDescriptor, Archetype};
use super::capabilities::{
    AbilityExecutor, Animator, Capabilities, Health, LandmarkRegistry, Movement, SpatialQuery,
};
use crate::core::AgentEvent;

/// Sub-phase of the Attack state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AttackPhase {
    /// Winding up; the ability has not fired yet
    #[default]
    Windup,
    /// The ability fired; short fixed window
    Execute,
    /// Cooling down before the next decision
    Recovery,
}

/// Requests the agent makes of its host.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AgentCommand {
    /// Remove the agent once `delay` seconds have passed.
    ScheduleDespawn {
        /// Seconds until removal
        delay: f32,
    },
}

/// Shared, ordered event outbox for one agent.
pub type EventOutbox = Rc<RefCell<Vec<AgentEvent>>>;

/// Per-agent blackboard shared by all behavior states.
pub struct AgentContext {
    /// Identity of the agent
    id: Entity,
    /// Static configuration
    archetype: Rc<Archetype>,

    // ------------------------------------------------------------------
    // Capabilities
    // ------------------------------------------------------------------
    /// Movement for the agent's body
    pub movement: Box<dyn Movement>,
    /// Health pool
    pub health: Box<dyn Health>,
    /// Animation triggers
    pub animator: Box<dyn Animator>,
    /// Ability execution
    pub abilities: Box<dyn AbilityExecutor>,
    /// Spatial queries
    pub spatial: Rc<dyn SpatialQuery>,
    /// Landmark lookups
    pub landmarks: Option<Rc<dyn LandmarkRegistry>>,
    /// Deterministic per-agent randomness
    pub rng: ChaCha8Rng,

    // ------------------------------------------------------------------
    // Clock
    // ------------------------------------------------------------------
    /// Simulated time of the current tick
    pub now: f32,
    /// Delta of the current tick
    pub delta: f32,
    /// Time the current state was entered
    pub state_entered_at: f32,

    // ------------------------------------------------------------------
    // Target
    // ------------------------------------------------------------------
    /// Primary target chosen by perception
    pub target: Option<Entity>,
    /// Last position the target was sensed at
    pub last_known_target_position: Option<Vec3>,
    /// Seconds since the target was last seen or heard
    pub time_since_target_sensed: f32,
    /// Whether the target is currently in sight
    pub target_visible: bool,
    /// Target abandoned by a state, for perception to forget
    pub dropped_target: Option<Entity>,

    // ------------------------------------------------------------------
    // Combat
    // ------------------------------------------------------------------
    /// Time of the last completed attack
    pub last_attack_time: Option<f32>,
    /// Ability selected for the current attack
    pub active_ability: Option<AbilityDescriptor>,
    /// Attack sub-phase
    pub attack_phase: AttackPhase,
    /// Seconds spent in the attack sub-phase
    pub attack_phase_timer: f32,
    /// Whether the ability already fired during this attack
    pub ability_executed: bool,
    /// Group permission to start attacks
    pub attack_permitted: bool,
    /// Group-assigned destination used instead of the target position
    pub tactical_destination: Option<Vec3>,

    // ------------------------------------------------------------------
    // Movement timers
    // ------------------------------------------------------------------
    /// Spawn position, centre of patrols
    pub home: Vec3,
    /// Seconds spent idle
    pub idle_timer: f32,
    /// Seconds spent on the current patrol leg
    pub patrol_timer: f32,
    /// Seconds since the last re-path
    pub path_update_timer: f32,
    /// Seconds without meaningful displacement
    pub stuck_timer: f32,
    /// Position sampled for stuck detection
    pub last_position_sample: Vec3,
    /// Point queued for investigation
    pub pending_investigation: Option<Vec3>,
    /// Point currently being investigated
    pub investigate_destination: Option<Vec3>,
    /// Time the investigated point was reached
    pub investigate_arrived_at: Option<f32>,
    /// Facing on arrival, centre of the look-around sweep
    pub investigate_heading: Option<Vec3>,
    /// Position being fled from
    pub flee_from: Option<Vec3>,
    /// Seconds since the last flee destination pick
    pub flee_repick_timer: f32,

    // ------------------------------------------------------------------
    // Boss phases
    // ------------------------------------------------------------------
    /// Committed phase (0 = base)
    pub current_phase: usize,
    /// Phase being transitioned into
    pub target_phase: usize,
    /// A phase transition has been requested and not yet committed
    pub phase_transition_pending: bool,
    /// Speed multiplier of the committed phase
    pub speed_multiplier: f32,
    /// Damage multiplier of the committed phase
    pub damage_multiplier: f32,

    /// Events for observers
    outbox: EventOutbox,
    /// Requests for the host
    commands: Vec<AgentCommand>,
}

impl AgentContext {
    /// Build a fresh blackboard.
    pub fn new(id: Entity, archetype: Rc<Archetype>, capabilities: Capabilities, seed: u64) -> Self {
        let Capabilities {
            movement,
            health,
            animator,
            abilities,
            spatial,
            landmarks,
        } = capabilities;
        let home = movement.position();

        Self {
            id,
            archetype,
            movement,
            health,
            animator,
            abilities,
            spatial,
            landmarks,
            rng: ChaCha8Rng::seed_from_u64(seed),
            now: 0.0,
            delta: 0.0,
            state_entered_at: 0.0,
            target: None,
            last_known_target_position: None,
            time_since_target_sensed: f32::INFINITY,
            target_visible: false,
            dropped_target: None,
            last_attack_time: None,
            active_ability: None,
            attack_phase: AttackPhase::Windup,
            attack_phase_timer: 0.0,
            ability_executed: false,
            attack_permitted: true,
            tactical_destination: None,
            home,
            idle_timer: 0.0,
            patrol_timer: 0.0,
            path_update_timer: 0.0,
            stuck_timer: 0.0,
            last_position_sample: home,
            pending_investigation: None,
            investigate_destination: None,
            investigate_arrived_at: None,
            investigate_heading: None,
            flee_from: None,
            flee_repick_timer: 0.0,
            current_phase: 0,
            target_phase: 0,
            phase_transition_pending: false,
            speed_multiplier: 1.0,
            damage_multiplier: 1.0,
            outbox: Rc::new(RefCell::new(Vec::new())),
            commands: Vec::new(),
        }
    }

    /// Identity of the agent.
    #[must_use]
    pub fn id(&self) -> Entity {
        self.id
    }

    /// Static configuration.
    #[must_use]
    pub fn archetype(&self) -> &Archetype {
        &self.archetype
    }

    /// Shared handle to the static configuration.
    #[must_use]
    pub fn archetype_handle(&self) -> Rc<Archetype> {
        Rc::clone(&self.archetype)
    }

    /// Current position of the agent.
    #[must_use]
    pub fn position(&self) -> Vec3 {
        self.movement.position()
    }

    /// Seconds spent in the current state.
    #[must_use]
    pub fn time_in_state(&self) -> f32 {
        self.now - self.state_entered_at
    }

    /// Mark the start of a new state.
    pub fn begin_state(&mut self) {
        self.state_entered_at = self.now;
    }

    /// Set movement speed as a factor of base speed, including the phase multiplier.
    pub fn set_speed_factor(&mut self, factor: f32) {
        let speed = self.archetype.base_speed * factor * self.speed_multiplier;
        self.movement.set_speed(speed);
    }

    // ------------------------------------------------------------------
    // Target helpers
    // ------------------------------------------------------------------

    /// Check if perception currently supplies a target.
    #[must_use]
    pub fn has_target(&self) -> bool {
        self.target.is_some()
    }

    /// Best known target position: live while visible, otherwise last known.
    #[must_use]
    pub fn target_position(&self) -> Option<Vec3> {
        let live = self
            .target
            .filter(|_| self.target_visible)
            .and_then(|target| self.spatial.position_of(target));
        live.or(self.last_known_target_position)
    }

    /// Distance to the best known target position.
    #[must_use]
    pub fn distance_to_target(&self) -> Option<f32> {
        self.target_position()
            .map(|target| self.spatial.distance(self.position(), target))
    }

    /// Ground-plane direction to the best known target position.
    #[must_use]
    pub fn direction_to_target(&self) -> Option<Vec3> {
        self.target_position().map(|target| {
            let offset = target - self.position();
            Vec3::new(offset.x, 0.0, offset.z).normalize_or_zero()
        })
    }

    /// Abandon the current target; perception forgets it on its next update.
    pub fn clear_target(&mut self) {
        if let Some(target) = self.target.take() {
            self.dropped_target = Some(target);
        }
        self.target_visible = false;
        self.time_since_target_sensed = f32::INFINITY;
    }

    /// Eye position used for line-of-sight checks.
    #[must_use]
    pub fn eye_position(&self) -> Vec3 {
        self.position() + Vec3::Y * self.archetype.perception.eye_height
    }

    /// Check for an unobstructed line between eye height at `from` and the target.
    #[must_use]
    pub fn has_line_of_sight_from(&self, from: Vec3, target: Vec3) -> bool {
        let lift = Vec3::Y * self.archetype.perception.eye_height;
        self.spatial.is_line_clear(from + lift, target + lift, Some(self.id))
    }

    // ------------------------------------------------------------------
    // Ability helpers
    // ------------------------------------------------------------------

    /// Abilities available in the committed phase.
    #[must_use]
    pub fn available_abilities(&self) -> &[AbilityDescriptor] {
        match self.archetype.phase(self.current_phase) {
            Some(phase) if !phase.abilities.is_empty() => &phase.abilities,
            _ => &self.archetype.abilities,
        }
    }

    /// Check whether `ability` is off cooldown.
    #[must_use]
    pub fn is_off_cooldown(&self, ability: &AbilityDescriptor) -> bool {
        self.last_attack_time
            .is_none_or(|last| self.now - last >= ability.cooldown)
    }

    /// First ability whose range band contains `distance` and that is off
    /// cooldown.
    #[must_use]
    pub fn ready_ability(&self, distance: f32) -> Option<&AbilityDescriptor> {
        self.available_abilities()
            .iter()
            .find(|ability| ability.in_range(distance) && self.is_off_cooldown(ability))
    }

    /// Longest range among the available abilities.
    #[must_use]
    pub fn max_attack_range(&self) -> f32 {
        self.available_abilities()
            .iter()
            .map(|ability| ability.range)
            .fold(0.0, f32::max)
    }

    /// Reset the attack sub-state machine to a fresh windup.
    pub fn start_attack(&mut self, ability: Option<AbilityDescriptor>) {
        self.active_ability = ability;
        self.attack_phase = AttackPhase::Windup;
        self.attack_phase_timer = 0.0;
        self.ability_executed = false;
    }

    /// Drop any in-progress attack.
    pub fn clear_attack(&mut self) {
        self.active_ability = None;
        self.attack_phase = AttackPhase::Windup;
        self.attack_phase_timer = 0.0;
        self.ability_executed = false;
    }

    // ------------------------------------------------------------------
    // Outputs
    // ------------------------------------------------------------------

    /// Queue an event for observers.
    pub fn emit(&self, event: AgentEvent) {
        self.outbox.borrow_mut().push(event);
    }

    /// Shared handle to the event outbox.
    #[must_use]
    pub fn outbox(&self) -> EventOutbox {
        Rc::clone(&self.outbox)
    }

    /// Take every queued event.
    pub fn take_events(&self) -> Vec<AgentEvent> {
        std::mem::take(&mut *self.outbox.borrow_mut())
    }

    /// Queue a request for the host.
    pub fn command(&mut self, command: AgentCommand) {
        self.commands.push(command);
    }

    /// Take every queued host request.
    pub fn take_commands(&mut self) -> Vec<AgentCommand> {
        std::mem::take(&mut self.commands)
    }
}

impl std::fmt::Debug for AgentContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentContext")
            .field("id", &self.id)
            .field("archetype", &self.archetype.name)
            .field("target", &self.target)
            .field("attack_phase", &self.attack_phase)
            .field("current_phase", &self.current_phase)
            .finish_non_exhaustive()
    }
}
