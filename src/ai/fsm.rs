//! Finite State Machine for AI Behavior
//!
//! Provides a generic, table-validated state machine for managing AI entity
//! behavior. States are identified by small `Copy` tags and backed by shared,
//! stateless behavior objects; all mutable data lives in the context the
//! machine owns.
//!
//! # Design Principles
//!
//! - **Validated**: Non-forced transitions must be declared in a [`TransitionTable`]
//! - **Stateless States**: One behavior object can serve every machine of a kind
//! - **Observable**: Accepted transitions notify listeners exactly once
//! - **Debuggability**: States have names for logging/debugging
//!
//! # Example
//!
//! ```ignore
//! let mut fsm = GenericStateMachine::new(ctx);
//! fsm.register_state(Light::Red, Rc::new(RedBehavior));
//! fsm.register_state(Light::Green, Rc::new(GreenBehavior));
//! fsm.register_transition(Light::Red, Light::Green);
//!
//! fsm.initialize(Light::Red)?;
//! fsm.tick(); // RedBehavior::update may return Transition::To(Light::Green)
//! ```

use std::collections::BTreeSet;
use std::fmt;
use std::hash::Hash;
use std::rc::Rc;

use rustc_hash::FxHashMap;

// ============================================================================
// State Identifier
// ============================================================================

/// Marker for types usable as state identifiers.
///
/// Identifiers are immutable, totally ordered value tags with no payload.
pub trait StateId: Copy + Eq + Ord + Hash + fmt::Debug + 'static {}

impl<T> StateId for T where T: Copy + Eq + Ord + Hash + fmt::Debug + 'static {}

// ============================================================================
// State Behavior Trait
// ============================================================================

/// Behavior attached to one state identifier.
///
/// Implementations must not keep per-machine data: every call receives the
/// machine's context, which is where mutable data belongs. The lifecycle is:
///
/// 1. `enter()` - Called once when entering this state
/// 2. `update()` / `fixed_update()` - Called each tick while in this state
/// 3. `exit()` - Called once when leaving this state
pub trait StateBehavior<S, C> {
    /// State name for debugging and logging.
    fn name(&self) -> &'static str;

    /// Called when entering this state.
    fn enter(&self, _ctx: &mut C) {}

    /// Called each frame while in this state.
    ///
    /// Returns a `Transition` to indicate whether to stay or change states.
    fn update(&self, ctx: &mut C) -> Transition<S>;

    /// Called on each fixed-timestep tick while in this state.
    fn fixed_update(&self, _ctx: &mut C) -> Transition<S> {
        Transition::None
    }

    /// Called when exiting this state.
    fn exit(&self, _ctx: &mut C) {}
}

// ============================================================================
// Transition
// ============================================================================

/// Represents a state transition decision.
///
/// Returned from `StateBehavior::update()` to indicate whether to stay in the
/// current state or ask the machine to change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition<S> {
    /// Stay in the current state.
    None,
    /// Request a transition validated against the transition table.
    To(S),
    /// Transition bypassing the table (interrupts such as death).
    Force(S),
}

/// Set of legal `(from, to)` pairs for non-forced transitions.
#[derive(Debug, Clone)]
pub struct TransitionTable<S> {
    edges: BTreeSet<(S, S)>,
}

impl<S: StateId> TransitionTable<S> {
    /// Create an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self {
            edges: BTreeSet::new(),
        }
    }

    /// Declare a single legal transition.
    pub fn allow(&mut self, from: S, to: S) -> &mut Self {
        self.edges.insert((from, to));
        self
    }

    /// Declare transitions from one state into each of `targets`.
    pub fn allow_many(&mut self, from: S, targets: &[S]) -> &mut Self {
        for &to in targets {
            self.edges.insert((from, to));
        }
        self
    }

    /// Check whether `from -> to` is declared.
    #[must_use]
    pub fn allows(&self, from: S, to: S) -> bool {
        self.edges.contains(&(from, to))
    }

    /// Number of declared transitions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.edges.len()
    }

    /// Check if no transition is declared.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    /// Iterate over declared pairs in order.
    pub fn iter(&self) -> impl Iterator<Item = (S, S)> + '_ {
        self.edges.iter().copied()
    }
}

impl<S: StateId> Default for TransitionTable<S> {
    fn default() -> Self {
        Self::new()
    }
}

/// Notification payload for an accepted transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateChange<S> {
    /// State that was exited
    pub previous: S,
    /// State that was entered
    pub next: S,
    /// Whether the transition bypassed the table
    pub forced: bool,
}

/// Listener invoked synchronously after each accepted transition.
pub type StateListener<S> = Box<dyn FnMut(&StateChange<S>)>;

/// Errors returned by state machine operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FsmError<S: fmt::Debug> {
    /// No behavior is registered for the state.
    #[error("state {0:?} has no registered behavior")]
    Unregistered(S),
    /// `initialize` was called twice.
    #[error("state machine is already initialized")]
    AlreadyInitialized,
    /// The machine has not been initialized yet.
    #[error("state machine is not initialized")]
    NotInitialized,
    /// The transition is not declared in the table.
    #[error("transition {from:?} -> {to:?} is not declared")]
    InvalidTransition {
        /// Current state
        from: S,
        /// Requested state
        to: S,
    },
}

// ============================================================================
// State Machine
// ============================================================================

/// A finite state machine that validates transitions against a table.
///
/// The machine owns its context and a shared reference to each state's
/// behavior. It handles the lifecycle of entering, updating, and exiting
/// states and fans out change notifications.
///
/// # Type Parameters
///
/// - `S`: State identifier (see [`StateId`])
/// - `C`: Context type passed to state methods (e.g., an agent blackboard)
pub struct GenericStateMachine<S: StateId, C> {
    /// Context shared by every state of this machine
    context: C,
    /// Behavior for each registered state
    states: FxHashMap<S, Rc<dyn StateBehavior<S, C>>>,
    /// Legal non-forced transitions
    table: TransitionTable<S>,
    /// Current state, `None` until initialized
    current: Option<S>,
    /// State before the last accepted transition
    previous: Option<S>,
    /// Whether ticking is suspended
    paused: bool,
    /// Change listeners
    listeners: Vec<StateListener<S>>,
}

impl<S: StateId, C> GenericStateMachine<S, C> {
    /// Create an uninitialized machine around a context.
    pub fn new(context: C) -> Self {
        Self {
            context,
            states: FxHashMap::default(),
            table: TransitionTable::new(),
            current: None,
            previous: None,
            paused: false,
            listeners: Vec::new(),
        }
    }

    /// Register (or replace) the behavior for a state.
    pub fn register_state(&mut self, id: S, behavior: Rc<dyn StateBehavior<S, C>>) {
        if self.states.insert(id, behavior).is_some() {
            log::warn!("Replacing behavior registered for state {id:?}");
        }
    }

    /// Declare a legal transition.
    pub fn register_transition(&mut self, from: S, to: S) {
        self.table.allow(from, to);
    }

    /// Declare several legal transitions at once.
    pub fn register_transitions(&mut self, pairs: impl IntoIterator<Item = (S, S)>) {
        for (from, to) in pairs {
            self.table.allow(from, to);
        }
    }

    /// Replace the whole transition table.
    pub fn set_transition_table(&mut self, table: TransitionTable<S>) {
        self.table = table;
    }

    /// Subscribe to accepted transitions.
    pub fn subscribe(&mut self, listener: impl FnMut(&StateChange<S>) + 'static) {
        self.listeners.push(Box::new(listener));
    }

    /// Enter the start state. Succeeds only once.
    ///
    /// # Errors
    ///
    /// Returns an error if the machine is already initialized or `start` has
    /// no registered behavior. Nothing changes in either case.
    pub fn initialize(&mut self, start: S) -> Result<(), FsmError<S>> {
        if self.current.is_some() {
            log::error!("State machine already initialized, ignoring start state {start:?}");
            return Err(FsmError::AlreadyInitialized);
        }
        let Some(behavior) = self.states.get(&start).cloned() else {
            log::error!("Cannot initialize state machine: {start:?} is not registered");
            return Err(FsmError::Unregistered(start));
        };

        self.current = Some(start);
        behavior.enter(&mut self.context);
        log::debug!("State machine initialized in {}", behavior.name());
        Ok(())
    }

    /// Request a transition validated against the table.
    ///
    /// Requesting the current state is a successful no-op.
    ///
    /// # Errors
    ///
    /// Returns an error if the machine is uninitialized, the target is not
    /// registered, or the transition is not declared.
    pub fn request_transition(&mut self, to: S) -> Result<(), FsmError<S>> {
        let Some(from) = self.current else {
            log::warn!("Transition to {to:?} requested before initialization");
            return Err(FsmError::NotInitialized);
        };
        if from == to {
            return Ok(());
        }
        if !self.table.allows(from, to) {
            log::warn!("Rejected transition {from:?} -> {to:?}: not declared");
            return Err(FsmError::InvalidTransition { from, to });
        }
        self.change_state(from, to, false)
    }

    /// Transition without consulting the table.
    ///
    /// Reserved for hard interrupts such as death.
    ///
    /// # Errors
    ///
    /// Returns an error if the machine is uninitialized or `to` is not registered.
    pub fn force_transition(&mut self, to: S) -> Result<(), FsmError<S>> {
        let Some(from) = self.current else {
            log::warn!("Forced transition to {to:?} before initialization");
            return Err(FsmError::NotInitialized);
        };
        self.change_state(from, to, true)
    }

    fn change_state(&mut self, from: S, to: S, forced: bool) -> Result<(), FsmError<S>> {
        let Some(next) = self.states.get(&to).cloned() else {
            log::warn!("Rejected transition {from:?} -> {to:?}: target not registered");
            return Err(FsmError::Unregistered(to));
        };

        if let Some(old) = self.states.get(&from).cloned() {
            old.exit(&mut self.context);
        }
        self.previous = Some(from);
        self.current = Some(to);
        next.enter(&mut self.context);

        log::debug!(
            "State {from:?} -> {to:?}{}",
            if forced { " (forced)" } else { "" }
        );

        let change = StateChange {
            previous: from,
            next: to,
            forced,
        };
        for listener in &mut self.listeners {
            listener(&change);
        }
        Ok(())
    }

    /// Run the current state's per-frame update.
    pub fn tick(&mut self) {
        if let Some(behavior) = self.active_behavior() {
            let transition = behavior.update(&mut self.context);
            self.apply(transition);
        }
    }

    /// Run the current state's fixed-timestep update.
    pub fn fixed_tick(&mut self) {
        if let Some(behavior) = self.active_behavior() {
            let transition = behavior.fixed_update(&mut self.context);
            self.apply(transition);
        }
    }

    fn active_behavior(&self) -> Option<Rc<dyn StateBehavior<S, C>>> {
        if self.paused {
            return None;
        }
        self.current.and_then(|id| self.states.get(&id).cloned())
    }

    fn apply(&mut self, transition: Transition<S>) {
        // Failures are already logged; the state simply stays put.
        let _ = match transition {
            Transition::None => Ok(()),
            Transition::To(to) => self.request_transition(to),
            Transition::Force(to) => self.force_transition(to),
        };
    }

    /// Suspend ticking without changing state.
    pub fn pause(&mut self) {
        self.paused = true;
    }

    /// Resume ticking.
    pub fn resume(&mut self) {
        self.paused = false;
    }

    /// Check if ticking is suspended.
    #[must_use]
    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// Check if `initialize` has succeeded.
    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.current.is_some()
    }

    /// Current state, if initialized.
    #[must_use]
    pub fn current(&self) -> Option<S> {
        self.current
    }

    /// State before the last accepted transition.
    #[must_use]
    pub fn previous(&self) -> Option<S> {
        self.previous
    }

    /// Check if the machine is in the given state.
    #[must_use]
    pub fn is_in_state(&self, id: S) -> bool {
        self.current == Some(id)
    }

    /// Get the name of the current state.
    #[must_use]
    pub fn current_state_name(&self) -> Option<&'static str> {
        self.current
            .and_then(|id| self.states.get(&id))
            .map(|behavior| behavior.name())
    }

    /// Check whether a state has a registered behavior.
    #[must_use]
    pub fn is_registered(&self, id: S) -> bool {
        self.states.contains_key(&id)
    }

    /// The declared transition table.
    #[must_use]
    pub fn transition_table(&self) -> &TransitionTable<S> {
        &self.table
    }

    /// Shared context.
    #[must_use]
    pub fn context(&self) -> &C {
        &self.context
    }

    /// Mutable context.
    pub fn context_mut(&mut self) -> &mut C {
        &mut self.context
    }
}

impl<S: StateId, C> fmt::Debug for GenericStateMachine<S, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GenericStateMachine")
            .field("current", &self.current)
            .field("previous", &self.previous)
            .field("paused", &self.paused)
            .field("transitions", &self.table.len())
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================
