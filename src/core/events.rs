//! Event Queue System for Decoupled Communication
//!
//! This module provides a type-safe, double-buffered event queue that lets
//! UI, audio and director systems observe agents without coupling to them.
//! Events are written during one frame and processed in the next, ensuring
//! consistent behavior.
//!
//! # Design Principles
//!
//! - **Type Safety**: All events are strongly typed via the `AgentEvent` enum
//! - **Identity in Payload**: Every event names the agent that emitted it
//! - **Double Buffering**: Events are frame-consistent (no mid-frame mutations)
//! - **Simplicity**: No complex pub/sub - just push and iterate
//!
//! # Example
//!
//! ```ignore
//! // In the roster tick
//! queue.push(AgentEvent::Died { agent });
//!
//! // In a director system, next frame
//! for event in queue.iter() {
//!     if let AgentEvent::Died { agent } = event {
//!         spawn_replacement(*agent);
//!     }
//! }
//! ```

use std::collections::VecDeque;

use hecs::Entity;

use crate::ai::AgentState;

// ============================================================================
// Event Types
// ============================================================================

/// Agent events for inter-system communication.
///
/// The `#[non_exhaustive]` attribute allows adding new variants without
/// breaking downstream code that uses wildcard patterns.
#[derive(Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum AgentEvent {
    /// The behavior state machine accepted a transition.
    StateChanged {
        /// Emitting agent
        agent: Entity,
        /// State that was exited
        previous: AgentState,
        /// State that was entered
        next: AgentState,
    },

    /// Perception selected a new primary target.
    TargetAcquired {
        /// Emitting agent
        agent: Entity,
        /// The new primary target
        target: Entity,
    },

    /// Perception no longer has a primary target.
    TargetLost {
        /// Emitting agent
        agent: Entity,
    },

    /// An ability left its windup and fired.
    AbilityExecuted {
        /// Emitting agent
        agent: Entity,
        /// Ability name
        ability: String,
        /// Target at the time of execution
        target: Option<Entity>,
    },

    /// A boss committed a new phase.
    BossPhaseChanged {
        /// Emitting agent
        agent: Entity,
        /// New 1-based phase index
        phase: usize,
        /// Phase display name
        name: String,
    },

    /// An agent died.
    Died {
        /// Emitting agent
        agent: Entity,
    },

    /// A dead agent was removed after its despawn delay.
    Despawned {
        /// Removed agent
        agent: Entity,
    },
}

impl AgentEvent {
    /// Agent that emitted the event.
    #[must_use]
    pub fn agent(&self) -> Entity {
        match self {
            Self::StateChanged { agent, .. }
            | Self::TargetAcquired { agent, .. }
            | Self::TargetLost { agent }
            | Self::AbilityExecuted { agent, .. }
            | Self::BossPhaseChanged { agent, .. }
            | Self::Died { agent }
            | Self::Despawned { agent } => *agent,
        }
    }
}

// ============================================================================
// Event Queue
// ============================================================================

/// Double-buffered event queue for frame-consistent event processing.
///
/// Events pushed during frame N are available for reading during frame N+1.
/// This prevents issues where event order depends on system update order.
///
/// # Performance
///
/// - Push: O(1) amortized
/// - Iteration: O(n)
/// - Swap: O(1)
#[derive(Debug)]
pub struct EventQueue {
    /// Events being written this frame
    pending: VecDeque<AgentEvent>,
    /// Events from previous frame, ready for processing
    processing: VecDeque<AgentEvent>,
}

impl EventQueue {
    /// Default initial capacity for event queues.
    const DEFAULT_CAPACITY: usize = 64;

    /// Create a new event queue with default capacity.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(Self::DEFAULT_CAPACITY)
    }

    /// Create a new event queue with specified initial capacity.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            pending: VecDeque::with_capacity(capacity),
            processing: VecDeque::with_capacity(capacity),
        }
    }

    /// Push an event to be processed next frame.
    ///
    /// Events are not immediately visible to iterators. Call `swap()`
    /// at the frame boundary to make them available.
    #[inline]
    pub fn push(&mut self, event: AgentEvent) {
        self.pending.push_back(event);
    }

    /// Push several events in order.
    pub fn extend(&mut self, events: impl IntoIterator<Item = AgentEvent>) {
        self.pending.extend(events);
    }

    /// Swap the pending and processing queues.
    ///
    /// Call this once per frame, typically at the start of the update loop.
    pub fn swap(&mut self) {
        std::mem::swap(&mut self.pending, &mut self.processing);
        self.pending.clear();
    }

    /// Iterate over events from the previous frame.
    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = &AgentEvent> {
        self.processing.iter()
    }

    /// Drain all events from the previous frame.
    #[inline]
    pub fn drain(&mut self) -> impl Iterator<Item = AgentEvent> + '_ {
        self.processing.drain(..)
    }

    /// Check if there are any events to process.
    #[must_use]
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.processing.is_empty()
    }

    /// Get the number of events ready for processing.
    #[must_use]
    #[inline]
    pub fn len(&self) -> usize {
        self.processing.len()
    }

    /// Get the number of events pending for next frame.
    #[must_use]
    #[inline]
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Clear all events (both pending and processing).
    pub fn clear(&mut self) {
        self.pending.clear();
        self.processing.clear();
    }
}

impl Default for EventQueue {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Tests
// ============================================================================
