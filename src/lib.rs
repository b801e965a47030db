//! Tick-driven NPC behavior core
//!
//! This crate provides:
//! - A generic, table-validated finite state machine
//! - A library of stateless agent behavior states sharing a per-agent context
//! - Perception with memory, boss phases and group tactics
//! - A headless reference host built on hecs, rapier3d and grid navigation

pub mod ai;
pub mod core;
pub mod nav;
pub mod physics;
pub mod sim;

// Re-exports for convenience
pub use glam;
pub use hecs;
pub use rapier3d;

/// Prelude module for common imports
pub mod prelude {
    pub use crate::ai::{
        AgentController, AgentGroup, AgentRoster, AgentState, Archetype, Capabilities, GroupSettings,
        StateLibrary,
    };
    pub use crate::core::{AgentEvent, EventQueue, SimClock};
    pub use crate::sim::{Arena, Perceivable, arena_capabilities};
    pub use glam::Vec3;
}
