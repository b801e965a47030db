//! Core module
//!
//! Simulation clock, the agent event queue and deferred tasks.

mod events;
mod scheduler;
mod time;

pub use events::{AgentEvent, EventQueue};
pub use scheduler::{DeferredTasks, DueTask, TaskId};
pub use time::SimClock;
