//! Reference simulation host
//!
//! A headless arena that backs the agent capability traits with a hecs
//! world, rapier queries and grid navigation. Used by the demo binary and
//! integration-style tests.

mod arena;
mod capabilities;
mod components;

pub use arena::{Arena, PendingHit};
pub use capabilities::{ArenaAbilities, ArenaAnimator, ArenaHealth, ArenaMover, arena_capabilities};
pub use components::{Body, Name, Navigator, Perceivable, Transform, Velocity, Vitals};
