//! Navigation module
//!
//! Grid-based A* pathfinding and steering used by the reference host.

mod grid;
mod steering;

pub use grid::{Cell, NavGrid, NavPath, find_path};
pub use steering::{Arrive, Seek, SteeringBehavior, SteeringOutput};
