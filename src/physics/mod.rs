//! Physics module
//!
//! Built on top of rapier3d; used for sight-line and proximity queries.

mod world;

pub use world::{ColliderHandle, Physics, RaycastHit, RigidBodyHandle};
