//! Physics world using rapier3d
//!
//! Static obstacles block sight lines; agent bodies are kinematic capsules
//! tagged with their entity so overlap queries can report who is nearby.

use glam::Vec3;
use hecs::Entity;
use rapier3d::prelude::*;

/// Handle to a rigid body in the physics world
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RigidBodyHandle(pub rapier3d::dynamics::RigidBodyHandle);

/// Handle to a collider in the physics world
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ColliderHandle(pub rapier3d::geometry::ColliderHandle);

/// Entity stored in a collider's user data, if any
fn entity_of(collider: &Collider) -> Option<Entity> {
    u64::try_from(collider.user_data).ok().and_then(Entity::from_bits)
}

/// Physics world manager
pub struct Physics {
    /// Gravity vector
    pub gravity: Vec3,
    /// Physics pipeline
    pipeline: PhysicsPipeline,
    /// Island manager
    island_manager: IslandManager,
    /// Broad phase
    broad_phase: DefaultBroadPhase,
    /// Narrow phase
    narrow_phase: NarrowPhase,
    /// Rigid body set
    rigid_body_set: RigidBodySet,
    /// Collider set
    collider_set: ColliderSet,
    /// Impulse joint set
    impulse_joint_set: ImpulseJointSet,
    /// Multibody joint set
    multibody_joint_set: MultibodyJointSet,
    /// CCD solver
    ccd_solver: CCDSolver,
    /// Query pipeline for raycasts and overlaps
    query_pipeline: QueryPipeline,
    /// Integration parameters
    integration_parameters: IntegrationParameters,
}

impl Physics {
    /// Create a new physics world with default gravity
    #[must_use]
    pub fn new() -> Self {
        Self::with_gravity(Vec3::new(0.0, -9.81, 0.0))
    }

    /// Create a new physics world with custom gravity
    #[must_use]
    pub fn with_gravity(gravity: Vec3) -> Self {
        Self {
            gravity,
            pipeline: PhysicsPipeline::new(),
            island_manager: IslandManager::new(),
            broad_phase: DefaultBroadPhase::new(),
            narrow_phase: NarrowPhase::new(),
            rigid_body_set: RigidBodySet::new(),
            collider_set: ColliderSet::new(),
            impulse_joint_set: ImpulseJointSet::new(),
            multibody_joint_set: MultibodyJointSet::new(),
            ccd_solver: CCDSolver::new(),
            query_pipeline: QueryPipeline::new(),
            integration_parameters: IntegrationParameters::default(),
        }
    }

    /// Step the simulation and refresh the query pipeline
    pub fn step(&mut self, dt: f32) {
        self.integration_parameters.dt = dt;

        self.pipeline.step(
            &vector![self.gravity.x, self.gravity.y, self.gravity.z],
            &self.integration_parameters,
            &mut self.island_manager,
            &mut self.broad_phase,
            &mut self.narrow_phase,
            &mut self.rigid_body_set,
            &mut self.collider_set,
            &mut self.impulse_joint_set,
            &mut self.multibody_joint_set,
            &mut self.ccd_solver,
            Some(&mut self.query_pipeline),
            &(),
            &(),
        );
    }

    /// Add a static box obstacle
    pub fn add_static_box(&mut self, center: Vec3, half_extents: Vec3) -> ColliderHandle {
        let body = RigidBodyBuilder::fixed()
            .translation(vector![center.x, center.y, center.z])
            .build();
        let body = self.rigid_body_set.insert(body);
        let collider = ColliderBuilder::cuboid(half_extents.x, half_extents.y, half_extents.z).build();

        ColliderHandle(self.collider_set.insert_with_parent(
            collider,
            body,
            &mut self.rigid_body_set,
        ))
    }

    /// Add a kinematic capsule body owned by `entity`
    ///
    /// `position` is the foot point; the capsule stands on it.
    pub fn add_agent_body(
        &mut self,
        entity: Entity,
        position: Vec3,
        radius: f32,
        half_height: f32,
    ) -> RigidBodyHandle {
        let body = RigidBodyBuilder::kinematic_position_based()
            .translation(vector![position.x, position.y, position.z])
            .build();
        let body = self.rigid_body_set.insert(body);
        let collider = ColliderBuilder::capsule_y(half_height, radius)
            .translation(vector![0.0, half_height + radius, 0.0])
            .user_data(u128::from(entity.to_bits().get()))
            .build();
        self.collider_set
            .insert_with_parent(collider, body, &mut self.rigid_body_set);

        RigidBodyHandle(body)
    }

    /// Get the position of a rigid body
    #[must_use]
    pub fn get_position(&self, body: RigidBodyHandle) -> Option<Vec3> {
        self.rigid_body_set.get(body.0).map(|rb| {
            let pos = rb.translation();
            Vec3::new(pos.x, pos.y, pos.z)
        })
    }

    /// Set the position of a kinematic body, applied on the next step
    pub fn set_kinematic_position(&mut self, body: RigidBodyHandle, position: Vec3) {
        if let Some(rb) = self.rigid_body_set.get_mut(body.0) {
            rb.set_next_kinematic_translation(vector![position.x, position.y, position.z]);
        }
    }

    /// Enable or disable a body and its colliders
    pub fn set_body_enabled(&mut self, body: RigidBodyHandle, enabled: bool) {
        if let Some(rb) = self.rigid_body_set.get_mut(body.0) {
            rb.set_enabled(enabled);
        }
    }

    /// Turn a body's colliders into sensors (`solid == false`) or back
    pub fn set_body_solid(&mut self, body: RigidBodyHandle, solid: bool) {
        let Some(rb) = self.rigid_body_set.get(body.0) else {
            return;
        };
        for handle in rb.colliders() {
            if let Some(collider) = self.collider_set.get_mut(*handle) {
                collider.set_sensor(!solid);
            }
        }
    }

    /// Cast a ray against static geometry and return the first hit
    #[must_use]
    pub fn raycast_static(&self, origin: Vec3, direction: Vec3, max_distance: f32) -> Option<RaycastHit> {
        let direction = direction.try_normalize()?;
        let ray = Ray::new(
            point![origin.x, origin.y, origin.z],
            vector![direction.x, direction.y, direction.z],
        );

        self.query_pipeline
            .cast_ray(
                &self.rigid_body_set,
                &self.collider_set,
                &ray,
                max_distance,
                true,
                QueryFilter::only_fixed(),
            )
            .map(|(handle, distance)| {
                let point = ray.point_at(distance);
                RaycastHit {
                    collider: ColliderHandle(handle),
                    point: Vec3::new(point.x, point.y, point.z),
                    distance,
                }
            })
    }

    /// Entities whose colliders intersect a sphere, sorted and deduplicated
    #[must_use]
    pub fn overlap_sphere(&self, center: Vec3, radius: f32) -> Vec<Entity> {
        let shape = Ball::new(radius);
        let shape_pos = Isometry::translation(center.x, center.y, center.z);
        let mut found = Vec::new();

        self.query_pipeline.intersections_with_shape(
            &self.rigid_body_set,
            &self.collider_set,
            &shape_pos,
            &shape,
            QueryFilter::default(),
            |handle| {
                if let Some(entity) = self.collider_set.get(handle).and_then(entity_of) {
                    found.push(entity);
                }
                true
            },
        );

        found.sort();
        found.dedup();
        found
    }

    /// Remove a rigid body and its colliders
    pub fn remove_body(&mut self, body: RigidBodyHandle) {
        self.rigid_body_set.remove(
            body.0,
            &mut self.island_manager,
            &mut self.collider_set,
            &mut self.impulse_joint_set,
            &mut self.multibody_joint_set,
            true,
        );
    }

    /// Number of rigid bodies
    #[must_use]
    pub fn body_count(&self) -> usize {
        self.rigid_body_set.len()
    }
}

impl Default for Physics {
    fn default() -> Self {
        Self::new()
    }
}

/// Result of a raycast
#[derive(Debug, Clone)]
pub struct RaycastHit {
    /// The collider that was hit
    pub collider: ColliderHandle,
    /// The point of intersection
    pub point: Vec3,
    /// Distance from ray origin
    pub distance: f32,
}
