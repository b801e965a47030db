//! Patrol: wander between random points around home.

use std::f32::consts::TAU;

use glam::Vec3;
use rand::Rng;

use super::{AgentBehavior, AgentState, travel_to};
use crate::ai::context::AgentContext;
use crate::ai::fsm::Transition;

/// Attempts at finding a reachable patrol point before giving up for now.
const PICK_ATTEMPTS: usize = 4;

/// Walks to random reachable points near home at a reduced speed.
#[derive(Debug, Clone, Copy, Default)]
pub struct PatrolBehavior;

impl PatrolBehavior {
    fn pick_point(ctx: &mut AgentContext) -> bool {
        let radius = ctx.archetype().tuning.patrol_radius;
        for _ in 0..PICK_ATTEMPTS {
            let angle = ctx.rng.gen_range(0.0..TAU);
            let distance = radius * ctx.rng.gen_range(0.0f32..=1.0).sqrt();
            let candidate = ctx.home + Vec3::new(angle.cos(), 0.0, angle.sin()) * distance;
            if travel_to(ctx, candidate) {
                return true;
            }
        }
        log::debug!("{:?} found no reachable patrol point", ctx.id());
        ctx.movement.stop();
        false
    }

    fn restart_leg(ctx: &mut AgentContext) {
        ctx.patrol_timer = 0.0;
        ctx.stuck_timer = 0.0;
        ctx.last_position_sample = ctx.position();
        Self::pick_point(ctx);
    }
}

impl AgentBehavior for PatrolBehavior {
    const STATE: AgentState = AgentState::Patrol;

    fn on_enter(&self, ctx: &mut AgentContext) {
        let factor = ctx.archetype().tuning.patrol_speed_factor;
        ctx.set_speed_factor(factor);
        ctx.movement.resume();
        Self::restart_leg(ctx);
    }

    fn on_update(&self, ctx: &mut AgentContext) -> Transition<AgentState> {
        if ctx.has_target() {
            return Transition::To(AgentState::Chase);
        }
        if ctx.pending_investigation.is_some() {
            return Transition::To(AgentState::Investigate);
        }

        let archetype = ctx.archetype_handle();
        let tuning = &archetype.tuning;
        if ctx.movement.has_reached_destination(tuning.arrival_threshold) {
            return Transition::To(AgentState::Idle);
        }

        ctx.patrol_timer += ctx.delta;
        if ctx.patrol_timer >= tuning.patrol_timeout {
            log::debug!("{:?} patrol leg timed out", ctx.id());
            Self::restart_leg(ctx);
            return Transition::None;
        }

        let position = ctx.position();
        if position.distance(ctx.last_position_sample) > tuning.stuck_epsilon {
            ctx.last_position_sample = position;
            ctx.stuck_timer = 0.0;
        } else {
            ctx.stuck_timer += ctx.delta;
            if ctx.stuck_timer > tuning.stuck_time {
                log::debug!("{:?} stuck while patrolling, picking a new point", ctx.id());
                Self::restart_leg(ctx);
            }
        }
        Transition::None
    }
}
