//! Investigate: walk to a point of interest and look around.

use std::f32::consts::TAU;

use super::{AgentBehavior, AgentState, rotate_flat, travel_to};
use crate::ai::context::AgentContext;
use crate::ai::fsm::Transition;

/// Half-width of the look-around sweep in degrees.
const LOOK_AROUND_ARC: f32 = 75.0;

/// Moves to the last known target position, sweeps its gaze, then gives up.
#[derive(Debug, Clone, Copy, Default)]
pub struct InvestigateBehavior;

impl AgentBehavior for InvestigateBehavior {
    const STATE: AgentState = AgentState::Investigate;

    fn on_enter(&self, ctx: &mut AgentContext) {
        let factor = ctx.archetype().tuning.investigate_speed_factor;
        ctx.set_speed_factor(factor);
        ctx.movement.resume();

        let point = ctx
            .pending_investigation
            .take()
            .or(ctx.last_known_target_position);
        ctx.investigate_destination = point;
        ctx.investigate_arrived_at = None;
        ctx.investigate_heading = None;

        match point {
            Some(point) if travel_to(ctx, point) => {}
            Some(_) => {
                // Unreachable: look around from here instead
                ctx.movement.stop();
                begin_look_around(ctx);
            }
            None => ctx.movement.stop(),
        }
    }

    fn on_update(&self, ctx: &mut AgentContext) -> Transition<AgentState> {
        if ctx.has_target() {
            return Transition::To(AgentState::Chase);
        }

        let archetype = ctx.archetype_handle();
        let tuning = &archetype.tuning;
        if ctx.time_in_state() >= tuning.investigate_timeout {
            log::debug!("{:?} gave up investigating", ctx.id());
            return Transition::To(AgentState::Idle);
        }

        match ctx.investigate_arrived_at {
            None => {
                if ctx.investigate_destination.is_none() {
                    return Transition::To(AgentState::Idle);
                }
                if ctx.movement.has_reached_destination(tuning.arrival_threshold) {
                    ctx.movement.stop();
                    begin_look_around(ctx);
                }
                Transition::None
            }
            Some(arrived_at) => {
                let looking = ctx.now - arrived_at;
                if looking >= tuning.look_around_duration {
                    return Transition::To(AgentState::Idle);
                }
                let phase = looking / tuning.look_around_duration.max(f32::EPSILON);
                let yaw = LOOK_AROUND_ARC * (phase * TAU).sin();
                let position = ctx.position();
                let heading = ctx
                    .investigate_heading
                    .unwrap_or_else(|| ctx.movement.forward());
                ctx.movement
                    .face_towards(position + rotate_flat(heading, yaw));
                Transition::None
            }
        }
    }

    fn on_exit(&self, ctx: &mut AgentContext) {
        ctx.investigate_destination = None;
        ctx.investigate_arrived_at = None;
        ctx.investigate_heading = None;
    }
}

/// Start the sweep centred on the current facing.
fn begin_look_around(ctx: &mut AgentContext) {
    ctx.investigate_arrived_at = Some(ctx.now);
    ctx.investigate_heading = Some(ctx.movement.forward());
}
