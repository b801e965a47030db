//! Idle: stand still until something happens.

use super::{AgentBehavior, AgentState};
use crate::ai::context::AgentContext;
use crate::ai::fsm::Transition;

/// Waits in place, then patrols if the archetype allows it.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdleBehavior;

impl AgentBehavior for IdleBehavior {
    const STATE: AgentState = AgentState::Idle;

    fn on_enter(&self, ctx: &mut AgentContext) {
        ctx.movement.stop();
        ctx.idle_timer = 0.0;
    }

    fn on_update(&self, ctx: &mut AgentContext) -> Transition<AgentState> {
        if ctx.has_target() {
            return Transition::To(AgentState::Chase);
        }
        if ctx.pending_investigation.is_some() {
            return Transition::To(AgentState::Investigate);
        }

        ctx.idle_timer += ctx.delta;
        let tuning = &ctx.archetype().tuning;
        if ctx.archetype().can_patrol && ctx.idle_timer >= tuning.idle_timeout {
            return Transition::To(AgentState::Patrol);
        }
        Transition::None
    }
}
