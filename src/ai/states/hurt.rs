//! Hurt: a short stagger after taking damage.

use super::{AgentBehavior, AgentState, engage_or_idle};
use crate::ai::context::AgentContext;
use crate::ai::fsm::Transition;

/// Interrupts whatever the agent was doing and staggers it.
#[derive(Debug, Clone, Copy, Default)]
pub struct HurtBehavior;

impl AgentBehavior for HurtBehavior {
    const STATE: AgentState = AgentState::Hurt;

    fn on_enter(&self, ctx: &mut AgentContext) {
        ctx.movement.stop();
        ctx.abilities.interrupt();
        ctx.clear_attack();
        ctx.animator.fire_trigger("hurt");
    }

    fn on_update(&self, ctx: &mut AgentContext) -> Transition<AgentState> {
        // Health can keep dropping during the stagger
        let archetype = ctx.archetype();
        if archetype.can_flee && ctx.health.fraction() <= archetype.tuning.flee_health_threshold {
            return Transition::To(AgentState::Flee);
        }
        if ctx.time_in_state() >= archetype.tuning.stagger_duration {
            return engage_or_idle(ctx);
        }
        Transition::None
    }

    fn on_exit(&self, ctx: &mut AgentContext) {
        ctx.movement.resume();
    }
}
