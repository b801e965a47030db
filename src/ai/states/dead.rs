//! Dead: shut everything down and ask the host for removal.

use super::{AgentBehavior, AgentState};
use crate::ai::context::{AgentCommand, AgentContext};
use crate::ai::fsm::Transition;
use crate::core::AgentEvent;

/// Terminal state. Removal is scheduled, never waited on.
#[derive(Debug, Clone, Copy, Default)]
pub struct DeadBehavior;

impl AgentBehavior for DeadBehavior {
    const STATE: AgentState = AgentState::Dead;

    fn on_enter(&self, ctx: &mut AgentContext) {
        ctx.movement.stop();
        ctx.movement.set_enabled(false);
        ctx.movement.set_solid(false);
        ctx.abilities.interrupt();
        ctx.clear_attack();
        ctx.clear_target();
        ctx.animator.fire_trigger("death");

        let delay = ctx.archetype().tuning.despawn_delay;
        ctx.command(AgentCommand::ScheduleDespawn { delay });
        log::info!("{:?} ({}) died", ctx.id(), ctx.archetype().name);
        ctx.emit(AgentEvent::Died { agent: ctx.id() });
    }

    fn on_update(&self, _ctx: &mut AgentContext) -> Transition<AgentState> {
        Transition::None
    }

    fn on_exit(&self, ctx: &mut AgentContext) {
        ctx.movement.set_solid(true);
        ctx.movement.set_enabled(true);
    }
}
