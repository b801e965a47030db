//! Boss phase transition: an invulnerable pause before the next phase.

use super::{AgentBehavior, AgentState, engage_or_idle};
use crate::ai::context::AgentContext;
use crate::ai::fsm::Transition;
use crate::ai::phase::PhaseManager;

/// Holds the boss in place, then commits the pending phase.
#[derive(Debug, Clone, Copy, Default)]
pub struct BossPhaseBehavior;

impl AgentBehavior for BossPhaseBehavior {
    const STATE: AgentState = AgentState::BossPhaseTransition;

    fn on_enter(&self, ctx: &mut AgentContext) {
        ctx.abilities.interrupt();
        ctx.clear_attack();
        PhaseManager::begin(ctx);
    }

    fn on_update(&self, ctx: &mut AgentContext) -> Transition<AgentState> {
        if ctx.time_in_state() < ctx.archetype().tuning.phase_transition_duration {
            return Transition::None;
        }
        PhaseManager::commit(ctx);
        engage_or_idle(ctx)
    }

    fn on_exit(&self, ctx: &mut AgentContext) {
        // Interrupted transitions must not leave the boss invulnerable
        PhaseManager::abort(ctx);
        ctx.movement.resume();
    }
}
