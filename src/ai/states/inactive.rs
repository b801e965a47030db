//! Inactive: dormant until activated.

use super::{AgentBehavior, AgentState};
use crate::ai::context::AgentContext;
use crate::ai::fsm::Transition;

/// Navigation is disabled for as long as the agent is dormant.
#[derive(Debug, Clone, Copy, Default)]
pub struct InactiveBehavior;

impl AgentBehavior for InactiveBehavior {
    const STATE: AgentState = AgentState::Inactive;

    fn on_enter(&self, ctx: &mut AgentContext) {
        ctx.movement.stop();
        ctx.movement.set_enabled(false);
    }

    fn on_update(&self, _ctx: &mut AgentContext) -> Transition<AgentState> {
        Transition::None
    }

    fn on_exit(&self, ctx: &mut AgentContext) {
        ctx.movement.set_enabled(true);
        ctx.movement.resume();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::archetype::Archetype;
    use crate::ai::fsm::StateBehavior;
    use crate::ai::testing::context;

    #[test]
    fn test_toggles_navigation() {
        let (mut ctx, mocks) = context(Archetype::default());
        InactiveBehavior.enter(&mut ctx);
        assert!(!mocks.body.borrow().enabled);
        InactiveBehavior.exit(&mut ctx);
        assert!(mocks.body.borrow().enabled);
        assert!(!mocks.body.borrow().stopped);
    }
}
