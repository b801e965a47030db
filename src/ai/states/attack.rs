//! Attack: windup, execute and recovery of one ability use.
//!
//! The sub-phase and its timer live in the context; this is a flat state with
//! an enum inside rather than a nested machine.

use super::{AgentBehavior, AgentState};
use crate::ai::archetype::AbilityDescriptor;
use crate::ai::context::{AgentContext, AttackPhase};
use crate::ai::fsm::Transition;
use crate::core::AgentEvent;

/// Runs the selected ability through its three sub-phases.
#[derive(Debug, Clone, Copy, Default)]
pub struct AttackBehavior;

impl AttackBehavior {
    fn begin(ctx: &mut AgentContext, ability: AbilityDescriptor) {
        ctx.animator.fire_trigger(&ability.trigger);
        ctx.start_attack(Some(ability));
    }

    fn execute(ctx: &mut AgentContext, ability: &AbilityDescriptor) {
        if ctx.ability_executed {
            return;
        }
        ctx.ability_executed = true;
        let (agent, target, multiplier) = (ctx.id(), ctx.target, ctx.damage_multiplier);
        ctx.abilities.execute(ability, agent, target, multiplier);
        log::debug!("{:?} executed {}", ctx.id(), ability.name);
        ctx.emit(AgentEvent::AbilityExecuted {
            agent: ctx.id(),
            ability: ability.name.clone(),
            target,
        });
    }

    fn after_recovery(ctx: &mut AgentContext) -> Transition<AgentState> {
        if !ctx.has_target() {
            return Transition::To(AgentState::Idle);
        }
        let next = ctx
            .distance_to_target()
            .filter(|_| ctx.attack_permitted)
            .and_then(|distance| ctx.ready_ability(distance).cloned());
        match next {
            Some(ability) => {
                Self::begin(ctx, ability);
                Transition::None
            }
            None => Transition::To(AgentState::Chase),
        }
    }
}

impl AgentBehavior for AttackBehavior {
    const STATE: AgentState = AgentState::Attack;

    fn on_enter(&self, ctx: &mut AgentContext) {
        ctx.movement.stop();
        let ability = ctx.active_ability.take().or_else(|| {
            ctx.distance_to_target()
                .and_then(|distance| ctx.ready_ability(distance).cloned())
        });
        match ability {
            Some(ability) => Self::begin(ctx, ability),
            None => ctx.clear_attack(),
        }
    }

    fn on_update(&self, ctx: &mut AgentContext) -> Transition<AgentState> {
        let Some(ability) = ctx.active_ability.clone() else {
            log::warn!("{:?} entered Attack without an ability", ctx.id());
            return super::engage_or_idle(ctx);
        };

        ctx.attack_phase_timer += ctx.delta;
        match ctx.attack_phase {
            AttackPhase::Windup => {
                if ability.face_target {
                    if let Some(target) = ctx.target_position() {
                        ctx.movement.face_towards(target);
                    }
                }
                if ctx.attack_phase_timer >= ability.windup {
                    Self::execute(ctx, &ability);
                    ctx.attack_phase = AttackPhase::Execute;
                    ctx.attack_phase_timer = 0.0;
                }
                Transition::None
            }
            AttackPhase::Execute => {
                if ctx.attack_phase_timer >= ctx.archetype().tuning.execute_window {
                    ctx.last_attack_time = Some(ctx.now);
                    ctx.attack_phase = AttackPhase::Recovery;
                    ctx.attack_phase_timer = 0.0;
                }
                Transition::None
            }
            AttackPhase::Recovery => {
                if ctx.attack_phase_timer >= ability.recovery {
                    Self::after_recovery(ctx)
                } else {
                    Transition::None
                }
            }
        }
    }

    fn on_exit(&self, ctx: &mut AgentContext) {
        if ctx.ability_executed && ctx.attack_phase == AttackPhase::Execute {
            ctx.last_attack_time = Some(ctx.now);
        }
        ctx.clear_attack();
        ctx.movement.resume();
    }
}

#[cfg(test)]
mod tests {
    use glam::Vec3;

    use super::*;
    use crate::ai::archetype::Archetype;
    use crate::ai::fsm::StateBehavior;
    use crate::ai::testing::{Mocks, context, entities};

    fn archetype() -> Archetype {
        Archetype {
            abilities: vec![AbilityDescriptor {
                name: "slam".into(),
                range: 3.0,
                cooldown: 1.0,
                windup: 0.5,
                recovery: 0.5,
                trigger: "slam".into(),
                ..AbilityDescriptor::default()
            }],
            ..Archetype::default()
        }
    }

    fn attacking(archetype: Archetype) -> (AgentContext, Mocks) {
        let (mut ctx, mocks) = context(archetype);
        let target = entities(1)[0];
        mocks.world.place(target, Vec3::new(0.0, 0.0, -2.0));
        ctx.target = Some(target);
        ctx.target_visible = true;
        ctx.time_since_target_sensed = 0.0;
        AttackBehavior.enter(&mut ctx);
        (ctx, mocks)
    }

    fn step(ctx: &mut AgentContext, dt: f32) -> Transition<AgentState> {
        ctx.now += dt;
        ctx.delta = dt;
        AttackBehavior.update(ctx)
    }

    #[test]
    fn test_enter_starts_windup() {
        let (ctx, mocks) = attacking(archetype());
        assert_eq!(ctx.attack_phase, AttackPhase::Windup);
        assert_eq!(ctx.attack_phase_timer, 0.0);
        assert!(mocks.fired("slam"));
        assert!(mocks.body.borrow().stopped);
    }

    #[test]
    fn test_full_cycle_executes_once() {
        let mut archetype = archetype();
        archetype.tuning.execute_window = 0.25;
        let (mut ctx, mocks) = attacking(archetype);

        assert_eq!(step(&mut ctx, 0.25), Transition::None);
        assert!(mocks.abilities.borrow().executed.is_empty());
        assert!(!mocks.body.borrow().faced.is_empty());

        assert_eq!(step(&mut ctx, 0.25), Transition::None);
        assert_eq!(ctx.attack_phase, AttackPhase::Execute);
        assert_eq!(mocks.abilities.borrow().executed.len(), 1);

        assert_eq!(step(&mut ctx, 0.25), Transition::None);
        assert_eq!(ctx.attack_phase, AttackPhase::Recovery);
        assert_eq!(ctx.last_attack_time, Some(0.75));

        assert_eq!(step(&mut ctx, 0.25), Transition::None);
        // Recovery ends at 1.25, cooldown not over until 1.75
        assert_eq!(step(&mut ctx, 0.25), Transition::To(AgentState::Chase));
        assert_eq!(mocks.abilities.borrow().executed.len(), 1);
        assert!(ctx.take_events().iter().any(|e| matches!(e, AgentEvent::AbilityExecuted { .. })));
    }

    #[test]
    fn test_chains_when_ready_after_recovery() {
        let mut archetype = archetype();
        archetype.abilities[0].cooldown = 0.0;
        archetype.tuning.execute_window = 0.25;
        let (mut ctx, mocks) = attacking(archetype);
        for _ in 0..4 {
            assert_eq!(step(&mut ctx, 0.25), Transition::None);
        }
        assert_eq!(step(&mut ctx, 0.25), Transition::None);
        assert_eq!(ctx.attack_phase, AttackPhase::Windup);
        assert!(!ctx.ability_executed);
        assert_eq!(mocks.triggers.borrow().iter().filter(|t| *t == "slam").count(), 2);
    }

    #[test]
    fn test_recovery_without_target_idles() {
        let mut archetype = archetype();
        archetype.tuning.execute_window = 0.25;
        let (mut ctx, _mocks) = attacking(archetype);
        for _ in 0..4 {
            step(&mut ctx, 0.25);
        }
        ctx.target = None;
        assert_eq!(step(&mut ctx, 0.25), Transition::To(AgentState::Idle));
    }

    #[test]
    fn test_missing_ability_aborts() {
        let archetype = Archetype {
            abilities: Vec::new(),
            ..Archetype::default()
        };
        let (mut ctx, _mocks) = attacking(archetype);
        assert_eq!(step(&mut ctx, 0.25), Transition::To(AgentState::Chase));
        ctx.target = None;
        assert_eq!(step(&mut ctx, 0.25), Transition::To(AgentState::Idle));
    }

    #[test]
    fn test_exit_mid_execute_starts_cooldown() {
        let (mut ctx, _mocks) = attacking(archetype());
        step(&mut ctx, 0.5);
        assert_eq!(ctx.attack_phase, AttackPhase::Execute);
        AttackBehavior.exit(&mut ctx);
        assert_eq!(ctx.last_attack_time, Some(0.5));
        assert!(ctx.active_ability.is_none());
    }
}
