//! Chase: close in on the target until an ability is ready.

use super::{AgentBehavior, AgentState};
use crate::ai::context::AgentContext;
use crate::ai::fsm::Transition;

/// Follows the target on a throttled re-path interval.
#[derive(Debug, Clone, Copy, Default)]
pub struct ChaseBehavior;

impl ChaseBehavior {
    fn give_up(ctx: &mut AgentContext) -> Transition<AgentState> {
        log::debug!("{:?} gave up the chase", ctx.id());
        if ctx.archetype().can_investigate {
            ctx.pending_investigation = ctx.last_known_target_position;
        }
        ctx.clear_target();
        ctx.last_known_target_position = None;
        ctx.movement.stop();
        Transition::To(AgentState::Idle)
    }
}

impl AgentBehavior for ChaseBehavior {
    const STATE: AgentState = AgentState::Chase;

    fn on_enter(&self, ctx: &mut AgentContext) {
        let factor = ctx.archetype().tuning.chase_speed_factor;
        ctx.set_speed_factor(factor);
        ctx.movement.resume();
        // Path on the first update
        ctx.path_update_timer = ctx.archetype().tuning.repath_interval;
    }

    fn on_update(&self, ctx: &mut AgentContext) -> Transition<AgentState> {
        let archetype = ctx.archetype_handle();
        let tuning = &archetype.tuning;

        if !ctx.has_target()
            || ctx.time_since_target_sensed > archetype.perception.memory_duration
        {
            return Self::give_up(ctx);
        }
        let (Some(target_position), Some(distance)) =
            (ctx.target_position(), ctx.distance_to_target())
        else {
            return Self::give_up(ctx);
        };
        if ctx.time_in_state() > tuning.chase_give_up_time
            && distance > archetype.perception.sight_range
        {
            return Self::give_up(ctx);
        }

        if ctx.attack_permitted {
            if let Some(ability) = ctx.ready_ability(distance).cloned() {
                if ability.requires_line_of_sight
                    && !ctx.has_line_of_sight_from(ctx.position(), target_position)
                {
                    return Transition::To(AgentState::Positioning);
                }
                ctx.active_ability = Some(ability);
                return Transition::To(AgentState::Attack);
            }
        }

        ctx.path_update_timer += ctx.delta;
        if ctx.path_update_timer >= tuning.repath_interval {
            ctx.path_update_timer = 0.0;
            let destination = ctx.tactical_destination.unwrap_or(target_position);
            if !ctx.movement.set_destination(destination) {
                log::debug!("{:?} has no route to {destination}", ctx.id());
            }
        }
        if ctx.movement.has_reached_destination(tuning.arrival_threshold) {
            ctx.movement.face_towards(target_position);
        }
        Transition::None
    }
}

#[cfg(test)]
mod tests {
    use glam::Vec3;

    use super::*;
    use crate::ai::archetype::{AbilityDescriptor, Archetype};
    use crate::ai::context::AttackPhase;
    use crate::ai::fsm::StateBehavior;
    use crate::ai::testing::{Mocks, context, entities};

    fn archetype() -> Archetype {
        Archetype {
            abilities: vec![AbilityDescriptor {
                name: "cleave".into(),
                range: 5.0,
                cooldown: 2.0,
                ..AbilityDescriptor::default()
            }],
            ..Archetype::default()
        }
    }

    fn chasing(archetype: Archetype, target_at: Vec3) -> (AgentContext, Mocks) {
        let (mut ctx, mocks) = context(archetype);
        let target = entities(1)[0];
        mocks.world.place(target, target_at);
        ctx.target = Some(target);
        ctx.target_visible = true;
        ctx.time_since_target_sensed = 0.0;
        ctx.last_known_target_position = Some(target_at);
        ChaseBehavior.enter(&mut ctx);
        (ctx, mocks)
    }

    fn step(ctx: &mut AgentContext, dt: f32) -> Transition<AgentState> {
        ctx.now += dt;
        ctx.delta = dt;
        ChaseBehavior.update(ctx)
    }

    #[test]
    fn test_attacks_when_in_range_and_ready() {
        let (mut ctx, _mocks) = chasing(archetype(), Vec3::new(0.0, 0.0, -4.0));
        ctx.now = 10.0;
        ctx.last_attack_time = Some(5.0);
        assert_eq!(step(&mut ctx, 0.5), Transition::To(AgentState::Attack));
        assert_eq!(ctx.active_ability.as_ref().map(|a| a.name.as_str()), Some("cleave"));
        assert_eq!(ctx.attack_phase, AttackPhase::Windup);
    }

    #[test]
    fn test_waits_out_cooldown() {
        let (mut ctx, mocks) = chasing(archetype(), Vec3::new(0.0, 0.0, -4.0));
        ctx.now = 1.0;
        ctx.last_attack_time = Some(0.0);
        assert_eq!(step(&mut ctx, 0.5), Transition::None);
        assert_eq!(mocks.body.borrow().destination, Some(Vec3::new(0.0, 0.0, -4.0)));
        assert_eq!(step(&mut ctx, 0.5), Transition::To(AgentState::Attack));
    }

    #[test]
    fn test_repath_is_throttled() {
        let (mut ctx, mocks) = chasing(archetype(), Vec3::new(0.0, 0.0, -12.0));
        let target = ctx.target.unwrap_or_else(|| entities(1)[0]);
        assert_eq!(step(&mut ctx, 0.25), Transition::None);
        assert_eq!(mocks.body.borrow().destination, Some(Vec3::new(0.0, 0.0, -12.0)));

        mocks.world.place(target, Vec3::new(0.0, 0.0, -14.0));
        assert_eq!(step(&mut ctx, 0.25), Transition::None);
        assert_eq!(mocks.body.borrow().destination, Some(Vec3::new(0.0, 0.0, -12.0)));
        assert_eq!(step(&mut ctx, 0.25), Transition::None);
        assert_eq!(mocks.body.borrow().destination, Some(Vec3::new(0.0, 0.0, -14.0)));
    }

    #[test]
    fn test_lost_target_queues_investigation() {
        let (mut ctx, _mocks) = chasing(archetype(), Vec3::new(0.0, 0.0, -12.0));
        let target = ctx.target;
        ctx.target = None;
        assert_eq!(step(&mut ctx, 0.5), Transition::To(AgentState::Idle));
        assert_eq!(ctx.pending_investigation, Some(Vec3::new(0.0, 0.0, -12.0)));
        assert_eq!(ctx.last_known_target_position, None);
        assert_ne!(target, None);
    }

    #[test]
    fn test_gives_up_when_far_for_too_long() {
        let mut archetype = archetype();
        archetype.tuning.chase_give_up_time = 2.0;
        archetype.perception.sight_range = 10.0;
        let (mut ctx, _mocks) = chasing(archetype, Vec3::new(0.0, 0.0, -12.0));

        for _ in 0..4 {
            assert_eq!(step(&mut ctx, 0.5), Transition::None);
        }
        assert_eq!(step(&mut ctx, 0.5), Transition::To(AgentState::Idle));
        assert!(ctx.dropped_target.is_some());
    }

    #[test]
    fn test_keeps_chasing_when_close_past_give_up_time() {
        let mut archetype = archetype();
        archetype.tuning.chase_give_up_time = 1.0;
        archetype.abilities[0].range = 1.0;
        let (mut ctx, _mocks) = chasing(archetype, Vec3::new(0.0, 0.0, -6.0));
        for _ in 0..6 {
            assert_eq!(step(&mut ctx, 0.5), Transition::None);
        }
    }

    #[test]
    fn test_needs_permission_to_attack() {
        let (mut ctx, mocks) = chasing(archetype(), Vec3::new(0.0, 0.0, -4.0));
        ctx.attack_permitted = false;
        ctx.tactical_destination = Some(Vec3::new(3.0, 0.0, -4.0));
        assert_eq!(step(&mut ctx, 0.5), Transition::None);
        assert_eq!(mocks.body.borrow().destination, Some(Vec3::new(3.0, 0.0, -4.0)));
    }

    #[test]
    fn test_blocked_ranged_ability_repositions() {
        let mut archetype = archetype();
        archetype.abilities[0].requires_line_of_sight = true;
        let (mut ctx, mocks) = chasing(archetype, Vec3::new(0.0, 0.0, -4.0));
        mocks.world.block(Vec3::new(0.0, 1.6, -2.0), 0.5);
        assert_eq!(step(&mut ctx, 0.5), Transition::To(AgentState::Positioning));
    }
}
