//! Flee: run from the threat until safe.

use std::f32::consts::TAU;

use glam::Vec3;
use rand::Rng;

use super::{AgentBehavior, AgentState, flat_direction, rotate_flat, travel_to};
use crate::ai::capabilities::LandmarkKind;
use crate::ai::context::AgentContext;
use crate::ai::fsm::Transition;

/// Runs away at increased speed, re-picking its heading periodically.
#[derive(Debug, Clone, Copy, Default)]
pub struct FleeBehavior;

impl FleeBehavior {
    fn pick_destination(ctx: &mut AgentContext, threat: Vec3) {
        let archetype = ctx.archetype_handle();
        let tuning = &archetype.tuning;
        let position = ctx.position();
        let threat_distance = position.distance(threat);

        // A known refuge that leads away from the threat wins
        let refuge = ctx.landmarks.as_ref().and_then(|registry| {
            registry.nearest(LandmarkKind::Refuge, position, tuning.flee_safe_distance)
        });
        if let Some(refuge) = refuge.filter(|r| r.distance(threat) > threat_distance) {
            if travel_to(ctx, refuge) {
                return;
            }
        }

        let away = flat_direction(threat, position, -ctx.movement.forward());
        let spread = tuning.flee_deflection.abs();
        let deflection = ctx.rng.gen_range(-spread..=spread);
        let heading = rotate_flat(away, deflection);
        if travel_to(ctx, position + heading * tuning.flee_distance) {
            return;
        }

        let angle = ctx.rng.gen_range(0.0..TAU);
        let fallback = Vec3::new(angle.cos(), 0.0, angle.sin());
        if !travel_to(ctx, position + fallback * tuning.flee_distance) {
            log::debug!("{:?} has nowhere to flee, holding position", ctx.id());
            ctx.movement.stop();
        }
    }
}

impl AgentBehavior for FleeBehavior {
    const STATE: AgentState = AgentState::Flee;

    fn on_enter(&self, ctx: &mut AgentContext) {
        let factor = ctx.archetype().tuning.flee_speed_factor;
        ctx.set_speed_factor(factor);
        ctx.movement.resume();
        ctx.animator.fire_trigger("flee");

        let threat = ctx
            .target_position()
            .unwrap_or_else(|| ctx.position() - ctx.movement.forward());
        ctx.flee_from = Some(threat);
        ctx.flee_repick_timer = 0.0;
        Self::pick_destination(ctx, threat);
    }

    fn on_update(&self, ctx: &mut AgentContext) -> Transition<AgentState> {
        let archetype = ctx.archetype_handle();
        let tuning = &archetype.tuning;
        if ctx.time_in_state() >= tuning.max_flee_duration {
            log::debug!("{:?} stopped fleeing after {}s", ctx.id(), tuning.max_flee_duration);
            return Transition::To(AgentState::Idle);
        }

        if let Some(live) = ctx.target_position() {
            ctx.flee_from = Some(live);
        }
        let Some(threat) = ctx.flee_from else {
            return Transition::To(AgentState::Idle);
        };
        if ctx.position().distance(threat) >= tuning.flee_safe_distance {
            return Transition::To(AgentState::Idle);
        }

        ctx.flee_repick_timer += ctx.delta;
        if ctx.flee_repick_timer >= tuning.flee_repick_interval
            || ctx.movement.has_reached_destination(tuning.arrival_threshold)
        {
            ctx.flee_repick_timer = 0.0;
            Self::pick_destination(ctx, threat);
        }
        Transition::None
    }

    fn on_exit(&self, ctx: &mut AgentContext) {
        ctx.flee_from = None;
        ctx.flee_repick_timer = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::archetype::Archetype;
    use crate::ai::fsm::StateBehavior;
    use crate::ai::testing::{Mocks, context, entities};

    fn runner() -> Archetype {
        let mut archetype = Archetype {
            can_flee: true,
            ..Archetype::default()
        };
        archetype.tuning.flee_distance = 8.0;
        archetype.tuning.flee_safe_distance = 20.0;
        archetype.tuning.flee_deflection = 30.0;
        archetype.tuning.flee_repick_interval = 1.0;
        archetype.tuning.max_flee_duration = 6.0;
        archetype
    }

    fn fleeing(archetype: Archetype) -> (AgentContext, Mocks) {
        let (mut ctx, mocks) = context(archetype);
        let threat = entities(1)[0];
        mocks.world.place(threat, Vec3::new(0.0, 0.0, -4.0));
        ctx.target = Some(threat);
        ctx.target_visible = true;
        ctx.time_since_target_sensed = 0.0;
        FleeBehavior.enter(&mut ctx);
        (ctx, mocks)
    }

    fn step(ctx: &mut AgentContext, dt: f32) -> Transition<AgentState> {
        ctx.now += dt;
        ctx.delta = dt;
        FleeBehavior.update(ctx)
    }

    #[test]
    fn test_runs_away_within_deflection() {
        let (_ctx, mocks) = fleeing(runner());
        let destination = mocks.body.borrow().destination.unwrap_or(Vec3::ZERO);
        assert!((destination.length() - 8.0).abs() < 1e-3);
        let angle = destination.normalize().angle_between(Vec3::Z).to_degrees();
        assert!(angle <= 30.0 + 1e-3, "deflected {angle} degrees");
        assert!((mocks.body.borrow().speed - 5.2).abs() < 1e-4);
    }

    fn with_refuge(refuge: Vec3) -> Mocks {
        let (mut ctx, mocks) = context(runner());
        mocks
            .world
            .landmarks
            .borrow_mut()
            .push((LandmarkKind::Refuge, refuge));
        let threat = entities(1)[0];
        mocks.world.place(threat, Vec3::new(0.0, 0.0, -4.0));
        ctx.target = Some(threat);
        ctx.target_visible = true;
        FleeBehavior.enter(&mut ctx);
        mocks
    }

    #[test]
    fn test_heads_for_refuge_away_from_threat() {
        let refuge = Vec3::new(5.0, 0.0, 10.0);
        let mocks = with_refuge(refuge);
        assert_eq!(mocks.body.borrow().destination, Some(refuge));
    }

    #[test]
    fn test_ignores_refuge_behind_threat() {
        let refuge = Vec3::new(0.0, 0.0, -6.0);
        let mocks = with_refuge(refuge);
        let destination = mocks.body.borrow().destination;
        assert!(destination.is_some_and(|d| d != refuge && d.z > 0.0));
    }

    #[test]
    fn test_safe_distance_ends_flight() {
        let (mut ctx, mocks) = fleeing(runner());
        mocks.set_position(Vec3::new(0.0, 0.0, 10.0));
        assert_eq!(step(&mut ctx, 0.5), Transition::None);
        mocks.set_position(Vec3::new(0.0, 0.0, 16.0));
        assert_eq!(step(&mut ctx, 0.5), Transition::To(AgentState::Idle));
    }

    #[test]
    fn test_max_duration_ends_flight() {
        let (mut ctx, _mocks) = fleeing(runner());
        for _ in 0..11 {
            assert_eq!(step(&mut ctx, 0.5), Transition::None);
        }
        assert_eq!(step(&mut ctx, 0.5), Transition::To(AgentState::Idle));
    }

    #[test]
    fn test_repicks_periodically() {
        let (mut ctx, mocks) = fleeing(runner());
        let first = mocks.body.borrow().destination;
        step(&mut ctx, 0.5);
        assert_eq!(mocks.body.borrow().destination, first);
        step(&mut ctx, 0.5);
        assert!(ctx.flee_repick_timer.abs() < f32::EPSILON);
    }

    #[test]
    fn test_nowhere_to_go_holds_position() {
        let (mut ctx, mocks) = context(runner());
        mocks.world.no_traversable.set(true);
        let threat = entities(1)[0];
        mocks.world.place(threat, Vec3::new(0.0, 0.0, -4.0));
        ctx.target = Some(threat);
        ctx.target_visible = true;
        FleeBehavior.enter(&mut ctx);
        assert_eq!(mocks.body.borrow().destination, None);
        assert!(mocks.body.borrow().stopped);
    }
}
