//! Positioning: find a spot with a clear line to the target.

use super::{AgentBehavior, AgentState, flat_direction, rotate_flat};
use crate::ai::context::AgentContext;
use crate::ai::fsm::Transition;

/// Moves to an angular offset around the target that has line of sight.
#[derive(Debug, Clone, Copy, Default)]
pub struct PositioningBehavior;

impl AgentBehavior for PositioningBehavior {
    const STATE: AgentState = AgentState::Positioning;

    fn on_enter(&self, ctx: &mut AgentContext) {
        let factor = ctx.archetype().tuning.chase_speed_factor;
        ctx.set_speed_factor(factor);
        ctx.movement.resume();

        let Some(target) = ctx.target_position() else {
            return;
        };
        let archetype = ctx.archetype_handle();
        let tuning = &archetype.tuning;

        let min_range = ctx
            .available_abilities()
            .iter()
            .map(|ability| ability.min_range)
            .fold(0.0, f32::max);
        let range = (ctx.max_attack_range() - tuning.positioning_buffer).max(min_range);
        let position = ctx.position();
        let away = flat_direction(target, position, -ctx.movement.forward());

        let spot = tuning.positioning_angles.iter().find_map(|angle| {
            let candidate = target + rotate_flat(away, *angle) * range;
            ctx.spatial
                .nearest_traversable(candidate, tuning.traversable_search_radius)
                .filter(|snapped| ctx.has_line_of_sight_from(*snapped, target))
        });

        match spot {
            Some(spot) => {
                ctx.movement.set_destination(spot);
            }
            None => {
                log::debug!("{:?} found no firing position, approaching directly", ctx.id());
                ctx.movement.set_destination(target);
            }
        }
    }

    fn on_update(&self, ctx: &mut AgentContext) -> Transition<AgentState> {
        let (Some(target), Some(distance)) = (ctx.target_position(), ctx.distance_to_target())
        else {
            return Transition::To(AgentState::Idle);
        };
        if !ctx.has_target() {
            return Transition::To(AgentState::Chase);
        }

        if ctx.attack_permitted {
            let ready = ctx.ready_ability(distance).cloned().filter(|ability| {
                !ability.requires_line_of_sight
                    || ctx.has_line_of_sight_from(ctx.position(), target)
            });
            if let Some(ability) = ready {
                ctx.active_ability = Some(ability);
                return Transition::To(AgentState::Attack);
            }
        }

        let tuning = &ctx.archetype().tuning;
        if ctx.time_in_state() >= tuning.positioning_timeout
            || ctx.movement.has_reached_destination(tuning.arrival_threshold)
        {
            return Transition::To(AgentState::Chase);
        }
        Transition::None
    }
}

#[cfg(test)]
mod tests {
    use glam::Vec3;

    use super::*;
    use crate::ai::archetype::{AbilityDescriptor, Archetype};
    use crate::ai::fsm::StateBehavior;
    use crate::ai::testing::{Mocks, context, entities};

    fn archer() -> Archetype {
        Archetype {
            abilities: vec![AbilityDescriptor {
                name: "arrow".into(),
                range: 9.0,
                min_range: 3.0,
                requires_line_of_sight: true,
                ..AbilityDescriptor::default()
            }],
            ..Archetype::default()
        }
    }

    fn positioned(target_at: Vec3, blocker: Option<(Vec3, f32)>) -> (AgentContext, Mocks) {
        let (mut ctx, mocks) = context(archer());
        let target = entities(1)[0];
        mocks.world.place(target, target_at);
        if let Some((center, radius)) = blocker {
            mocks.world.block(center, radius);
        }
        ctx.target = Some(target);
        ctx.target_visible = true;
        ctx.time_since_target_sensed = 0.0;
        PositioningBehavior.enter(&mut ctx);
        (ctx, mocks)
    }

    #[test]
    fn test_first_clear_offset_is_used() {
        let target = Vec3::new(0.0, 0.0, -20.0);
        let (_ctx, mocks) = positioned(target, None);
        let destination = mocks.body.borrow().destination;
        let destination = destination.unwrap_or(Vec3::ZERO);
        // Straight back toward the agent at range minus buffer
        assert!(destination.distance(Vec3::new(0.0, 0.0, -12.0)) < 1e-4);
    }

    #[test]
    fn test_blocked_offsets_are_skipped() {
        let target = Vec3::new(0.0, 0.0, -20.0);
        // Covers the direct line only
        let (_ctx, mocks) = positioned(target, Some((Vec3::new(0.0, 1.6, -14.0), 1.0)));
        let destination = mocks.body.borrow().destination.unwrap_or(Vec3::ZERO);
        assert!(destination.x.abs() > 1.0);
        assert!((destination.distance(target) - 8.0).abs() < 1e-3);
    }

    #[test]
    fn test_falls_back_to_target() {
        let target = Vec3::new(0.0, 0.0, -20.0);
        let (_ctx, mocks) = positioned(target, Some((Vec3::new(0.0, 1.6, -20.0), 9.0)));
        assert_eq!(mocks.body.borrow().destination, Some(target));
    }

    #[test]
    fn test_attacks_once_in_clear_range() {
        let target = Vec3::new(0.0, 0.0, -20.0);
        let (mut ctx, mocks) = positioned(target, None);
        mocks.set_position(Vec3::new(0.0, 0.0, -12.0));
        ctx.now = 0.5;
        assert_eq!(PositioningBehavior.update(&mut ctx), Transition::To(AgentState::Attack));
    }

    #[test]
    fn test_times_out_to_chase() {
        let target = Vec3::new(0.0, 0.0, -20.0);
        let (mut ctx, _mocks) = positioned(target, None);
        ctx.now = 4.5;
        assert_eq!(PositioningBehavior.update(&mut ctx), Transition::None);
        ctx.now = 5.0;
        assert_eq!(PositioningBehavior.update(&mut ctx), Transition::To(AgentState::Chase));
    }
}
