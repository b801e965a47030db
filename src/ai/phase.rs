//! Boss phase management
//!
//! Phases are 1-based; phase 0 is the base configuration. The committed phase
//! only ever increases, and phases are entered one at a time in order even if
//! health drops past several thresholds at once.

use super::archetype::BossPhase;
use super::context::AgentContext;
use crate::core::AgentEvent;

/// First phase after `current` whose threshold `fraction` has reached.
#[must_use]
pub fn select_phase(phases: &[BossPhase], current: usize, fraction: f32) -> Option<usize> {
    phases
        .iter()
        .enumerate()
        .map(|(i, phase)| (i + 1, phase))
        .skip_while(|(index, _)| *index <= current)
        .find(|(_, phase)| fraction <= phase.health_threshold)
        .map(|(index, _)| index)
}

/// Health-threshold evaluation and phase commit for multi-phase agents.
pub struct PhaseManager;

impl PhaseManager {
    /// Check whether a phase transition should start.
    ///
    /// On success the target phase is stored and the transition is marked
    /// pending; the caller forces the transition state.
    pub fn evaluate(ctx: &mut AgentContext) -> bool {
        if ctx.phase_transition_pending || !ctx.archetype().is_boss() || !ctx.health.is_alive() {
            return false;
        }
        let fraction = ctx.health.fraction();
        match select_phase(&ctx.archetype().phases, ctx.current_phase, fraction) {
            Some(next) => {
                ctx.target_phase = next;
                ctx.phase_transition_pending = true;
                log::debug!(
                    "{:?} crossing into phase {next} at {:.0}% health",
                    ctx.id(),
                    fraction * 100.0
                );
                true
            }
            None => false,
        }
    }

    /// Start a transition: halt, become invulnerable, fire the enter trigger.
    pub fn begin(ctx: &mut AgentContext) {
        let fraction = ctx.health.fraction();
        if let Some(next) = select_phase(&ctx.archetype().phases, ctx.current_phase, fraction) {
            ctx.target_phase = next;
        }
        ctx.phase_transition_pending = true;
        ctx.movement.stop();
        ctx.health.set_invulnerable(true);

        let archetype = ctx.archetype_handle();
        if let Some(phase) = archetype.phase(ctx.target_phase) {
            ctx.animator.fire_trigger(&phase.enter_trigger);
        }
    }

    /// Commit the target phase and apply its multipliers.
    ///
    /// Returns `false` when there was nothing newer to commit.
    pub fn commit(ctx: &mut AgentContext) -> bool {
        ctx.phase_transition_pending = false;
        ctx.health.set_invulnerable(false);

        let archetype = ctx.archetype_handle();
        let Some(phase) = archetype.phase(ctx.target_phase) else {
            return false;
        };
        if ctx.target_phase <= ctx.current_phase {
            return false;
        }

        ctx.current_phase = ctx.target_phase;
        ctx.speed_multiplier = phase.speed_multiplier;
        ctx.damage_multiplier = phase.damage_multiplier;
        ctx.set_speed_factor(archetype.tuning.chase_speed_factor);

        log::info!(
            "{:?} entered phase {} ({})",
            ctx.id(),
            ctx.current_phase,
            phase.name
        );
        ctx.emit(AgentEvent::BossPhaseChanged {
            agent: ctx.id(),
            phase: ctx.current_phase,
            name: phase.name.clone(),
        });
        true
    }

    /// Release a transition that ended without committing.
    pub fn abort(ctx: &mut AgentContext) {
        ctx.phase_transition_pending = false;
        ctx.health.set_invulnerable(false);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::archetype::Archetype;
    use crate::ai::testing::context;

    fn phases(thresholds: &[f32]) -> Vec<BossPhase> {
        thresholds
            .iter()
            .enumerate()
            .map(|(i, threshold)| BossPhase {
                name: format!("Phase {}", i + 1),
                health_threshold: *threshold,
                speed_multiplier: 1.0 + (i + 1) as f32 * 0.5,
                damage_multiplier: 2.0,
                ..BossPhase::default()
            })
            .collect()
    }

    fn boss() -> Archetype {
        Archetype {
            phases: phases(&[0.7, 0.4, 0.1]),
            ..Archetype::default()
        }
    }

    #[test]
    fn test_select_phase_enters_in_order() {
        let list = phases(&[0.7, 0.4, 0.1]);
        assert_eq!(select_phase(&list, 0, 1.0), None);
        assert_eq!(select_phase(&list, 0, 0.65), Some(1));
        assert_eq!(select_phase(&list, 0, 0.05), Some(1));
        assert_eq!(select_phase(&list, 1, 0.05), Some(2));
        assert_eq!(select_phase(&list, 1, 0.5), None);
        assert_eq!(select_phase(&list, 3, 0.0), None);
    }

    #[test]
    fn test_threshold_is_inclusive() {
        let list = phases(&[0.7]);
        assert_eq!(select_phase(&list, 0, 0.7), Some(1));
    }

    #[test]
    fn test_evaluate_marks_pending_once() {
        let (mut ctx, mocks) = context(boss());
        mocks.set_health(65.0);

        assert!(PhaseManager::evaluate(&mut ctx));
        assert_eq!(ctx.target_phase, 1);
        assert_eq!(ctx.current_phase, 0);
        assert!(!PhaseManager::evaluate(&mut ctx));
    }

    #[test]
    fn test_regular_agents_never_transition() {
        let (mut ctx, mocks) = context(Archetype::default());
        mocks.set_health(1.0);
        assert!(!PhaseManager::evaluate(&mut ctx));
    }

    #[test]
    fn test_commit_applies_multipliers() {
        let (mut ctx, mocks) = context(boss());
        mocks.set_health(65.0);
        PhaseManager::evaluate(&mut ctx);
        PhaseManager::begin(&mut ctx);
        assert!(mocks.vitals.borrow().invulnerable);
        assert!(mocks.fired("phase_change"));

        assert!(PhaseManager::commit(&mut ctx));
        assert_eq!(ctx.current_phase, 1);
        assert!(!mocks.vitals.borrow().invulnerable);
        assert!((ctx.speed_multiplier - 1.5).abs() < f32::EPSILON);
        assert!((ctx.damage_multiplier - 2.0).abs() < f32::EPSILON);
        assert!((mocks.body.borrow().speed - 6.0).abs() < f32::EPSILON);
        assert!(ctx.take_events().contains(&AgentEvent::BossPhaseChanged {
            agent: ctx.id(),
            phase: 1,
            name: "Phase 1".to_string(),
        }));
    }

    #[test]
    fn test_phase_never_decreases_after_heal() {
        let (mut ctx, mocks) = context(boss());
        mocks.set_health(35.0);
        PhaseManager::evaluate(&mut ctx);
        PhaseManager::commit(&mut ctx);
        assert_eq!(ctx.current_phase, 1);

        PhaseManager::evaluate(&mut ctx);
        PhaseManager::commit(&mut ctx);
        assert_eq!(ctx.current_phase, 2);

        mocks.set_health(100.0);
        assert!(!PhaseManager::evaluate(&mut ctx));
        assert_eq!(ctx.current_phase, 2);
    }

    #[test]
    fn test_abort_clears_invulnerability() {
        let (mut ctx, mocks) = context(boss());
        mocks.set_health(65.0);
        PhaseManager::evaluate(&mut ctx);
        PhaseManager::begin(&mut ctx);
        PhaseManager::abort(&mut ctx);
        assert!(!mocks.vitals.borrow().invulnerable);
        assert!(!ctx.phase_transition_pending);
        assert_eq!(ctx.current_phase, 0);
    }
}
