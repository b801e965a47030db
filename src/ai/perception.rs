//! Target perception
//!
//! Each agent owns a [`PerceptionTracker`] that remembers what it has seen or
//! heard recently and picks a single primary target for the behavior states.
//! Sensor sweeps are throttled; memory decay and target selection run every
//! tick.

use glam::Vec3;
use hecs::Entity;

use super::capabilities::OverlapFilter;
use super::context::AgentContext;
use crate::core::AgentEvent;

/// What an agent knows about one sensed entity.
#[derive(Debug, Clone, PartialEq)]
pub struct PerceptionTarget {
    /// Sensed entity
    pub entity: Entity,
    /// Position at the last successful sensing
    pub last_known_position: Vec3,
    /// Time the entity was last seen
    pub last_seen: f32,
    /// Time the entity was last heard
    pub last_heard: f32,
    /// Seen during the latest sweep
    pub visible: bool,
    /// Heard during the latest sweep
    pub audible: bool,
    /// Distance at the latest sweep
    pub distance: f32,
    /// Priority reported by the world
    pub priority: i32,
    /// Insertion order, used as the final tie-break
    order: u64,
}

impl PerceptionTarget {
    /// Time of the most recent sensing of any kind.
    #[must_use]
    pub fn last_perceived(&self) -> f32 {
        self.last_seen.max(self.last_heard)
    }

    /// Seconds since the entity was last seen or heard.
    #[must_use]
    pub fn time_since_perceived(&self, now: f32) -> f32 {
        now - self.last_perceived()
    }

    /// Check whether the entity is still remembered.
    #[must_use]
    pub fn in_memory(&self, now: f32, memory_duration: f32) -> bool {
        self.time_since_perceived(now) <= memory_duration
    }

    /// Selection score: priority dominates, then sensing, then proximity.
    #[must_use]
    pub fn score(&self) -> f32 {
        let mut score = self.priority as f32 * 100.0 - self.distance;
        if self.visible {
            score += 50.0;
        }
        if self.audible {
            score += 25.0;
        }
        score
    }
}

/// Per-agent memory of sensed entities.
#[derive(Debug, Default)]
pub struct PerceptionTracker {
    targets: Vec<PerceptionTarget>,
    primary: Option<Entity>,
    next_sweep_at: f32,
    next_order: u64,
}

impl PerceptionTracker {
    /// Create an empty tracker.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Advance perception and write the primary target into the context.
    pub fn update(&mut self, ctx: &mut AgentContext) {
        if let Some(dropped) = ctx.dropped_target.take() {
            self.forget(dropped);
        }

        let now = ctx.now;
        if now >= self.next_sweep_at {
            self.sweep(ctx);
            self.next_sweep_at = now + ctx.archetype().perception.update_interval;
        }

        let settings = &ctx.archetype().perception;
        let (memory, max_tracked) = (settings.memory_duration, settings.max_tracked);
        let spatial = &ctx.spatial;
        self.targets
            .retain(|t| spatial.is_valid(t.entity) && t.in_memory(now, memory));
        // Alerts can push past the cap between sweeps
        self.enforce_capacity(max_tracked);

        self.publish(ctx);
    }

    fn sweep(&mut self, ctx: &AgentContext) {
        let settings = &ctx.archetype().perception;
        let now = ctx.now;
        let origin = ctx.position();
        let forward = ctx.movement.forward();
        let radius = settings.sight_range.max(settings.hearing_range);

        for target in &mut self.targets {
            target.visible = false;
            target.audible = false;
            target.distance = ctx.spatial.distance(origin, target.last_known_position);
        }

        let candidates = ctx
            .spatial
            .overlap_sphere(origin, radius, OverlapFilter::excluding(ctx.id()));
        for candidate in candidates {
            let Some(position) = ctx.spatial.position_of(candidate) else {
                continue;
            };
            let distance = ctx.spatial.distance(origin, position);
            let visible = Self::can_see(ctx, origin, forward, position, distance);
            let audible =
                distance <= settings.hearing_range * ctx.spatial.noise_level(candidate);
            let priority = ctx.spatial.target_priority(candidate);

            if let Some(existing) = self.targets.iter_mut().find(|t| t.entity == candidate) {
                existing.distance = distance;
                existing.priority = priority;
                existing.visible = visible;
                existing.audible = audible;
                if visible {
                    existing.last_seen = now;
                }
                if audible {
                    existing.last_heard = now;
                }
                if visible || audible {
                    existing.last_known_position = position;
                }
            } else if visible || audible {
                let order = self.next_order;
                self.next_order += 1;
                self.targets.push(PerceptionTarget {
                    entity: candidate,
                    last_known_position: position,
                    last_seen: if visible { now } else { f32::NEG_INFINITY },
                    last_heard: if audible { now } else { f32::NEG_INFINITY },
                    visible,
                    audible,
                    distance,
                    priority,
                    order,
                });
            }
        }
    }

    fn can_see(
        ctx: &AgentContext,
        origin: Vec3,
        forward: Vec3,
        position: Vec3,
        distance: f32,
    ) -> bool {
        let settings = &ctx.archetype().perception;
        if distance > settings.sight_range {
            return false;
        }

        let to_target = Vec3::new(position.x - origin.x, 0.0, position.z - origin.z);
        let facing = Vec3::new(forward.x, 0.0, forward.z);
        if settings.sight_angle < 360.0 && to_target.length_squared() > f32::EPSILON {
            let half_angle = (settings.sight_angle * 0.5).to_radians();
            if facing.normalize_or_zero().angle_between(to_target.normalize()) > half_angle {
                return false;
            }
        }

        let lift = Vec3::Y * settings.eye_height;
        let eye = origin + lift;
        let aim = position + lift;
        let length = eye.distance(aim);
        ctx.spatial
            .first_obstruction(eye, aim, Some(ctx.id()))
            .is_none_or(|hit| hit + settings.occlusion_tolerance >= length)
    }

    fn enforce_capacity(&mut self, max_tracked: usize) {
        while self.targets.len() > max_tracked.max(1) {
            let stalest = self
                .targets
                .iter()
                .enumerate()
                .min_by(|(_, a), (_, b)| {
                    a.last_perceived()
                        .total_cmp(&b.last_perceived())
                        .then(a.order.cmp(&b.order))
                })
                .map(|(index, _)| index);
            match stalest {
                Some(index) => {
                    self.targets.remove(index);
                }
                None => break,
            }
        }
    }

    /// Best remembered target.
    ///
    /// Ties on score go to the closer target, then to the one tracked first.
    #[must_use]
    pub fn select_primary(&self, now: f32, memory_duration: f32) -> Option<&PerceptionTarget> {
        self.targets
            .iter()
            .filter(|t| t.in_memory(now, memory_duration))
            .fold(None, |best: Option<&PerceptionTarget>, candidate| match best {
                None => Some(candidate),
                Some(current) => {
                    let better = candidate
                        .score()
                        .total_cmp(&current.score())
                        .then(current.distance.total_cmp(&candidate.distance))
                        .then(current.order.cmp(&candidate.order))
                        .is_gt();
                    Some(if better { candidate } else { current })
                }
            })
    }

    fn publish(&mut self, ctx: &mut AgentContext) {
        let now = ctx.now;
        let memory = ctx.archetype().perception.memory_duration;
        let selected = self
            .select_primary(now, memory)
            .map(|t| (t.entity, t.last_known_position, t.time_since_perceived(now), t.visible));

        match selected {
            Some((entity, position, since, visible)) => {
                ctx.target = Some(entity);
                ctx.last_known_target_position = Some(position);
                ctx.time_since_target_sensed = since;
                ctx.target_visible = visible;
            }
            None => {
                ctx.target = None;
                ctx.target_visible = false;
                ctx.time_since_target_sensed = f32::INFINITY;
            }
        }

        let primary = selected.map(|(entity, ..)| entity);
        if primary != self.primary {
            match primary {
                Some(target) => {
                    log::debug!("{:?} acquired target {target:?}", ctx.id());
                    ctx.emit(AgentEvent::TargetAcquired {
                        agent: ctx.id(),
                        target,
                    });
                }
                None => {
                    log::debug!("{:?} lost its target", ctx.id());
                    ctx.emit(AgentEvent::TargetLost { agent: ctx.id() });
                }
            }
            self.primary = primary;
        }
    }

    /// Inject or refresh a heard target without a sensor sweep.
    pub fn alert(&mut self, entity: Entity, position: Vec3, now: f32, origin: Vec3) {
        let distance = origin.distance(position);
        if let Some(existing) = self.targets.iter_mut().find(|t| t.entity == entity) {
            existing.last_known_position = position;
            existing.last_heard = now;
            existing.distance = distance;
            return;
        }
        let order = self.next_order;
        self.next_order += 1;
        self.targets.push(PerceptionTarget {
            entity,
            last_known_position: position,
            last_seen: f32::NEG_INFINITY,
            last_heard: now,
            visible: false,
            audible: false,
            distance,
            priority: 0,
            order,
        });
    }

    /// Drop one remembered entity.
    pub fn forget(&mut self, entity: Entity) {
        self.targets.retain(|t| t.entity != entity);
    }

    /// Forget everything.
    pub fn clear(&mut self) {
        self.targets.clear();
    }

    /// Force the next update to run a sensor sweep.
    pub fn sweep_next_update(&mut self) {
        self.next_sweep_at = f32::NEG_INFINITY;
    }

    /// Remembered targets in tracking order.
    #[must_use]
    pub fn targets(&self) -> &[PerceptionTarget] {
        &self.targets
    }

    /// Memory entry for one entity.
    #[must_use]
    pub fn get(&self, entity: Entity) -> Option<&PerceptionTarget> {
        self.targets.iter().find(|t| t.entity == entity)
    }

    /// Primary target published on the last update.
    #[must_use]
    pub fn primary(&self) -> Option<Entity> {
        self.primary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::archetype::Archetype;
    use crate::ai::testing::{context, entities};

    fn archetype() -> Archetype {
        let mut archetype = Archetype::default();
        archetype.perception.sight_range = 10.0;
        archetype.perception.sight_angle = 90.0;
        archetype.perception.hearing_range = 4.0;
        archetype.perception.memory_duration = 2.0;
        archetype.perception.update_interval = 0.0;
        archetype
    }

    #[test]
    fn test_sees_target_in_cone() {
        let (mut ctx, mocks) = context(archetype());
        let target = entities(1)[0];
        mocks.world.place(target, Vec3::new(0.0, 0.0, -6.0));

        let mut tracker = PerceptionTracker::new();
        tracker.update(&mut ctx);

        assert_eq!(ctx.target, Some(target));
        assert!(ctx.target_visible);
        assert_eq!(ctx.last_known_target_position, Some(Vec3::new(0.0, 0.0, -6.0)));
        assert_eq!(ctx.take_events(), vec![AgentEvent::TargetAcquired { agent: ctx.id(), target }]);
    }

    #[test]
    fn test_ignores_target_behind_unless_heard() {
        let (mut ctx, mocks) = context(archetype());
        let handles = entities(2);
        let (far, near) = (handles[0], handles[1]);
        mocks.world.place(far, Vec3::new(0.0, 0.0, 6.0));
        mocks.world.place(near, Vec3::new(0.0, 0.0, 3.0));

        let mut tracker = PerceptionTracker::new();
        tracker.update(&mut ctx);

        assert!(tracker.get(far).is_none());
        let heard = tracker.get(near).map(|t| (t.visible, t.audible));
        assert_eq!(heard, Some((false, true)));
        assert_eq!(ctx.target, Some(near));
    }

    #[test]
    fn test_noise_scales_hearing() {
        let (mut ctx, mocks) = context(archetype());
        let target = entities(1)[0];
        mocks.world.place(target, Vec3::new(0.0, 0.0, 7.0));
        mocks.world.set_noise(target, 2.0);

        let mut tracker = PerceptionTracker::new();
        tracker.update(&mut ctx);
        assert_eq!(ctx.target, Some(target));
    }

    #[test]
    fn test_occluded_target_not_seen() {
        let (mut ctx, mocks) = context(archetype());
        let target = entities(1)[0];
        mocks.world.place(target, Vec3::new(0.0, 0.0, -8.0));
        mocks.world.block(Vec3::new(0.0, 1.6, -4.0), 1.0);

        let mut tracker = PerceptionTracker::new();
        tracker.update(&mut ctx);
        assert_eq!(ctx.target, None);
    }

    #[test]
    fn test_hit_within_tolerance_does_not_occlude() {
        let (mut ctx, mocks) = context(archetype());
        let target = entities(1)[0];
        mocks.world.place(target, Vec3::new(0.0, 0.0, -8.0));
        mocks.world.block(Vec3::new(0.0, 1.6, -8.2), 0.5);

        let mut tracker = PerceptionTracker::new();
        tracker.update(&mut ctx);
        assert_eq!(ctx.target, Some(target));
    }

    #[test]
    fn test_memory_expires_and_purges() {
        let (mut ctx, mocks) = context(archetype());
        let target = entities(1)[0];
        mocks.world.place(target, Vec3::new(0.0, 0.0, -6.0));

        let mut tracker = PerceptionTracker::new();
        tracker.update(&mut ctx);
        mocks.world.place(target, Vec3::new(0.0, 0.0, 30.0));

        ctx.now = 1.5;
        tracker.update(&mut ctx);
        assert_eq!(ctx.target, Some(target));
        assert!(!ctx.target_visible);
        assert!((ctx.time_since_target_sensed - 1.5).abs() < f32::EPSILON);

        ctx.now = 2.5;
        tracker.update(&mut ctx);
        assert_eq!(ctx.target, None);
        assert!(tracker.targets().is_empty());
        assert_eq!(ctx.last_known_target_position, Some(Vec3::new(0.0, 0.0, -6.0)));
        assert!(ctx.take_events().contains(&AgentEvent::TargetLost { agent: ctx.id() }));
    }

    #[test]
    fn test_destroyed_target_is_purged() {
        let (mut ctx, mocks) = context(archetype());
        let target = entities(1)[0];
        mocks.world.place(target, Vec3::new(0.0, 0.0, -6.0));

        let mut tracker = PerceptionTracker::new();
        tracker.update(&mut ctx);
        mocks.world.remove(target);
        ctx.now = 0.25;
        tracker.update(&mut ctx);
        assert_eq!(ctx.target, None);
    }

    #[test]
    fn test_priority_beats_distance() {
        let (mut ctx, mocks) = context(archetype());
        let handles = entities(2);
        let (near, far) = (handles[0], handles[1]);
        mocks.world.place(near, Vec3::new(0.0, 0.0, -2.0));
        mocks.world.place(far, Vec3::new(0.0, 0.0, -9.0));
        mocks.world.set_priority(far, 1);

        let mut tracker = PerceptionTracker::new();
        tracker.update(&mut ctx);
        assert_eq!(ctx.target, Some(far));
    }

    #[test]
    fn test_equal_scores_prefer_closer_then_first_tracked() {
        let mut tracker = PerceptionTracker::new();
        let handles = entities(3);
        let (a, b, c) = (handles[0], handles[1], handles[2]);
        tracker.alert(a, Vec3::new(0.0, 0.0, 5.0), 0.0, Vec3::ZERO);
        tracker.alert(b, Vec3::new(0.0, 0.0, -5.0), 0.0, Vec3::ZERO);
        assert_eq!(tracker.select_primary(0.0, 1.0).map(|t| t.entity), Some(a));

        // Seen at 30 and heard at 5 both score 20
        tracker.alert(c, Vec3::new(5.0, 0.0, 0.0), 0.0, Vec3::ZERO);
        for entry in &mut tracker.targets {
            if entry.entity == a {
                entry.visible = true;
                entry.distance = 30.0;
            } else if entry.entity == c {
                entry.audible = true;
            }
        }
        assert_eq!(tracker.select_primary(0.0, 1.0).map(|t| t.entity), Some(c));
    }

    #[test]
    fn test_capacity_evicts_least_recently_perceived() {
        let mut tracker = PerceptionTracker::new();
        let handles = entities(3);
        for (i, entity) in handles.iter().enumerate() {
            tracker.alert(*entity, Vec3::ZERO, i as f32, Vec3::ZERO);
        }
        tracker.enforce_capacity(2);
        assert!(tracker.get(handles[0]).is_none());
        assert_eq!(tracker.targets().len(), 2);
    }

    #[test]
    fn test_alerts_between_sweeps_respect_capacity() {
        let mut archetype = archetype();
        archetype.perception.max_tracked = 1;
        archetype.perception.update_interval = 10.0;
        let (mut ctx, mocks) = context(archetype);
        let handles = entities(3);
        mocks.world.place(handles[0], Vec3::new(0.0, 0.0, -6.0));
        mocks.world.place(handles[1], Vec3::new(0.0, 0.0, 50.0));
        mocks.world.place(handles[2], Vec3::new(0.0, 0.0, -50.0));

        let mut tracker = PerceptionTracker::new();
        tracker.update(&mut ctx);
        assert_eq!(ctx.target, Some(handles[0]));

        ctx.now = 0.5;
        tracker.alert(handles[1], Vec3::new(0.0, 0.0, 50.0), ctx.now, Vec3::ZERO);
        tracker.alert(handles[2], Vec3::new(0.0, 0.0, -50.0), ctx.now, Vec3::ZERO);
        tracker.update(&mut ctx);

        assert_eq!(tracker.targets().len(), 1);
        assert_eq!(ctx.target, Some(handles[2]));
    }

    #[test]
    fn test_sweeps_are_throttled() {
        let mut archetype = archetype();
        archetype.perception.update_interval = 1.0;
        let (mut ctx, mocks) = context(archetype);
        let target = entities(1)[0];

        let mut tracker = PerceptionTracker::new();
        tracker.update(&mut ctx);
        mocks.world.place(target, Vec3::new(0.0, 0.0, -6.0));

        ctx.now = 0.5;
        tracker.update(&mut ctx);
        assert_eq!(ctx.target, None);

        ctx.now = 1.0;
        tracker.update(&mut ctx);
        assert_eq!(ctx.target, Some(target));
    }

    #[test]
    fn test_dropped_target_is_forgotten() {
        let (mut ctx, mocks) = context(archetype());
        let target = entities(1)[0];
        mocks.world.place(target, Vec3::new(0.0, 0.0, -6.0));

        let mut tracker = PerceptionTracker::new();
        tracker.update(&mut ctx);
        mocks.world.remove(target);
        mocks.world.place(target, Vec3::new(0.0, 0.0, 40.0));

        ctx.clear_target();
        ctx.now = 0.25;
        tracker.update(&mut ctx);
        assert_eq!(ctx.target, None);
        assert!(tracker.get(target).is_none());
    }
}
