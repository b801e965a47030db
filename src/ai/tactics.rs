//! Group tactics
//!
//! Pure spatial helpers for coordinating several agents against one target.
//! Nothing here owns or mutates group state; callers pass positions in and
//! apply the results themselves.

use std::f32::consts::TAU;

use glam::Vec3;
use hecs::Entity;

/// Cap on how much a single neighbour contributes to a spread score.
const SPREAD_CAP: f32 = 5.0;

/// Weight of travel distance when scoring surround positions.
const TRAVEL_WEIGHT: f32 = 0.5;

/// Side of a threat to flank on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlankSide {
    /// Left of the threat direction
    Left,
    /// Right of the threat direction
    Right,
}

/// `count` points evenly spaced on a circle around `center`, starting on +X.
#[must_use]
pub fn surround_positions(center: Vec3, radius: f32, count: usize) -> Vec<Vec3> {
    (0..count)
        .map(|i| {
            let angle = TAU * i as f32 / count as f32;
            center + Vec3::new(angle.cos(), 0.0, angle.sin()) * radius
        })
        .collect()
}

/// Score of a surround candidate: short travel, far from everyone else.
#[must_use]
pub fn surround_score(candidate: Vec3, current: Vec3, others: &[Vec3]) -> f32 {
    let spread: f32 = others
        .iter()
        .map(|other| candidate.distance(*other).min(SPREAD_CAP))
        .sum();
    spread - TRAVEL_WEIGHT * candidate.distance(current)
}

/// Best surround candidate for an agent at `current`; first wins on ties.
#[must_use]
pub fn best_surround_position(candidates: &[Vec3], current: Vec3, others: &[Vec3]) -> Option<Vec3> {
    candidates
        .iter()
        .copied()
        .fold(None, |best: Option<(Vec3, f32)>, candidate| {
            let score = surround_score(candidate, current, others);
            match best {
                Some((_, best_score)) if best_score >= score => best,
                _ => Some((candidate, score)),
            }
        })
        .map(|(position, _)| position)
}

/// Point beside `target`, perpendicular to the direction the threat faces.
#[must_use]
pub fn flank_position(target: Vec3, threat_direction: Vec3, distance: f32, side: FlankSide) -> Vec3 {
    let forward = Vec3::new(threat_direction.x, 0.0, threat_direction.z).normalize_or_zero();
    let right = Vec3::new(-forward.z, 0.0, forward.x);
    let offset = match side {
        FlankSide::Right => right,
        FlankSide::Left => -right,
    };
    target + offset * distance
}

/// Check whether an agent should fall back.
///
/// The last living member uses the looser `last_member_threshold`.
#[must_use]
pub fn should_retreat(
    health_fraction: f32,
    threshold: f32,
    living_members: usize,
    last_member_threshold: f32,
) -> bool {
    health_fraction <= threshold || (living_members == 1 && health_fraction < last_member_threshold)
}

/// Point `distance` away from `threat`, continuing the line through `agent`.
#[must_use]
pub fn retreat_position(agent: Vec3, threat: Vec3, distance: f32) -> Vec3 {
    let away = Vec3::new(agent.x - threat.x, 0.0, agent.z - threat.z)
        .try_normalize()
        .unwrap_or(Vec3::X);
    agent + away * distance
}

/// Check whether another attacker slot can be granted.
///
/// The candidate must keep `min_spacing` from every current holder.
#[must_use]
pub fn slot_available(
    holder_positions: &[Vec3],
    candidate: Vec3,
    max_attackers: usize,
    min_spacing: f32,
) -> bool {
    holder_positions.len() < max_attackers
        && holder_positions
            .iter()
            .all(|holder| holder.distance(candidate) >= min_spacing)
}

/// Arithmetic mean of positions.
#[must_use]
pub fn centroid(positions: &[Vec3]) -> Option<Vec3> {
    if positions.is_empty() {
        return None;
    }
    let sum: Vec3 = positions.iter().copied().sum();
    Some(sum / positions.len() as f32)
}

/// Check whether any position strays more than `max_spread` from the centroid.
#[must_use]
pub fn is_scattered(positions: &[Vec3], max_spread: f32) -> bool {
    centroid(positions).is_some_and(|center| {
        positions
            .iter()
            .any(|position| position.distance(center) > max_spread)
    })
}

/// Member farthest from the centroid.
#[must_use]
pub fn most_isolated(members: &[(Entity, Vec3)]) -> Option<Entity> {
    let positions: Vec<Vec3> = members.iter().map(|(_, position)| *position).collect();
    let center = centroid(&positions)?;
    members
        .iter()
        .fold(None, |best: Option<(Entity, f32)>, (entity, position)| {
            let distance = position.distance(center);
            match best {
                Some((_, best_distance)) if best_distance >= distance => best,
                _ => Some((*entity, distance)),
            }
        })
        .map(|(entity, _)| entity)
}
