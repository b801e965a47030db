//! Agent groups
//!
//! An [`AgentGroup`] owns membership and attacker slots for a set of agents.
//! Membership changes are queued and applied together at the start of
//! [`AgentGroup::coordinate`], so every caller within one tick sees the same
//! member list.

use glam::Vec3;
use hecs::Entity;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use super::states::AgentState;
use super::tactics;

/// Read and write access to the agents a group coordinates.
pub trait GroupMembers {
    /// Current state of a member, `None` if it no longer exists.
    fn member_state(&self, member: Entity) -> Option<AgentState>;

    /// Current position of a member.
    fn member_position(&self, member: Entity) -> Option<Vec3>;

    /// Health fraction of a member.
    fn member_health(&self, member: Entity) -> Option<f32>;

    /// Best known target position of a member.
    fn member_target_position(&self, member: Entity) -> Option<Vec3>;

    /// Grant or revoke permission to start attacks.
    fn set_attack_permitted(&mut self, member: Entity, permitted: bool);

    /// Override or clear the member's chase destination.
    fn set_tactical_destination(&mut self, member: Entity, destination: Option<Vec3>);
}

/// Group tuning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GroupSettings {
    /// Maximum simultaneous attackers
    pub max_attackers: usize,
    /// Minimum distance between attackers
    pub min_spacing: f32,
    /// Radius of the ring waiting members hold around the target
    pub surround_radius: f32,
    /// Health fraction at or below which a member retreats
    pub retreat_threshold: f32,
    /// Looser threshold for the last member standing
    pub last_member_retreat_threshold: f32,
    /// Distance from the centroid beyond which the group counts as scattered
    pub max_spread: f32,
}

impl Default for GroupSettings {
    fn default() -> Self {
        Self {
            max_attackers: 2,
            min_spacing: 1.5,
            surround_radius: 5.0,
            retreat_threshold: 0.2,
            last_member_retreat_threshold: 0.5,
            max_spread: 15.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MembershipChange {
    Join(Entity),
    Leave(Entity),
}

/// A coordinated set of agents.
#[derive(Debug)]
pub struct AgentGroup {
    name: String,
    settings: GroupSettings,
    members: Vec<Entity>,
    queued: Vec<MembershipChange>,
    slots: SmallVec<[Entity; 4]>,
}

impl AgentGroup {
    /// Create an empty group.
    pub fn new(name: impl Into<String>, settings: GroupSettings) -> Self {
        Self {
            name: name.into(),
            settings,
            members: Vec::new(),
            queued: Vec::new(),
            slots: SmallVec::new(),
        }
    }

    /// Group name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Group tuning.
    #[must_use]
    pub fn settings(&self) -> &GroupSettings {
        &self.settings
    }

    /// Queue a join, applied at the next tick boundary.
    pub fn join(&mut self, member: Entity) {
        self.queued.push(MembershipChange::Join(member));
    }

    /// Queue a leave, applied at the next tick boundary.
    pub fn leave(&mut self, member: Entity) {
        self.queued.push(MembershipChange::Leave(member));
    }

    /// Apply every queued membership change in order.
    pub fn apply_membership_changes(&mut self) {
        for change in std::mem::take(&mut self.queued) {
            match change {
                MembershipChange::Join(member) => {
                    if !self.members.contains(&member) {
                        self.members.push(member);
                    }
                }
                MembershipChange::Leave(member) => {
                    self.members.retain(|m| *m != member);
                    self.slots.retain(|m| *m != member);
                }
            }
        }
    }

    /// Current members.
    #[must_use]
    pub fn members(&self) -> &[Entity] {
        &self.members
    }

    /// Current attacker slot holders.
    #[must_use]
    pub fn slot_holders(&self) -> &[Entity] {
        &self.slots
    }

    /// Check whether `member` holds an attacker slot.
    #[must_use]
    pub fn holds_slot(&self, member: Entity) -> bool {
        self.slots.contains(&member)
    }

    /// Return a slot voluntarily.
    pub fn release_slot(&mut self, member: Entity) {
        self.slots.retain(|m| *m != member);
    }

    /// Drop slots whose holders disengaged or vanished.
    ///
    /// Returns how many slots were reclaimed.
    pub fn reclaim_slots(&mut self, members: &impl GroupMembers) -> usize {
        let before = self.slots.len();
        self.slots.retain(|holder| {
            members
                .member_state(*holder)
                .is_some_and(AgentState::is_engaged)
        });
        before - self.slots.len()
    }

    /// Ask for an attacker slot. Stale slots are reclaimed first.
    pub fn request_slot(&mut self, member: Entity, members: &impl GroupMembers) -> bool {
        self.reclaim_slots(members);
        if self.holds_slot(member) {
            return true;
        }
        let Some(position) = members.member_position(member) else {
            return false;
        };
        let holders: SmallVec<[Vec3; 4]> = self
            .slots
            .iter()
            .filter_map(|holder| members.member_position(*holder))
            .collect();
        if tactics::slot_available(
            &holders,
            position,
            self.settings.max_attackers,
            self.settings.min_spacing,
        ) {
            self.slots.push(member);
            true
        } else {
            false
        }
    }

    /// Run one coordination pass.
    ///
    /// Applies membership changes, drops members that died or vanished,
    /// reclaims and grants attacker slots, then writes attack permission and
    /// surround destinations into every member.
    pub fn coordinate(&mut self, members: &mut impl GroupMembers) {
        self.apply_membership_changes();
        self.members.retain(|member| {
            members
                .member_state(*member)
                .is_some_and(|state| state != AgentState::Dead)
        });
        self.reclaim_slots(&*members);

        let engaged: Vec<Entity> = self
            .members
            .iter()
            .copied()
            .filter(|m| members.member_state(*m).is_some_and(AgentState::is_engaged))
            .collect();
        for member in &engaged {
            self.request_slot(*member, &*members);
        }

        let ring_size = self.members.len().max(3);
        for member in self.members.clone() {
            let holds = self.holds_slot(member);
            members.set_attack_permitted(member, holds);

            let destination = if holds || !engaged.contains(&member) {
                None
            } else {
                self.surround_destination(member, ring_size, &*members)
            };
            members.set_tactical_destination(member, destination);
        }
    }

    fn surround_destination(
        &self,
        member: Entity,
        ring_size: usize,
        members: &impl GroupMembers,
    ) -> Option<Vec3> {
        let target = members.member_target_position(member)?;
        let current = members.member_position(member)?;
        let others: Vec<Vec3> = self
            .members
            .iter()
            .filter(|other| **other != member)
            .filter_map(|other| members.member_position(*other))
            .collect();
        let candidates = tactics::surround_positions(target, self.settings.surround_radius, ring_size);
        tactics::best_surround_position(&candidates, current, &others)
    }

    fn living_positions(&self, members: &impl GroupMembers) -> Vec<(Entity, Vec3)> {
        self.members
            .iter()
            .filter(|m| members.member_state(**m).is_some_and(|s| s != AgentState::Dead))
            .filter_map(|m| members.member_position(*m).map(|p| (*m, p)))
            .collect()
    }

    /// Centroid of living members.
    #[must_use]
    pub fn centroid(&self, members: &impl GroupMembers) -> Option<Vec3> {
        let positions: Vec<Vec3> = self.living_positions(members).iter().map(|(_, p)| *p).collect();
        tactics::centroid(&positions)
    }

    /// Check whether living members have drifted apart.
    #[must_use]
    pub fn is_scattered(&self, members: &impl GroupMembers) -> bool {
        let positions: Vec<Vec3> = self.living_positions(members).iter().map(|(_, p)| *p).collect();
        tactics::is_scattered(&positions, self.settings.max_spread)
    }

    /// Living member farthest from the centroid.
    #[must_use]
    pub fn most_isolated(&self, members: &impl GroupMembers) -> Option<Entity> {
        tactics::most_isolated(&self.living_positions(members))
    }

    /// Check whether `member` should fall back.
    #[must_use]
    pub fn should_retreat(&self, member: Entity, members: &impl GroupMembers) -> bool {
        let Some(health) = members.member_health(member) else {
            return false;
        };
        tactics::should_retreat(
            health,
            self.settings.retreat_threshold,
            self.living_positions(members).len(),
            self.settings.last_member_retreat_threshold,
        )
    }
}
