//! Agent archetype data
//!
//! Static, shared configuration for one kind of agent: perception ranges,
//! behavior tuning, abilities and boss phases. Archetypes are loaded from RON
//! (Rusty Object Notation) or JSON and validated before use.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

/// An ability an agent can use from the Attack state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AbilityDescriptor {
    /// Ability name, reported with execution events
    pub name: String,
    /// Maximum use range
    pub range: f32,
    /// Minimum use range (0 for melee)
    pub min_range: f32,
    /// Seconds between uses
    pub cooldown: f32,
    /// Windup duration before the ability fires
    pub windup: f32,
    /// Recovery duration after the execute window
    pub recovery: f32,
    /// Base damage handed to the executor
    pub damage: f32,
    /// Rotate towards the target during windup
    pub face_target: bool,
    /// Requires an unobstructed line to the target
    pub requires_line_of_sight: bool,
    /// Animation trigger fired when the windup starts
    pub trigger: String,
}

impl AbilityDescriptor {
    /// Check whether `distance` lies inside the usable band.
    #[must_use]
    pub fn in_range(&self, distance: f32) -> bool {
        distance >= self.min_range && distance <= self.range
    }
}

impl Default for AbilityDescriptor {
    fn default() -> Self {
        Self {
            name: String::from("strike"),
            range: 2.0,
            min_range: 0.0,
            cooldown: 1.5,
            windup: 0.4,
            recovery: 0.6,
            damage: 10.0,
            face_target: true,
            requires_line_of_sight: false,
            trigger: String::from("attack"),
        }
    }
}

/// One stage of a multi-phase boss.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BossPhase {
    /// Display name
    pub name: String,
    /// Entered when the health fraction first drops to or below this value
    pub health_threshold: f32,
    /// Replaces the archetype abilities while active (empty keeps them)
    pub abilities: SmallVec<[AbilityDescriptor; 2]>,
    /// Multiplier handed to the ability executor
    pub damage_multiplier: f32,
    /// Multiplier applied to every movement speed
    pub speed_multiplier: f32,
    /// Animation trigger fired when the transition starts
    pub enter_trigger: String,
}

impl Default for BossPhase {
    fn default() -> Self {
        Self {
            name: String::from("Phase"),
            health_threshold: 0.5,
            abilities: SmallVec::new(),
            damage_multiplier: 1.0,
            speed_multiplier: 1.0,
            enter_trigger: String::from("phase_change"),
        }
    }
}

/// Sensor ranges and memory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PerceptionSettings {
    /// Maximum sight distance
    pub sight_range: f32,
    /// Full field-of-view angle in degrees
    pub sight_angle: f32,
    /// Hearing distance for a noise level of 1.0
    pub hearing_range: f32,
    /// Seconds a target stays known after it was last sensed
    pub memory_duration: f32,
    /// Seconds between sensor sweeps
    pub update_interval: f32,
    /// Maximum number of remembered targets
    pub max_tracked: usize,
    /// Slack allowed when comparing an occluder hit with the target distance
    pub occlusion_tolerance: f32,
    /// Height of the eyes above the agent origin
    pub eye_height: f32,
}

impl Default for PerceptionSettings {
    fn default() -> Self {
        Self {
            sight_range: 15.0,
            sight_angle: 120.0,
            hearing_range: 8.0,
            memory_duration: 5.0,
            update_interval: 0.2,
            max_tracked: 8,
            occlusion_tolerance: 0.5,
            eye_height: 1.6,
        }
    }
}

/// Timers, speeds and distances used by the behavior states.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BehaviorTuning {
    /// Idle seconds before patrolling
    pub idle_timeout: f32,
    /// Radius around home for patrol points
    pub patrol_radius: f32,
    /// Patrol speed as a fraction of base speed
    pub patrol_speed_factor: f32,
    /// Seconds before a patrol point is abandoned
    pub patrol_timeout: f32,
    /// Seconds without displacement before the agent counts as stuck
    pub stuck_time: f32,
    /// Displacement below which the agent counts as not moving
    pub stuck_epsilon: f32,
    /// Distance at which a destination counts as reached
    pub arrival_threshold: f32,
    /// Search radius when snapping points onto traversable space
    pub traversable_search_radius: f32,
    /// Investigate speed as a fraction of base speed
    pub investigate_speed_factor: f32,
    /// Seconds before investigating gives up
    pub investigate_timeout: f32,
    /// Seconds spent looking around at the investigated point
    pub look_around_duration: f32,
    /// Chase speed as a fraction of base speed
    pub chase_speed_factor: f32,
    /// Seconds between chase re-paths
    pub repath_interval: f32,
    /// Seconds of chasing outside sight range before giving up
    pub chase_give_up_time: f32,
    /// Distance kept inside optimal range when positioning
    pub positioning_buffer: f32,
    /// Seconds before positioning falls back to chasing
    pub positioning_timeout: f32,
    /// Angular offsets in degrees tried when positioning
    pub positioning_angles: Vec<f32>,
    /// Duration of the attack execute window
    pub execute_window: f32,
    /// Seconds of stagger in Hurt
    pub stagger_duration: f32,
    /// Health fraction at or below which a hurt agent flees
    pub flee_health_threshold: f32,
    /// Flee speed as a fraction of base speed
    pub flee_speed_factor: f32,
    /// Distance of each flee leg
    pub flee_distance: f32,
    /// Distance from the threat at which fleeing stops
    pub flee_safe_distance: f32,
    /// Maximum seconds spent fleeing
    pub max_flee_duration: f32,
    /// Seconds between flee destination picks
    pub flee_repick_interval: f32,
    /// Maximum random deflection of the flee direction in degrees
    pub flee_deflection: f32,
    /// Seconds a boss spends in a phase transition
    pub phase_transition_duration: f32,
    /// Seconds between death and removal
    pub despawn_delay: f32,
}

impl Default for BehaviorTuning {
    fn default() -> Self {
        Self {
            idle_timeout: 3.0,
            patrol_radius: 10.0,
            patrol_speed_factor: 0.5,
            patrol_timeout: 15.0,
            stuck_time: 2.0,
            stuck_epsilon: 0.05,
            arrival_threshold: 0.75,
            traversable_search_radius: 3.0,
            investigate_speed_factor: 0.6,
            investigate_timeout: 12.0,
            look_around_duration: 3.0,
            chase_speed_factor: 1.0,
            repath_interval: 0.5,
            chase_give_up_time: 10.0,
            positioning_buffer: 1.0,
            positioning_timeout: 5.0,
            positioning_angles: vec![0.0, 30.0, -30.0, 60.0, -60.0, 90.0, -90.0],
            execute_window: 0.15,
            stagger_duration: 0.5,
            flee_health_threshold: 0.25,
            flee_speed_factor: 1.3,
            flee_distance: 8.0,
            flee_safe_distance: 20.0,
            max_flee_duration: 8.0,
            flee_repick_interval: 1.5,
            flee_deflection: 35.0,
            phase_transition_duration: 2.0,
            despawn_delay: 3.0,
        }
    }
}

/// Static configuration shared by every agent of one kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Archetype {
    /// Archetype name
    pub name: String,
    /// Maximum health used when spawning
    pub max_health: f32,
    /// Movement speed before state factors and phase multipliers
    pub base_speed: f32,
    /// Wander between random points when idle
    pub can_patrol: bool,
    /// Walk to the last known position after losing a target
    pub can_investigate: bool,
    /// Run away when badly hurt
    pub can_flee: bool,
    /// Enter Hurt when damaged
    pub can_stagger: bool,
    /// Sensor configuration
    pub perception: PerceptionSettings,
    /// Behavior configuration
    pub tuning: BehaviorTuning,
    /// Abilities in preference order
    pub abilities: Vec<AbilityDescriptor>,
    /// Boss phases, ordered by descending threshold (empty for regular agents)
    pub phases: Vec<BossPhase>,
}

impl Default for Archetype {
    fn default() -> Self {
        Self {
            name: String::from("Unnamed"),
            max_health: 100.0,
            base_speed: 4.0,
            can_patrol: true,
            can_investigate: true,
            can_flee: false,
            can_stagger: true,
            perception: PerceptionSettings::default(),
            tuning: BehaviorTuning::default(),
            abilities: vec![AbilityDescriptor::default()],
            phases: Vec::new(),
        }
    }
}

impl Archetype {
    /// Parse and validate an archetype from a RON string
    ///
    /// # Errors
    ///
    /// Returns an error if parsing or validation fails
    pub fn from_ron_str(source: &str) -> Result<Self, ArchetypeError> {
        let archetype: Archetype = ron::from_str(source)?;
        archetype.validate()?;
        Ok(archetype)
    }

    /// Parse and validate an archetype from a JSON string
    ///
    /// # Errors
    ///
    /// Returns an error if parsing or validation fails
    pub fn from_json_str(source: &str) -> Result<Self, ArchetypeError> {
        let archetype: Archetype = serde_json::from_str(source)?;
        archetype.validate()?;
        Ok(archetype)
    }

    /// Load an archetype from a RON file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed or validated
    pub fn load_ron(path: impl AsRef<Path>) -> Result<Self, ArchetypeError> {
        let content = fs::read_to_string(path)?;
        Self::from_ron_str(&content)
    }

    /// Load an archetype from a JSON file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed or validated
    pub fn load_json(path: impl AsRef<Path>) -> Result<Self, ArchetypeError> {
        let content = fs::read_to_string(path)?;
        Self::from_json_str(&content)
    }

    /// Serialize to pretty RON
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails
    pub fn to_ron_string(&self) -> Result<String, ArchetypeError> {
        Ok(ron::ser::to_string_pretty(
            self,
            ron::ser::PrettyConfig::default(),
        )?)
    }

    /// Whether this archetype has boss phases.
    #[must_use]
    pub fn is_boss(&self) -> bool {
        !self.phases.is_empty()
    }

    /// Phase descriptor for a 1-based phase index.
    #[must_use]
    pub fn phase(&self, index: usize) -> Option<&BossPhase> {
        index.checked_sub(1).and_then(|i| self.phases.get(i))
    }

    /// Check value ranges and orderings.
    ///
    /// # Errors
    ///
    /// Returns [`ArchetypeError::Invalid`] describing the first bad value
    pub fn validate(&self) -> Result<(), ArchetypeError> {
        let invalid = |msg: String| Err(ArchetypeError::Invalid(format!("{}: {msg}", self.name)));
        let p = &self.perception;
        let t = &self.tuning;

        if self.max_health <= 0.0 {
            return invalid(format!("max_health must be positive, got {}", self.max_health));
        }
        if self.base_speed < 0.0 {
            return invalid(format!("base_speed must not be negative, got {}", self.base_speed));
        }
        if p.sight_angle <= 0.0 || p.sight_angle > 360.0 {
            return invalid(format!("sight_angle must be in (0, 360], got {}", p.sight_angle));
        }
        if p.sight_range < 0.0 || p.hearing_range < 0.0 {
            return invalid("sensor ranges must not be negative".into());
        }
        if p.max_tracked == 0 {
            return invalid("max_tracked must be at least 1".into());
        }
        if p.update_interval < 0.0 || p.memory_duration < 0.0 {
            return invalid("perception timings must not be negative".into());
        }
        if !(0.0..=1.0).contains(&t.flee_health_threshold) {
            return invalid(format!(
                "flee_health_threshold must be in [0, 1], got {}",
                t.flee_health_threshold
            ));
        }
        if t.flee_safe_distance <= 0.0 {
            return invalid("flee_safe_distance must be positive".into());
        }
        if t.repath_interval <= 0.0 || t.flee_repick_interval <= 0.0 {
            return invalid("re-path intervals must be positive".into());
        }
        if t.positioning_angles.is_empty() {
            return invalid("positioning_angles must not be empty".into());
        }
        for ability in self.abilities.iter().chain(self.phases.iter().flat_map(|p| &p.abilities)) {
            if ability.range < ability.min_range {
                return invalid(format!("ability {} has range below min_range", ability.name));
            }
            if ability.windup < 0.0 || ability.recovery < 0.0 || ability.cooldown < 0.0 {
                return invalid(format!("ability {} has a negative timing", ability.name));
            }
        }

        let mut previous = f32::INFINITY;
        for (i, phase) in self.phases.iter().enumerate() {
            if !(0.0..=1.0).contains(&phase.health_threshold) {
                return invalid(format!(
                    "phase {} threshold must be in [0, 1], got {}",
                    i + 1,
                    phase.health_threshold
                ));
            }
            if phase.health_threshold >= previous {
                return invalid(format!("phase {} threshold is not descending", i + 1));
            }
            if phase.speed_multiplier <= 0.0 || phase.damage_multiplier < 0.0 {
                return invalid(format!("phase {} has an invalid multiplier", i + 1));
            }
            previous = phase.health_threshold;
        }
        Ok(())
    }
}

/// Errors that can occur while loading archetypes
#[derive(Debug, thiserror::Error)]
pub enum ArchetypeError {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    /// RON parse error
    #[error("RON error: {0}")]
    Ron(#[from] ron::error::SpannedError),
    /// RON serialization error
    #[error("RON serialization error: {0}")]
    RonSerialize(#[from] ron::Error),
    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    /// A value is out of range
    #[error("invalid archetype: {0}")]
    Invalid(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_validate() {
        assert!(Archetype::default().validate().is_ok());
    }

    #[test]
    fn test_ron_partial_document_uses_defaults() {
        let source = r#"(
            name: "Grunt",
            base_speed: 5.0,
            tuning: (idle_timeout: 1.5),
        )"#;
        let archetype = Archetype::from_ron_str(source).unwrap();
        assert_eq!(archetype.name, "Grunt");
        assert!((archetype.tuning.idle_timeout - 1.5).abs() < f32::EPSILON);
        assert!((archetype.tuning.stuck_time - 2.0).abs() < f32::EPSILON);
        assert_eq!(archetype.abilities.len(), 1);
    }

    #[test]
    fn test_ron_serialization_roundtrip() {
        let mut archetype = Archetype::default();
        archetype.name = "Warden".to_string();
        let text = archetype.to_ron_string().unwrap();
        assert!(text.contains("Warden"));
        let loaded = Archetype::from_ron_str(&text).unwrap();
        assert_eq!(loaded, archetype);
    }

    #[test]
    fn test_json_loading() {
        let source = r#"{ "name": "Archer", "can_flee": true,
            "abilities": [{ "name": "shot", "range": 12.0, "requires_line_of_sight": true }] }"#;
        let archetype = Archetype::from_json_str(source).unwrap();
        assert!(archetype.can_flee);
        assert_eq!(archetype.abilities[0].name, "shot");
        assert!(archetype.abilities[0].requires_line_of_sight);
    }

    #[test]
    fn test_phase_thresholds_must_descend() {
        let archetype = Archetype {
            phases: vec![
                BossPhase {
                    health_threshold: 0.4,
                    ..Default::default()
                },
                BossPhase {
                    health_threshold: 0.7,
                    ..Default::default()
                },
            ],
            ..Default::default()
        };
        assert!(matches!(archetype.validate(), Err(ArchetypeError::Invalid(_))));
    }

    #[test]
    fn test_invalid_flee_threshold() {
        let mut archetype = Archetype::default();
        archetype.tuning.flee_health_threshold = 1.5;
        assert!(archetype.validate().is_err());
    }

    #[test]
    fn test_phase_lookup_is_one_based() {
        let archetype = Archetype {
            phases: vec![BossPhase {
                name: "Enraged".into(),
                ..Default::default()
            }],
            ..Default::default()
        };
        assert!(archetype.phase(0).is_none());
        assert_eq!(archetype.phase(1).map(|p| p.name.as_str()), Some("Enraged"));
        assert!(archetype.phase(2).is_none());
    }

    #[test]
    fn test_ability_range_band() {
        let ability = AbilityDescriptor {
            range: 10.0,
            min_range: 3.0,
            ..Default::default()
        };
        assert!(!ability.in_range(2.0));
        assert!(ability.in_range(3.0));
        assert!(ability.in_range(10.0));
        assert!(!ability.in_range(10.5));
    }

    #[test]
    fn test_bundled_archetypes_load() {
        let grunt = Archetype::from_ron_str(include_str!("../../data/grunt.ron")).unwrap();
        assert_eq!(grunt.name, "Grunt");
        assert!(!grunt.is_boss());

        let warlord = Archetype::from_ron_str(include_str!("../../data/warlord.ron")).unwrap();
        assert!(warlord.is_boss());
        assert_eq!(warlord.phases.len(), 3);
        assert_eq!(warlord.phase(2).map(|p| p.name.as_str()), Some("Berserk"));
    }
}
