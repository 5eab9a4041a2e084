use serde::{Deserialize, Serialize};

use crate::pool::PoolTag;
use crate::{require_count, require_non_negative, require_positive, require_probability};
use crate::ConfigurationError;

/// Passed through to hosts; the agent controller itself always chases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum BehaviorKind {
    #[default]
    ChasePlayer,
    Patrol,
    Ambush,
    Ranged,
    Tank,
    Swarm,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpawnRules {
    pub min_wave: u32,
    pub spawn_weight: f32,
    /// Negative means unlimited; zero means never eligible.
    pub max_simultaneous: i32,
}

impl Default for SpawnRules {
    fn default() -> Self {
        Self {
            min_wave: 1,
            spawn_weight: 1.0,
            max_simultaneous: -1,
        }
    }
}

impl SpawnRules {
    pub fn allows(&self, wave: u32, active: u32) -> bool {
        if wave < self.min_wave {
            return false;
        }
        self.max_simultaneous < 0 || (active as i64) < i64::from(self.max_simultaneous)
    }
}

/// Per-wave growth factors: `base * (1 + (wave - 1) * factor)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StatScaling {
    pub health: f32,
    pub damage: f32,
    pub speed: f32,
}

impl Default for StatScaling {
    fn default() -> Self {
        Self {
            health: 0.1,
            damage: 0.05,
            speed: 0.02,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RewardProfile {
    pub experience_reward: u32,
    pub coin_drop_chance: f32,
    pub coin_amount: u32,
}

impl Default for RewardProfile {
    fn default() -> Self {
        Self {
            experience_reward: 10,
            coin_drop_chance: 0.3,
            coin_amount: 1,
        }
    }
}

/// Opaque audiovisual references; never interpreted by the simulation
/// except `death_effect`, which gates death-effect spawning.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PresentationHooks {
    pub material: Option<String>,
    pub spawn_sound: Option<String>,
    pub attack_sound: Option<String>,
    pub death_sound: Option<String>,
    pub death_effect: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScaledStats {
    pub max_health: u32,
    pub attack_damage: u32,
    pub move_speed: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EntityTemplate {
    pub name: String,
    pub display_name: String,
    pub pool_tag: PoolTag,
    pub prefab: String,
    pub behavior: BehaviorKind,
    pub max_health: u32,
    pub move_speed: f32,
    pub attack_damage: u32,
    pub attack_range: f32,
    pub attack_cooldown: f32,
    pub detection_range: f32,
    pub can_fly: bool,
    pub knockback_resistance: f32,
    pub spawn: SpawnRules,
    pub scaling: StatScaling,
    pub rewards: RewardProfile,
    pub hooks: PresentationHooks,
}

impl Default for EntityTemplate {
    fn default() -> Self {
        Self {
            name: "grunt".to_string(),
            display_name: "Grunt".to_string(),
            pool_tag: PoolTag::new("Enemy"),
            prefab: "enemy_basic".to_string(),
            behavior: BehaviorKind::ChasePlayer,
            max_health: 100,
            move_speed: 3.0,
            attack_damage: 10,
            attack_range: 2.0,
            attack_cooldown: 1.5,
            detection_range: 10.0,
            can_fly: false,
            knockback_resistance: 0.0,
            spawn: SpawnRules::default(),
            scaling: StatScaling::default(),
            rewards: RewardProfile::default(),
            hooks: PresentationHooks::default(),
        }
    }
}

impl EntityTemplate {
    pub fn scaled(&self, wave: u32) -> ScaledStats {
        let steps = wave.saturating_sub(1) as f32;
        let grow = |factor: f32| 1.0 + steps * factor;
        ScaledStats {
            max_health: (self.max_health as f32 * grow(self.scaling.health))
                .round()
                .max(1.0) as u32,
            attack_damage: (self.attack_damage as f32 * grow(self.scaling.damage))
                .round()
                .max(0.0) as u32,
            move_speed: self.move_speed * grow(self.scaling.speed),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.name.trim().is_empty() {
            return Err(ConfigurationError::EmptyTemplateName);
        }
        if self.pool_tag.as_str().is_empty() {
            return Err(ConfigurationError::EmptyPoolTag);
        }
        let field = |suffix: &str| format!("templates.{}.{suffix}", self.name);
        require_count(&field("max_health"), self.max_health)?;
        require_non_negative(&field("move_speed"), self.move_speed)?;
        require_non_negative(&field("attack_range"), self.attack_range)?;
        require_positive(&field("attack_cooldown"), self.attack_cooldown)?;
        require_non_negative(&field("detection_range"), self.detection_range)?;
        require_probability(&field("knockback_resistance"), self.knockback_resistance)?;
        require_count(&field("spawn.min_wave"), self.spawn.min_wave)?;
        require_non_negative(&field("spawn.spawn_weight"), self.spawn.spawn_weight)?;
        require_non_negative(&field("scaling.health"), self.scaling.health)?;
        require_non_negative(&field("scaling.damage"), self.scaling.damage)?;
        require_non_negative(&field("scaling.speed"), self.scaling.speed)?;
        require_probability(&field("rewards.coin_drop_chance"), self.rewards.coin_drop_chance)
    }
}
