use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::{require_count, require_non_negative, require_positive, require_probability};
use crate::ConfigurationError;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HealthSettings {
    pub max_health: u32,
    pub invulnerable: bool,
    pub can_heal_above_max: bool,
    pub invulnerability_time: f32,
}

impl Default for HealthSettings {
    fn default() -> Self {
        Self {
            max_health: 100,
            invulnerable: false,
            can_heal_above_max: false,
            invulnerability_time: 0.5,
        }
    }
}

impl HealthSettings {
    pub fn validate(&self, section: &str) -> Result<(), ConfigurationError> {
        require_count(&format!("{section}.max_health"), self.max_health)?;
        require_non_negative(
            &format!("{section}.invulnerability_time"),
            self.invulnerability_time,
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoredDamage {
    NotAlive,
    Invulnerable,
    InvulnerabilityWindow,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DamageOutcome {
    Ignored(IgnoredDamage),
    Applied {
        amount: u32,
        is_critical: bool,
        current: u32,
        max: u32,
        /// Set only on the call that crossed zero.
        died: bool,
    },
}

impl DamageOutcome {
    pub fn died(&self) -> bool {
        matches!(self, Self::Applied { died: true, .. })
    }

    pub fn applied_amount(&self) -> Option<u32> {
        match self {
            Self::Applied { amount, .. } => Some(*amount),
            Self::Ignored(_) => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HealOutcome {
    pub amount: u32,
    pub current: u32,
    pub max: u32,
}

/// Hit-point state machine for one entity. Time is passed in explicitly as
/// simulation seconds so the window logic is testable without a clock.
#[derive(Debug, Clone, PartialEq)]
pub struct Health {
    settings: HealthSettings,
    current: u32,
    last_hit_at: Option<f32>,
    dead: bool,
}

impl Health {
    pub fn new(settings: HealthSettings) -> Self {
        let max_health = settings.max_health.max(1);
        Self {
            settings: HealthSettings {
                max_health,
                ..settings
            },
            current: max_health,
            last_hit_at: None,
            dead: false,
        }
    }

    pub fn current(&self) -> u32 {
        self.current
    }

    pub fn max(&self) -> u32 {
        self.settings.max_health
    }

    pub fn is_alive(&self) -> bool {
        !self.dead
    }

    pub fn settings(&self) -> &HealthSettings {
        &self.settings
    }

    pub fn fraction(&self) -> f32 {
        self.current as f32 / self.max() as f32
    }

    pub fn is_full(&self) -> bool {
        self.current >= self.max()
    }

    pub fn apply_damage(&mut self, amount: u32, is_critical: bool, now: f32) -> DamageOutcome {
        if self.dead {
            return DamageOutcome::Ignored(IgnoredDamage::NotAlive);
        }
        if self.settings.invulnerable {
            return DamageOutcome::Ignored(IgnoredDamage::Invulnerable);
        }
        if let Some(last_hit_at) = self.last_hit_at {
            if now - last_hit_at < self.settings.invulnerability_time {
                return DamageOutcome::Ignored(IgnoredDamage::InvulnerabilityWindow);
            }
        }

        let amount = amount.max(1);
        self.current = self.current.saturating_sub(amount).min(self.max());
        self.last_hit_at = Some(now);
        let died = self.current == 0;
        if died {
            self.dead = true;
        }
        DamageOutcome::Applied {
            amount,
            is_critical,
            current: self.current,
            max: self.max(),
            died,
        }
    }

    pub fn heal(&mut self, amount: u32) -> Option<HealOutcome> {
        if self.dead {
            return None;
        }
        let amount = amount.max(1);
        let raised = self.current.saturating_add(amount);
        self.current = if self.settings.can_heal_above_max {
            raised
        } else {
            raised.min(self.max())
        };
        Some(HealOutcome {
            amount,
            current: self.current,
            max: self.max(),
        })
    }

    /// Forces the dead state. Returns `true` only on the transition.
    pub fn kill(&mut self) -> bool {
        if self.dead {
            return false;
        }
        self.current = 0;
        self.dead = true;
        true
    }

    /// Full restore used when a pooled instance is activated again.
    pub fn reset_health(&mut self) {
        self.current = self.max();
        self.last_hit_at = None;
        self.dead = false;
    }

    pub fn set_max_health(&mut self, max_health: u32, heal_to_max: bool) {
        self.settings.max_health = max_health.max(1);
        if heal_to_max {
            self.current = self.max();
        } else if !self.settings.can_heal_above_max {
            self.current = self.current.min(self.max());
        }
    }

    pub fn set_invulnerable(&mut self, invulnerable: bool) {
        self.settings.invulnerable = invulnerable;
    }
}

/// Critical-hit roll performed by a damage source before it reaches
/// [`Health::apply_damage`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CriticalHit {
    pub chance: f32,
    pub multiplier: f32,
}

impl Default for CriticalHit {
    fn default() -> Self {
        Self {
            chance: 0.1,
            multiplier: 2.0,
        }
    }
}

impl CriticalHit {
    pub fn validate(&self, section: &str) -> Result<(), ConfigurationError> {
        require_probability(&format!("{section}.chance"), self.chance)?;
        require_positive(&format!("{section}.multiplier"), self.multiplier)
    }

    pub fn roll<R: Rng + ?Sized>(&self, base_damage: u32, rng: &mut R) -> (u32, bool) {
        let is_critical = rng.gen::<f32>() < self.chance;
        if !is_critical {
            return (base_damage, false);
        }
        let boosted = (base_damage as f32 * self.multiplier).round().max(0.0) as u32;
        (boosted, true)
    }
}
