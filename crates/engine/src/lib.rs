use thiserror::Error;

pub mod app;
pub mod camera;
pub mod content;
pub mod health;
pub mod pool;
pub mod schedule;
pub mod world;

pub use app::{
    run_headless, FixedStepper, LoopConfig, MetricsHandle, RunSummary, SimCommand,
    SimMetricsSnapshot, SimRates, SimTelemetry, Simulation,
};
pub use camera::OrthographicCamera;
pub use content::{
    BehaviorKind, EntityTemplate, PresentationHooks, RewardProfile, ScaledStats, SpawnRules,
    StatScaling, TemplateDatabase, TemplateId,
};
pub use health::{
    CriticalHit, DamageOutcome, HealOutcome, Health, HealthSettings, IgnoredDamage,
};
pub use pool::{PoolError, PoolHandle, PoolManager, PoolTag, PoolTemplate};
pub use schedule::DeferredQueue;
pub use world::{
    EntityClass, GroundHit, LayerMask, RayHit, ViewportProjector, WorldQueries,
};

/// Startup-time validation failure. The only fatal error class of the core:
/// a subsystem whose configuration fails validation must not start.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigurationError {
    #[error("pool tag '{tag}' is already registered with a different template")]
    DuplicatePoolTag { tag: String },
    #[error("pool tag must not be empty")]
    EmptyPoolTag,
    #[error("template name must not be empty")]
    EmptyTemplateName,
    #[error("template '{name}' is defined more than once")]
    DuplicateTemplate { name: String },
    #[error("{field} names unknown template '{name}'")]
    UnknownTemplate { field: String, name: String },
    #[error("{field} must be greater than zero (got {value})")]
    NonPositive { field: String, value: f32 },
    #[error("{field} must not be negative (got {value})")]
    Negative { field: String, value: f32 },
    #[error("{field} must be a finite number")]
    NonFinite { field: String },
    #[error("{field} range is inverted: min {min} > max {max}")]
    InvertedRange { field: String, min: f32, max: f32 },
    #[error("{field} must be at least 1")]
    ZeroCount { field: String },
    #[error("{field} must lie within [0, 1] (got {value})")]
    NotAProbability { field: String, value: f32 },
}

pub fn require_positive(field: &str, value: f32) -> Result<(), ConfigurationError> {
    require_finite(field, value)?;
    if value <= 0.0 {
        return Err(ConfigurationError::NonPositive {
            field: field.to_string(),
            value,
        });
    }
    Ok(())
}

pub fn require_non_negative(field: &str, value: f32) -> Result<(), ConfigurationError> {
    require_finite(field, value)?;
    if value < 0.0 {
        return Err(ConfigurationError::Negative {
            field: field.to_string(),
            value,
        });
    }
    Ok(())
}

pub fn require_probability(field: &str, value: f32) -> Result<(), ConfigurationError> {
    require_finite(field, value)?;
    if !(0.0..=1.0).contains(&value) {
        return Err(ConfigurationError::NotAProbability {
            field: field.to_string(),
            value,
        });
    }
    Ok(())
}

pub fn require_ordered_range(field: &str, min: f32, max: f32) -> Result<(), ConfigurationError> {
    require_finite(field, min)?;
    require_finite(field, max)?;
    if min > max {
        return Err(ConfigurationError::InvertedRange {
            field: field.to_string(),
            min,
            max,
        });
    }
    Ok(())
}

pub fn require_count(field: &str, value: u32) -> Result<(), ConfigurationError> {
    if value == 0 {
        return Err(ConfigurationError::ZeroCount {
            field: field.to_string(),
        });
    }
    Ok(())
}

fn require_finite(field: &str, value: f32) -> Result<(), ConfigurationError> {
    if !value.is_finite() {
        return Err(ConfigurationError::NonFinite {
            field: field.to_string(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn positive_rejects_zero_and_nan() {
        assert!(require_positive("director.wave_duration", 30.0).is_ok());
        assert_eq!(
            require_positive("agent.attack_cooldown", 0.0),
            Err(ConfigurationError::NonPositive {
                field: "agent.attack_cooldown".to_string(),
                value: 0.0,
            })
        );
        assert!(matches!(
            require_positive("x", f32::NAN),
            Err(ConfigurationError::NonFinite { .. })
        ));
    }

    #[test]
    fn ordered_range_allows_equal_bounds() {
        assert!(require_ordered_range("spawn_distance", 15.0, 15.0).is_ok());
        assert!(matches!(
            require_ordered_range("spawn_distance", 25.0, 15.0),
            Err(ConfigurationError::InvertedRange { .. })
        ));
    }

    #[test]
    fn probability_bounds_are_inclusive() {
        assert!(require_probability("crit", 0.0).is_ok());
        assert!(require_probability("crit", 1.0).is_ok());
        assert!(require_probability("crit", 1.01).is_err());
    }
}
