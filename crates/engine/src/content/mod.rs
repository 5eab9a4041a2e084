mod database;
mod template;

pub use database::{TemplateDatabase, TemplateId};
pub use template::{
    BehaviorKind, EntityTemplate, PresentationHooks, RewardProfile, ScaledStats, SpawnRules,
    StatScaling,
};
