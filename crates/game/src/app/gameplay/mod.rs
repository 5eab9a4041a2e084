use std::collections::HashMap;
use std::f32::consts::TAU;

use glam::{Quat, Vec2, Vec3};
use horde_engine::{
    ConfigurationError, DamageOutcome, DeferredQueue, EntityClass, EntityTemplate, GroundHit,
    HealOutcome, Health, HealthSettings, IgnoredDamage, LayerMask, OrthographicCamera, PoolError,
    PoolHandle, PoolManager, PoolTag, PoolTemplate, RayHit, ScaledStats, SimCommand,
    SimTelemetry, Simulation, TemplateDatabase, TemplateId, ViewportProjector, WorldQueries,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::app::config::{
    AgentSettings, ArenaSettings, DirectorSettings, PillarSpec, RunSettings, SessionConfig,
};

const GAMEPLAY_SYSTEM_ORDER_TEXT: &str = "Deferred>Director>Agents>Weapon>Projectiles>Rollover";

include!("types.rs");
include!("director.rs");
include!("agent.rs");
include!("combat.rs");
include!("simulation.rs");
include!("arena.rs");
include!("session.rs");
