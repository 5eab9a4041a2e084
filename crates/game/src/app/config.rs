use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use glam::{Vec2, Vec3};
use horde_engine::{
    require_count, require_non_negative, require_ordered_range, require_positive,
    BehaviorKind, ConfigurationError, CriticalHit, EntityTemplate, HealthSettings,
    OrthographicCamera, PoolTag, PresentationHooks, SpawnRules, StatScaling,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub(crate) const CONFIG_ENV_VAR: &str = "HORDE_CONFIG";
const SESSION_FILE: &str = "session.json";

#[derive(Debug, Error)]
pub(crate) enum ConfigLoadError {
    #[error("failed to read session config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse session config {path} at {json_path}: {source}")]
    Parse {
        path: PathBuf,
        json_path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid session config: {0}")]
    Invalid(#[from] ConfigurationError),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub(crate) struct DirectorSettings {
    pub(crate) base_spawn_rate: f32,
    pub(crate) spawn_rate_increase_per_minute: f32,
    pub(crate) base_max_enemies: u32,
    pub(crate) max_enemies_increase_per_minute: f32,
    pub(crate) wave_duration: f32,
    pub(crate) min_spawn_distance: f32,
    pub(crate) max_spawn_distance: f32,
    pub(crate) placement_attempts: u32,
    pub(crate) viewport_push_limit: u32,
    pub(crate) viewport_push_step: f32,
    pub(crate) ground_probe_height: f32,
    pub(crate) ground_probe_distance: f32,
    pub(crate) clearance_radius: f32,
    pub(crate) census_interval: f32,
    pub(crate) camera_refresh_interval: f32,
}

impl Default for DirectorSettings {
    fn default() -> Self {
        Self {
            base_spawn_rate: 1.0,
            spawn_rate_increase_per_minute: 0.1,
            base_max_enemies: 50,
            max_enemies_increase_per_minute: 5.0,
            wave_duration: 30.0,
            min_spawn_distance: 15.0,
            max_spawn_distance: 25.0,
            placement_attempts: 15,
            viewport_push_limit: 10,
            viewport_push_step: 5.0,
            ground_probe_height: 5.0,
            ground_probe_distance: 10.0,
            clearance_radius: 2.0,
            census_interval: 1.0,
            camera_refresh_interval: 1.0,
        }
    }
}

impl DirectorSettings {
    pub(crate) fn validate(&self) -> Result<(), ConfigurationError> {
        require_positive("director.base_spawn_rate", self.base_spawn_rate)?;
        require_non_negative(
            "director.spawn_rate_increase_per_minute",
            self.spawn_rate_increase_per_minute,
        )?;
        require_count("director.base_max_enemies", self.base_max_enemies)?;
        require_non_negative(
            "director.max_enemies_increase_per_minute",
            self.max_enemies_increase_per_minute,
        )?;
        require_positive("director.wave_duration", self.wave_duration)?;
        require_non_negative("director.min_spawn_distance", self.min_spawn_distance)?;
        require_ordered_range(
            "director.spawn_distance",
            self.min_spawn_distance,
            self.max_spawn_distance,
        )?;
        require_count("director.placement_attempts", self.placement_attempts)?;
        require_non_negative("director.viewport_push_step", self.viewport_push_step)?;
        require_non_negative("director.ground_probe_height", self.ground_probe_height)?;
        require_positive("director.ground_probe_distance", self.ground_probe_distance)?;
        require_non_negative("director.clearance_radius", self.clearance_radius)?;
        require_positive("director.census_interval", self.census_interval)?;
        require_positive(
            "director.camera_refresh_interval",
            self.camera_refresh_interval,
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub(crate) struct AgentSettings {
    pub(crate) look_speed: f32,
    pub(crate) update_target_interval: f32,
    pub(crate) avoidance_radius: f32,
    pub(crate) obstacle_check_distance: f32,
    pub(crate) probe_ray_count: u32,
    pub(crate) separation_weight: f32,
    pub(crate) velocity_blend_rate: f32,
    pub(crate) death_delay: f32,
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            look_speed: 5.0,
            update_target_interval: 0.2,
            avoidance_radius: 1.0,
            obstacle_check_distance: 2.0,
            probe_ray_count: 8,
            separation_weight: 0.5,
            velocity_blend_rate: 5.0,
            death_delay: 1.0,
        }
    }
}

impl AgentSettings {
    pub(crate) fn validate(&self) -> Result<(), ConfigurationError> {
        require_positive("agent.look_speed", self.look_speed)?;
        require_positive("agent.update_target_interval", self.update_target_interval)?;
        require_non_negative("agent.avoidance_radius", self.avoidance_radius)?;
        require_positive("agent.obstacle_check_distance", self.obstacle_check_distance)?;
        require_count("agent.probe_ray_count", self.probe_ray_count)?;
        require_non_negative("agent.separation_weight", self.separation_weight)?;
        require_positive("agent.velocity_blend_rate", self.velocity_blend_rate)?;
        require_non_negative("agent.death_delay", self.death_delay)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub(crate) struct PlayerSettings {
    pub(crate) health: HealthSettings,
    pub(crate) spawn_position: Vec3,
}

impl Default for PlayerSettings {
    fn default() -> Self {
        Self {
            health: HealthSettings::default(),
            spawn_position: Vec3::ZERO,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub(crate) struct WeaponSettings {
    pub(crate) auto_fire: bool,
    pub(crate) cooldown: f32,
    pub(crate) targeting_range: f32,
    pub(crate) target_check_interval: f32,
    pub(crate) muzzle_height: f32,
}

impl Default for WeaponSettings {
    fn default() -> Self {
        Self {
            auto_fire: true,
            cooldown: 0.2,
            targeting_range: 15.0,
            target_check_interval: 0.3,
            muzzle_height: 0.0,
        }
    }
}

impl WeaponSettings {
    pub(crate) fn validate(&self) -> Result<(), ConfigurationError> {
        require_positive("weapon.cooldown", self.cooldown)?;
        require_positive("weapon.targeting_range", self.targeting_range)?;
        require_positive("weapon.target_check_interval", self.target_check_interval)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub(crate) struct ProjectileSettings {
    pub(crate) speed: f32,
    pub(crate) damage: u32,
    pub(crate) lifetime: f32,
    pub(crate) hit_radius: f32,
    pub(crate) critical: CriticalHit,
}

impl Default for ProjectileSettings {
    fn default() -> Self {
        Self {
            speed: 20.0,
            damage: 10,
            lifetime: 5.0,
            hit_radius: 0.5,
            critical: CriticalHit::default(),
        }
    }
}

impl ProjectileSettings {
    pub(crate) fn validate(&self) -> Result<(), ConfigurationError> {
        require_positive("projectile.speed", self.speed)?;
        require_positive("projectile.lifetime", self.lifetime)?;
        require_positive("projectile.hit_radius", self.hit_radius)?;
        self.critical.validate("projectile.critical")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub(crate) struct EffectSettings {
    pub(crate) lifetime: f32,
    /// Effect used for templates that do not name their own.
    pub(crate) default_death_effect: Option<String>,
}

impl Default for EffectSettings {
    fn default() -> Self {
        Self {
            lifetime: 2.0,
            default_death_effect: Some("death_puff".to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub(crate) struct PoolSettings {
    pub(crate) enemy_initial: u32,
    pub(crate) projectile_tag: PoolTag,
    pub(crate) projectile_initial: u32,
    pub(crate) effect_tag: PoolTag,
    pub(crate) effect_initial: u32,
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            enemy_initial: 20,
            projectile_tag: PoolTag::new("Bullet"),
            projectile_initial: 30,
            effect_tag: PoolTag::new("DeathEffect"),
            effect_initial: 10,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub(crate) struct PillarSpec {
    pub(crate) center: Vec2,
    pub(crate) radius: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub(crate) struct ArenaSettings {
    pub(crate) half_size: f32,
    pub(crate) ground_height: f32,
    pub(crate) pillars: Vec<PillarSpec>,
    pub(crate) hazards: Vec<PillarSpec>,
}

impl Default for ArenaSettings {
    fn default() -> Self {
        Self {
            half_size: 80.0,
            ground_height: 0.0,
            pillars: vec![
                PillarSpec {
                    center: Vec2::new(12.0, 6.0),
                    radius: 1.5,
                },
                PillarSpec {
                    center: Vec2::new(-10.0, -14.0),
                    radius: 2.0,
                },
                PillarSpec {
                    center: Vec2::new(25.0, -20.0),
                    radius: 3.0,
                },
            ],
            hazards: vec![PillarSpec {
                center: Vec2::new(-30.0, 22.0),
                radius: 4.0,
            }],
        }
    }
}

impl ArenaSettings {
    pub(crate) fn validate(&self) -> Result<(), ConfigurationError> {
        require_positive("arena.half_size", self.half_size)?;
        for pillar in self.pillars.iter().chain(&self.hazards) {
            require_positive("arena.radius", pillar.radius)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub(crate) struct RunSettings {
    pub(crate) seed: Option<u64>,
    pub(crate) target_tps: u32,
    pub(crate) run_seconds: f32,
    pub(crate) realtime: bool,
    pub(crate) metrics_log_interval_seconds: f32,
    pub(crate) player_path_radius: f32,
    pub(crate) player_path_angular_speed: f32,
    /// Template names spawned evenly around the player when the session loads.
    pub(crate) opening_wave: Vec<String>,
    pub(crate) opening_wave_radius: f32,
    pub(crate) player_regen_interval_seconds: f32,
    /// Health restored to the player every regen interval. Zero disables it.
    pub(crate) player_regen_amount: u32,
}

impl Default for RunSettings {
    fn default() -> Self {
        Self {
            seed: None,
            target_tps: 60,
            run_seconds: 120.0,
            realtime: false,
            metrics_log_interval_seconds: 1.0,
            player_path_radius: 8.0,
            player_path_angular_speed: 0.25,
            opening_wave: Vec::new(),
            opening_wave_radius: 20.0,
            player_regen_interval_seconds: 5.0,
            player_regen_amount: 0,
        }
    }
}

impl RunSettings {
    pub(crate) fn validate(&self) -> Result<(), ConfigurationError> {
        require_count("run.target_tps", self.target_tps)?;
        require_positive("run.run_seconds", self.run_seconds)?;
        require_positive(
            "run.metrics_log_interval_seconds",
            self.metrics_log_interval_seconds,
        )?;
        require_non_negative("run.player_path_radius", self.player_path_radius)?;
        require_non_negative("run.opening_wave_radius", self.opening_wave_radius)?;
        require_positive(
            "run.player_regen_interval_seconds",
            self.player_regen_interval_seconds,
        )
    }
}

/// Everything a session needs, loaded once at startup and never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub(crate) struct SessionConfig {
    pub(crate) director: DirectorSettings,
    pub(crate) agent: AgentSettings,
    pub(crate) enemy_health: HealthSettings,
    pub(crate) player: PlayerSettings,
    pub(crate) weapon: WeaponSettings,
    pub(crate) projectile: ProjectileSettings,
    pub(crate) effects: EffectSettings,
    pub(crate) pools: PoolSettings,
    pub(crate) camera: OrthographicCamera,
    pub(crate) arena: ArenaSettings,
    pub(crate) run: RunSettings,
    pub(crate) templates: Vec<EntityTemplate>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            director: DirectorSettings::default(),
            agent: AgentSettings::default(),
            enemy_health: HealthSettings::default(),
            player: PlayerSettings::default(),
            weapon: WeaponSettings::default(),
            projectile: ProjectileSettings::default(),
            effects: EffectSettings::default(),
            pools: PoolSettings::default(),
            camera: OrthographicCamera::default(),
            arena: ArenaSettings::default(),
            run: RunSettings::default(),
            templates: builtin_templates(),
        }
    }
}

impl SessionConfig {
    pub(crate) fn validate(&self) -> Result<(), ConfigurationError> {
        self.director.validate()?;
        self.agent.validate()?;
        self.enemy_health.validate("enemy_health")?;
        self.player.health.validate("player.health")?;
        self.weapon.validate()?;
        self.projectile.validate()?;
        require_non_negative("effects.lifetime", self.effects.lifetime)?;
        if self.pools.projectile_tag.as_str().is_empty() || self.pools.effect_tag.as_str().is_empty()
        {
            return Err(ConfigurationError::EmptyPoolTag);
        }
        self.camera.validate()?;
        self.arena.validate()?;
        self.run.validate()?;
        for template in &self.templates {
            template.validate()?;
        }
        for name in &self.run.opening_wave {
            if !self.templates.iter().any(|template| &template.name == name) {
                return Err(ConfigurationError::UnknownTemplate {
                    field: "run.opening_wave".to_string(),
                    name: name.clone(),
                });
            }
        }
        Ok(())
    }
}

pub(crate) fn builtin_templates() -> Vec<EntityTemplate> {
    vec![
        EntityTemplate {
            name: "grunt".to_string(),
            display_name: "Grunt".to_string(),
            pool_tag: PoolTag::new("Grunt"),
            prefab: "enemy_grunt".to_string(),
            spawn: SpawnRules {
                spawn_weight: 3.0,
                ..SpawnRules::default()
            },
            ..EntityTemplate::default()
        },
        EntityTemplate {
            name: "runner".to_string(),
            display_name: "Runner".to_string(),
            pool_tag: PoolTag::new("Runner"),
            prefab: "enemy_runner".to_string(),
            behavior: BehaviorKind::Swarm,
            max_health: 50,
            move_speed: 5.0,
            attack_damage: 5,
            attack_cooldown: 1.0,
            detection_range: 18.0,
            spawn: SpawnRules {
                min_wave: 2,
                spawn_weight: 2.0,
                max_simultaneous: -1,
            },
            ..EntityTemplate::default()
        },
        EntityTemplate {
            name: "brute".to_string(),
            display_name: "Brute".to_string(),
            pool_tag: PoolTag::new("Brute"),
            prefab: "enemy_brute".to_string(),
            behavior: BehaviorKind::Tank,
            max_health: 300,
            move_speed: 2.0,
            attack_damage: 25,
            attack_range: 2.5,
            attack_cooldown: 2.5,
            detection_range: 20.0,
            knockback_resistance: 0.8,
            spawn: SpawnRules {
                min_wave: 3,
                spawn_weight: 1.0,
                max_simultaneous: 3,
            },
            scaling: StatScaling {
                health: 0.15,
                damage: 0.05,
                speed: 0.0,
            },
            hooks: PresentationHooks {
                death_effect: Some("brute_burst".to_string()),
                ..PresentationHooks::default()
            },
            ..EntityTemplate::default()
        },
    ]
}

pub(crate) fn load_session_config(path: &Path) -> Result<SessionConfig, ConfigLoadError> {
    let raw = fs::read_to_string(path).map_err(|source| ConfigLoadError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    parse_session_config(&raw, path)
}

pub(crate) fn parse_session_config(raw: &str, path: &Path) -> Result<SessionConfig, ConfigLoadError> {
    let mut deserializer = serde_json::Deserializer::from_str(raw);
    let config = serde_path_to_error::deserialize::<_, SessionConfig>(&mut deserializer).map_err(
        |error| {
            let json_path = error.path().to_string();
            ConfigLoadError::Parse {
                path: path.to_path_buf(),
                json_path,
                source: error.into_inner(),
            }
        },
    )?;
    config.validate()?;
    Ok(config)
}

/// `HORDE_CONFIG` wins; otherwise the first ancestor of the executable (then
/// of the working directory) that looks like the workspace root and carries
/// `assets/session.json`.
pub(crate) fn resolve_config_path() -> Option<PathBuf> {
    if let Ok(value) = env::var(CONFIG_ENV_VAR) {
        return Some(normalize_path(&PathBuf::from(value)));
    }

    let exe_dir = env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(Path::to_path_buf));
    let cwd = env::current_dir().ok();
    exe_dir
        .iter()
        .chain(cwd.iter())
        .flat_map(|start| start.ancestors())
        .find(|candidate| is_repo_marker(candidate))
        .map(|root| normalize_path(&root.join("assets").join(SESSION_FILE)))
}

fn is_repo_marker(path: &Path) -> bool {
    path.join("Cargo.toml").is_file() && path.join("assets").join(SESSION_FILE).is_file()
}

fn normalize_path(path: &Path) -> PathBuf {
    fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}
