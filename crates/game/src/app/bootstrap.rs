use std::env;
use std::str::FromStr;
use std::time::Duration;

use horde_engine::{ConfigurationError, LoopConfig};
use thiserror::Error;
use tracing::info;
use tracing_subscriber::EnvFilter;

use super::config::{
    load_session_config, resolve_config_path, ConfigLoadError, RunSettings, SessionConfig,
};
use super::gameplay::{build_session, GameRng, HeadlessSession};

const SEED_ENV_VAR: &str = "HORDE_SEED";
const RUN_SECONDS_ENV_VAR: &str = "HORDE_RUN_SECONDS";
const REALTIME_ENV_VAR: &str = "HORDE_REALTIME";

#[derive(Debug, Error)]
pub(crate) enum StartupError {
    #[error(transparent)]
    ConfigLoad(#[from] ConfigLoadError),
    #[error("invalid configuration: {0}")]
    Configuration(#[from] ConfigurationError),
    #[error("invalid value '{value}' for {var}")]
    InvalidEnv { var: &'static str, value: String },
    #[error("{field} of {value} seconds is out of range")]
    DurationOutOfRange { field: &'static str, value: f32 },
}

pub(crate) struct AppWiring {
    pub(crate) config: LoopConfig,
    pub(crate) session: HeadlessSession,
}

pub(crate) fn build_app() -> Result<AppWiring, StartupError> {
    init_tracing();
    info!("=== Horde Sim Startup ===");

    let mut session_config = load_config()?;
    apply_run_overrides(&mut session_config.run, |var| env::var(var).ok())?;
    session_config.validate()?;

    let rng = match session_config.run.seed {
        Some(seed) => GameRng::from_seed(seed),
        None => GameRng::from_entropy(),
    };
    let config = loop_config(&session_config.run)?;
    info!(
        seed = ?rng.seed(),
        target_tps = config.target_tps,
        run_seconds = session_config.run.run_seconds,
        realtime = config.realtime,
        "session_settings"
    );
    let session = build_session(&session_config, rng)?;

    Ok(AppWiring {
        config,
        session,
    })
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_names(true)
        .compact()
        .init();
}

fn load_config() -> Result<SessionConfig, StartupError> {
    match resolve_config_path() {
        Some(path) => {
            let config = load_session_config(&path)?;
            info!(
                path = %path.display(),
                templates = config.templates.len(),
                "config_loaded"
            );
            Ok(config)
        }
        None => {
            info!("config_defaults");
            Ok(SessionConfig::default())
        }
    }
}

fn loop_config(run: &RunSettings) -> Result<LoopConfig, StartupError> {
    Ok(LoopConfig {
        target_tps: run.target_tps,
        metrics_log_interval: seconds(
            "run.metrics_log_interval_seconds",
            run.metrics_log_interval_seconds,
        )?,
        run_duration: Some(seconds("run.run_seconds", run.run_seconds)?),
        realtime: run.realtime,
        ..LoopConfig::default()
    })
}

fn seconds(field: &'static str, value: f32) -> Result<Duration, StartupError> {
    Duration::try_from_secs_f32(value)
        .map_err(|_| StartupError::DurationOutOfRange { field, value })
}

fn apply_run_overrides(
    run: &mut RunSettings,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<(), StartupError> {
    if let Some(seed) = parse_override::<u64>(SEED_ENV_VAR, &lookup)? {
        run.seed = Some(seed);
    }
    if let Some(seconds) = parse_override::<f32>(RUN_SECONDS_ENV_VAR, &lookup)? {
        run.run_seconds = seconds;
    }
    if let Some(raw) = lookup(REALTIME_ENV_VAR) {
        run.realtime = parse_flag(REALTIME_ENV_VAR, &raw)?;
    }
    Ok(())
}

fn parse_override<T: FromStr>(
    var: &'static str,
    lookup: &impl Fn(&str) -> Option<String>,
) -> Result<Option<T>, StartupError> {
    let Some(raw) = lookup(var) else {
        return Ok(None);
    };
    raw.trim()
        .parse::<T>()
        .map(Some)
        .map_err(|_| StartupError::InvalidEnv { var, value: raw })
}

fn parse_flag(var: &'static str, raw: &str) -> Result<bool, StartupError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(StartupError::InvalidEnv {
            var,
            value: raw.to_string(),
        }),
    }
}
