use std::process::ExitCode;

use horde_engine::{run_headless, MetricsHandle};
use tracing::info;

use super::bootstrap::AppWiring;

pub(crate) fn run(mut app: AppWiring) -> ExitCode {
    let metrics = MetricsHandle::default();
    let summary = run_headless(&app.config, &mut app.session, metrics.clone());
    let last_interval = metrics.snapshot().rates;
    info!(
        ticks = summary.ticks,
        simulated_seconds = summary.simulated_seconds,
        wall_ms = summary.wall_time.as_millis() as u64,
        dropped_backlog_ms = summary.dropped_backlog.as_millis() as u64,
        stopped_by_simulation = summary.stopped_by_simulation,
        wave = summary.telemetry.wave,
        active_enemies = summary.telemetry.active_enemies,
        spawned = summary.telemetry.spawned_total,
        kills = summary.telemetry.kills_total,
        last_spawns_per_second = last_interval.spawns_per_second,
        last_kills_per_second = last_interval.kills_per_second,
        "run_summary"
    );

    ExitCode::SUCCESS
}
