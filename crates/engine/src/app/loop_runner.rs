use std::thread;
use std::time::{Duration, Instant};

use tracing::{info, warn};

use super::metrics::MetricsAccumulator;
use super::{MetricsHandle, SimCommand, SimTelemetry, Simulation};

#[derive(Debug, Clone)]
pub struct LoopConfig {
    pub target_tps: u32,
    pub max_frame_delta: Duration,
    pub max_ticks_per_frame: u32,
    pub metrics_log_interval: Duration,
    /// Simulated time after which the run ends; `None` runs until the
    /// simulation asks to stop.
    pub run_duration: Option<Duration>,
    /// Pace ticks against the wall clock instead of stepping as fast as
    /// possible.
    pub realtime: bool,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            target_tps: 60,
            max_frame_delta: Duration::from_millis(250),
            max_ticks_per_frame: 5,
            metrics_log_interval: Duration::from_secs(1),
            run_duration: Some(Duration::from_secs(120)),
            realtime: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RunSummary {
    pub ticks: u64,
    pub simulated_seconds: f32,
    pub wall_time: Duration,
    pub dropped_backlog: Duration,
    pub stopped_by_simulation: bool,
    pub telemetry: SimTelemetry,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct StepPlan {
    ticks_to_run: u32,
    remaining_accumulator: Duration,
    dropped_backlog: Duration,
}

/// Fixed-timestep accumulator with clamped frame deltas and bounded
/// catch-up.
#[derive(Debug, Clone)]
pub struct FixedStepper {
    fixed_dt: Duration,
    max_frame_delta: Duration,
    max_ticks_per_frame: u32,
    accumulator: Duration,
    dropped_backlog_total: Duration,
}

impl FixedStepper {
    pub fn new(config: &LoopConfig) -> Self {
        let target_tps = config.target_tps.max(1);
        Self {
            fixed_dt: Duration::from_secs_f64(1.0 / target_tps as f64),
            max_frame_delta: normalize_non_zero_duration(
                config.max_frame_delta,
                Duration::from_millis(250),
            ),
            max_ticks_per_frame: config.max_ticks_per_frame.max(1),
            accumulator: Duration::ZERO,
            dropped_backlog_total: Duration::ZERO,
        }
    }

    pub fn fixed_dt(&self) -> Duration {
        self.fixed_dt
    }

    pub fn fixed_dt_seconds(&self) -> f32 {
        self.fixed_dt.as_secs_f32()
    }

    pub fn dropped_backlog_total(&self) -> Duration {
        self.dropped_backlog_total
    }

    /// Feeds one frame's elapsed time and returns how many ticks to run.
    pub fn advance(&mut self, raw_frame_dt: Duration) -> u32 {
        let clamped = clamp_frame_delta(raw_frame_dt, self.max_frame_delta);
        self.accumulator = self.accumulator.saturating_add(clamped);
        let plan = plan_sim_steps(self.accumulator, self.fixed_dt, self.max_ticks_per_frame);
        self.accumulator = plan.remaining_accumulator;
        if plan.dropped_backlog > Duration::ZERO {
            self.dropped_backlog_total = self
                .dropped_backlog_total
                .saturating_add(plan.dropped_backlog);
            warn!(
                dropped_backlog_ms = plan.dropped_backlog.as_millis() as u64,
                max_ticks_per_frame = self.max_ticks_per_frame,
                "sim_clamp_triggered"
            );
        }
        plan.ticks_to_run
    }
}

pub fn run_headless(
    config: &LoopConfig,
    simulation: &mut dyn Simulation,
    metrics_handle: MetricsHandle,
) -> RunSummary {
    let mut stepper = FixedStepper::new(config);
    let metrics_log_interval =
        normalize_non_zero_duration(config.metrics_log_interval, Duration::from_secs(1));
    let fixed_dt = stepper.fixed_dt();
    let fixed_dt_seconds = stepper.fixed_dt_seconds();
    let tick_limit = config
        .run_duration
        .map(|duration| ticks_for_duration(duration, fixed_dt));

    info!(
        target_tps = config.target_tps.max(1),
        max_frame_delta_ms = config.max_frame_delta.as_millis() as u64,
        max_ticks_per_frame = config.max_ticks_per_frame.max(1),
        metrics_log_interval_ms = metrics_log_interval.as_millis() as u64,
        run_ticks = tick_limit.unwrap_or(0),
        realtime = config.realtime,
        "loop_config"
    );

    simulation.load();
    info!("simulation_loaded");

    let run_start = Instant::now();
    let mut last_frame_instant = run_start;
    let mut metrics_accumulator = MetricsAccumulator::new(metrics_log_interval);
    let mut ticks = 0u64;
    let mut stopped_by_simulation = false;

    'frames: loop {
        let ticks_to_run = if config.realtime {
            thread::sleep(fixed_dt);
            let now = Instant::now();
            let raw_frame_dt = now.saturating_duration_since(last_frame_instant);
            last_frame_instant = now;
            stepper.advance(raw_frame_dt)
        } else {
            stepper.advance(fixed_dt)
        };

        for _ in 0..ticks_to_run {
            if tick_limit.is_some_and(|limit| ticks >= limit) {
                break 'frames;
            }
            let tick_start = Instant::now();
            let command = simulation.step(fixed_dt_seconds);
            metrics_accumulator.record_tick(tick_start.elapsed());
            ticks += 1;
            if command == SimCommand::Stop {
                stopped_by_simulation = true;
                info!(ticks, "simulation_requested_stop");
                break 'frames;
            }
        }

        if tick_limit.is_some_and(|limit| ticks >= limit) {
            break;
        }

        if let Some(snapshot) =
            metrics_accumulator.maybe_snapshot(Instant::now(), simulation.telemetry())
        {
            metrics_handle.publish(snapshot);
            let telemetry = snapshot.telemetry;
            info!(
                tps = snapshot.tps,
                tick_time_ms = snapshot.tick_time_ms,
                elapsed_seconds = telemetry.elapsed_seconds,
                wave = telemetry.wave,
                active_enemies = telemetry.active_enemies,
                active_cap = telemetry.active_cap,
                kills_total = telemetry.kills_total,
                spawns_per_second = snapshot.rates.spawns_per_second,
                kills_per_second = snapshot.rates.kills_per_second,
                placement_failure_ratio = snapshot.rates.placement_failure_ratio,
                cap_pressure = snapshot.rates.cap_pressure,
                "sim_metrics"
            );
        }
    }

    let telemetry = simulation.telemetry();
    simulation.unload();
    let summary = RunSummary {
        ticks,
        simulated_seconds: (ticks as f64 * fixed_dt.as_secs_f64()) as f32,
        wall_time: run_start.elapsed(),
        dropped_backlog: stepper.dropped_backlog_total(),
        stopped_by_simulation,
        telemetry,
    };
    info!(
        ticks = summary.ticks,
        simulated_seconds = summary.simulated_seconds,
        wall_time_ms = summary.wall_time.as_millis() as u64,
        stopped_by_simulation,
        "shutdown"
    );
    summary
}

fn plan_sim_steps(
    mut accumulator: Duration,
    fixed_dt: Duration,
    max_ticks_per_frame: u32,
) -> StepPlan {
    let mut ticks_to_run = 0u32;

    while accumulator >= fixed_dt && ticks_to_run < max_ticks_per_frame {
        accumulator = accumulator.saturating_sub(fixed_dt);
        ticks_to_run = ticks_to_run.saturating_add(1);
    }

    if accumulator >= fixed_dt {
        StepPlan {
            ticks_to_run,
            remaining_accumulator: Duration::ZERO,
            dropped_backlog: accumulator,
        }
    } else {
        StepPlan {
            ticks_to_run,
            remaining_accumulator: accumulator,
            dropped_backlog: Duration::ZERO,
        }
    }
}

fn clamp_frame_delta(frame_dt: Duration, max_frame_delta: Duration) -> Duration {
    frame_dt.min(max_frame_delta)
}

fn normalize_non_zero_duration(value: Duration, fallback: Duration) -> Duration {
    if value.is_zero() {
        fallback
    } else {
        value
    }
}

fn ticks_for_duration(duration: Duration, fixed_dt: Duration) -> u64 {
    (duration.as_secs_f64() / fixed_dt.as_secs_f64()).round() as u64
}
