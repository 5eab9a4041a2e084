use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use tracing::warn;

use super::SimTelemetry;

static METRICS_LOCK_POISON_WARNED: AtomicBool = AtomicBool::new(false);

fn warn_metrics_lock_poison_once(operation: &'static str) {
    if METRICS_LOCK_POISON_WARNED
        .compare_exchange(false, true, Ordering::Relaxed, Ordering::Relaxed)
        .is_ok()
    {
        warn!(operation, "metrics lock poisoned; recovered inner value");
    }
}

/// Gameplay throughput over one metrics interval, measured against simulated
/// time so realtime and fast-forward runs report the same numbers.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SimRates {
    pub spawns_per_second: f32,
    pub kills_per_second: f32,
    /// Share of spawn attempts in the interval that found no placement.
    pub placement_failure_ratio: f32,
    /// Live enemies relative to the active cap at the end of the interval.
    pub cap_pressure: f32,
}

impl SimRates {
    pub fn between(previous: &SimTelemetry, current: &SimTelemetry) -> Self {
        let sim_seconds = current.elapsed_seconds - previous.elapsed_seconds;
        let spawned = current.spawned_total.saturating_sub(previous.spawned_total);
        let kills = current.kills_total.saturating_sub(previous.kills_total);
        let failed = current
            .failed_placements_total
            .saturating_sub(previous.failed_placements_total);
        let per_second = |count: u64| {
            if sim_seconds > 0.0 {
                count as f32 / sim_seconds
            } else {
                0.0
            }
        };
        let attempts = spawned + failed;
        Self {
            spawns_per_second: per_second(spawned),
            kills_per_second: per_second(kills),
            placement_failure_ratio: if attempts == 0 {
                0.0
            } else {
                failed as f32 / attempts as f32
            },
            cap_pressure: if current.active_cap == 0 {
                0.0
            } else {
                current.active_enemies as f32 / current.active_cap as f32
            },
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SimMetricsSnapshot {
    pub tps: f32,
    pub tick_time_ms: f32,
    pub rates: SimRates,
    pub telemetry: SimTelemetry,
}

/// Shared read side of the runner's metrics; cheap to clone into a host.
#[derive(Clone, Debug)]
pub struct MetricsHandle {
    snapshot: Arc<RwLock<SimMetricsSnapshot>>,
}

impl Default for MetricsHandle {
    fn default() -> Self {
        Self {
            snapshot: Arc::new(RwLock::new(SimMetricsSnapshot::default())),
        }
    }
}

impl MetricsHandle {
    pub fn snapshot(&self) -> SimMetricsSnapshot {
        match self.snapshot.read() {
            Ok(guard) => *guard,
            Err(poisoned) => {
                warn_metrics_lock_poison_once("read");
                *poisoned.into_inner()
            }
        }
    }

    pub(crate) fn publish(&self, snapshot: SimMetricsSnapshot) {
        match self.snapshot.write() {
            Ok(mut guard) => *guard = snapshot,
            Err(poisoned) => {
                warn_metrics_lock_poison_once("write");
                let mut guard = poisoned.into_inner();
                *guard = snapshot;
            }
        }
    }
}

#[derive(Debug)]
pub(crate) struct MetricsAccumulator {
    interval_start: Instant,
    interval: Duration,
    ticks: u32,
    tick_time_sum: Duration,
    baseline: SimTelemetry,
}

impl MetricsAccumulator {
    pub(crate) fn new(interval: Duration) -> Self {
        Self::starting_at(Instant::now(), interval)
    }

    pub(crate) fn starting_at(start: Instant, interval: Duration) -> Self {
        Self {
            interval_start: start,
            interval,
            ticks: 0,
            tick_time_sum: Duration::ZERO,
            baseline: SimTelemetry::default(),
        }
    }

    pub(crate) fn record_tick(&mut self, tick_cost: Duration) {
        self.ticks = self.ticks.saturating_add(1);
        self.tick_time_sum = self.tick_time_sum.saturating_add(tick_cost);
    }

    pub(crate) fn maybe_snapshot(
        &mut self,
        now: Instant,
        telemetry: SimTelemetry,
    ) -> Option<SimMetricsSnapshot> {
        let elapsed = now.saturating_duration_since(self.interval_start);
        if elapsed < self.interval {
            return None;
        }

        let elapsed_seconds = elapsed.as_secs_f32().max(f32::EPSILON);
        let tick_time_ms = if self.ticks == 0 {
            0.0
        } else {
            (self.tick_time_sum.as_secs_f32() / self.ticks as f32) * 1000.0
        };

        let snapshot = SimMetricsSnapshot {
            tps: self.ticks as f32 / elapsed_seconds,
            tick_time_ms,
            rates: SimRates::between(&self.baseline, &telemetry),
            telemetry,
        };

        self.baseline = telemetry;
        self.interval_start = now;
        self.ticks = 0;
        self.tick_time_sum = Duration::ZERO;

        Some(snapshot)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::RwLock;
    use std::thread;

    use super::*;

    fn poison_lock(lock: &RwLock<SimMetricsSnapshot>) {
        thread::scope(|scope| {
            let _ = scope
                .spawn(|| {
                    let _guard = lock.write().expect("write guard");
                    panic!("poison metrics lock");
                })
                .join();
        });
    }

    #[test]
    fn snapshot_computes_rate_and_mean_tick_cost() {
        let base = Instant::now();
        let mut accumulator = MetricsAccumulator::starting_at(base, Duration::from_secs(1));

        for _ in 0..4 {
            accumulator.record_tick(Duration::from_millis(2));
        }
        let telemetry = SimTelemetry {
            wave: 3,
            active_enemies: 7,
            ..SimTelemetry::default()
        };

        let snapshot = accumulator
            .maybe_snapshot(base + Duration::from_secs(1), telemetry)
            .expect("snapshot should be emitted");

        assert!((snapshot.tps - 4.0).abs() < 0.05);
        assert!((snapshot.tick_time_ms - 2.0).abs() < 0.001);
        assert_eq!(snapshot.telemetry.wave, 3);
        assert_eq!(snapshot.telemetry.active_enemies, 7);
    }

    #[test]
    fn rates_cover_only_the_latest_interval() {
        let base = Instant::now();
        let mut accumulator = MetricsAccumulator::starting_at(base, Duration::from_secs(1));
        let first = SimTelemetry {
            elapsed_seconds: 2.0,
            spawned_total: 6,
            failed_placements_total: 2,
            kills_total: 1,
            active_enemies: 5,
            active_cap: 10,
            ..SimTelemetry::default()
        };
        let snapshot = accumulator
            .maybe_snapshot(base + Duration::from_secs(1), first)
            .expect("first interval");
        assert_eq!(snapshot.rates.spawns_per_second, 3.0);
        assert_eq!(snapshot.rates.placement_failure_ratio, 0.25);
        assert_eq!(snapshot.rates.cap_pressure, 0.5);

        let second = SimTelemetry {
            elapsed_seconds: 6.0,
            spawned_total: 8,
            failed_placements_total: 2,
            kills_total: 9,
            active_enemies: 0,
            active_cap: 10,
            ..SimTelemetry::default()
        };
        let snapshot = accumulator
            .maybe_snapshot(base + Duration::from_secs(2), second)
            .expect("second interval");
        assert_eq!(snapshot.rates.spawns_per_second, 0.5);
        assert_eq!(snapshot.rates.kills_per_second, 2.0);
        assert_eq!(snapshot.rates.placement_failure_ratio, 0.0);
        assert_eq!(snapshot.rates.cap_pressure, 0.0);
    }

    #[test]
    fn rates_stay_finite_without_simulated_time() {
        let idle = SimTelemetry::default();
        assert_eq!(SimRates::between(&idle, &idle), SimRates::default());
    }

    #[test]
    fn snapshot_not_emitted_before_interval() {
        let base = Instant::now();
        let mut accumulator = MetricsAccumulator::starting_at(base, Duration::from_secs(1));
        accumulator.record_tick(Duration::from_millis(1));

        assert!(accumulator
            .maybe_snapshot(base + Duration::from_millis(500), SimTelemetry::default())
            .is_none());
    }

    #[test]
    fn snapshot_recovers_after_poison_without_panic() {
        let handle = MetricsHandle::default();
        poison_lock(handle.snapshot.as_ref());

        let snapshot = handle.snapshot();
        assert_eq!(snapshot.tps, 0.0);
        assert_eq!(snapshot.tick_time_ms, 0.0);
    }

    #[test]
    fn publish_recovers_after_poison_without_panic() {
        let handle = MetricsHandle::default();
        poison_lock(handle.snapshot.as_ref());

        let expected = SimMetricsSnapshot {
            tps: 60.0,
            tick_time_ms: 0.4,
            rates: SimRates {
                kills_per_second: 1.5,
                ..SimRates::default()
            },
            telemetry: SimTelemetry {
                kills_total: 12,
                ..SimTelemetry::default()
            },
        };
        handle.publish(expected);

        assert_eq!(handle.snapshot(), expected);
    }
}
