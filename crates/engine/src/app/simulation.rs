#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimCommand {
    Continue,
    Stop,
}

/// Counters a simulation reports to the runner for periodic metrics.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SimTelemetry {
    pub elapsed_seconds: f32,
    pub wave: u32,
    pub spawn_interval: f32,
    pub active_cap: u32,
    pub active_enemies: u32,
    pub active_projectiles: u32,
    pub active_effects: u32,
    pub spawned_total: u64,
    pub failed_placements_total: u64,
    pub kills_total: u64,
    pub released_total: u64,
}

/// Fixed-step simulation driven by [`run_headless`](super::run_headless).
pub trait Simulation {
    fn load(&mut self) {}
    fn step(&mut self, fixed_dt_seconds: f32) -> SimCommand;
    fn telemetry(&self) -> SimTelemetry;
    fn unload(&mut self) {}
}
