mod loop_runner;
mod metrics;
mod simulation;

pub use loop_runner::{run_headless, FixedStepper, LoopConfig, RunSummary};
pub use metrics::{MetricsHandle, SimMetricsSnapshot, SimRates};
pub use simulation::{SimCommand, SimTelemetry, Simulation};
