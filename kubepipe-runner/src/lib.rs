//! Kubepipe Runner
//!
//! The engine that executes a pipeline against a workload platform.
//!
//! Architecture:
//! - Configuration: phase timeouts, watch retry cadence, teardown policy
//! - Services: resource lifecycle, run-until-phase watching, log streaming
//! - Scheduler: prepare fan-out and the sequential stage chain
//! - Controller: one run from pipeline file to teardown
//!
//! Everything reaches the cluster through
//! [`kubepipe_client::WorkloadPlatform`].

pub mod config;
pub mod controller;
pub mod error;
pub mod report;
pub mod scheduler;
pub mod service;

#[cfg(test)]
mod testing;

pub use config::RunnerConfig;
pub use controller::PipelineController;
pub use error::{Result, RunError};
pub use report::{PipelineReport, StageOutcome};
pub use scheduler::{StageOrchestrator, TaskChain};
pub use service::{
    Cleared, JobWatcher, LogSink, LogStreamer, ResourceManager, StdoutSink, TeardownSummary,
};
