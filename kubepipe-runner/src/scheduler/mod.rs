//! Scheduler layer
//!
//! Composes single-workload runs into the two phases of a pipeline: a
//! parallel prepare fan-out and a sequential chain of stages.

mod chain;
mod stages;

pub use chain::TaskChain;
pub use stages::StageOrchestrator;
