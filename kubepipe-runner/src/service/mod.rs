//! Service layer
//!
//! Services hold the per-resource logic of a run: creating and clearing
//! resources, driving a workload to a phase, and following container logs.
//! They only reach the cluster through the `WorkloadPlatform` trait.

mod lifecycle;
mod log_stream;
mod watcher;

pub use lifecycle::{Cleared, ResourceManager, TeardownSummary};
pub use log_stream::{LogSink, LogStreamer, StdoutSink};
pub use watcher::JobWatcher;
