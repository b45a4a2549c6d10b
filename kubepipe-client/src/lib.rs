//! Kubepipe Platform Client
//!
//! The workload platform capability the engine runs against, and its
//! Kubernetes implementation.
//!
//! The engine never talks to the cluster directly: everything goes through
//! [`WorkloadPlatform`], which keeps the runner testable against an
//! in-memory platform.
//!
//! # Example
//!
//! ```no_run
//! use kubepipe_client::{KubePlatform, WorkloadPlatform};
//! use kubepipe_core::{CascadePolicy, Workload};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), kubepipe_client::PlatformError> {
//!     let platform = KubePlatform::connect(None).await?;
//!
//!     let workload = Workload::new("hello", "default").with_containers(["main"]);
//!     platform.create_workload(&workload).await?;
//!     platform
//!         .delete_workload("default", "hello", CascadePolicy::Foreground)
//!         .await?;
//!     Ok(())
//! }
//! ```

pub mod error;
mod kubernetes;

pub use error::{PlatformError, Result};
pub use kubernetes::KubePlatform;

use async_trait::async_trait;
use futures::stream::BoxStream;
use kubepipe_core::{CascadePolicy, LabelSelector, SupportService, VolumeClaim, Workload};

/// Stream of watch events for the workloads matching a selector
pub type EventStream = BoxStream<'static, Result<WorkloadEvent>>;

/// Stream of log lines from one container
pub type LogLines = BoxStream<'static, Result<String>>;

/// A change notification delivered by a workload watch
#[derive(Debug, Clone)]
pub enum WorkloadEvent {
    Added(Workload),
    Modified(Workload),
    Deleted(Workload),
    /// Progress marker without an object
    Bookmark,
    /// Error reported inside the watch itself
    Error(String),
}

impl WorkloadEvent {
    /// The workload snapshot this event carries, if any
    pub fn into_workload(self) -> Option<Workload> {
        match self {
            WorkloadEvent::Added(workload)
            | WorkloadEvent::Modified(workload)
            | WorkloadEvent::Deleted(workload) => Some(workload),
            WorkloadEvent::Bookmark | WorkloadEvent::Error(_) => None,
        }
    }
}

/// Remote workload platform
///
/// Delete operations must report an absent resource as an error for which
/// [`PlatformError::is_not_found`] is true.
#[async_trait]
pub trait WorkloadPlatform: Send + Sync {
    /// Submits a workload and returns the platform's view of it
    async fn create_workload(&self, workload: &Workload) -> Result<Workload>;

    async fn create_service(&self, service: &SupportService) -> Result<()>;

    async fn create_claim(&self, claim: &VolumeClaim) -> Result<()>;

    /// Opens a watch on the workloads in `namespace` matching `selector`
    async fn watch_workloads(
        &self,
        namespace: &str,
        selector: &LabelSelector,
    ) -> Result<EventStream>;

    async fn delete_workload(
        &self,
        namespace: &str,
        name: &str,
        cascade: CascadePolicy,
    ) -> Result<()>;

    async fn delete_service(&self, namespace: &str, name: &str, cascade: CascadePolicy)
    -> Result<()>;

    async fn delete_claim(&self, namespace: &str, name: &str, cascade: CascadePolicy) -> Result<()>;

    /// Follows the log of one container until it ends
    async fn stream_logs(&self, namespace: &str, workload: &str, container: &str)
    -> Result<LogLines>;
}
