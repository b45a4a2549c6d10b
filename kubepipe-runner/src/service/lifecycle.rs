//! Resource lifecycle
//!
//! Creates the support resources a pipeline needs and clears everything
//! the pipeline file declares once the run is over.

use kubepipe_client::{PlatformError, WorkloadPlatform};
use kubepipe_core::{
    CascadePolicy, PipelineDefinition, ResourceKind, SupportService, VolumeClaim, Workload,
};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::error::{Result, RunError};

/// What a clear operation found
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cleared {
    Deleted,
    /// The resource did not exist, which counts as success
    AlreadyAbsent,
}

/// Counts from a teardown pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TeardownSummary {
    pub deleted: usize,
    pub absent: usize,
    pub failed: usize,
}

impl TeardownSummary {
    fn record(&mut self, result: std::result::Result<Cleared, PlatformError>) {
        match result {
            Ok(Cleared::Deleted) => self.deleted += 1,
            Ok(Cleared::AlreadyAbsent) => self.absent += 1,
            Err(_) => self.failed += 1,
        }
    }
}

impl fmt::Display for TeardownSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} deleted, {} already absent, {} failed",
            self.deleted, self.absent, self.failed
        )
    }
}

/// Creates and clears pipeline resources on the platform
pub struct ResourceManager {
    platform: Arc<dyn WorkloadPlatform>,
    cascade: CascadePolicy,
}

impl ResourceManager {
    pub fn new(platform: Arc<dyn WorkloadPlatform>, cascade: CascadePolicy) -> Self {
        Self { platform, cascade }
    }

    pub async fn create_service(&self, service: &SupportService) -> Result<()> {
        info!("Creating service {}/{}", service.namespace, service.name);
        self.platform
            .create_service(service)
            .await
            .map_err(|source| {
                create_error(ResourceKind::Service, &service.namespace, &service.name, source)
            })
    }

    pub async fn create_claim(&self, claim: &VolumeClaim) -> Result<()> {
        info!("Creating volume claim {}/{}", claim.namespace, claim.name);
        self.platform
            .create_claim(claim)
            .await
            .map_err(|source| {
                create_error(ResourceKind::Claim, &claim.namespace, &claim.name, source)
            })
    }

    pub async fn clear_workload(
        &self,
        workload: &Workload,
    ) -> std::result::Result<Cleared, PlatformError> {
        let result = self
            .platform
            .delete_workload(&workload.namespace, &workload.name, self.cascade)
            .await;
        cleared(ResourceKind::Workload, &workload.key(), result)
    }

    pub async fn clear_service(
        &self,
        service: &SupportService,
    ) -> std::result::Result<Cleared, PlatformError> {
        let result = self
            .platform
            .delete_service(&service.namespace, &service.name, self.cascade)
            .await;
        cleared(
            ResourceKind::Service,
            &format!("{}/{}", service.namespace, service.name),
            result,
        )
    }

    pub async fn clear_claim(
        &self,
        claim: &VolumeClaim,
    ) -> std::result::Result<Cleared, PlatformError> {
        let result = self
            .platform
            .delete_claim(&claim.namespace, &claim.name, self.cascade)
            .await;
        cleared(
            ResourceKind::Claim,
            &format!("{}/{}", claim.namespace, claim.name),
            result,
        )
    }

    /// Clears every workload, then every service, then every claim the
    /// definition declares
    ///
    /// Failures are logged and counted; they never stop the pass.
    pub async fn teardown(&self, definition: &PipelineDefinition) -> TeardownSummary {
        let total =
            definition.workloads.len() + definition.services.len() + definition.claims.len();
        info!("Cleaning up {} resource(s) ({} cascade)", total, self.cascade);

        let mut summary = TeardownSummary::default();
        for workload in definition.workloads.values() {
            summary.record(self.clear_workload(workload).await);
        }
        for service in definition.services.values() {
            summary.record(self.clear_service(service).await);
        }
        for claim in definition.claims.values() {
            summary.record(self.clear_claim(claim).await);
        }

        info!("Cleanup complete: {}", summary);
        summary
    }
}

fn create_error(
    kind: ResourceKind,
    namespace: &str,
    name: &str,
    source: PlatformError,
) -> RunError {
    if source.is_conflict() {
        warn!(
            "{} {}/{} already exists; a previous run may still be tearing down",
            kind, namespace, name
        );
    }
    RunError::Create {
        kind,
        name: format!("{}/{}", namespace, name),
        source,
    }
}

fn cleared(
    kind: ResourceKind,
    key: &str,
    result: std::result::Result<(), PlatformError>,
) -> std::result::Result<Cleared, PlatformError> {
    match result {
        Ok(()) => {
            debug!("Deleted {} {}", kind, key);
            Ok(Cleared::Deleted)
        }
        Err(e) if e.is_not_found() => {
            debug!("{} {} already gone", kind, key);
            Ok(Cleared::AlreadyAbsent)
        }
        Err(e) => {
            warn!("Failed to delete {} {}: {}", kind, key, e);
            Err(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakePlatform;
    use kubepipe_core::PipeSpec;

    fn manager(platform: &FakePlatform) -> ResourceManager {
        ResourceManager::new(Arc::new(platform.clone()), CascadePolicy::Foreground)
    }

    fn definition() -> PipelineDefinition {
        PipelineDefinition::new(PipeSpec::default())
            .with_workload(Workload::new("pod1", "default"))
            .with_workload(Workload::new("pod2", "default"))
            .with_service(SupportService::new("svc1", "default"))
            .with_claim(VolumeClaim::new("data", "default"))
    }

    #[tokio::test]
    async fn test_create_service_failure_names_resource() {
        let platform = FakePlatform::new().failing_create("svc1");
        let err = manager(&platform)
            .create_service(&SupportService::new("svc1", "ci"))
            .await
            .unwrap_err();

        match err {
            RunError::Create { kind, name, .. } => {
                assert_eq!(kind, ResourceKind::Service);
                assert_eq!(name, "ci/svc1");
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[tokio::test]
    async fn test_create_existing_service_is_an_error() {
        let platform = FakePlatform::new().existing_service("svc1");
        let err = manager(&platform)
            .create_service(&SupportService::new("svc1", "default"))
            .await
            .unwrap_err();

        match err {
            RunError::Create { source, .. } => assert!(source.is_conflict()),
            other => panic!("unexpected error: {}", other),
        }
    }

    #[tokio::test]
    async fn test_clear_absent_resource_succeeds() {
        let platform = FakePlatform::new();
        let result = manager(&platform)
            .clear_workload(&Workload::new("ghost", "default"))
            .await;

        assert_eq!(result.unwrap(), Cleared::AlreadyAbsent);
    }

    #[tokio::test]
    async fn test_clear_propagates_other_failures() {
        let platform = FakePlatform::new().failing_delete("data");
        let result = manager(&platform)
            .clear_claim(&VolumeClaim::new("data", "default"))
            .await;

        assert!(!result.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_teardown_clears_in_kind_order() {
        let platform = FakePlatform::new();
        let manager = manager(&platform);
        let definition = definition();

        manager.create_service(&SupportService::new("svc1", "default")).await.unwrap();
        manager.create_claim(&VolumeClaim::new("data", "default")).await.unwrap();

        let summary = manager.teardown(&definition).await;
        assert_eq!(
            summary,
            TeardownSummary {
                deleted: 2,
                absent: 2,
                failed: 0
            }
        );

        let pod = platform.position("delete:workload:pod2").unwrap();
        let service = platform.position("delete:service:svc1").unwrap();
        let claim = platform.position("delete:claim:data").unwrap();
        assert!(pod < service && service < claim);
        assert_eq!(platform.live_resources(), 0);
    }

    #[tokio::test]
    async fn test_teardown_continues_after_failure() {
        let platform = FakePlatform::new().failing_delete("pod1");
        let summary = manager(&platform).teardown(&definition()).await;

        assert_eq!(summary.failed, 1);
        assert_eq!(summary.absent, 3);
        assert!(platform.position("delete:claim:data").is_some());
        assert_eq!(summary.to_string(), "0 deleted, 3 already absent, 1 failed");
    }
}
