//! Kubernetes implementation of the workload platform
//!
//! Workloads map to pods, services to services and volume claims to
//! persistent volume claims. Manifests from the pipeline file are decoded
//! into the typed API objects; identity fields from the domain type win.

use async_trait::async_trait;
use futures::{AsyncBufReadExt, StreamExt};
use k8s_openapi::api::core::v1::{PersistentVolumeClaim, Pod, Service};
use kube::api::{Api, DeleteParams, LogParams, PostParams, WatchEvent, WatchParams};
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::{Client, Config};
use kubepipe_core::{
    CascadePolicy, DEFAULT_NAMESPACE, LabelSelector, Phase, SupportService, VolumeClaim, Workload,
};
use serde::de::DeserializeOwned;
use std::path::Path;
use tracing::debug;

use crate::error::{PlatformError, Result};
use crate::{EventStream, LogLines, WorkloadEvent, WorkloadPlatform};

/// Workload platform backed by a Kubernetes cluster
#[derive(Clone)]
pub struct KubePlatform {
    client: Client,
}

impl KubePlatform {
    /// Wraps an existing client
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Connects using the kubeconfig at `kube_config`
    ///
    /// Without a path the client is inferred from the environment
    /// (`KUBECONFIG`, `~/.kube/config`, or the in-cluster service account).
    pub async fn connect(kube_config: Option<&Path>) -> Result<Self> {
        let client = match kube_config {
            Some(path) => {
                let kubeconfig = Kubeconfig::read_from(path).map_err(|e| {
                    PlatformError::Config(format!("{}: {}", path.display(), e))
                })?;
                let config =
                    Config::from_custom_kubeconfig(kubeconfig, &KubeConfigOptions::default())
                        .await
                        .map_err(|e| PlatformError::Config(e.to_string()))?;
                Client::try_from(config)?
            }
            None => Client::try_default().await?,
        };

        debug!("Cluster client initialized");
        Ok(Self::new(client))
    }

    fn pods(&self, namespace: &str) -> Api<Pod> {
        Api::namespaced(self.client.clone(), namespace)
    }

    fn services(&self, namespace: &str) -> Api<Service> {
        Api::namespaced(self.client.clone(), namespace)
    }

    fn claims(&self, namespace: &str) -> Api<PersistentVolumeClaim> {
        Api::namespaced(self.client.clone(), namespace)
    }
}

#[async_trait]
impl WorkloadPlatform for KubePlatform {
    async fn create_workload(&self, workload: &Workload) -> Result<Workload> {
        let pod = to_pod(workload)?;
        let created = self
            .pods(&workload.namespace)
            .create(&PostParams::default(), &pod)
            .await?;

        Ok(from_pod(created))
    }

    async fn create_service(&self, service: &SupportService) -> Result<()> {
        let mut object: Service =
            decode_manifest(&service.manifest, "service", &service.name)?;
        object.metadata.name = Some(service.name.clone());
        object.metadata.namespace = Some(service.namespace.clone());

        self.services(&service.namespace)
            .create(&PostParams::default(), &object)
            .await?;
        Ok(())
    }

    async fn create_claim(&self, claim: &VolumeClaim) -> Result<()> {
        let mut object: PersistentVolumeClaim =
            decode_manifest(&claim.manifest, "volume claim", &claim.name)?;
        object.metadata.name = Some(claim.name.clone());
        object.metadata.namespace = Some(claim.namespace.clone());

        self.claims(&claim.namespace)
            .create(&PostParams::default(), &object)
            .await?;
        Ok(())
    }

    async fn watch_workloads(
        &self,
        namespace: &str,
        selector: &LabelSelector,
    ) -> Result<EventStream> {
        let params = WatchParams::default().labels(&selector.to_string());
        let stream = self.pods(namespace).watch(&params, "0").await?;

        let events = stream.map(|event| match event {
            Ok(WatchEvent::Added(pod)) => Ok(WorkloadEvent::Added(from_pod(pod))),
            Ok(WatchEvent::Modified(pod)) => Ok(WorkloadEvent::Modified(from_pod(pod))),
            Ok(WatchEvent::Deleted(pod)) => Ok(WorkloadEvent::Deleted(from_pod(pod))),
            Ok(WatchEvent::Bookmark(_)) => Ok(WorkloadEvent::Bookmark),
            Ok(WatchEvent::Error(response)) => Ok(WorkloadEvent::Error(response.message)),
            Err(e) => Err(PlatformError::from(e)),
        });

        Ok(events.boxed())
    }

    async fn delete_workload(
        &self,
        namespace: &str,
        name: &str,
        cascade: CascadePolicy,
    ) -> Result<()> {
        self.pods(namespace)
            .delete(name, &delete_params(cascade))
            .await?;
        Ok(())
    }

    async fn delete_service(
        &self,
        namespace: &str,
        name: &str,
        cascade: CascadePolicy,
    ) -> Result<()> {
        self.services(namespace)
            .delete(name, &delete_params(cascade))
            .await?;
        Ok(())
    }

    async fn delete_claim(
        &self,
        namespace: &str,
        name: &str,
        cascade: CascadePolicy,
    ) -> Result<()> {
        self.claims(namespace)
            .delete(name, &delete_params(cascade))
            .await?;
        Ok(())
    }

    async fn stream_logs(
        &self,
        namespace: &str,
        workload: &str,
        container: &str,
    ) -> Result<LogLines> {
        let params = LogParams {
            container: Some(container.to_string()),
            follow: true,
            ..Default::default()
        };
        let reader = self.pods(namespace).log_stream(workload, &params).await?;

        let lines = reader.lines().map(|line| line.map_err(PlatformError::from));
        Ok(lines.boxed())
    }
}

fn delete_params(cascade: CascadePolicy) -> DeleteParams {
    match cascade {
        CascadePolicy::Foreground => DeleteParams::foreground(),
        CascadePolicy::Background => DeleteParams::background(),
        CascadePolicy::Orphan => DeleteParams::orphan(),
    }
}

/// Decodes a manifest, starting from an empty object when there is none
fn decode_manifest<K>(manifest: &serde_json::Value, kind: &'static str, name: &str) -> Result<K>
where
    K: DeserializeOwned + Default,
{
    if manifest.is_null() {
        return Ok(K::default());
    }

    serde_json::from_value(manifest.clone()).map_err(|source| PlatformError::InvalidManifest {
        kind,
        name: name.to_string(),
        source,
    })
}

fn to_pod(workload: &Workload) -> Result<Pod> {
    let mut pod: Pod = decode_manifest(&workload.manifest, "workload", &workload.name)?;
    pod.metadata.name = Some(workload.name.clone());
    pod.metadata.namespace = Some(workload.namespace.clone());
    pod.metadata.labels = Some(workload.labels.clone());
    pod.status = None;
    Ok(pod)
}

/// Snapshot of a pod as a workload
///
/// A pod without a reported phase has not been scheduled yet and counts
/// as pending.
fn from_pod(pod: Pod) -> Workload {
    let phase = pod
        .status
        .as_ref()
        .and_then(|status| status.phase.as_deref())
        .map(Phase::from)
        .unwrap_or(Phase::Pending);

    let containers: Vec<String> = pod
        .spec
        .as_ref()
        .map(|spec| spec.containers.iter().map(|c| c.name.clone()).collect())
        .unwrap_or_default();

    let name = pod.metadata.name.clone().unwrap_or_default();
    let namespace = pod
        .metadata
        .namespace
        .clone()
        .unwrap_or_else(|| DEFAULT_NAMESPACE.to_string());
    let labels = pod.metadata.labels.clone().unwrap_or_default();
    let manifest = serde_json::to_value(&pod).unwrap_or(serde_json::Value::Null);

    let mut workload = Workload::new(name, namespace)
        .with_containers(containers)
        .with_phase(phase)
        .with_manifest(manifest);
    workload.labels = labels;
    workload
}
