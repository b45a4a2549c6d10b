//! Pipeline domain types

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;

use super::resource::{SupportService, VolumeClaim};
use super::workload::Workload;

/// Environment entry declared by a pipeline
///
/// Informational only: the engine logs these but does not inject them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvVar {
    pub name: String,
    #[serde(default)]
    pub value: String,
}

/// An ordered step of the run phase
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stage {
    pub name: String,
    #[serde(default, deserialize_with = "one_or_many")]
    pub jobs: Vec<String>,
}

impl Stage {
    /// The job this stage runs. Only the first listed job is honored.
    pub fn primary_job(&self) -> Option<&str> {
        self.jobs.first().map(String::as_str)
    }

    /// Jobs listed after the first one, which are not run
    pub fn ignored_jobs(&self) -> &[String] {
        self.jobs.get(1..).unwrap_or(&[])
    }
}

/// The `spec` body of a `Pipe` document
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PipeSpec {
    /// Taken from the document's `metadata.name`
    #[serde(skip)]
    pub name: String,

    #[serde(default)]
    pub env: Vec<EnvVar>,

    /// Workloads brought to Running, in parallel, before any stage starts
    #[serde(default, rename = "service", alias = "services")]
    pub services: Vec<String>,

    #[serde(default)]
    pub stages: Vec<Stage>,
}

/// Everything the spec loader produced for one pipeline file
///
/// Built once before any concurrent work starts and read-only afterwards.
#[derive(Debug, Clone, Default)]
pub struct PipelineDefinition {
    pub workloads: BTreeMap<String, Workload>,
    pub services: BTreeMap<String, SupportService>,
    pub claims: BTreeMap<String, VolumeClaim>,
    pub pipe: PipeSpec,
}

impl PipelineDefinition {
    pub fn new(pipe: PipeSpec) -> Self {
        Self {
            pipe,
            ..Default::default()
        }
    }

    pub fn with_workload(mut self, workload: Workload) -> Self {
        self.workloads.insert(workload.name.clone(), workload);
        self
    }

    pub fn with_service(mut self, service: SupportService) -> Self {
        self.services.insert(service.name.clone(), service);
        self
    }

    pub fn with_claim(mut self, claim: VolumeClaim) -> Self {
        self.claims.insert(claim.name.clone(), claim);
        self
    }

    /// Workloads of the prepare phase, in declaration order
    ///
    /// Names that do not resolve to a workload are skipped.
    pub fn prepare_targets(&self) -> Vec<&Workload> {
        self.pipe
            .services
            .iter()
            .filter_map(|name| self.workloads.get(name))
            .collect()
    }

    /// Workload a stage runs, if its first job resolves
    pub fn stage_target(&self, stage: &Stage) -> Option<&Workload> {
        stage
            .primary_job()
            .and_then(|name| self.workloads.get(name))
    }

    /// Referenced names that resolve to no workload
    pub fn unresolved_names(&self) -> Vec<&str> {
        let services = self.pipe.services.iter().map(String::as_str);
        let jobs = self.pipe.stages.iter().filter_map(Stage::primary_job);

        services
            .chain(jobs)
            .filter(|name| !self.workloads.contains_key(*name))
            .collect()
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

/// Accepts `jobs: name` as well as `jobs: [name, ...]`
fn one_or_many<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<OneOrMany>::deserialize(deserializer)? {
        None => Vec::new(),
        Some(OneOrMany::One(job)) => vec![job],
        Some(OneOrMany::Many(jobs)) => jobs,
    })
}
