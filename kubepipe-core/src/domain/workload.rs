//! Workload domain types
//!
//! A workload is one schedulable unit of work (a pod) together with the
//! lifecycle phase last observed for it.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Label the watcher selects workloads by. Always equal to the workload name.
pub const NAME_LABEL: &str = "name";

/// Namespace used when a document does not set one
pub const DEFAULT_NAMESPACE: &str = "default";

/// Lifecycle phase of a workload
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Phase {
    Pending,
    Running,
    Succeeded,
    Failed,
    Unknown,
}

impl Phase {
    /// Returns the platform spelling of this phase
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Pending => "Pending",
            Phase::Running => "Running",
            Phase::Succeeded => "Succeeded",
            Phase::Failed => "Failed",
            Phase::Unknown => "Unknown",
        }
    }

    /// Returns true once the workload can no longer change phase
    pub fn is_terminal(&self) -> bool {
        matches!(self, Phase::Succeeded | Phase::Failed)
    }
}

impl From<&str> for Phase {
    fn from(value: &str) -> Self {
        match value {
            "Pending" => Phase::Pending,
            "Running" => Phase::Running,
            "Succeeded" => Phase::Succeeded,
            "Failed" => Phase::Failed,
            _ => Phase::Unknown,
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Set of phases a watcher waits for
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PhaseSet(BTreeSet<Phase>);

impl PhaseSet {
    /// Phases that end the prepare wait
    pub fn running() -> Self {
        Self::from_iter([Phase::Running])
    }

    /// Phases that end a stage wait: the job finished, whichever way
    pub fn finished() -> Self {
        Self::from_iter([Phase::Succeeded, Phase::Failed])
    }

    pub fn contains(&self, phase: Phase) -> bool {
        self.0.contains(&phase)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<Phase> for PhaseSet {
    fn from_iter<I: IntoIterator<Item = Phase>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl fmt::Display for PhaseSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.0.iter().map(Phase::as_str).collect();
        write!(f, "{}", names.join("|"))
    }
}

/// Equality-based label selector
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LabelSelector(BTreeMap<String, String>);

impl LabelSelector {
    /// Selector matching the workload carrying `name` in its name label
    pub fn for_name(name: &str) -> Self {
        let mut labels = BTreeMap::new();
        labels.insert(NAME_LABEL.to_string(), name.to_string());
        Self(labels)
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    /// Returns true if every selector term is present in `labels`
    pub fn matches(&self, labels: &BTreeMap<String, String>) -> bool {
        self.0
            .iter()
            .all(|(key, value)| labels.get(key) == Some(value))
    }
}

impl fmt::Display for LabelSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let terms: Vec<String> = self
            .0
            .iter()
            .map(|(key, value)| format!("{}={}", key, value))
            .collect();
        write!(f, "{}", terms.join(","))
    }
}

/// A job unit to run on the platform
///
/// `manifest` holds the full document the workload was loaded from; the
/// identity fields here take precedence over whatever it carries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Workload {
    pub name: String,
    pub namespace: String,
    pub labels: BTreeMap<String, String>,
    /// Container names, one log stream each
    pub containers: Vec<String>,
    pub phase: Phase,
    pub manifest: serde_json::Value,
}

impl Workload {
    /// Creates a pending workload with its selector label already in place
    pub fn new(name: impl Into<String>, namespace: impl Into<String>) -> Self {
        let name = name.into();
        let mut labels = BTreeMap::new();
        labels.insert(NAME_LABEL.to_string(), name.clone());

        Self {
            name,
            namespace: namespace.into(),
            labels,
            containers: Vec::new(),
            phase: Phase::Pending,
            manifest: serde_json::Value::Null,
        }
    }

    pub fn with_containers<I, S>(mut self, containers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.containers = containers.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_phase(mut self, phase: Phase) -> Self {
        self.phase = phase;
        self
    }

    pub fn with_manifest(mut self, manifest: serde_json::Value) -> Self {
        self.manifest = manifest;
        self
    }

    /// Selector the watcher uses to follow this workload
    pub fn selector(&self) -> LabelSelector {
        LabelSelector::for_name(&self.name)
    }

    /// `namespace/name`, used in log lines and errors
    pub fn key(&self) -> String {
        format!("{}/{}", self.namespace, self.name)
    }
}
