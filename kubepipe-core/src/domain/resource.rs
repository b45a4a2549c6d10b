//! Supporting resource types
//!
//! Services and volume claims are created before any workload runs and are
//! removed at teardown. The engine only needs their identity; the manifest is
//! handed to the platform untouched.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A networking endpoint fronting one or more workloads
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SupportService {
    pub name: String,
    pub namespace: String,
    pub manifest: serde_json::Value,
}

impl SupportService {
    pub fn new(name: impl Into<String>, namespace: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespace: namespace.into(),
            manifest: serde_json::Value::Null,
        }
    }

    pub fn with_manifest(mut self, manifest: serde_json::Value) -> Self {
        self.manifest = manifest;
        self
    }
}

/// A persistent storage request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VolumeClaim {
    pub name: String,
    pub namespace: String,
    pub manifest: serde_json::Value,
}

impl VolumeClaim {
    pub fn new(name: impl Into<String>, namespace: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespace: namespace.into(),
            manifest: serde_json::Value::Null,
        }
    }

    pub fn with_manifest(mut self, manifest: serde_json::Value) -> Self {
        self.manifest = manifest;
        self
    }
}

/// Kind of resource the engine creates and clears
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResourceKind {
    Workload,
    Service,
    Claim,
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceKind::Workload => write!(f, "workload"),
            ResourceKind::Service => write!(f, "service"),
            ResourceKind::Claim => write!(f, "volume claim"),
        }
    }
}

/// How dependents are handled when a resource is deleted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CascadePolicy {
    /// Dependents are deleted before the owner goes away
    #[default]
    Foreground,
    /// Owner goes away immediately, dependents are collected afterwards
    Background,
    /// Dependents are left in place
    Orphan,
}

impl fmt::Display for CascadePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CascadePolicy::Foreground => write!(f, "Foreground"),
            CascadePolicy::Background => write!(f, "Background"),
            CascadePolicy::Orphan => write!(f, "Orphan"),
        }
    }
}

impl FromStr for CascadePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "foreground" => Ok(CascadePolicy::Foreground),
            "background" => Ok(CascadePolicy::Background),
            "orphan" => Ok(CascadePolicy::Orphan),
            other => Err(format!("unknown cascade policy '{}'", other)),
        }
    }
}
