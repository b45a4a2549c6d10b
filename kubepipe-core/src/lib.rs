//! Kubepipe Core
//!
//! Domain types shared by the kubepipe crates:
//! - Workloads and their lifecycle phases
//! - Supporting resources (services, volume claims)
//! - The pipeline definition produced by the spec loader

pub mod domain;

pub use domain::pipeline::{EnvVar, PipeSpec, PipelineDefinition, Stage};
pub use domain::resource::{CascadePolicy, ResourceKind, SupportService, VolumeClaim};
pub use domain::workload::{
    DEFAULT_NAMESPACE, LabelSelector, NAME_LABEL, Phase, PhaseSet, Workload,
};
