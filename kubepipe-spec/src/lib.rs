//! Kubepipe Spec Loader
//!
//! Turns a pipeline file into a [`PipelineDefinition`]:
//! - Document registry mapping `apiVersion`/`kind` to domain types
//! - YAML and JSON multi-document decoding
//! - Namespace defaulting and selector labelling of workloads

pub mod error;
pub mod loader;
pub mod registry;

pub use error::{LoadError, Result};
pub use loader::{DefinitionLoader, SpecLoader};
pub use registry::{DocumentKind, DocumentRegistry};

pub use kubepipe_core::PipelineDefinition;
