//! Pipeline file loader
//!
//! Decodes a stream of YAML or JSON documents into a [`PipelineDefinition`].
//! Each document is dispatched on its `apiVersion`/`kind` through the
//! [`DocumentRegistry`] the loader was built with.

use kubepipe_core::{
    DEFAULT_NAMESPACE, NAME_LABEL, PipeSpec, PipelineDefinition, SupportService, VolumeClaim,
    Workload,
};
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, warn};

use crate::error::{LoadError, Result};
use crate::registry::{DocumentKind, DocumentRegistry};

/// Source of pipeline definitions
///
/// The controller only depends on this trait, so a definition can come from
/// a file on disk or be assembled in memory.
pub trait DefinitionLoader: Send + Sync {
    /// Loads the definition stored at `path`
    ///
    /// # Errors
    /// Returns [`LoadError::PipeNotFound`] if the file holds no `Pipe`
    /// document, or another [`LoadError`] if it cannot be read or decoded.
    fn load(&self, path: &Path) -> Result<PipelineDefinition>;
}

/// Loader for multi-document pipeline files
#[derive(Debug, Clone, Default)]
pub struct SpecLoader {
    registry: DocumentRegistry,
}

/// Identity fields read from a document's `metadata`
struct Metadata {
    name: String,
    namespace: String,
    labels: BTreeMap<String, String>,
}

#[derive(Deserialize, Default)]
struct PodBody {
    #[serde(default)]
    containers: Vec<ContainerRef>,
}

#[derive(Deserialize)]
struct ContainerRef {
    name: String,
}

impl SpecLoader {
    pub fn new(registry: DocumentRegistry) -> Self {
        Self { registry }
    }

    /// Parses a pipeline definition from the contents of a pipeline file
    ///
    /// Later documents replace earlier ones with the same name.
    ///
    /// # Example
    /// ```
    /// use kubepipe_spec::{DocumentRegistry, SpecLoader};
    ///
    /// let source = r#"
    /// apiVersion: v1
    /// kind: Pod
    /// metadata:
    ///   name: pod1
    /// spec:
    ///   containers:
    ///   - name: main
    ///     image: busybox
    /// ---
    /// apiVersion: v1
    /// kind: Pipe
    /// metadata:
    ///   name: demo
    /// spec:
    ///   stages:
    ///   - name: s1
    ///     jobs: [pod1]
    /// "#;
    ///
    /// let definition = SpecLoader::new(DocumentRegistry::standard()).load_str(source)?;
    /// assert_eq!(definition.pipe.name, "demo");
    /// assert_eq!(definition.workloads["pod1"].namespace, "default");
    /// # Ok::<(), kubepipe_spec::LoadError>(())
    /// ```
    pub fn load_str(&self, source: &str) -> Result<PipelineDefinition> {
        let mut definition = PipelineDefinition::default();
        let mut pipe: Option<PipeSpec> = None;

        for (index, document) in decode_documents(source)?.into_iter().enumerate() {
            let (api_version, kind) =
                type_info(&document).ok_or(LoadError::MissingTypeInfo { index })?;

            let target = self
                .registry
                .get(&api_version, &kind)
                .ok_or_else(|| LoadError::UnknownKind {
                    api_version: api_version.clone(),
                    kind: kind.clone(),
                })?;

            match target {
                DocumentKind::Workload => {
                    let workload = decode_workload(document, &kind, index)?;
                    if definition.workloads.contains_key(&workload.name) {
                        debug!("Replacing earlier workload document {}", workload.name);
                    }
                    definition.workloads.insert(workload.name.clone(), workload);
                }
                DocumentKind::Service => {
                    let (metadata, manifest) = decode_resource(document, &kind, index)?;
                    let service = SupportService::new(metadata.name, metadata.namespace)
                        .with_manifest(manifest);
                    definition.services.insert(service.name.clone(), service);
                }
                DocumentKind::Claim => {
                    let (metadata, manifest) = decode_resource(document, &kind, index)?;
                    let claim = VolumeClaim::new(metadata.name, metadata.namespace)
                        .with_manifest(manifest);
                    definition.claims.insert(claim.name.clone(), claim);
                }
                DocumentKind::Pipe => {
                    let spec = decode_pipe(&document, &kind)?;
                    if pipe.replace(spec).is_some() {
                        warn!("Multiple {} documents found, keeping the last one", kind);
                    }
                }
            }
        }

        definition.pipe = pipe.ok_or(LoadError::PipeNotFound)?;

        debug!(
            "Loaded pipeline '{}': {} workload(s), {} service(s), {} claim(s), {} stage(s)",
            definition.pipe.name,
            definition.workloads.len(),
            definition.services.len(),
            definition.claims.len(),
            definition.pipe.stages.len()
        );

        Ok(definition)
    }
}

impl DefinitionLoader for SpecLoader {
    fn load(&self, path: &Path) -> Result<PipelineDefinition> {
        let source = std::fs::read_to_string(path).map_err(|source| LoadError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        self.load_str(&source)
    }
}

/// Splits the source into documents
///
/// Sources starting with `{` or `[` are read as concatenated JSON values,
/// anything else as `---`-separated YAML. Empty documents are dropped and
/// top-level arrays are flattened.
fn decode_documents(source: &str) -> Result<Vec<Value>> {
    let trimmed = source.trim_start();
    let mut documents = Vec::new();

    if trimmed.is_empty() {
        return Ok(documents);
    }

    if trimmed.starts_with('{') || trimmed.starts_with('[') {
        for document in serde_json::Deserializer::from_str(trimmed).into_iter::<Value>() {
            push_document(&mut documents, document?);
        }
    } else {
        for document in serde_yaml::Deserializer::from_str(source) {
            push_document(&mut documents, Value::deserialize(document)?);
        }
    }

    Ok(documents)
}

fn push_document(documents: &mut Vec<Value>, document: Value) {
    match document {
        Value::Null => {}
        Value::Array(items) => {
            for item in items {
                push_document(documents, item);
            }
        }
        other => documents.push(other),
    }
}

fn type_info(document: &Value) -> Option<(String, String)> {
    let api_version = document.get("apiVersion")?.as_str()?;
    let kind = document.get("kind")?.as_str()?;
    Some((api_version.to_string(), kind.to_string()))
}

fn read_metadata(document: &Value, kind: &str, index: usize) -> Result<Metadata> {
    let name = document
        .pointer("/metadata/name")
        .and_then(Value::as_str)
        .filter(|name| !name.is_empty())
        .ok_or_else(|| LoadError::MissingName {
            kind: kind.to_string(),
            index,
        })?
        .to_string();

    let namespace = document
        .pointer("/metadata/namespace")
        .and_then(Value::as_str)
        .filter(|namespace| !namespace.is_empty())
        .unwrap_or(DEFAULT_NAMESPACE)
        .to_string();

    let labels = match document.pointer("/metadata/labels") {
        Some(labels) if !labels.is_null() => serde_json::from_value(labels.clone()).map_err(
            |source| LoadError::InvalidDocument {
                kind: kind.to_string(),
                name: name.clone(),
                source,
            },
        )?,
        _ => BTreeMap::new(),
    };

    Ok(Metadata {
        name,
        namespace,
        labels,
    })
}

/// Writes a metadata field back into the manifest
fn set_metadata(document: &mut Value, field: &str, value: Value) {
    if let Some(metadata) = document.get_mut("metadata").and_then(Value::as_object_mut) {
        metadata.insert(field.to_string(), value);
    }
}

fn decode_resource(mut document: Value, kind: &str, index: usize) -> Result<(Metadata, Value)> {
    let metadata = read_metadata(&document, kind, index)?;
    set_metadata(
        &mut document,
        "namespace",
        Value::String(metadata.namespace.clone()),
    );
    Ok((metadata, document))
}

fn decode_workload(document: Value, kind: &str, index: usize) -> Result<Workload> {
    let (mut metadata, mut manifest) = decode_resource(document, kind, index)?;

    // The watcher selects on this label, whatever the document said.
    metadata
        .labels
        .insert(NAME_LABEL.to_string(), metadata.name.clone());
    let labels = serde_json::to_value(&metadata.labels)?;
    set_metadata(&mut manifest, "labels", labels);

    let body: PodBody = match manifest.get("spec") {
        Some(spec) if !spec.is_null() => {
            serde_json::from_value(spec.clone()).map_err(|source| LoadError::InvalidDocument {
                kind: kind.to_string(),
                name: metadata.name.clone(),
                source,
            })?
        }
        _ => PodBody::default(),
    };

    let mut workload = Workload::new(metadata.name, metadata.namespace)
        .with_containers(body.containers.into_iter().map(|c| c.name))
        .with_manifest(manifest);
    workload.labels = metadata.labels;

    Ok(workload)
}

fn decode_pipe(document: &Value, kind: &str) -> Result<PipeSpec> {
    let name = document
        .pointer("/metadata/name")
        .and_then(Value::as_str)
        .unwrap_or("pipe")
        .to_string();

    let mut spec: PipeSpec = match document.get("spec") {
        Some(body) if !body.is_null() => {
            serde_json::from_value(body.clone()).map_err(|source| LoadError::InvalidDocument {
                kind: kind.to_string(),
                name: name.clone(),
                source,
            })?
        }
        _ => PipeSpec::default(),
    };
    spec.name = name;

    Ok(spec)
}
