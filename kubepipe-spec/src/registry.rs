//! Document kind registry
//!
//! Maps the `apiVersion`/`kind` pair of a pipeline document to the domain type
//! it decodes into. A registry is built once at startup and handed to the
//! [`SpecLoader`](crate::SpecLoader); there is no process-wide registry.

use std::collections::HashMap;

/// Domain type a document decodes into
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    Workload,
    Service,
    Claim,
    Pipe,
}

/// Registry of known document kinds
#[derive(Debug, Clone)]
pub struct DocumentRegistry {
    kinds: HashMap<(String, String), DocumentKind>,
}

impl DocumentRegistry {
    /// Creates a new empty registry
    pub fn new() -> Self {
        Self {
            kinds: HashMap::new(),
        }
    }

    /// Registry with every kind a pipeline file may contain
    pub fn standard() -> Self {
        let mut registry = Self::new();
        registry.register("v1", "Pod", DocumentKind::Workload);
        registry.register("v1", "Service", DocumentKind::Service);
        registry.register("v1", "PersistentVolumeClaim", DocumentKind::Claim);
        registry.register("v1", "Pipe", DocumentKind::Pipe);
        registry
    }

    /// Registers a document kind
    ///
    /// # Panics
    /// Panics if the `apiVersion`/`kind` pair is already registered
    pub fn register(&mut self, api_version: &str, kind: &str, target: DocumentKind) {
        let key = (api_version.to_string(), kind.to_string());
        if self.kinds.contains_key(&key) {
            panic!(
                "Document kind '{}' is already registered for version '{}'",
                kind, api_version
            );
        }
        self.kinds.insert(key, target);
    }

    /// Looks up the domain type for a document
    pub fn get(&self, api_version: &str, kind: &str) -> Option<DocumentKind> {
        self.kinds
            .get(&(api_version.to_string(), kind.to_string()))
            .copied()
    }
}

impl Default for DocumentRegistry {
    fn default() -> Self {
        Self::standard()
    }
}
