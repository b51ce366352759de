//! Library resolution for `#import`.
//!
//! Template loading and caching are outside the core; the evaluator asks a
//! [`LibraryResolver`] for an already-parsed template by name.

use std::sync::Arc;

use rustc_hash::FxHashMap;
use stencil_ir::Template;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LibraryError {
    #[error("library {0:?} not found")]
    NotFound(String),
    #[error("library {name:?} could not be loaded: {reason}")]
    Load { name: String, reason: String },
}

pub trait LibraryResolver: Send + Sync {
    fn resolve(&self, name: &str) -> Result<Arc<Template>, LibraryError>;
}

/// Resolver for runs that import nothing.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoLibraries;

impl LibraryResolver for NoLibraries {
    fn resolve(&self, name: &str) -> Result<Arc<Template>, LibraryError> {
        Err(LibraryError::NotFound(name.to_owned()))
    }
}

/// Fixed set of pre-parsed libraries keyed by name.
#[derive(Clone, Debug, Default)]
pub struct StaticLibraries {
    libraries: FxHashMap<String, Arc<Template>>,
}

impl StaticLibraries {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with(mut self, name: impl Into<String>, template: Template) -> Self {
        self.insert(name, template);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, template: Template) {
        self.libraries.insert(name.into(), Arc::new(template));
    }
}

impl LibraryResolver for StaticLibraries {
    fn resolve(&self, name: &str) -> Result<Arc<Template>, LibraryError> {
        self.libraries
            .get(name)
            .cloned()
            .ok_or_else(|| LibraryError::NotFound(name.to_owned()))
    }
}
