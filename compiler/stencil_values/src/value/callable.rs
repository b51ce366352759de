//! Callable values.

use std::sync::Arc;

use indexmap::IndexMap;
use stencil_ir::CallableDef;

use super::{NamespaceId, Value};

/// Arguments pre-bound by `?with_args` / `?with_args_last`.
#[derive(Clone, Debug, PartialEq)]
pub enum BoundArgs {
    Positional(Vec<Value>),
    Named(IndexMap<String, Value>),
}

#[derive(Clone, Debug, PartialEq)]
pub struct WithArgs {
    pub args: BoundArgs,
    /// Positional pre-bound arguments go after the call-site ones.
    pub last: bool,
}

/// A macro or function as a value: its definition plus the namespace it was
/// defined in, which becomes current while its body runs.
#[derive(Clone, Debug)]
pub struct CallableValue {
    pub def: Arc<CallableDef>,
    pub namespace: NamespaceId,
    pub with_args: Option<Arc<WithArgs>>,
}

impl CallableValue {
    pub fn new(def: Arc<CallableDef>, namespace: NamespaceId) -> Self {
        CallableValue {
            def,
            namespace,
            with_args: None,
        }
    }

    /// Copy carrying pre-bound arguments. Replaces any earlier ones.
    #[must_use]
    pub fn with_args(&self, with_args: WithArgs) -> Self {
        CallableValue {
            def: Arc::clone(&self.def),
            namespace: self.namespace,
            with_args: Some(Arc::new(with_args)),
        }
    }

    pub fn name(&self) -> &str {
        &self.def.name
    }

    pub fn is_function(&self) -> bool {
        self.def.is_function()
    }
}

impl PartialEq for CallableValue {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.def, &other.def)
            && self.namespace == other.namespace
            && self.with_args == other.with_args
    }
}
