//! Host-object bridge.
//!
//! Values that come from the embedding application implement [`HostObject`].
//! Every accessor defaults to "not supported"; an implementor overrides the
//! ones matching the capabilities it reports.

use std::fmt;
use std::sync::Arc;

use stencil_format::MarkupValue;
use stencil_ir::Number;

use super::{DateTimeValue, Value};
use crate::{Capabilities, EvalError};

pub trait HostObject: Send + Sync {
    /// Name used in type-mismatch diagnostics.
    fn type_name(&self) -> &str;

    fn capabilities(&self) -> Capabilities;

    fn as_scalar(&self) -> Option<String> {
        None
    }

    fn as_number(&self) -> Option<Number> {
        None
    }

    fn as_bool(&self) -> Option<bool> {
        None
    }

    fn as_date(&self) -> Option<DateTimeValue> {
        None
    }

    fn as_markup(&self) -> Option<MarkupValue> {
        None
    }

    /// Keyed lookup (`MAPPING`). `None` means no value under `key`.
    fn get(&self, _key: &str) -> Option<Value> {
        None
    }

    /// Keys in iteration order (`MAPPING`).
    fn keys(&self) -> Vec<String> {
        Vec::new()
    }

    /// Element count (`SEQUENCE`, `MAPPING`).
    fn size(&self) -> Option<usize> {
        None
    }

    /// Indexed access (`SEQUENCE`).
    fn get_index(&self, _index: usize) -> Option<Value> {
        None
    }

    /// Full iteration (`SEQUENCE`, `COLLECTION`).
    fn values(&self) -> Vec<Value> {
        Vec::new()
    }

    /// Invocation (`CALLABLE`). `Ok(None)` means the call produced no value.
    fn call(&self, _args: &[Value]) -> Result<Option<Value>, EvalError> {
        Err(crate::not_callable(self.type_name()))
    }
}

/// Shared handle to a host object.
#[derive(Clone)]
pub struct HostValue(Arc<dyn HostObject>);

impl HostValue {
    pub fn new(object: impl HostObject + 'static) -> Self {
        HostValue(Arc::new(object))
    }

    pub fn object(&self) -> &dyn HostObject {
        &*self.0
    }

    pub fn ptr_eq(&self, other: &HostValue) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for HostValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<host {}>", self.0.type_name())
    }
}
