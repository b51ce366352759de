//! Runtime values for template runs.
//!
//! `Value` is a closed tagged union. Host values join through [`HostValue`]
//! and report what they can do through [`Capabilities`]; the evaluator
//! dispatches on capabilities only, never on host type identity.
//!
//! "No value" is not a `Value`: lookups and evaluations that may come up empty
//! return `Option<Value>`, and only the default operators (`!`, `??`) turn
//! `None` into a value.

mod callable;
mod heap;
mod host;

use std::fmt;

use indexmap::IndexMap;
use stencil_format::MarkupValue;
use stencil_ir::{Constant, Number};

use crate::Capabilities;

pub use callable::{BoundArgs, CallableValue, WithArgs};
pub use heap::Heap;
pub use host::{HostObject, HostValue};

/// Index of a namespace within one run's namespace arena.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NamespaceId(u32);

impl NamespaceId {
    pub const fn new(index: u32) -> Self {
        NamespaceId(index)
    }

    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DateKind {
    Date,
    Time,
    DateTime,
}

/// A point in time, in milliseconds since the Unix epoch (UTC).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct DateTimeValue {
    pub kind: DateKind,
    pub epoch_millis: i64,
}

/// Runtime value.
#[derive(Clone)]
pub enum Value {
    // Scalars
    /// String value.
    Str(Heap<String>),
    Number(Number),
    Bool(bool),
    Date(DateTimeValue),
    /// Text bound to a markup output format.
    Markup(MarkupValue),

    // Containers
    /// Hash with keys in insertion order.
    Hash(Heap<IndexMap<String, Value>>),
    Sequence(Heap<Vec<Value>>),

    /// Macro or function.
    Callable(CallableValue),
    /// A namespace of the current run (`#import` result, `.main`, ...).
    Namespace(NamespaceId),
    Host(HostValue),
}

// Factory methods

impl Value {
    pub fn string(s: impl Into<String>) -> Self {
        Value::Str(Heap::new(s.into()))
    }

    pub fn int(n: i64) -> Self {
        Value::Number(Number::Int(n))
    }

    pub fn float(f: f64) -> Self {
        Value::Number(Number::Float(f))
    }

    pub fn sequence(items: Vec<Value>) -> Self {
        Value::Sequence(Heap::new(items))
    }

    pub fn hash(entries: IndexMap<String, Value>) -> Self {
        Value::Hash(Heap::new(entries))
    }

    pub fn hash_from<K: Into<String>>(entries: impl IntoIterator<Item = (K, Value)>) -> Self {
        Value::hash(entries.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    pub fn host(object: impl HostObject + 'static) -> Self {
        Value::Host(HostValue::new(object))
    }
}

impl From<&Constant> for Value {
    fn from(c: &Constant) -> Self {
        match c {
            Constant::Str(s) => Value::string(&**s),
            Constant::Number(n) => Value::Number(*n),
            Constant::Bool(b) => Value::Bool(*b),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::string(s)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::string(s)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::int(n)
    }
}

// Capability queries

impl Value {
    pub fn capabilities(&self) -> Capabilities {
        match self {
            Value::Str(_) => Capabilities::SCALAR,
            Value::Number(_) => Capabilities::NUMERIC,
            Value::Bool(_) => Capabilities::BOOLEAN,
            Value::Date(_) => Capabilities::DATE,
            Value::Markup(_) => Capabilities::MARKUP,
            Value::Hash(_) | Value::Namespace(_) => Capabilities::MAPPING,
            Value::Sequence(_) => Capabilities::SEQUENCE,
            Value::Callable(_) => Capabilities::CALLABLE,
            Value::Host(h) => h.object().capabilities(),
        }
    }

    /// The folded form of a scalar value, if it has one.
    pub fn to_constant(&self) -> Option<Constant> {
        match self {
            Value::Str(s) => Some(Constant::string(&***s)),
            Value::Number(n) => Some(Constant::Number(*n)),
            Value::Bool(b) => Some(Constant::Bool(*b)),
            _ => None,
        }
    }

    /// Native strings only; host scalars go through [`Value::to_scalar`].
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn to_scalar(&self) -> Option<String> {
        match self {
            Value::Str(s) => Some((**s).clone()),
            Value::Host(h) if h.object().capabilities().contains(Capabilities::SCALAR) => {
                h.object().as_scalar()
            }
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<Number> {
        match self {
            Value::Number(n) => Some(*n),
            Value::Host(h) if h.object().capabilities().contains(Capabilities::NUMERIC) => {
                h.object().as_number()
            }
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            Value::Host(h) if h.object().capabilities().contains(Capabilities::BOOLEAN) => {
                h.object().as_bool()
            }
            _ => None,
        }
    }

    pub fn as_date(&self) -> Option<DateTimeValue> {
        match self {
            Value::Date(d) => Some(*d),
            Value::Host(h) if h.object().capabilities().contains(Capabilities::DATE) => {
                h.object().as_date()
            }
            _ => None,
        }
    }

    pub fn as_markup(&self) -> Option<MarkupValue> {
        match self {
            Value::Markup(m) => Some(m.clone()),
            Value::Host(h) if h.object().capabilities().contains(Capabilities::MARKUP) => {
                h.object().as_markup()
            }
            _ => None,
        }
    }

    pub fn as_hash(&self) -> Option<&IndexMap<String, Value>> {
        match self {
            Value::Hash(h) => Some(&**h),
            _ => None,
        }
    }

    pub fn as_sequence(&self) -> Option<&[Value]> {
        match self {
            Value::Sequence(items) => Some(items.as_slice()),
            _ => None,
        }
    }

    /// Keyed lookup for hashes and host mappings. Namespaces need the run's
    /// environment and are resolved by the evaluator.
    pub fn get_key(&self, key: &str) -> Option<Value> {
        match self {
            Value::Hash(h) => h.get(key).cloned(),
            Value::Host(h) if h.object().capabilities().contains(Capabilities::MAPPING) => {
                h.object().get(key)
            }
            _ => None,
        }
    }

    /// Element list for sequences and host sequences/collections.
    pub fn iter_values(&self) -> Option<Vec<Value>> {
        match self {
            Value::Sequence(items) => Some(items.to_vec()),
            Value::Host(h)
                if h
                    .object()
                    .capabilities()
                    .intersects(Capabilities::SEQUENCE | Capabilities::COLLECTION) =>
            {
                Some(h.object().values())
            }
            _ => None,
        }
    }

    /// Key/value pairs for hashes and host mappings, in iteration order.
    pub fn iter_entries(&self) -> Option<Vec<(String, Value)>> {
        match self {
            Value::Hash(h) => Some(h.iter().map(|(k, v)| (k.clone(), v.clone())).collect()),
            Value::Host(h) if h.object().capabilities().contains(Capabilities::MAPPING) => {
                let object = h.object();
                Some(
                    object
                        .keys()
                        .into_iter()
                        .filter_map(|k| object.get(&k).map(|v| (k, v)))
                        .collect(),
                )
            }
            _ => None,
        }
    }

    /// Name of the value's kind for diagnostics.
    pub fn type_name(&self) -> &str {
        match self {
            Value::Str(_) => "string",
            Value::Number(_) => "number",
            Value::Bool(_) => "boolean",
            Value::Date(_) => "date",
            Value::Markup(_) => "markup output",
            Value::Hash(_) => "hash",
            Value::Sequence(_) => "sequence",
            Value::Callable(c) if c.is_function() => "function",
            Value::Callable(_) => "macro",
            Value::Namespace(_) => "namespace",
            Value::Host(h) => h.object().type_name(),
        }
    }

    /// Whether the value counts as empty for `?has_content`.
    pub fn is_empty_content(&self) -> bool {
        match self {
            Value::Str(s) => s.is_empty(),
            Value::Markup(m) => m.is_empty(),
            Value::Hash(h) => h.is_empty(),
            Value::Sequence(items) => items.is_empty(),
            Value::Host(h) => h.object().size() == Some(0),
            _ => false,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Str(s) => write!(f, "Str({:?})", &***s),
            Value::Number(n) => write!(f, "Number({n})"),
            Value::Bool(b) => write!(f, "Bool({b})"),
            Value::Date(d) => write!(f, "Date({:?}, {})", d.kind, d.epoch_millis),
            Value::Markup(m) => m.fmt(f),
            Value::Hash(h) => f.debug_map().entries(h.iter()).finish(),
            Value::Sequence(items) => f.debug_list().entries(items.iter()).finish(),
            Value::Callable(c) => write!(f, "{}({:?})", c.def.kind.describe(), c.name()),
            Value::Namespace(id) => write!(f, "Namespace({})", id.index()),
            Value::Host(h) => h.fmt(f),
        }
    }
}

impl fmt::Display for Value {
    /// Debug-dump rendering; template output goes through the evaluator's
    /// formatting rules instead.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Str(s) => f.write_str(s),
            Value::Number(n) => write!(f, "{n}"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Markup(m) => f.write_str(&m.markup()),
            Value::Sequence(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("]")
            }
            Value::Hash(h) => {
                f.write_str("{")?;
                for (i, (k, v)) in h.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{k:?}: {v}")?;
                }
                f.write_str("}")
            }
            other => write!(f, "{other:?}"),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Date(a), Value::Date(b)) => a == b,
            (Value::Markup(a), Value::Markup(b)) => a == b,
            (Value::Hash(a), Value::Hash(b)) => a == b,
            (Value::Sequence(a), Value::Sequence(b)) => a == b,
            (Value::Callable(a), Value::Callable(b)) => a == b,
            (Value::Namespace(a), Value::Namespace(b)) => a == b,
            (Value::Host(a), Value::Host(b)) => a.ptr_eq(b),
            _ => false,
        }
    }
}
