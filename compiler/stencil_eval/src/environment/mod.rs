//! Per-run environment: namespaces, call-local contexts and the local-context
//! stack.
//!
//! # Variable lookup
//!
//! Reads go, innermost first, through:
//! 1. the local-context stack (loop variables, nested-content parameters);
//! 2. the locals of the current macro or function call;
//! 3. the current namespace;
//! 4. the globals namespace;
//! 5. the data model passed to the run;
//! 6. the configuration's shared variables.
//!
//! Tiers 1 and 2 hold [`LocalSlot`]s. An [`LocalSlot::ExplicitNull`] ends the
//! search there; a name that is simply not bound falls through to the next
//! tier.
//!
//! Writes always name their target (local, namespace or global).
//!
//! # Ownership
//!
//! Namespaces live in an arena indexed by [`NamespaceId`], so namespace
//! values are plain ids. Call-local contexts form a linked list through
//! [`LocalScope`]: nested content runs in the caller's context while the
//! callee's context stays alive.

mod builder;

use std::cell::{Ref, RefCell, RefMut};
use std::rc::Rc;
use std::sync::Arc;

use indexmap::IndexMap;
use rustc_hash::FxHashMap;
use stencil_format::{FormatRegistry, OutputFormat};
use stencil_ir::{AutoEscapingPolicy, CallableDef, Element, ElementKind, LoopVars, Name, Template};
use stencil_values::{
    local_outside_callable, unknown_namespace, CallableValue, EvalError, NamespaceId, Value,
};

use crate::diagnostics::{CallStack, EvalCounters};
use crate::output::OutputStack;
use crate::RenderConfig;

pub use builder::EnvironmentBuilder;

/// Namespace of `#global` variables.
pub const GLOBALS: NamespaceId = NamespaceId::new(0);
/// Namespace of the main template.
pub const MAIN: NamespaceId = NamespaceId::new(1);

/// Single-threaded shared mutable cell for call-local contexts.
#[repr(transparent)]
pub struct LocalScope<T>(Rc<RefCell<T>>);

impl<T> LocalScope<T> {
    #[inline]
    pub fn new(value: T) -> Self {
        LocalScope(Rc::new(RefCell::new(value)))
    }

    #[inline]
    pub fn borrow(&self) -> Ref<'_, T> {
        self.0.borrow()
    }

    #[inline]
    pub fn borrow_mut(&self) -> RefMut<'_, T> {
        self.0.borrow_mut()
    }

    #[inline]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl<T> Clone for LocalScope<T> {
    #[inline]
    fn clone(&self) -> Self {
        LocalScope(Rc::clone(&self.0))
    }
}

/// A binding in a scope where "null" and "absent" differ.
#[derive(Clone, Debug, PartialEq)]
pub enum LocalSlot {
    Value(Value),
    /// Bound to no value; hides same-named variables of outer tiers.
    ExplicitNull,
}

impl LocalSlot {
    pub fn from_option(value: Option<Value>) -> Self {
        value.map_or(LocalSlot::ExplicitNull, LocalSlot::Value)
    }

    pub fn value(&self) -> Option<&Value> {
        match self {
            LocalSlot::Value(v) => Some(v),
            LocalSlot::ExplicitNull => None,
        }
    }
}

/// One scope frame mapping names to values: the globals, the main template's
/// namespace, or an imported library's.
#[derive(Debug)]
pub struct Namespace {
    name: Arc<str>,
    bindings: IndexMap<Name, Value>,
}

impl Namespace {
    pub fn new(name: impl AsRef<str>) -> Self {
        Namespace {
            name: Arc::from(name.as_ref()),
            bindings: IndexMap::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.bindings.get(name)
    }

    pub fn set(&mut self, name: Name, value: Value) {
        self.bindings.insert(name, value);
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Name, &Value)> {
        self.bindings.iter()
    }
}

/// Caller-supplied body of a directive call.
#[derive(Clone, Debug)]
pub struct NestedContent {
    pub body: Arc<[Element]>,
    /// Names bound fresh, in the caller's scope, to the `#nested` arguments.
    pub params: Vec<Name>,
}

/// Stack frame of one macro or function call.
pub struct LocalContext {
    pub callable: Arc<CallableDef>,
    pub locals: IndexMap<Name, LocalSlot>,
    /// Namespace current while the caller ran; nested content runs there.
    pub caller_namespace: NamespaceId,
    pub nested: Option<NestedContent>,
    /// The caller's local-context stack, parked while the body runs.
    pub caller_frames: Vec<LocalFrame>,
    /// The caller's context, `None` when called from top-level code.
    pub previous: Option<LocalScope<LocalContext>>,
    /// `.args` snapshot, present only for callables that read it.
    pub args: Option<Value>,
    /// Macro-frame depth; top-level code runs at depth 0.
    pub depth: usize,
}

impl LocalContext {
    pub fn local(&self, name: &str) -> Option<&LocalSlot> {
        self.locals.get(name)
    }

    pub fn set_local(&mut self, name: Name, slot: LocalSlot) {
        self.locals.insert(name, slot);
    }
}

/// An item of a loop, as produced from the list source.
#[derive(Clone, Debug)]
pub struct LoopItem {
    /// The item, or the key when listing a hash.
    pub item: LocalSlot,
    /// The value when listing a hash as `key, value`.
    pub value: Option<LocalSlot>,
}

/// State of one iteration of `#list` / `#items`.
#[derive(Clone, Debug)]
pub struct LoopFrame {
    pub vars: LoopVars,
    pub current: LoopItem,
    pub index: usize,
    pub has_next: bool,
}

impl LoopFrame {
    pub fn binds(&self, name: &str) -> bool {
        self.vars.item.as_str() == name
            || self.vars.value.as_ref().is_some_and(|v| v.as_str() == name)
    }

    fn get(&self, name: &str) -> Option<&LocalSlot> {
        if self.vars.item.as_str() == name {
            return Some(&self.current.item);
        }
        match (&self.vars.value, &self.current.value) {
            (Some(var), Some(slot)) if var.as_str() == name => Some(slot),
            _ => None,
        }
    }
}

/// Entry of the local-context stack.
#[derive(Clone, Debug)]
pub enum LocalFrame {
    Loop(LoopFrame),
    /// `#list` without loop variables: the source an inner `#items` iterates,
    /// with its expression text for diagnostics.
    PendingList { source: Value, source_text: Arc<str> },
    /// Parameters of a nested-content invocation.
    NestedParams(FxHashMap<Name, LocalSlot>),
}

impl LocalFrame {
    fn get(&self, name: &str) -> Option<&LocalSlot> {
        match self {
            LocalFrame::Loop(frame) => frame.get(name),
            LocalFrame::PendingList { .. } => None,
            LocalFrame::NestedParams(params) => params.get(name),
        }
    }
}

/// State carried through one template run.
///
/// Created by [`EnvironmentBuilder`]; run with
/// [`Environment::process`](crate::Environment::process). Never shared between
/// runs.
pub struct Environment {
    pub(crate) template: Arc<Template>,
    pub(crate) config: Arc<RenderConfig>,
    pub(crate) formats: FormatRegistry,
    namespaces: Vec<Namespace>,
    pub(crate) current_namespace: NamespaceId,
    data_model: IndexMap<String, Value>,
    pub(crate) context: Option<LocalScope<LocalContext>>,
    pub(crate) frames: Vec<LocalFrame>,
    pub(crate) output: OutputStack,
    pub(crate) output_format: OutputFormat,
    pub(crate) auto_escaping: bool,
    pub(crate) auto_escaping_policy: AutoEscapingPolicy,
    pub(crate) call_stack: CallStack,
    pub(crate) counters: EvalCounters,
    /// Messages of the errors being handled by enclosing `#recover` blocks.
    pub(crate) recovered: Vec<String>,
    /// Libraries imported so far in this run.
    pub(crate) imports: FxHashMap<String, NamespaceId>,
}

impl Environment {
    pub fn template(&self) -> &Template {
        &self.template
    }

    pub fn config(&self) -> &RenderConfig {
        &self.config
    }

    pub fn counters(&self) -> &EvalCounters {
        &self.counters
    }

    pub fn output_format(&self) -> &OutputFormat {
        &self.output_format
    }

    pub fn current_namespace(&self) -> NamespaceId {
        self.current_namespace
    }

    /// Fails for a handle that came from another run, e.g. through the data model.
    pub fn namespace(&self, id: NamespaceId) -> Result<&Namespace, EvalError> {
        self.namespaces
            .get(id.index())
            .ok_or_else(|| unknown_namespace(id.index()))
    }

    fn namespace_mut(&mut self, id: NamespaceId) -> Result<&mut Namespace, EvalError> {
        self.namespaces
            .get_mut(id.index())
            .ok_or_else(|| unknown_namespace(id.index()))
    }

    fn namespace_entry(&self, id: NamespaceId, name: &str) -> Option<&Value> {
        self.namespaces.get(id.index()).and_then(|ns| ns.get(name))
    }

    pub(crate) fn add_namespace(&mut self, name: &str) -> NamespaceId {
        let index = u32::try_from(self.namespaces.len()).unwrap_or(u32::MAX);
        self.namespaces.push(Namespace::new(name));
        NamespaceId::new(index)
    }

    /// Macro-frame depth of the code currently running.
    pub fn depth(&self) -> usize {
        self.context.as_ref().map_or(0, |ctx| ctx.borrow().depth)
    }

    pub fn in_callable(&self) -> bool {
        self.context.is_some()
    }

    /// Reads a variable through all lookup tiers.
    pub fn lookup(&self, name: &str) -> Option<Value> {
        for frame in self.frames.iter().rev() {
            if let Some(slot) = frame.get(name) {
                return slot.value().cloned();
            }
        }
        if let Some(ctx) = &self.context {
            if let Some(slot) = ctx.borrow().local(name) {
                return slot.value().cloned();
            }
        }
        self.lookup_from_namespace(self.current_namespace, name)
    }

    /// Lookup starting at the namespace tier, skipping locals. An unknown
    /// `id` contributes nothing.
    pub fn lookup_from_namespace(&self, id: NamespaceId, name: &str) -> Option<Value> {
        self.namespace_entry(id, name)
            .or_else(|| self.namespace_entry(GLOBALS, name))
            .or_else(|| self.data_model.get(name))
            .or_else(|| self.config.shared_variables().get(name))
            .cloned()
    }

    /// Current value of a call-local variable, for compound assignment.
    pub(crate) fn local_value(&self, name: &str) -> Result<Option<Value>, EvalError> {
        let ctx = self.context.as_ref().ok_or_else(local_outside_callable)?;
        let ctx = ctx.borrow();
        Ok(ctx.local(name).and_then(LocalSlot::value).cloned())
    }

    pub(crate) fn namespace_value(&self, id: NamespaceId, name: &str) -> Result<Option<Value>, EvalError> {
        Ok(self.namespace(id)?.get(name).cloned())
    }

    /// `#local`: binds in the current call frame.
    pub fn set_local(&mut self, name: Name, value: Value) -> Result<(), EvalError> {
        let ctx = self.context.as_ref().ok_or_else(local_outside_callable)?;
        ctx.borrow_mut().set_local(name, LocalSlot::Value(value));
        Ok(())
    }

    /// `#assign`: binds in `id`, the current namespace unless `in ns` names another.
    pub fn set_in_namespace(&mut self, id: NamespaceId, name: Name, value: Value) -> Result<(), EvalError> {
        self.namespace_mut(id)?.set(name, value);
        Ok(())
    }

    /// `#global`.
    pub fn set_global(&mut self, name: Name, value: Value) -> Result<(), EvalError> {
        self.set_in_namespace(GLOBALS, name, value)
    }

    /// Innermost loop frame, for `#sep`.
    pub(crate) fn innermost_loop(&self) -> Option<&LoopFrame> {
        self.frames.iter().rev().find_map(|f| match f {
            LocalFrame::Loop(frame) => Some(frame),
            _ => None,
        })
    }

    /// Innermost loop frame binding `name`, for loop-variable queries.
    pub(crate) fn loop_binding(&self, name: &str) -> Option<&LoopFrame> {
        self.frames.iter().rev().find_map(|f| match f {
            LocalFrame::Loop(frame) if frame.binds(name) => Some(frame),
            _ => None,
        })
    }

    /// Source of the innermost `#list` waiting for its `#items`.
    pub(crate) fn pending_list(&self) -> Option<(Value, Arc<str>)> {
        self.frames.iter().rev().find_map(|f| match f {
            LocalFrame::PendingList {
                source,
                source_text,
            } => Some((source.clone(), Arc::clone(source_text))),
            _ => None,
        })
    }

    /// `.globals`: globals, then the data model, then shared variables.
    pub(crate) fn globals_snapshot(&self) -> Value {
        let mut entries: IndexMap<String, Value> = IndexMap::new();
        let tiers = self
            .namespaces
            .get(GLOBALS.index())
            .into_iter()
            .flat_map(Namespace::iter)
            .map(|(k, v)| (k.as_str(), v))
            .chain(self.data_model.iter().map(|(k, v)| (k.as_str(), v)))
            .chain(
                self.config
                    .shared_variables()
                    .iter()
                    .map(|(k, v)| (k.as_str(), v)),
            );
        for (name, value) in tiers {
            entries
                .entry(name.to_owned())
                .or_insert_with(|| value.clone());
        }
        Value::hash(entries)
    }

    /// `.locals`: the current call's bound locals; `None` outside a callable.
    pub(crate) fn locals_snapshot(&self) -> Option<Value> {
        let ctx = self.context.as_ref()?;
        let ctx = ctx.borrow();
        Some(Value::hash_from(ctx.locals.iter().filter_map(|(k, slot)| {
            slot.value().map(|v| (k.as_str(), v.clone()))
        })))
    }

    /// Binds every callable defined at the top level of `root` into `ns`, so
    /// callables can be called before their definition is reached.
    pub(crate) fn predefine_callables(&mut self, root: &[Element], ns: NamespaceId) -> Result<(), EvalError> {
        for element in root {
            match &element.kind {
                ElementKind::CallableDef(def) => {
                    let value = Value::Callable(CallableValue::new(Arc::clone(def), ns));
                    self.set_in_namespace(ns, def.name.clone(), value)?;
                }
                ElementKind::Sequence(children) => {
                    self.predefine_callables(children, ns)?;
                }
                _ => {}
            }
        }
        Ok(())
    }
}
