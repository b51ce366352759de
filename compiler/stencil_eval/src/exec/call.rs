//! Macro and function invocation, `#nested` and `#import`.
//!
//! # Invocation
//!
//! 1. Push a call frame (checks the depth limit) and a fresh call-local
//!    context whose `previous` link is the caller's context. The caller's
//!    local-context stack is parked in the new context.
//! 2. Bind arguments: positional by order, named by name. Excess arguments
//!    go to the catch-all parameter or fail the call.
//! 3. Resolve defaults to a fixpoint; defaults may read other parameters.
//! 4. Run the body. Function output is discarded; `#return` supplies the
//!    value.
//! 5. Restore the caller's context, frames and namespace whatever happened.

use std::sync::Arc;

use indexmap::IndexMap;
use rustc_hash::FxHashMap;
use stencil_ir::{CallArgs, CallSite, CallableDef, Expr, Name, Span};
use stencil_values::{
    catch_all_conflict, import_failed, misplaced_directive, missing_required_parameter,
    no_nested_content, too_many_arguments, type_mismatch, unknown_named_argument, BoundArgs,
    CallableValue, ControlAction, ErrorCategory, EvalError, EvalNote, NamespaceId, Value, WithArgs,
};
use tracing::{debug, instrument};

use super::{loop_signal_depth, MaybeValue};
use crate::diagnostics::CallFrame;
use crate::environment::{
    Environment, LocalContext, LocalFrame, LocalScope, LocalSlot, NestedContent,
};
use crate::stack::ensure_sufficient_stack;

/// Evaluated call-site arguments. A `None` value is an explicit null.
#[derive(Debug, Default)]
pub(crate) struct CallArguments {
    positional: Vec<Option<Value>>,
    named: Vec<(Name, Option<Value>)>,
}

impl CallArguments {
    pub(crate) fn positional(values: Vec<Option<Value>>) -> Self {
        CallArguments {
            positional: values,
            named: Vec::new(),
        }
    }

    /// Add arguments pre-bound by `?with_args`. Call-site named arguments
    /// win over pre-bound ones of the same name.
    fn merge(mut self, with_args: Option<&WithArgs>) -> Self {
        let Some(with_args) = with_args else {
            return self;
        };
        match &with_args.args {
            BoundArgs::Positional(values) => {
                let bound = values.iter().cloned().map(Some);
                if with_args.last {
                    self.positional.extend(bound);
                } else {
                    self.positional.splice(0..0, bound);
                }
            }
            BoundArgs::Named(entries) => {
                let bound = entries
                    .iter()
                    .filter(|(key, _)| !self.named.iter().any(|(name, _)| name.as_str() == key.as_str()))
                    .map(|(key, value)| (Name::new(key), Some(value.clone())))
                    .collect::<Vec<_>>();
                if with_args.last {
                    self.named.extend(bound);
                } else {
                    self.named.splice(0..0, bound);
                }
            }
        }
        self
    }

    /// Named style when only named arguments were given; an argument-less
    /// call takes the callable's natural style.
    fn is_named_style(&self, def: &CallableDef) -> bool {
        match (self.positional.is_empty(), self.named.is_empty()) {
            (true, true) => !def.is_function(),
            (true, false) => true,
            (false, _) => false,
        }
    }
}

impl Environment {
    /// `<@callee args; params>body</@callee>`.
    pub(crate) fn exec_call_site(&mut self, site: &CallSite, span: Span) -> Result<(), ControlAction> {
        let callee = self.eval(&site.callee)?;
        let callable = match callee {
            Value::Callable(callable) if !callable.is_function() => callable,
            other => {
                return Err(
                    type_mismatch(&site.callee.to_string(), "macro", other.type_name()).into(),
                )
            }
        };
        let args = match &site.args {
            CallArgs::Positional(exprs) => self.eval_positional_args(exprs)?,
            CallArgs::Named(pairs) => {
                let mut named = Vec::with_capacity(pairs.len());
                for (name, expr) in pairs {
                    named.push((name.clone(), self.eval_opt(expr)?));
                }
                CallArguments {
                    positional: Vec::new(),
                    named,
                }
            }
        };
        let nested = site.body.as_ref().map(|body| NestedContent {
            body: Arc::clone(body),
            params: site.body_params.clone(),
        });
        self.invoke(&callable, args, nested, span)?;
        Ok(())
    }

    /// Invoke a macro or function. Returns the `#return` value of a function;
    /// macros return `None`.
    #[instrument(level = "debug", skip_all, fields(callable = %callable.name()))]
    pub(crate) fn invoke(
        &mut self,
        callable: &CallableValue,
        args: CallArguments,
        nested: Option<NestedContent>,
        call_span: Span,
    ) -> MaybeValue {
        self.namespace(callable.namespace)?;
        let def = Arc::clone(&callable.def);
        self.call_stack.push(CallFrame {
            name: def.describe(),
            call_span: (!call_span.is_dummy()).then_some(call_span),
        })?;
        self.counters.count_invocation();
        let args = args.merge(callable.with_args.as_deref());

        let depth = self.depth().saturating_add(1);
        let context = LocalScope::new(LocalContext {
            callable: Arc::clone(&def),
            locals: IndexMap::new(),
            caller_namespace: self.current_namespace,
            nested,
            caller_frames: std::mem::take(&mut self.frames),
            previous: self.context.take(),
            args: None,
            depth,
        });
        self.context = Some(context.clone());
        let saved_namespace = std::mem::replace(&mut self.current_namespace, callable.namespace);
        if def.is_function() {
            self.output.push_capture();
        }

        let result = self
            .bind_arguments(&def, args)
            .and_then(|()| ensure_sufficient_stack(|| self.visit(&def.body)));

        if def.is_function() {
            self.output.pop_capture();
        }
        {
            let mut ctx = context.borrow_mut();
            self.frames = std::mem::take(&mut ctx.caller_frames);
            self.context = ctx.previous.take();
        }
        self.current_namespace = saved_namespace;

        let outcome = match result {
            Ok(()) => Ok(None),
            Err(ControlAction::Return { depth: d, value }) if d == depth => Ok(value),
            Err(signal) if loop_signal_depth(&signal) == Some(depth) => {
                Err(self.call_stack.attach_backtrace(signal.into_eval_error()).into())
            }
            Err(ControlAction::Error(err)) => Err(self.call_stack.attach_backtrace(*err).into()),
            Err(other) => Err(other),
        };
        self.call_stack.pop();
        outcome
    }

    fn bind_arguments(&mut self, def: &CallableDef, args: CallArguments) -> Result<(), ControlAction> {
        let callable = def.describe();
        let named_style = args.is_named_style(def);
        let mut bound: Vec<Option<LocalSlot>> = vec![None; def.params.len()];
        let mut extra_positional = Vec::new();
        let mut extra_named: IndexMap<String, Value> = IndexMap::new();

        for (index, value) in args.positional.into_iter().enumerate() {
            if let Some(slot) = bound.get_mut(index) {
                *slot = Some(LocalSlot::from_option(value));
            } else if def.catch_all.is_some() {
                extra_positional.extend(value);
            } else {
                return Err(
                    too_many_arguments(&callable, def.params.len(), index.saturating_add(1)).into(),
                );
            }
        }
        for (name, value) in args.named {
            if let Some(slot) = def.param_index(&name).and_then(|i| bound.get_mut(i)) {
                *slot = Some(LocalSlot::from_option(value));
            } else if def.catch_all.is_some() {
                if let Some(value) = value {
                    extra_named.insert(name.to_string(), value);
                }
            } else {
                return Err(unknown_named_argument(&callable, &name).into());
            }
        }
        if let Some(catch_all) = &def.catch_all {
            if !extra_positional.is_empty() && !extra_named.is_empty() {
                return Err(catch_all_conflict(&callable, catch_all, true).into());
            }
        }

        let mut unresolved = Vec::new();
        for (index, (param, slot)) in def.params.iter().zip(bound).enumerate() {
            match slot {
                Some(LocalSlot::Value(value)) => self.bind_local(param.name.clone(), value),
                _ => unresolved.push(index),
            }
        }
        self.resolve_defaults(def, &callable, unresolved)?;

        let catch_all_value = def.catch_all.as_ref().map(|name| {
            let value = if extra_named.is_empty() && (!extra_positional.is_empty() || !named_style) {
                Value::sequence(extra_positional)
            } else {
                Value::hash(extra_named)
            };
            self.bind_local(name.clone(), value.clone());
            value
        });

        if def.requires_args {
            let snapshot = self.args_snapshot(def, &callable, catch_all_value.as_ref())?;
            if let Some(ctx) = &self.context {
                ctx.borrow_mut().args = Some(snapshot);
            }
        }
        Ok(())
    }

    fn bind_local(&self, name: Name, value: Value) {
        if let Some(ctx) = &self.context {
            ctx.borrow_mut().set_local(name, LocalSlot::Value(value));
        }
    }

    /// Evaluate defaults of the parameters in `unresolved` until every one is
    /// bound. A default whose evaluation yields no value (or an invalid
    /// reference) is retried after the others; a pass without progress fails
    /// with the first invalid reference of that pass, else with a missing
    /// parameter.
    fn resolve_defaults(
        &mut self,
        def: &CallableDef,
        callable: &str,
        mut unresolved: Vec<usize>,
    ) -> Result<(), ControlAction> {
        if let Some(param) = unresolved
            .iter()
            .filter_map(|&i| def.params.get(i))
            .find(|p| p.default.is_none())
        {
            return Err(missing_required_parameter(callable, &param.name).into());
        }

        while !unresolved.is_empty() {
            let mut pending = Vec::with_capacity(unresolved.len());
            let mut first_reference_error: Option<EvalError> = None;
            for &index in &unresolved {
                let Some(param) = def.params.get(index) else {
                    continue;
                };
                let Some(default) = &param.default else {
                    continue;
                };
                self.counters.count_default();
                match self.eval_opt(default) {
                    Ok(Some(value)) => self.bind_local(param.name.clone(), value),
                    Ok(None) => pending.push(index),
                    Err(ControlAction::Error(err)) if err.category() == ErrorCategory::Reference => {
                        if first_reference_error.is_none() {
                            first_reference_error = Some((*err).with_note(EvalNote::new(format!(
                                "while evaluating the default of parameter {:?} of {callable}",
                                param.name.as_str()
                            ))));
                        }
                        pending.push(index);
                    }
                    Err(other) => return Err(other),
                }
            }
            if pending.len() == unresolved.len() {
                return Err(match first_reference_error {
                    Some(err) => err,
                    None => {
                        let name = pending
                            .first()
                            .and_then(|&i| def.params.get(i))
                            .map_or("", |p| p.name.as_str());
                        missing_required_parameter(callable, name)
                    }
                }
                .into());
            }
            unresolved = pending;
        }
        Ok(())
    }

    /// `.args`: parameter values (plus the catch-all's) in declaration order.
    /// Functions see a sequence, macros a hash; a macro whose catch-all got
    /// positional arguments cannot build one.
    fn args_snapshot(
        &self,
        def: &CallableDef,
        callable: &str,
        catch_all: Option<&Value>,
    ) -> Result<Value, EvalError> {
        let Some(ctx) = &self.context else {
            return Ok(Value::sequence(Vec::new()));
        };
        let ctx = ctx.borrow();
        let bound = def.params.iter().filter_map(|p| {
            ctx.local(&p.name)
                .and_then(LocalSlot::value)
                .map(|v| (p.name.as_str(), v.clone()))
        });
        if def.is_function() {
            let mut values: Vec<Value> = bound.map(|(_, v)| v).collect();
            if let Some(extra) = catch_all.and_then(Value::as_sequence) {
                values.extend(extra.iter().cloned());
            }
            return Ok(Value::sequence(values));
        }
        let mut entries: IndexMap<String, Value> =
            bound.map(|(name, v)| (name.to_owned(), v)).collect();
        match catch_all {
            Some(Value::Sequence(items)) if !items.is_empty() => {
                let name = def.catch_all.as_ref().map_or("", |n| n.as_str());
                return Err(catch_all_conflict(callable, name, false));
            }
            Some(Value::Hash(extra)) => {
                entries.extend(extra.iter().map(|(k, v)| (k.clone(), v.clone())));
            }
            _ => {}
        }
        Ok(Value::hash(entries))
    }

    /// `#nested args`: run the caller's body in the caller's context, with
    /// the body parameters bound to `args`. The callee's context stays alive
    /// and becomes current again afterwards.
    pub(crate) fn exec_nested(&mut self, args: &[Expr]) -> Result<(), ControlAction> {
        let Some(ctx) = self.context.clone() else {
            return Err(misplaced_directive("#nested", "a macro body").into());
        };
        let (nested, caller_namespace, previous, callable) = {
            let c = ctx.borrow();
            (
                c.nested.clone(),
                c.caller_namespace,
                c.previous.clone(),
                c.callable.describe(),
            )
        };
        let Some(nested) = nested else {
            return Err(no_nested_content(&callable).into());
        };

        let mut values = Vec::with_capacity(args.len());
        for arg in args {
            values.push(self.eval_opt(arg)?);
        }
        debug!(callable = %callable, args = values.len(), "running nested content");
        let mut values = values.into_iter();
        let params: FxHashMap<Name, LocalSlot> = nested
            .params
            .iter()
            .map(|name| (name.clone(), LocalSlot::from_option(values.next().flatten())))
            .collect();

        let caller_frames = std::mem::take(&mut ctx.borrow_mut().caller_frames);
        let callee_frames = std::mem::replace(&mut self.frames, caller_frames);
        let saved_namespace = std::mem::replace(&mut self.current_namespace, caller_namespace);
        self.context = previous;
        self.frames.push(LocalFrame::NestedParams(params));

        let result = ensure_sufficient_stack(|| self.visit(&nested.body));

        self.frames.pop();
        ctx.borrow_mut().caller_frames = std::mem::replace(&mut self.frames, callee_frames);
        self.current_namespace = saved_namespace;
        self.context = Some(ctx);
        result
    }

    /// `#import library as ns`. A library is loaded once per run; later
    /// imports of the same name bind the same namespace.
    pub(crate) fn exec_import(&mut self, library: &Expr, namespace: &Name) -> Result<(), ControlAction> {
        let name = self.eval(library)?;
        let Some(name) = name.to_scalar() else {
            return Err(type_mismatch(&library.to_string(), "string", name.type_name()).into());
        };
        let id = match self.imports.get(&name) {
            Some(&id) => id,
            None => self.load_library(&name)?,
        };
        self.set_in_namespace(self.current_namespace, namespace.clone(), Value::Namespace(id))?;
        Ok(())
    }

    /// Run a library's top-level code in a fresh namespace. Its output is
    /// discarded.
    fn load_library(&mut self, name: &str) -> Result<NamespaceId, ControlAction> {
        let template = self
            .config
            .libraries()
            .resolve(name)
            .map_err(|e| import_failed(name, &e.to_string()))?;
        debug!(library = name, template = %template.name, "importing library");

        let id = self.add_namespace(&template.name);
        self.imports.insert(name.to_owned(), id);
        self.predefine_callables(&template.root, id)?;

        let saved_namespace = std::mem::replace(&mut self.current_namespace, id);
        let saved_context = self.context.take();
        let saved_frames = std::mem::take(&mut self.frames);
        self.output.push_capture();

        let result = ensure_sufficient_stack(|| self.visit(&template.root));

        self.output.pop_capture();
        self.frames = saved_frames;
        self.context = saved_context;
        self.current_namespace = saved_namespace;

        match result {
            Ok(()) => Ok(id),
            Err(ControlAction::Stop(message)) => Err(ControlAction::Stop(message)),
            Err(signal) => Err(signal
                .into_eval_error()
                .with_note(EvalNote::new(format!("while importing {name:?}")))
                .into()),
        }
    }
}
