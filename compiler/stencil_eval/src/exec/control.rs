//! Loops, `#switch`, `#attempt` and assignments.
//!
//! Loops and `#switch` consume `#break` (and loops `#continue`) only when
//! the signal was raised at the depth they run at. A signal raised inside
//! nested content carries the caller's depth and passes through everything
//! in between, including loops in the callee. The nearest enclosing loop or
//! callable never catches a signal raised at another depth.

use std::sync::Arc;

use stencil_ir::{
    AssignOp, AssignScope, AssignTarget, Assignment, BinaryOp, CaseKind, Element, Expr, ListBlock,
    LoopVars, Name, Number, SwitchBlock,
};
use stencil_values::{
    invalid_reference, local_outside_callable, misplaced_directive, type_mismatch, Capabilities,
    ControlAction, EvalError, EvalResult, NamespaceId, Value,
};
use tracing::debug;

use super::expr::expect_number;
use crate::environment::{Environment, LocalFrame, LocalSlot, LoopFrame, LoopItem, GLOBALS};
use crate::operators;

impl Environment {
    /// `#list`.
    pub(crate) fn exec_list(&mut self, block: &ListBlock) -> Result<(), ControlAction> {
        let source = self.eval(&block.source)?;
        let Some(vars) = &block.loop_vars else {
            return self.exec_list_without_vars(block, source);
        };
        let items = loop_items(&source, || block.source.to_string(), vars)?;
        if items.is_empty() {
            return match &block.else_body {
                Some(body) => self.visit(body),
                None => Ok(()),
            };
        }
        self.iterate(vars, items, &block.body)
    }

    /// `#list` whose body iterates through `#items`. A `#break` in the body
    /// outside `#items` ends the list.
    fn exec_list_without_vars(&mut self, block: &ListBlock, source: Value) -> Result<(), ControlAction> {
        let source_text: Arc<str> = Arc::from(block.source.to_string());
        let empty = match (source.iter_values(), source.iter_entries()) {
            (Some(values), _) => values.is_empty(),
            (None, Some(entries)) => entries.is_empty(),
            (None, None) => {
                return Err(type_mismatch(&source_text, "sequence or hash", source.type_name()).into());
            }
        };
        if empty {
            return match &block.else_body {
                Some(body) => self.visit(body),
                None => Ok(()),
            };
        }
        let depth = self.depth();
        self.frames.push(LocalFrame::PendingList {
            source,
            source_text,
        });
        let result = self.visit(&block.body);
        self.frames.pop();
        match result {
            Err(ControlAction::Break { depth: d }) if d == depth => Ok(()),
            other => other,
        }
    }

    /// `#items as vars`.
    pub(crate) fn exec_items(&mut self, vars: &LoopVars, body: &[Element]) -> Result<(), ControlAction> {
        let Some((source, source_text)) = self.pending_list() else {
            return Err(misplaced_directive("#items", "a #list without loop variables").into());
        };
        let items = loop_items(&source, || source_text.to_string(), vars)?;
        self.iterate(vars, items, body)
    }

    fn iterate(&mut self, vars: &LoopVars, items: Vec<LoopItem>, body: &[Element]) -> Result<(), ControlAction> {
        let depth = self.depth();
        let count = items.len();
        for (index, item) in items.into_iter().enumerate() {
            self.frames.push(LocalFrame::Loop(LoopFrame {
                vars: vars.clone(),
                current: item,
                index,
                has_next: index.saturating_add(1) < count,
            }));
            let result = self.visit(body);
            self.frames.pop();
            match result {
                Ok(()) => {}
                Err(ControlAction::Break { depth: d }) if d == depth => break,
                Err(ControlAction::Continue { depth: d }) if d == depth => {}
                Err(other) => return Err(other),
            }
        }
        Ok(())
    }

    /// `#switch`. Matching starts at the first non-default case with an
    /// equal value, else at `#default`. A `#case` body falls through into the
    /// next case; an `#on` body does not. `#default` falls through only in a
    /// switch without `#on` cases. `#break` leaves the switch; `#continue`
    /// belongs to an enclosing loop and passes through.
    pub(crate) fn exec_switch(&mut self, block: &SwitchBlock) -> Result<(), ControlAction> {
        let value = self.eval(&block.value)?;
        let mut start = None;
        'search: for (index, case) in block.cases.iter().enumerate() {
            if case.kind == CaseKind::Default {
                continue;
            }
            for candidate in &case.values {
                let candidate = self.eval(candidate)?;
                if operators::compare(BinaryOp::Equal, &value, &candidate)? {
                    start = Some(index);
                    break 'search;
                }
            }
        }
        let start = start.or_else(|| block.cases.iter().position(|c| c.kind == CaseKind::Default));
        let Some(start) = start else {
            return Ok(());
        };

        let uses_on = block.cases.iter().any(|c| c.kind == CaseKind::On);
        let depth = self.depth();
        for case in block.cases.iter().skip(start) {
            match self.visit(&case.body) {
                Ok(()) => {}
                Err(ControlAction::Break { depth: d }) if d == depth => return Ok(()),
                Err(other) => return Err(other),
            }
            let falls_through = match case.kind {
                CaseKind::Case => true,
                CaseKind::Default => !uses_on,
                CaseKind::On => false,
            };
            if !falls_through {
                break;
            }
        }
        Ok(())
    }

    /// `#attempt` / `#recover`: the attempt's output is buffered and written
    /// only when the body completes. Errors run `#recover`; other signals
    /// propagate without the buffer.
    pub(crate) fn exec_attempt(&mut self, attempt: &[Element], recover: &[Element]) -> Result<(), ControlAction> {
        self.output.push_capture();
        let result = self.visit(attempt);
        let buffered = self.output.pop_capture();
        match result {
            Ok(()) => {
                self.output.write(&buffered);
                Ok(())
            }
            Err(ControlAction::Error(err)) => {
                debug!(error = %err.message, "#attempt failed, running #recover");
                self.recovered.push(err.message);
                let result = self.visit(recover);
                self.recovered.pop();
                result
            }
            Err(signal) => Err(signal),
        }
    }

    /// `#assign`, `#local` and `#global` with one or more targets.
    pub(crate) fn exec_assignment(&mut self, assignment: &Assignment) -> Result<(), ControlAction> {
        let ns = self.assignment_namespace(assignment.scope, assignment.namespace.as_ref())?;
        for target in &assignment.targets {
            let value = self.assigned_value(assignment.scope, ns, target)?;
            self.store(assignment.scope, ns, target.name.clone(), value)?;
        }
        Ok(())
    }

    /// Capturing `#assign name>...</#assign`.
    pub(crate) fn exec_capture(
        &mut self,
        scope: AssignScope,
        name: &Name,
        namespace: Option<&Expr>,
        body: &[Element],
    ) -> Result<(), ControlAction> {
        let ns = self.assignment_namespace(scope, namespace)?;
        self.output.push_capture();
        let result = self.visit(body);
        let text = self.output.pop_capture();
        result?;
        let value = self.captured_value(text);
        Ok(self.store(scope, ns, name.clone(), value)?)
    }

    fn assignment_namespace(
        &mut self,
        scope: AssignScope,
        namespace: Option<&Expr>,
    ) -> Result<NamespaceId, ControlAction> {
        match (scope, namespace) {
            (AssignScope::Local, _) if !self.in_callable() => Err(local_outside_callable().into()),
            (AssignScope::Local, _) => Ok(self.current_namespace),
            (_, Some(expr)) => match self.eval(expr)? {
                Value::Namespace(id) => {
                    self.namespace(id)?;
                    Ok(id)
                }
                other => Err(type_mismatch(&expr.to_string(), "namespace", other.type_name()).into()),
            },
            (AssignScope::Global, None) => Ok(GLOBALS),
            (AssignScope::Namespace, None) => Ok(self.current_namespace),
        }
    }

    fn assigned_value(
        &mut self,
        scope: AssignScope,
        ns: NamespaceId,
        target: &AssignTarget,
    ) -> EvalResult {
        let operand = match &target.value {
            Some(expr) => Some((self.eval(expr)?, expr)),
            None => None,
        };
        let op = match target.op {
            AssignOp::Set => {
                return operand
                    .map(|(value, _)| value)
                    .ok_or_else(|| invalid_reference(&target.name).into());
            }
            AssignOp::AddAssign | AssignOp::Increment => BinaryOp::Add,
            AssignOp::SubAssign | AssignOp::Decrement => BinaryOp::Subtract,
            AssignOp::MulAssign => BinaryOp::Multiply,
            AssignOp::DivAssign => BinaryOp::Divide,
            AssignOp::ModAssign => BinaryOp::Modulo,
        };
        let current = match scope {
            AssignScope::Local => self.local_value(&target.name)?,
            _ => self.namespace_value(ns, &target.name)?,
        };
        let target_expr = Expr::ident(target.name.clone());
        let Some(current) = current else {
            return Err(invalid_reference(&target.name).into());
        };
        match operand {
            Some((value, expr)) if op == BinaryOp::Add => self.add(&current, &target_expr, &value, expr),
            Some((value, expr)) => {
                let a = expect_number(&current, &target_expr)?;
                let b = expect_number(&value, expr)?;
                Ok(Value::Number(operators::arithmetic(op, a, b)?))
            }
            None => {
                let a = expect_number(&current, &target_expr)?;
                Ok(Value::Number(operators::arithmetic(op, a, Number::Int(1))?))
            }
        }
    }

    fn store(&mut self, scope: AssignScope, ns: NamespaceId, name: Name, value: Value) -> Result<(), EvalError> {
        match scope {
            AssignScope::Local => self.set_local(name, value),
            AssignScope::Namespace | AssignScope::Global => self.set_in_namespace(ns, name, value),
        }
    }
}

/// Items of a list source. `key, value` loop variables list a hash's
/// entries; a single variable lists a sequence or collection. Holes in host
/// sequences become null items.
fn loop_items(
    source: &Value,
    describe_source: impl FnOnce() -> String,
    vars: &LoopVars,
) -> Result<Vec<LoopItem>, EvalError> {
    if vars.value.is_some() {
        let entries = source
            .iter_entries()
            .ok_or_else(|| type_mismatch(&describe_source(), "hash", source.type_name()))?;
        return Ok(entries
            .into_iter()
            .map(|(key, value)| LoopItem {
                item: LocalSlot::Value(Value::string(key)),
                value: Some(LocalSlot::Value(value)),
            })
            .collect());
    }
    if let Value::Host(host) = source {
        let object = host.object();
        if object.capabilities().contains(Capabilities::SEQUENCE) {
            if let Some(size) = object.size() {
                return Ok((0..size)
                    .map(|i| LoopItem {
                        item: LocalSlot::from_option(object.get_index(i)),
                        value: None,
                    })
                    .collect());
            }
        }
    }
    let values = source
        .iter_values()
        .ok_or_else(|| {
            type_mismatch(&describe_source(), "sequence or collection", source.type_name())
        })?;
    Ok(values
        .into_iter()
        .map(|value| LoopItem {
            item: LocalSlot::Value(value),
            value: None,
        })
        .collect())
}
