//! Expression evaluation.
//!
//! [`Environment::eval_opt`] is the core entry point: it returns
//! `Ok(None)` when an expression legitimately produces no value (an unbound
//! variable, a missing hash key, a function returning nothing).
//! [`Environment::eval`] turns that into an invalid-reference error blamed on
//! the expression. Only the default operators (`!`, `??`) and a few
//! built-ins look at the `None` case themselves.

use indexmap::IndexMap;
use stencil_format::MarkupValue;
use stencil_ir::{
    BinaryOp, Expr, ExprKind, LoopQuery, Name, Number, SpecialVariable, StringPart, UnaryOp,
};
use stencil_values::{
    format_mixing, invalid_reference, not_callable, type_mismatch, unsupported_operation,
    Capabilities, ControlAction, ErrorCategory, EvalError, EvalResult, Value,
};

use super::at_span;
use super::call::CallArguments;
use crate::environment::{Environment, MAIN};
use crate::operators;
use crate::stack::ensure_sufficient_stack;

/// Result of evaluating an expression that may produce no value.
pub(crate) type MaybeValue = Result<Option<Value>, ControlAction>;

impl Environment {
    /// Evaluate `expr`, failing when it produces no value.
    pub fn eval(&mut self, expr: &Expr) -> EvalResult {
        match self.eval_opt(expr)? {
            Some(value) => Ok(value),
            None => Err(invalid_reference(&expr.to_string())
                .with_span(expr.span)
                .into()),
        }
    }

    /// Evaluate `expr`; `Ok(None)` means "no value".
    ///
    /// Literal-only subtrees are evaluated once: the first evaluation stores
    /// the folded constant on the node and later evaluations, in this run or
    /// any other, return it without touching the evaluation counters.
    pub fn eval_opt(&mut self, expr: &Expr) -> Result<Option<Value>, ControlAction> {
        if let Some(constant) = expr.cached_constant() {
            return Ok(Some(Value::from(constant)));
        }
        self.counters.count_expression();
        let value = ensure_sufficient_stack(|| self.eval_kind(expr))
            .map_err(|action| at_span(action, expr.span))?;
        if expr.is_constant() {
            if let Some(constant) = value.as_ref().and_then(Value::to_constant) {
                expr.cache_constant(constant);
            }
        }
        Ok(value)
    }

    fn eval_kind(&mut self, expr: &Expr) -> MaybeValue {
        match &expr.kind {
            ExprKind::Literal(constant) => Ok(Some(Value::from(constant))),
            ExprKind::Identifier(name) => Ok(self.lookup(name)),
            ExprKind::Dot { target, key } => {
                let container = self.eval(target)?;
                Ok(self.get_key(&container, target, key)?)
            }
            ExprKind::DynamicKey { target, key } => {
                let container = self.eval(target)?;
                let key_value = self.eval(key)?;
                Ok(self.get_dynamic(&container, target, &key_value, key)?)
            }
            ExprKind::Binary { op, left, right } => self.eval_binary(*op, left, right).map(Some),
            ExprKind::Unary { op, operand } => self.eval_unary(*op, operand).map(Some),
            ExprKind::Parenthetical(inner) => self.eval_opt(inner),
            ExprKind::ListLiteral(items) => {
                let mut values = Vec::with_capacity(items.len());
                for item in items {
                    values.push(self.eval(item)?);
                }
                Ok(Some(Value::sequence(values)))
            }
            ExprKind::HashLiteral(entries) => {
                let mut map = IndexMap::with_capacity(entries.len());
                for (key_expr, value_expr) in entries {
                    let key = self.eval(key_expr)?;
                    let Some(key) = key.to_scalar() else {
                        return Err(
                            type_mismatch(&key_expr.to_string(), "string", key.type_name()).into(),
                        );
                    };
                    let value = self.eval(value_expr)?;
                    map.insert(key, value);
                }
                Ok(Some(Value::hash(map)))
            }
            ExprKind::StringTemplate(parts) => self.eval_string_template(parts).map(Some),
            ExprKind::Call { target, args } => self.eval_call(target, args),
            ExprKind::BuiltIn {
                target,
                builtin,
                args,
            } => self.eval_builtin(target, *builtin, args),
            ExprKind::LoopVarQuery { variable, query } => {
                Ok(Some(self.eval_loop_query(variable, *query)?))
            }
            ExprKind::Default { target, fallback } => match self.eval_guarded(target)? {
                Some(value) => Ok(Some(value)),
                None => match fallback {
                    Some(fallback) => self.eval_opt(fallback),
                    None => Ok(Some(Value::string(""))),
                },
            },
            ExprKind::Exists(target) => Ok(Some(Value::Bool(self.eval_guarded(target)?.is_some()))),
            ExprKind::Special(var) => self.eval_special(*var),
        }
    }

    /// Evaluation under `!` and `??`: a missing value, or an invalid
    /// reference raised while evaluating `target` itself, becomes `None`.
    /// Errors that crossed a callable boundary carry a backtrace and are not
    /// swallowed.
    pub(crate) fn eval_guarded(&mut self, target: &Expr) -> MaybeValue {
        match self.eval_opt(target) {
            Err(ControlAction::Error(err))
                if err.category() == ErrorCategory::Reference && err.backtrace.is_none() =>
            {
                Ok(None)
            }
            other => other,
        }
    }

    pub(crate) fn eval_bool(&mut self, expr: &Expr) -> Result<bool, ControlAction> {
        let value = self.eval(expr)?;
        value
            .as_bool()
            .ok_or_else(|| type_mismatch(&expr.to_string(), "boolean", value.type_name()).into())
    }

    fn get_key(&self, container: &Value, target: &Expr, key: &str) -> Result<Option<Value>, EvalError> {
        match container {
            Value::Namespace(id) => self.namespace_value(*id, key),
            other if other.capabilities().contains(Capabilities::MAPPING) => Ok(other.get_key(key)),
            other => Err(type_mismatch(&target.to_string(), "hash", other.type_name())),
        }
    }

    /// `target[key]`: numeric keys index sequences (and strings, by
    /// character), anything else is a hash key.
    fn get_dynamic(
        &self,
        container: &Value,
        target: &Expr,
        key: &Value,
        key_expr: &Expr,
    ) -> Result<Option<Value>, EvalError> {
        if let Some(number) = key.as_number() {
            let Some(index) = number.as_i64().and_then(|i| usize::try_from(i).ok()) else {
                return Err(type_mismatch(
                    &key_expr.to_string(),
                    "non-negative integer index",
                    &number.to_string(),
                ));
            };
            return match container {
                Value::Sequence(items) => Ok(items.get(index).cloned()),
                Value::Str(s) => Ok(s.chars().nth(index).map(|c| Value::string(c.to_string()))),
                Value::Host(host) if host.object().capabilities().contains(Capabilities::SEQUENCE) => {
                    Ok(host.object().get_index(index))
                }
                other => Err(type_mismatch(&target.to_string(), "sequence", other.type_name())),
            };
        }
        match key.to_scalar() {
            Some(name) => self.get_key(container, target, &name),
            None => Err(type_mismatch(
                &key_expr.to_string(),
                "string or number",
                key.type_name(),
            )),
        }
    }

    fn eval_binary(&mut self, op: BinaryOp, left: &Expr, right: &Expr) -> EvalResult {
        match op {
            BinaryOp::And => {
                let result = self.eval_bool(left)? && self.eval_bool(right)?;
                return Ok(Value::Bool(result));
            }
            BinaryOp::Or => {
                let result = self.eval_bool(left)? || self.eval_bool(right)?;
                return Ok(Value::Bool(result));
            }
            _ => {}
        }
        let lhs = self.eval(left)?;
        let rhs = self.eval(right)?;
        match op {
            BinaryOp::Add => self.add(&lhs, left, &rhs, right),
            _ if op.is_arithmetic() => {
                let a = expect_number(&lhs, left)?;
                let b = expect_number(&rhs, right)?;
                Ok(Value::Number(operators::arithmetic(op, a, b)?))
            }
            _ => Ok(Value::Bool(operators::compare(op, &lhs, &rhs)?)),
        }
    }

    /// `+`: numeric addition, sequence and hash concatenation, markup
    /// concatenation, string concatenation, tried in that order.
    pub(crate) fn add(&self, lhs: &Value, left: &Expr, rhs: &Value, right: &Expr) -> EvalResult {
        if let (Some(a), Some(b)) = (lhs.as_number(), rhs.as_number()) {
            return Ok(Value::Number(operators::arithmetic(BinaryOp::Add, a, b)?));
        }
        match (lhs, rhs) {
            (Value::Sequence(a), Value::Sequence(b)) => {
                return Ok(Value::sequence(a.iter().chain(b.iter()).cloned().collect()));
            }
            (Value::Hash(a), Value::Hash(b)) => {
                let mut merged = (**a).clone();
                merged.extend(b.iter().map(|(k, v)| (k.clone(), v.clone())));
                return Ok(Value::hash(merged));
            }
            _ => {}
        }
        match (lhs.as_markup(), rhs.as_markup()) {
            (Some(a), Some(b)) => Ok(Value::Markup(join_markup(&a, &b)?)),
            (Some(a), None) => {
                let text = self.to_plain_text(rhs, right)?;
                let b = a.format().from_plain_text(text);
                Ok(Value::Markup(a.format().concat(&a, &b)))
            }
            (None, Some(b)) => {
                let text = self.to_plain_text(lhs, left)?;
                let a = b.format().from_plain_text(text);
                Ok(Value::Markup(b.format().concat(&a, &b)))
            }
            (None, None) => {
                let mut text = self.to_plain_text(lhs, left)?;
                text.push_str(&self.to_plain_text(rhs, right)?);
                Ok(Value::string(text))
            }
        }
    }

    fn eval_unary(&mut self, op: UnaryOp, operand: &Expr) -> EvalResult {
        match op {
            UnaryOp::Not => Ok(Value::Bool(!self.eval_bool(operand)?)),
            UnaryOp::Negate => {
                let value = self.eval(operand)?;
                Ok(Value::Number(operators::negate(expect_number(&value, operand)?)))
            }
            UnaryOp::Plus => {
                let value = self.eval(operand)?;
                Ok(Value::Number(expect_number(&value, operand)?))
            }
        }
    }

    /// `"text ${expr} text"`: a string, or markup when any interpolated value
    /// is markup.
    fn eval_string_template(&mut self, parts: &[StringPart]) -> EvalResult {
        let mut pending = String::new();
        let mut markup: Option<MarkupValue> = None;
        for part in parts {
            match part {
                StringPart::Text(text) => pending.push_str(text),
                StringPart::Interpolation(expr) => {
                    let value = self.eval(expr)?;
                    match value.as_markup() {
                        Some(m) => {
                            let joined = match markup.take() {
                                Some(acc) => join_markup(&acc, &flush_plain(&acc, &mut pending))?,
                                None => m.format().from_plain_text(std::mem::take(&mut pending)),
                            };
                            markup = Some(join_markup(&joined, &m)?);
                        }
                        None => pending.push_str(&self.to_plain_text(&value, expr)?),
                    }
                }
            }
        }
        Ok(match markup {
            Some(acc) if pending.is_empty() => Value::Markup(acc),
            Some(acc) => {
                let tail = flush_plain(&acc, &mut pending);
                Value::Markup(acc.format().concat(&acc, &tail))
            }
            None => Value::string(pending),
        })
    }

    /// `target(args)`: functions and host callables.
    fn eval_call(&mut self, target: &Expr, args: &[Expr]) -> MaybeValue {
        let callee = self.eval(target)?;
        match &callee {
            Value::Callable(callable) if callable.is_function() => {
                let args = self.eval_positional_args(args)?;
                self.invoke(callable, args, None, target.span)
            }
            Value::Callable(_) => {
                Err(type_mismatch(&target.to_string(), "function", callee.type_name()).into())
            }
            Value::Host(host) if host.object().capabilities().contains(Capabilities::CALLABLE) => {
                let mut values = Vec::with_capacity(args.len());
                for arg in args {
                    values.push(self.eval(arg)?);
                }
                self.counters.count_invocation();
                Ok(host.object().call(&values)?)
            }
            other => Err(not_callable(other.type_name())
                .with_blamed(target.to_string())
                .into()),
        }
    }

    /// Positional argument values; a value-less argument is passed as null.
    pub(crate) fn eval_positional_args(&mut self, args: &[Expr]) -> Result<CallArguments, ControlAction> {
        let mut positional = Vec::with_capacity(args.len());
        for arg in args {
            positional.push(self.eval_opt(arg)?);
        }
        Ok(CallArguments::positional(positional))
    }

    fn eval_loop_query(&self, variable: &Name, query: LoopQuery) -> Result<Value, EvalError> {
        let Some(frame) = self.loop_binding(variable) else {
            return Err(unsupported_operation(
                &format!("?{}", query.name()),
                &format!("{variable:?}, which is not a loop variable"),
            ));
        };
        let index = i64::try_from(frame.index).unwrap_or(i64::MAX);
        Ok(match query {
            LoopQuery::Index => Value::int(index),
            LoopQuery::Counter => Value::int(index.saturating_add(1)),
            LoopQuery::HasNext => Value::Bool(frame.has_next),
            LoopQuery::IsFirst => Value::Bool(frame.index == 0),
            LoopQuery::IsLast => Value::Bool(!frame.has_next),
            LoopQuery::ItemParity => {
                Value::string(if frame.index & 1 == 0 { "odd" } else { "even" })
            }
        })
    }

    fn eval_special(&self, var: SpecialVariable) -> MaybeValue {
        match var {
            SpecialVariable::Args => {
                let Some(ctx) = &self.context else {
                    return Err(unsupported_operation(".args", "top-level template code").into());
                };
                let ctx = ctx.borrow();
                match &ctx.args {
                    Some(args) => Ok(Some(args.clone())),
                    None => Err(unsupported_operation(".args", &ctx.callable.describe()).into()),
                }
            }
            SpecialVariable::OutputFormat => Ok(Some(Value::string(self.output_format.name()))),
            SpecialVariable::AutoEsc => Ok(Some(Value::Bool(self.auto_escaping))),
            SpecialVariable::Namespace => Ok(Some(Value::Namespace(self.current_namespace))),
            SpecialVariable::Main => Ok(Some(Value::Namespace(MAIN))),
            SpecialVariable::Globals => Ok(Some(self.globals_snapshot())),
            SpecialVariable::Locals => Ok(self.locals_snapshot()),
            SpecialVariable::Error => Ok(self.recovered.last().map(|msg| Value::string(msg.as_str()))),
        }
    }
}

pub(crate) fn expect_number(value: &Value, expr: &Expr) -> Result<Number, EvalError> {
    value
        .as_number()
        .ok_or_else(|| type_mismatch(&expr.to_string(), "number", value.type_name()))
}

/// Concatenate two markup values. When the formats differ, whichever side
/// still has its source text is re-escaped into the other's format, the
/// right side first. Two markup-only values of different formats cannot join.
pub(crate) fn join_markup(a: &MarkupValue, b: &MarkupValue) -> Result<MarkupValue, EvalError> {
    let format = a.format();
    if b.format() == format {
        return Ok(format.concat(a, b));
    }
    if let Some(plain) = b.plain_text() {
        return Ok(format.concat(a, &format.from_plain_text(plain)));
    }
    if let Some(plain) = a.plain_text() {
        let other = b.format();
        return Ok(other.concat(&other.from_plain_text(plain), b));
    }
    Err(format_mixing(b.format().name(), format.name()))
}

/// Move buffered plain text into a markup value of `like`'s format.
fn flush_plain(like: &MarkupValue, pending: &mut String) -> MarkupValue {
    like.format().from_plain_text(std::mem::take(pending))
}
