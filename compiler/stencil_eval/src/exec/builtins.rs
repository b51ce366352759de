//! `?name` built-ins.

use stencil_format::{MarkupFormat, MarkupValue};
use stencil_ir::{BuiltInKind, Expr};
use stencil_values::{
    format_mixing, type_mismatch, unsupported_operation, BoundArgs, ControlAction,
    EvalError, Formatted, Value, WithArgs,
};

use super::MaybeValue;
use crate::environment::Environment;

impl Environment {
    pub(super) fn eval_builtin(
        &mut self,
        target: &Expr,
        builtin: BuiltInKind,
        args: &[Expr],
    ) -> MaybeValue {
        let value = match builtin {
            BuiltInKind::HasContent => {
                let value = self.eval_guarded(target)?;
                return Ok(Some(Value::Bool(
                    value.is_some_and(|v| !v.is_empty_content()),
                )));
            }
            _ => self.eval(target)?,
        };
        let result = match builtin {
            BuiltInKind::Esc => {
                let format = self.require_markup_format("?esc")?;
                Value::Markup(match value.as_markup() {
                    Some(markup) => convert_markup(markup, &format)?,
                    None => format.from_plain_text(self.to_plain_text(&value, target)?),
                })
            }
            BuiltInKind::NoEsc => {
                let format = self.require_markup_format("?no_esc")?;
                Value::Markup(match value.as_markup() {
                    Some(markup) => convert_markup(markup, &format)?,
                    None => format.from_markup(self.to_plain_text(&value, target)?),
                })
            }
            BuiltInKind::MarkupString => match value.as_markup() {
                Some(markup) => Value::string(&*markup.markup()),
                None => {
                    return Err(
                        type_mismatch(&target.to_string(), "markup output", value.type_name())
                            .into(),
                    )
                }
            },
            BuiltInKind::WithArgs | BuiltInKind::WithArgsLast => {
                self.with_args(target, &value, args, builtin == BuiltInKind::WithArgsLast)?
            }
            BuiltInKind::String => self.builtin_string(target, &value, args)?,
            BuiltInKind::C => {
                if let Some(number) = value.as_number() {
                    formatted_value(self.format_number(number, "c", target)?)
                } else if let Some(b) = value.as_bool() {
                    Value::string(if b { "true" } else { "false" })
                } else if let Some(text) = value.to_scalar() {
                    Value::string(text)
                } else {
                    return Err(type_mismatch(
                        &target.to_string(),
                        "number, boolean or string",
                        value.type_name(),
                    )
                    .into());
                }
            }
            BuiltInKind::Size => {
                let size = match &value {
                    Value::Sequence(items) => Some(items.len()),
                    Value::Hash(entries) => Some(entries.len()),
                    Value::Namespace(id) => Some(self.namespace(*id)?.len()),
                    Value::Host(host) => host.object().size(),
                    _ => None,
                };
                let Some(size) = size else {
                    return Err(type_mismatch(
                        &target.to_string(),
                        "sequence or hash",
                        value.type_name(),
                    )
                    .into());
                };
                Value::int(i64::try_from(size).unwrap_or(i64::MAX))
            }
            BuiltInKind::HasContent => Value::Bool(!value.is_empty_content()),
            BuiltInKind::UpperCase => Value::string(expect_string(&value, target)?.to_uppercase()),
            BuiltInKind::LowerCase => Value::string(expect_string(&value, target)?.to_lowercase()),
            BuiltInKind::Trim => Value::string(expect_string(&value, target)?.trim()),
        };
        Ok(Some(result))
    }

    /// `?with_args(seq)` / `?with_args(hash)`: a copy of the callable with
    /// pre-bound arguments. Hashes bind by name, which functions do not
    /// support.
    fn with_args(
        &mut self,
        target: &Expr,
        value: &Value,
        args: &[Expr],
        last: bool,
    ) -> Result<Value, ControlAction> {
        let Value::Callable(callable) = value else {
            return Err(
                type_mismatch(&target.to_string(), "macro or function", value.type_name()).into(),
            );
        };
        let Some(arg_expr) = args.first() else {
            return Err(unsupported_operation("?with_args without an argument", "any value").into());
        };
        let arg = self.eval(arg_expr)?;
        let bound = if let Some(items) = arg.iter_values() {
            BoundArgs::Positional(items)
        } else if let Some(entries) = arg.iter_entries() {
            if callable.is_function() {
                return Err(unsupported_operation("?with_args with a hash", "functions").into());
            }
            BoundArgs::Named(entries.into_iter().collect())
        } else {
            return Err(type_mismatch(
                &arg_expr.to_string(),
                "sequence or hash",
                arg.type_name(),
            )
            .into());
        };
        Ok(Value::Callable(callable.with_args(WithArgs { args: bound, last })))
    }

    /// `?string`, `?string(pattern)` and `?string(yes, no)`.
    fn builtin_string(
        &mut self,
        target: &Expr,
        value: &Value,
        args: &[Expr],
    ) -> Result<Value, ControlAction> {
        let mut patterns = Vec::with_capacity(args.len());
        for arg in args {
            let pattern = self.eval(arg)?;
            patterns.push(self.to_plain_text(&pattern, arg)?);
        }
        if let Some(b) = value.as_bool() {
            return Ok(Value::string(match (b, patterns.as_slice()) {
                (true, [yes, _, ..]) => yes.clone(),
                (false, [_, no, ..]) => no.clone(),
                (true, _) => "true".to_owned(),
                (false, _) => "false".to_owned(),
            }));
        }
        let pattern = patterns.first().map(String::as_str);
        if let Some(number) = value.as_number() {
            let pattern = pattern.unwrap_or(self.config.number_format());
            return Ok(formatted_value(self.format_number(number, pattern, target)?));
        }
        if let Some(date) = value.as_date() {
            let pattern = pattern.unwrap_or(self.config.datetime_format());
            return Ok(formatted_value(self.format_date(date, pattern, target)?));
        }
        if let Some(text) = value.to_scalar() {
            return Ok(Value::string(text));
        }
        Err(type_mismatch(
            &target.to_string(),
            "string, number, date or boolean",
            value.type_name(),
        )
        .into())
    }
}

fn formatted_value(formatted: Formatted) -> Value {
    match formatted {
        Formatted::Text(text) => Value::string(text),
        Formatted::Markup(markup) => Value::Markup(markup),
    }
}

fn expect_string(value: &Value, target: &Expr) -> Result<String, EvalError> {
    value
        .to_scalar()
        .ok_or_else(|| type_mismatch(&target.to_string(), "string", value.type_name()))
}

/// Markup already in `format` passes through; other markup is re-created
/// from its source text.
fn convert_markup(markup: MarkupValue, format: &MarkupFormat) -> Result<MarkupValue, EvalError> {
    if markup.format() == format {
        return Ok(markup);
    }
    match markup.plain_text() {
        Some(plain) => Ok(format.from_plain_text(plain)),
        None => Err(format_mixing(markup.format().name(), format.name())),
    }
}
