//! Interpolation, escaping and output-format blocks.

use stencil_format::{MarkupFormat, MarkupValue, OutputFormat};
use stencil_ir::{Element, Expr, Number};
use stencil_values::{
    format_mixing, formatting_failed, misplaced_directive, type_mismatch, undefined_output_format,
    ControlAction, DateTimeValue, EvalError, Formatted, Value,
};
use tracing::trace;

use super::auto_escapes;
use crate::environment::Environment;

impl Environment {
    /// `${expr}`.
    pub(crate) fn interpolate(&mut self, expr: &Expr) -> Result<(), ControlAction> {
        let value = self.eval(expr)?;
        let text = self.render_value(&value, expr)?;
        self.output.write(&text);
        Ok(())
    }

    /// Text an interpolated value writes under the current output format.
    ///
    /// Markup renders through its format rules, strings are escaped when
    /// auto-escaping is on, numbers and dates go through the formatting
    /// services. Host values are tried as markup, string, number and date,
    /// in that order.
    fn render_value(&self, value: &Value, expr: &Expr) -> Result<String, EvalError> {
        if let Some(markup) = value.as_markup() {
            return self.render_markup(&markup);
        }
        if let Some(text) = value.to_scalar() {
            return Ok(self.escape_for_output(text));
        }
        if let Some(number) = value.as_number() {
            let formatted = self.format_number(number, self.config.number_format(), expr)?;
            return self.render_formatted(formatted);
        }
        if let Some(date) = value.as_date() {
            let formatted = self.format_date(date, self.config.datetime_format(), expr)?;
            return self.render_formatted(formatted);
        }
        Err(type_mismatch(
            &expr.to_string(),
            "string, number, date or markup",
            value.type_name(),
        ))
    }

    fn render_formatted(&self, formatted: Formatted) -> Result<String, EvalError> {
        match formatted {
            Formatted::Text(text) => Ok(self.escape_for_output(text)),
            Formatted::Markup(markup) => self.render_markup(&markup),
        }
    }

    fn render_markup(&self, markup: &MarkupValue) -> Result<String, EvalError> {
        markup
            .render_in(&self.output_format)
            .map_err(|e| format_mixing(&e.value_format, &e.output_format))
    }

    fn escape_for_output(&self, text: String) -> String {
        match self.output_format.as_markup() {
            Some(format) if self.auto_escaping => format.escape_plain_text(&text),
            _ => text,
        }
    }

    pub(crate) fn format_number(
        &self,
        number: Number,
        pattern: &str,
        call_site: &Expr,
    ) -> Result<Formatted, EvalError> {
        self.config
            .format_services()
            .format_number(number, pattern, self.config.locale(), &self.output_format)
            .map_err(|e| formatting_failed(&call_site.to_string(), &e.to_string()))
    }

    pub(crate) fn format_date(
        &self,
        date: DateTimeValue,
        pattern: &str,
        call_site: &Expr,
    ) -> Result<Formatted, EvalError> {
        self.config
            .format_services()
            .format_datetime(
                date,
                pattern,
                self.config.locale(),
                self.config.time_zone(),
                &self.output_format,
            )
            .map_err(|e| formatting_failed(&call_site.to_string(), &e.to_string()))
    }

    /// The value as unescaped text, for string concatenation and templates.
    pub(crate) fn to_plain_text(&self, value: &Value, expr: &Expr) -> Result<String, EvalError> {
        if let Some(text) = value.to_scalar() {
            return Ok(text);
        }
        let formatted = if let Some(number) = value.as_number() {
            self.format_number(number, self.config.number_format(), expr)?
        } else if let Some(date) = value.as_date() {
            self.format_date(date, self.config.datetime_format(), expr)?
        } else {
            return Err(type_mismatch(
                &expr.to_string(),
                "string, number or date",
                value.type_name(),
            ));
        };
        Ok(match formatted {
            Formatted::Text(text) => text,
            Formatted::Markup(markup) => markup
                .plain_text()
                .map_or_else(|| markup.markup().to_string(), str::to_owned),
        })
    }

    /// Captured body text as a value: markup in markup formats, else a string.
    pub(crate) fn captured_value(&self, text: String) -> Value {
        match self.output_format.as_markup() {
            Some(format) => Value::Markup(format.from_markup(text)),
            None => Value::string(text),
        }
    }

    /// The current format as markup, for directives and built-ins that only
    /// make sense there.
    pub(crate) fn require_markup_format(&self, directive: &str) -> Result<MarkupFormat, EvalError> {
        self.output_format.as_markup().cloned().ok_or_else(|| {
            misplaced_directive(
                directive,
                &format!(
                    "a markup output format (current format is {})",
                    self.output_format.name()
                ),
            )
        })
    }

    /// `#outputformat "name"`. A plain name switches formats; `outer{inner}`
    /// names a combined format and `{inner}` nests into the current one.
    pub(crate) fn exec_output_format(
        &mut self,
        name: &str,
        body: &[Element],
    ) -> Result<(), ControlAction> {
        let format = self
            .formats
            .lookup_in(name, &self.output_format)
            .map_err(|e| undefined_output_format(&e.to_string()))?;
        let escaping = auto_escapes(self.auto_escaping_policy, &format);
        trace!(
            from = self.output_format.name(),
            to = format.name(),
            auto_escaping = escaping,
            "entering output format"
        );
        self.with_output_state(format, escaping, body)
    }

    /// `#autoesc`: only valid in markup formats.
    pub(crate) fn exec_auto_esc(&mut self, body: &[Element]) -> Result<(), ControlAction> {
        self.require_markup_format("#autoesc")?;
        self.with_output_state(self.output_format.clone(), true, body)
    }

    /// `#noautoesc`.
    pub(crate) fn exec_no_auto_esc(&mut self, body: &[Element]) -> Result<(), ControlAction> {
        self.with_output_state(self.output_format.clone(), false, body)
    }

    /// Run `body` under a format and escaping flag, restoring both after.
    fn with_output_state(
        &mut self,
        format: OutputFormat,
        escaping: bool,
        body: &[Element],
    ) -> Result<(), ControlAction> {
        let saved_format = std::mem::replace(&mut self.output_format, format);
        let saved_escaping = std::mem::replace(&mut self.auto_escaping, escaping);
        let result = self.visit(body);
        self.output_format = saved_format;
        self.auto_escaping = saved_escaping;
        result
    }
}
