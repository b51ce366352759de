//! `EnvironmentBuilder` for setting up a template run.

use std::sync::Arc;

use indexmap::IndexMap;
use rustc_hash::FxHashMap;
use stencil_format::FormatRegistry;
use stencil_ir::Template;
use stencil_values::{undefined_output_format, EvalError, Value};

use super::{Environment, Namespace};
use crate::diagnostics::{CallStack, EvalCounters};
use crate::exec::auto_escapes;
use crate::output::{silent_sink, stdout_sink, OutputStack, SharedOutputSink};
use crate::RenderConfig;

/// Builder for the per-run [`Environment`].
///
/// The template and configuration are shared; the data model and sink belong
/// to this run. Without a sink, output goes to stdout. `RunMode::Check`
/// replaces any sink with a silent one.
pub struct EnvironmentBuilder {
    template: Arc<Template>,
    config: Arc<RenderConfig>,
    data_model: IndexMap<String, Value>,
    sink: Option<SharedOutputSink>,
}

impl EnvironmentBuilder {
    pub fn new(template: Arc<Template>, config: Arc<RenderConfig>) -> Self {
        EnvironmentBuilder {
            template,
            config,
            data_model: IndexMap::new(),
            sink: None,
        }
    }

    /// Replace the data model.
    #[must_use]
    pub fn data_model(mut self, data_model: IndexMap<String, Value>) -> Self {
        self.data_model = data_model;
        self
    }

    /// Add one data-model variable.
    #[must_use]
    pub fn data(mut self, name: impl Into<String>, value: Value) -> Self {
        self.data_model.insert(name.into(), value);
        self
    }

    #[must_use]
    pub fn sink(mut self, sink: SharedOutputSink) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Fails when the template declares an output format nobody registered.
    pub fn build(self) -> Result<Environment, EvalError> {
        let mut formats = FormatRegistry::new();
        for format in self.config.custom_formats() {
            formats.register(format.clone());
        }

        let output_format = match &self.template.output_format {
            Some(name) => formats
                .lookup(name)
                .map_err(|e| undefined_output_format(&e.to_string()))?,
            None => self.config.default_output_format().clone(),
        };
        let policy = self
            .template
            .auto_escaping
            .unwrap_or_else(|| self.config.auto_escaping());

        let sink = if self.config.mode().writes_output() {
            self.sink.unwrap_or_else(stdout_sink)
        } else {
            silent_sink()
        };

        Ok(Environment {
            namespaces: vec![Namespace::new("globals"), Namespace::new(&*self.template.name)],
            current_namespace: super::MAIN,
            data_model: self.data_model,
            context: None,
            frames: Vec::new(),
            output: OutputStack::new(sink),
            auto_escaping: auto_escapes(policy, &output_format),
            output_format,
            auto_escaping_policy: policy,
            call_stack: CallStack::new(self.config.max_call_depth()),
            counters: EvalCounters::default(),
            recovered: Vec::new(),
            imports: FxHashMap::default(),
            formats,
            template: self.template,
            config: self.config,
        })
    }
}
