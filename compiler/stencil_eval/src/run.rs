//! Running a template to completion.

use std::sync::Arc;

use indexmap::IndexMap;
use stencil_ir::Template;
use stencil_values::{ControlAction, EvalError, Value};
use tracing::{info, instrument, warn};

use crate::environment::{Environment, EnvironmentBuilder, MAIN};
use crate::output::buffer_sink;
use crate::RenderConfig;

/// How a run ended.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RunOutcome {
    Completed,
    /// `#stop` ended the run early, with its optional message.
    Stopped(Option<String>),
}

impl Environment {
    /// Run the template's root element.
    ///
    /// Top-level callables are bound before anything runs, so a macro may be
    /// called above its definition. A `#stop` is a normal outcome; any other
    /// signal reaching the top is reported as a control-flow error.
    #[instrument(level = "debug", skip_all, fields(template = %self.template.name))]
    pub fn process(&mut self) -> Result<RunOutcome, EvalError> {
        let template = Arc::clone(&self.template);
        self.predefine_callables(&template.root, MAIN)?;
        let result = self.visit(&template.root);
        tracing::debug!(counters = %self.counters.report(), "run finished");
        match result {
            Ok(()) => Ok(RunOutcome::Completed),
            Err(ControlAction::Stop(message)) => {
                info!(message = message.as_deref().unwrap_or(""), "#stop ended the run");
                Ok(RunOutcome::Stopped(message))
            }
            Err(ControlAction::Error(err)) => Err(*err),
            Err(signal) => {
                warn!(signal = signal.signal_name(), "signal reached the top of the template");
                Err(signal.into_eval_error())
            }
        }
    }
}

/// Output and outcome of [`render_to_string`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Rendered {
    pub output: String,
    pub outcome: RunOutcome,
}

/// Run `template` with a fresh environment and collect its output.
///
/// The template and configuration may be shared by any number of concurrent
/// runs.
pub fn render_to_string(
    template: &Arc<Template>,
    config: &Arc<RenderConfig>,
    data_model: IndexMap<String, Value>,
) -> Result<Rendered, EvalError> {
    let sink = buffer_sink();
    let mut env = EnvironmentBuilder::new(Arc::clone(template), Arc::clone(config))
        .data_model(data_model)
        .sink(Arc::clone(&sink))
        .build()?;
    let outcome = env.process()?;
    Ok(Rendered {
        output: sink.take(),
        outcome,
    })
}
