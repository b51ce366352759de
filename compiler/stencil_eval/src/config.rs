//! Run configuration.
//!
//! A [`RenderConfig`] is built once, wrapped in an `Arc`, and shared by any
//! number of concurrent runs. Everything in it is read-only during a run.

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use stencil_format::OutputFormat;
use stencil_ir::AutoEscapingPolicy;
use stencil_values::{
    DefaultFormatServices, FormatServices, LibraryResolver, NoLibraries, Value,
};

/// Default limit on nested macro and function calls.
pub const DEFAULT_MAX_CALL_DEPTH: usize = 1000;

/// What a run does with its output.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum RunMode {
    /// Output goes to the sink supplied by the driver.
    #[default]
    Render,
    /// Everything executes, output is discarded.
    Check,
}

impl RunMode {
    #[inline]
    pub fn writes_output(self) -> bool {
        matches!(self, RunMode::Render)
    }
}

/// Immutable settings shared by template runs.
pub struct RenderConfig {
    default_output_format: OutputFormat,
    auto_escaping: AutoEscapingPolicy,
    max_call_depth: Option<usize>,
    locale: String,
    time_zone: String,
    number_format: Option<String>,
    datetime_format: Option<String>,
    shared_variables: IndexMap<String, Value>,
    custom_formats: Vec<OutputFormat>,
    format_services: Arc<dyn FormatServices>,
    libraries: Arc<dyn LibraryResolver>,
    mode: RunMode,
}

impl RenderConfig {
    pub fn builder() -> RenderConfigBuilder {
        RenderConfigBuilder::new()
    }

    /// Used when the template declares no output format.
    pub fn default_output_format(&self) -> &OutputFormat {
        &self.default_output_format
    }

    /// Used when the template declares no auto-escaping policy.
    pub fn auto_escaping(&self) -> AutoEscapingPolicy {
        self.auto_escaping
    }

    pub fn max_call_depth(&self) -> Option<usize> {
        self.max_call_depth
    }

    pub fn locale(&self) -> &str {
        &self.locale
    }

    pub fn time_zone(&self) -> &str {
        &self.time_zone
    }

    /// Pattern for numbers printed without an explicit one.
    pub fn number_format(&self) -> &str {
        self.number_format.as_deref().unwrap_or("")
    }

    pub fn datetime_format(&self) -> &str {
        self.datetime_format.as_deref().unwrap_or("")
    }

    /// Process-level variables, the last tier of variable lookup.
    pub fn shared_variables(&self) -> &IndexMap<String, Value> {
        &self.shared_variables
    }

    pub fn custom_formats(&self) -> &[OutputFormat] {
        &self.custom_formats
    }

    pub fn format_services(&self) -> &dyn FormatServices {
        &*self.format_services
    }

    pub fn libraries(&self) -> &dyn LibraryResolver {
        &*self.libraries
    }

    pub fn mode(&self) -> RunMode {
        self.mode
    }
}

impl Default for RenderConfig {
    fn default() -> Self {
        RenderConfigBuilder::new().build()
    }
}

impl fmt::Debug for RenderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RenderConfig")
            .field("default_output_format", &self.default_output_format.name())
            .field("auto_escaping", &self.auto_escaping)
            .field("max_call_depth", &self.max_call_depth)
            .field("locale", &self.locale)
            .field("time_zone", &self.time_zone)
            .field("number_format", &self.number_format)
            .field("datetime_format", &self.datetime_format)
            .field("shared_variables", &self.shared_variables.len())
            .field("custom_formats", &self.custom_formats.len())
            .field("mode", &self.mode)
            .finish_non_exhaustive()
    }
}

/// Builder for [`RenderConfig`].
pub struct RenderConfigBuilder {
    config: RenderConfig,
}

impl RenderConfigBuilder {
    pub fn new() -> Self {
        RenderConfigBuilder {
            config: RenderConfig {
                default_output_format: OutputFormat::Undefined,
                auto_escaping: AutoEscapingPolicy::default(),
                max_call_depth: Some(DEFAULT_MAX_CALL_DEPTH),
                locale: "en_US".to_string(),
                time_zone: "UTC".to_string(),
                number_format: None,
                datetime_format: None,
                shared_variables: IndexMap::new(),
                custom_formats: Vec::new(),
                format_services: Arc::new(DefaultFormatServices),
                libraries: Arc::new(NoLibraries),
                mode: RunMode::default(),
            },
        }
    }

    #[must_use]
    pub fn default_output_format(mut self, format: OutputFormat) -> Self {
        self.config.default_output_format = format;
        self
    }

    #[must_use]
    pub fn auto_escaping(mut self, policy: AutoEscapingPolicy) -> Self {
        self.config.auto_escaping = policy;
        self
    }

    /// `None` removes the limit; `stacker` still keeps the native stack safe.
    #[must_use]
    pub fn max_call_depth(mut self, depth: Option<usize>) -> Self {
        self.config.max_call_depth = depth;
        self
    }

    #[must_use]
    pub fn locale(mut self, locale: impl Into<String>) -> Self {
        self.config.locale = locale.into();
        self
    }

    #[must_use]
    pub fn time_zone(mut self, time_zone: impl Into<String>) -> Self {
        self.config.time_zone = time_zone.into();
        self
    }

    #[must_use]
    pub fn number_format(mut self, pattern: impl Into<String>) -> Self {
        self.config.number_format = Some(pattern.into());
        self
    }

    #[must_use]
    pub fn datetime_format(mut self, pattern: impl Into<String>) -> Self {
        self.config.datetime_format = Some(pattern.into());
        self
    }

    #[must_use]
    pub fn shared_variable(mut self, name: impl Into<String>, value: Value) -> Self {
        self.config.shared_variables.insert(name.into(), value);
        self
    }

    /// Registers a host-defined format, resolvable by its name.
    #[must_use]
    pub fn custom_format(mut self, format: OutputFormat) -> Self {
        self.config.custom_formats.push(format);
        self
    }

    #[must_use]
    pub fn format_services(mut self, services: Arc<dyn FormatServices>) -> Self {
        self.config.format_services = services;
        self
    }

    #[must_use]
    pub fn libraries(mut self, libraries: Arc<dyn LibraryResolver>) -> Self {
        self.config.libraries = libraries;
        self
    }

    #[must_use]
    pub fn mode(mut self, mode: RunMode) -> Self {
        self.config.mode = mode;
        self
    }

    pub fn build(self) -> RenderConfig {
        self.config
    }
}

impl Default for RenderConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
