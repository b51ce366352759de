//! Parsed templates.

use std::sync::Arc;

use crate::Element;

/// How the template turns auto-escaping on when a run starts.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum AutoEscapingPolicy {
    /// Escape only for formats that escape by default (HTML, XHTML, XML).
    #[default]
    EnableIfDefault,
    /// Escape for every markup format.
    EnableIfSupported,
    Disable,
}

/// A parsed template: root element plus metadata.
#[derive(Clone, Debug, PartialEq)]
pub struct Template {
    pub name: Arc<str>,
    /// Declared output format name; `None` defers to configuration.
    pub output_format: Option<Arc<str>>,
    /// Declared auto-escaping policy; `None` defers to configuration.
    pub auto_escaping: Option<AutoEscapingPolicy>,
    pub version: Option<Arc<str>>,
    pub root: Vec<Element>,
}

impl Template {
    pub fn new(name: impl AsRef<str>, root: Vec<Element>) -> Self {
        Template {
            name: Arc::from(name.as_ref()),
            output_format: None,
            auto_escaping: None,
            version: None,
            root,
        }
    }

    #[must_use]
    pub fn with_output_format(mut self, format: impl AsRef<str>) -> Self {
        self.output_format = Some(Arc::from(format.as_ref()));
        self
    }

    #[must_use]
    pub fn with_auto_escaping(mut self, policy: AutoEscapingPolicy) -> Self {
        self.auto_escaping = Some(policy);
        self
    }
}
