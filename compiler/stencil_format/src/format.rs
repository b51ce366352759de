//! Output format descriptors.
//!
//! Formats are immutable and cheap to clone; combined and custom formats share
//! their payload through `Arc`, so one descriptor serves any number of runs.

use std::fmt;
use std::sync::Arc;

use crate::escape::{escape_html, escape_rtf, escape_xhtml, escape_xml};
use crate::MarkupValue;

/// Escaper for a custom markup format: plain text in, markup out.
pub type Escaper = Arc<dyn Fn(&str) -> String + Send + Sync>;

/// A format whose values are markup and which can escape plain text.
#[derive(Clone)]
pub enum MarkupFormat {
    Html,
    Xhtml,
    Xml,
    Rtf,
    /// One markup language embedded in another, named `outer{inner}`.
    Combined(Arc<CombinedFormat>),
    Custom(Arc<CustomFormat>),
}

pub struct CombinedFormat {
    name: String,
    pub outer: MarkupFormat,
    pub inner: MarkupFormat,
}

/// A host-registered markup format.
pub struct CustomFormat {
    pub name: String,
    pub mime_type: String,
    pub auto_escaped_by_default: bool,
    pub escaper: Escaper,
}

impl MarkupFormat {
    pub fn combined(outer: MarkupFormat, inner: MarkupFormat) -> Self {
        let name = format!("{}{{{}}}", outer.name(), inner.name());
        MarkupFormat::Combined(Arc::new(CombinedFormat { name, outer, inner }))
    }

    pub fn custom(
        name: impl Into<String>,
        mime_type: impl Into<String>,
        escaper: impl Fn(&str) -> String + Send + Sync + 'static,
    ) -> Self {
        MarkupFormat::Custom(Arc::new(CustomFormat {
            name: name.into(),
            mime_type: mime_type.into(),
            auto_escaped_by_default: true,
            escaper: Arc::new(escaper),
        }))
    }

    pub fn name(&self) -> &str {
        match self {
            MarkupFormat::Html => "HTML",
            MarkupFormat::Xhtml => "XHTML",
            MarkupFormat::Xml => "XML",
            MarkupFormat::Rtf => "RTF",
            MarkupFormat::Combined(c) => &c.name,
            MarkupFormat::Custom(c) => &c.name,
        }
    }

    pub fn mime_type(&self) -> &str {
        match self {
            MarkupFormat::Html => "text/html",
            MarkupFormat::Xhtml => "application/xhtml+xml",
            MarkupFormat::Xml => "application/xml",
            MarkupFormat::Rtf => "application/rtf",
            MarkupFormat::Combined(c) => c.outer.mime_type(),
            MarkupFormat::Custom(c) => &c.mime_type,
        }
    }

    /// Whether `EnableIfDefault` turns auto-escaping on for this format.
    pub fn is_auto_escaped_by_default(&self) -> bool {
        match self {
            MarkupFormat::Html | MarkupFormat::Xhtml | MarkupFormat::Xml => true,
            MarkupFormat::Rtf => false,
            MarkupFormat::Combined(c) => c.outer.is_auto_escaped_by_default(),
            MarkupFormat::Custom(c) => c.auto_escaped_by_default,
        }
    }

    /// Escape plain text into this format's markup. Combined formats escape
    /// with the inner format first, then the outer one.
    pub fn escape_plain_text(&self, text: &str) -> String {
        match self {
            MarkupFormat::Html => escape_html(text),
            MarkupFormat::Xhtml => escape_xhtml(text),
            MarkupFormat::Xml => escape_xml(text),
            MarkupFormat::Rtf => escape_rtf(text),
            MarkupFormat::Combined(c) => c.outer.escape_plain_text(&c.inner.escape_plain_text(text)),
            MarkupFormat::Custom(c) => (c.escaper)(text),
        }
    }

    /// Markup value holding unescaped source text.
    pub fn from_plain_text(&self, text: impl Into<Arc<str>>) -> MarkupValue {
        MarkupValue::from_plain_text(self.clone(), text)
    }

    /// Markup value holding text that is already markup.
    pub fn from_markup(&self, markup: impl Into<Arc<str>>) -> MarkupValue {
        MarkupValue::from_markup(self.clone(), markup)
    }

    /// Concatenate two values of this format without re-escaping.
    ///
    /// Plain text survives if both operands carry it, rendered markup
    /// survives if both operands already rendered it. When neither holds on
    /// both sides, the plain-only operand is rendered and markup is joined.
    pub fn concat(&self, a: &MarkupValue, b: &MarkupValue) -> MarkupValue {
        let plain = match (a.plain_text(), b.plain_text()) {
            (Some(x), Some(y)) => Some(Arc::from(format!("{x}{y}"))),
            _ => None,
        };
        let markup = match (a.rendered_markup(), b.rendered_markup()) {
            (Some(x), Some(y)) => Some(Arc::from(format!("{x}{y}"))),
            _ => None,
        };
        if plain.is_some() || markup.is_some() {
            return MarkupValue::from_parts(self.clone(), plain, markup);
        }
        let joined = format!("{}{}", a.markup(), b.markup());
        MarkupValue::from_parts(self.clone(), None, Some(Arc::from(joined)))
    }

    /// Emptiness check against whichever representation is materialized.
    pub fn is_empty(&self, value: &MarkupValue) -> bool {
        value.is_empty()
    }
}

impl PartialEq for MarkupFormat {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (MarkupFormat::Html, MarkupFormat::Html)
            | (MarkupFormat::Xhtml, MarkupFormat::Xhtml)
            | (MarkupFormat::Xml, MarkupFormat::Xml)
            | (MarkupFormat::Rtf, MarkupFormat::Rtf) => true,
            (MarkupFormat::Combined(a), MarkupFormat::Combined(b)) => {
                a.outer == b.outer && a.inner == b.inner
            }
            (MarkupFormat::Custom(a), MarkupFormat::Custom(b)) => {
                Arc::ptr_eq(a, b) || a.name == b.name
            }
            _ => false,
        }
    }
}

impl fmt::Debug for MarkupFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MarkupFormat({})", self.name())
    }
}

/// The format governing a run's output.
#[derive(Clone, Debug, PartialEq)]
pub enum OutputFormat {
    /// No declared format; accepts markup of any format as-is.
    Undefined,
    PlainText,
    JavaScript,
    Json,
    Css,
    Markup(MarkupFormat),
}

impl OutputFormat {
    pub fn name(&self) -> &str {
        match self {
            OutputFormat::Undefined => "undefined",
            OutputFormat::PlainText => "plainText",
            OutputFormat::JavaScript => "JavaScript",
            OutputFormat::Json => "JSON",
            OutputFormat::Css => "CSS",
            OutputFormat::Markup(m) => m.name(),
        }
    }

    pub fn mime_type(&self) -> Option<&str> {
        match self {
            OutputFormat::Undefined => None,
            OutputFormat::PlainText => Some("text/plain"),
            OutputFormat::JavaScript => Some("application/javascript"),
            OutputFormat::Json => Some("application/json"),
            OutputFormat::Css => Some("text/css"),
            OutputFormat::Markup(m) => Some(m.mime_type()),
        }
    }

    /// Only the undefined format lets foreign markup through unchanged.
    pub fn allows_foreign_mixing(&self) -> bool {
        matches!(self, OutputFormat::Undefined)
    }

    pub fn as_markup(&self) -> Option<&MarkupFormat> {
        match self {
            OutputFormat::Markup(m) => Some(m),
            _ => None,
        }
    }
}

impl From<MarkupFormat> for OutputFormat {
    fn from(m: MarkupFormat) -> Self {
        OutputFormat::Markup(m)
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
