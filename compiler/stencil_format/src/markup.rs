//! Markup values.

use std::fmt;
use std::sync::{Arc, OnceLock};

use crate::{MarkupFormat, OutputFormat};

/// Text tied to a markup format.
///
/// Holds the source plain text, the rendered markup, or both. Markup is
/// rendered from plain text on first demand and cached; a clone shares the
/// cache.
#[derive(Clone)]
pub struct MarkupValue {
    inner: Arc<MarkupInner>,
}

struct MarkupInner {
    format: MarkupFormat,
    plain: Option<Arc<str>>,
    markup: OnceLock<Arc<str>>,
}

/// A markup value of one format cannot be written into output of another.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FormatMixing {
    pub value_format: String,
    pub output_format: String,
}

impl fmt::Display for FormatMixing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "a markup value of format {:?} cannot be inserted into output of format {:?}",
            self.value_format, self.output_format
        )
    }
}

impl MarkupValue {
    pub fn from_plain_text(format: MarkupFormat, text: impl Into<Arc<str>>) -> Self {
        Self::from_parts(format, Some(text.into()), None)
    }

    pub fn from_markup(format: MarkupFormat, markup: impl Into<Arc<str>>) -> Self {
        Self::from_parts(format, None, Some(markup.into()))
    }

    /// At least one of `plain` and `markup` must be present; a value built
    /// with neither renders as empty markup.
    pub(crate) fn from_parts(
        format: MarkupFormat,
        plain: Option<Arc<str>>,
        markup: Option<Arc<str>>,
    ) -> Self {
        let cell = OnceLock::new();
        if let Some(m) = markup {
            let _ = cell.set(m);
        }
        MarkupValue {
            inner: Arc::new(MarkupInner {
                format,
                plain,
                markup: cell,
            }),
        }
    }

    pub fn format(&self) -> &MarkupFormat {
        &self.inner.format
    }

    /// Source plain text, if the value was built from (or still carries) it.
    pub fn plain_text(&self) -> Option<&str> {
        self.inner.plain.as_deref()
    }

    /// Markup if it has been rendered already; never triggers escaping.
    pub fn rendered_markup(&self) -> Option<&str> {
        self.inner.markup.get().map(|m| &**m)
    }

    /// The markup text, rendering and caching it on first use.
    ///
    /// Racing renders each compute the same text; the first store wins and
    /// later ones are dropped.
    pub fn markup(&self) -> Arc<str> {
        if let Some(m) = self.inner.markup.get() {
            return Arc::clone(m);
        }
        let rendered: Arc<str> = match &self.inner.plain {
            Some(plain) => Arc::from(self.inner.format.escape_plain_text(plain)),
            None => Arc::from(""),
        };
        let _ = self.inner.markup.set(Arc::clone(&rendered));
        rendered
    }

    pub fn is_empty(&self) -> bool {
        match (&self.inner.plain, self.inner.markup.get()) {
            (Some(plain), _) => plain.is_empty(),
            (None, Some(markup)) => markup.is_empty(),
            (None, None) => true,
        }
    }

    /// Text to write when this value is output under `current`.
    ///
    /// - same format, or `current` allows mixing: the markup as-is;
    /// - `current` combines some outer format with this value's format: the
    ///   markup escaped by the outer format;
    /// - otherwise the source plain text, escaped by `current` if it is markup;
    /// - a markup-only value in a foreign format is a [`FormatMixing`] error.
    pub fn render_in(&self, current: &OutputFormat) -> Result<String, FormatMixing> {
        match current.as_markup() {
            Some(cur) if *cur == self.inner.format => return Ok(self.markup().to_string()),
            _ if current.allows_foreign_mixing() => return Ok(self.markup().to_string()),
            Some(MarkupFormat::Combined(c)) if c.inner == self.inner.format => {
                return Ok(c.outer.escape_plain_text(&self.markup()));
            }
            _ => {}
        }
        let Some(plain) = self.plain_text() else {
            return Err(FormatMixing {
                value_format: self.inner.format.name().to_owned(),
                output_format: current.name().to_owned(),
            });
        };
        tracing::trace!(
            from = self.inner.format.name(),
            to = current.name(),
            "re-escaping markup source text for a foreign format"
        );
        Ok(match current.as_markup() {
            Some(cur) => cur.escape_plain_text(plain),
            None => plain.to_owned(),
        })
    }
}

impl fmt::Debug for MarkupValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MarkupValue")
            .field("format", &self.inner.format.name())
            .field("plain", &self.inner.plain)
            .field("markup", &self.inner.markup.get())
            .finish()
    }
}

impl PartialEq for MarkupValue {
    /// Equal when formats match and the rendered markup is identical.
    fn eq(&self, other: &Self) -> bool {
        self.inner.format == other.inner.format && self.markup() == other.markup()
    }
}
