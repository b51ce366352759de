//! Name-based format lookup.

use rustc_hash::FxHashMap;

use crate::{MarkupFormat, OutputFormat};

/// Lookup of an unregistered format name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UnknownFormat {
    #[error("unregistered output format: {0:?}")]
    Unregistered(String),
    #[error("output format {0:?} is not a markup format and cannot be combined")]
    NotMarkup(String),
    #[error("malformed combined output format name: {0:?}")]
    Malformed(String),
    #[error("{name:?} nests into the current format, which must be a markup format (current format is {current})")]
    NestedInNonMarkup { name: String, current: String },
}

/// Built-in formats plus host-registered custom ones.
///
/// Besides plain names, `outer{inner}` resolves to the combined format of two
/// markup formats; nesting (`a{b{c}}`) is allowed.
#[derive(Clone, Debug, Default)]
pub struct FormatRegistry {
    custom: FxHashMap<String, OutputFormat>,
}

impl FormatRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) a custom format under its own name.
    pub fn register(&mut self, format: OutputFormat) {
        self.custom.insert(format.name().to_owned(), format);
    }

    pub fn lookup(&self, name: &str) -> Result<OutputFormat, UnknownFormat> {
        let name = name.trim();
        if let Some(open) = name.find('{') {
            let Some(inner) = name[open + 1..].strip_suffix('}') else {
                return Err(UnknownFormat::Malformed(name.to_owned()));
            };
            let outer = self.lookup_markup(&name[..open])?;
            let inner = self.lookup_markup(inner)?;
            return Ok(OutputFormat::Markup(MarkupFormat::combined(outer, inner)));
        }
        if let Some(builtin) = Self::builtin(name) {
            return Ok(builtin);
        }
        self.custom
            .get(name)
            .cloned()
            .ok_or_else(|| UnknownFormat::Unregistered(name.to_owned()))
    }

    /// Resolve the name given to an `#outputformat` block. `{inner}` nests
    /// `inner` into `current`; any other name is looked up as is.
    pub fn lookup_in(
        &self,
        name: &str,
        current: &OutputFormat,
    ) -> Result<OutputFormat, UnknownFormat> {
        let name = name.trim();
        let Some(inner) = name.strip_prefix('{') else {
            return self.lookup(name);
        };
        let Some(inner) = inner.strip_suffix('}') else {
            return Err(UnknownFormat::Malformed(name.to_owned()));
        };
        let inner = self.lookup_markup(inner)?;
        match current.as_markup() {
            Some(outer) => Ok(OutputFormat::Markup(MarkupFormat::combined(
                outer.clone(),
                inner,
            ))),
            None => Err(UnknownFormat::NestedInNonMarkup {
                name: name.to_owned(),
                current: current.name().to_owned(),
            }),
        }
    }

    fn lookup_markup(&self, name: &str) -> Result<MarkupFormat, UnknownFormat> {
        match self.lookup(name)? {
            OutputFormat::Markup(m) => Ok(m),
            other => Err(UnknownFormat::NotMarkup(other.name().to_owned())),
        }
    }

    fn builtin(name: &str) -> Option<OutputFormat> {
        Some(match name {
            "undefined" => OutputFormat::Undefined,
            "plainText" => OutputFormat::PlainText,
            "JavaScript" => OutputFormat::JavaScript,
            "JSON" => OutputFormat::Json,
            "CSS" => OutputFormat::Css,
            "HTML" => OutputFormat::Markup(MarkupFormat::Html),
            "XHTML" => OutputFormat::Markup(MarkupFormat::Xhtml),
            "XML" => OutputFormat::Markup(MarkupFormat::Xml),
            "RTF" => OutputFormat::Markup(MarkupFormat::Rtf),
            _ => return None,
        })
    }
}
