//! Output formats and markup values.
//!
//! An [`OutputFormat`] describes the text a template run produces: its name,
//! MIME type, whether values of foreign formats may be written into it, and
//! (for markup formats) how plain text is escaped.
//!
//! A [`MarkupValue`] is text already tied to a markup format. It holds the
//! source plain text, the rendered markup, or both; markup is rendered lazily
//! and cached once. Concatenation keeps plain text unescaped as long as both
//! operands allow it, so escaping never happens twice.
//!
//! The safety rule lives in [`MarkupValue::render_in`]: writing markup of one
//! format into output of another either escapes the value's plain text or fails
//! with [`FormatMixing`].

mod escape;
mod format;
mod markup;
mod registry;

pub use escape::{escape_html, escape_rtf, escape_xhtml, escape_xml};
pub use format::{CombinedFormat, CustomFormat, Escaper, MarkupFormat, OutputFormat};
pub use markup::{FormatMixing, MarkupValue};
pub use registry::{FormatRegistry, UnknownFormat};
