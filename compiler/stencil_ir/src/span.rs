//! Source locations.

use std::fmt;

/// Position of a node in the template source, as reported by the parser.
///
/// `line` and `column` are 1-based; [`Span::DUMMY`] marks synthesized nodes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Span {
    pub line: u32,
    pub column: u32,
}

impl Span {
    /// Placeholder for nodes built without source positions.
    pub const DUMMY: Span = Span { line: 0, column: 0 };

    pub const fn new(line: u32, column: u32) -> Self {
        Span { line, column }
    }

    #[inline]
    pub fn is_dummy(self) -> bool {
        self.line == 0
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_dummy() {
            f.write_str("<unknown location>")
        } else {
            write!(f, "line {}, column {}", self.line, self.column)
        }
    }
}
