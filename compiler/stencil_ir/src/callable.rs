//! Callable definitions: `#macro` and `#function`.

use crate::{Element, Expr, Name, Span};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CallableKind {
    /// Writes output; invoked with `<@name .../>`.
    Macro,
    /// Returns a value; invoked as an expression. Its output is discarded.
    Function,
}

impl CallableKind {
    pub fn directive(self) -> &'static str {
        match self {
            CallableKind::Macro => "#macro",
            CallableKind::Function => "#function",
        }
    }

    pub fn describe(self) -> &'static str {
        match self {
            CallableKind::Macro => "macro",
            CallableKind::Function => "function",
        }
    }
}

/// A declared parameter. A parameter without a default is required.
#[derive(Clone, Debug, PartialEq)]
pub struct ParamDecl {
    pub name: Name,
    pub default: Option<Expr>,
}

impl ParamDecl {
    pub fn required(name: impl Into<Name>) -> Self {
        ParamDecl {
            name: name.into(),
            default: None,
        }
    }

    pub fn with_default(name: impl Into<Name>, default: Expr) -> Self {
        ParamDecl {
            name: name.into(),
            default: Some(default),
        }
    }
}

/// Definition of a macro or function.
///
/// Parameter order is the positional binding order. Defaults may reference
/// other parameters, which is why binding resolves them iteratively.
#[derive(Clone, Debug, PartialEq)]
pub struct CallableDef {
    pub name: Name,
    pub kind: CallableKind,
    pub params: Vec<ParamDecl>,
    /// Receives excess arguments: a sequence for positional calls, a hash for
    /// named calls.
    pub catch_all: Option<Name>,
    /// The body reads `.args`, so invocation must snapshot the bound values.
    pub requires_args: bool,
    pub body: Vec<Element>,
    pub span: Span,
}

impl CallableDef {
    pub fn new(name: impl Into<Name>, kind: CallableKind, params: Vec<ParamDecl>) -> Self {
        CallableDef {
            name: name.into(),
            kind,
            params,
            catch_all: None,
            requires_args: false,
            body: Vec::new(),
            span: Span::DUMMY,
        }
    }

    #[must_use]
    pub fn with_body(mut self, body: Vec<Element>) -> Self {
        self.body = body;
        self
    }

    #[must_use]
    pub fn with_catch_all(mut self, name: impl Into<Name>) -> Self {
        self.catch_all = Some(name.into());
        self
    }

    #[must_use]
    pub fn requiring_args(mut self) -> Self {
        self.requires_args = true;
        self
    }

    #[inline]
    pub fn is_function(&self) -> bool {
        self.kind == CallableKind::Function
    }

    pub fn param_index(&self, name: &str) -> Option<usize> {
        self.params.iter().position(|p| p.name.as_str() == name)
    }

    /// `macro "greet"` style label for diagnostics.
    pub fn describe(&self) -> String {
        format!("{} {:?}", self.kind.describe(), self.name.as_str())
    }
}
