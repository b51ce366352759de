//! Value-producing expression nodes.
//!
//! Expressions are pure with respect to output. An expression whose subtree
//! contains only literals (and operators over them whose result kind is known
//! statically) is *foldable*: the first evaluation stores its result in a
//! write-once cache, and later evaluations read it back.

use std::fmt;
use std::sync::{Arc, OnceLock};

use crate::{Constant, Name, Number, Span};

/// Static result kind of a foldable expression.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ConstKind {
    Str,
    Number,
    Bool,
}

/// Binary operators.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    Add,
    Subtract,
    Multiply,
    Divide,
    Modulo,
    Equal,
    NotEqual,
    Less,
    LessOrEqual,
    Greater,
    GreaterOrEqual,
    And,
    Or,
}

impl BinaryOp {
    pub fn as_symbol(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Subtract => "-",
            BinaryOp::Multiply => "*",
            BinaryOp::Divide => "/",
            BinaryOp::Modulo => "%",
            BinaryOp::Equal => "==",
            BinaryOp::NotEqual => "!=",
            BinaryOp::Less => "<",
            BinaryOp::LessOrEqual => "<=",
            BinaryOp::Greater => ">",
            BinaryOp::GreaterOrEqual => ">=",
            BinaryOp::And => "&&",
            BinaryOp::Or => "||",
        }
    }

    pub fn is_arithmetic(self) -> bool {
        matches!(
            self,
            BinaryOp::Subtract | BinaryOp::Multiply | BinaryOp::Divide | BinaryOp::Modulo
        )
    }

    pub fn is_ordering(self) -> bool {
        matches!(
            self,
            BinaryOp::Less | BinaryOp::LessOrEqual | BinaryOp::Greater | BinaryOp::GreaterOrEqual
        )
    }

    fn result_kind(self, left: Option<ConstKind>, right: Option<ConstKind>) -> Option<ConstKind> {
        let (l, r) = (left?, right?);
        match self {
            BinaryOp::Add => match (l, r) {
                (ConstKind::Number, ConstKind::Number) => Some(ConstKind::Number),
                (ConstKind::Str, ConstKind::Str) => Some(ConstKind::Str),
                _ => None,
            },
            op if op.is_arithmetic() => {
                (l == ConstKind::Number && r == ConstKind::Number).then_some(ConstKind::Number)
            }
            BinaryOp::Equal | BinaryOp::NotEqual => (l == r).then_some(ConstKind::Bool),
            op if op.is_ordering() => {
                (l == ConstKind::Number && r == ConstKind::Number).then_some(ConstKind::Bool)
            }
            _ => (l == ConstKind::Bool && r == ConstKind::Bool).then_some(ConstKind::Bool),
        }
    }
}

/// Unary operators.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum UnaryOp {
    Not,
    Negate,
    Plus,
}

impl UnaryOp {
    pub fn as_symbol(self) -> &'static str {
        match self {
            UnaryOp::Not => "!",
            UnaryOp::Negate => "-",
            UnaryOp::Plus => "+",
        }
    }
}

/// Built-ins applied with `target?name` syntax.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BuiltInKind {
    /// `?esc` - escape with the current output format.
    Esc,
    /// `?no_esc` - mark as already-formatted markup.
    NoEsc,
    /// `?markup_string` - markup text of a markup value.
    MarkupString,
    /// `?with_args(...)` - pre-bind callable arguments, before call-site ones.
    WithArgs,
    /// `?with_args_last(...)` - pre-bind callable arguments, after call-site ones.
    WithArgsLast,
    /// `?string` or `?string("pattern")`.
    String,
    /// `?c` - computer-audience formatting.
    C,
    Size,
    HasContent,
    UpperCase,
    LowerCase,
    Trim,
}

impl BuiltInKind {
    pub fn name(self) -> &'static str {
        match self {
            BuiltInKind::Esc => "esc",
            BuiltInKind::NoEsc => "no_esc",
            BuiltInKind::MarkupString => "markup_string",
            BuiltInKind::WithArgs => "with_args",
            BuiltInKind::WithArgsLast => "with_args_last",
            BuiltInKind::String => "string",
            BuiltInKind::C => "c",
            BuiltInKind::Size => "size",
            BuiltInKind::HasContent => "has_content",
            BuiltInKind::UpperCase => "upper_case",
            BuiltInKind::LowerCase => "lower_case",
            BuiltInKind::Trim => "trim",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "esc" => BuiltInKind::Esc,
            "no_esc" => BuiltInKind::NoEsc,
            "markup_string" => BuiltInKind::MarkupString,
            "with_args" => BuiltInKind::WithArgs,
            "with_args_last" => BuiltInKind::WithArgsLast,
            "string" => BuiltInKind::String,
            "c" => BuiltInKind::C,
            "size" => BuiltInKind::Size,
            "has_content" => BuiltInKind::HasContent,
            "upper_case" => BuiltInKind::UpperCase,
            "lower_case" => BuiltInKind::LowerCase,
            "trim" => BuiltInKind::Trim,
            _ => return None,
        })
    }
}

/// Loop-variable queries: `item?index`, `item?has_next`, ...
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum LoopQuery {
    Index,
    Counter,
    HasNext,
    IsFirst,
    IsLast,
    ItemParity,
}

impl LoopQuery {
    pub fn name(self) -> &'static str {
        match self {
            LoopQuery::Index => "index",
            LoopQuery::Counter => "counter",
            LoopQuery::HasNext => "has_next",
            LoopQuery::IsFirst => "is_first",
            LoopQuery::IsLast => "is_last",
            LoopQuery::ItemParity => "item_parity",
        }
    }
}

/// Special variables: `.name` syntax.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SpecialVariable {
    /// Snapshot of the current callable's arguments.
    Args,
    OutputFormat,
    AutoEsc,
    Namespace,
    Main,
    Globals,
    Locals,
    /// Message of the error being handled by `#recover`.
    Error,
}

impl SpecialVariable {
    pub fn name(self) -> &'static str {
        match self {
            SpecialVariable::Args => "args",
            SpecialVariable::OutputFormat => "output_format",
            SpecialVariable::AutoEsc => "auto_esc",
            SpecialVariable::Namespace => "namespace",
            SpecialVariable::Main => "main",
            SpecialVariable::Globals => "globals",
            SpecialVariable::Locals => "locals",
            SpecialVariable::Error => "error",
        }
    }
}

/// A piece of an interpolated string literal.
#[derive(Clone, Debug, PartialEq)]
pub enum StringPart {
    Text(Arc<str>),
    Interpolation(Expr),
}

#[derive(Clone, Debug, PartialEq)]
pub enum ExprKind {
    Literal(Constant),
    Identifier(Name),
    /// `target.key`
    Dot {
        target: Box<Expr>,
        key: Name,
    },
    /// `target[key]`
    DynamicKey {
        target: Box<Expr>,
        key: Box<Expr>,
    },
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    Parenthetical(Box<Expr>),
    ListLiteral(Vec<Expr>),
    HashLiteral(Vec<(Expr, Expr)>),
    /// `"Hello ${name}"`
    StringTemplate(Vec<StringPart>),
    /// `target(args...)` - function invocation.
    Call {
        target: Box<Expr>,
        args: Vec<Expr>,
    },
    BuiltIn {
        target: Box<Expr>,
        builtin: BuiltInKind,
        args: Vec<Expr>,
    },
    LoopVarQuery {
        variable: Name,
        query: LoopQuery,
    },
    /// `target!fallback`; a missing fallback yields the empty value.
    Default {
        target: Box<Expr>,
        fallback: Option<Box<Expr>>,
    },
    /// `target??`
    Exists(Box<Expr>),
    Special(SpecialVariable),
}

/// An expression node.
pub struct Expr {
    pub kind: ExprKind,
    pub span: Span,
    const_kind: Option<ConstKind>,
    folded: OnceLock<Constant>,
}

impl Expr {
    pub fn new(kind: ExprKind, span: Span) -> Self {
        let const_kind = Self::static_kind(&kind);
        Expr {
            kind,
            span,
            const_kind,
            folded: OnceLock::new(),
        }
    }

    fn static_kind(kind: &ExprKind) -> Option<ConstKind> {
        match kind {
            ExprKind::Literal(Constant::Str(_)) => Some(ConstKind::Str),
            ExprKind::Literal(Constant::Number(_)) => Some(ConstKind::Number),
            ExprKind::Literal(Constant::Bool(_)) => Some(ConstKind::Bool),
            ExprKind::Parenthetical(inner) => inner.const_kind,
            ExprKind::Unary { op, operand } => match (op, operand.const_kind?) {
                (UnaryOp::Not, ConstKind::Bool) => Some(ConstKind::Bool),
                (UnaryOp::Negate | UnaryOp::Plus, ConstKind::Number) => Some(ConstKind::Number),
                _ => None,
            },
            ExprKind::Binary { op, left, right } => op.result_kind(left.const_kind, right.const_kind),
            ExprKind::StringTemplate(parts) => parts
                .iter()
                .all(|part| match part {
                    StringPart::Text(_) => true,
                    StringPart::Interpolation(e) => e.const_kind == Some(ConstKind::Str),
                })
                .then_some(ConstKind::Str),
            _ => None,
        }
    }

    /// Rebuilds the node at a different source location.
    #[must_use]
    pub fn with_span(self, span: Span) -> Self {
        Expr { span, ..self }
    }

    /// Whether the subtree is literal-only and may be folded.
    #[inline]
    pub fn is_constant(&self) -> bool {
        self.const_kind.is_some()
    }

    #[inline]
    pub fn const_kind(&self) -> Option<ConstKind> {
        self.const_kind
    }

    /// The folded result, once an evaluation has stored it.
    #[inline]
    pub fn cached_constant(&self) -> Option<&Constant> {
        self.folded.get()
    }

    /// Stores a folded result. Non-foldable nodes and repeated stores are
    /// ignored; concurrent first evaluations race benignly to the same value.
    pub fn cache_constant(&self, value: Constant) {
        if self.const_kind.is_some() {
            let _ = self.folded.set(value);
        }
    }

    // Convenience constructors. The parser is external; these keep hand-built
    // trees (embedders, tests) readable.

    pub fn string(s: impl AsRef<str>) -> Self {
        Self::new(ExprKind::Literal(Constant::string(s)), Span::DUMMY)
    }

    pub fn int(n: i64) -> Self {
        Self::new(ExprKind::Literal(Constant::Number(Number::Int(n))), Span::DUMMY)
    }

    pub fn float(f: f64) -> Self {
        Self::new(ExprKind::Literal(Constant::Number(Number::Float(f))), Span::DUMMY)
    }

    pub fn boolean(b: bool) -> Self {
        Self::new(ExprKind::Literal(Constant::Bool(b)), Span::DUMMY)
    }

    pub fn ident(name: impl Into<Name>) -> Self {
        Self::new(ExprKind::Identifier(name.into()), Span::DUMMY)
    }

    pub fn dot(target: Expr, key: impl Into<Name>) -> Self {
        Self::new(
            ExprKind::Dot {
                target: Box::new(target),
                key: key.into(),
            },
            Span::DUMMY,
        )
    }

    pub fn index(target: Expr, key: Expr) -> Self {
        Self::new(
            ExprKind::DynamicKey {
                target: Box::new(target),
                key: Box::new(key),
            },
            Span::DUMMY,
        )
    }

    pub fn binary(op: BinaryOp, left: Expr, right: Expr) -> Self {
        Self::new(
            ExprKind::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            },
            Span::DUMMY,
        )
    }

    pub fn unary(op: UnaryOp, operand: Expr) -> Self {
        Self::new(
            ExprKind::Unary {
                op,
                operand: Box::new(operand),
            },
            Span::DUMMY,
        )
    }

    pub fn paren(inner: Expr) -> Self {
        Self::new(ExprKind::Parenthetical(Box::new(inner)), Span::DUMMY)
    }

    pub fn list(items: Vec<Expr>) -> Self {
        Self::new(ExprKind::ListLiteral(items), Span::DUMMY)
    }

    pub fn hash(entries: Vec<(Expr, Expr)>) -> Self {
        Self::new(ExprKind::HashLiteral(entries), Span::DUMMY)
    }

    pub fn template(parts: Vec<StringPart>) -> Self {
        Self::new(ExprKind::StringTemplate(parts), Span::DUMMY)
    }

    pub fn call(target: Expr, args: Vec<Expr>) -> Self {
        Self::new(
            ExprKind::Call {
                target: Box::new(target),
                args,
            },
            Span::DUMMY,
        )
    }

    pub fn builtin(target: Expr, builtin: BuiltInKind, args: Vec<Expr>) -> Self {
        Self::new(
            ExprKind::BuiltIn {
                target: Box::new(target),
                builtin,
                args,
            },
            Span::DUMMY,
        )
    }

    pub fn loop_query(variable: impl Into<Name>, query: LoopQuery) -> Self {
        Self::new(
            ExprKind::LoopVarQuery {
                variable: variable.into(),
                query,
            },
            Span::DUMMY,
        )
    }

    pub fn default_to(target: Expr, fallback: Option<Expr>) -> Self {
        Self::new(
            ExprKind::Default {
                target: Box::new(target),
                fallback: fallback.map(Box::new),
            },
            Span::DUMMY,
        )
    }

    pub fn exists(target: Expr) -> Self {
        Self::new(ExprKind::Exists(Box::new(target)), Span::DUMMY)
    }

    pub fn special(var: SpecialVariable) -> Self {
        Self::new(ExprKind::Special(var), Span::DUMMY)
    }

    /// Deep copy in which every reference to the identifier `name` is
    /// replaced by a clone of `replacement`. The receiver is left untouched.
    ///
    /// The copy starts with an empty constant cache.
    #[must_use]
    pub fn substitute(&self, name: &str, replacement: &Expr) -> Expr {
        let sub = |e: &Expr| Box::new(e.substitute(name, replacement));
        let kind = match &self.kind {
            ExprKind::Identifier(id) if id.as_str() == name => {
                return Expr::new(replacement.kind.clone(), replacement.span);
            }
            ExprKind::Literal(_)
            | ExprKind::Identifier(_)
            | ExprKind::LoopVarQuery { .. }
            | ExprKind::Special(_) => self.kind.clone(),
            ExprKind::Dot { target, key } => ExprKind::Dot {
                target: sub(target),
                key: key.clone(),
            },
            ExprKind::DynamicKey { target, key } => ExprKind::DynamicKey {
                target: sub(target),
                key: sub(key),
            },
            ExprKind::Binary { op, left, right } => ExprKind::Binary {
                op: *op,
                left: sub(left),
                right: sub(right),
            },
            ExprKind::Unary { op, operand } => ExprKind::Unary {
                op: *op,
                operand: sub(operand),
            },
            ExprKind::Parenthetical(inner) => ExprKind::Parenthetical(sub(inner)),
            ExprKind::ListLiteral(items) => ExprKind::ListLiteral(
                items.iter().map(|e| e.substitute(name, replacement)).collect(),
            ),
            ExprKind::HashLiteral(entries) => ExprKind::HashLiteral(
                entries
                    .iter()
                    .map(|(k, v)| (k.substitute(name, replacement), v.substitute(name, replacement)))
                    .collect(),
            ),
            ExprKind::StringTemplate(parts) => ExprKind::StringTemplate(
                parts
                    .iter()
                    .map(|part| match part {
                        StringPart::Text(t) => StringPart::Text(Arc::clone(t)),
                        StringPart::Interpolation(e) => {
                            StringPart::Interpolation(e.substitute(name, replacement))
                        }
                    })
                    .collect(),
            ),
            ExprKind::Call { target, args } => ExprKind::Call {
                target: sub(target),
                args: args.iter().map(|e| e.substitute(name, replacement)).collect(),
            },
            ExprKind::BuiltIn {
                target,
                builtin,
                args,
            } => ExprKind::BuiltIn {
                target: sub(target),
                builtin: *builtin,
                args: args.iter().map(|e| e.substitute(name, replacement)).collect(),
            },
            ExprKind::Default { target, fallback } => ExprKind::Default {
                target: sub(target),
                fallback: fallback.as_deref().map(sub),
            },
            ExprKind::Exists(target) => ExprKind::Exists(sub(target)),
        };
        Expr::new(kind, self.span)
    }
}

impl Clone for Expr {
    fn clone(&self) -> Self {
        Expr::new(self.kind.clone(), self.span)
    }
}

impl PartialEq for Expr {
    fn eq(&self, other: &Self) -> bool {
        self.kind == other.kind
    }
}

impl fmt::Debug for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Expr")
            .field("kind", &self.kind)
            .field("span", &self.span)
            .finish_non_exhaustive()
    }
}
