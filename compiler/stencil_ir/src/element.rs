//! Effectful template nodes.
//!
//! Elements write output, bind variables, define and invoke callables, or
//! raise control-flow signals. Bodies are ordered child lists; the driver walks
//! them without recursion where no state must be restored afterwards.

use std::sync::Arc;

use crate::{CallableDef, Expr, Name, Span};

/// One `#if` / `#elseif` / `#else` arm. `condition` is `None` for `#else`.
#[derive(Clone, Debug, PartialEq)]
pub struct ConditionalBranch {
    pub condition: Option<Expr>,
    pub body: Vec<Element>,
}

/// Loop variable names bound by `as item` or `as key, value`.
#[derive(Clone, Debug, PartialEq)]
pub struct LoopVars {
    pub item: Name,
    pub value: Option<Name>,
}

impl LoopVars {
    pub fn item(name: impl Into<Name>) -> Self {
        LoopVars {
            item: name.into(),
            value: None,
        }
    }

    pub fn key_value(key: impl Into<Name>, value: impl Into<Name>) -> Self {
        LoopVars {
            item: key.into(),
            value: Some(value.into()),
        }
    }
}

/// `#list source as vars` ... `#else` ...
///
/// When `loop_vars` is `None` the body must contain an `#items` element that
/// performs the iteration.
#[derive(Clone, Debug, PartialEq)]
pub struct ListBlock {
    pub source: Expr,
    pub loop_vars: Option<LoopVars>,
    pub body: Vec<Element>,
    pub else_body: Option<Vec<Element>>,
}

/// `#case` falls through into the next case; `#on` does not.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CaseKind {
    Case,
    On,
    Default,
}

#[derive(Clone, Debug, PartialEq)]
pub struct SwitchCase {
    pub kind: CaseKind,
    pub values: Vec<Expr>,
    pub body: Vec<Element>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct SwitchBlock {
    pub value: Expr,
    pub cases: Vec<SwitchCase>,
}

/// Where an assignment writes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AssignScope {
    /// `#local`: the current macro or function frame.
    Local,
    /// `#assign`: the current namespace, or the one named by `in`.
    Namespace,
    /// `#global`: the globals namespace.
    Global,
}

impl AssignScope {
    pub fn directive(self) -> &'static str {
        match self {
            AssignScope::Local => "local",
            AssignScope::Namespace => "assign",
            AssignScope::Global => "global",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AssignOp {
    Set,
    AddAssign,
    SubAssign,
    MulAssign,
    DivAssign,
    ModAssign,
    Increment,
    Decrement,
}

impl AssignOp {
    pub fn as_symbol(self) -> &'static str {
        match self {
            AssignOp::Set => "=",
            AssignOp::AddAssign => "+=",
            AssignOp::SubAssign => "-=",
            AssignOp::MulAssign => "*=",
            AssignOp::DivAssign => "/=",
            AssignOp::ModAssign => "%=",
            AssignOp::Increment => "++",
            AssignOp::Decrement => "--",
        }
    }
}

/// `name op value`; `value` is absent for `++` and `--`.
#[derive(Clone, Debug, PartialEq)]
pub struct AssignTarget {
    pub name: Name,
    pub op: AssignOp,
    pub value: Option<Expr>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Assignment {
    pub scope: AssignScope,
    pub targets: Vec<AssignTarget>,
    /// `in ns` target; only meaningful for the `Namespace` and `Global` scopes.
    pub namespace: Option<Expr>,
}

/// Arguments at a call site: either all positional or all named.
#[derive(Clone, Debug, PartialEq)]
pub enum CallArgs {
    Positional(Vec<Expr>),
    Named(Vec<(Name, Expr)>),
}

impl CallArgs {
    pub fn len(&self) -> usize {
        match self {
            CallArgs::Positional(a) => a.len(),
            CallArgs::Named(a) => a.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// `<@callee args; body_params>body</@callee>`
#[derive(Clone, Debug, PartialEq)]
pub struct CallSite {
    pub callee: Expr,
    pub args: CallArgs,
    pub body_params: Vec<Name>,
    pub body: Option<Arc<[Element]>>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum ElementKind {
    Text(Arc<str>),
    /// `${expr}`
    Interpolation(Expr),
    Sequence(Vec<Element>),
    If(Vec<ConditionalBranch>),
    List(ListBlock),
    Items {
        loop_vars: LoopVars,
        body: Vec<Element>,
    },
    /// `#sep`: body runs unless the innermost loop is on its last item.
    Sep(Vec<Element>),
    Break,
    Continue,
    Return(Option<Expr>),
    Stop(Option<Expr>),
    Switch(SwitchBlock),
    Assignment(Assignment),
    /// `#assign name>body</#assign>`: capture rendered body text.
    Capture {
        scope: AssignScope,
        name: Name,
        namespace: Option<Expr>,
        body: Vec<Element>,
    },
    CallableDef(Arc<CallableDef>),
    Call(CallSite),
    /// `#nested args`
    Nested(Vec<Expr>),
    /// `#import library as namespace`
    Import {
        library: Expr,
        namespace: Name,
    },
    /// `#escape variable as escape` with the body already rewritten.
    Escape {
        variable: Name,
        escape: Expr,
        body: Vec<Element>,
    },
    NoEscape(Vec<Element>),
    AutoEsc(Vec<Element>),
    NoAutoEsc(Vec<Element>),
    /// `#outputformat "name"`
    OutputFormat {
        format: Arc<str>,
        body: Vec<Element>,
    },
    Attempt {
        attempt: Vec<Element>,
        recover: Vec<Element>,
    },
}

#[derive(Clone, Debug, PartialEq)]
pub struct Element {
    pub kind: ElementKind,
    pub span: Span,
}

impl Element {
    pub fn new(kind: ElementKind, span: Span) -> Self {
        Element { kind, span }
    }

    #[must_use]
    pub fn with_span(self, span: Span) -> Self {
        Element { span, ..self }
    }

    /// Short directive name used in diagnostics and backtraces.
    pub fn directive_name(&self) -> &'static str {
        match &self.kind {
            ElementKind::Text(_) => "text",
            ElementKind::Interpolation(_) => "${...}",
            ElementKind::Sequence(_) => "sequence",
            ElementKind::If(_) => "#if",
            ElementKind::List(_) => "#list",
            ElementKind::Items { .. } => "#items",
            ElementKind::Sep(_) => "#sep",
            ElementKind::Break => "#break",
            ElementKind::Continue => "#continue",
            ElementKind::Return(_) => "#return",
            ElementKind::Stop(_) => "#stop",
            ElementKind::Switch(_) => "#switch",
            ElementKind::Assignment(Assignment { scope, .. }) | ElementKind::Capture { scope, .. } => {
                match scope {
                    AssignScope::Local => "#local",
                    AssignScope::Namespace => "#assign",
                    AssignScope::Global => "#global",
                }
            }
            ElementKind::CallableDef(def) => def.kind.directive(),
            ElementKind::Call(_) => "@call",
            ElementKind::Nested(_) => "#nested",
            ElementKind::Import { .. } => "#import",
            ElementKind::Escape { .. } => "#escape",
            ElementKind::NoEscape(_) => "#noescape",
            ElementKind::AutoEsc(_) => "#autoesc",
            ElementKind::NoAutoEsc(_) => "#noautoesc",
            ElementKind::OutputFormat { .. } => "#outputformat",
            ElementKind::Attempt { .. } => "#attempt",
        }
    }

    pub fn text(s: impl AsRef<str>) -> Self {
        Self::new(ElementKind::Text(Arc::from(s.as_ref())), Span::DUMMY)
    }

    pub fn interpolation(expr: Expr) -> Self {
        Self::new(ElementKind::Interpolation(expr), Span::DUMMY)
    }

    pub fn sequence(children: Vec<Element>) -> Self {
        Self::new(ElementKind::Sequence(children), Span::DUMMY)
    }

    pub fn if_else(condition: Expr, then: Vec<Element>, otherwise: Option<Vec<Element>>) -> Self {
        let mut branches = vec![ConditionalBranch {
            condition: Some(condition),
            body: then,
        }];
        if let Some(body) = otherwise {
            branches.push(ConditionalBranch {
                condition: None,
                body,
            });
        }
        Self::new(ElementKind::If(branches), Span::DUMMY)
    }

    pub fn list(source: Expr, loop_vars: Option<LoopVars>, body: Vec<Element>) -> Self {
        Self::new(
            ElementKind::List(ListBlock {
                source,
                loop_vars,
                body,
                else_body: None,
            }),
            Span::DUMMY,
        )
    }

    pub fn assign(scope: AssignScope, name: impl Into<Name>, value: Expr) -> Self {
        Self::new(
            ElementKind::Assignment(Assignment {
                scope,
                targets: vec![AssignTarget {
                    name: name.into(),
                    op: AssignOp::Set,
                    value: Some(value),
                }],
                namespace: None,
            }),
            Span::DUMMY,
        )
    }

    pub fn define(def: CallableDef) -> Self {
        let span = def.span;
        Self::new(ElementKind::CallableDef(Arc::new(def)), span)
    }

    pub fn call(callee: Expr, args: CallArgs) -> Self {
        Self::new(
            ElementKind::Call(CallSite {
                callee,
                args,
                body_params: Vec::new(),
                body: None,
            }),
            Span::DUMMY,
        )
    }

    pub fn call_with_body(
        callee: Expr,
        args: CallArgs,
        body_params: Vec<Name>,
        body: Vec<Element>,
    ) -> Self {
        Self::new(
            ElementKind::Call(CallSite {
                callee,
                args,
                body_params,
                body: Some(Arc::from(body)),
            }),
            Span::DUMMY,
        )
    }

    pub fn nested(args: Vec<Expr>) -> Self {
        Self::new(ElementKind::Nested(args), Span::DUMMY)
    }

    /// Builds an `#escape` block, rewriting every `${...}` in `body` (and in
    /// nested bodies) to `escape` with `variable` bound to the original
    /// expression.
    ///
    /// Interpolations inside `#noescape` are left alone. A `#noescape` that
    /// sits inside an inner `#escape` only shields from that inner block, so
    /// the outer escape still applies to it.
    pub fn escape_block(variable: Name, escape: Expr, body: Vec<Element>) -> Self {
        let body = body
            .iter()
            .map(|e| e.apply_escape(&variable, &escape, false))
            .collect();
        Self::new(
            ElementKind::Escape {
                variable,
                escape,
                body,
            },
            Span::DUMMY,
        )
    }

    fn apply_escape(&self, var: &str, escape: &Expr, inside_inner: bool) -> Element {
        let all = |body: &[Element], inner: bool| -> Vec<Element> {
            body.iter()
                .map(|e| e.apply_escape(var, escape, inner))
                .collect()
        };
        let kind = match &self.kind {
            ElementKind::Interpolation(expr) => {
                ElementKind::Interpolation(escape.substitute(var, expr).with_span(expr.span))
            }
            ElementKind::NoEscape(body) if inside_inner => ElementKind::NoEscape(all(body, false)),
            ElementKind::NoEscape(_) => return self.clone(),
            ElementKind::Escape {
                variable,
                escape: inner,
                body,
            } => ElementKind::Escape {
                variable: variable.clone(),
                escape: inner.clone(),
                body: all(body, true),
            },
            ElementKind::Sequence(body) => ElementKind::Sequence(all(body, inside_inner)),
            ElementKind::If(branches) => ElementKind::If(
                branches
                    .iter()
                    .map(|b| ConditionalBranch {
                        condition: b.condition.clone(),
                        body: all(&b.body, inside_inner),
                    })
                    .collect(),
            ),
            ElementKind::List(block) => ElementKind::List(ListBlock {
                source: block.source.clone(),
                loop_vars: block.loop_vars.clone(),
                body: all(&block.body, inside_inner),
                else_body: block.else_body.as_deref().map(|b| all(b, inside_inner)),
            }),
            ElementKind::Items { loop_vars, body } => ElementKind::Items {
                loop_vars: loop_vars.clone(),
                body: all(body, inside_inner),
            },
            ElementKind::Sep(body) => ElementKind::Sep(all(body, inside_inner)),
            ElementKind::Switch(block) => ElementKind::Switch(SwitchBlock {
                value: block.value.clone(),
                cases: block
                    .cases
                    .iter()
                    .map(|c| SwitchCase {
                        kind: c.kind,
                        values: c.values.clone(),
                        body: all(&c.body, inside_inner),
                    })
                    .collect(),
            }),
            ElementKind::Capture {
                scope,
                name,
                namespace,
                body,
            } => ElementKind::Capture {
                scope: *scope,
                name: name.clone(),
                namespace: namespace.clone(),
                body: all(body, inside_inner),
            },
            ElementKind::CallableDef(def) => ElementKind::CallableDef(Arc::new(CallableDef {
                body: all(&def.body, inside_inner),
                ..CallableDef::clone(def)
            })),
            ElementKind::Call(site) => ElementKind::Call(CallSite {
                body: site
                    .body
                    .as_deref()
                    .map(|b| Arc::from(all(b, inside_inner))),
                ..site.clone()
            }),
            ElementKind::AutoEsc(body) => ElementKind::AutoEsc(all(body, inside_inner)),
            ElementKind::NoAutoEsc(body) => ElementKind::NoAutoEsc(all(body, inside_inner)),
            ElementKind::OutputFormat { format, body } => ElementKind::OutputFormat {
                format: Arc::clone(format),
                body: all(body, inside_inner),
            },
            ElementKind::Attempt { attempt, recover } => ElementKind::Attempt {
                attempt: all(attempt, inside_inner),
                recover: all(recover, inside_inner),
            },
            ElementKind::Text(_)
            | ElementKind::Break
            | ElementKind::Continue
            | ElementKind::Return(_)
            | ElementKind::Stop(_)
            | ElementKind::Assignment(_)
            | ElementKind::Nested(_)
            | ElementKind::Import { .. } => return self.clone(),
        };
        Element::new(kind, self.span)
    }
}
