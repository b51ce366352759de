//! Reflective parameter access for tooling.
//!
//! Each node exposes an ordered list of its direct sub-parts. Index `i` maps
//! to a sub-node (or name/text) plus the syntactic role it plays; tools walk
//! trees through this without matching on every node kind.

use crate::{
    AssignScope, CallArgs, CaseKind, Element, ElementKind, Expr, ExprKind, LoopVars, StringPart,
};

/// The syntactic role of a node parameter.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ParameterRole {
    LeftOperand,
    RightOperand,
    Operand,
    Target,
    Key,
    Item,
    Argument,
    ArgumentName,
    Content,
    Fallback,
    BuiltInName,
    Condition,
    ListSource,
    LoopVariable,
    Value,
    AssignmentTarget,
    AssignmentOperator,
    AssignmentScope,
    Namespace,
    CallableName,
    ParameterName,
    ParameterDefault,
    CatchAll,
    Callee,
    BodyParameter,
    Message,
    Placeholder,
    EscapeExpression,
    OutputFormat,
    ElseContent,
    RecoverContent,
    CaseValue,
    Library,
}

/// What a parameter slot holds.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum NodeParam<'a> {
    Expr(&'a Expr),
    Name(&'a str),
    Text(&'a str),
    Body(&'a [Element]),
}

type Params<'a> = Vec<(ParameterRole, NodeParam<'a>)>;

impl Expr {
    pub fn parameters(&self) -> Params<'_> {
        use NodeParam as P;
        use ParameterRole as R;

        let mut out = Vec::new();
        match &self.kind {
            ExprKind::Literal(_) | ExprKind::Identifier(_) => {}
            ExprKind::Dot { target, key } => {
                out.push((R::Target, P::Expr(target)));
                out.push((R::Key, P::Name(key)));
            }
            ExprKind::DynamicKey { target, key } => {
                out.push((R::Target, P::Expr(target)));
                out.push((R::Key, P::Expr(key)));
            }
            ExprKind::Binary { left, right, .. } => {
                out.push((R::LeftOperand, P::Expr(left)));
                out.push((R::RightOperand, P::Expr(right)));
            }
            ExprKind::Unary { operand, .. } | ExprKind::Parenthetical(operand) => {
                out.push((R::Operand, P::Expr(operand)));
            }
            ExprKind::ListLiteral(items) => {
                out.extend(items.iter().map(|e| (R::Item, P::Expr(e))));
            }
            ExprKind::HashLiteral(entries) => {
                for (k, v) in entries {
                    out.push((R::Key, P::Expr(k)));
                    out.push((R::Value, P::Expr(v)));
                }
            }
            ExprKind::StringTemplate(parts) => {
                for part in parts {
                    out.push(match part {
                        StringPart::Text(t) => (R::Content, P::Text(t)),
                        StringPart::Interpolation(e) => (R::Placeholder, P::Expr(e)),
                    });
                }
            }
            ExprKind::Call { target, args } => {
                out.push((R::Callee, P::Expr(target)));
                out.extend(args.iter().map(|e| (R::Argument, P::Expr(e))));
            }
            ExprKind::BuiltIn {
                target,
                builtin,
                args,
            } => {
                out.push((R::Target, P::Expr(target)));
                out.push((R::BuiltInName, P::Name(builtin.name())));
                out.extend(args.iter().map(|e| (R::Argument, P::Expr(e))));
            }
            ExprKind::LoopVarQuery { variable, query } => {
                out.push((R::LoopVariable, P::Name(variable)));
                out.push((R::BuiltInName, P::Name(query.name())));
            }
            ExprKind::Default { target, fallback } => {
                out.push((R::Target, P::Expr(target)));
                if let Some(fallback) = fallback {
                    out.push((R::Fallback, P::Expr(fallback)));
                }
            }
            ExprKind::Exists(target) => out.push((R::Target, P::Expr(target))),
            ExprKind::Special(var) => out.push((R::Key, P::Name(var.name()))),
        }
        out
    }

    pub fn parameter_count(&self) -> usize {
        self.parameters().len()
    }

    pub fn parameter(&self, index: usize) -> Option<(ParameterRole, NodeParam<'_>)> {
        self.parameters().get(index).copied()
    }
}

fn push_loop_vars<'a>(out: &mut Params<'a>, vars: &'a LoopVars) {
    out.push((ParameterRole::LoopVariable, NodeParam::Name(&vars.item)));
    if let Some(value) = &vars.value {
        out.push((ParameterRole::LoopVariable, NodeParam::Name(value)));
    }
}

impl Element {
    pub fn parameters(&self) -> Params<'_> {
        use NodeParam as P;
        use ParameterRole as R;

        let mut out = Vec::new();
        match &self.kind {
            ElementKind::Text(t) => out.push((R::Content, P::Text(t))),
            ElementKind::Interpolation(e) => out.push((R::Content, P::Expr(e))),
            ElementKind::Sequence(body)
            | ElementKind::Sep(body)
            | ElementKind::NoEscape(body)
            | ElementKind::AutoEsc(body)
            | ElementKind::NoAutoEsc(body) => out.push((R::Content, P::Body(body))),
            ElementKind::If(branches) => {
                for branch in branches {
                    if let Some(c) = &branch.condition {
                        out.push((R::Condition, P::Expr(c)));
                        out.push((R::Content, P::Body(&branch.body)));
                    } else {
                        out.push((R::ElseContent, P::Body(&branch.body)));
                    }
                }
            }
            ElementKind::List(block) => {
                out.push((R::ListSource, P::Expr(&block.source)));
                if let Some(vars) = &block.loop_vars {
                    push_loop_vars(&mut out, vars);
                }
                out.push((R::Content, P::Body(&block.body)));
                if let Some(else_body) = &block.else_body {
                    out.push((R::ElseContent, P::Body(else_body)));
                }
            }
            ElementKind::Items { loop_vars, body } => {
                push_loop_vars(&mut out, loop_vars);
                out.push((R::Content, P::Body(body)));
            }
            ElementKind::Break | ElementKind::Continue => {}
            ElementKind::Return(value) => {
                if let Some(v) = value {
                    out.push((R::Value, P::Expr(v)));
                }
            }
            ElementKind::Stop(message) => {
                if let Some(m) = message {
                    out.push((R::Message, P::Expr(m)));
                }
            }
            ElementKind::Switch(block) => {
                out.push((R::Value, P::Expr(&block.value)));
                for case in &block.cases {
                    if case.kind != CaseKind::Default {
                        out.extend(case.values.iter().map(|v| (R::CaseValue, P::Expr(v))));
                    }
                    out.push((R::Content, P::Body(&case.body)));
                }
            }
            ElementKind::Assignment(assignment) => {
                out.push((
                    R::AssignmentScope,
                    P::Name(assignment.scope.directive()),
                ));
                for target in &assignment.targets {
                    out.push((R::AssignmentTarget, P::Name(&target.name)));
                    out.push((R::AssignmentOperator, P::Name(target.op.as_symbol())));
                    if let Some(v) = &target.value {
                        out.push((R::Value, P::Expr(v)));
                    }
                }
                if let Some(ns) = &assignment.namespace {
                    out.push((R::Namespace, P::Expr(ns)));
                }
            }
            ElementKind::Capture {
                scope,
                name,
                namespace,
                body,
            } => {
                out.push((R::AssignmentScope, P::Name(scope.directive())));
                out.push((R::AssignmentTarget, P::Name(name)));
                if let (Some(ns), AssignScope::Namespace | AssignScope::Global) = (namespace, scope)
                {
                    out.push((R::Namespace, P::Expr(ns)));
                }
                out.push((R::Content, P::Body(body)));
            }
            ElementKind::CallableDef(def) => {
                out.push((R::CallableName, P::Name(&def.name)));
                for p in &def.params {
                    out.push((R::ParameterName, P::Name(&p.name)));
                    if let Some(d) = &p.default {
                        out.push((R::ParameterDefault, P::Expr(d)));
                    }
                }
                if let Some(rest) = &def.catch_all {
                    out.push((R::CatchAll, P::Name(rest)));
                }
                out.push((R::Content, P::Body(&def.body)));
            }
            ElementKind::Call(site) => {
                out.push((R::Callee, P::Expr(&site.callee)));
                match &site.args {
                    CallArgs::Positional(args) => {
                        out.extend(args.iter().map(|a| (R::Argument, P::Expr(a))));
                    }
                    CallArgs::Named(args) => {
                        for (name, a) in args {
                            out.push((R::ArgumentName, P::Name(name)));
                            out.push((R::Argument, P::Expr(a)));
                        }
                    }
                }
                out.extend(site.body_params.iter().map(|p| (R::BodyParameter, P::Name(p))));
                if let Some(body) = &site.body {
                    out.push((R::Content, P::Body(body)));
                }
            }
            ElementKind::Nested(args) => {
                out.extend(args.iter().map(|a| (R::Argument, P::Expr(a))));
            }
            ElementKind::Import { library, namespace } => {
                out.push((R::Library, P::Expr(library)));
                out.push((R::Namespace, P::Name(namespace)));
            }
            ElementKind::Escape {
                variable,
                escape,
                body,
            } => {
                out.push((R::Placeholder, P::Name(variable)));
                out.push((R::EscapeExpression, P::Expr(escape)));
                out.push((R::Content, P::Body(body)));
            }
            ElementKind::OutputFormat { format, body } => {
                out.push((R::OutputFormat, P::Text(format)));
                out.push((R::Content, P::Body(body)));
            }
            ElementKind::Attempt { attempt, recover } => {
                out.push((R::Content, P::Body(attempt)));
                out.push((R::RecoverContent, P::Body(recover)));
            }
        }
        out
    }

    pub fn parameter_count(&self) -> usize {
        self.parameters().len()
    }

    pub fn parameter(&self, index: usize) -> Option<(ParameterRole, NodeParam<'_>)> {
        self.parameters().get(index).copied()
    }
}
