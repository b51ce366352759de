//! Canonical source rendering.
//!
//! Expressions render through `Display`; elements render with
//! [`Element::canonical_form`]. The output is template source that would parse
//! back to an equivalent tree, and is what diagnostics quote.

use std::fmt::{self, Write};

use crate::{
    AssignOp, AssignScope, CallArgs, CallableDef, CaseKind, Element, ElementKind, Expr, ExprKind,
    LoopVars, StringPart,
};

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            ExprKind::Literal(c) => write!(f, "{c}"),
            ExprKind::Identifier(name) => f.write_str(name),
            ExprKind::Dot { target, key } => write!(f, "{target}.{key}"),
            ExprKind::DynamicKey { target, key } => write!(f, "{target}[{key}]"),
            ExprKind::Binary { op, left, right } => {
                write!(f, "{left} {} {right}", op.as_symbol())
            }
            ExprKind::Unary { op, operand } => write!(f, "{}{operand}", op.as_symbol()),
            ExprKind::Parenthetical(inner) => write!(f, "({inner})"),
            ExprKind::ListLiteral(items) => {
                f.write_str("[")?;
                write_list(f, items)?;
                f.write_str("]")
            }
            ExprKind::HashLiteral(entries) => {
                f.write_str("{")?;
                for (i, (k, v)) in entries.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{k}: {v}")?;
                }
                f.write_str("}")
            }
            ExprKind::StringTemplate(parts) => {
                f.write_str("\"")?;
                for part in parts {
                    match part {
                        StringPart::Text(t) => {
                            let quoted = crate::Constant::Str(t.clone()).to_string();
                            f.write_str(&quoted[1..quoted.len() - 1])?;
                        }
                        StringPart::Interpolation(e) => write!(f, "${{{e}}}")?,
                    }
                }
                f.write_str("\"")
            }
            ExprKind::Call { target, args } => {
                write!(f, "{target}(")?;
                write_list(f, args)?;
                f.write_str(")")
            }
            ExprKind::BuiltIn {
                target,
                builtin,
                args,
            } => {
                write!(f, "{target}?{}", builtin.name())?;
                if !args.is_empty() {
                    f.write_str("(")?;
                    write_list(f, args)?;
                    f.write_str(")")?;
                }
                Ok(())
            }
            ExprKind::LoopVarQuery { variable, query } => {
                write!(f, "{variable}?{}", query.name())
            }
            ExprKind::Default { target, fallback } => match fallback {
                Some(fallback) => write!(f, "{target}!{fallback}"),
                None => write!(f, "{target}!"),
            },
            ExprKind::Exists(target) => write!(f, "{target}??"),
            ExprKind::Special(var) => write!(f, ".{}", var.name()),
        }
    }
}

fn write_list(f: &mut fmt::Formatter<'_>, items: &[Expr]) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{item}")?;
    }
    Ok(())
}

impl Element {
    /// Template source for this element and its children.
    pub fn canonical_form(&self) -> String {
        let mut out = String::new();
        // Writing into a String cannot fail.
        let _ = write_element(&mut out, self);
        out
    }
}

impl CallableDef {
    pub fn canonical_form(&self) -> String {
        let mut out = String::new();
        let _ = write_callable(&mut out, self);
        out
    }
}

fn write_body(out: &mut String, body: &[Element]) -> fmt::Result {
    for e in body {
        write_element(out, e)?;
    }
    Ok(())
}

fn write_loop_vars(out: &mut String, vars: &LoopVars) -> fmt::Result {
    match &vars.value {
        Some(value) => write!(out, " as {}, {value}", vars.item),
        None => write!(out, " as {}", vars.item),
    }
}

fn write_callable(out: &mut String, def: &CallableDef) -> fmt::Result {
    let tag = &def.kind.directive()[1..];
    write!(out, "<#{tag} {}", def.name)?;
    for p in &def.params {
        match &p.default {
            Some(d) => write!(out, " {}={d}", p.name)?,
            None => write!(out, " {}", p.name)?,
        }
    }
    if let Some(rest) = &def.catch_all {
        write!(out, " {rest}...")?;
    }
    out.push('>');
    write_body(out, &def.body)?;
    write!(out, "</#{tag}>")
}

fn write_element(out: &mut String, element: &Element) -> fmt::Result {
    match &element.kind {
        ElementKind::Text(t) => out.push_str(t),
        ElementKind::Interpolation(e) => write!(out, "${{{e}}}")?,
        ElementKind::Sequence(body) => write_body(out, body)?,
        ElementKind::If(branches) => {
            for (i, branch) in branches.iter().enumerate() {
                match (&branch.condition, i) {
                    (Some(c), 0) => write!(out, "<#if {c}>")?,
                    (Some(c), _) => write!(out, "<#elseif {c}>")?,
                    (None, _) => out.push_str("<#else>"),
                }
                write_body(out, &branch.body)?;
            }
            out.push_str("</#if>");
        }
        ElementKind::List(block) => {
            write!(out, "<#list {}", block.source)?;
            if let Some(vars) = &block.loop_vars {
                write_loop_vars(out, vars)?;
            }
            out.push('>');
            write_body(out, &block.body)?;
            if let Some(else_body) = &block.else_body {
                out.push_str("<#else>");
                write_body(out, else_body)?;
            }
            out.push_str("</#list>");
        }
        ElementKind::Items { loop_vars, body } => {
            out.push_str("<#items");
            write_loop_vars(out, loop_vars)?;
            out.push('>');
            write_body(out, body)?;
            out.push_str("</#items>");
        }
        ElementKind::Sep(body) => {
            out.push_str("<#sep>");
            write_body(out, body)?;
            out.push_str("</#sep>");
        }
        ElementKind::Break => out.push_str("<#break>"),
        ElementKind::Continue => out.push_str("<#continue>"),
        ElementKind::Return(value) => match value {
            Some(v) => write!(out, "<#return {v}>")?,
            None => out.push_str("<#return>"),
        },
        ElementKind::Stop(message) => match message {
            Some(m) => write!(out, "<#stop {m}>")?,
            None => out.push_str("<#stop>"),
        },
        ElementKind::Switch(block) => {
            write!(out, "<#switch {}>", block.value)?;
            for case in &block.cases {
                match case.kind {
                    CaseKind::Case | CaseKind::On => {
                        let tag = if case.kind == CaseKind::Case { "case" } else { "on" };
                        write!(out, "<#{tag} ")?;
                        for (i, v) in case.values.iter().enumerate() {
                            if i > 0 {
                                out.push_str(", ");
                            }
                            write!(out, "{v}")?;
                        }
                        out.push('>');
                    }
                    CaseKind::Default => out.push_str("<#default>"),
                }
                write_body(out, &case.body)?;
            }
            out.push_str("</#switch>");
        }
        ElementKind::Assignment(assignment) => {
            write!(out, "<#{}", assignment.scope.directive())?;
            for target in &assignment.targets {
                match (&target.op, &target.value) {
                    (AssignOp::Increment | AssignOp::Decrement, _) | (_, None) => {
                        write!(out, " {}{}", target.name, target.op.as_symbol())?;
                    }
                    (op, Some(v)) => write!(out, " {} {} {v}", target.name, op.as_symbol())?,
                }
            }
            if let Some(ns) = &assignment.namespace {
                write!(out, " in {ns}")?;
            }
            out.push('>');
        }
        ElementKind::Capture {
            scope,
            name,
            namespace,
            body,
        } => {
            write!(out, "<#{} {name}", scope.directive())?;
            if let (Some(ns), AssignScope::Namespace | AssignScope::Global) = (namespace, scope) {
                write!(out, " in {ns}")?;
            }
            out.push('>');
            write_body(out, body)?;
            write!(out, "</#{}>", scope.directive())?;
        }
        ElementKind::CallableDef(def) => write_callable(out, def)?,
        ElementKind::Call(site) => {
            write!(out, "<@{}", site.callee)?;
            match &site.args {
                CallArgs::Positional(args) => {
                    for a in args {
                        write!(out, " {a}")?;
                    }
                }
                CallArgs::Named(args) => {
                    for (name, a) in args {
                        write!(out, " {name}={a}")?;
                    }
                }
            }
            if !site.body_params.is_empty() {
                out.push(';');
                for (i, p) in site.body_params.iter().enumerate() {
                    out.push_str(if i == 0 { " " } else { ", " });
                    out.push_str(p);
                }
            }
            match &site.body {
                Some(body) => {
                    out.push('>');
                    write_body(out, body)?;
                    write!(out, "</@{}>", site.callee)?;
                }
                None => out.push_str("/>"),
            }
        }
        ElementKind::Nested(args) => {
            out.push_str("<#nested");
            for (i, a) in args.iter().enumerate() {
                out.push_str(if i == 0 { " " } else { ", " });
                write!(out, "{a}")?;
            }
            out.push('>');
        }
        ElementKind::Import { library, namespace } => {
            write!(out, "<#import {library} as {namespace}>")?;
        }
        ElementKind::Escape {
            variable,
            escape,
            body,
        } => {
            write!(out, "<#escape {variable} as {escape}>")?;
            write_body(out, body)?;
            out.push_str("</#escape>");
        }
        ElementKind::NoEscape(body) => {
            out.push_str("<#noescape>");
            write_body(out, body)?;
            out.push_str("</#noescape>");
        }
        ElementKind::AutoEsc(body) => {
            out.push_str("<#autoesc>");
            write_body(out, body)?;
            out.push_str("</#autoesc>");
        }
        ElementKind::NoAutoEsc(body) => {
            out.push_str("<#noautoesc>");
            write_body(out, body)?;
            out.push_str("</#noautoesc>");
        }
        ElementKind::OutputFormat { format, body } => {
            write!(out, "<#outputformat {}>", crate::Constant::Str(format.clone()))?;
            write_body(out, body)?;
            out.push_str("</#outputformat>");
        }
        ElementKind::Attempt { attempt, recover } => {
            out.push_str("<#attempt>");
            write_body(out, attempt)?;
            out.push_str("<#recover>");
            write_body(out, recover)?;
            out.push_str("</#attempt>");
        }
    }
    Ok(())
}
