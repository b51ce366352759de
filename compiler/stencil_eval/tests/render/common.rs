//! Shared helpers for rendering tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use indexmap::IndexMap;
use stencil_eval::{
    init_tracing, render_to_string, Capabilities, EvalError, HostObject, RenderConfig, Rendered,
    Value,
};
use stencil_ir::{
    AssignOp, AssignScope, Assignment, AssignTarget, CallArgs, CallableDef, CallableKind, Element,
    ElementKind, Expr, Name, ParamDecl, Span, Template,
};

pub fn run(
    template: Template,
    config: RenderConfig,
    data: &[(&str, Value)],
) -> Result<Rendered, EvalError> {
    init_tracing();
    let data: IndexMap<String, Value> = data
        .iter()
        .map(|(name, value)| ((*name).to_owned(), value.clone()))
        .collect();
    render_to_string(&Arc::new(template), &Arc::new(config), data)
}

pub fn render_with(root: Vec<Element>, data: &[(&str, Value)]) -> String {
    run(Template::new("main.ftl", root), RenderConfig::default(), data)
        .unwrap()
        .output
}

pub fn render(root: Vec<Element>) -> String {
    render_with(root, &[])
}

pub fn render_err(root: Vec<Element>) -> EvalError {
    run(Template::new("main.ftl", root), RenderConfig::default(), &[]).unwrap_err()
}

pub fn render_html(root: Vec<Element>, data: &[(&str, Value)]) -> String {
    run(
        Template::new("page.html", root).with_output_format("HTML"),
        RenderConfig::default(),
        data,
    )
    .unwrap()
    .output
}

pub fn text(s: &str) -> Element {
    Element::text(s)
}

pub fn show(expr: Expr) -> Element {
    Element::interpolation(expr)
}

pub fn show_var(name: &str) -> Element {
    Element::interpolation(Expr::ident(name))
}

pub fn strings(items: &[&str]) -> Expr {
    Expr::list(items.iter().map(|s| Expr::string(s)).collect())
}

pub fn ints(items: &[i64]) -> Expr {
    Expr::list(items.iter().map(|&n| Expr::int(n)).collect())
}

pub fn def_macro(name: &str, params: Vec<ParamDecl>, body: Vec<Element>) -> CallableDef {
    CallableDef::new(name, CallableKind::Macro, params).with_body(body)
}

pub fn def_function(name: &str, params: Vec<ParamDecl>, body: Vec<Element>) -> CallableDef {
    CallableDef::new(name, CallableKind::Function, params).with_body(body)
}

pub fn call_positional(name: &str, args: Vec<Expr>) -> Element {
    Element::call(Expr::ident(name), CallArgs::Positional(args))
}

pub fn call_named(name: &str, args: &[(&str, Expr)]) -> Element {
    Element::call(Expr::ident(name), named(args))
}

pub fn named(args: &[(&str, Expr)]) -> CallArgs {
    CallArgs::Named(
        args.iter()
            .map(|(name, expr)| (Name::from(*name), expr.clone()))
            .collect(),
    )
}

pub fn returning(expr: Expr) -> Element {
    Element::new(ElementKind::Return(Some(expr)), Span::DUMMY)
}

pub fn update(scope: AssignScope, name: &str, op: AssignOp, value: Option<Expr>) -> Element {
    Element::new(
        ElementKind::Assignment(Assignment {
            scope,
            targets: vec![AssignTarget {
                name: Name::from(name),
                op,
                value,
            }],
            namespace: None,
        }),
        Span::DUMMY,
    )
}

pub fn local(name: &str, value: Expr) -> Element {
    Element::assign(AssignScope::Local, name, value)
}

/// Host function that returns how many times it has been called.
#[derive(Clone, Default)]
pub struct CallCounter {
    calls: Arc<AtomicUsize>,
}

impl CallCounter {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn value(&self) -> Value {
        Value::host(self.clone())
    }
}

impl HostObject for CallCounter {
    fn type_name(&self) -> &str {
        "counter"
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::CALLABLE
    }

    fn call(&self, _args: &[Value]) -> Result<Option<Value>, EvalError> {
        let previous = self.calls.fetch_add(1, Ordering::SeqCst);
        let count = i64::try_from(previous.saturating_add(1)).unwrap_or(i64::MAX);
        Ok(Some(Value::int(count)))
    }
}
