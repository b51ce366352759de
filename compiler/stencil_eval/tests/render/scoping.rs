//! Variable tiers, special variables, `#import` and constant folding.

use std::sync::Arc;

use pretty_assertions::assert_eq;
use stencil_eval::{
    buffer_sink, CallableValue, EnvironmentBuilder, NamespaceId, RenderConfig, RunOutcome,
    StaticLibraries, Value,
};
use stencil_ir::{
    AssignScope, BinaryOp, BuiltInKind, CallArgs, Element, ElementKind, Expr, LoopVars, ParamDecl, Span,
    SpecialVariable, Template,
};

use crate::common::{
    call_positional, def_function, def_macro, ints, local, render, render_err, render_with,
    returning, run, show, show_var, text, CallCounter,
};

fn import(library: &str, namespace: &str) -> Element {
    Element::new(
        ElementKind::Import {
            library: Expr::string(library),
            namespace: namespace.into(),
        },
        Span::DUMMY,
    )
}

fn with_libraries(libraries: StaticLibraries) -> RenderConfig {
    RenderConfig::builder()
        .libraries(Arc::new(libraries))
        .build()
}

fn c(expr: Expr) -> Element {
    show(Expr::builtin(expr, BuiltInKind::C, Vec::new()))
}

// -- Lookup --

#[test]
fn assignment_shadows_data_model_and_shared_variables() {
    let config = RenderConfig::builder()
        .shared_variable("site", Value::string("shared"))
        .shared_variable("x", Value::string("shared-x"))
        .build();
    let rendered = run(
        Template::new(
            "main.ftl",
            vec![
                show_var("x"),
                text(" "),
                show_var("site"),
                text(" "),
                Element::assign(AssignScope::Namespace, "x", Expr::string("assigned")),
                show_var("x"),
            ],
        ),
        config,
        &[("x", Value::string("data"))],
    )
    .unwrap();
    assert_eq!(rendered.output, "data shared assigned");
}

#[test]
fn locals_shadow_namespace_variables_inside_a_macro() {
    let m = def_macro(
        "m",
        vec![ParamDecl::required("x")],
        vec![
            show_var("x"),
            local("y", Expr::string("local-y")),
            show_var("y"),
        ],
    );
    let out = render(vec![
        Element::assign(AssignScope::Namespace, "x", Expr::string("ns-x")),
        Element::assign(AssignScope::Namespace, "y", Expr::string("ns-y")),
        Element::define(m),
        call_positional("m", vec![Expr::string("arg-x")]),
        text(" "),
        show_var("x"),
        show_var("y"),
    ]);
    assert_eq!(out, "arg-xlocal-y ns-xns-y");
}

#[test]
fn loop_variable_shadows_and_is_gone_after_the_loop() {
    let out = render(vec![
        Element::assign(AssignScope::Namespace, "n", Expr::string("outer")),
        Element::list(ints(&[1, 2]), Some(LoopVars::item("n")), vec![show_var("n")]),
        show_var("n"),
    ]);
    assert_eq!(out, "12outer");
}

#[test]
fn default_and_exists_operators() {
    let out = render_with(
        vec![
            show(Expr::default_to(Expr::ident("missing"), Some(Expr::string("d")))),
            c(Expr::exists(Expr::ident("missing"))),
            c(Expr::exists(Expr::ident("present"))),
            c(Expr::builtin(
                Expr::ident("missing"),
                BuiltInKind::HasContent,
                Vec::new(),
            )),
            c(Expr::builtin(
                Expr::ident("empty"),
                BuiltInKind::HasContent,
                Vec::new(),
            )),
            show(Expr::default_to(
                Expr::dot(Expr::ident("present"), "nope"),
                Some(Expr::string("k")),
            )),
        ],
        &[
            ("present", Value::hash_from([("a", Value::int(1))])),
            ("empty", Value::string("")),
        ],
    );
    assert_eq!(out, "dfalsetruefalsefalsek");
}

#[test]
fn default_does_not_hide_errors_raised_inside_a_call() {
    let f = def_function("f", Vec::new(), vec![returning(Expr::ident("nothing"))]);
    let err = render_err(vec![
        Element::define(f),
        show(Expr::default_to(
            Expr::call(Expr::ident("f"), Vec::new()),
            Some(Expr::string("d")),
        )),
    ]);
    assert_eq!(err.message, "nothing evaluated to no value");
    assert!(err.backtrace.is_some());
}

#[test]
fn namespace_from_another_run_is_an_error() {
    let foreign = Value::Namespace(NamespaceId::new(7));
    let read = Expr::binary(
        BinaryOp::Add,
        Expr::dot(Expr::ident("ns"), "x"),
        Expr::string(""),
    );
    let err = run(
        Template::new("main.ftl", vec![show(read)]),
        RenderConfig::default(),
        &[("ns", foreign.clone())],
    )
    .unwrap_err();
    assert_eq!(err.message, "namespace #7 does not belong to this run");

    let size = Expr::builtin(Expr::ident("ns"), BuiltInKind::Size, Vec::new());
    let err = run(
        Template::new("main.ftl", vec![show(size)]),
        RenderConfig::default(),
        &[("ns", foreign)],
    )
    .unwrap_err();
    assert_eq!(err.message, "namespace #7 does not belong to this run");
}

#[test]
fn callable_bound_to_another_runs_namespace_is_not_invoked() {
    let m = def_macro("m", Vec::new(), vec![text("body")]);
    let foreign = Value::Callable(CallableValue::new(Arc::new(m), NamespaceId::new(7)));
    let err = run(
        Template::new("main.ftl", vec![call_positional("m", Vec::new())]),
        RenderConfig::default(),
        &[("m", foreign)],
    )
    .unwrap_err();
    assert_eq!(err.message, "namespace #7 does not belong to this run");
}

#[test]
fn globals_and_locals_special_variables() {
    let m = def_macro(
        "m",
        vec![ParamDecl::required("a")],
        vec![
            local("b", Expr::int(2)),
            c(Expr::builtin(
                Expr::special(SpecialVariable::Locals),
                BuiltInKind::Size,
                Vec::new(),
            )),
        ],
    );
    let out = render(vec![
        Element::define(m),
        Element::assign(AssignScope::Global, "g", Expr::string("G")),
        Element::assign(AssignScope::Namespace, "g", Expr::string("main-g")),
        show(Expr::dot(Expr::special(SpecialVariable::Globals), "g")),
        show(Expr::dot(Expr::special(SpecialVariable::Main), "g")),
        call_positional("m", vec![Expr::int(1)]),
    ]);
    assert_eq!(out, "Gmain-g2");
}

// -- #import --

fn library() -> Template {
    Template::new(
        "lib.ftl",
        vec![
            Element::assign(AssignScope::Namespace, "x", Expr::string("lib-x")),
            Element::define(def_macro(
                "hello",
                Vec::new(),
                vec![text("hello "), show_var("x")],
            )),
            text("ignored"),
            show(Expr::call(Expr::ident("tick"), Vec::new())),
        ],
    )
}

#[test]
fn import_binds_a_namespace_and_runs_the_library_once() {
    let counter = CallCounter::default();
    let config = with_libraries(StaticLibraries::new().with("lib", library()));
    let rendered = run(
        Template::new(
            "main.ftl",
            vec![
                Element::assign(AssignScope::Namespace, "x", Expr::string("main-x")),
                import("lib", "l"),
                import("lib", "again"),
                Element::call(
                    Expr::dot(Expr::ident("l"), "hello"),
                    CallArgs::Positional(Vec::new()),
                ),
                text(" "),
                show(Expr::dot(Expr::ident("again"), "x")),
                text(" "),
                show_var("x"),
            ],
        ),
        config,
        &[("tick", counter.value())],
    )
    .unwrap();
    assert_eq!(rendered.output, "hello lib-x lib-x main-x");
    assert_eq!(counter.calls(), 1);
}

#[test]
fn import_of_unknown_library_fails() {
    let err = run(
        Template::new("main.ftl", vec![import("nope", "n")]),
        with_libraries(StaticLibraries::new()),
        &[],
    )
    .unwrap_err();
    assert_eq!(
        err.message,
        "failed to import \"nope\": library \"nope\" not found"
    );
}

#[test]
fn stop_in_a_library_ends_the_run() {
    let lib = Template::new(
        "lib.ftl",
        vec![Element::new(ElementKind::Stop(None), Span::DUMMY)],
    );
    let rendered = run(
        Template::new("main.ftl", vec![text("a"), import("lib", "l"), text("b")]),
        with_libraries(StaticLibraries::new().with("lib", lib)),
        &[],
    )
    .unwrap();
    assert_eq!(rendered.output, "a");
    assert_eq!(rendered.outcome, RunOutcome::Stopped(None));
}

// -- Constant folding --

#[test]
fn constant_subtrees_are_folded_across_runs() {
    let template = Arc::new(Template::new(
        "main.ftl",
        vec![Element::list(
            ints(&[1, 2, 3]),
            Some(LoopVars::item("n")),
            vec![show(Expr::binary(
                stencil_ir::BinaryOp::Multiply,
                Expr::int(6),
                Expr::int(7),
            ))],
        )],
    ));
    let config = Arc::new(RenderConfig::default());

    let mut counts = Vec::new();
    for _ in 0..2 {
        let sink = buffer_sink();
        let mut env = EnvironmentBuilder::new(Arc::clone(&template), Arc::clone(&config))
            .sink(Arc::clone(&sink))
            .build()
            .unwrap();
        assert_eq!(env.process().unwrap(), RunOutcome::Completed);
        assert_eq!(sink.take(), "424242");
        counts.push(env.counters().expressions_evaluated);
    }
    assert!(counts[1] < counts[0], "{counts:?}");
}
