//! Macro and function invocation.
//!
//! Covers argument binding (positional, named, defaults, catch-all),
//! `?with_args`, `.args`, `#nested` and the call-depth limit.

use pretty_assertions::assert_eq;
use stencil_eval::RenderConfig;
use stencil_ir::{
    AssignScope, BinaryOp, BuiltInKind, CallArgs, Element, ElementKind, Expr, LoopQuery, LoopVars,
    ParamDecl, Span, SpecialVariable, Template,
};

use crate::common::{
    call_named, call_positional, def_function, def_macro, ints, local, named, render, render_err,
    render_with, returning, run, show, show_var, strings, text, CallCounter,
};

fn add(left: Expr, right: Expr) -> Expr {
    Expr::binary(BinaryOp::Add, left, right)
}

// -- Binding --

#[test]
fn named_arguments_defaults_and_nested_content() {
    let greet = def_macro(
        "greet",
        vec![
            ParamDecl::required("name"),
            ParamDecl::with_default("greeting", Expr::string("Hello")),
        ],
        vec![
            show_var("greeting"),
            text(", "),
            show_var("name"),
            Element::nested(Vec::new()),
            text("!"),
        ],
    );
    let out = render(vec![
        Element::define(greet),
        Element::call_with_body(
            Expr::ident("greet"),
            named(&[("name", Expr::string("World"))]),
            Vec::new(),
            vec![text(", nice day")],
        ),
    ]);
    assert_eq!(out, "Hello, World, nice day!");
}

#[test]
fn default_is_evaluated_only_when_argument_is_missing() {
    let counter = CallCounter::default();
    let m = def_macro(
        "m",
        vec![ParamDecl::with_default(
            "x",
            Expr::call(Expr::ident("tick"), Vec::new()),
        )],
        vec![show_var("x")],
    );
    let out = render_with(
        vec![
            Element::define(m),
            call_named("m", &[("x", Expr::int(5))]),
            call_named("m", &[]),
        ],
        &[("tick", counter.value())],
    );
    assert_eq!(out, "51");
    assert_eq!(counter.calls(), 1);
}

#[test]
fn defaults_may_refer_to_later_parameters() {
    let m = def_macro(
        "m",
        vec![
            ParamDecl::with_default("a", add(Expr::ident("b"), Expr::int(1))),
            ParamDecl::with_default("b", Expr::int(1)),
        ],
        vec![show_var("a"), text("-"), show_var("b")],
    );
    let out = render(vec![
        Element::define(m),
        call_named("m", &[]),
        text(" "),
        call_named("m", &[("b", Expr::int(10))]),
    ]);
    assert_eq!(out, "2-1 11-10");
}

#[test]
fn unresolvable_default_reports_the_invalid_reference() {
    let m = def_macro(
        "m",
        vec![ParamDecl::with_default(
            "a",
            add(Expr::ident("nothing"), Expr::int(1)),
        )],
        vec![show_var("a")],
    );
    let err = render_err(vec![Element::define(m), call_named("m", &[])]);
    assert_eq!(err.message, "nothing evaluated to no value");
    assert!(!err.notes.is_empty());
}

#[test]
fn missing_required_parameter() {
    let m = def_macro("m", vec![ParamDecl::required("x")], Vec::new());
    let err = render_err(vec![Element::define(m), call_named("m", &[])]);
    assert_eq!(
        err.message,
        "macro \"m\" requires parameter \"x\", but it was not supplied and has no usable default"
    );
}

#[test]
fn too_many_positional_arguments() {
    let m = def_macro("m", vec![ParamDecl::required("x")], Vec::new());
    let err = render_err(vec![
        Element::define(m),
        call_positional("m", vec![Expr::int(1), Expr::int(2)]),
    ]);
    assert_eq!(
        err.message,
        "macro \"m\" accepts only 1 positional argument, but argument #2 was supplied"
    );
}

#[test]
fn unknown_named_argument() {
    let m = def_macro("m", vec![ParamDecl::required("x")], Vec::new());
    let err = render_err(vec![
        Element::define(m),
        call_named("m", &[("x", Expr::int(1)), ("y", Expr::int(2))]),
    ]);
    assert_eq!(err.message, "macro \"m\" has no parameter named \"y\"");
}

// -- Catch-all --

#[test]
fn function_catch_all_collects_extra_positional_arguments() {
    let count = def_function(
        "count",
        vec![ParamDecl::required("first")],
        vec![returning(Expr::builtin(
            Expr::ident("rest"),
            BuiltInKind::Size,
            Vec::new(),
        ))],
    )
    .with_catch_all("rest");
    let out = render(vec![
        Element::define(count),
        show(Expr::call(
            Expr::ident("count"),
            vec![Expr::int(1), Expr::int(2), Expr::int(3)],
        )),
    ]);
    assert_eq!(out, "2");
}

#[test]
fn macro_catch_all_collects_extra_named_arguments() {
    let tag = def_macro(
        "tag",
        vec![ParamDecl::required("title")],
        vec![Element::list(
            Expr::ident("attrs"),
            Some(LoopVars::key_value("k", "v")),
            vec![show_var("k"), text("="), show_var("v"), text(";")],
        )],
    )
    .with_catch_all("attrs");
    let out = render(vec![
        Element::define(tag),
        call_named(
            "tag",
            &[
                ("title", Expr::string("T")),
                ("a", Expr::int(1)),
                ("b", Expr::int(2)),
            ],
        ),
    ]);
    assert_eq!(out, "a=1;b=2;");
}

#[test]
fn catch_all_rejects_mixed_extra_arguments() {
    let m = def_macro("m", vec![ParamDecl::required("a")], Vec::new()).with_catch_all("rest");
    let callee = Expr::builtin(
        Expr::ident("m"),
        BuiltInKind::WithArgs,
        vec![Expr::hash(vec![(Expr::string("z"), Expr::int(1))])],
    );
    let err = render_err(vec![
        Element::define(m),
        Element::call(
            callee,
            CallArgs::Positional(vec![Expr::int(1), Expr::int(2)]),
        ),
    ]);
    assert_eq!(
        err.message,
        "macro \"m\": catch-all parameter \"rest\" received both positional and named extra arguments"
    );
}

// -- ?with_args --

fn subtract_function() -> Element {
    Element::define(def_function(
        "sub",
        vec![ParamDecl::required("a"), ParamDecl::required("b")],
        vec![returning(Expr::binary(
            BinaryOp::Subtract,
            Expr::ident("a"),
            Expr::ident("b"),
        ))],
    ))
}

#[test]
fn with_args_prepends_and_with_args_last_appends() {
    let bound = |builtin| {
        Expr::call(
            Expr::builtin(Expr::ident("sub"), builtin, vec![ints(&[10])]),
            vec![Expr::int(3)],
        )
    };
    let out = render(vec![
        subtract_function(),
        show(bound(BuiltInKind::WithArgs)),
        text(" "),
        show(bound(BuiltInKind::WithArgsLast)),
    ]);
    assert_eq!(out, "7 -7");
}

#[test]
fn with_args_hash_is_rejected_for_functions() {
    let err = render_err(vec![
        subtract_function(),
        show(Expr::builtin(
            Expr::ident("sub"),
            BuiltInKind::WithArgs,
            vec![Expr::hash(vec![(Expr::string("a"), Expr::int(1))])],
        )),
    ]);
    assert_eq!(err.message, "?with_args with a hash is not supported for functions");
}

#[test]
fn call_site_named_arguments_win_over_bound_ones() {
    let m = def_macro(
        "m",
        vec![ParamDecl::required("a"), ParamDecl::required("b")],
        vec![show_var("a"), show_var("b")],
    );
    let callee = Expr::builtin(
        Expr::ident("m"),
        BuiltInKind::WithArgs,
        vec![Expr::hash(vec![
            (Expr::string("a"), Expr::string("x")),
            (Expr::string("b"), Expr::string("y")),
        ])],
    );
    let out = render(vec![
        Element::define(m),
        Element::call(callee, named(&[("b", Expr::string("z"))])),
    ]);
    assert_eq!(out, "xz");
}

// -- .args --

#[test]
fn function_args_snapshot_includes_defaults() {
    let f = def_function(
        "f",
        vec![
            ParamDecl::required("a"),
            ParamDecl::with_default("b", Expr::int(2)),
        ],
        vec![returning(Expr::builtin(
            Expr::special(SpecialVariable::Args),
            BuiltInKind::Size,
            Vec::new(),
        ))],
    )
    .requiring_args();
    let out = render(vec![
        Element::define(f),
        show(Expr::call(Expr::ident("f"), vec![Expr::int(1)])),
    ]);
    assert_eq!(out, "2");
}

#[test]
fn macro_args_snapshot_is_a_hash_in_declaration_order() {
    let m = def_macro(
        "m",
        vec![ParamDecl::required("a")],
        vec![Element::list(
            Expr::special(SpecialVariable::Args),
            Some(LoopVars::key_value("k", "v")),
            vec![show_var("k"), show_var("v")],
        )],
    )
    .with_catch_all("extra")
    .requiring_args();
    let out = render(vec![
        Element::define(m),
        call_named("m", &[("a", Expr::int(1)), ("c", Expr::int(3))]),
    ]);
    assert_eq!(out, "a1c3");
}

#[test]
fn macro_args_snapshot_rejects_positional_catch_all() {
    let m = def_macro("m", vec![ParamDecl::required("a")], Vec::new())
        .with_catch_all("rest")
        .requiring_args();
    let err = render_err(vec![
        Element::define(m),
        call_positional("m", vec![Expr::int(1), Expr::int(2)]),
    ]);
    assert_eq!(
        err.message,
        "macro \"m\" reads .args, so its catch-all parameter \"rest\" can only receive named arguments"
    );
}

// -- Functions --

#[test]
fn function_output_is_discarded() {
    let f = def_function(
        "f",
        Vec::new(),
        vec![text("junk"), returning(Expr::string("ok"))],
    );
    let out = render(vec![
        Element::define(f),
        show(Expr::call(Expr::ident("f"), Vec::new())),
    ]);
    assert_eq!(out, "ok");
}

#[test]
fn function_without_return_value_is_an_invalid_reference() {
    let f = def_function("f", Vec::new(), vec![text("junk")]);
    let err = render_err(vec![
        Element::define(f),
        show(Expr::call(Expr::ident("f"), Vec::new())),
    ]);
    assert_eq!(err.message, "f() evaluated to no value");
}

#[test]
fn macro_called_as_function_is_a_type_mismatch() {
    let m = def_macro("m", Vec::new(), Vec::new());
    let err = render_err(vec![
        Element::define(m),
        show(Expr::call(Expr::ident("m"), Vec::new())),
    ]);
    assert_eq!(err.message, "expected function, but m evaluated to macro");
}

#[test]
fn function_called_as_macro_is_a_type_mismatch() {
    let err = render_err(vec![subtract_function(), call_positional("sub", Vec::new())]);
    assert_eq!(err.message, "expected macro, but sub evaluated to function");
}

#[test]
fn host_callable_is_invoked() {
    let counter = CallCounter::default();
    let tick = Expr::call(Expr::ident("tick"), Vec::new());
    let out = render_with(
        vec![show(tick.clone()), show(tick)],
        &[("tick", counter.value())],
    );
    assert_eq!(out, "12");
}

#[test]
fn calling_a_string_fails() {
    let err = render_err(vec![
        Element::assign(AssignScope::Namespace, "s", Expr::string("x")),
        show(Expr::call(Expr::ident("s"), Vec::new())),
    ]);
    assert_eq!(err.message, "string is not callable");
}

// -- #nested --

#[test]
fn nested_content_sees_the_caller_locals() {
    let inner = def_macro(
        "inner",
        Vec::new(),
        vec![
            local("x", Expr::string("inner")),
            Element::nested(Vec::new()),
            show_var("x"),
        ],
    );
    let outer = def_macro(
        "outer",
        Vec::new(),
        vec![
            local("x", Expr::string("outer")),
            Element::call_with_body(
                Expr::ident("inner"),
                CallArgs::Positional(Vec::new()),
                Vec::new(),
                vec![show_var("x"), text("|")],
            ),
        ],
    );
    let out = render(vec![
        Element::define(inner),
        Element::define(outer),
        call_positional("outer", Vec::new()),
    ]);
    assert_eq!(out, "outer|inner");
}

#[test]
fn nested_parameters_bind_in_the_caller_body() {
    let each = def_macro(
        "each",
        vec![ParamDecl::required("items")],
        vec![Element::list(
            Expr::ident("items"),
            Some(LoopVars::item("i")),
            vec![Element::nested(vec![
                Expr::ident("i"),
                Expr::loop_query("i", LoopQuery::Counter),
            ])],
        )],
    );
    let out = render(vec![
        Element::define(each),
        Element::call_with_body(
            Expr::ident("each"),
            CallArgs::Positional(vec![strings(&["a", "b"])]),
            vec!["v".into(), "n".into()],
            vec![show_var("n"), show_var("v")],
        ),
    ]);
    assert_eq!(out, "1a2b");
}

#[test]
fn break_in_nested_content_leaves_the_callers_loop() {
    let twice = def_macro(
        "twice",
        Vec::new(),
        vec![Element::list(
            ints(&[1, 2]),
            Some(LoopVars::item("i")),
            vec![Element::nested(Vec::new())],
        )],
    );
    let out = render(vec![
        Element::define(twice),
        Element::list(
            ints(&[1, 2, 3]),
            Some(LoopVars::item("x")),
            vec![Element::call_with_body(
                Expr::ident("twice"),
                CallArgs::Positional(Vec::new()),
                Vec::new(),
                vec![show_var("x"), Element::new(ElementKind::Break, Span::DUMMY)],
            )],
        ),
        text("|"),
    ]);
    assert_eq!(out, "1|");
}

#[test]
fn return_in_nested_content_ends_the_calling_macro() {
    let inner = def_macro(
        "inner",
        Vec::new(),
        vec![text("a"), Element::nested(Vec::new()), text("b")],
    );
    let outer = def_macro(
        "outer",
        Vec::new(),
        vec![
            Element::call_with_body(
                Expr::ident("inner"),
                CallArgs::Positional(Vec::new()),
                Vec::new(),
                vec![text("n"), Element::new(ElementKind::Return(None), Span::DUMMY)],
            ),
            text("c"),
        ],
    );
    let out = render(vec![
        Element::define(inner),
        Element::define(outer),
        call_positional("outer", Vec::new()),
        text("|"),
    ]);
    assert_eq!(out, "an|");
}

#[test]
fn nested_without_call_body_fails() {
    let m = def_macro("m", Vec::new(), vec![Element::nested(Vec::new())]);
    let err = render_err(vec![Element::define(m), call_positional("m", Vec::new())]);
    assert_eq!(
        err.message,
        "#nested used in macro \"m\", but the call supplied no nested content"
    );
}

#[test]
fn nested_outside_macro_fails() {
    let err = render_err(vec![Element::nested(Vec::new())]);
    assert_eq!(err.message, "#nested can only be used inside a macro body");
}

// -- Misplaced directives and limits --

#[test]
fn return_outside_callable_fails() {
    let err = render_err(vec![returning(Expr::int(1))]);
    assert_eq!(err.message, "#return outside of a macro or function");
}

#[test]
fn bare_return_leaves_a_macro_early() {
    let m = def_macro(
        "m",
        Vec::new(),
        vec![
            text("a"),
            Element::new(ElementKind::Return(None), Span::DUMMY),
            text("b"),
        ],
    );
    let out = render(vec![Element::define(m), call_positional("m", Vec::new())]);
    assert_eq!(out, "a");
}

#[test]
fn local_outside_callable_fails() {
    let err = render_err(vec![local("x", Expr::int(1))]);
    assert_eq!(err.message, "#local outside of a macro or function");
}

#[test]
fn break_does_not_cross_a_macro_boundary() {
    let m = def_macro(
        "m",
        Vec::new(),
        vec![Element::new(ElementKind::Break, Span::DUMMY)],
    );
    let err = render_err(vec![
        Element::define(m),
        Element::list(
            ints(&[1, 2]),
            Some(LoopVars::item("x")),
            vec![call_positional("m", Vec::new())],
        ),
    ]);
    assert_eq!(err.message, "#break outside of a construct that can handle it");
    assert!(err.backtrace.is_some());
}

#[test]
fn call_depth_limit_is_enforced() {
    let rec = def_macro("rec", Vec::new(), vec![call_positional("rec", Vec::new())]);
    let config = RenderConfig::builder().max_call_depth(Some(8)).build();
    let err = run(
        Template::new("main.ftl", vec![
            Element::define(rec),
            call_positional("rec", Vec::new()),
        ]),
        config,
        &[],
    )
    .unwrap_err();
    assert_eq!(err.message, "maximum call depth exceeded (limit: 8)");
    assert!(err.backtrace.is_some());
}

#[test]
fn macros_are_callable_before_their_definition() {
    let m = def_macro("later", Vec::new(), vec![text("ok")]);
    let out = render(vec![call_positional("later", Vec::new()), Element::define(m)]);
    assert_eq!(out, "ok");
}

#[test]
fn null_argument_falls_back_to_the_default() {
    let m = def_macro(
        "m",
        vec![ParamDecl::with_default("x", Expr::string("dflt"))],
        vec![show_var("x")],
    );
    let out = render(vec![
        Element::define(m),
        call_named("m", &[("x", Expr::ident("missing"))]),
    ]);
    assert_eq!(out, "dflt");
}
