//! Loops, `#switch`, `#stop`, `#attempt` and assignments.

use pretty_assertions::assert_eq;
use stencil_eval::{RenderConfig, RunOutcome, Value};
use stencil_ir::{
    AssignOp, AssignScope, CaseKind, Element, ElementKind, Expr, ListBlock, LoopQuery, LoopVars,
    Span, SpecialVariable, SwitchBlock, SwitchCase, Template,
};

use crate::common::{
    call_positional, def_macro, ints, render, render_err, render_with, run, show, show_var,
    strings, text, update,
};

fn each(source: Expr, var: &str, body: Vec<Element>) -> Element {
    Element::list(source, Some(LoopVars::item(var)), body)
}

fn sep(body: Vec<Element>) -> Element {
    Element::new(ElementKind::Sep(body), Span::DUMMY)
}

fn brk() -> Element {
    Element::new(ElementKind::Break, Span::DUMMY)
}

fn cont() -> Element {
    Element::new(ElementKind::Continue, Span::DUMMY)
}

fn stop(message: &str) -> Element {
    Element::new(ElementKind::Stop(Some(Expr::string(message))), Span::DUMMY)
}

fn switch(value: Expr, cases: Vec<SwitchCase>) -> Element {
    Element::new(ElementKind::Switch(SwitchBlock { value, cases }), Span::DUMMY)
}

fn case(kind: CaseKind, value: Option<i64>, body: Vec<Element>) -> SwitchCase {
    SwitchCase {
        kind,
        values: value.map(Expr::int).into_iter().collect(),
        body,
    }
}

fn attempt(attempt: Vec<Element>, recover: Vec<Element>) -> Element {
    Element::new(ElementKind::Attempt { attempt, recover }, Span::DUMMY)
}

// -- #list --

#[test]
fn list_with_separator() {
    let out = render(vec![each(
        strings(&["a", "b", "c"]),
        "x",
        vec![show_var("x"), sep(vec![text(", ")])],
    )]);
    assert_eq!(out, "a, b, c");
}

#[test]
fn list_else_runs_for_empty_source() {
    let list = Element::new(
        ElementKind::List(ListBlock {
            source: ints(&[]),
            loop_vars: Some(LoopVars::item("x")),
            body: vec![show_var("x")],
            else_body: Some(vec![text("none")]),
        }),
        Span::DUMMY,
    );
    assert_eq!(render(vec![list]), "none");
}

#[test]
fn loop_queries() {
    let out = render(vec![each(
        strings(&["a", "b", "c"]),
        "x",
        vec![
            show(Expr::loop_query("x", LoopQuery::Counter)),
            show(Expr::loop_query("x", LoopQuery::ItemParity)),
            sep(vec![text(" ")]),
        ],
    )]);
    assert_eq!(out, "1odd 2even 3odd");
}

#[test]
fn items_iterates_the_enclosing_list() {
    let list = Element::list(
        strings(&["a", "b"]),
        None,
        vec![
            text("["),
            Element::new(
                ElementKind::Items {
                    loop_vars: LoopVars::item("x"),
                    body: vec![show_var("x"), sep(vec![text(",")])],
                },
                Span::DUMMY,
            ),
            text("]"),
        ],
    );
    assert_eq!(render(vec![list]), "[a,b]");

    let empty = Element::list(ints(&[]), None, vec![text("[]")]);
    assert_eq!(render(vec![empty]), "");
}

#[test]
fn items_outside_list_fails() {
    let err = render_err(vec![Element::new(
        ElementKind::Items {
            loop_vars: LoopVars::item("x"),
            body: Vec::new(),
        },
        Span::DUMMY,
    )]);
    assert_eq!(
        err.message,
        "#items can only be used inside a #list without loop variables"
    );
}

#[test]
fn hash_iterates_as_key_value_pairs() {
    let hash = Value::hash_from([("one", Value::int(1)), ("two", Value::int(2))]);
    let out = render_with(
        vec![Element::list(
            Expr::ident("h"),
            Some(LoopVars::key_value("k", "v")),
            vec![show_var("k"), text("="), show_var("v"), sep(vec![text("&")])],
        )],
        &[("h", hash)],
    );
    assert_eq!(out, "one=1&two=2");
}

#[test]
fn break_and_continue_in_list() {
    let out = render(vec![each(
        ints(&[1, 2, 3, 4, 5]),
        "n",
        vec![
            Element::if_else(
                Expr::binary(stencil_ir::BinaryOp::Equal, Expr::ident("n"), Expr::int(2)),
                vec![cont()],
                None,
            ),
            Element::if_else(
                Expr::binary(stencil_ir::BinaryOp::Equal, Expr::ident("n"), Expr::int(4)),
                vec![brk()],
                None,
            ),
            show_var("n"),
        ],
    )]);
    assert_eq!(out, "13");
}

#[test]
fn break_leaves_only_the_innermost_list() {
    let out = render(vec![each(
        ints(&[1, 2]),
        "a",
        vec![
            each(ints(&[7, 8]), "b", vec![show_var("b"), brk()]),
            show_var("a"),
        ],
    )]);
    assert_eq!(out, "7172");
}

#[test]
fn sep_outside_loop_fails() {
    let err = render_err(vec![sep(vec![text(",")])]);
    assert_eq!(err.message, "#sep can only be used inside #list or #items");
}

#[test]
fn break_at_top_level_fails() {
    let err = render_err(vec![brk()]);
    assert_eq!(err.message, "#break outside of a construct that can handle it");
}

// -- #switch --

#[test]
fn break_in_switch_leaves_the_switch_not_the_list() {
    let out = render(vec![each(
        ints(&[1, 2, 3]),
        "n",
        vec![switch(
            Expr::ident("n"),
            vec![
                case(CaseKind::Case, Some(2), vec![text("two"), brk()]),
                case(CaseKind::Default, None, vec![show_var("n")]),
            ],
        )],
    )]);
    assert_eq!(out, "1two3");
}

#[test]
fn continue_in_switch_continues_the_list() {
    let out = render(vec![each(
        ints(&[1, 2, 3]),
        "n",
        vec![
            switch(
                Expr::ident("n"),
                vec![
                    case(CaseKind::Case, Some(2), vec![cont()]),
                    case(CaseKind::Default, None, vec![show_var("n")]),
                ],
            ),
            text(";"),
        ],
    )]);
    assert_eq!(out, "1;3;");
}

#[test]
fn case_falls_through_and_on_does_not() {
    let with_case = switch(
        Expr::int(1),
        vec![
            case(CaseKind::Case, Some(1), vec![text("a")]),
            case(CaseKind::Case, Some(2), vec![text("b")]),
            case(CaseKind::Default, None, vec![text("d")]),
        ],
    );
    assert_eq!(render(vec![with_case]), "abd");

    let with_on = switch(
        Expr::int(1),
        vec![
            case(CaseKind::On, Some(1), vec![text("a")]),
            case(CaseKind::On, Some(2), vec![text("b")]),
            case(CaseKind::Default, None, vec![text("d")]),
        ],
    );
    assert_eq!(render(vec![with_on]), "a");
}

#[test]
fn switch_without_match_or_default_writes_nothing() {
    let out = render(vec![switch(
        Expr::int(9),
        vec![case(CaseKind::Case, Some(1), vec![text("a")])],
    )]);
    assert_eq!(out, "");
}

// -- #stop --

#[test]
fn stop_inside_macro_ends_the_run() {
    let m = def_macro(
        "m",
        Vec::new(),
        vec![each(
            ints(&[1, 2, 3]),
            "n",
            vec![
                Element::if_else(
                    Expr::binary(stencil_ir::BinaryOp::Equal, Expr::ident("n"), Expr::int(2)),
                    vec![stop("halt")],
                    None,
                ),
                show_var("n"),
            ],
        )],
    );
    let rendered = run(
        Template::new(
            "main.ftl",
            vec![
                Element::define(m),
                call_positional("m", Vec::new()),
                text("after"),
            ],
        ),
        RenderConfig::default(),
        &[],
    )
    .unwrap();
    assert_eq!(rendered.output, "1");
    assert_eq!(rendered.outcome, RunOutcome::Stopped(Some("halt".to_owned())));
}

#[test]
fn stop_passes_through_attempt() {
    let rendered = run(
        Template::new(
            "main.ftl",
            vec![attempt(
                vec![text("kept"), stop("done")],
                vec![text("recovered")],
            )],
        ),
        RenderConfig::default(),
        &[],
    )
    .unwrap();
    assert_eq!(rendered.output, "");
    assert_eq!(rendered.outcome, RunOutcome::Stopped(Some("done".to_owned())));
}

// -- #attempt --

#[test]
fn attempt_discards_partial_output_and_exposes_the_error() {
    let out = render(vec![
        text("<"),
        attempt(
            vec![text("partial"), show_var("missing")],
            vec![
                text("fallback: "),
                show(Expr::special(SpecialVariable::Error)),
            ],
        ),
        text(">"),
    ]);
    assert_eq!(out, "<fallback: missing evaluated to no value>");
}

#[test]
fn break_through_attempt_drops_its_buffered_output() {
    let out = render(vec![each(
        ints(&[1, 2]),
        "n",
        vec![
            text("["),
            attempt(vec![show_var("n"), brk()], vec![text("recovered")]),
            text("]"),
        ],
    )]);
    assert_eq!(out, "[");
}

#[test]
fn successful_attempt_keeps_its_output() {
    let out = render(vec![attempt(vec![text("fine")], vec![text("recovered")])]);
    assert_eq!(out, "fine");
}

#[test]
fn error_in_recover_propagates() {
    let err = render_err(vec![attempt(vec![show_var("a")], vec![show_var("b")])]);
    assert_eq!(err.message, "b evaluated to no value");
}

// -- Assignments --

#[test]
fn compound_assignments() {
    let out = render(vec![
        Element::assign(AssignScope::Namespace, "x", Expr::int(1)),
        update(AssignScope::Namespace, "x", AssignOp::AddAssign, Some(Expr::int(4))),
        update(AssignScope::Namespace, "x", AssignOp::MulAssign, Some(Expr::int(3))),
        update(AssignScope::Namespace, "x", AssignOp::Increment, None),
        show_var("x"),
        text(" "),
        Element::assign(AssignScope::Namespace, "s", Expr::string("ab")),
        update(AssignScope::Namespace, "s", AssignOp::AddAssign, Some(Expr::string("c"))),
        show_var("s"),
    ]);
    assert_eq!(out, "16 abc");
}

#[test]
fn compound_assignment_to_missing_variable_fails() {
    let err = render_err(vec![update(
        AssignScope::Namespace,
        "nope",
        AssignOp::Increment,
        None,
    )]);
    assert_eq!(err.message, "nope evaluated to no value");
}

#[test]
fn capture_binds_rendered_text() {
    let out = render(vec![
        Element::new(
            ElementKind::Capture {
                scope: AssignScope::Namespace,
                name: "c".into(),
                namespace: None,
                body: vec![text("hi "), show(Expr::int(2))],
            },
            Span::DUMMY,
        ),
        show_var("c"),
        show_var("c"),
    ]);
    assert_eq!(out, "hi 2hi 2");
}

#[test]
fn global_assignment_is_visible_everywhere() {
    let m = def_macro("m", Vec::new(), vec![show_var("g")]);
    let out = render(vec![
        Element::define(m),
        Element::assign(AssignScope::Global, "g", Expr::string("G")),
        call_positional("m", Vec::new()),
    ]);
    assert_eq!(out, "G");
}
