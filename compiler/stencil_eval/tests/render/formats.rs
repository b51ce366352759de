//! Output formats, auto-escaping and markup values.

use pretty_assertions::assert_eq;
use stencil_eval::{RenderConfig, Value};
use stencil_format::{MarkupFormat, OutputFormat};
use stencil_ir::{
    AutoEscapingPolicy, BinaryOp, BuiltInKind, Element, ElementKind, Expr, Name, Span,
    SpecialVariable, StringPart, Template,
};

use crate::common::{render, render_err, render_html, render_with, run, show, show_var, text};

fn html_markup(markup: &str) -> Value {
    Value::Markup(MarkupFormat::Html.from_markup(markup))
}

fn output_format(name: &str, body: Vec<Element>) -> Element {
    Element::new(
        ElementKind::OutputFormat {
            format: name.into(),
            body,
        },
        Span::DUMMY,
    )
}

fn no_auto_esc(body: Vec<Element>) -> Element {
    Element::new(ElementKind::NoAutoEsc(body), Span::DUMMY)
}

fn builtin(target: Expr, builtin: BuiltInKind) -> Expr {
    Expr::builtin(target, builtin, Vec::new())
}

// -- Auto-escaping --

#[test]
fn html_escapes_interpolated_strings() {
    let out = render_html(vec![show_var("s")], &[("s", Value::string("<b> & 'q'"))]);
    assert_eq!(out, "&lt;b&gt; &amp; &#39;q&#39;");
}

#[test]
fn static_text_is_never_escaped() {
    let out = render_html(
        vec![text("<p>"), show_var("s"), text("</p>")],
        &[("s", Value::string("<"))],
    );
    assert_eq!(out, "<p>&lt;</p>");
}

#[test]
fn noautoesc_turns_escaping_off_for_its_body() {
    let out = render_html(
        vec![
            no_auto_esc(vec![show_var("s")]),
            show_var("s"),
        ],
        &[("s", Value::string("<"))],
    );
    assert_eq!(out, "<&lt;");
}

#[test]
fn disabled_policy_does_not_escape() {
    let rendered = run(
        Template::new("page.html", vec![show_var("s")])
            .with_output_format("HTML")
            .with_auto_escaping(AutoEscapingPolicy::Disable),
        RenderConfig::default(),
        &[("s", Value::string("<"))],
    )
    .unwrap();
    assert_eq!(rendered.output, "<");
}

#[test]
fn auto_esc_special_variable_reports_the_current_state() {
    let flag = || show(builtin(Expr::special(SpecialVariable::AutoEsc), BuiltInKind::C));
    let out = render_html(vec![flag(), text(" "), no_auto_esc(vec![flag()])], &[]);
    assert_eq!(out, "true false");
}

#[test]
fn plain_text_output_is_not_escaped() {
    let out = render_with(vec![show_var("s")], &[("s", Value::string("<b>"))]);
    assert_eq!(out, "<b>");
}

// -- Markup values --

#[test]
fn markup_of_the_output_format_is_written_as_is() {
    let out = render_html(vec![show_var("m")], &[("m", html_markup("<i>x</i>"))]);
    assert_eq!(out, "<i>x</i>");
}

#[test]
fn foreign_markup_without_source_text_cannot_be_mixed() {
    let rtf = Value::Markup(MarkupFormat::Rtf.from_markup("{\\b x}"));
    let err = run(
        Template::new("page.html", vec![show_var("m")]).with_output_format("HTML"),
        RenderConfig::default(),
        &[("m", rtf)],
    )
    .unwrap_err();
    assert_eq!(
        err.message,
        "a markup value of format \"RTF\" cannot be inserted into output of format \"HTML\""
    );
}

#[test]
fn foreign_markup_with_source_text_is_re_escaped() {
    let rtf = Value::Markup(MarkupFormat::Rtf.from_plain_text("<{x}>"));
    let out = render_html(vec![show_var("m")], &[("m", rtf)]);
    assert_eq!(out, "&lt;{x}&gt;");
}

#[test]
fn no_esc_writes_the_string_as_markup() {
    let out = render_html(
        vec![show(builtin(Expr::ident("s"), BuiltInKind::NoEsc))],
        &[("s", Value::string("<br>"))],
    );
    assert_eq!(out, "<br>");
}

#[test]
fn esc_outside_markup_format_fails() {
    let err = run(
        Template::new("notes.txt", vec![show(builtin(Expr::string("x"), BuiltInKind::Esc))])
            .with_output_format("plainText"),
        RenderConfig::default(),
        &[],
    )
    .unwrap_err();
    assert_eq!(
        err.message,
        "?esc can only be used inside a markup output format (current format is plainText)"
    );
}

#[test]
fn markup_string_exposes_the_markup_text() {
    let out = render_html(
        vec![show(builtin(Expr::ident("m"), BuiltInKind::MarkupString))],
        &[("m", html_markup("<b>"))],
    );
    assert_eq!(out, "&lt;b&gt;");
}

#[test]
fn string_plus_markup_is_markup() {
    let sum = Expr::binary(BinaryOp::Add, Expr::string("<"), Expr::ident("m"));
    let out = render_html(vec![show(sum)], &[("m", html_markup("<b>"))]);
    assert_eq!(out, "&lt;<b>");
}

#[test]
fn markup_plus_foreign_markup_uses_whichever_side_has_source_text() {
    let sum = Expr::binary(BinaryOp::Add, Expr::ident("a"), Expr::ident("b"));
    let out = render_html(
        vec![show(sum)],
        &[
            ("a", Value::Markup(MarkupFormat::Rtf.from_plain_text("a<"))),
            ("b", html_markup("<b>x</b>")),
        ],
    );
    assert_eq!(out, "a&lt;<b>x</b>");
}

#[test]
fn markup_only_values_of_different_formats_cannot_be_added() {
    let sum = Expr::binary(BinaryOp::Add, Expr::ident("a"), Expr::ident("b"));
    let err = run(
        Template::new("page.html", vec![show(sum)]).with_output_format("HTML"),
        RenderConfig::default(),
        &[
            ("a", Value::Markup(MarkupFormat::Rtf.from_markup("{\\b x}"))),
            ("b", html_markup("<b>x</b>")),
        ],
    )
    .unwrap_err();
    assert_eq!(
        err.message,
        "a markup value of format \"HTML\" cannot be inserted into output of format \"RTF\""
    );
}

// -- #outputformat --

#[test]
fn output_format_block_switches_format() {
    let out = render_with(
        vec![
            output_format("HTML", vec![show_var("s")]),
            show_var("s"),
        ],
        &[("s", Value::string("<"))],
    );
    assert_eq!(out, "&lt;<");
}

#[test]
fn markup_format_inside_markup_format_switches() {
    let name_and_quote = || {
        vec![
            show(Expr::special(SpecialVariable::OutputFormat)),
            show(Expr::string("'")),
        ]
    };
    let mut body = name_and_quote();
    body.push(text(" "));
    body.push(output_format("XML", name_and_quote()));
    body.push(text(" "));
    body.extend(name_and_quote());
    let out = render_html(body, &[]);
    assert_eq!(out, "HTML&#39; XML&apos; HTML&#39;");
}

#[test]
fn braced_name_nests_into_the_current_format() {
    let out = render_html(
        vec![output_format(
            "{RTF}",
            vec![
                show(Expr::special(SpecialVariable::OutputFormat)),
                text(" "),
                show_var("s"),
            ],
        )],
        &[("s", Value::string("{<}"))],
    );
    assert_eq!(out, "HTML\\{RTF\\} \\{&lt;\\}");
}

#[test]
fn braced_name_outside_markup_fails() {
    let err = render_err(vec![output_format("{HTML}", Vec::new())]);
    assert_eq!(
        err.message,
        "\"{HTML}\" nests into the current format, which must be a markup format (current format is undefined)"
    );
}

#[test]
fn explicit_combined_name_escapes_inner_then_outer() {
    let out = render(vec![output_format(
        "XML{HTML}",
        vec![show(Expr::string("'"))],
    )]);
    assert_eq!(out, "&amp;#39;");
}

#[test]
fn custom_format_escapes_with_its_own_escaper() {
    let shout = MarkupFormat::custom("shout", "text/x-shout", |text| text.to_uppercase());
    let config = RenderConfig::builder()
        .custom_format(OutputFormat::Markup(shout))
        .build();
    let rendered = run(
        Template::new(
            "main.ftl",
            vec![
                output_format(
                    "shout",
                    vec![
                        show(Expr::special(SpecialVariable::OutputFormat)),
                        text(" "),
                        show_var("s"),
                    ],
                ),
                text(" "),
                show_var("s"),
            ],
        ),
        config,
        &[("s", Value::string("hey"))],
    )
    .unwrap();
    assert_eq!(rendered.output, "SHOUT HEY hey");
}

#[test]
fn unknown_output_format_fails() {
    let err = run(
        Template::new("main.ftl", vec![output_format("nope", Vec::new())]),
        RenderConfig::default(),
        &[],
    )
    .unwrap_err();
    assert_eq!(err.message, "unregistered output format: \"nope\"");
}

// -- #escape --

#[test]
fn escape_block_rewrites_interpolations() {
    let x = Name::from("x");
    let block = Element::escape_block(
        x.clone(),
        builtin(Expr::ident(x), BuiltInKind::UpperCase),
        vec![
            show_var("name"),
            text(" "),
            Element::new(ElementKind::NoEscape(vec![show_var("name")]), Span::DUMMY),
        ],
    );
    let out = render_with(vec![block], &[("name", Value::string("bob"))]);
    assert_eq!(out, "BOB bob");
}

// -- Numbers and strings --

#[test]
fn numbers_use_the_configured_format() {
    let out = render(vec![
        show(Expr::int(1_234_567)),
        text(" "),
        show(Expr::float(2.5)),
        text(" "),
        show(builtin(Expr::int(1_234_567), BuiltInKind::C)),
        text(" "),
        show(Expr::builtin(
            Expr::float(1.23456),
            BuiltInKind::String,
            vec![Expr::string("0.00")],
        )),
    ]);
    assert_eq!(out, "1,234,567 2.5 1234567 1.23");

    let config = RenderConfig::builder().number_format("c").build();
    let rendered = run(
        Template::new("main.ftl", vec![show(Expr::int(1234))]),
        config,
        &[],
    )
    .unwrap();
    assert_eq!(rendered.output, "1234");
}

#[test]
fn boolean_string_with_custom_words() {
    let out = render(vec![show(Expr::builtin(
        Expr::boolean(false),
        BuiltInKind::String,
        vec![Expr::string("on"), Expr::string("off")],
    ))]);
    assert_eq!(out, "off");
}

#[test]
fn string_templates_interpolate() {
    let greeting = Expr::template(vec![
        StringPart::Text("Hi ".into()),
        StringPart::Interpolation(Expr::ident("name")),
        StringPart::Text("!".into()),
    ]);
    let out = render_with(vec![show(greeting)], &[("name", Value::string("Ann"))]);
    assert_eq!(out, "Hi Ann!");
}

#[test]
fn interpolating_a_hash_fails() {
    let err = run(
        Template::new("main.ftl", vec![show_var("h")]),
        RenderConfig::default(),
        &[("h", Value::hash_from([("a", Value::int(1))]))],
    )
    .unwrap_err();
    assert_eq!(
        err.message,
        "expected string, number, date or markup, but h evaluated to hash"
    );
}
