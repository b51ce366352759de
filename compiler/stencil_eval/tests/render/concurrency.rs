//! Parallel runs over one shared template and configuration.

use std::sync::Arc;

use indexmap::IndexMap;
use pretty_assertions::assert_eq;
use rayon::prelude::*;
use stencil_eval::{render_to_string, RenderConfig, Value};
use stencil_ir::{BinaryOp, Element, Expr, LoopVars, ParamDecl, Template};

use crate::common::{call_positional, def_macro, show, show_var, text, CallCounter};

fn shared_template() -> Template {
    let row = def_macro(
        "row",
        vec![ParamDecl::required("n")],
        vec![
            show(Expr::binary(BinaryOp::Multiply, Expr::ident("n"), Expr::ident("id"))),
            text(";"),
        ],
    );
    Template::new(
        "table.ftl",
        vec![
            Element::define(row),
            show_var("id"),
            text(":"),
            Element::list(
                Expr::list(vec![Expr::int(1), Expr::int(2), Expr::int(3)]),
                Some(LoopVars::item("n")),
                vec![call_positional("row", vec![Expr::ident("n")])],
            ),
            show(Expr::call(Expr::ident("tick"), Vec::new())),
        ],
    )
}

#[test]
fn runs_share_template_and_config_across_threads() {
    let template = Arc::new(shared_template());
    let config = Arc::new(
        RenderConfig::builder()
            .number_format("c")
            .build(),
    );
    let counter = CallCounter::default();

    let outputs: Vec<(i64, String)> = (1..=64_i64)
        .into_par_iter()
        .map(|id| {
            let mut data = IndexMap::new();
            data.insert("id".to_owned(), Value::int(id));
            data.insert("tick".to_owned(), counter.value());
            let rendered = render_to_string(&template, &config, data).unwrap();
            (id, rendered.output)
        })
        .collect();

    for (id, output) in outputs {
        let prefix = format!("{id}:{};{};{};", id, id * 2, id * 3);
        assert!(output.starts_with(&prefix), "{output}");
    }
    assert_eq!(counter.calls(), 64);
}
