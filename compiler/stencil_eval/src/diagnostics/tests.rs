use super::*;
use stencil_values::EvalErrorKind;

fn frame(name: &str, line: u32) -> CallFrame {
    CallFrame {
        name: name.to_string(),
        call_span: Some(Span::new(line, 1)),
    }
}

#[test]
fn push_pop_tracks_depth() {
    let mut stack = CallStack::new(None);
    assert!(stack.is_empty());
    stack.push(frame("macro \"a\"", 1)).expect("push");
    stack.push(frame("macro \"b\"", 2)).expect("push");
    assert_eq!(stack.depth(), 2);
    assert_eq!(
        stack.current_frame().map(|f| f.name.as_str()),
        Some("macro \"b\"")
    );
    stack.pop();
    assert_eq!(stack.depth(), 1);
}

#[test]
fn push_past_limit_is_stack_overflow() {
    let mut stack = CallStack::new(Some(2));
    stack.push(frame("f", 1)).expect("push");
    stack.push(frame("f", 2)).expect("push");
    let err = stack.push(frame("f", 3)).expect_err("overflow");
    assert_eq!(err.kind, EvalErrorKind::StackOverflow { depth: 2 });
    assert_eq!(stack.depth(), 2);
}

#[test]
fn capture_lists_innermost_first() {
    let mut stack = CallStack::new(None);
    stack.push(frame("outer", 1)).expect("push");
    stack.push(frame("inner", 5)).expect("push");
    let trace = stack.capture();
    let names: Vec<_> = trace.frames().iter().map(|f| f.name.as_str()).collect();
    assert_eq!(names, ["inner", "outer"]);
}

#[test]
fn attach_backtrace_keeps_existing_one() {
    let mut stack = CallStack::new(None);
    stack.push(frame("first", 1)).expect("push");
    let err = stack.attach_backtrace(EvalError::new("boom"));
    stack.push(frame("second", 2)).expect("push");
    let err = stack.attach_backtrace(err);
    let trace = err.backtrace.expect("backtrace");
    assert_eq!(trace.len(), 1);
    assert_eq!(trace.frames()[0].name, "first");
}

#[test]
fn empty_stack_attaches_nothing() {
    let stack = CallStack::default();
    let err = stack.attach_backtrace(EvalError::new("boom"));
    assert!(err.backtrace.is_none());
}

#[test]
fn counters_report_mentions_every_counter() {
    let mut counters = EvalCounters::default();
    counters.count_expression();
    counters.count_element();
    counters.count_element();
    counters.count_invocation();
    let report = counters.report();
    assert!(report.contains("Expressions evaluated: 1"));
    assert!(report.contains("Elements executed:     2"));
    assert!(report.contains("Callables invoked:     1"));
    assert!(report.contains("Defaults evaluated:    0"));
}
