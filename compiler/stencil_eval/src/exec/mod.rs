//! Execution of template elements and expressions.
//!
//! Everything here is an `impl Environment` block, split by concern:
//!
//! - `element`: the element driver and the simple directives
//! - `expr`: expression evaluation
//! - `builtins`: `?name` built-ins
//! - `control`: loops, `#switch`, `#attempt`, assignments
//! - `call`: macro/function invocation, `#nested`, `#import`
//! - `output`: interpolation, escaping and output-format blocks
//!
//! Non-local exits travel as `Err(ControlAction)`; each construct that can
//! handle a signal consumes it only when the signal's depth matches the depth
//! the construct runs at.

mod builtins;
mod call;
mod control;
mod element;
mod expr;
mod output;

use stencil_format::OutputFormat;
use stencil_ir::{AutoEscapingPolicy, Span};
use stencil_values::ControlAction;

pub(crate) use expr::MaybeValue;

/// Whether `policy` turns auto-escaping on for `format`. Non-markup formats
/// never auto-escape.
pub(crate) fn auto_escapes(policy: AutoEscapingPolicy, format: &OutputFormat) -> bool {
    match (policy, format.as_markup()) {
        (_, None) | (AutoEscapingPolicy::Disable, _) => false,
        (AutoEscapingPolicy::EnableIfSupported, Some(_)) => true,
        (AutoEscapingPolicy::EnableIfDefault, Some(markup)) => markup.is_auto_escaped_by_default(),
    }
}

/// Record `span` on an error that has no location yet. Signals pass through.
#[inline]
pub(crate) fn at_span(mut action: ControlAction, span: Span) -> ControlAction {
    if let ControlAction::Error(err) = &mut action {
        if err.span.is_none() && !span.is_dummy() {
            err.span = Some(span);
        }
    }
    action
}

/// Depth carried by a `#break` or `#continue`.
#[inline]
pub(crate) fn loop_signal_depth(action: &ControlAction) -> Option<usize> {
    match action {
        ControlAction::Break { depth } | ControlAction::Continue { depth } => Some(*depth),
        _ => None,
    }
}
