#![deny(clippy::arithmetic_side_effects)]
//! Stencil Eval - execution core for Stencil templates.
//!
//! Takes a parsed [`Template`](stencil_ir::Template) and runs it against a
//! data model, writing output to a sink.
//!
//! # Architecture
//!
//! - `RenderConfig`: immutable, shareable run settings (formats, escaping
//!   policy, call depth, formatting services, library resolver)
//! - `Environment`: per-run state: namespaces, call-local contexts, the
//!   local-context stack, output format and capture stack
//! - `exec`: element driver, expression evaluation, invocation and control
//!   flow, all as `impl Environment` blocks
//! - `operators`: arithmetic and comparison on evaluated operands
//!
//! Non-local exits (`#break`, `#continue`, `#return`, `#stop`, errors) are
//! [`ControlAction`] values threaded through `Result`.
//!
//! # Concurrency
//!
//! Templates, configurations and values are `Send + Sync` and may be shared
//! across threads. An `Environment` belongs to one run on one thread.
//!
//! # Re-exports
//!
//! Value and error types from `stencil_values` are re-exported for
//! convenience.

mod config;
mod diagnostics;
mod environment;
mod exec;
mod operators;
mod output;
mod run;
mod stack;

use std::sync::Once;

pub use stencil_values::{
    BoundArgs, CallableValue, Capabilities, ControlAction, DateKind, DateTimeValue,
    DefaultFormatServices, ErrorCategory, EvalError, EvalErrorKind, EvalResult, FormatError,
    FormatServices, Formatted, HostObject, HostValue, LibraryError, LibraryResolver, NamespaceId,
    NoLibraries, StaticLibraries, Value, WithArgs,
};

pub use config::{RenderConfig, RenderConfigBuilder, RunMode, DEFAULT_MAX_CALL_DEPTH};
pub use diagnostics::{CallFrame, CallStack, EvalCounters};
pub use environment::{Environment, EnvironmentBuilder, LocalSlot, Namespace, GLOBALS, MAIN};
pub use operators::{arithmetic, compare, negate};
pub use output::{
    buffer_sink, silent_sink, stdout_sink, BufferSink, OutputSink, OutputStack, SharedOutputSink,
    StdoutSink,
};
pub use run::{render_to_string, Rendered, RunOutcome};
pub use stack::ensure_sufficient_stack;

static TRACING_INIT: Once = Once::new();

/// Initialize tracing for debug output.
///
/// Call this once at startup. Safe to call multiple times.
/// Enable with `RUST_LOG=stencil_eval=debug` or `RUST_LOG=stencil_eval=trace`;
/// set `STENCIL_LOG_TREE=1` as well for indented, span-nested output.
pub fn init_tracing() {
    TRACING_INIT.call_once(|| {
        use tracing_subscriber::{fmt, prelude::*, EnvFilter};

        // Only initialize if RUST_LOG is set
        if std::env::var("RUST_LOG").is_err() {
            return;
        }
        let filter = EnvFilter::from_default_env();
        if std::env::var("STENCIL_LOG_TREE").is_ok() {
            tracing_subscriber::registry()
                .with(tracing_tree::HierarchicalLayer::new(2).with_targets(true))
                .with(filter)
                .init();
        } else {
            tracing_subscriber::registry()
                .with(fmt::layer().with_target(true).with_level(true))
                .with(filter)
                .init();
        }
    });
}
