#![allow(
    clippy::result_large_err,
    reason = "EvalError travels through every evaluator result; boxing it would touch every call site"
)]
//! Stencil Values - runtime values and the evaluator's error surface.
//!
//! This crate provides:
//! - Runtime value types (`Value`, `Heap`, `CallableValue`, `HostValue`, ...)
//! - Capability flags for dispatching on host-bridged values
//! - Evaluation errors (`EvalError`, `EvalErrorKind`) and the non-local exit
//!   type `ControlAction`
//! - Interfaces to external collaborators: `FormatServices` for number and
//!   date formatting, `LibraryResolver` for `#import`
//!
//! # Value Types
//!
//! Heap-backed values go through `Value::` factory methods; `Heap<T>` keeps
//! its constructor private so every shared allocation is an `Arc`. Values are
//! `Send + Sync` and can be shared across concurrent runs.

mod capabilities;
mod errors;
mod library;
mod services;
mod value;

pub use capabilities::Capabilities;
pub use errors::{
    BacktraceFrame, ControlAction, ErrorCategory, EvalBacktrace, EvalError, EvalErrorKind,
    EvalNote, EvalResult,
};
pub use library::{LibraryError, LibraryResolver, NoLibraries, StaticLibraries};
pub use services::{DefaultFormatServices, FormatError, FormatServices, Formatted};
pub use value::{
    BoundArgs, CallableValue, DateKind, DateTimeValue, Heap, HostObject, HostValue, NamespaceId,
    Value, WithArgs,
};

// Re-export error constructors for use by the evaluator
pub use errors::{
    catch_all_conflict, control_flow_leak, division_by_zero, format_mixing, formatting_failed,
    import_failed, invalid_reference, local_outside_callable, misplaced_directive,
    missing_required_parameter, modulo_by_zero, no_nested_content, not_callable,
    return_outside_callable, stack_overflow, too_many_arguments, type_mismatch,
    undefined_output_format, unknown_named_argument, unknown_namespace, unsupported_operation,
};
