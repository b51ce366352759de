//! Error types for template evaluation.
//!
//! # Structured Error Categories
//!
//! `EvalErrorKind` carries the structured data for each failure; its
//! `Display` impl produces the human message. Factory functions (e.g.
//! `missing_required_parameter()`) are the public API and fill in both `kind`
//! and `message`. Every kind maps onto an [`ErrorCategory`].
//!
//! # Non-local exits
//!
//! `ControlAction` is the `Err` side of evaluation. Besides ordinary errors it
//! carries `break`, `continue`, `return` and `stop` so constructs can match on
//! the exit they handle and let everything else propagate with `?`.

use std::fmt;

use stencil_ir::Span;

use crate::value::Value;

/// Result of evaluating an expression or running a callable.
pub type EvalResult = Result<Value, ControlAction>;

/// The error taxonomy diagnostics are grouped by.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Argument binding failed before a callable body ran.
    Binding,
    /// An expression produced no value where one is required.
    Reference,
    /// A value lacks the capability an operation needs.
    Type,
    /// The external formatting service failed.
    Formatting,
    /// Markup of a foreign format was written into the output.
    FormatMixing,
    /// A structural guarantee about signals or nested content was broken.
    ControlFlowMisuse,
    /// Arithmetic, recursion limits, imports and everything else.
    Runtime,
}

/// Typed error category for structured diagnostics.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EvalErrorKind {
    // Binding
    MissingRequiredParameter {
        callable: String,
        parameter: String,
    },
    UnknownNamedArgument {
        callable: String,
        argument: String,
    },
    TooManyArguments {
        callable: String,
        accepted: usize,
        position: usize,
    },
    /// `.args` needs a hash, but the catch-all received positional values.
    ArgsSnapshotConflict {
        callable: String,
        catch_all: String,
    },
    /// Overflow arrived both positionally and by name.
    MixedCatchAllArguments {
        callable: String,
        catch_all: String,
    },

    // Reference
    InvalidReference {
        expression: String,
    },

    // Type
    TypeMismatch {
        expression: String,
        expected: String,
        got: String,
    },
    NotCallable {
        type_name: String,
    },

    // Formatting
    Formatting {
        call_site: String,
        message: String,
    },

    // Output formats
    FormatMixing {
        value_format: String,
        output_format: String,
    },
    UndefinedOutputFormat {
        message: String,
    },

    // Control flow misuse
    ReturnOutsideCallable,
    NoNestedContent {
        directive: String,
    },
    ControlFlowLeak {
        signal: String,
    },
    LocalOutsideCallable,
    /// A directive that only works inside some enclosing construct.
    MisplacedDirective {
        directive: String,
        context: String,
    },

    // Runtime
    DivisionByZero,
    ModuloByZero,
    StackOverflow {
        depth: usize,
    },
    UnsupportedOperation {
        operation: String,
        type_name: String,
    },
    ImportFailed {
        library: String,
        message: String,
    },
    /// A namespace handle created by another run.
    UnknownNamespace {
        index: usize,
    },

    /// Catch-all for errors without a structured kind.
    Custom {
        message: String,
    },
}

impl EvalErrorKind {
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::MissingRequiredParameter { .. }
            | Self::UnknownNamedArgument { .. }
            | Self::TooManyArguments { .. }
            | Self::ArgsSnapshotConflict { .. }
            | Self::MixedCatchAllArguments { .. } => ErrorCategory::Binding,
            Self::InvalidReference { .. } => ErrorCategory::Reference,
            Self::TypeMismatch { .. } | Self::NotCallable { .. } => ErrorCategory::Type,
            Self::Formatting { .. } => ErrorCategory::Formatting,
            Self::FormatMixing { .. } => ErrorCategory::FormatMixing,
            Self::ReturnOutsideCallable
            | Self::NoNestedContent { .. }
            | Self::ControlFlowLeak { .. }
            | Self::LocalOutsideCallable
            | Self::MisplacedDirective { .. } => ErrorCategory::ControlFlowMisuse,
            Self::UndefinedOutputFormat { .. }
            | Self::DivisionByZero
            | Self::ModuloByZero
            | Self::StackOverflow { .. }
            | Self::UnsupportedOperation { .. }
            | Self::ImportFailed { .. }
            | Self::UnknownNamespace { .. }
            | Self::Custom { .. } => ErrorCategory::Runtime,
        }
    }
}

impl fmt::Display for EvalErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            // Binding
            Self::MissingRequiredParameter {
                callable,
                parameter,
            } => write!(
                f,
                "{callable} requires parameter {parameter:?}, but it was not supplied and has no usable default"
            ),
            Self::UnknownNamedArgument { callable, argument } => {
                write!(f, "{callable} has no parameter named {argument:?}")
            }
            Self::TooManyArguments {
                callable,
                accepted,
                position,
            } => {
                let arg_word = if *accepted == 1 {
                    "argument"
                } else {
                    "arguments"
                };
                write!(
                    f,
                    "{callable} accepts only {accepted} positional {arg_word}, but argument #{position} was supplied"
                )
            }
            Self::ArgsSnapshotConflict {
                callable,
                catch_all,
            } => write!(
                f,
                "{callable} reads .args, so its catch-all parameter {catch_all:?} can only receive named arguments"
            ),
            Self::MixedCatchAllArguments {
                callable,
                catch_all,
            } => write!(
                f,
                "{callable}: catch-all parameter {catch_all:?} received both positional and named extra arguments"
            ),

            // Reference
            Self::InvalidReference { expression } => {
                write!(f, "{expression} evaluated to no value")
            }

            // Type
            Self::TypeMismatch {
                expression,
                expected,
                got,
            } => write!(f, "expected {expected}, but {expression} evaluated to {got}"),
            Self::NotCallable { type_name } => write!(f, "{type_name} is not callable"),

            // Formatting
            Self::Formatting { call_site, message } => {
                write!(f, "formatting failed at {call_site}: {message}")
            }

            // Output formats
            Self::FormatMixing {
                value_format,
                output_format,
            } => write!(
                f,
                "a markup value of format {value_format:?} cannot be inserted into output of format {output_format:?}"
            ),
            Self::UndefinedOutputFormat { message } => write!(f, "{message}"),

            // Control flow misuse
            Self::ReturnOutsideCallable => write!(f, "#return outside of a macro or function"),
            Self::NoNestedContent { directive } => {
                write!(f, "#nested used in {directive}, but the call supplied no nested content")
            }
            Self::ControlFlowLeak { signal } => {
                write!(f, "{signal} outside of a construct that can handle it")
            }
            Self::LocalOutsideCallable => write!(f, "#local outside of a macro or function"),
            Self::MisplacedDirective { directive, context } => {
                write!(f, "{directive} can only be used inside {context}")
            }

            // Runtime
            Self::DivisionByZero => write!(f, "division by zero"),
            Self::ModuloByZero => write!(f, "modulo by zero"),
            Self::StackOverflow { depth } => {
                write!(f, "maximum call depth exceeded (limit: {depth})")
            }
            Self::UnsupportedOperation {
                operation,
                type_name,
            } => write!(f, "{operation} is not supported for {type_name}"),
            Self::ImportFailed { library, message } => {
                write!(f, "failed to import {library:?}: {message}")
            }
            Self::UnknownNamespace { index } => {
                write!(f, "namespace #{index} does not belong to this run")
            }

            Self::Custom { message } => write!(f, "{message}"),
        }
    }
}

/// Additional context note attached to an error.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EvalNote {
    pub message: String,
    pub span: Option<Span>,
}

impl EvalNote {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            span: None,
        }
    }

    pub fn with_span(message: impl Into<String>, span: Span) -> Self {
        Self {
            message: message.into(),
            span: Some(span),
        }
    }
}

/// A single frame in an evaluation backtrace.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BacktraceFrame {
    /// Callable description, e.g. `macro "greet"`.
    pub name: String,
    /// Call site.
    pub span: Option<Span>,
}

/// Immutable snapshot of the call stack at an error site, innermost first.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EvalBacktrace {
    frames: Vec<BacktraceFrame>,
}

impl EvalBacktrace {
    pub fn new(frames: Vec<BacktraceFrame>) -> Self {
        Self { frames }
    }

    pub fn frames(&self) -> &[BacktraceFrame] {
        &self.frames
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }
}

impl fmt::Display for EvalBacktrace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.frames.is_empty() {
            return Ok(());
        }
        writeln!(f, "template call stack:")?;
        for (i, frame) in self.frames.iter().enumerate() {
            write!(f, "  {i}: {}", frame.name)?;
            if let Some(span) = frame.span {
                write!(f, " called at {span}")?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

/// Evaluation error.
#[derive(Clone, Debug, PartialEq)]
pub struct EvalError {
    /// Structured error category for diagnostic conversion.
    pub kind: EvalErrorKind,
    /// Human-readable error message; equals `kind.to_string()` for
    /// factory-created errors.
    pub message: String,
    /// Location of the node that failed.
    pub span: Option<Span>,
    /// Canonical form of the sub-expression the failure is blamed on.
    pub blamed: Option<String>,
    /// Template call stack at the error site; attached once, at the innermost
    /// callable boundary the error crosses.
    pub backtrace: Option<EvalBacktrace>,
    pub notes: Vec<EvalNote>,
}

impl EvalError {
    /// Create an error with just a message (`Custom` kind).
    pub fn new(message: impl Into<String>) -> Self {
        let message = message.into();
        Self::from_kind(EvalErrorKind::Custom { message })
    }

    fn from_kind(kind: EvalErrorKind) -> Self {
        let message = kind.to_string();
        Self {
            kind,
            message,
            span: None,
            blamed: None,
            backtrace: None,
            notes: Vec::new(),
        }
    }

    #[inline]
    pub fn category(&self) -> ErrorCategory {
        self.kind.category()
    }

    /// Attach a source span unless one is already set.
    #[must_use]
    pub fn with_span(mut self, span: Span) -> Self {
        if self.span.is_none() && !span.is_dummy() {
            self.span = Some(span);
        }
        self
    }

    #[must_use]
    pub fn with_blamed(mut self, expression: impl Into<String>) -> Self {
        self.blamed = Some(expression.into());
        self
    }

    #[must_use]
    pub fn with_backtrace(mut self, backtrace: EvalBacktrace) -> Self {
        self.backtrace = Some(backtrace);
        self
    }

    #[must_use]
    pub fn with_note(mut self, note: EvalNote) -> Self {
        self.notes.push(note);
        self
    }
}

impl fmt::Display for EvalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)?;
        if let Some(span) = self.span {
            write!(f, " (at {span})")?;
        }
        for note in &self.notes {
            write!(f, "\n  note: {}", note.message)?;
        }
        if let Some(backtrace) = &self.backtrace {
            write!(f, "\n{backtrace}")?;
        }
        Ok(())
    }
}

impl std::error::Error for EvalError {}

/// Non-local exit from evaluation.
///
/// Signals carry the macro-frame depth they were raised at. Nested content
/// runs at its caller's depth, so a signal raised there passes through the
/// callee that yielded to it.
#[derive(Clone, Debug)]
pub enum ControlAction {
    Break { depth: usize },
    Continue { depth: usize },
    /// `value` is `None` for `#return` without an expression.
    Return { depth: usize, value: Option<Value> },
    /// Ends the whole run; the message is reported by the driver.
    Stop(Option<String>),
    Error(Box<EvalError>),
}

impl ControlAction {
    #[inline]
    pub fn is_error(&self) -> bool {
        matches!(self, ControlAction::Error(_))
    }

    /// Directive that raised the signal, for diagnostics.
    pub fn signal_name(&self) -> &'static str {
        match self {
            ControlAction::Break { .. } => "#break",
            ControlAction::Continue { .. } => "#continue",
            ControlAction::Return { .. } => "#return",
            ControlAction::Stop(_) => "#stop",
            ControlAction::Error(_) => "error",
        }
    }

    /// Convert a signal that reached a boundary it must not cross into the
    /// matching control-flow misuse error.
    pub fn into_eval_error(self) -> EvalError {
        match self {
            ControlAction::Error(e) => *e,
            ControlAction::Return { .. } => return_outside_callable(),
            other => control_flow_leak(other.signal_name()),
        }
    }
}

impl From<EvalError> for ControlAction {
    fn from(e: EvalError) -> Self {
        ControlAction::Error(Box::new(e))
    }
}

// Binding errors

#[cold]
pub fn missing_required_parameter(callable: &str, parameter: &str) -> EvalError {
    EvalError::from_kind(EvalErrorKind::MissingRequiredParameter {
        callable: callable.to_string(),
        parameter: parameter.to_string(),
    })
}

#[cold]
pub fn unknown_named_argument(callable: &str, argument: &str) -> EvalError {
    EvalError::from_kind(EvalErrorKind::UnknownNamedArgument {
        callable: callable.to_string(),
        argument: argument.to_string(),
    })
}

/// `position` is 1-based.
#[cold]
pub fn too_many_arguments(callable: &str, accepted: usize, position: usize) -> EvalError {
    EvalError::from_kind(EvalErrorKind::TooManyArguments {
        callable: callable.to_string(),
        accepted,
        position,
    })
}

/// `mixed` selects the both-styles overflow variant; otherwise the `.args`
/// snapshot conflict.
#[cold]
pub fn catch_all_conflict(callable: &str, catch_all: &str, mixed: bool) -> EvalError {
    let callable = callable.to_string();
    let catch_all = catch_all.to_string();
    EvalError::from_kind(if mixed {
        EvalErrorKind::MixedCatchAllArguments {
            callable,
            catch_all,
        }
    } else {
        EvalErrorKind::ArgsSnapshotConflict {
            callable,
            catch_all,
        }
    })
}

// Reference and type errors

#[cold]
pub fn invalid_reference(expression: &str) -> EvalError {
    EvalError::from_kind(EvalErrorKind::InvalidReference {
        expression: expression.to_string(),
    })
    .with_blamed(expression)
    .with_note(EvalNote::new(
        "use `expr!default` or `expr??` if the value may be missing",
    ))
}

#[cold]
pub fn type_mismatch(expression: &str, expected: &str, got: &str) -> EvalError {
    EvalError::from_kind(EvalErrorKind::TypeMismatch {
        expression: expression.to_string(),
        expected: expected.to_string(),
        got: got.to_string(),
    })
    .with_blamed(expression)
}

#[cold]
pub fn not_callable(type_name: &str) -> EvalError {
    EvalError::from_kind(EvalErrorKind::NotCallable {
        type_name: type_name.to_string(),
    })
}

// Formatting and output format errors

#[cold]
pub fn formatting_failed(call_site: &str, message: &str) -> EvalError {
    EvalError::from_kind(EvalErrorKind::Formatting {
        call_site: call_site.to_string(),
        message: message.to_string(),
    })
}

#[cold]
pub fn format_mixing(value_format: &str, output_format: &str) -> EvalError {
    EvalError::from_kind(EvalErrorKind::FormatMixing {
        value_format: value_format.to_string(),
        output_format: output_format.to_string(),
    })
}

#[cold]
pub fn undefined_output_format(message: &str) -> EvalError {
    EvalError::from_kind(EvalErrorKind::UndefinedOutputFormat {
        message: message.to_string(),
    })
}

// Control flow misuse

#[cold]
pub fn return_outside_callable() -> EvalError {
    EvalError::from_kind(EvalErrorKind::ReturnOutsideCallable)
}

#[cold]
pub fn no_nested_content(directive: &str) -> EvalError {
    EvalError::from_kind(EvalErrorKind::NoNestedContent {
        directive: directive.to_string(),
    })
}

#[cold]
pub fn control_flow_leak(signal: &str) -> EvalError {
    EvalError::from_kind(EvalErrorKind::ControlFlowLeak {
        signal: signal.to_string(),
    })
}

#[cold]
pub fn local_outside_callable() -> EvalError {
    EvalError::from_kind(EvalErrorKind::LocalOutsideCallable)
}

#[cold]
pub fn misplaced_directive(directive: &str, context: &str) -> EvalError {
    EvalError::from_kind(EvalErrorKind::MisplacedDirective {
        directive: directive.to_string(),
        context: context.to_string(),
    })
}

// Runtime errors

#[cold]
pub fn division_by_zero() -> EvalError {
    EvalError::from_kind(EvalErrorKind::DivisionByZero)
}

#[cold]
pub fn modulo_by_zero() -> EvalError {
    EvalError::from_kind(EvalErrorKind::ModuloByZero)
}

#[cold]
pub fn stack_overflow(depth: usize) -> EvalError {
    EvalError::from_kind(EvalErrorKind::StackOverflow { depth })
}

#[cold]
pub fn unsupported_operation(operation: &str, type_name: &str) -> EvalError {
    EvalError::from_kind(EvalErrorKind::UnsupportedOperation {
        operation: operation.to_string(),
        type_name: type_name.to_string(),
    })
}

#[cold]
pub fn import_failed(library: &str, message: &str) -> EvalError {
    EvalError::from_kind(EvalErrorKind::ImportFailed {
        library: library.to_string(),
        message: message.to_string(),
    })
}

#[cold]
pub fn unknown_namespace(index: usize) -> EvalError {
    EvalError::from_kind(EvalErrorKind::UnknownNamespace { index })
}
