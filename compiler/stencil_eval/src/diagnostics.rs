//! Diagnostic infrastructure for template runs.
//!
//! - `CallStack`: live macro/function frames, with the depth limit checked on
//!   push and backtrace capture at error sites
//! - `EvalCounters`: evaluation counters exposed read-only from the
//!   environment, used to observe constant folding and default skipping

use stencil_ir::Span;
use stencil_values::{stack_overflow, BacktraceFrame, EvalBacktrace, EvalError};

/// A single frame in the live call stack.
#[derive(Clone, Debug)]
pub struct CallFrame {
    /// Callable description, e.g. `macro "greet"`.
    pub name: String,
    /// Where the call was made, not where the callable is defined.
    pub call_span: Option<Span>,
}

/// Live call stack of one template run.
///
/// Each invocation pushes a frame and pops it when the body finishes. The
/// depth limit is checked in [`CallStack::push`].
#[derive(Clone, Debug, Default)]
pub struct CallStack {
    frames: Vec<CallFrame>,
    max_depth: Option<usize>,
}

impl CallStack {
    /// `max_depth` is `None` for unlimited depth.
    pub fn new(max_depth: Option<usize>) -> Self {
        Self {
            frames: Vec::new(),
            max_depth,
        }
    }

    /// Push a call frame. On overflow the frame is not pushed and a
    /// `StackOverflow` error is returned.
    pub fn push(&mut self, frame: CallFrame) -> Result<(), EvalError> {
        if let Some(max) = self.max_depth {
            if self.frames.len() >= max {
                return Err(stack_overflow(max));
            }
        }
        self.frames.push(frame);
        Ok(())
    }

    pub fn pop(&mut self) {
        debug_assert!(
            !self.frames.is_empty(),
            "CallStack::pop() called on empty stack"
        );
        self.frames.pop();
    }

    #[inline]
    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    #[inline]
    pub fn current_frame(&self) -> Option<&CallFrame> {
        self.frames.last()
    }

    /// Snapshot of the stack, most recent call first.
    pub fn capture(&self) -> EvalBacktrace {
        let frames = self
            .frames
            .iter()
            .rev()
            .map(|f| BacktraceFrame {
                name: f.name.clone(),
                span: f.call_span,
            })
            .collect();
        EvalBacktrace::new(frames)
    }

    /// Attach a backtrace unless the error already carries one.
    pub fn attach_backtrace(&self, err: EvalError) -> EvalError {
        if self.frames.is_empty() || err.backtrace.is_some() {
            return err;
        }
        err.with_backtrace(self.capture())
    }
}

/// Counters for one run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct EvalCounters {
    /// Expression nodes actually evaluated; constant cache hits are not counted.
    pub expressions_evaluated: u64,
    pub elements_executed: u64,
    pub callables_invoked: u64,
    /// Parameter default expressions evaluated during binding.
    pub defaults_evaluated: u64,
}

impl EvalCounters {
    #[inline]
    pub fn count_expression(&mut self) {
        self.expressions_evaluated = self.expressions_evaluated.wrapping_add(1);
    }

    #[inline]
    pub fn count_element(&mut self) {
        self.elements_executed = self.elements_executed.wrapping_add(1);
    }

    #[inline]
    pub fn count_invocation(&mut self) {
        self.callables_invoked = self.callables_invoked.wrapping_add(1);
    }

    #[inline]
    pub fn count_default(&mut self) {
        self.defaults_evaluated = self.defaults_evaluated.wrapping_add(1);
    }

    pub fn report(&self) -> String {
        format!(
            "Render profile:\n  \
             Expressions evaluated: {}\n  \
             Elements executed:     {}\n  \
             Callables invoked:     {}\n  \
             Defaults evaluated:    {}",
            self.expressions_evaluated,
            self.elements_executed,
            self.callables_invoked,
            self.defaults_evaluated,
        )
    }
}

#[cfg(test)]
#[expect(clippy::expect_used, reason = "Tests use expect for brevity")]
mod tests;
