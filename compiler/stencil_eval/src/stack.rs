//! Stack growth for deep template recursion.
//!
//! Callable bodies, nested content and block directives recurse through the
//! evaluator; `stacker` grows the native stack before it runs out. The call
//! depth limit in [`RenderConfig`](crate::RenderConfig) bounds how far that
//! growth can go.
//!
//! WASM has no `stacker` support and calls the closure directly.

/// Keep at least this much stack free (100KB red zone).
#[cfg(not(target_arch = "wasm32"))]
const RED_ZONE: usize = 100 * 1024;

/// Grow by this much when the red zone is reached (1MB).
#[cfg(not(target_arch = "wasm32"))]
const STACK_PER_RECURSION: usize = 1024 * 1024;

/// Run `f`, growing the stack first if less than the red zone remains.
#[inline]
#[cfg(not(target_arch = "wasm32"))]
pub fn ensure_sufficient_stack<R>(f: impl FnOnce() -> R) -> R {
    stacker::maybe_grow(RED_ZONE, STACK_PER_RECURSION, f)
}

#[inline]
#[cfg(target_arch = "wasm32")]
pub fn ensure_sufficient_stack<R>(f: impl FnOnce() -> R) -> R {
    f()
}
