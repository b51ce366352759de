//! Output sinks for template runs.
//!
//! The run driver hands the environment a [`SharedOutputSink`]; the
//! environment only ever appends to it. Constructs that must buffer (captured
//! assignments, `#attempt`, function bodies, library imports) push a capture
//! on the [`OutputStack`] instead of reading the sink back.
//!
//! Uses enum dispatch instead of trait objects on this hot path.

use std::io::Write as _;
use std::sync::Arc;

use parking_lot::Mutex;

/// Writes straight to stdout.
#[derive(Default)]
pub struct StdoutSink;

impl StdoutSink {
    pub fn write(&self, text: &str) {
        let mut out = std::io::stdout().lock();
        // A closed stdout has nowhere to report to; the run itself continues.
        let _ = out.write_all(text.as_bytes());
    }
}

/// Captures output in memory; used by tests and by embedders that want the
/// rendered text as a `String`.
pub struct BufferSink {
    buffer: Mutex<String>,
}

impl BufferSink {
    pub fn new() -> Self {
        BufferSink {
            buffer: Mutex::new(String::new()),
        }
    }

    pub fn write(&self, text: &str) {
        self.buffer.lock().push_str(text);
    }

    pub fn contents(&self) -> String {
        self.buffer.lock().clone()
    }

    pub fn take(&self) -> String {
        std::mem::take(&mut *self.buffer.lock())
    }

    pub fn clear(&self) {
        self.buffer.lock().clear();
    }
}

impl Default for BufferSink {
    fn default() -> Self {
        Self::new()
    }
}

/// Append-only destination of a run's output.
pub enum OutputSink {
    Stdout(StdoutSink),
    Buffer(BufferSink),
    /// Discards everything (`RunMode::Check`).
    Silent,
}

impl OutputSink {
    pub fn write(&self, text: &str) {
        if text.is_empty() {
            return;
        }
        match self {
            Self::Stdout(s) => s.write(text),
            Self::Buffer(b) => b.write(text),
            Self::Silent => {}
        }
    }

    /// Captured text; empty for sinks that do not capture.
    pub fn contents(&self) -> String {
        match self {
            Self::Buffer(b) => b.contents(),
            Self::Stdout(_) | Self::Silent => String::new(),
        }
    }

    pub fn take(&self) -> String {
        match self {
            Self::Buffer(b) => b.take(),
            Self::Stdout(_) | Self::Silent => String::new(),
        }
    }
}

pub type SharedOutputSink = Arc<OutputSink>;

pub fn stdout_sink() -> SharedOutputSink {
    Arc::new(OutputSink::Stdout(StdoutSink))
}

pub fn buffer_sink() -> SharedOutputSink {
    Arc::new(OutputSink::Buffer(BufferSink::new()))
}

pub fn silent_sink() -> SharedOutputSink {
    Arc::new(OutputSink::Silent)
}

/// The run's sink with a stack of in-memory captures layered on top.
///
/// Writes go to the innermost capture, or to the sink when no capture is
/// active.
pub struct OutputStack {
    sink: SharedOutputSink,
    captures: Vec<String>,
}

impl OutputStack {
    pub fn new(sink: SharedOutputSink) -> Self {
        OutputStack {
            sink,
            captures: Vec::new(),
        }
    }

    pub fn write(&mut self, text: &str) {
        match self.captures.last_mut() {
            Some(capture) => capture.push_str(text),
            None => self.sink.write(text),
        }
    }

    pub fn push_capture(&mut self) {
        self.captures.push(String::new());
    }

    /// Ends the innermost capture and returns what it collected.
    pub fn pop_capture(&mut self) -> String {
        debug_assert!(
            !self.captures.is_empty(),
            "OutputStack::pop_capture() without a capture"
        );
        self.captures.pop().unwrap_or_default()
    }

    #[inline]
    pub fn capture_depth(&self) -> usize {
        self.captures.len()
    }

    pub fn sink(&self) -> &SharedOutputSink {
        &self.sink
    }
}
