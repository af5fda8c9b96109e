//! Output sink port for child stdout/stderr lines.

/// Receives lines read from a child's output streams.
///
/// Implementations should be thread-safe and non-blocking; they are called
/// from the reader task for every line.
pub trait OutputSink: Send + Sync {
    /// Append one line (without its trailing newline).
    ///
    /// `stream_type` is either `"stdout"` or `"stderr"`.
    fn append(&self, pid: Option<u32>, stream_type: &str, line: String);
}
