//! Child output line readers (non-UTF8-safe).
//!
//! Stdio servers are arbitrary programs and may emit invalid UTF-8. Using
//! `BufReader::lines()` would end the reader on the first bad byte, so lines
//! are read as bytes and decoded lossily.

use std::sync::Arc;

use procward_core::OutputSink;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::task::JoinHandle;
use tracing::debug;

/// Spawn a task forwarding every line of `stream` to `sink` and to `tracing`.
///
/// The task ends at EOF or on the first read error. The returned handle
/// resolves to the number of lines forwarded.
pub fn spawn_line_reader(
    stream: impl AsyncRead + Unpin + Send + 'static,
    pid: Option<u32>,
    stream_type: &'static str,
    sink: Option<Arc<dyn OutputSink>>,
) -> JoinHandle<usize> {
    tokio::spawn(async move {
        let mut reader = BufReader::new(stream);
        let mut buf: Vec<u8> = Vec::with_capacity(1024);
        let mut forwarded = 0;

        loop {
            buf.clear();
            match reader.read_until(b'\n', &mut buf).await {
                Ok(0) => break,
                Ok(_) => {
                    if buf.last() == Some(&b'\n') {
                        buf.pop();
                        if buf.last() == Some(&b'\r') {
                            buf.pop();
                        }
                    }

                    let line = String::from_utf8_lossy(&buf).into_owned();
                    debug!(?pid, %stream_type, "{}", line);
                    if let Some(ref s) = sink {
                        s.append(pid, stream_type, line);
                    }
                    forwarded += 1;
                }
                Err(e) => {
                    debug!(?pid, %stream_type, error = %e, "output reader exiting on read error");
                    break;
                }
            }
        }

        forwarded
    })
}
