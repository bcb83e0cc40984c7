//! ==============================================================================
//! framer.rs - newline framing over a raw byte source
//! ==============================================================================
//!
//! purpose:
//!     turns the serial byte stream into a lazy sequence of text lines.
//!     knows nothing about what the lines contain.
//!
//! relationships:
//!     - used by: pipeline.rs (iterates lines from the open device)
//!     - reads from: serial.rs (SerialDevice implements io::Read)
//!
//! ==============================================================================

use std::io::{self, Read};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

const CHUNK_SIZE: usize = 256;

/// Splits a byte source into `\n`-terminated lines.
///
/// Read timeouts are where the framer notices a shutdown request. The
/// sequence ends on end-of-stream, on shutdown, or after yielding one hard
/// I/O error; it is never restarted.
pub struct LineFramer<R> {
    source: R,
    shutdown: Arc<AtomicBool>,
    max_line_bytes: usize,
    partial: Vec<u8>,
    /// set while the current line has already blown past `max_line_bytes`
    discarding: bool,
    ready: std::collections::VecDeque<io::Result<String>>,
    finished: bool,
}

impl<R: Read> LineFramer<R> {
    pub fn new(source: R, max_line_bytes: usize, shutdown: Arc<AtomicBool>) -> Self {
        Self {
            source,
            shutdown,
            max_line_bytes,
            partial: Vec::new(),
            discarding: false,
            ready: std::collections::VecDeque::new(),
            finished: false,
        }
    }

    /// give back the underlying source (used to close the device)
    pub fn into_inner(self) -> R {
        self.source
    }

    fn split_chunk(&mut self, chunk: &[u8]) {
        for &byte in chunk {
            if byte == b'\n' {
                if self.discarding {
                    self.discarding = false;
                    self.partial.clear();
                } else {
                    self.finish_line();
                }
                continue;
            }
            if self.discarding {
                continue;
            }
            // a trailing '\r' is not part of the line's length
            let limit = if byte == b'\r' { self.max_line_bytes + 1 } else { self.max_line_bytes };
            if self.partial.len() >= limit {
                self.partial.clear();
                self.discarding = true;
                self.ready.push_back(Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!("line exceeds {} bytes, dropped", self.max_line_bytes),
                )));
                continue;
            }
            self.partial.push(byte);
        }
    }

    fn finish_line(&mut self) {
        if self.partial.last() == Some(&b'\r') {
            self.partial.pop();
        }
        let line = String::from_utf8_lossy(&self.partial).into_owned();
        self.partial.clear();
        self.ready.push_back(Ok(line));
    }
}

impl<R: Read> Iterator for LineFramer<R> {
    type Item = io::Result<String>;

    fn next(&mut self) -> Option<Self::Item> {
        let mut chunk = [0u8; CHUNK_SIZE];
        loop {
            if let Some(item) = self.ready.pop_front() {
                return Some(item);
            }
            if self.finished {
                return None;
            }
            if self.shutdown.load(Ordering::Relaxed) {
                self.finished = true;
                return None;
            }

            match self.source.read(&mut chunk) {
                Ok(0) => {
                    // end of stream: flush whatever is left of the last line
                    self.finished = true;
                    if !self.partial.is_empty() && !self.discarding {
                        self.finish_line();
                    }
                }
                Ok(n) => self.split_chunk(&chunk[..n]),
                Err(e)
                    if matches!(
                        e.kind(),
                        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted
                    ) => {}
                Err(e) => {
                    self.finished = true;
                    return Some(Err(e));
                }
            }
        }
    }
}
