//! Line reassembly
//!
//! Transports deliver bytes in arbitrary chunks, sometimes one byte at a
//! time. [`LineSplitter`] accumulates them and yields complete lines with
//! the line terminator stripped.

use serde::{Deserialize, Serialize};

/// Default maximum line length in bytes
pub const DEFAULT_MAX_LINE: usize = 256;

/// What happens to a line that exceeds the maximum length
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OverflowPolicy {
    /// Keep the first `max` bytes, drop the rest up to the terminator
    Truncate,
    /// Drop the whole line
    #[default]
    Discard,
}

/// Splits a byte stream into LF-terminated lines
#[derive(Debug)]
pub struct LineSplitter {
    buffer: Vec<u8>,
    max_line: usize,
    policy: OverflowPolicy,
    overflowed: bool,
    // CR that arrived with the buffer full; only a terminator if LF follows
    held_cr: bool,
    dropped_lines: u64,
}

impl Default for LineSplitter {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_LINE, OverflowPolicy::default())
    }
}

impl LineSplitter {
    /// Create a splitter with the given bound and overflow policy
    pub fn new(max_line: usize, policy: OverflowPolicy) -> Self {
        Self {
            buffer: Vec::with_capacity(max_line),
            max_line: max_line.max(1),
            policy,
            overflowed: false,
            held_cr: false,
            dropped_lines: 0,
        }
    }

    /// Feed a chunk, calling `on_line` for every completed line
    pub fn push<F>(&mut self, data: &[u8], mut on_line: F)
    where
        F: FnMut(&str),
    {
        for &byte in data {
            if byte == b'\n' {
                self.finish_line(&mut on_line);
                continue;
            }

            if std::mem::take(&mut self.held_cr) {
                self.overflowed = true;
            }

            if self.buffer.len() < self.max_line {
                self.buffer.push(byte);
            } else if byte == b'\r' && !self.overflowed {
                self.held_cr = true;
            } else {
                self.overflowed = true;
            }
        }
    }

    /// Feed a chunk and collect the completed lines
    pub fn push_collect(&mut self, data: &[u8]) -> Vec<String> {
        let mut lines = Vec::new();
        self.push(data, |line| lines.push(line.to_string()));
        lines
    }

    fn finish_line<F>(&mut self, on_line: &mut F)
    where
        F: FnMut(&str),
    {
        let overflowed = std::mem::take(&mut self.overflowed);
        self.held_cr = false;

        if overflowed && self.policy == OverflowPolicy::Discard {
            self.dropped_lines += 1;
            tracing::debug!(max = self.max_line, "discarding over-long line");
            self.buffer.clear();
            return;
        }

        if self.buffer.last() == Some(&b'\r') {
            self.buffer.pop();
        }

        if !self.buffer.is_empty() {
            let line = String::from_utf8_lossy(&self.buffer);
            on_line(&line);
        }
        self.buffer.clear();
    }

    /// Bytes of the incomplete line held so far
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }

    /// Number of lines dropped by [`OverflowPolicy::Discard`]
    pub fn dropped_lines(&self) -> u64 {
        self.dropped_lines
    }

    /// Forget any partial line, e.g. after a reconnect
    pub fn reset(&mut self) {
        self.buffer.clear();
        self.overflowed = false;
        self.held_cr = false;
    }
}
