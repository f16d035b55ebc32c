//! Redirects a byte stream (stdout/stderr-style writes) into the Log Pipeline.

use crate::framework::LogSource;
use crate::pipeline::{LineBuilder, LogLevel, LogPipeline};
use std::io;
use std::sync::Arc;

/// An [`io::Write`] sink that turns every written line into a log record
/// with a fixed source, level and format.
///
/// A UTF-8 sequence cut off at the end of one write is held back and
/// completed by the next.
pub struct OutputRedirector {
    line: LineBuilder,
    level: LogLevel,
    format: String,
    partial: Vec<u8>,
}

impl OutputRedirector {
    pub fn new(pipeline: &Arc<LogPipeline>, source: LogSource, level: LogLevel, format: &str) -> Self {
        Self {
            line: pipeline.line(source),
            level,
            format: format.to_string(),
            partial: Vec::new(),
        }
    }
}

impl io::Write for OutputRedirector {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.partial.extend_from_slice(buf);
        let complete = match std::str::from_utf8(&self.partial) {
            Ok(_) => self.partial.len(),
            Err(e) if e.error_len().is_none() => e.valid_up_to(),
            Err(_) => self.partial.len(),
        };
        let tail = self.partial.split_off(complete);
        let bytes = std::mem::replace(&mut self.partial, tail);

        let text = String::from_utf8_lossy(&bytes);
        for piece in text.split_inclusive('\n') {
            self.line.append(piece, self.level, &self.format);
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
