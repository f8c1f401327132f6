//! Stream writer: stdout, stderr, an append-mode file or any `io::Write`

use crate::core::{Payload, PayloadKind, Result, Writer};
use parking_lot::Mutex;
use std::fs::OpenOptions;
use std::io::{self, BufWriter, Write};
use std::path::Path;

/// Writes one payload per line
///
/// Documents are written as compact JSON, so a stream bound to the Fluentd
/// formatter produces JSON lines.
pub struct StreamWriter {
    name: String,
    target: Mutex<Box<dyn Write + Send>>,
    /// Flush after every line (stdout/stderr)
    autoflush: bool,
}

impl StreamWriter {
    pub fn stdout() -> Self {
        Self {
            name: "stdout".to_string(),
            target: Mutex::new(Box::new(io::stdout())),
            autoflush: true,
        }
    }

    pub fn stderr() -> Self {
        Self {
            name: "stderr".to_string(),
            target: Mutex::new(Box::new(io::stderr())),
            autoflush: true,
        }
    }

    /// Append to a file, creating it if needed
    pub fn file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path.as_ref())?;

        Ok(Self {
            name: format!("stream:{}", path.as_ref().display()),
            target: Mutex::new(Box::new(BufWriter::new(file))),
            autoflush: false,
        })
    }

    /// Resolve `stdout`, `stderr`, `-` or a file path
    pub fn open(stream: &str) -> Result<Self> {
        match stream {
            "stdout" | "-" => Ok(Self::stdout()),
            "stderr" => Ok(Self::stderr()),
            path => Self::file(path),
        }
    }

    pub fn from_writer(name: impl Into<String>, target: Box<dyn Write + Send>) -> Self {
        Self {
            name: name.into(),
            target: Mutex::new(target),
            autoflush: false,
        }
    }

    #[must_use]
    pub fn with_autoflush(mut self, autoflush: bool) -> Self {
        self.autoflush = autoflush;
        self
    }
}

impl Writer for StreamWriter {
    fn write(&self, payload: &Payload) -> Result<()> {
        let line = payload.to_text();
        let mut target = self.target.lock();
        writeln!(target, "{}", line)?;
        if self.autoflush {
            target.flush()?;
        }
        Ok(())
    }

    fn flush(&self) -> Result<()> {
        self.target.lock().flush()?;
        Ok(())
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn accepts(&self, kind: PayloadKind) -> bool {
        matches!(kind, PayloadKind::Line | PayloadKind::Document)
    }
}

impl Drop for StreamWriter {
    fn drop(&mut self) {
        let _ = self.target.get_mut().flush();
    }
}
