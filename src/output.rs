//! The single user-facing output sink.
//!
//! Everything a command wants the user to read goes through [`Output`]; tracing
//! logs go to stderr separately. The sink is cheap to clone but assumes a single
//! writer at a time.

use std::fmt::Display;
use std::io::{self, Write};
use std::sync::{Arc, Mutex, PoisonError};

#[derive(Clone)]
pub struct Output {
    sink: Arc<Mutex<Box<dyn Write + Send>>>,
}

impl Output {
    pub fn stdout() -> Self {
        Self::from_writer(io::stdout())
    }

    pub fn from_writer(writer: impl Write + Send + 'static) -> Self {
        Self {
            sink: Arc::new(Mutex::new(Box::new(writer))),
        }
    }

    /// An in-memory sink, returned together with a handle to read what was written.
    pub fn buffer() -> (Self, CapturedOutput) {
        let captured = CapturedOutput::default();
        (Self::from_writer(captured.clone()), captured)
    }

    /// Write a full line.
    pub fn line(&self, text: impl Display) {
        self.write_str(&format!("{}\n", text));
    }

    /// Write without a trailing newline and flush, used for progress dots.
    pub fn progress(&self, text: impl Display) {
        self.write_str(&text.to_string());
        self.flush();
    }

    pub fn flush(&self) {
        let mut sink = self.sink.lock().unwrap_or_else(PoisonError::into_inner);
        let _ = sink.flush();
    }

    fn write_str(&self, text: &str) {
        let mut sink = self.sink.lock().unwrap_or_else(PoisonError::into_inner);
        // A closed stdout (e.g. piped into `head`) is not worth failing a deployment over
        let _ = sink.write_all(text.as_bytes());
    }
}

/// Shared buffer behind [`Output::buffer`].
#[derive(Clone, Default)]
pub struct CapturedOutput {
    bytes: Arc<Mutex<Vec<u8>>>,
}

impl CapturedOutput {
    pub fn contents(&self) -> String {
        let bytes = self.bytes.lock().unwrap_or_else(PoisonError::into_inner);
        String::from_utf8_lossy(&bytes).into_owned()
    }
}

impl Write for CapturedOutput {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.bytes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
