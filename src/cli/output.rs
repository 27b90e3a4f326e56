//! Where commands write their results.
//!
//! Results go to stdout, diagnostics to stderr. Tests use [`MockOutput`]
//! to capture both.

use std::io::{self, Write};

/// Output abstraction so commands can be tested without a terminal.
pub trait Output {
    /// Writes a line of regular output.
    fn message(&mut self, msg: &str);

    /// Writes an error line.
    fn error(&mut self, msg: &str);

    /// Writes raw bytes (a template) to the result stream.
    fn write_bytes(&mut self, bytes: &[u8]) -> io::Result<()>;
}

/// Writes to the process stdout and stderr.
#[derive(Debug, Default)]
pub struct StdOutput;

impl Output for StdOutput {
    fn message(&mut self, msg: &str) {
        println!("{msg}");
    }

    fn error(&mut self, msg: &str) {
        eprintln!("{msg}");
    }

    fn write_bytes(&mut self, bytes: &[u8]) -> io::Result<()> {
        let mut stdout = io::stdout().lock();
        stdout.write_all(bytes)?;
        stdout.flush()
    }
}

/// Records everything written, for tests.
#[derive(Debug, Default)]
pub struct MockOutput {
    messages: Vec<String>,
    errors: Vec<String>,
    bytes: Vec<u8>,
}

impl MockOutput {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> &[String] {
        &self.messages
    }

    pub fn errors(&self) -> &[String] {
        &self.errors
    }

    /// Raw bytes written, as text.
    pub fn written(&self) -> String {
        String::from_utf8_lossy(&self.bytes).into_owned()
    }
}

impl Output for MockOutput {
    fn message(&mut self, msg: &str) {
        self.messages.push(msg.to_string());
    }

    fn error(&mut self, msg: &str) {
        self.errors.push(msg.to_string());
    }

    fn write_bytes(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.bytes.extend_from_slice(bytes);
        Ok(())
    }
}
