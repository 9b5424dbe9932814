//! Per-step output capture.
//!
//! Collaborators write their diagnostic output to a [`StepLog`] instead of
//! straight to stdout. While the run captures output the log is backed by
//! `temp.log`; with capture turned off it forwards to the console.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

enum Sink {
    File { path: PathBuf, writer: BufWriter<File> },
    Console,
}

/// Writer handed to a step for its incidental output.
pub struct StepLog {
    sink: Sink,
}

impl StepLog {
    /// Truncate (or create) `path` and capture into it.
    pub fn capture(path: impl AsRef<Path>) -> io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::create(&path)?;
        Ok(Self {
            sink: Sink::File {
                path,
                writer: BufWriter::new(file),
            },
        })
    }

    /// Forward everything to stdout.
    pub fn console() -> Self {
        Self { sink: Sink::Console }
    }

    pub fn is_captured(&self) -> bool {
        matches!(self.sink, Sink::File { .. })
    }

    /// Capture file, if any.
    pub fn path(&self) -> Option<&Path> {
        match &self.sink {
            Sink::File { path, .. } => Some(path),
            Sink::Console => None,
        }
    }

    /// Write one line.
    pub fn line(&mut self, text: impl AsRef<str>) -> io::Result<()> {
        writeln!(self, "{}", text.as_ref())
    }

    /// Flush and release the capture file.
    pub fn finish(mut self) -> io::Result<()> {
        self.flush()
    }
}

impl Write for StepLog {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match &mut self.sink {
            Sink::File { writer, .. } => writer.write(buf),
            Sink::Console => io::stdout().write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match &mut self.sink {
            Sink::File { writer, .. } => writer.flush(),
            Sink::Console => io::stdout().flush(),
        }
    }
}

impl std::fmt::Debug for StepLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StepLog").field("path", &self.path()).finish()
    }
}
