//! Append-only log of per-item failures.

use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use chrono::Local;

/// Header line marker opening every entry.
pub const ENTRY_MARKER: &str = "While Evaluating:";

/// `error.log` writer. Never truncated or rotated.
#[derive(Debug, Clone)]
pub struct ErrorLog {
    path: PathBuf,
}

impl ErrorLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one entry: local timestamp, the serialized item, then the error
    /// with its full cause chain, followed by a blank line.
    pub fn append(&self, item: &str, error: &anyhow::Error) -> io::Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        let entry = format!(
            "{} {ENTRY_MARKER}\n{item}\n{error:?}\n\n",
            Local::now().format("%Y-%m-%d %H:%M:%S"),
        );
        file.write_all(entry.as_bytes())?;
        file.flush()
    }
}

/// Number of entries in an error log's text.
pub fn count_entries(text: &str) -> usize {
    text.matches(ENTRY_MARKER).count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;

    #[test]
    fn entries_are_appended_with_cause_chain() {
        let dir = tempfile::tempdir().unwrap();
        let log = ErrorLog::new(dir.path().join("error.log"));

        let err = Err::<(), _>(anyhow::anyhow!("connection reset"))
            .context("judge call failed")
            .unwrap_err();
        log.append("{\"problem\": \"B\"}", &err).unwrap();
        log.append("{\"problem\": \"D\"}", &anyhow::anyhow!("boom")).unwrap();

        let text = std::fs::read_to_string(log.path()).unwrap();
        assert_eq!(count_entries(&text), 2);
        assert!(text.contains("\"problem\": \"B\""));
        assert!(text.contains("judge call failed"));
        assert!(text.contains("connection reset"));
        assert!(text.ends_with("\n\n"));
    }
}
