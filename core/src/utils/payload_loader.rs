use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, warn};

use crate::error::ScanError;
use crate::utils::read_lines;

pub const DEFAULT_PAYLOAD_DIR: &str = "payloads";
pub const PAYLOAD_EXTENSION: &str = "txt";

/// Fallback set for `--builtin` runs.
pub const BUILTIN_XSS: &[&str] = &[
    "<script>alert(1)</script>",
    r#"" onmouseover=alert(1)"#,
    "'><img src=x onerror=alert(1)>",
    "javascript:alert(1)",
];

/// Ordered, content-deduplicated payload list.
#[derive(Debug, Clone, Default)]
pub struct PayloadLoader {
    payloads: Vec<String>,
    seen: HashSet<String>,
}

impl PayloadLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads a newline-delimited payload file.
    ///
    /// Lines are trimmed and blank ones skipped. A missing, unreadable or
    /// empty file is `SourceUnavailable`.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ScanError> {
        let path = path.as_ref();
        let lines = read_lines(path).map_err(|e| ScanError::source_unavailable(path, e.to_string()))?;

        let mut loader = Self::new();
        loader.extend(lines);
        if loader.is_empty() {
            return Err(ScanError::source_unavailable(path, "no payloads in file"));
        }
        debug!("Loaded {} payload(s) from {:?}", loader.len(), path);
        Ok(loader)
    }

    pub fn builtin() -> Self {
        let mut loader = Self::new();
        loader.extend(BUILTIN_XSS.iter().map(|s| s.to_string()));
        loader
    }

    /// Adds a payload unless an identical one is already queued.
    pub fn add(&mut self, payload: String) {
        if self.seen.insert(payload.clone()) {
            self.payloads.push(payload);
        }
    }

    pub fn extend(&mut self, payloads: impl IntoIterator<Item = String>) {
        for payload in payloads {
            self.add(payload);
        }
    }

    pub fn len(&self) -> usize {
        self.payloads.len()
    }

    pub fn is_empty(&self) -> bool {
        self.payloads.is_empty()
    }

    pub fn payloads(&self) -> &[String] {
        &self.payloads
    }

    pub fn into_payloads(self) -> Vec<String> {
        self.payloads
    }
}

/// Lists `*.txt` files in a payload directory, sorted by file name.
pub fn list_payload_files(dir: impl AsRef<Path>) -> Result<Vec<PathBuf>, ScanError> {
    let dir = dir.as_ref();
    let entries = fs::read_dir(dir).map_err(|e| ScanError::source_unavailable(dir, e.to_string()))?;

    let mut files: Vec<PathBuf> = entries
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry.path()),
            Err(e) => {
                warn!("Skipping unreadable entry in {:?}: {}", dir, e);
                None
            }
        })
        .filter(|path| path.is_file())
        .filter(|path| {
            path.extension()
                .and_then(|ext| ext.to_str())
                .map(|ext| ext.eq_ignore_ascii_case(PAYLOAD_EXTENSION))
                .unwrap_or(false)
        })
        .collect();
    files.sort();

    if files.is_empty() {
        return Err(ScanError::source_unavailable(dir, "no .txt payload files"));
    }
    Ok(files)
}
