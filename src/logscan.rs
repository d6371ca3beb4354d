//! After-the-fact failure detection over the `.err` logs a pool leaves behind.
//!
//! The pool never judges a task. Whether a task failed is read back from
//! the last line it wrote to stderr. This module only reads; it never
//! removes logs or artifacts.

use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::error::Result;

/// Line prefixes that classify the last line of a stderr log.
#[derive(Debug, Clone)]
pub struct Markers {
    pub failure: Vec<String>,
    pub ok: Vec<String>,
}

impl Default for Markers {
    fn default() -> Self {
        Self {
            failure: ["Exception", "RuntimeError", "json.decoder.JSONDecodeError", "Traceback"]
                .map(String::from)
                .to_vec(),
            ok: vec!["INFO".to_string()],
        }
    }
}

/// How one log was judged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "verdict", rename_all = "snake_case")]
pub enum Verdict {
    Clean,
    Failed { marker: String },
    Unknown { last_line: String },
}

/// Verdict for one `.err` file.
#[derive(Debug, Clone, Serialize)]
pub struct LogVerdict {
    pub key: String,
    pub path: PathBuf,
    #[serde(flatten)]
    pub verdict: Verdict,
}

impl LogVerdict {
    pub fn is_failed(&self) -> bool {
        matches!(self.verdict, Verdict::Failed { .. })
    }
}

/// Judge a stderr log from its contents.
pub fn classify(contents: &str, markers: &Markers) -> Verdict {
    let Some(last) = contents.lines().rev().find(|l| !l.trim().is_empty()) else {
        return Verdict::Clean;
    };
    let last = last.trim();

    if let Some(marker) = markers.failure.iter().find(|m| last.starts_with(m.as_str())) {
        return Verdict::Failed {
            marker: marker.clone(),
        };
    }
    if markers.ok.iter().any(|m| last.starts_with(m.as_str())) {
        return Verdict::Clean;
    }
    Verdict::Unknown {
        last_line: last.to_string(),
    }
}

/// Scan every `*.err` file directly inside `dir`, sorted by file name.
pub fn scan(dir: &Path, markers: &Markers) -> Result<Vec<LogVerdict>> {
    let mut paths = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() && path.extension().is_some_and(|ext| ext == "err") {
            paths.push(path);
        }
    }
    paths.sort();

    let mut verdicts = Vec::with_capacity(paths.len());
    for path in paths {
        let bytes = std::fs::read(&path)?;
        let verdict = classify(&String::from_utf8_lossy(&bytes), markers);
        verdicts.push(LogVerdict {
            key: key_for(&path),
            path,
            verdict,
        });
    }
    Ok(verdicts)
}

/// `output_5.0_000123.err` -> `5.0_000123`. Logs not written by a pool keep
/// their full stem.
fn key_for(path: &Path) -> String {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    match stem.strip_prefix("output_") {
        Some(key) => key.to_string(),
        None => stem,
    }
}
