//! Job files: one `key command line...` per line.
//!
//! ```text
//! # energy bin 5.0
//! 5.0_000001 sh /sim/5.0/temp/temp_000001.sh
//! 5.0_000002 sh /sim/5.0/temp/temp_000002.sh
//! ```
//!
//! Blank lines and `#` comments are ignored. Keys must be unique within a
//! file since they name the log files.

use std::collections::HashSet;
use std::path::Path;

use crate::error::{Error, Result};
use crate::model::WorkItem;

/// Parse job lines. `origin` is only used in error messages.
pub fn parse_jobs(origin: &str, text: &str) -> Result<Vec<WorkItem<String>>> {
    let mut items = Vec::new();
    let mut seen = HashSet::new();

    for (index, raw) in text.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let parse_err = |message: String| Error::Parse {
            path: origin.to_string(),
            line: index + 1,
            message,
        };

        let (key, command) = match line.split_once(char::is_whitespace) {
            Some((key, rest)) if !rest.trim().is_empty() => (key, rest.trim()),
            _ => return Err(parse_err(format!("job {line:?} has no command"))),
        };
        if !seen.insert(key.to_string()) {
            return Err(parse_err(format!("duplicate job key {key:?}")));
        }

        items.push(WorkItem::new(key, command.to_string()));
    }

    Ok(items)
}

/// Read and parse a job file; `-` reads standard input.
pub fn load_jobs(path: &Path) -> Result<Vec<WorkItem<String>>> {
    if path == Path::new("-") {
        let text = std::io::read_to_string(std::io::stdin())?;
        return parse_jobs("<stdin>", &text);
    }
    let text = std::fs::read_to_string(path)?;
    parse_jobs(&path.display().to_string(), &text)
}
