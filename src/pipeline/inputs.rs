//! Discovery of pipeline inputs laid out as `<in_dir>/<bin>/<file>`.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// One file to push through the stage chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineInput {
    /// Energy-bin directory name, e.g. `5.0`.
    pub bin: String,
    /// Run name, e.g. `000123`.
    pub run: String,
    pub path: PathBuf,
}

impl PipelineInput {
    /// Key of the item: `{bin}_{run}`.
    pub fn key(&self) -> String {
        format!("{}_{}", self.bin, self.run)
    }
}

/// List the inputs of the given bins, or of every bin directory when `bins`
/// is empty.
///
/// Bins are visited in the order given (sorted when discovered), files in
/// name order. Compressed `.bz2` files are skipped. The run name is the part
/// of the file name after `DAT`, or the whole name when there is none. Two
/// files of one bin that yield the same run name are a configuration error,
/// since their keys would collide.
pub fn discover_inputs(in_dir: &Path, bins: &[String]) -> Result<Vec<PipelineInput>> {
    let bins = if bins.is_empty() {
        let mut found = Vec::new();
        for entry in std::fs::read_dir(in_dir)? {
            let entry = entry?;
            if entry.file_type()?.is_dir() {
                found.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        found.sort();
        found
    } else {
        bins.to_vec()
    };

    let mut inputs = Vec::new();
    let mut keys = HashSet::new();
    for bin in bins {
        let dir = in_dir.join(&bin);
        if !dir.is_dir() {
            return Err(Error::Config(format!(
                "input bin directory {} does not exist",
                dir.display()
            )));
        }

        let mut files = Vec::new();
        for entry in std::fs::read_dir(&dir)? {
            let entry = entry?;
            if entry.file_type()?.is_file() {
                files.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        files.sort();

        for name in files {
            if name.ends_with(".bz2") {
                continue;
            }
            let input = PipelineInput {
                bin: bin.clone(),
                run: run_name(&name).to_string(),
                path: dir.join(&name),
            };
            if !keys.insert(input.key()) {
                return Err(Error::Config(format!(
                    "{} gives key {} a second time",
                    input.path.display(),
                    input.key()
                )));
            }
            inputs.push(input);
        }
    }
    Ok(inputs)
}

fn run_name(file_name: &str) -> &str {
    match file_name.split_once("DAT") {
        Some((_, run)) if !run.is_empty() => run,
        _ => file_name,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_name_follows_dat_prefix() {
        assert_eq!(run_name("DAT000123"), "000123");
        assert_eq!(run_name("corsika_DAT000042"), "000042");
        assert_eq!(run_name("shower.i3"), "shower.i3");
        assert_eq!(run_name("DAT"), "DAT");
    }

    #[test]
    fn key_joins_bin_and_run() {
        let input = PipelineInput {
            bin: "5.0".to_string(),
            run: "000123".to_string(),
            path: PathBuf::from("/data/5.0/DAT000123"),
        };
        assert_eq!(input.key(), "5.0_000123");
    }
}
