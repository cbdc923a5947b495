//! Telemetry aggregation and reporting
//!
//! Collected run artifacts live under a data directory, one subdirectory per
//! run:
//!
//! ```text
//! data/
//!   <run>/deploy_type                      deployment names, one per line
//!   <run>/collected_*/remote/<svc>/stats.csv  backend telemetry
//!   <run>/collected_*/client_seed_<seed>_run_<n>/latency_data.csv
//!   graphs/                                 report output (never a run)
//! ```
//!
//! Aggregation is best effort: anything missing is logged and skipped.

pub mod backend;
pub mod client;
pub mod plot;

use crate::errors::{FlapError, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::warn;

/// Report output directory under the data root
pub const GRAPHS_DIR: &str = "graphs";

/// Marker file naming a run's deployment variants
pub const DEPLOY_TYPE_FILE: &str = "deploy_type";

/// Prefix of the per-collection subdirectories of a run
pub const COLLECTED_PREFIX: &str = "collected";

/// Subdirectories of `dir` accepted by `keep`, sorted by name
pub(crate) fn sorted_subdirs<F>(dir: &Path, keep: F) -> Result<Vec<PathBuf>>
where
    F: Fn(&str) -> bool,
{
    let mut dirs = Vec::new();
    for entry in fs::read_dir(dir).map_err(|e| FlapError::io(dir, e))? {
        let entry = entry.map_err(|e| FlapError::io(dir, e))?;
        let path = entry.path();
        let keep_it = path.is_dir() && path.file_name().and_then(|n| n.to_str()).is_some_and(|n| keep(n));
        if keep_it {
            dirs.push(path);
        }
    }
    dirs.sort();
    Ok(dirs)
}

/// Run directories under the data root, excluding the graphs output
pub(crate) fn run_dirs(data_dir: &Path) -> Result<Vec<PathBuf>> {
    sorted_subdirs(data_dir, |name| name != GRAPHS_DIR)
}

/// `collected*` directories of a run
pub(crate) fn collected_dirs(run_dir: &Path) -> Result<Vec<PathBuf>> {
    sorted_subdirs(run_dir, |name| name.starts_with(COLLECTED_PREFIX))
}

/// Non-empty trimmed lines of a run's `deploy_type`, or `None` when absent
pub fn read_deploy_types(run_dir: &Path) -> Result<Option<Vec<String>>> {
    let path = run_dir.join(DEPLOY_TYPE_FILE);
    if !path.is_file() {
        return Ok(None);
    }
    let contents = fs::read_to_string(&path).map_err(|e| FlapError::io(&path, e))?;
    Ok(Some(
        contents
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect(),
    ))
}

/// Copy `src` into `dir`, optionally renamed, returning the new path
pub(crate) fn copy_into(src: &Path, dir: &Path, name: Option<&str>) -> Result<PathBuf> {
    let file_name = match name {
        Some(name) => PathBuf::from(name),
        None => PathBuf::from(
            src.file_name()
                .ok_or_else(|| FlapError::config(format!("{} has no file name", src.display())))?,
        ),
    };
    let dest = dir.join(file_name);
    if src != dest {
        fs::copy(src, &dest).map_err(|e| FlapError::io(&dest, e))?;
    }
    Ok(dest)
}

pub(crate) fn create_dir_all(dir: &Path) -> Result<()> {
    fs::create_dir_all(dir).map_err(|e| FlapError::io(dir, e))
}

/// Arithmetic mean; `None` for an empty slice
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

pub(crate) fn warn_skip(what: &str, path: &Path) {
    warn!(path = %path.display(), "Skipping {}", what);
}
