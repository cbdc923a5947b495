//! Run output directory and result record persistence

use crate::errors::{FlapError, Result};
use crate::types::ResultRecord;
use chrono::Local;
use std::fs;
use std::path::{Path, PathBuf};

/// File name of the per-run result record
pub const RESULT_FILE_NAME: &str = "extra_data.json";

/// Parent of the timestamped default output directories
pub const DEFAULT_RUNS_DIR: &str = "runs";

/// Timestamped output path used when none is configured
pub fn default_output_dir() -> PathBuf {
    Path::new(DEFAULT_RUNS_DIR).join(Local::now().format("%Y%m%d-%H%M%S").to_string())
}

/// Create the run's output directory
///
/// Parents are created as needed, the directory itself must not exist yet.
pub fn prepare_output_dir(configured: Option<&Path>) -> Result<PathBuf> {
    let dir = configured.map(Path::to_path_buf).unwrap_or_else(default_output_dir);
    if let Some(parent) = dir.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| FlapError::io(parent, e))?;
    }
    fs::create_dir(&dir).map_err(|e| FlapError::io(&dir, e))?;
    Ok(dir)
}

/// Write `extra_data.json` into `dir`, returning its path
pub fn write_result(dir: &Path, record: &ResultRecord) -> Result<PathBuf> {
    let path = dir.join(RESULT_FILE_NAME);
    let file = fs::File::create(&path).map_err(|e| FlapError::io(&path, e))?;
    serde_json::to_writer(file, record)?;
    Ok(path)
}

/// Read a previously written result record
pub fn read_result(dir: &Path) -> Result<ResultRecord> {
    let path = dir.join(RESULT_FILE_NAME);
    let file = fs::File::open(&path).map_err(|e| FlapError::io(&path, e))?;
    Ok(serde_json::from_reader(file)?)
}
