//! Signal Output
//!
//! Writes the run's `SignalBatch` as pretty-printed JSON. The file is
//! written next to its destination first and then renamed into place, so
//! readers never see a half-written artifact.

use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::domain::SignalBatch;

#[derive(Error, Debug)]
pub enum OutputError {
    #[error("Failed to serialize signals: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Failed to create output directory {path}: {source}")]
    DirectoryError { path: PathBuf, source: std::io::Error },

    #[error("Failed to write signals file {path}: {source}")]
    WriteError { path: PathBuf, source: std::io::Error },
}

/// Render the batch as the JSON artifact
pub fn render(batch: &SignalBatch) -> Result<String, OutputError> {
    Ok(serde_json::to_string_pretty(batch)?)
}

/// Write the batch to `path`, creating parent directories
pub fn write_batch(batch: &SignalBatch, path: &Path) -> Result<(), OutputError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|source| OutputError::DirectoryError {
            path: parent.to_path_buf(),
            source,
        })?;
    }

    let content = render(batch)?;
    let staging = path.with_extension("json.tmp");
    fs::write(&staging, content).map_err(|source| OutputError::WriteError {
        path: staging.clone(),
        source,
    })?;
    fs::rename(&staging, path).map_err(|source| OutputError::WriteError {
        path: path.to_path_buf(),
        source,
    })?;

    tracing::info!(
        "Signals written: {} ({} tickers, {} failed)",
        path.display(),
        batch.data.len(),
        batch.failures()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{SignalRecord, SignalStatus};
    use chrono::{TimeZone, Utc};
    use tempfile::tempdir;

    fn batch() -> SignalBatch {
        let record = SignalRecord::failure(
            "EURL",
            SignalStatus::DataError,
            None,
            None,
            "GARCH(Exit>3.75, Entry<1.75)".to_string(),
            "No data returned for EURL",
        );
        SignalBatch::new(Utc.with_ymd_and_hms(2024, 6, 14, 21, 0, 0).unwrap(), vec![record])
    }

    #[test]
    fn test_write_creates_directories() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("signals.json");

        write_batch(&batch(), &path).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        let value: serde_json::Value = serde_json::from_str(&content).unwrap();
        assert_eq!(value["updated_at"], "2024-06-14 21:00:00 UTC");
        assert_eq!(value["data"][0]["ticker"], "EURL");
        assert_eq!(value["data"][0]["status"], "data_error");
        assert!(!path.with_extension("json.tmp").exists());
    }

    #[test]
    fn test_overwrites_previous_run() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("signals.json");
        fs::write(&path, "stale").unwrap();

        write_batch(&batch(), &path).unwrap();
        assert!(fs::read_to_string(&path).unwrap().starts_with('{'));
    }

    #[test]
    fn test_render_is_pretty() {
        let text = render(&batch()).unwrap();
        assert!(text.contains("\n  \"data\": ["));
    }
}
