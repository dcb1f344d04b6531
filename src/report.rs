//! Run summary and JSON report output

use crate::dispatch::RangeSpec;
use crate::error::GenError;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::{Path, PathBuf};

/// Why the monitor stopped watching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    /// Every request completed or failed
    Completed,
    /// No request finished for the configured number of intervals
    Stalled,
    /// Cancelled, or every worker went away early
    Aborted,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailureRecord {
    pub index: u64,
    pub path: PathBuf,
    pub error: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub range: RangeSpec,
    pub total: u64,
    pub completed: u64,
    pub failed: u64,
    pub outcome: Outcome,
    pub failures: Vec<FailureRecord>,
}

impl RunSummary {
    pub fn is_success(&self) -> bool {
        self.outcome == Outcome::Completed && self.failed == 0
    }

    pub fn exit_code(&self) -> i32 {
        if self.is_success() {
            0
        } else {
            1
        }
    }

    /// Write the summary as pretty-printed JSON.
    pub fn write_json(&self, path: &Path) -> Result<(), GenError> {
        let json = serde_json::to_vec_pretty(self)
            .map_err(|e| GenError::Internal(format!("failed to serialize report: {e}")))?;

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|source| GenError::IoError {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        std::fs::write(path, json).map_err(|source| GenError::IoError {
            path: path.to_path_buf(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn summary(outcome: Outcome, failed: u64) -> RunSummary {
        let now = Utc::now();
        RunSummary {
            started_at: now,
            finished_at: now,
            range: RangeSpec { start: 0, end: 3 },
            total: 3,
            completed: 3 - failed,
            failed,
            outcome,
            failures: (0..failed)
                .map(|index| FailureRecord {
                    index,
                    path: PathBuf::from(format!("out/output_1_500/qrcode_{}.jpg", index + 1)),
                    error: "Failed to encode QR code: data too long".to_string(),
                })
                .collect(),
        }
    }

    #[test]
    fn test_exit_codes() {
        assert_eq!(summary(Outcome::Completed, 0).exit_code(), 0);
        assert_eq!(summary(Outcome::Completed, 1).exit_code(), 1);
        assert_eq!(summary(Outcome::Stalled, 0).exit_code(), 1);
        assert_eq!(summary(Outcome::Aborted, 0).exit_code(), 1);
    }

    #[test]
    fn test_write_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("reports").join("run.json");

        summary(Outcome::Completed, 1).write_json(&path).unwrap();

        let value: serde_json::Value =
            serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
        assert_eq!(value["outcome"], "completed");
        assert_eq!(value["range"]["end"], 3);
        assert_eq!(value["completed"], 2);
        assert_eq!(value["failures"][0]["index"], 0);
        assert_eq!(
            value["failures"][0]["path"],
            "out/output_1_500/qrcode_1.jpg"
        );
    }
}
