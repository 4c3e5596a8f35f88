//! Artifact persistence.
//!
//! Writes the raw request table, the replica-sample table and the summary
//! document. Each artifact is written to a temp path in the same directory
//! and atomically renamed into place, so a crashed run never leaves a
//! half-written file where the analysis scripts would pick it up.

use serde::Serialize;
use std::path::{Path, PathBuf};

use crate::config::OutputConfig;
use crate::error::HarnessError;
use crate::record::{ReplicaSample, RequestRecord, RunSummary};

/// Persists run artifacts under `{out_dir}/{label}_*`.
pub struct Reporter {
    out_dir: PathBuf,
    label: String,
}

impl Reporter {
    pub fn new(output: &OutputConfig) -> Self {
        Self {
            out_dir: output.out_dir.clone(),
            label: output.label.clone(),
        }
    }

    pub fn requests_path(&self) -> PathBuf {
        self.out_dir.join(format!("{}_requests.csv", self.label))
    }

    pub fn replicas_path(&self) -> PathBuf {
        self.out_dir.join(format!("{}_replicas.csv", self.label))
    }

    pub fn summary_path(&self) -> PathBuf {
        self.out_dir.join(format!("{}_summary.json", self.label))
    }

    /// Write all artifacts. The replica table is skipped when no samples
    /// were taken. Any write failure is fatal and names the attempted path.
    pub fn persist(
        &self,
        records: &[RequestRecord],
        summary: &RunSummary,
        replicas: &[ReplicaSample],
    ) -> Result<(), HarnessError> {
        std::fs::create_dir_all(&self.out_dir).map_err(|source| HarnessError::Persist {
            path: self.out_dir.clone(),
            source,
        })?;

        write_atomic(
            &self.requests_path(),
            &to_csv(records, &RequestRecord::CSV_HEADER)?,
        )?;

        if !replicas.is_empty() {
            write_atomic(
                &self.replicas_path(),
                &to_csv(replicas, &ReplicaSample::CSV_HEADER)?,
            )?;
        }

        let summary_json =
            serde_json::to_vec_pretty(summary).map_err(|e| HarnessError::Persist {
                path: self.summary_path(),
                source: std::io::Error::other(e),
            })?;
        write_atomic(&self.summary_path(), &summary_json)?;

        tracing::info!(
            requests = records.len(),
            replicas = replicas.len(),
            dir = %self.out_dir.display(),
            "Persisted run artifacts"
        );
        Ok(())
    }
}

/// Serialize rows to CSV. The header is written explicitly so a table with
/// zero rows still re-parses as an empty record set rather than garbage.
fn to_csv<T: Serialize>(rows: &[T], header: &[&str]) -> Result<Vec<u8>, HarnessError> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(Vec::new());
    writer
        .write_record(header)
        .map_err(|e| HarnessError::Internal(anyhow::Error::new(e).context("CSV header")))?;
    for row in rows {
        writer
            .serialize(row)
            .map_err(|e| HarnessError::Internal(anyhow::Error::new(e).context("CSV encoding")))?;
    }
    writer
        .into_inner()
        .map_err(|e| HarnessError::Internal(anyhow::anyhow!("CSV flush failed: {e}")))
}

/// Temp file next to the target, then rename. The rename is atomic within
/// one filesystem, which the same-directory temp path guarantees.
fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), HarnessError> {
    let tmp = path.with_extension("tmp");
    let result = std::fs::write(&tmp, bytes).and_then(|_| std::fs::rename(&tmp, path));
    result.map_err(|source| {
        let _ = std::fs::remove_file(&tmp);
        HarnessError::Persist {
            path: path.to_path_buf(),
            source,
        }
    })
}
