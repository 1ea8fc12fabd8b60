//! Append-only snapshot and alert history on local disk.
//!
//! Each document is rewritten whole through a temp file in the same directory
//! and renamed over the old one, so readers only ever see a complete file.

use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tempfile::NamedTempFile;
use tracing::{debug, info};

use safeguard_common::{Alert, SafeguardError, Snapshot};

pub const SNAPSHOT_HISTORY_FILE: &str = "monitoring-history.json";
pub const ALERT_HISTORY_FILE: &str = "alert-history.json";

fn storage_err(what: &str, path: &Path, e: impl std::fmt::Display) -> SafeguardError {
    SafeguardError::Storage(format!("{what} {}: {e}", path.display()))
}

/// A document serialized and synced to a temp file beside its target, not
/// yet visible to readers. Dropping it without committing removes the temp file.
#[derive(Debug)]
pub struct StagedWrite {
    tmp: NamedTempFile,
    path: PathBuf,
}

impl StagedWrite {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Rename the staged file over its target.
    pub fn commit(self) -> Result<(), SafeguardError> {
        let Self { tmp, path } = self;
        tmp.persist(&path)
            .map_err(|e| storage_err("cannot replace", &path, e.error))?;
        Ok(())
    }
}

/// Serialize `value` as pretty JSON into a temp file in `path`'s directory.
pub fn stage_json<T: Serialize + ?Sized>(
    path: &Path,
    value: &T,
) -> Result<StagedWrite, SafeguardError> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(dir).map_err(|e| storage_err("cannot create", dir, e))?;

    let tmp = NamedTempFile::new_in(dir)
        .map_err(|e| storage_err("cannot create temp file in", dir, e))?;
    {
        let mut writer = BufWriter::new(tmp.as_file());
        serde_json::to_writer_pretty(&mut writer, value)
            .map_err(|e| storage_err("cannot serialize", path, e))?;
        writer.flush().map_err(|e| storage_err("cannot write", path, e))?;
    }
    tmp.as_file()
        .sync_all()
        .map_err(|e| storage_err("cannot sync", path, e))?;
    Ok(StagedWrite {
        tmp,
        path: path.to_path_buf(),
    })
}

/// Commit staged writes in order. The last one is the commit point.
pub fn commit_all(staged: Vec<StagedWrite>) -> Result<(), SafeguardError> {
    for write in staged {
        write.commit()?;
    }
    Ok(())
}

/// Serialize `value` as pretty JSON and atomically replace `path`.
pub fn write_json_atomic<T: Serialize + ?Sized>(
    path: &Path,
    value: &T,
) -> Result<(), SafeguardError> {
    stage_json(path, value)?.commit()
}

/// Read a JSON array document. A missing file is an empty history.
fn read_history<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>, SafeguardError> {
    match std::fs::read_to_string(path) {
        Ok(raw) => serde_json::from_str(&raw).map_err(|e| storage_err("corrupt history", path, e)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
        Err(e) => Err(storage_err("cannot read", path, e)),
    }
}

#[derive(Debug, Clone)]
pub struct SnapshotStore {
    dir: PathBuf,
    retention: Duration,
}

impl SnapshotStore {
    pub fn new(dir: impl Into<PathBuf>, retention_days: u32) -> Self {
        Self {
            dir: dir.into(),
            retention: Duration::days(i64::from(retention_days)),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn snapshot_path(&self) -> PathBuf {
        self.dir.join(SNAPSHOT_HISTORY_FILE)
    }

    pub fn alert_path(&self) -> PathBuf {
        self.dir.join(ALERT_HISTORY_FILE)
    }

    /// Snapshots in the order they were recorded.
    pub fn load_snapshots(&self) -> Result<Vec<Snapshot>, SafeguardError> {
        read_history(&self.snapshot_path())
    }

    pub fn load_alerts(&self) -> Result<Vec<Alert>, SafeguardError> {
        read_history(&self.alert_path())
    }

    pub fn latest_snapshot(&self) -> Result<Option<Snapshot>, SafeguardError> {
        Ok(self.load_snapshots()?.pop())
    }

    /// Append one cycle's snapshot and alerts, pruning both histories to the
    /// retention window ending at `now`.
    pub fn append(
        &self,
        snapshot: &Snapshot,
        alerts: &[Alert],
        now: DateTime<Utc>,
    ) -> Result<(), SafeguardError> {
        commit_all(self.stage_append(snapshot, alerts, now)?)
    }

    /// Read and prune both histories, then stage the appended documents.
    /// Nothing on disk changes until the returned writes are committed; the
    /// alert history comes first so the snapshot write is the commit point.
    pub fn stage_append(
        &self,
        snapshot: &Snapshot,
        alerts: &[Alert],
        now: DateTime<Utc>,
    ) -> Result<Vec<StagedWrite>, SafeguardError> {
        let cutoff = now - self.retention;
        let mut alert_history = self.load_alerts()?;
        let mut snapshots = self.load_snapshots()?;

        let before = alert_history.len();
        alert_history.retain(|a| a.timestamp >= cutoff);
        let pruned_alerts = before - alert_history.len();
        alert_history.extend(alerts.iter().cloned());

        let before = snapshots.len();
        snapshots.retain(|s| s.timestamp >= cutoff);
        let pruned_snapshots = before - snapshots.len();
        snapshots.push(snapshot.clone());

        let staged = vec![
            stage_json(&self.alert_path(), &alert_history)?,
            stage_json(&self.snapshot_path(), &snapshots)?,
        ];

        if pruned_alerts + pruned_snapshots > 0 {
            info!(
                pruned_snapshots,
                pruned_alerts,
                retention_days = self.retention.num_days(),
                "Pruned history"
            );
        }
        debug!(
            snapshots = snapshots.len(),
            alerts = alert_history.len(),
            "History staged"
        );
        Ok(staged)
    }
}
