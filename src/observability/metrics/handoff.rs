//! # Rotation Metrics Handoff
//!
//! `rotate-secrets` is started by the ACME client, not by the daemon, and
//! exits right after the run. Before exiting it writes a [`RotationSnapshot`]
//! into `ROTATION_METRICS_DIR`. After every renewal run the daemon adds each
//! snapshot it finds there to its own counters and removes the file.
//!
//! Snapshots are written under a temporary name and renamed into place, so
//! the daemon never reads a half-written file.

use super::rotation_metrics::{record_rotation_snapshot, RotationSnapshot};
use crate::model::sanitize_name_component;
use anyhow::{Context, Result};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

const SNAPSHOT_EXTENSION: &str = "json";

/// Write a snapshot as `{dir}/{name}.json`, creating `dir` if needed
pub async fn write_rotation_snapshot(
    dir: &Path,
    name: &str,
    snapshot: &RotationSnapshot,
) -> Result<PathBuf> {
    tokio::fs::create_dir_all(dir)
        .await
        .with_context(|| format!("Failed to create {}", dir.display()))?;

    let name = sanitize_name_component(name);
    let path = dir.join(format!("{name}.{SNAPSHOT_EXTENSION}"));
    let partial = dir.join(format!(".{name}.partial"));

    let body = serde_json::to_vec(snapshot).context("Failed to encode rotation metrics")?;
    tokio::fs::write(&partial, body)
        .await
        .with_context(|| format!("Failed to write {}", partial.display()))?;
    tokio::fs::rename(&partial, &path)
        .await
        .with_context(|| format!("Failed to move rotation metrics into {}", path.display()))?;
    Ok(path)
}

/// Record and remove every snapshot in `dir`, returning how many were recorded
///
/// A missing directory means no rotation has run yet. Unreadable files are
/// logged and removed so they are not reported again.
pub async fn collect_rotation_snapshots(dir: &Path) -> Result<usize> {
    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(0),
        Err(e) => return Err(e).with_context(|| format!("Failed to list {}", dir.display())),
    };

    let mut recorded = 0;
    while let Some(entry) = entries
        .next_entry()
        .await
        .with_context(|| format!("Failed to list {}", dir.display()))?
    {
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some(SNAPSHOT_EXTENSION) {
            continue;
        }

        match read_snapshot(&path).await {
            Ok(snapshot) => {
                record_rotation_snapshot(&snapshot);
                recorded += 1;
                debug!("Recorded rotation metrics from {}", path.display());
            }
            Err(e) => warn!("Discarding rotation metrics file {}: {:#}", path.display(), e),
        }

        if let Err(e) = tokio::fs::remove_file(&path).await {
            warn!("Failed to remove {}: {}", path.display(), e);
        }
    }
    Ok(recorded)
}

async fn read_snapshot(path: &Path) -> Result<RotationSnapshot> {
    let body = tokio::fs::read(path).await.context("Failed to read file")?;
    serde_json::from_slice(&body).context("Invalid rotation metrics")
}
