//! Bronze snapshot files
//!
//! One run's worth of normalized rows for one relation lands as a single
//! immutable NDJSON file named from the UTC wall clock
//! (`YYYYMMDD_HHMMSS.ndjson`). Snapshots are never rewritten; the
//! lexicographically greatest file name in a relation directory is the
//! authoritative input for the next merge.

use chrono::Utc;
use rdp_common::{RdpError, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Snapshot file extension
pub const SNAPSHOT_EXT: &str = "ndjson";

/// Outcome of a snapshot write
#[derive(Debug, Clone, PartialEq)]
pub enum SnapshotWrite {
    /// A new snapshot file was created with this many rows
    Written { path: PathBuf, rows: usize },
    /// The row set was empty: nothing written, by design. An empty file
    /// would become the "latest" snapshot and starve the merger.
    SkippedEmpty,
}

/// Serialize rows as NDJSON into a new timestamp-named file under `dir`
///
/// The directory must already exist; creating it belongs to the deployment,
/// and a missing directory here means the pipeline is misconfigured.
pub fn write_snapshot<T: Serialize>(rows: &[T], dir: &Path) -> Result<SnapshotWrite> {
    if !dir.is_dir() {
        return Err(RdpError::config(format!(
            "snapshot directory does not exist: {}",
            dir.display()
        )));
    }
    if rows.is_empty() {
        debug!(dir = %dir.display(), "Empty row set, skipping snapshot");
        return Ok(SnapshotWrite::SkippedEmpty);
    }

    let stamp = Utc::now().format("%Y%m%d_%H%M%S").to_string();
    let path = next_free_path(dir, &stamp);

    let file = File::create(&path)?;
    let mut writer = BufWriter::new(file);
    for row in rows {
        serde_json::to_writer(&mut writer, row)?;
        writer.write_all(b"\n")?;
    }
    writer.flush()?;

    info!(path = %path.display(), rows = rows.len(), "Wrote bronze snapshot");
    Ok(SnapshotWrite::Written {
        path,
        rows: rows.len(),
    })
}

/// Pick a path that does not collide with an existing snapshot
///
/// Two runs within the same second would otherwise target the same name;
/// the `_1`, `_2`, ... suffix sorts after the unsuffixed name (`_` > `.` in
/// ASCII), so latest-selection still favors the later writer.
fn next_free_path(dir: &Path, stamp: &str) -> PathBuf {
    let base = dir.join(format!("{stamp}.{SNAPSHOT_EXT}"));
    if !base.exists() {
        return base;
    }
    let mut n = 1u32;
    loop {
        let candidate = dir.join(format!("{stamp}_{n}.{SNAPSHOT_EXT}"));
        if !candidate.exists() {
            return candidate;
        }
        n += 1;
    }
}

/// Locate the latest snapshot in a relation directory, if any
///
/// Authoritative selection rule: list every `*.ndjson` entry and take the
/// lexicographically greatest file name (timestamp names sort
/// chronologically). `Ok(None)` when the directory holds no snapshot.
pub fn try_latest_snapshot(dir: &Path) -> Result<Option<PathBuf>> {
    let mut latest: Option<PathBuf> = None;
    let entries = std::fs::read_dir(dir).map_err(|e| {
        RdpError::config(format!(
            "cannot list snapshot directory {}: {e}",
            dir.display()
        ))
    })?;

    for entry in entries {
        let path = entry?.path();
        if path.extension().and_then(|e| e.to_str()) != Some(SNAPSHOT_EXT) {
            continue;
        }
        if latest.as_ref().map_or(true, |l| path.file_name() > l.file_name()) {
            latest = Some(path);
        }
    }

    Ok(latest)
}

/// Like [`try_latest_snapshot`], but a missing snapshot is fatal — the
/// merge step has nothing to consume
pub fn latest_snapshot(dir: &Path) -> Result<PathBuf> {
    try_latest_snapshot(dir)?.ok_or_else(|| {
        RdpError::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("no snapshot found in {}", dir.display()),
        ))
    })
}

/// Load every row of a snapshot file
pub fn read_snapshot<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    let file = File::open(path)?;
    let reader = BufReader::new(file);
    let mut rows = Vec::new();
    for line in reader.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        rows.push(serde_json::from_str(&line)?);
    }
    Ok(rows)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use tempfile::TempDir;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Row {
        sku: String,
        amount: f64,
    }

    fn rows() -> Vec<Row> {
        vec![
            Row { sku: "SKU000001".into(), amount: 10.1 },
            Row { sku: "SKU000002".into(), amount: 12.0 },
        ]
    }

    #[test]
    fn test_empty_rows_skip_write() {
        let dir = TempDir::new().unwrap();
        let outcome = write_snapshot::<Row>(&[], dir.path()).unwrap();
        assert_eq!(outcome, SnapshotWrite::SkippedEmpty);
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_missing_directory_is_config_error() {
        let err = write_snapshot(&rows(), Path::new("/nonexistent/bronze/products")).unwrap_err();
        assert!(matches!(err, RdpError::Config(_)));
    }

    #[test]
    fn test_write_then_read_round_trip() {
        let dir = TempDir::new().unwrap();
        let outcome = write_snapshot(&rows(), dir.path()).unwrap();
        let path = match outcome {
            SnapshotWrite::Written { path, rows } => {
                assert_eq!(rows, 2);
                path
            },
            SnapshotWrite::SkippedEmpty => panic!("expected a written snapshot"),
        };
        let name = path.file_name().unwrap().to_str().unwrap();
        assert!(name.ends_with(".ndjson"));
        assert_eq!(name.len(), "YYYYMMDD_HHMMSS.ndjson".len());

        let loaded: Vec<Row> = read_snapshot(&path).unwrap();
        assert_eq!(loaded, rows());
    }

    #[test]
    fn test_same_second_writes_do_not_overwrite() {
        let dir = TempDir::new().unwrap();
        // Force the collision: both writes land within one second virtually
        // always; loop to be certain.
        let mut paths = Vec::new();
        for _ in 0..3 {
            if let SnapshotWrite::Written { path, .. } = write_snapshot(&rows(), dir.path()).unwrap()
            {
                paths.push(path);
            }
        }
        paths.sort();
        paths.dedup();
        assert_eq!(paths.len(), 3, "each write must create a distinct file");
    }

    #[test]
    fn test_latest_snapshot_picks_greatest_name() {
        let dir = TempDir::new().unwrap();
        for name in [
            "20240101_000000.ndjson",
            "20240102_120000.ndjson",
            "20240102_115959.ndjson",
            "notes.txt",
        ] {
            std::fs::write(dir.path().join(name), "{}\n").unwrap();
        }
        let latest = latest_snapshot(dir.path()).unwrap();
        assert_eq!(
            latest.file_name().unwrap().to_str().unwrap(),
            "20240102_120000.ndjson"
        );
    }

    #[test]
    fn test_collision_suffix_sorts_after_base_name() {
        let dir = TempDir::new().unwrap();
        for name in ["20240102_120000.ndjson", "20240102_120000_1.ndjson"] {
            std::fs::write(dir.path().join(name), "{}\n").unwrap();
        }
        let latest = latest_snapshot(dir.path()).unwrap();
        assert_eq!(
            latest.file_name().unwrap().to_str().unwrap(),
            "20240102_120000_1.ndjson"
        );
    }

    #[test]
    fn test_no_snapshot_is_an_error() {
        let dir = TempDir::new().unwrap();
        assert!(latest_snapshot(dir.path()).is_err());
    }

    #[test]
    fn test_try_latest_snapshot_on_empty_dir_is_none() {
        let dir = TempDir::new().unwrap();
        assert_eq!(try_latest_snapshot(dir.path()).unwrap(), None);
        // an unreadable directory is still an error, not None
        assert!(try_latest_snapshot(Path::new("/nonexistent/bronze/x")).is_err());
    }
}
