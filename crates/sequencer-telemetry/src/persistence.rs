use crate::registry::Registry;
use std::path::{Path, PathBuf};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to encode metrics snapshot: {0}")]
    Encode(#[from] serde_json::Error),
}

/// How many `metrics_<millis>.json` snapshots to retain.
pub const RETAINED_SNAPSHOTS: usize = 24;

/// Write `registry`'s state to `dir/metrics_<millis>.json`, then prune all
/// but the newest `RETAINED_SNAPSHOTS` files. Mirrors the checkpoint
/// engine's create-then-retain cadence, since both are periodic
/// single-writer snapshot stores.
pub async fn save_snapshot(dir: &Path, registry: &Registry) -> Result<PathBuf, Error> {
    tokio::fs::create_dir_all(dir)
        .await
        .map_err(|source| Error::Io { path: dir.to_path_buf(), source })?;

    let millis = crate::registry::now_ms();
    let path = dir.join(format!("metrics_{millis}.json"));
    let tmp_path = dir.join(format!(".metrics_{millis}.json.tmp"));

    let body = serde_json::to_vec_pretty(&registry.to_snapshot())?;
    tokio::fs::write(&tmp_path, &body)
        .await
        .map_err(|source| Error::Io { path: tmp_path.clone(), source })?;
    tokio::fs::rename(&tmp_path, &path)
        .await
        .map_err(|source| Error::Io { path: path.clone(), source })?;

    prune(dir).await?;
    Ok(path)
}

/// Load the newest valid snapshot in `dir`, skipping corrupt files rather
/// than failing outright.
pub async fn load_latest(dir: &Path) -> Option<serde_json::Value> {
    let mut entries = list_snapshots(dir).await;
    entries.sort_by(|a, b| b.1.cmp(&a.1));

    for (path, _millis) in entries {
        if let Ok(bytes) = tokio::fs::read(&path).await {
            if let Ok(value) = serde_json::from_slice(&bytes) {
                return Some(value);
            }
        }
    }
    None
}

async fn prune(dir: &Path) -> Result<(), Error> {
    let mut entries = list_snapshots(dir).await;
    if entries.len() <= RETAINED_SNAPSHOTS {
        return Ok(());
    }
    entries.sort_by(|a, b| b.1.cmp(&a.1));
    for (path, _millis) in entries.into_iter().skip(RETAINED_SNAPSHOTS) {
        let _ = tokio::fs::remove_file(&path).await;
    }
    Ok(())
}

async fn list_snapshots(dir: &Path) -> Vec<(PathBuf, i64)> {
    let mut out = Vec::new();
    let Ok(mut rd) = tokio::fs::read_dir(dir).await else {
        return out;
    };
    while let Ok(Some(entry)) = rd.next_entry().await {
        let path = entry.path();
        let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
            continue;
        };
        let Some(millis_str) = stem.strip_prefix("metrics_") else {
            continue;
        };
        if let Ok(millis) = millis_str.parse::<i64>() {
            out.push((path, millis));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn save_then_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let registry = Registry::new();
        registry.incr("ops.accepted", 3.0);

        save_snapshot(dir.path(), &registry).await.unwrap();
        let loaded = load_latest(dir.path()).await.unwrap();

        let restored = Registry::new();
        restored.load_snapshot(&loaded);
        assert_eq!(restored.latest("ops.accepted"), Some(3.0));
    }

    #[tokio::test]
    async fn retains_only_newest() {
        let dir = tempfile::tempdir().unwrap();
        for millis in 0..(RETAINED_SNAPSHOTS + 5) {
            let path = dir.path().join(format!("metrics_{millis}.json"));
            tokio::fs::write(&path, b"{}").await.unwrap();
        }
        prune(dir.path()).await.unwrap();
        let remaining = list_snapshots(dir.path()).await;
        assert_eq!(remaining.len(), RETAINED_SNAPSHOTS);
    }

    #[tokio::test]
    async fn corrupt_file_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        tokio::fs::write(dir.path().join("metrics_100.json"), b"not json")
            .await
            .unwrap();
        tokio::fs::write(dir.path().join("metrics_50.json"), b"{\"a\":1}")
            .await
            .unwrap();
        // newest (100) is corrupt, should fall back to 50
        let loaded = load_latest(dir.path()).await.unwrap();
        assert_eq!(loaded.get("a").and_then(|v| v.as_i64()), Some(1));
    }
}
