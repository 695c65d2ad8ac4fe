//! Registry snapshots on disk.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::error::ServiceError;
use super::registry::{FuelStationNode, Registry};

/// A saved registry: the refresh watermark and every node.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Start time of the last successful refresh.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<DateTime<Utc>>,

    #[serde(default)]
    pub nodes: BTreeMap<String, FuelStationNode>,
}

impl From<Registry> for Snapshot {
    fn from(registry: Registry) -> Self {
        Self {
            date: registry.last_refresh,
            nodes: registry.nodes,
        }
    }
}

impl From<Snapshot> for Registry {
    fn from(snapshot: Snapshot) -> Self {
        Self {
            nodes: snapshot.nodes,
            last_refresh: snapshot.date,
        }
    }
}

/// Somewhere a snapshot can be loaded from and saved to.
pub trait SnapshotStore {
    /// Load the saved snapshot, or `None` if nothing has been saved yet.
    fn load(&self) -> Result<Option<Snapshot>, ServiceError>;

    /// Replace the saved snapshot.
    fn save(&self, snapshot: &Snapshot) -> Result<(), ServiceError>;
}

/// Snapshot stored as a pretty-printed JSON file.
#[derive(Debug, Clone)]
pub struct FileSnapshotStore {
    path: PathBuf,
}

impl FileSnapshotStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Get the snapshot file path.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SnapshotStore for FileSnapshotStore {
    /// A missing file is `None`; an unreadable or corrupt one is an error.
    fn load(&self) -> Result<Option<Snapshot>, ServiceError> {
        let contents = match std::fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(ServiceError::Snapshot {
                    message: format!("failed to read snapshot file: {}", e),
                });
            }
        };

        let snapshot = serde_json::from_str(&contents).map_err(|e| ServiceError::Snapshot {
            message: format!("failed to parse snapshot: {}", e),
        })?;

        Ok(Some(snapshot))
    }

    /// Creates parent directories if they don't exist.
    fn save(&self, snapshot: &Snapshot) -> Result<(), ServiceError> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            std::fs::create_dir_all(parent).map_err(|e| ServiceError::Snapshot {
                message: format!("failed to create snapshot directory: {}", e),
            })?;
        }

        let json = serde_json::to_string_pretty(snapshot).map_err(|e| ServiceError::Snapshot {
            message: format!("failed to serialize snapshot: {}", e),
        })?;

        std::fs::write(&self.path, json).map_err(|e| ServiceError::Snapshot {
            message: format!("failed to write snapshot file: {}", e),
        })?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;
    use tempfile::tempdir;

    fn snapshot() -> Snapshot {
        let node: FuelStationNode = serde_json::from_value(json!({
            "trading_name": "Corner Garage",
            "fuel_prices": [{"fuel_type": "E10", "price": "139.9"}]
        }))
        .unwrap();

        Snapshot {
            date: Some(Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap()),
            nodes: BTreeMap::from([("abc123".to_string(), node)]),
        }
    }

    #[test]
    fn save_and_load_snapshot() {
        let dir = tempdir().unwrap();
        let store = FileSnapshotStore::new(dir.path().join("nodes.json"));

        store.save(&snapshot()).unwrap();
        let loaded = store.load().unwrap();

        assert_eq!(loaded, Some(snapshot()));
    }

    #[test]
    fn missing_file_is_none() {
        let dir = tempdir().unwrap();
        let store = FileSnapshotStore::new(dir.path().join("nonexistent.json"));

        assert_eq!(store.load().unwrap(), None);
    }

    #[test]
    fn corrupt_file_is_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("corrupt.json");
        std::fs::write(&path, "not valid json").unwrap();

        let err = FileSnapshotStore::new(&path).load().unwrap_err();
        assert!(matches!(err, ServiceError::Snapshot { .. }));
    }

    #[test]
    fn save_creates_parent_directories() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("dir").join("nodes.json");
        let store = FileSnapshotStore::new(&path);

        store.save(&snapshot()).unwrap();

        assert!(path.exists());
        assert_eq!(store.path(), path.as_path());
    }

    #[test]
    fn document_shape() {
        let value = serde_json::to_value(snapshot()).unwrap();

        assert_eq!(value["date"], "2025-03-01T12:00:00Z");
        assert_eq!(value["nodes"]["abc123"]["trading_name"], "Corner Garage");
    }

    #[test]
    fn date_omitted_before_first_refresh() {
        let value = serde_json::to_value(Snapshot::default()).unwrap();
        assert_eq!(value, json!({"nodes": {}}));

        let parsed: Snapshot = serde_json::from_value(json!({"nodes": {}})).unwrap();
        assert_eq!(parsed.date, None);
    }

    #[test]
    fn registry_conversion_keeps_watermark() {
        let registry = Registry::from(snapshot());
        assert_eq!(registry.last_refresh, snapshot().date);
        assert_eq!(Snapshot::from(registry), snapshot());
    }
}
