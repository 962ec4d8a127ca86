use std::{
    fs::File,
    io::{ErrorKind, Read, Write},
    path::{Path, PathBuf},
};

use anyhow::Result;
use fs4::fs_std::FileExt;
use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, error, warn};

/// Logical keys of the persisted state. The layout behind them must stay
/// stable across versions, since it's the only thing carrying state between
/// runs.
pub const WORK_TIMES: &str = "work-times";
pub const TIMER_STATE: &str = "timer-state";
pub const TIMELINE_DATA: &str = "timeline-data";
pub const NET_ADJUSTMENTS: &str = "net-adjustments";
pub const PROJECTS: &str = "projects";
pub const PROJECT_TIMES: &str = "project-times";
pub const PROJECT_STATES: &str = "project-states";
pub const ACTIVE_PROJECT_ID: &str = "active-project-id";

/// Interface for abstracting durable keyed storage of structured values.
///
/// Reads fall back to the caller's default on any failure, writes are
/// best-effort. Nothing in the engine may assume a write stuck, and nothing
/// above this layer ever sees a storage error.
pub trait StateStore {
    fn read<T: DeserializeOwned>(&self, key: &str, default: T) -> T;

    fn write<T: Serialize>(&self, key: &str, value: &T);

    fn remove(&self, key: &str);
}

/// The main realization of [StateStore]. Each logical key lives in its own
/// json file inside the store directory.
pub struct JsonFileStore {
    dir: PathBuf,
}

impl JsonFileStore {
    pub fn new(dir: PathBuf) -> Result<Self, std::io::Error> {
        std::fs::create_dir_all(&dir)?;

        Ok(Self { dir })
    }

    fn key_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }

    fn read_content(path: &Path) -> std::io::Result<Option<String>> {
        let file = match File::open(path) {
            Ok(v) => v,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e),
        };
        file.lock_shared()?;
        let result = {
            let mut content = String::new();
            (&file).read_to_string(&mut content).map(|_| content)
        };
        file.unlock()?;
        result.map(Some)
    }

    fn write_content(path: &Path, content: &[u8]) -> std::io::Result<()> {
        let mut file = File::create(path)?;
        // Semi-safe acquire-release for a file
        file.lock_exclusive()?;
        let result = file.write_all(content).and_then(|_| file.flush());
        file.unlock()?;
        result
    }
}

impl StateStore for JsonFileStore {
    fn read<T: DeserializeOwned>(&self, key: &str, default: T) -> T {
        let path = self.key_path(key);
        let content = match Self::read_content(&path) {
            Ok(Some(v)) => v,
            Ok(None) => return default,
            Err(e) => {
                warn!("Couldn't read {path:?}: {e}");
                return default;
            }
        };
        match serde_json::from_str(&content) {
            Ok(v) => v,
            Err(e) => {
                // Might happen after a shutdown cutting off a write. The
                // stored value is lost, the documented default takes over.
                warn!("Found illegal json in {path:?}: {e}");
                default
            }
        }
    }

    fn write<T: Serialize>(&self, key: &str, value: &T) {
        let path = self.key_path(key);
        let content = match serde_json::to_vec(value) {
            Ok(v) => v,
            Err(e) => {
                error!("Couldn't serialize value for {key}: {e}");
                return;
            }
        };
        if let Err(e) = Self::write_content(&path, &content) {
            error!("Couldn't write {path:?}: {e}");
        }
    }

    fn remove(&self, key: &str) {
        let path = self.key_path(key);
        match std::fs::remove_file(&path) {
            Ok(_) => debug!("Removed {path:?}"),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => error!("Couldn't remove {path:?}: {e}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use anyhow::Result;
    use tempfile::tempdir;

    use super::{JsonFileStore, StateStore, TIMER_STATE, WORK_TIMES};

    #[test]
    fn read_missing_key_returns_default() -> Result<()> {
        let dir = tempdir()?;
        let store = JsonFileStore::new(dir.path().to_owned())?;

        let value: BTreeMap<String, i64> = store.read(WORK_TIMES, BTreeMap::new());
        assert!(value.is_empty());
        Ok(())
    }

    #[test]
    fn write_then_read_roundtrip() -> Result<()> {
        let dir = tempdir()?;
        let store = JsonFileStore::new(dir.path().to_owned())?;

        let mut map = BTreeMap::new();
        map.insert("2018-07-04".to_string(), 65i64);
        store.write(WORK_TIMES, &map);

        let value: BTreeMap<String, i64> = store.read(WORK_TIMES, BTreeMap::new());
        assert_eq!(value, map);
        Ok(())
    }

    #[test]
    fn corrupt_content_falls_back_to_default() -> Result<()> {
        let dir = tempdir()?;
        let store = JsonFileStore::new(dir.path().to_owned())?;

        std::fs::write(dir.path().join(format!("{TIMER_STATE}.json")), b"{not json")?;

        let value: BTreeMap<String, i64> = store.read(TIMER_STATE, BTreeMap::new());
        assert!(value.is_empty());
        Ok(())
    }

    #[test]
    fn remove_is_silent_on_missing_key() -> Result<()> {
        let dir = tempdir()?;
        let store = JsonFileStore::new(dir.path().to_owned())?;

        store.remove(TIMER_STATE);

        store.write(TIMER_STATE, &42i64);
        store.remove(TIMER_STATE);
        assert_eq!(store.read(TIMER_STATE, 0i64), 0);
        Ok(())
    }
}
