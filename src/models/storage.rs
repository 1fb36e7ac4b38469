use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::Brutal24Error;

pub const USER_KEY: &str = "brutal24_user";
pub const LIKES_KEY: &str = "brutal24_likes";
pub const BANNER_SEEN_KEY: &str = "brutal24_banner_seen";
pub const NOTIFICATIONS_KEY: &str = "brutal24_notifications";

/// Device-local key/value store, one file per key.
#[derive(Clone, Debug)]
pub struct LocalStore {
    dir: PathBuf,
}

pub fn get_storage_dir() -> Result<PathBuf, Brutal24Error> {
    // Check the XDG_DATA_HOME environment variable first
    let base_dir = env::var_os("XDG_DATA_HOME")
        .map(PathBuf::from)
        .or_else(dirs::data_local_dir)
        .ok_or_else(|| Brutal24Error::Storage("Could not find a data directory".to_string()))?;

    Ok(base_dir.join("brutal24"))
}

impl LocalStore {
    pub fn open_default() -> Result<Self, Brutal24Error> {
        Self::open(get_storage_dir()?)
    }

    pub fn open(dir: impl AsRef<Path>) -> Result<Self, Brutal24Error> {
        let dir = dir.as_ref().to_path_buf();

        // Create the directory if it doesn't exist
        fs::create_dir_all(&dir)
            .map_err(|e| Brutal24Error::Storage(format!("Failed to create storage directory: {}", e)))?;

        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", key))
    }

    pub fn get_item(&self, key: &str) -> Result<Option<String>, Brutal24Error> {
        match fs::read_to_string(self.path_for(key)) {
            Ok(data) => Ok(Some(data)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(Brutal24Error::Storage(format!("Failed to read {}: {}", key, e))),
        }
    }

    pub fn set_item(&self, key: &str, value: &str) -> Result<(), Brutal24Error> {
        fs::write(self.path_for(key), value)
            .map_err(|e| Brutal24Error::Storage(format!("Failed to write {}: {}", key, e)))
    }

    /// Typed read. Unreadable or unparseable records count as absent.
    pub fn load<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let data = match self.get_item(key) {
            Ok(Some(data)) => data,
            Ok(None) => return None,
            Err(e) => {
                log::warn!("{}", e);
                return None;
            }
        };

        match serde_json::from_str(&data) {
            Ok(value) => Some(value),
            Err(e) => {
                log::warn!("Discarding corrupt {} record: {}", key, e);
                None
            }
        }
    }

    pub fn save<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<(), Brutal24Error> {
        let json = serde_json::to_string(value)
            .map_err(|e| Brutal24Error::Storage(format!("Failed to serialize {}: {}", key, e)))?;
        self.set_item(key, &json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_key_reads_as_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalStore::open(dir.path()).unwrap();
        assert_eq!(store.get_item(USER_KEY).unwrap(), None);
        assert_eq!(store.load::<Vec<String>>(LIKES_KEY), None);
    }

    #[test]
    fn typed_values_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalStore::open(dir.path()).unwrap();
        store.save(LIKES_KEY, &vec!["p1", "p2"]).unwrap();

        let reopened = LocalStore::open(dir.path()).unwrap();
        assert_eq!(
            reopened.load::<Vec<String>>(LIKES_KEY),
            Some(vec!["p1".to_string(), "p2".to_string()])
        );
    }

    #[test]
    fn corrupt_record_is_treated_as_absent() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalStore::open(dir.path()).unwrap();
        store.set_item(USER_KEY, "{not json").unwrap();
        assert_eq!(store.load::<serde_json::Value>(USER_KEY), None);
    }
}
