use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, trace, warn};

use crate::domain::TVError;

/// Client local string key-value substrate.
pub trait KeyValueStore {
    fn get_item(&self, key: &str) -> Option<String>;
    fn set_item(&mut self, key: &str, value: &str) -> Result<(), TVError>;
    fn remove_item(&mut self, key: &str) -> Result<(), TVError>;
    fn keys(&self) -> Vec<String>;
}

#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    items: BTreeMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get_item(&self, key: &str) -> Option<String> {
        self.items.get(key).cloned()
    }

    fn set_item(&mut self, key: &str, value: &str) -> Result<(), TVError> {
        self.items.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove_item(&mut self, key: &str) -> Result<(), TVError> {
        self.items.remove(key);
        Ok(())
    }

    fn keys(&self) -> Vec<String> {
        self.items.keys().cloned().collect()
    }
}

/// A JSON object file, rewritten on every change.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    items: BTreeMap<String, String>,
}

impl FileStore {
    /// Opens the store at `path` (`~` and env vars expanded). A missing file is an empty store.
    /// An unreadable JSON file is moved aside to `<path>.corrupt` and the store starts empty.
    pub fn open(path: &str) -> Result<Self, TVError> {
        let expanded = shellexpand::full(path)
            .map_err(|e| TVError::LoadingFailed(format!("Invalid store path {path}: {e}")))?;
        let path = PathBuf::from(expanded.as_ref());

        let items = match fs::read_to_string(&path) {
            Ok(text) if text.trim().is_empty() => BTreeMap::new(),
            Ok(text) => match serde_json::from_str(&text) {
                Ok(items) => items,
                Err(e) => Self::quarantine(&path, e)?,
            },
            Err(e) if e.kind() == ErrorKind::NotFound => BTreeMap::new(),
            Err(e) if e.kind() == ErrorKind::PermissionDenied => {
                return Err(TVError::PermissionDenied);
            }
            Err(e) => return Err(e.into()),
        };
        debug!("Opened view store {:?} with {} keys", path, items.len());
        Ok(FileStore { path, items })
    }

    fn quarantine(
        path: &Path,
        cause: serde_json::Error,
    ) -> Result<BTreeMap<String, String>, TVError> {
        let mut aside = path.as_os_str().to_owned();
        aside.push(".corrupt");
        let aside = PathBuf::from(aside);
        fs::rename(path, &aside).map_err(|e| {
            TVError::LoadingFailed(format!(
                "View store {} is not valid JSON ({cause}) and could not be moved aside: {e}",
                path.display()
            ))
        })?;
        warn!(
            "View store {} is not valid JSON ({cause}), moved to {} and starting empty",
            path.display(),
            aside.display()
        );
        Ok(BTreeMap::new())
    }

    fn persist(&self) -> Result<(), TVError> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_string_pretty(&self.items)?)?;
        fs::rename(&tmp, &self.path)?;
        trace!("Wrote {} keys to {:?}", self.items.len(), self.path);
        Ok(())
    }
}

impl KeyValueStore for FileStore {
    fn get_item(&self, key: &str) -> Option<String> {
        self.items.get(key).cloned()
    }

    fn set_item(&mut self, key: &str, value: &str) -> Result<(), TVError> {
        let previous = self.items.insert(key.to_string(), value.to_string());
        if let Err(e) = self.persist() {
            // Keep memory and disk in step.
            match previous {
                Some(v) => self.items.insert(key.to_string(), v),
                None => self.items.remove(key),
            };
            return Err(e);
        }
        Ok(())
    }

    fn remove_item(&mut self, key: &str) -> Result<(), TVError> {
        if let Some(previous) = self.items.remove(key)
            && let Err(e) = self.persist()
        {
            self.items.insert(key.to_string(), previous);
            return Err(e);
        }
        Ok(())
    }

    fn keys(&self) -> Vec<String> {
        self.items.keys().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn exercise(store: &mut dyn KeyValueStore) {
        assert!(store.keys().is_empty());
        store.set_item("b", "2").unwrap();
        store.set_item("a", "1").unwrap();
        store.set_item("a", "3").unwrap();
        assert_eq!(store.get_item("a").as_deref(), Some("3"));
        assert_eq!(store.keys(), vec!["a", "b"]);
        store.remove_item("a").unwrap();
        store.remove_item("a").unwrap();
        assert_eq!(store.get_item("a"), None);
        assert_eq!(store.keys(), vec!["b"]);
    }

    #[test]
    fn memory_store() {
        exercise(&mut MemoryStore::new());
    }

    #[test]
    fn file_store_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("views.json");
        let path = path.to_str().unwrap();

        let mut store = FileStore::open(path).unwrap();
        exercise(&mut store);

        let reopened = FileStore::open(path).unwrap();
        assert_eq!(reopened.keys(), vec!["b"]);
        assert_eq!(reopened.get_item("b").as_deref(), Some("2"));
    }

    #[test]
    fn corrupt_file_is_moved_aside() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("views.json");
        fs::write(&path, "[1, 2").unwrap();

        let mut store = FileStore::open(path.to_str().unwrap()).unwrap();
        assert!(store.keys().is_empty());
        let aside = dir.path().join("views.json.corrupt");
        assert_eq!(fs::read_to_string(&aside).unwrap(), "[1, 2");

        store.set_item("a", "1").unwrap();
        let reopened = FileStore::open(path.to_str().unwrap()).unwrap();
        assert_eq!(reopened.keys(), vec!["a"]);
    }
}
