use log::debug;
use nightwhisper_core::{Store, StoreError};
use serde_json::{Map, Value};
use std::cell::RefCell;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// A store backed by one JSON object file, written through on every set.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    entries: RefCell<Map<String, Value>>,
}

impl FileStore {
    /// Open `path`. A missing file is an empty store.
    ///
    /// # Errors
    ///
    /// Fails when the file exists but cannot be read or is not a JSON object.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let entries = match fs::read(&path) {
            Ok(bytes) if bytes.iter().all(u8::is_ascii_whitespace) => Map::new(),
            Ok(bytes) => match serde_json::from_slice::<Value>(&bytes)? {
                Value::Object(map) => map,
                _ => {
                    return Err(StoreError::Unavailable(format!(
                        "{} does not hold a JSON object",
                        path.display()
                    )));
                }
            },
            Err(err) if err.kind() == ErrorKind::NotFound => Map::new(),
            Err(err) => return Err(StoreError::Unavailable(err.to_string())),
        };
        debug!("opened {} with {} keys", path.display(), entries.len());
        Ok(Self {
            path,
            entries: RefCell::new(entries),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn flush(&self) -> Result<(), StoreError> {
        let bytes = serde_json::to_vec_pretty(&*self.entries.borrow())?;
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|err| StoreError::Unavailable(err.to_string()))?;
        }
        fs::write(&self.path, bytes).map_err(|err| StoreError::Unavailable(err.to_string()))
    }
}

impl Store for FileStore {
    fn get(&self, key: &str) -> Result<Option<Value>, StoreError> {
        Ok(self.entries.borrow().get(key).cloned())
    }

    fn set(&self, key: &str, value: Value) -> Result<(), StoreError> {
        self.entries.borrow_mut().insert(key.to_string(), value);
        self.flush()
    }
}
