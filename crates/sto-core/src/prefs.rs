//! Namespaced key-value store for UI preferences.
//!
//! The file holds one JSON object; this store owns the entry under its root
//! key and leaves other keys untouched. Paths are dotted (`ui.tab`), creating
//! intermediate objects on `set`. A missing or unreadable file reads as empty.
//! Every mutation is written through immediately.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use tracing::warn;

use crate::error::StoError;

pub struct Prefs {
    path: PathBuf,
    root_key: String,
    file: Map<String, Value>,
}

impl Prefs {
    /// Open the store. Never fails: a bad file is logged and treated as empty.
    pub fn open(path: impl AsRef<Path>, root_key: impl Into<String>) -> Self {
        let path = path.as_ref().to_path_buf();
        let file = match fs::read_to_string(&path) {
            Ok(raw) => match serde_json::from_str::<Value>(&raw) {
                Ok(Value::Object(map)) => map,
                Ok(_) | Err(_) => {
                    warn!("[prefs] {} is not a JSON object, starting empty", path.display());
                    Map::new()
                }
            },
            Err(_) => Map::new(),
        };
        Self { path, root_key: root_key.into(), file }
    }

    /// Value at `path`, or `fallback` when absent or of the wrong shape.
    pub fn get<T: DeserializeOwned>(&self, path: &str, fallback: T) -> T {
        self.lookup(path)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
            .unwrap_or(fallback)
    }

    /// Raw value at `path`.
    pub fn lookup(&self, path: &str) -> Option<&Value> {
        let mut cur = self.file.get(&self.root_key)?;
        for key in segments(path) {
            cur = cur.as_object()?.get(key)?;
        }
        Some(cur)
    }

    /// Store `value` at `path`, replacing any non-object on the way.
    pub fn set<T: Serialize>(&mut self, path: &str, value: T) -> Result<(), StoError> {
        let value = serde_json::to_value(value).map_err(|e| StoError::Prefs(e.to_string()))?;
        let keys: Vec<&str> = segments(path).collect();
        if keys.is_empty() {
            return Err(StoError::Prefs("empty path".into()));
        }
        let root = self.file.entry(self.root_key.clone()).or_insert(Value::Null);
        insert_path(root, &keys, value);
        self.save()
    }

    /// Remove the value at `path`. Missing paths are a no-op.
    pub fn delete(&mut self, path: &str) -> Result<(), StoError> {
        let keys: Vec<&str> = segments(path).collect();
        let Some((last, parents)) = keys.split_last() else {
            return Ok(());
        };
        let mut cur = match self.file.get_mut(&self.root_key).and_then(Value::as_object_mut) {
            Some(map) => map,
            None => return Ok(()),
        };
        for key in parents {
            cur = match cur.get_mut(*key).and_then(Value::as_object_mut) {
                Some(map) => map,
                None => return Ok(()),
            };
        }
        if cur.remove(*last).is_some() {
            self.save()?;
        }
        Ok(())
    }

    /// Drop everything under the root key.
    pub fn clear(&mut self) -> Result<(), StoError> {
        if self.file.remove(&self.root_key).is_some() {
            self.save()?;
        }
        Ok(())
    }

    /// Write the file atomically (temp file + rename).
    fn save(&self) -> Result<(), StoError> {
        let bytes = serde_json::to_vec_pretty(&self.file).map_err(|e| StoError::Prefs(e.to_string()))?;
        let dir = self.path.parent().filter(|d| !d.as_os_str().is_empty()).unwrap_or(Path::new("."));
        let name = self.path.file_name().and_then(|n| n.to_str()).unwrap_or("prefs");
        let tmp = dir.join(format!(".{name}.tmp"));

        let io = |e: std::io::Error| StoError::Prefs(format!("{}: {e}", self.path.display()));
        {
            let mut f = fs::File::create(&tmp).map_err(io)?;
            f.write_all(&bytes).map_err(io)?;
            f.sync_all().map_err(io)?;
        }
        fs::rename(&tmp, &self.path).map_err(io)
    }
}

fn segments(path: &str) -> impl Iterator<Item = &str> {
    path.split('.').filter(|s| !s.is_empty())
}

fn insert_path(target: &mut Value, keys: &[&str], value: Value) {
    if !target.is_object() {
        *target = Value::Object(Map::new());
    }
    let Value::Object(map) = target else { return };
    match keys {
        [last] => {
            map.insert(last.to_string(), value);
        }
        [head, rest @ ..] => {
            let next = map.entry(head.to_string()).or_insert(Value::Null);
            insert_path(next, rest, value);
        }
        [] => {}
    }
}
