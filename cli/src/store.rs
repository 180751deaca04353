//! JSON-file credential store for the command line.
//!
//! DESIGN
//! ======
//! The whole file is one flat JSON object of string values, keyed exactly
//! like browser storage. Every write rewrites it through a sibling temp file
//! and a rename, so a crash mid-write leaves either the old or the new file,
//! never a torn one. The file is created owner-only on Unix since it holds a
//! bearer token.

#[cfg(test)]
#[path = "store_test.rs"]
mod store_test;

use std::collections::BTreeMap;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use gatehouse::{CredentialStore, StoreError};

const STORE_DIR: &str = "gatehouse";
const STORE_FILE: &str = "session.json";

pub struct FileStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into(), write_lock: Mutex::new(()) }
    }

    /// `$XDG_CONFIG_HOME/gatehouse/session.json`, else `$HOME/.config/...`.
    pub fn default_path() -> Option<PathBuf> {
        let non_empty = |key: &str| std::env::var_os(key).filter(|v| !v.is_empty()).map(PathBuf::from);
        let config_dir = non_empty("XDG_CONFIG_HOME").or_else(|| non_empty("HOME").map(|home| home.join(".config")))?;
        Some(config_dir.join(STORE_DIR).join(STORE_FILE))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self, key: &str) -> Result<BTreeMap<String, String>, StoreError> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(BTreeMap::new()),
            Err(e) => return Err(io_error("read", key, &e)),
        };
        if raw.trim().is_empty() {
            return Ok(BTreeMap::new());
        }
        serde_json::from_str(&raw).map_err(|e| StoreError::Io {
            op: "parse",
            key: key.to_owned(),
            reason: format!("{}: {e}", self.path.display()),
        })
    }

    fn save(&self, key: &str, entries: &BTreeMap<String, String>) -> Result<(), StoreError> {
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir).map_err(|e| io_error("create dir", key, &e))?;
        }
        let body = serde_json::to_vec_pretty(entries).map_err(|e| StoreError::Io {
            op: "encode",
            key: key.to_owned(),
            reason: e.to_string(),
        })?;

        let tmp = self.path.with_extension("json.tmp");
        let mut file = open_private(&tmp).map_err(|e| io_error("write", key, &e))?;
        file.write_all(&body).map_err(|e| io_error("write", key, &e))?;
        file.sync_all().map_err(|e| io_error("sync", key, &e))?;
        drop(file);
        fs::rename(&tmp, &self.path).map_err(|e| io_error("rename", key, &e))
    }

    fn update<F>(&self, key: &str, apply: F) -> Result<(), StoreError>
    where
        F: FnOnce(&mut BTreeMap<String, String>) -> bool,
    {
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let mut entries = self.load(key)?;
        if apply(&mut entries) {
            self.save(key, &entries)?;
        }
        Ok(())
    }
}

impl CredentialStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.load(key)?.remove(key))
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.update(key, |entries| {
            entries.insert(key.to_owned(), value.to_owned());
            true
        })
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.update(key, |entries| entries.remove(key).is_some())
    }
}

fn io_error(op: &'static str, key: &str, err: &io::Error) -> StoreError {
    StoreError::Io { op, key: key.to_owned(), reason: err.to_string() }
}

#[cfg(unix)]
fn open_private(path: &Path) -> io::Result<fs::File> {
    use std::os::unix::fs::OpenOptionsExt;
    fs::OpenOptions::new().write(true).create(true).truncate(true).mode(0o600).open(path)
}

#[cfg(not(unix))]
fn open_private(path: &Path) -> io::Result<fs::File> {
    fs::OpenOptions::new().write(true).create(true).truncate(true).open(path)
}
