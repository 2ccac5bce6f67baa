//! Purpose: Define the key-value storage collaborator and two reference backends.
//! Exports: `Store`, `MemoryStore`, `DirStore`, `ApiResult`.
//! Role: Boundary the settings layer and CLI persist encoded text through.
//! Invariants: Stores move opaque bytes; they never encode or decode values themselves.
//! Invariants: `DirStore` writes are serialized by an exclusive lock on `<dir>/.lock`.
//! Invariants: `DirStore` writes are atomic (temp file + rename); readers never see partial values.
//! Invariants: `DirStore` keys are limited to 249 bytes so their file name fits; `MemoryStore` takes 255.
#![allow(clippy::result_large_err)]

use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use fs2::FileExt;

use crate::core::error::{Error, ErrorKind};
use crate::store_paths::{
    KeyResolveError, MAX_KEY_LEN, default_value_dir, key_from_file_name, resolve_key_path,
};

pub type ApiResult<T> = Result<T, Error>;

const LOCK_FILE: &str = ".lock";

pub trait Store {
    fn read(&self, key: &str) -> ApiResult<Option<Vec<u8>>>;
    fn write(&self, key: &str, value: &[u8]) -> ApiResult<()>;
    fn keys(&self) -> ApiResult<Vec<String>>;
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    values: Mutex<BTreeMap<String, Vec<u8>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Store for MemoryStore {
    fn read(&self, key: &str) -> ApiResult<Option<Vec<u8>>> {
        check_key(key)?;
        let values = self.values.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(values.get(key).cloned())
    }

    fn write(&self, key: &str, value: &[u8]) -> ApiResult<()> {
        check_key(key)?;
        let mut values = self.values.lock().unwrap_or_else(PoisonError::into_inner);
        values.insert(key.to_string(), value.to_vec());
        Ok(())
    }

    fn keys(&self) -> ApiResult<Vec<String>> {
        let values = self.values.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(values.keys().cloned().collect())
    }
}

/// One file per key under a directory.
#[derive(Clone, Debug)]
pub struct DirStore {
    dir: PathBuf,
}

impl DirStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn key_path(&self, key: &str) -> ApiResult<PathBuf> {
        resolve_key_path(key, &self.dir).map_err(|err| map_key_resolve_error(err, key))
    }

    fn lock(&self) -> ApiResult<File> {
        fs::create_dir_all(&self.dir).map_err(|err| {
            Error::new(map_io_error_kind(&err))
                .with_message("failed to create value directory")
                .with_path(&self.dir)
                .with_source(err)
        })?;
        let path = self.dir.join(LOCK_FILE);
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&path)
            .map_err(|err| {
                Error::new(map_io_error_kind(&err))
                    .with_message("failed to open lock file")
                    .with_path(&path)
                    .with_source(err)
            })?;
        file.lock_exclusive().map_err(|err| {
            Error::new(ErrorKind::Io)
                .with_message("failed to lock value directory")
                .with_path(&path)
                .with_source(err)
        })?;
        Ok(file)
    }
}

impl Default for DirStore {
    fn default() -> Self {
        Self::new(default_value_dir())
    }
}

impl Store for DirStore {
    fn read(&self, key: &str) -> ApiResult<Option<Vec<u8>>> {
        let path = self.key_path(key)?;
        match fs::read(&path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(Error::new(map_io_error_kind(&err))
                .with_message("failed to read value")
                .with_key(key)
                .with_path(&path)
                .with_source(err)),
        }
    }

    fn write(&self, key: &str, value: &[u8]) -> ApiResult<()> {
        let path = self.key_path(key)?;
        let _lock = self.lock()?;
        let tmp = self.dir.join(format!(".{}.tmp", temp_suffix()?));

        let written = write_synced(&tmp, value).and_then(|()| fs::rename(&tmp, &path));
        if let Err(err) = written {
            let _ = fs::remove_file(&tmp);
            return Err(Error::new(map_io_error_kind(&err))
                .with_message("failed to write value")
                .with_key(key)
                .with_path(&path)
                .with_source(err));
        }
        tracing::debug!(key, len = value.len(), "stored value");
        Ok(())
    }

    fn keys(&self) -> ApiResult<Vec<String>> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => {
                return Err(Error::new(map_io_error_kind(&err))
                    .with_message("failed to read value directory")
                    .with_path(&self.dir)
                    .with_source(err));
            }
        };

        let mut keys = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|err| {
                Error::new(ErrorKind::Io)
                    .with_message("failed to read value directory entry")
                    .with_path(&self.dir)
                    .with_source(err)
            })?;
            let name = entry.file_name();
            if let Some(key) = name.to_str().and_then(key_from_file_name) {
                keys.push(key.to_string());
            }
        }
        keys.sort();
        Ok(keys)
    }
}

fn write_synced(path: &Path, value: &[u8]) -> io::Result<()> {
    let mut file = OpenOptions::new().write(true).create_new(true).open(path)?;
    file.write_all(value)?;
    file.sync_all()
}

fn temp_suffix() -> ApiResult<String> {
    let mut bytes = [0u8; 8];
    getrandom::fill(&mut bytes).map_err(|err| {
        Error::new(ErrorKind::Internal).with_message(format!("failed to gather randomness: {err}"))
    })?;
    Ok(bytes.iter().map(|byte| format!("{byte:02x}")).collect())
}

fn check_key(key: &str) -> ApiResult<()> {
    if key.is_empty() {
        return Err(map_key_resolve_error(KeyResolveError::Empty, key));
    }
    if key.len() > MAX_KEY_LEN {
        return Err(map_key_resolve_error(KeyResolveError::TooLong(MAX_KEY_LEN), key));
    }
    Ok(())
}

fn map_io_error_kind(err: &io::Error) -> ErrorKind {
    match err.kind() {
        io::ErrorKind::NotFound => ErrorKind::NotFound,
        io::ErrorKind::PermissionDenied => ErrorKind::Permission,
        _ => ErrorKind::Io,
    }
}

fn map_key_resolve_error(err: KeyResolveError, key: &str) -> Error {
    let message = match err {
        KeyResolveError::Empty => "key must not be empty".to_string(),
        KeyResolveError::TooLong(limit) => format!("key must be at most {limit} bytes"),
        KeyResolveError::ContainsPathSeparator => "key must not contain path separators".to_string(),
        KeyResolveError::Hidden => "key must not start with '.'".to_string(),
    };
    Error::new(ErrorKind::Usage)
        .with_message(message)
        .with_key(key)
}
