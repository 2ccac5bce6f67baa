//! Purpose: Shared value-directory and key-to-path resolution helpers.
//! Exports: `default_value_dir`, `resolve_key_path`, `key_from_file_name`, key length limits.
//! Role: Keep CLI and `DirStore` path semantics aligned from one source.
//! Invariants: Default directory is `$TAGWIRE_DIR`, else `~/.tagwire/values`.
//! Invariants: Keys are 1..=255 bytes, contain no path separators, and never start with `.`.
//! Invariants: File-backed keys stop at 249 bytes so `<key>.value` fits one 255-byte file name.

use std::path::{Path, PathBuf};

pub(crate) const VALUE_SUFFIX: &str = ".value";
pub(crate) const MAX_KEY_LEN: usize = 255;
// NAME_MAX on common filesystems.
const MAX_FILE_NAME_LEN: usize = 255;
pub(crate) const MAX_FILE_KEY_LEN: usize = MAX_FILE_NAME_LEN - VALUE_SUFFIX.len();
pub(crate) const DIR_ENV: &str = "TAGWIRE_DIR";

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub(crate) enum KeyResolveError {
    Empty,
    /// Longer than the limit carried here.
    TooLong(usize),
    ContainsPathSeparator,
    Hidden,
}

pub(crate) fn default_value_dir() -> PathBuf {
    if let Some(dir) = std::env::var_os(DIR_ENV).filter(|dir| !dir.is_empty()) {
        return PathBuf::from(dir);
    }
    let home = std::env::var_os("HOME").unwrap_or_default();
    PathBuf::from(home).join(".tagwire").join("values")
}

pub(crate) fn resolve_key_path(key: &str, dir: &Path) -> Result<PathBuf, KeyResolveError> {
    if key.is_empty() {
        return Err(KeyResolveError::Empty);
    }
    if key.len() > MAX_FILE_KEY_LEN {
        return Err(KeyResolveError::TooLong(MAX_FILE_KEY_LEN));
    }
    if key.contains('/') || key.contains('\\') {
        return Err(KeyResolveError::ContainsPathSeparator);
    }
    if key.starts_with('.') {
        return Err(KeyResolveError::Hidden);
    }
    Ok(dir.join(format!("{key}{VALUE_SUFFIX}")))
}

pub(crate) fn key_from_file_name(name: &str) -> Option<&str> {
    name.strip_suffix(VALUE_SUFFIX)
        .filter(|key| !key.is_empty() && !key.starts_with('.'))
}

#[cfg(test)]
mod tests {
    use super::{KeyResolveError, MAX_FILE_KEY_LEN, key_from_file_name, resolve_key_path};
    use std::path::{Path, PathBuf};

    #[test]
    fn key_resolves_with_suffix() {
        let path = resolve_key_path("SITE_NAME", Path::new(".scratch/values")).expect("path");
        assert_eq!(path, PathBuf::from(".scratch/values/SITE_NAME.value"));
    }

    #[test]
    fn path_like_keys_are_rejected() {
        let dir = Path::new(".scratch/values");
        assert_eq!(
            resolve_key_path("a/b", dir),
            Err(KeyResolveError::ContainsPathSeparator)
        );
        assert_eq!(
            resolve_key_path(r"a\b", dir),
            Err(KeyResolveError::ContainsPathSeparator)
        );
        assert_eq!(resolve_key_path("..", dir), Err(KeyResolveError::Hidden));
        assert_eq!(resolve_key_path("", dir), Err(KeyResolveError::Empty));
        assert_eq!(
            resolve_key_path(&"k".repeat(256), dir),
            Err(KeyResolveError::TooLong(MAX_FILE_KEY_LEN))
        );
    }

    #[test]
    fn file_key_limit_leaves_room_for_suffix() {
        let dir = Path::new(".scratch/values");
        assert_eq!(MAX_FILE_KEY_LEN, 249);
        let path = resolve_key_path(&"k".repeat(249), dir).expect("path");
        assert_eq!(path.file_name().map(|name| name.len()), Some(255));
        assert_eq!(
            resolve_key_path(&"k".repeat(250), dir),
            Err(KeyResolveError::TooLong(249))
        );
    }

    #[test]
    fn file_names_map_back_to_keys() {
        assert_eq!(key_from_file_name("SITE_NAME.value"), Some("SITE_NAME"));
        assert_eq!(key_from_file_name(".SITE_NAME.1a2b.tmp"), None);
        assert_eq!(key_from_file_name(".lock"), None);
        assert_eq!(key_from_file_name("notes.txt"), None);
    }
}
