use std::path::{Component, Path, PathBuf};

use crate::error::{Result, StoreError};

/// Joins `key` onto `base`, refusing keys that would land outside `base`.
///
/// Nested keys such as `reports/2024/q1.csv` are fine. Empty keys, keys with
/// `..` segments, absolute keys and drive prefixes are rejected.
pub fn resolve_key_path(base: &Path, key: &str) -> Result<PathBuf> {
    if key.is_empty() || key.contains('\0') {
        return Err(StoreError::InvalidKey(key.to_string()));
    }

    let mut has_name = false;
    for component in Path::new(key).components() {
        match component {
            Component::Normal(_) => has_name = true,
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                return Err(StoreError::InvalidKey(key.to_string()));
            }
        }
    }
    if !has_name {
        return Err(StoreError::InvalidKey(key.to_string()));
    }

    Ok(base.join(key))
}
