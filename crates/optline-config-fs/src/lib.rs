// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Filesystem-backed [`BlobStore`]: one `<key>.json` file per storage key
//! under the platform config directory.

use directories::ProjectDirs;
use optline_core::{BlobStore, StoreError};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Blob store rooted at a directory.
#[derive(Debug, Clone)]
pub struct FsBlobStore {
    base: PathBuf,
}

impl FsBlobStore {
    /// Store under the user config directory (e.g. `~/.config/optline`).
    pub fn new() -> Result<Self, StoreError> {
        let proj = ProjectDirs::from("dev", "optline", "Optline")
            .ok_or_else(|| StoreError::Other("could not resolve config dir".into()))?;
        Self::at(proj.config_dir())
    }

    /// Store under an explicit directory, created if missing.
    pub fn at(base: impl AsRef<Path>) -> Result<Self, StoreError> {
        let base = base.as_ref().to_path_buf();
        fs::create_dir_all(&base)?;
        Ok(Self { base })
    }

    /// Root directory.
    pub fn base(&self) -> &Path {
        &self.base
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, StoreError> {
        if key.is_empty() || key.contains(['/', '\\']) || key.starts_with('.') {
            return Err(StoreError::Other(format!("invalid storage key `{key}`")));
        }
        Ok(self.base.join(format!("{key}.json")))
    }
}

impl BlobStore for FsBlobStore {
    fn load_raw(&self, key: &str) -> Result<Vec<u8>, StoreError> {
        match fs::read(self.path_for(key)?) {
            Ok(bytes) => Ok(bytes),
            Err(err) if err.kind() == ErrorKind::NotFound => Err(StoreError::NotFound),
            Err(err) => Err(StoreError::Io(err)),
        }
    }

    fn save_raw(&self, key: &str, data: &[u8]) -> Result<(), StoreError> {
        let path = self.path_for(key)?;
        // Write beside the target, then rename over it.
        let staging = path.with_extension("json.tmp");
        fs::write(&staging, data)?;
        fs::rename(&staging, &path)?;
        debug!(path = %path.display(), bytes = data.len(), "saved blob");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use optline_core::{JsonBlobService, LocalStore, OptionBackend, WireRecord, WireValue};

    #[test]
    fn missing_blob_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsBlobStore::at(dir.path()).unwrap();
        assert!(matches!(store.load_raw("options"), Err(StoreError::NotFound)));
    }

    #[test]
    fn blobs_land_in_key_named_files() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsBlobStore::at(dir.path().join("nested")).unwrap();
        store.save_raw("options", b"opt_dark:true").unwrap();

        let on_disk = fs::read_to_string(dir.path().join("nested/options.json")).unwrap();
        assert_eq!(on_disk, "opt_dark:true");
        assert_eq!(store.load_raw("options").unwrap(), b"opt_dark:true");
        assert!(!dir.path().join("nested/options.json.tmp").exists());
    }

    #[test]
    fn path_like_keys_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsBlobStore::at(dir.path()).unwrap();
        for key in ["", "../escape", "a/b", ".hidden"] {
            assert!(matches!(store.save_raw(key, b"x"), Err(StoreError::Other(_))));
        }
    }

    #[test]
    fn local_store_and_json_blobs_share_a_directory() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsBlobStore::at(dir.path()).unwrap();

        let mut backend = LocalStore::new(store.clone());
        let mut record = WireRecord::new();
        record.insert("language".into(), WireValue::from("en-US"));
        backend.save_all(record.clone()).unwrap();
        assert_eq!(backend.get_all().unwrap(), record);

        let json = JsonBlobService::new(store);
        json.save("prefs", &vec![1, 2, 3]).unwrap();
        assert_eq!(json.load::<Vec<i32>>("prefs").unwrap(), Some(vec![1, 2, 3]));
    }
}
