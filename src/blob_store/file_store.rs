//! Filesystem-backed blob store: one JSON file per key in a data
//! directory, written atomically via a temp file and rename.

use super::BlobStore;
use anyhow::{Context, Result};
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

pub struct FileBlobStore {
    dir: PathBuf,
}

impl FileBlobStore {
    /// Open a store over `dir`, creating the directory if needed.
    pub fn new<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create data directory {:?}", dir))?;
        Ok(Self { dir })
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", key))
    }
}

impl BlobStore for FileBlobStore {
    fn load(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let path = self.path_for(key);
        match std::fs::read(&path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err).with_context(|| format!("Failed to read blob {:?}", path)),
        }
    }

    fn save(&self, key: &str, bytes: &[u8]) -> Result<()> {
        let path = self.path_for(key);
        let mut tmp = NamedTempFile::new_in(&self.dir)
            .with_context(|| format!("Failed to create temp file in {:?}", self.dir))?;
        tmp.write_all(bytes)
            .with_context(|| format!("Failed to write blob {}", key))?;
        tmp.persist(&path)
            .with_context(|| format!("Failed to persist blob {:?}", path))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_key_is_none() {
        let dir = TempDir::new().unwrap();
        let store = FileBlobStore::new(dir.path()).unwrap();
        assert!(store.load("never_written").unwrap().is_none());
    }

    #[test]
    fn test_round_trip() {
        let dir = TempDir::new().unwrap();
        let store = FileBlobStore::new(dir.path()).unwrap();

        store.save("tag_dictionary", b"{\"a\":1}").unwrap();
        assert_eq!(
            store.load("tag_dictionary").unwrap().unwrap(),
            b"{\"a\":1}"
        );
    }

    #[test]
    fn test_save_overwrites() {
        let dir = TempDir::new().unwrap();
        let store = FileBlobStore::new(dir.path()).unwrap();

        store.save("k", b"first").unwrap();
        store.save("k", b"second").unwrap();
        assert_eq!(store.load("k").unwrap().unwrap(), b"second");
    }

    #[test]
    fn test_keys_are_independent() {
        let dir = TempDir::new().unwrap();
        let store = FileBlobStore::new(dir.path()).unwrap();

        store.save("a", b"1").unwrap();
        store.save("b", b"2").unwrap();
        assert_eq!(store.load("a").unwrap().unwrap(), b"1");
        assert_eq!(store.load("b").unwrap().unwrap(), b"2");
    }
}
