use std::path::PathBuf;

use async_trait::async_trait;
use tokio::fs;

use super::error::StorageError;
use super::traits::BlobStore;

/// Filesystem-backed object store.
///
/// Keys are relative paths under a fixed root directory. Absolute keys and
/// keys with a `..` segment are rejected before touching the filesystem, and
/// the resolved path is re-checked for containment after canonicalization so
/// a symlink cannot escape the root.
pub struct FilesystemBlobStore {
    root: PathBuf,
}

impl FilesystemBlobStore {
    /// Open a store rooted at an existing directory.
    pub fn new(root: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let root: PathBuf = root.into();
        let canonical = root.canonicalize().map_err(|_| {
            StorageError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("storage root not found or not a directory: {}", root.display()),
            ))
        })?;
        if !canonical.is_dir() {
            return Err(StorageError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("storage root is not a directory: {}", root.display()),
            )));
        }
        Ok(Self { root: canonical })
    }

    /// Validate a key and join it onto the root. No filesystem access.
    fn resolve(&self, key: &str) -> Result<PathBuf, StorageError> {
        if key.trim().is_empty() {
            return Err(StorageError::InvalidKey("empty key".to_string()));
        }

        // Normalize Windows-style separators so `..\x` cannot slip past the
        // segment check below.
        let normalized = key.replace('\\', "/");

        if normalized.starts_with('/') {
            return Err(StorageError::InvalidKey(format!(
                "absolute keys are not allowed: {key}"
            )));
        }
        if normalized.split('/').any(|segment| segment == "..") {
            return Err(StorageError::InvalidKey(format!(
                "path traversal is not allowed: {key}"
            )));
        }

        Ok(self.root.join(normalized))
    }
}

#[async_trait]
impl BlobStore for FilesystemBlobStore {
    async fn get_bytes(&self, key: &str) -> Result<Vec<u8>, StorageError> {
        let candidate = self.resolve(key)?;

        let resolved = match fs::canonicalize(&candidate).await {
            Ok(path) => path,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(StorageError::NotFound(key.to_string()));
            }
            Err(e) => return Err(e.into()),
        };

        // Safer than trusting the string checks alone: a symlink inside the
        // root can still point outside it.
        if !resolved.starts_with(&self.root) {
            return Err(StorageError::InvalidKey(format!(
                "key escapes the storage root: {key}"
            )));
        }

        match fs::read(&resolved).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StorageError::NotFound(key.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_store() -> (FilesystemBlobStore, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let store = FilesystemBlobStore::new(dir.path()).unwrap();
        (store, dir)
    }

    #[tokio::test]
    async fn reads_bytes_under_root() {
        let (store, dir) = temp_store();
        std::fs::write(dir.path().join("photo.jpg"), b"image bytes").unwrap();

        let bytes = store.get_bytes("photo.jpg").await.unwrap();
        assert_eq!(bytes, b"image bytes");
    }

    #[tokio::test]
    async fn reads_nested_keys() {
        let (store, dir) = temp_store();
        std::fs::create_dir_all(dir.path().join("contests/7")).unwrap();
        std::fs::write(dir.path().join("contests/7/42.jpg"), b"nested").unwrap();

        let bytes = store.get_bytes("contests/7/42.jpg").await.unwrap();
        assert_eq!(bytes, b"nested");
    }

    #[tokio::test]
    async fn missing_object_is_not_found() {
        let (store, _dir) = temp_store();
        let result = store.get_bytes("no/such/photo.jpg").await;
        assert!(matches!(result, Err(StorageError::NotFound(_))));
    }

    #[tokio::test]
    async fn absolute_key_is_rejected() {
        let (store, _dir) = temp_store();
        let result = store.get_bytes("/etc/passwd").await;
        assert!(matches!(result, Err(StorageError::InvalidKey(_))));
    }

    #[tokio::test]
    async fn dotdot_segment_is_rejected() {
        let (store, _dir) = temp_store();
        for key in ["../outside.jpg", "a/../../outside.jpg", "a/../b.jpg"] {
            let result = store.get_bytes(key).await;
            assert!(
                matches!(result, Err(StorageError::InvalidKey(_))),
                "{key} should be rejected"
            );
        }
    }

    #[tokio::test]
    async fn traversal_is_rejected_before_filesystem_access() {
        // The sibling file exists, but the key must be refused on the string
        // checks alone, so the answer is InvalidKey rather than the file.
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("root")).unwrap();
        std::fs::write(dir.path().join("secret.txt"), b"secret").unwrap();
        let store = FilesystemBlobStore::new(dir.path().join("root")).unwrap();

        let result = store.get_bytes("../secret.txt").await;
        assert!(matches!(result, Err(StorageError::InvalidKey(_))));
    }

    #[tokio::test]
    async fn backslash_traversal_is_rejected() {
        let (store, _dir) = temp_store();
        let result = store.get_bytes("..\\outside.jpg").await;
        assert!(matches!(result, Err(StorageError::InvalidKey(_))));
    }

    #[tokio::test]
    async fn empty_key_is_rejected() {
        let (store, _dir) = temp_store();
        assert!(matches!(
            store.get_bytes("").await,
            Err(StorageError::InvalidKey(_))
        ));
        assert!(matches!(
            store.get_bytes("   ").await,
            Err(StorageError::InvalidKey(_))
        ));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn symlink_escaping_root_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("root")).unwrap();
        std::fs::write(dir.path().join("secret.txt"), b"secret").unwrap();
        std::os::unix::fs::symlink(
            dir.path().join("secret.txt"),
            dir.path().join("root/link.txt"),
        )
        .unwrap();

        let store = FilesystemBlobStore::new(dir.path().join("root")).unwrap();
        let result = store.get_bytes("link.txt").await;
        assert!(matches!(result, Err(StorageError::InvalidKey(_))));
    }

    #[test]
    fn constructor_requires_existing_root() {
        let dir = tempfile::tempdir().unwrap();
        let result = FilesystemBlobStore::new(dir.path().join("missing"));
        assert!(matches!(result, Err(StorageError::Io(_))));
    }
}
