//! Avatar object storage
//!
//! Stores avatar bytes under an opaque reference. Users keep only the
//! reference; the public URL is `<origin>/img/avatars/<reference>`.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use rand::{Rng, distributions::Alphanumeric};

use crate::error::AppError;

/// Upper bound on an avatar upload
pub const MAX_AVATAR_BYTES: usize = 5 << 20;

const REFERENCE_LEN: usize = 21;
const PNG_SIGNATURE: &[u8] = b"\x89PNG\r\n\x1a\n";
const JPEG_SIGNATURE: &[u8] = &[0xFF, 0xD8, 0xFF];

/// Accepted avatar encodings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AvatarFormat {
    Png,
    Jpeg,
}

impl AvatarFormat {
    /// Recognize the encoding from the leading bytes
    pub fn sniff(bytes: &[u8]) -> Option<Self> {
        if bytes.starts_with(PNG_SIGNATURE) {
            Some(Self::Png)
        } else if bytes.starts_with(JPEG_SIGNATURE) {
            Some(Self::Jpeg)
        } else {
            None
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Jpeg => "jpg",
        }
    }
}

/// Object storage for avatar images
#[async_trait]
pub trait AvatarStore: Send + Sync {
    /// Store `bytes` and return a fresh reference
    async fn put(&self, bytes: Vec<u8>, extension: &str) -> Result<String, AppError>;

    /// Remove a stored object; a missing object is not an error
    async fn delete(&self, reference: &str) -> Result<(), AppError>;
}

/// Avatar store backed by a local directory
#[derive(Debug, Clone)]
pub struct LocalAvatarStore {
    dir: PathBuf,
}

impl LocalAvatarStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, reference: &str) -> Result<PathBuf, AppError> {
        let valid = !reference.is_empty()
            && reference
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '.');
        if !valid || reference.starts_with('.') {
            return Err(AppError::Storage(format!(
                "invalid avatar reference: {reference}"
            )));
        }
        Ok(self.dir.join(reference))
    }
}

fn random_reference(extension: &str) -> String {
    let name: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(REFERENCE_LEN)
        .map(char::from)
        .collect();
    format!("{name}.{extension}")
}

#[async_trait]
impl AvatarStore for LocalAvatarStore {
    async fn put(&self, bytes: Vec<u8>, extension: &str) -> Result<String, AppError> {
        tokio::fs::create_dir_all(&self.dir).await?;

        let reference = random_reference(extension);
        let path = self.path_for(&reference)?;
        tokio::fs::write(&path, bytes).await?;

        tracing::debug!(%reference, "Avatar stored");
        Ok(reference)
    }

    async fn delete(&self, reference: &str) -> Result<(), AppError> {
        let path = self.path_for(reference)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn sniffs_png_and_jpeg() {
        assert_eq!(
            AvatarFormat::sniff(b"\x89PNG\r\n\x1a\n rest"),
            Some(AvatarFormat::Png)
        );
        assert_eq!(
            AvatarFormat::sniff(&[0xFF, 0xD8, 0xFF, 0xE0]),
            Some(AvatarFormat::Jpeg)
        );
        assert_eq!(AvatarFormat::sniff(b"GIF89a"), None);
        assert_eq!(AvatarFormat::sniff(&[]), None);
    }

    #[tokio::test]
    async fn put_then_delete() {
        let temp_dir = TempDir::new().unwrap();
        let store = LocalAvatarStore::new(temp_dir.path().join("avatars"));

        let reference = store.put(vec![1, 2, 3], "png").await.unwrap();
        assert!(reference.ends_with(".png"));
        let path = store.dir().join(&reference);
        assert_eq!(tokio::fs::read(&path).await.unwrap(), vec![1, 2, 3]);

        store.delete(&reference).await.unwrap();
        assert!(!path.exists());

        // Deleting twice is fine
        store.delete(&reference).await.unwrap();
    }

    #[tokio::test]
    async fn rejects_path_like_references() {
        let temp_dir = TempDir::new().unwrap();
        let store = LocalAvatarStore::new(temp_dir.path());

        assert!(store.delete("../secret").await.is_err());
        assert!(store.delete("").await.is_err());
    }
}
