use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use chrono::Utc;
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;

use crate::error::{AppError, Result};

const MAX_EXTENSION_LEN: usize = 10;

/// Image files on local disk, addressed by a flat key such as `1718000000123.jpg`.
#[derive(Debug, Clone)]
pub struct UploadStore {
    dir: PathBuf,
}

impl UploadStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub async fn ensure_dir(&self) -> Result<()> {
        fs::create_dir_all(&self.dir).await?;
        Ok(())
    }

    /// Write one image under `{millis}{ext}` and return its key.
    ///
    /// Files are created exclusively; if the name is taken the millisecond
    /// value is bumped until a free one turns up.
    pub async fn save(&self, original_name: Option<&str>, bytes: &[u8]) -> Result<String> {
        let ext = extension_of(original_name);
        let mut millis = Utc::now().timestamp_millis();

        loop {
            let key = format!("{}{}", millis, ext);
            let opened = OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(self.dir.join(&key))
                .await;

            match opened {
                Ok(mut file) => {
                    file.write_all(bytes).await?;
                    file.flush().await?;
                    return Ok(key);
                }
                Err(e) if e.kind() == ErrorKind::AlreadyExists => millis += 1,
                Err(e) => return Err(e.into()),
            }
        }
    }

    pub async fn remove(&self, key: &str) -> Result<()> {
        let path = self
            .resolve(key)
            .ok_or_else(|| AppError::Validation(format!("invalid upload key `{}`", key)))?;
        fs::remove_file(path).await?;
        Ok(())
    }

    /// Keys are bare file names; anything that could leave the directory is refused.
    fn resolve(&self, key: &str) -> Option<PathBuf> {
        let bad = key.is_empty()
            || key == "."
            || key == ".."
            || key.contains('/')
            || key.contains('\\')
            || key.contains('\0');
        (!bad).then(|| self.dir.join(key))
    }
}

fn extension_of(original_name: Option<&str>) -> String {
    original_name
        .and_then(|name| Path::new(name).extension())
        .and_then(|ext| ext.to_str())
        .filter(|ext| {
            !ext.is_empty()
                && ext.len() <= MAX_EXTENSION_LEN
                && ext.chars().all(|c| c.is_ascii_alphanumeric())
        })
        .map(|ext| format!(".{}", ext.to_ascii_lowercase()))
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extensions_are_kept_only_when_safe() {
        assert_eq!(extension_of(Some("billboard.JPG")), ".jpg");
        assert_eq!(extension_of(Some("photo.tar.gz")), ".gz");
        assert_eq!(extension_of(Some("no_extension")), "");
        assert_eq!(extension_of(Some("evil.p/hp")), "");
        assert_eq!(extension_of(None), "");
    }

    #[tokio::test]
    async fn same_millisecond_uploads_do_not_collide() {
        let dir = tempfile::tempdir().unwrap();
        let store = UploadStore::new(dir.path());

        let mut keys = Vec::new();
        for i in 0..5u8 {
            keys.push(store.save(Some("a.png"), &[i]).await.unwrap());
        }
        keys.sort();
        keys.dedup();
        assert_eq!(keys.len(), 5);
        for key in &keys {
            assert!(key.ends_with(".png"));
            assert!(dir.path().join(key).exists());
        }
    }

    #[tokio::test]
    async fn remove_refuses_paths_outside_the_directory() {
        let dir = tempfile::tempdir().unwrap();
        let store = UploadStore::new(dir.path());
        assert!(matches!(store.remove("../etc/passwd").await, Err(AppError::Validation(_))));
        assert!(matches!(store.remove("..").await, Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn removing_a_missing_file_is_an_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = UploadStore::new(dir.path());
        assert!(matches!(store.remove("404.jpg").await, Err(AppError::Io(_))));
    }
}
