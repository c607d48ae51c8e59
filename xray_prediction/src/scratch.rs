use crate::upload::{secure_filename, UploadedImage};
use std::{
    io,
    path::{Path, PathBuf},
};
use uuid::Uuid;

/// Directory holding uploads while they are being classified.
#[derive(Debug, Clone)]
pub struct ScratchDir {
    root: PathBuf,
}

impl ScratchDir {
    pub fn new(root: impl Into<PathBuf>) -> io::Result<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Writes the upload under a name unique to this request.
    pub async fn persist(&self, upload: &UploadedImage) -> io::Result<ScratchFile> {
        let path = self.root.join(scratch_name(&upload.filename));
        // guard first so a failed or partial write is still removed
        let file = ScratchFile { path };
        tokio::fs::write(&file.path, &upload.bytes).await?;
        tracing::debug!("Stored {} bytes at {:?}", upload.bytes.len(), file.path);
        Ok(file)
    }
}

fn scratch_name(client_filename: &str) -> String {
    let token = Uuid::new_v4().simple();
    let sanitized = secure_filename(client_filename);
    if sanitized.is_empty() {
        token.to_string()
    } else {
        format!("{}_{}", token, sanitized)
    }
}

/// A scratch file that is deleted when dropped.
#[derive(Debug)]
pub struct ScratchFile {
    path: PathBuf,
}

impl ScratchFile {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for ScratchFile {
    fn drop(&mut self) {
        match std::fs::remove_file(&self.path) {
            Ok(()) => tracing::debug!("Removed scratch file {:?}", self.path),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => tracing::warn!("Failed to remove scratch file {:?}: {}", self.path, e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{file_count, temp_dir};
    use bytes::Bytes;

    fn upload(filename: &str, bytes: &'static [u8]) -> UploadedImage {
        UploadedImage {
            filename: filename.to_string(),
            bytes: Bytes::from_static(bytes),
        }
    }

    #[tokio::test]
    async fn test_persist_writes_and_drop_removes() {
        let scratch = ScratchDir::new(temp_dir().join("uploads")).unwrap();

        let file = scratch.persist(&upload("scan.png", b"abc")).await.unwrap();
        assert_eq!(std::fs::read(file.path()).unwrap(), b"abc");
        assert!(file.path().starts_with(scratch.root()));
        assert_eq!(file_count(scratch.root()), 1);

        drop(file);
        assert_eq!(file_count(scratch.root()), 0);
    }

    #[tokio::test]
    async fn test_identical_client_filenames_do_not_collide() {
        let scratch = ScratchDir::new(temp_dir()).unwrap();

        let (a, b) = (upload("xray.png", b"first"), upload("xray.png", b"second"));

        let (first, second) = tokio::join!(scratch.persist(&a), scratch.persist(&b));
        let (first, second) = (first.unwrap(), second.unwrap());

        assert_ne!(first.path(), second.path());
        assert_eq!(std::fs::read(first.path()).unwrap(), b"first");
        assert_eq!(std::fs::read(second.path()).unwrap(), b"second");
    }

    #[tokio::test]
    async fn test_traversal_names_stay_inside_root() {
        let scratch = ScratchDir::new(temp_dir()).unwrap();

        let file = scratch
            .persist(&upload("../../etc/passwd", b"x"))
            .await
            .unwrap();

        assert_eq!(file.path().parent(), Some(scratch.root()));
        let name = file.path().file_name().unwrap().to_str().unwrap();
        assert!(name.ends_with("_etc_passwd"), "{}", name);
    }

    #[test]
    fn test_scratch_name_without_usable_characters() {
        let name = scratch_name("../..");
        assert_eq!(name.len(), 32);
        assert!(name.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[tokio::test]
    async fn test_missing_file_on_drop_is_ignored() {
        let scratch = ScratchDir::new(temp_dir()).unwrap();
        let file = scratch.persist(&upload("a.png", b"a")).await.unwrap();

        std::fs::remove_file(file.path()).unwrap();
        drop(file);
    }
}
