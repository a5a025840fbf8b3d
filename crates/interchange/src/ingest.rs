//! Attachment ingestion: stream a payload to disk while hashing it.

use std::path::Path;

use tempfile::{NamedTempFile, TempPath};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tracing::debug;

use crate::error::CodecError;
use crate::hash::{ContentHasher, Digest};
use crate::value::{Attachment, AttachmentRef};

const CHUNK_SIZE: usize = 64 * 1024;

/// A payload written to a temporary file. The file is removed when this is
/// dropped unless it was persisted.
#[derive(Debug)]
pub struct IngestedAttachment {
    pub hash: Digest,
    pub size: u64,
    path: TempPath,
}

impl IngestedAttachment {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn to_ref(&self, mime_type: impl Into<String>) -> AttachmentRef {
        AttachmentRef::new(self.hash, mime_type)
    }

    /// Loads the payload into an [`Attachment`] and deletes the file.
    pub async fn into_attachment(
        self,
        mime_type: impl Into<String>,
    ) -> Result<Attachment, CodecError> {
        let data = tokio::fs::read(&self.path).await?;
        let reference = self.to_ref(mime_type);
        self.path.close()?;
        Ok(Attachment { reference, data })
    }

    /// Moves the payload to `dest` and keeps it.
    pub fn persist(self, dest: impl AsRef<Path>) -> Result<(), CodecError> {
        self.path.persist(dest).map_err(|e| CodecError::Io(e.error))
    }
}

/// Copies `reader` into a new temporary file under `dir`, computing the
/// content hash and size as the bytes pass through.
pub async fn ingest<R>(mut reader: R, dir: impl AsRef<Path>) -> Result<IngestedAttachment, CodecError>
where
    R: AsyncRead + Unpin,
{
    let (file, path) = NamedTempFile::new_in(dir)?.into_parts();
    let mut file = tokio::fs::File::from_std(file);
    let mut hasher = ContentHasher::new();
    let mut buf = vec![0u8; CHUNK_SIZE];
    loop {
        let n = reader.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
        file.write_all(&buf[..n]).await?;
    }
    file.flush().await?;
    let size = hasher.size();
    let hash = hasher.finalize();
    debug!(size, hash = %hex::encode(hash), "attachment ingested");
    Ok(IngestedAttachment { hash, size, path })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash::content_hash;

    #[tokio::test]
    async fn hashes_while_streaming() {
        let dir = tempfile::tempdir().unwrap();
        let payload = vec![7u8; CHUNK_SIZE * 2 + 5];
        let ingested = ingest(payload.as_slice(), dir.path()).await.unwrap();
        assert_eq!(ingested.size, payload.len() as u64);
        assert_eq!(ingested.hash, content_hash(&payload));
        assert_eq!(std::fs::read(ingested.path()).unwrap(), payload);
    }

    #[tokio::test]
    async fn into_attachment_cleans_up() {
        let dir = tempfile::tempdir().unwrap();
        let ingested = ingest(&b"hello"[..], dir.path()).await.unwrap();
        let path = ingested.path().to_path_buf();
        let att = ingested.into_attachment("text/plain").await.unwrap();
        assert!(att.verify());
        assert_eq!(att.mime_type(), "text/plain");
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn drop_removes_file() {
        let dir = tempfile::tempdir().unwrap();
        let ingested = ingest(&b"x"[..], dir.path()).await.unwrap();
        let path = ingested.path().to_path_buf();
        drop(ingested);
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn persist_keeps_file() {
        let dir = tempfile::tempdir().unwrap();
        let ingested = ingest(&b"keep"[..], dir.path()).await.unwrap();
        let dest = dir.path().join("kept.bin");
        ingested.persist(&dest).unwrap();
        assert_eq!(std::fs::read(dest).unwrap(), b"keep");
    }
}
