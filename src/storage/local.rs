use super::{ByteRange, Storage};
use crate::{Error, Result};
use async_trait::async_trait;
use bytes::Bytes;
use std::path::PathBuf;
use tokio::fs;
use tokio::io::{AsyncReadExt, AsyncSeekExt};

pub struct LocalStorage {
    root: PathBuf,
}

impl LocalStorage {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    fn make_file_path(&self, key: &str) -> PathBuf {
        self.root.join(key)
    }
}

#[async_trait]
impl Storage for LocalStorage {
    async fn content_length(&self, key: &str) -> Result<u64> {
        let metadata = fs::metadata(self.make_file_path(key))
            .await
            .map_err(|_| Error::NotFound(key.to_string()))?;
        Ok(metadata.len())
    }

    async fn read_bytes(&self, key: &str, range: Option<ByteRange>) -> Result<Bytes> {
        let path = self.make_file_path(key);
        let mut file = fs::File::open(&path)
            .await
            .map_err(|_| Error::NotFound(key.to_string()))?;

        let mut buf = Vec::new();
        match range {
            Some(r) => {
                let len = file.metadata().await?.len();
                if r.start >= len {
                    return Err(Error::InvalidRange(format!(
                        "{} starts past end of {} ({} bytes)",
                        r.header_value(),
                        key,
                        len
                    )));
                }
                if matches!(r.end, Some(end) if end < r.start) {
                    return Err(Error::InvalidRange(r.header_value()));
                }
                file.seek(std::io::SeekFrom::Start(r.start)).await?;
                let want = r.end.map(|e| e - r.start + 1).unwrap_or(len - r.start);
                file.take(want).read_to_end(&mut buf).await?;
            }
            None => {
                file.read_to_end(&mut buf).await?;
            }
        }

        Ok(Bytes::from(buf))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn storage_with(contents: &[u8]) -> (tempfile::TempDir, LocalStorage) {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("blob.bin"), contents).unwrap();
        let storage = LocalStorage::new(dir.path().to_path_buf());
        (dir, storage)
    }

    #[tokio::test]
    async fn test_read_inclusive_range() {
        let (_dir, storage) = storage_with(b"0123456789");
        let bytes = storage
            .read_bytes("blob.bin", Some(ByteRange::new(2, 5)))
            .await
            .unwrap();
        assert_eq!(&bytes[..], b"2345");
    }

    #[tokio::test]
    async fn test_range_past_end_is_truncated() {
        let (_dir, storage) = storage_with(b"0123456789");
        let bytes = storage
            .read_bytes("blob.bin", Some(ByteRange::new(8, 100)))
            .await
            .unwrap();
        assert_eq!(&bytes[..], b"89");
    }

    #[tokio::test]
    async fn test_range_starting_past_end() {
        let (_dir, storage) = storage_with(b"0123456789");
        let err = storage
            .read_bytes("blob.bin", Some(ByteRange::new(10, 20)))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidRange(_)));
    }

    #[tokio::test]
    async fn test_content_length_and_missing() {
        let (_dir, storage) = storage_with(b"0123456789");
        assert_eq!(storage.content_length("blob.bin").await.unwrap(), 10);
        assert!(matches!(
            storage.content_length("missing.bin").await,
            Err(Error::NotFound(_))
        ));
    }
}
