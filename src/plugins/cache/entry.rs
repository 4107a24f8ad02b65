use bytes::Bytes;
use std::path::PathBuf;
use super::metadata::CacheMetadata;

#[derive(Debug, Clone)]
pub(crate) enum EntryBody {
    Memory(Bytes),
    Disk(PathBuf),
}

#[derive(Debug, Clone)]
pub(crate) struct CacheEntry {
    pub body: EntryBody,
    pub metadata: CacheMetadata,
}

impl CacheEntry {
    pub fn size(&self) -> u64 {
        self.metadata.size
    }

    pub async fn read_body(&self) -> std::io::Result<Bytes> {
        match &self.body {
            EntryBody::Memory(bytes) => Ok(bytes.clone()),
            EntryBody::Disk(path) => tokio::fs::read(path).await.map(Bytes::from),
        }
    }
}
