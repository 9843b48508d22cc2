use crate::utils::error::Result;
use async_trait::async_trait;

/// Byte-level persistence for the dataset snapshot.
#[async_trait]
pub trait Storage: Send + Sync {
    async fn read_file(&self, path: &str) -> Result<Vec<u8>>;
    async fn write_file(&self, path: &str, data: &[u8]) -> Result<()>;
}

#[async_trait]
impl<T: Storage + ?Sized> Storage for Box<T> {
    async fn read_file(&self, path: &str) -> Result<Vec<u8>> {
        (**self).read_file(path).await
    }

    async fn write_file(&self, path: &str, data: &[u8]) -> Result<()> {
        (**self).write_file(path, data).await
    }
}

pub trait ConfigProvider: Send + Sync {
    fn store_path(&self) -> &str;
    fn snapshot_file(&self) -> &str;
    fn pretty_snapshot(&self) -> bool;
    fn max_timeline_span(&self) -> u32;
}
