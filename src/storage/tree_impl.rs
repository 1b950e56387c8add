use crate::storage::file::file_tree::FileTree;
use crate::storage::memory::mem_tree::MemTree;
use crate::storage::redis::redis_tree::RedisTree;
use crate::traits::coord_tree::{CoordTree, NodeStat};
use anyhow::Result;
use bytes::Bytes;

pub enum CoordTreeImpl {
    Memory(MemTree),
    File(FileTree),
    Redis(RedisTree),
}

impl CoordTree for CoordTreeImpl {
    async fn exists(&self, path: &str) -> Result<Option<NodeStat>> {
        match self {
            CoordTreeImpl::Memory(m) => m.exists(path).await,
            CoordTreeImpl::File(f) => f.exists(path).await,
            CoordTreeImpl::Redis(r) => r.exists(path).await,
        }
    }

    async fn create(&self, path: &str, data: &[u8], makepath: bool) -> Result<()> {
        match self {
            CoordTreeImpl::Memory(m) => m.create(path, data, makepath).await,
            CoordTreeImpl::File(f) => f.create(path, data, makepath).await,
            CoordTreeImpl::Redis(r) => r.create(path, data, makepath).await,
        }
    }

    async fn set(&self, path: &str, data: &[u8]) -> Result<NodeStat> {
        match self {
            CoordTreeImpl::Memory(m) => m.set(path, data).await,
            CoordTreeImpl::File(f) => f.set(path, data).await,
            CoordTreeImpl::Redis(r) => r.set(path, data).await,
        }
    }

    async fn get(&self, path: &str) -> Result<Option<(Bytes, NodeStat)>> {
        match self {
            CoordTreeImpl::Memory(m) => m.get(path).await,
            CoordTreeImpl::File(f) => f.get(path).await,
            CoordTreeImpl::Redis(r) => r.get(path).await,
        }
    }

    async fn get_children(&self, path: &str) -> Result<Vec<String>> {
        match self {
            CoordTreeImpl::Memory(m) => m.get_children(path).await,
            CoordTreeImpl::File(f) => f.get_children(path).await,
            CoordTreeImpl::Redis(r) => r.get_children(path).await,
        }
    }

    async fn delete(&self, path: &str) -> Result<()> {
        match self {
            CoordTreeImpl::Memory(m) => m.delete(path).await,
            CoordTreeImpl::File(f) => f.delete(path).await,
            CoordTreeImpl::Redis(r) => r.delete(path).await,
        }
    }
}
