use anyhow::Result;
use bytes::Bytes;

/// Metadata returned alongside node data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct NodeStat {
    /// Bumped on every `set`; 0 right after `create`.
    pub version: i64,
    /// Milliseconds since UNIX_EPOCH.
    pub ctime: i64,
    pub mtime: i64,
}

/// Hierarchical key/value namespace shared by publishers and coordinators.
///
/// Paths are absolute (`/a/b`). A conflicting `create` must fail with
/// `TreeError::NodeExists`, writing or creating below a missing parent with
/// `TreeError::NoNode`.
#[trait_variant::make(CoordTree: Send)]
pub trait UnsendCoordTree {
    async fn exists(&self, path: &str) -> Result<Option<NodeStat>>;
    /// With `makepath`, missing ancestors are created with empty data.
    async fn create(&self, path: &str, data: &[u8], makepath: bool) -> Result<()>;
    async fn set(&self, path: &str, data: &[u8]) -> Result<NodeStat>;
    async fn get(&self, path: &str) -> Result<Option<(Bytes, NodeStat)>>;
    /// Child names, sorted. A missing node has no children.
    async fn get_children(&self, path: &str) -> Result<Vec<String>>;
    /// Removes a node and everything below it.
    async fn delete(&self, path: &str) -> Result<()>;
}
