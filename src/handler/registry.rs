use anyhow::Result;
use indexmap::IndexMap;
use tokio::sync::RwLock;

use crate::common::paths::TreePaths;
use crate::common::server::ServerRecord;
use crate::storage::tree_impl::CoordTreeImpl;
use crate::traits::coord_tree::CoordTree;

/// In-memory view of `server_list`, keyed by node id in first-seen order.
///
/// Entries are only ever inserted or replaced. A node that disappears from
/// the tree keeps its last record here until the process restarts.
pub struct ServerRegistry {
    servers: RwLock<IndexMap<String, ServerRecord>>,
}

impl ServerRegistry {
    pub fn new() -> Self {
        Self {
            servers: RwLock::new(IndexMap::new()),
        }
    }

    /// Re-reads one server node and stores the result. A node without data
    /// (or one removed since it was listed) becomes an inert placeholder.
    pub async fn refresh(&self, tree: &CoordTreeImpl, paths: &TreePaths, node_id: &str) -> Result<ServerRecord> {
        let data = tree
            .get(&paths.server_node(node_id))
            .await?
            .map(|(data, _)| data)
            .unwrap_or_default();

        let record = if data.is_empty() {
            ServerRecord::placeholder(node_id)
        } else {
            ServerRecord::decode(node_id, &data)?
        };

        self.servers
            .write()
            .await
            .insert(node_id.to_string(), record.clone());
        Ok(record)
    }

    /// Refreshes every listed node. Returns how many were refreshed.
    pub async fn resync(&self, tree: &CoordTreeImpl, paths: &TreePaths, children: &[String]) -> usize {
        let mut refreshed = 0;
        for node_id in children {
            match self.refresh(tree, paths, node_id).await {
                Ok(record) => {
                    refreshed += 1;
                    log::info!(
                        "refresh server list {}",
                        serde_json::json!({
                            "node_id": record.node_id,
                            "server_id": record.server_id,
                            "server_name": record.server_name,
                            "update_time": record.update_time,
                        })
                    );
                }
                Err(e) => {
                    log::warn!("Failed to refresh server node {}: {:?}", node_id, e);
                }
            }
        }
        refreshed
    }

    pub async fn snapshot(&self) -> Vec<ServerRecord> {
        self.servers.read().await.values().cloned().collect()
    }

    pub async fn get(&self, node_id: &str) -> Option<ServerRecord> {
        self.servers.read().await.get(node_id).cloned()
    }

    pub async fn len(&self) -> usize {
        self.servers.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.servers.read().await.is_empty()
    }
}

impl Default for ServerRegistry {
    fn default() -> Self {
        Self::new()
    }
}
