use crate::common::error::TreeError;
use crate::common::paths::{child_path, parent_path, validate_path};
use crate::traits::coord_tree::{CoordTree, NodeStat};
use anyhow::Result;
use bytes::Bytes;
use std::collections::BTreeMap;
use tokio::sync::RwLock;

struct MemNode {
    data: Bytes,
    stat: NodeStat,
}

/// Process-local tree. Every coordinator sharing it must live in this process.
pub struct MemTree {
    nodes: RwLock<BTreeMap<String, MemNode>>,
}

impl MemTree {
    pub fn new() -> Self {
        let mut nodes = BTreeMap::new();
        let now = chrono::Utc::now().timestamp_millis();
        nodes.insert(
            "/".to_string(),
            MemNode {
                data: Bytes::new(),
                stat: NodeStat { version: 0, ctime: now, mtime: now },
            },
        );
        Self { nodes: RwLock::new(nodes) }
    }
}

impl Default for MemTree {
    fn default() -> Self {
        Self::new()
    }
}

fn new_node(data: &[u8]) -> MemNode {
    let now = chrono::Utc::now().timestamp_millis();
    MemNode {
        data: Bytes::copy_from_slice(data),
        stat: NodeStat { version: 0, ctime: now, mtime: now },
    }
}

impl CoordTree for MemTree {
    async fn exists(&self, path: &str) -> Result<Option<NodeStat>> {
        validate_path(path)?;
        let nodes = self.nodes.read().await;
        Ok(nodes.get(path).map(|n| n.stat))
    }

    async fn create(&self, path: &str, data: &[u8], makepath: bool) -> Result<()> {
        validate_path(path)?;
        let mut nodes = self.nodes.write().await;
        if nodes.contains_key(path) {
            return Err(TreeError::NodeExists(path.to_string()).into());
        }

        let mut missing = Vec::new();
        let mut cursor = parent_path(path);
        while let Some(parent) = cursor {
            if nodes.contains_key(parent) {
                break;
            }
            missing.push(parent.to_string());
            cursor = parent_path(parent);
        }
        if !missing.is_empty() && !makepath {
            return Err(TreeError::NoNode(missing[0].clone()).into());
        }
        for ancestor in missing.into_iter().rev() {
            nodes.insert(ancestor, new_node(&[]));
        }
        nodes.insert(path.to_string(), new_node(data));
        Ok(())
    }

    async fn set(&self, path: &str, data: &[u8]) -> Result<NodeStat> {
        validate_path(path)?;
        let mut nodes = self.nodes.write().await;
        let node = nodes
            .get_mut(path)
            .ok_or_else(|| TreeError::NoNode(path.to_string()))?;
        node.data = Bytes::copy_from_slice(data);
        node.stat.version += 1;
        node.stat.mtime = chrono::Utc::now().timestamp_millis();
        Ok(node.stat)
    }

    async fn get(&self, path: &str) -> Result<Option<(Bytes, NodeStat)>> {
        validate_path(path)?;
        let nodes = self.nodes.read().await;
        Ok(nodes.get(path).map(|n| (n.data.clone(), n.stat)))
    }

    async fn get_children(&self, path: &str) -> Result<Vec<String>> {
        validate_path(path)?;
        let prefix = child_path(path, "");
        let nodes = self.nodes.read().await;
        let children = nodes
            .range(prefix.clone()..)
            .take_while(|(key, _)| key.starts_with(&prefix))
            .map(|(key, _)| &key[prefix.len()..])
            .filter(|name| !name.is_empty() && !name.contains('/'))
            .map(|name| name.to_string())
            .collect();
        Ok(children)
    }

    async fn delete(&self, path: &str) -> Result<()> {
        validate_path(path)?;
        if path == "/" {
            return Err(TreeError::InvalidPath(path.to_string()).into());
        }
        let prefix = child_path(path, "");
        let mut nodes = self.nodes.write().await;
        if nodes.remove(path).is_none() {
            return Err(TreeError::NoNode(path.to_string()).into());
        }
        nodes.retain(|key, _| !key.starts_with(&prefix));
        Ok(())
    }
}
