use crate::common::error::TreeError;
use crate::common::paths::{child_path, node_name, parent_path, validate_path};
use crate::storage::redis::redis_client::RedisClient;
use crate::traits::coord_tree::{CoordTree, NodeStat};
use anyhow::Result;
use bytes::Bytes;
use redis::Script;
use std::collections::HashMap;

// Returns 1 when the node was created, 0 when it already existed.
const CREATE_SCRIPT: &str = r#"
if redis.call('EXISTS', KEYS[1]) == 1 then return 0 end
redis.call('HSET', KEYS[1], 'data', ARGV[1], 'version', 0, 'ctime', ARGV[2], 'mtime', ARGV[2])
return 1
"#;

// Returns the new version, or -1 when the node is missing.
const SET_SCRIPT: &str = r#"
if redis.call('EXISTS', KEYS[1]) == 0 then return -1 end
local version = redis.call('HINCRBY', KEYS[1], 'version', 1)
redis.call('HSET', KEYS[1], 'data', ARGV[1], 'mtime', ARGV[2])
return version
"#;

/// Tree stored in Redis. Each node is a hash `<prefix>:node:<path>` holding
/// data and stat fields; child names live in the set
/// `<prefix>:children:<path>`. Create and set are atomic per node.
pub struct RedisTree {
    client: RedisClient,
    prefix: String,
    create_script: Script,
    set_script: Script,
}

impl RedisTree {
    pub fn new(client: RedisClient, prefix: &str) -> Self {
        Self {
            client,
            prefix: prefix.to_string(),
            create_script: Script::new(CREATE_SCRIPT),
            set_script: Script::new(SET_SCRIPT),
        }
    }

    fn node_key(&self, path: &str) -> String {
        format!("{}:node:{}", self.prefix, path)
    }

    fn children_key(&self, path: &str) -> String {
        format!("{}:children:{}", self.prefix, path)
    }

    async fn node_exists(&self, path: &str) -> Result<bool> {
        if path == "/" {
            return Ok(true);
        }
        self.client.exists(&self.node_key(path)).await
    }

    /// Creates the node and links it under its parent. Returns false when the
    /// node was already there.
    async fn create_node(&self, path: &str, data: &[u8]) -> Result<bool> {
        let now = chrono::Utc::now().timestamp_millis().to_string();
        let created: i64 = self
            .client
            .eval(&self.create_script, &self.node_key(path), &[data, now.as_bytes()])
            .await?;
        if let Some(parent) = parent_path(path) {
            self.client.sadd(&self.children_key(parent), node_name(path)).await?;
        }
        Ok(created == 1)
    }

    fn parse_stat(fields: &HashMap<String, Vec<u8>>) -> NodeStat {
        let field = |name: &str| {
            fields
                .get(name)
                .and_then(|raw| std::str::from_utf8(raw).ok())
                .and_then(|s| s.parse::<i64>().ok())
                .unwrap_or_default()
        };
        NodeStat { version: field("version"), ctime: field("ctime"), mtime: field("mtime") }
    }
}

impl CoordTree for RedisTree {
    async fn exists(&self, path: &str) -> Result<Option<NodeStat>> {
        Ok(self.get(path).await?.map(|(_, stat)| stat))
    }

    async fn create(&self, path: &str, data: &[u8], makepath: bool) -> Result<()> {
        validate_path(path)?;
        if path == "/" {
            return Err(TreeError::NodeExists(path.to_string()).into());
        }

        let mut missing = Vec::new();
        let mut cursor = parent_path(path);
        while let Some(parent) = cursor {
            if self.node_exists(parent).await? {
                break;
            }
            missing.push(parent);
            cursor = parent_path(parent);
        }
        if let Some(first_missing) = missing.first() {
            if !makepath {
                return Err(TreeError::NoNode(first_missing.to_string()).into());
            }
        }
        for ancestor in missing.into_iter().rev() {
            self.create_node(ancestor, &[]).await?;
        }

        if !self.create_node(path, data).await? {
            return Err(TreeError::NodeExists(path.to_string()).into());
        }
        Ok(())
    }

    async fn set(&self, path: &str, data: &[u8]) -> Result<NodeStat> {
        validate_path(path)?;
        let now = chrono::Utc::now().timestamp_millis().to_string();
        let version: i64 = self
            .client
            .eval(&self.set_script, &self.node_key(path), &[data, now.as_bytes()])
            .await?;
        if version < 0 {
            return Err(TreeError::NoNode(path.to_string()).into());
        }
        self.exists(path)
            .await?
            .ok_or_else(|| TreeError::NoNode(path.to_string()).into())
    }

    async fn get(&self, path: &str) -> Result<Option<(Bytes, NodeStat)>> {
        validate_path(path)?;
        if path == "/" {
            return Ok(Some((Bytes::new(), NodeStat::default())));
        }
        let mut fields = self.client.hgetall(&self.node_key(path)).await?;
        if fields.is_empty() {
            return Ok(None);
        }
        let stat = Self::parse_stat(&fields);
        let data = fields.remove("data").unwrap_or_default();
        Ok(Some((Bytes::from(data), stat)))
    }

    async fn get_children(&self, path: &str) -> Result<Vec<String>> {
        validate_path(path)?;
        let mut children = self.client.smembers(&self.children_key(path)).await?;
        children.sort();
        Ok(children)
    }

    async fn delete(&self, path: &str) -> Result<()> {
        validate_path(path)?;
        if path == "/" {
            return Err(TreeError::InvalidPath(path.to_string()).into());
        }
        if !self.node_exists(path).await? {
            return Err(TreeError::NoNode(path.to_string()).into());
        }

        // depth first, children before the node itself
        let mut stack = vec![path.to_string()];
        let mut ordered = Vec::new();
        while let Some(current) = stack.pop() {
            for child in self.client.smembers(&self.children_key(&current)).await? {
                stack.push(child_path(&current, &child));
            }
            ordered.push(current);
        }
        for node in ordered.into_iter().rev() {
            self.client.del(&self.node_key(&node)).await?;
            self.client.del(&self.children_key(&node)).await?;
        }
        if let Some(parent) = parent_path(path) {
            self.client.srem(&self.children_key(parent), node_name(path)).await?;
        }
        Ok(())
    }
}
