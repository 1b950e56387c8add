#![allow(dead_code)]

use async_trait::async_trait;
use pub_coordinator::common::config::{CoordinatorConfig, StorageType};
use pub_coordinator::handler::context::HandlerContext;
use pub_coordinator::storage::memory::mem_tree::MemTree;
use pub_coordinator::storage::tree_impl::CoordTreeImpl;
use pub_coordinator::traits::coord_tree::CoordTree;
use pub_coordinator::traits::publish_action::PublishAction;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const ROOT: &str = "/test";

/// Publish action whose exit status is scripted per server id.
pub struct MockPublishAction {
    failing: Mutex<HashMap<i64, bool>>,
    calls: Mutex<Vec<(String, String, i64)>>,
    delay: Duration,
}

impl MockPublishAction {
    pub fn new() -> Arc<Self> {
        Self::with_delay(Duration::ZERO)
    }

    pub fn with_delay(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            failing: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
            delay,
        })
    }

    pub fn fail_server(&self, server_id: i64) {
        self.failing.lock().unwrap().insert(server_id, true);
    }

    pub fn heal_server(&self, server_id: i64) {
        self.failing.lock().unwrap().remove(&server_id);
    }

    pub fn calls(&self) -> Vec<(String, String, i64)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_for(&self, server_id: i64) -> usize {
        self.calls().iter().filter(|(_, _, id)| *id == server_id).count()
    }
}

#[async_trait]
impl PublishAction for MockPublishAction {
    async fn publish(&self, config_version: &str, game_version: &str, server_id: i64) -> bool {
        self.calls
            .lock()
            .unwrap()
            .push((config_version.to_string(), game_version.to_string(), server_id));
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        !self.failing.lock().unwrap().contains_key(&server_id)
    }
}

pub fn test_config(max_publish_attempts: u32) -> CoordinatorConfig {
    CoordinatorConfig {
        host: "127.0.0.1".to_string(),
        port: 2181,
        root_node: ROOT.to_string(),
        shell_path: ".".to_string(),
        tree_store_type: StorageType::Memory,
        tree_file_path: "./data/tree".to_string(),
        tree_redis_urls: None,
        watch_interval_ms: 20,
        publish_timeout_secs: 5,
        max_publish_attempts,
    }
}

pub fn memory_ctx(action: Arc<MockPublishAction>, max_publish_attempts: u32) -> HandlerContext {
    let tree = Arc::new(CoordTreeImpl::Memory(MemTree::new()));
    HandlerContext::new(tree, &test_config(max_publish_attempts), action)
}

pub async fn add_server(ctx: &HandlerContext, node_id: &str, payload: Value) {
    let data = if payload.is_null() {
        Vec::new()
    } else {
        serde_json::to_vec(&payload).unwrap()
    };
    ctx.tree
        .create(&ctx.paths.server_node(node_id), &data, true)
        .await
        .unwrap();
}

pub async fn sync_registry(ctx: &HandlerContext) {
    let children = ctx.tree.get_children(&ctx.paths.server_list()).await.unwrap();
    ctx.registry.resync(&ctx.tree, &ctx.paths, &children).await;
}

pub async fn add_request(ctx: &HandlerContext, request_id: &str, payload: Value) -> Vec<u8> {
    let data = serde_json::to_vec(&payload).unwrap();
    ctx.tree
        .create(&ctx.paths.request_node(request_id), &data, true)
        .await
        .unwrap();
    data
}

pub async fn read_json(ctx: &HandlerContext, path: &str) -> Option<Value> {
    ctx.tree
        .get(path)
        .await
        .unwrap()
        .map(|(data, _)| serde_json::from_slice(&data).unwrap())
}
