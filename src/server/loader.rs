use crate::common::config::{CoordinatorConfig, StorageType};
use crate::storage::{
    file::file_tree::FileTree,
    memory::mem_tree::MemTree,
    redis::redis_client::RedisClient,
    redis::redis_tree::RedisTree,
    tree_impl::CoordTreeImpl,
};
use anyhow::Result;

const REDIS_KEY_PREFIX: &str = "pubtree";

pub async fn load_coord_tree(config: &CoordinatorConfig) -> Result<CoordTreeImpl> {
    let tree = match &config.tree_store_type {
        StorageType::Memory => {
            log::debug!("Using in-memory coordination tree");
            CoordTreeImpl::Memory(MemTree::new())
        }
        StorageType::File => {
            log::debug!("Using file coordination tree at {}", config.tree_file_path);
            CoordTreeImpl::File(FileTree::new(&config.tree_file_path)?)
        }
        StorageType::Redis => {
            let redis_urls = config.redis_urls();
            log::debug!("Using Redis coordination tree at {:?}", redis_urls);
            let client = RedisClient::connect(&redis_urls).await?;
            CoordTreeImpl::Redis(RedisTree::new(client, REDIS_KEY_PREFIX))
        }
    };
    Ok(tree)
}
