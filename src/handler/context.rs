use std::sync::Arc;

use crate::common::config::CoordinatorConfig;
use crate::common::paths::TreePaths;
use crate::handler::publish::RetryPolicy;
use crate::handler::registry::ServerRegistry;
use crate::storage::tree_impl::CoordTreeImpl;
use crate::traits::publish_action::PublishAction;

#[derive(Clone)]
pub struct HandlerContext {
    pub tree: Arc<CoordTreeImpl>,
    pub paths: TreePaths,
    pub registry: Arc<ServerRegistry>,
    pub action: Arc<dyn PublishAction>,
    pub retry: RetryPolicy,
}

impl HandlerContext {
    pub fn new(tree: Arc<CoordTreeImpl>, config: &CoordinatorConfig, action: Arc<dyn PublishAction>) -> Self {
        Self {
            tree,
            paths: TreePaths::new(&config.root_node),
            registry: Arc::new(ServerRegistry::new()),
            action,
            retry: RetryPolicy::from_max_attempts(config.max_publish_attempts),
        }
    }
}
