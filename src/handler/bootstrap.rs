use anyhow::Result;
use serde_json::json;

use crate::common::error::is_node_exists;
use crate::common::utils::now_secs;
use crate::handler::context::HandlerContext;
use crate::traits::coord_tree::CoordTree;

/// Makes sure the request root exists before anything watches it. Returns
/// true when this call created it.
pub async fn ensure_request_root(handler_ctx: &HandlerContext) -> Result<bool> {
    let request_root = handler_ctx.paths.request_root();
    if handler_ctx.tree.exists(&request_root).await?.is_some() {
        log::debug!("Request root {} already present", request_root);
        return Ok(false);
    }

    let default_value = serde_json::to_vec(&json!({ "update_time": now_secs() }))?;
    match handler_ctx.tree.create(&request_root, &default_value, true).await {
        Ok(()) => {
            log::info!("Created request root {}", request_root);
            Ok(true)
        }
        Err(e) if is_node_exists(&e) => {
            log::debug!("Request root {} created concurrently", request_root);
            Ok(false)
        }
        Err(e) => Err(e),
    }
}
