use anyhow::Result;

use crate::common::error::is_node_exists;
use crate::common::publish::{PublishRequest, PublishResult, PublishStatus};
use crate::handler::context::HandlerContext;
use crate::server::watch::ChangeKind;
use crate::traits::coord_tree::CoordTree;

/// What happens to a request after a pass where some server failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryPolicy {
    /// Nothing is written; the request stays pending and every server is
    /// published again on the next change to the request node.
    Unbounded,
    /// Each failed pass bumps `attempts` on the request node. Once it
    /// reaches the limit the request is closed as `failed`.
    Bounded(u32),
}

impl RetryPolicy {
    pub fn from_max_attempts(max_attempts: u32) -> Self {
        match max_attempts {
            0 => RetryPolicy::Unbounded,
            n => RetryPolicy::Bounded(n),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    Deleted,
    EmptyPayload,
    Malformed,
    Terminal,
    NotReady,
    /// A registered server is targeted but a version is missing.
    MissingVersion,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassOutcome {
    Skipped(SkipReason),
    /// Every matched server succeeded; the request is now `ok`.
    Completed { published: usize },
    /// At least one server failed; the request stays pending.
    Pending { published: usize, failed: usize, attempts: Option<u32> },
    /// Attempts exhausted; the request is now `failed`.
    Failed { published: usize, failed: usize, attempts: u32 },
}

/// Runs one pass over a publish request after its node changed.
///
/// Guards, in order: deleted node, empty payload, undecodable payload,
/// terminal status or missing `servers`, missing versions while some server
/// is matched. Otherwise every registered server
/// named in `servers` is published and gets its result node upserted, then
/// the request is closed as `ok` if all of them succeeded.
pub async fn on_request_changed(
    handler_ctx: &HandlerContext,
    request_id: &str,
    payload: &[u8],
    change_kind: ChangeKind,
) -> Result<PassOutcome> {
    if change_kind == ChangeKind::Deleted {
        return Ok(PassOutcome::Skipped(SkipReason::Deleted));
    }
    if payload.is_empty() {
        return Ok(PassOutcome::Skipped(SkipReason::EmptyPayload));
    }

    let request_path = handler_ctx.paths.request_node(request_id);
    log::info!(
        "watch_pub execute {} {}",
        request_path,
        String::from_utf8_lossy(payload)
    );

    let mut request = match PublishRequest::decode(payload) {
        Ok(request) => request,
        Err(e) => {
            log::warn!("Ignoring malformed publish request {}: {}", request_path, e);
            return Ok(PassOutcome::Skipped(SkipReason::Malformed));
        }
    };
    if request.is_terminal() {
        return Ok(PassOutcome::Skipped(SkipReason::Terminal));
    }
    let Some(targets) = request.targets() else {
        return Ok(PassOutcome::Skipped(SkipReason::NotReady));
    };

    let matched: Vec<_> = handler_ctx
        .registry
        .snapshot()
        .await
        .into_iter()
        .filter(|server| server.is_registered() && targets.contains(&server.server_id.to_string()))
        .collect();
    if !matched.is_empty() && !request.has_versions() {
        log::warn!("Publish request {} targets servers but has no versions", request_path);
        return Ok(PassOutcome::Skipped(SkipReason::MissingVersion));
    }

    let config_version = request.config_version_arg();
    let game_version = request.game_version_arg();
    let mut published = 0;
    let mut failed = 0;

    for server in matched {
        let success = handler_ctx
            .action
            .publish(&config_version, &game_version, server.server_id)
            .await;
        let result_path = handler_ctx.paths.result_node(request_id, server.server_id);
        if success {
            log::info!("pub node {} pub success", result_path);
        } else {
            log::info!("pub node {} pub failed", result_path);
        }

        let written = match upsert_result(handler_ctx, &result_path, &PublishResult::new(success)).await {
            Ok(()) => true,
            Err(e) => {
                log::error!("Failed to write publish result {}: {:?}", result_path, e);
                false
            }
        };

        if success && written {
            published += 1;
        } else {
            failed += 1;
        }
    }

    if failed == 0 {
        request.mark_finished(PublishStatus::Ok);
        handler_ctx.tree.set(&request_path, &request.encode()?).await?;
        log::info!("Publish request {} finished ({} servers)", request_path, published);
        return Ok(PassOutcome::Completed { published });
    }

    match handler_ctx.retry {
        RetryPolicy::Unbounded => {
            log::warn!(
                "Publish request {} left pending: {} of {} servers failed",
                request_path,
                failed,
                published + failed
            );
            Ok(PassOutcome::Pending { published, failed, attempts: None })
        }
        RetryPolicy::Bounded(max_attempts) => {
            let attempts = request.attempts.unwrap_or(0) + 1;
            request.attempts = Some(attempts);
            if attempts >= max_attempts {
                request.mark_finished(PublishStatus::Failed);
                handler_ctx.tree.set(&request_path, &request.encode()?).await?;
                log::error!(
                    "Publish request {} failed after {} attempts",
                    request_path,
                    attempts
                );
                Ok(PassOutcome::Failed { published, failed, attempts })
            } else {
                handler_ctx.tree.set(&request_path, &request.encode()?).await?;
                log::warn!(
                    "Publish request {} attempt {}/{} had {} failed servers",
                    request_path,
                    attempts,
                    max_attempts,
                    failed
                );
                Ok(PassOutcome::Pending { published, failed, attempts: Some(attempts) })
            }
        }
    }
}

/// Creates the result node, or overwrites it when it is already there. Losing
/// a create race to another writer is not an error; that writer's result
/// stands for this pass.
pub async fn upsert_result(handler_ctx: &HandlerContext, result_path: &str, result: &PublishResult) -> Result<()> {
    let data = result.encode()?;
    if handler_ctx.tree.exists(result_path).await?.is_some() {
        handler_ctx.tree.set(result_path, &data).await?;
        return Ok(());
    }
    match handler_ctx.tree.create(result_path, &data, true).await {
        Ok(()) => Ok(()),
        Err(e) if is_node_exists(&e) => {
            log::debug!("Result node {} created concurrently, skipping", result_path);
            Ok(())
        }
        Err(e) => Err(e),
    }
}
