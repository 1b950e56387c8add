use bytes::Bytes;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::task::JoinHandle;

use crate::handler::context::HandlerContext;
use crate::handler::publish::{on_request_changed, PassOutcome};
use crate::server::watch::ChangeKind;
use crate::traits::coord_tree::CoordTree;

/// Runs request passes off the event loop. Passes for different requests run
/// concurrently; passes for the same request are serialised.
#[derive(Clone)]
pub struct RequestDispatcher {
    handler_ctx: HandlerContext,
    locks: Arc<Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>>,
}

impl RequestDispatcher {
    pub fn new(handler_ctx: HandlerContext) -> Self {
        Self {
            handler_ctx,
            locks: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    fn lock_for(&self, request_id: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        locks
            .entry(request_id.to_string())
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone()
    }

    /// Drops the request's lock once no other pass holds or waits on it, so
    /// requests removed from the tree leave nothing behind.
    fn release(&self, request_id: &str, lock: Arc<tokio::sync::Mutex<()>>) {
        let mut locks = self.locks.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let idle = locks
            .get(request_id)
            .is_some_and(|held| Arc::ptr_eq(held, &lock) && Arc::strong_count(&lock) == 2);
        if idle {
            locks.remove(request_id);
        }
    }

    /// Number of requests with a pass running or queued.
    pub fn tracked_requests(&self) -> usize {
        self.locks.lock().unwrap_or_else(|poisoned| poisoned.into_inner()).len()
    }

    pub fn dispatch(&self, request_id: String, data: Bytes, kind: ChangeKind) -> JoinHandle<Option<PassOutcome>> {
        let dispatcher = self.clone();
        tokio::spawn(async move { dispatcher.process(&request_id, data, kind).await })
    }

    /// One pass for `request_id`. The node is read again once the request
    /// lock is held, so an event queued behind a pass that already closed the
    /// request sees the closed state.
    pub async fn process(&self, request_id: &str, data: Bytes, kind: ChangeKind) -> Option<PassOutcome> {
        let lock = self.lock_for(request_id);
        let guard = lock.lock().await;

        let (data, kind) = if kind == ChangeKind::Deleted {
            (data, kind)
        } else {
            let request_path = self.handler_ctx.paths.request_node(request_id);
            match self.handler_ctx.tree.get(&request_path).await {
                Ok(Some((latest, _))) => (latest, kind),
                Ok(None) => (Bytes::new(), ChangeKind::Deleted),
                Err(e) => {
                    log::warn!("Failed to re-read {}, using event payload: {:?}", request_path, e);
                    (data, kind)
                }
            }
        };

        let outcome = match on_request_changed(&self.handler_ctx, request_id, &data, kind).await {
            Ok(outcome) => {
                log::debug!("Request {} pass outcome: {:?}", request_id, outcome);
                Some(outcome)
            }
            Err(e) => {
                log::error!("Publish pass for request {} failed: {:?}", request_id, e);
                None
            }
        };

        drop(guard);
        self.release(request_id, lock);
        outcome
    }
}
