use bytes::Bytes;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;
use tokio::time::sleep;

use crate::common::utils::jittered_delay;
use crate::storage::tree_impl::CoordTreeImpl;
use crate::traits::coord_tree::CoordTree;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    /// First observation of a node that already existed.
    Initial,
    Created,
    Changed,
    Deleted,
}

#[derive(Debug, Clone)]
pub enum WatchEvent {
    ServersChanged(Vec<String>),
    RequestsChanged(Vec<String>),
    RequestData {
        request_id: String,
        data: Bytes,
        kind: ChangeKind,
    },
}

fn poll_delay(interval: Duration) -> Duration {
    Duration::from_millis(jittered_delay(interval.as_millis() as u64).max(1))
}

/// Posts the full child list of `path` once, then again whenever the set of
/// children changes. Stops when the receiver is gone.
pub fn spawn_children_watch<F>(
    tree: Arc<CoordTreeImpl>,
    path: String,
    interval: Duration,
    tx: UnboundedSender<WatchEvent>,
    to_event: F,
) -> JoinHandle<()>
where
    F: Fn(Vec<String>) -> WatchEvent + Send + 'static,
{
    tokio::spawn(async move {
        let mut last: Option<Vec<String>> = None;
        loop {
            match tree.get_children(&path).await {
                Ok(children) => {
                    if last.as_ref() != Some(&children) {
                        log::debug!("Children of {} changed: {:?}", path, children);
                        if tx.send(to_event(children.clone())).is_err() {
                            break;
                        }
                        last = Some(children);
                    }
                }
                Err(e) => {
                    log::warn!("Children watch on {} failed: {:?}", path, e);
                }
            }
            if tx.is_closed() {
                break;
            }
            sleep(poll_delay(interval)).await;
        }
        log::debug!("Children watch on {} stopped", path);
    })
}

#[derive(PartialEq)]
enum Observed {
    Unknown,
    Missing,
    Present { version: i64, ctime: i64 },
}

/// Posts the data of `path` on every version change, a `Deleted` event when
/// the node goes away and `Created` when it comes back. A node that is
/// missing on the first poll produces no event until it appears.
pub fn spawn_data_watch<F>(
    tree: Arc<CoordTreeImpl>,
    path: String,
    interval: Duration,
    tx: UnboundedSender<WatchEvent>,
    to_event: F,
) -> JoinHandle<()>
where
    F: Fn(Bytes, ChangeKind) -> WatchEvent + Send + 'static,
{
    tokio::spawn(async move {
        let mut observed = Observed::Unknown;
        loop {
            match tree.get(&path).await {
                Ok(Some((data, stat))) => {
                    let current = Observed::Present { version: stat.version, ctime: stat.ctime };
                    let kind = match observed {
                        Observed::Unknown => Some(ChangeKind::Initial),
                        Observed::Missing => Some(ChangeKind::Created),
                        Observed::Present { .. } if observed != current => Some(ChangeKind::Changed),
                        Observed::Present { .. } => None,
                    };
                    if let Some(kind) = kind {
                        if tx.send(to_event(data, kind)).is_err() {
                            break;
                        }
                    }
                    observed = current;
                }
                Ok(None) => {
                    if matches!(observed, Observed::Present { .. })
                        && tx.send(to_event(Bytes::new(), ChangeKind::Deleted)).is_err()
                    {
                        break;
                    }
                    observed = Observed::Missing;
                }
                Err(e) => {
                    log::warn!("Data watch on {} failed: {:?}", path, e);
                }
            }
            if tx.is_closed() {
                break;
            }
            sleep(poll_delay(interval)).await;
        }
        log::debug!("Data watch on {} stopped", path);
    })
}
