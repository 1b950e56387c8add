use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;

use crate::common::paths::TreePaths;
use crate::server::watch::{spawn_children_watch, spawn_data_watch, WatchEvent};
use crate::storage::tree_impl::CoordTreeImpl;

/// Keeps one data watch per request node under the request root.
pub struct RequestWatcher {
    tree: Arc<CoordTreeImpl>,
    paths: TreePaths,
    interval: Duration,
    tx: UnboundedSender<WatchEvent>,
    watched: HashMap<String, JoinHandle<()>>,
}

impl RequestWatcher {
    pub fn new(tree: Arc<CoordTreeImpl>, paths: TreePaths, interval: Duration, tx: UnboundedSender<WatchEvent>) -> Self {
        Self {
            tree,
            paths,
            interval,
            tx,
            watched: HashMap::new(),
        }
    }

    /// Subscribes to child changes of the request root. Each change arrives
    /// as `WatchEvent::RequestsChanged` and should be fed to [`observe`].
    ///
    /// [`observe`]: RequestWatcher::observe
    pub fn watch_all(&self) -> JoinHandle<()> {
        spawn_children_watch(
            self.tree.clone(),
            self.paths.request_root(),
            self.interval,
            self.tx.clone(),
            WatchEvent::RequestsChanged,
        )
    }

    /// Attaches a data watch to every listed request not watched yet and
    /// drops watches of requests no longer listed. Returns how many watches
    /// were attached.
    pub fn observe(&mut self, children: &[String]) -> usize {
        self.watched.retain(|request_id, handle| {
            let keep = children.contains(request_id);
            if !keep {
                log::info!("Request {} removed, dropping its watch", request_id);
                handle.abort();
            }
            keep
        });

        let mut attached = 0;
        for request_id in children {
            if self.watched.contains_key(request_id) {
                continue;
            }
            let request_path = self.paths.request_node(request_id);
            log::info!("watch_pub children {}", request_path);
            let id = request_id.clone();
            let handle = spawn_data_watch(
                self.tree.clone(),
                request_path,
                self.interval,
                self.tx.clone(),
                move |data, kind| WatchEvent::RequestData {
                    request_id: id.clone(),
                    data,
                    kind,
                },
            );
            self.watched.insert(request_id.clone(), handle);
            attached += 1;
        }
        attached
    }

    pub fn stop_all(&mut self) {
        for (_, handle) in self.watched.drain() {
            handle.abort();
        }
    }
}

impl Drop for RequestWatcher {
    fn drop(&mut self) {
        self.stop_all();
    }
}
