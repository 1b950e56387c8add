use anyhow::Result;
use std::future::Future;
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

use crate::common::config::{load_coordinator_config, CliArgs};
use crate::handler::bootstrap::ensure_request_root;
use crate::handler::context::HandlerContext;
use crate::handler::script_action::ScriptPublishAction;
use crate::server::dispatch::RequestDispatcher;
use crate::server::loader::load_coord_tree;
use crate::server::request_watcher::RequestWatcher;
use crate::server::watch::{spawn_children_watch, WatchEvent};
use crate::traits::coord_tree::CoordTree;

/// `[LEVEL 2024-01-01 12:00:00 file.rs 42] message`, filter from `RUST_LOG`
/// (default `info`).
pub fn init_logging() {
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format(|buf, record| {
            let file = record
                .file()
                .and_then(|f| f.rsplit('/').next())
                .unwrap_or("-");
            writeln!(
                buf,
                "[{} {} {} {}] {}",
                record.level(),
                chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
                file,
                record.line().unwrap_or(0),
                record.args()
            )
        })
        .try_init();
}

pub async fn coordinator_start(cli: &CliArgs) -> Result<()> {
    init_logging();
    log::info!("Starting publish coordinator...");
    let config = load_coordinator_config(cli)?;
    log::info!(
        "Coordination tree {:?} at {}:{}, root {}, scripts in {}",
        config.tree_store_type,
        config.host,
        config.port,
        config.root_node,
        config.shell_path
    );

    let tree = Arc::new(load_coord_tree(&config).await?);
    let action = Arc::new(ScriptPublishAction::new(&config.shell_path, config.publish_timeout()));
    let handler_ctx = HandlerContext::new(tree, &config, action);

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            log::error!("Failed to listen for interrupt: {:?}", e);
            std::future::pending::<()>().await;
        }
    };
    run_coordinator(handler_ctx, config.watch_interval(), shutdown).await
}

/// Bootstraps the request root, loads the registry and then follows the
/// tree until `shutdown` resolves.
pub async fn run_coordinator<S>(handler_ctx: HandlerContext, watch_interval: Duration, shutdown: S) -> Result<()>
where
    S: Future<Output = ()>,
{
    ensure_request_root(&handler_ctx).await?;

    // servers first, so the first pass over existing requests sees them
    let server_list = handler_ctx.paths.server_list();
    let servers = handler_ctx.tree.get_children(&server_list).await?;
    handler_ctx
        .registry
        .resync(&handler_ctx.tree, &handler_ctx.paths, &servers)
        .await;

    let (tx, mut rx) = mpsc::unbounded_channel::<WatchEvent>();
    let server_watch = spawn_children_watch(
        handler_ctx.tree.clone(),
        server_list,
        watch_interval,
        tx.clone(),
        WatchEvent::ServersChanged,
    );
    let mut request_watcher = RequestWatcher::new(
        handler_ctx.tree.clone(),
        handler_ctx.paths.clone(),
        watch_interval,
        tx.clone(),
    );
    let request_root_watch = request_watcher.watch_all();
    drop(tx);

    let dispatcher = RequestDispatcher::new(handler_ctx.clone());
    log::info!("Watching {}", handler_ctx.paths.request_root());

    tokio::pin!(shutdown);
    loop {
        tokio::select! {
            _ = &mut shutdown => {
                log::info!("Shutdown requested");
                break;
            }
            event = rx.recv() => {
                match event {
                    Some(WatchEvent::ServersChanged(children)) => {
                        handler_ctx
                            .registry
                            .resync(&handler_ctx.tree, &handler_ctx.paths, &children)
                            .await;
                    }
                    Some(WatchEvent::RequestsChanged(children)) => {
                        request_watcher.observe(&children);
                    }
                    Some(WatchEvent::RequestData { request_id, data, kind }) => {
                        dispatcher.dispatch(request_id, data, kind);
                    }
                    None => break,
                }
            }
        }
    }

    server_watch.abort();
    request_root_watch.abort();
    request_watcher.stop_all();
    log::info!("Publish coordinator stopped");
    Ok(())
}
