mod common;

use common::{add_request, add_server, memory_ctx, read_json, MockPublishAction};
use pub_coordinator::handler::context::HandlerContext;
use pub_coordinator::run_coordinator;
use pub_coordinator::traits::coord_tree::CoordTree;
use serde_json::{json, Value};
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::time::{sleep, timeout, Instant};

const WATCH_INTERVAL: Duration = Duration::from_millis(20);

async fn wait_for_status(ctx: &HandlerContext, request_id: &str, status: &str) -> Value {
    let path = ctx.paths.request_node(request_id);
    let deadline = Instant::now() + Duration::from_secs(5);
    loop {
        if let Some(request) = read_json(ctx, &path).await {
            if request["status"] == status {
                return request;
            }
        }
        assert!(Instant::now() < deadline, "request {} never reached {}", request_id, status);
        sleep(Duration::from_millis(10)).await;
    }
}

#[tokio::test]
async fn watched_requests_are_published_end_to_end() {
    let action = MockPublishAction::new();
    let ctx = memory_ctx(action.clone(), 0);
    add_server(&ctx, "n1", json!({"server_id": 5, "server_name": "s5"})).await;
    add_request(&ctx, "existing", json!({"servers": ["5"], "config_version": "c0", "game_version": "g0"})).await;

    let (stop_tx, stop_rx) = oneshot::channel::<()>();
    let running = tokio::spawn(run_coordinator(ctx.clone(), WATCH_INTERVAL, async {
        let _ = stop_rx.await;
    }));

    // request present before startup
    wait_for_status(&ctx, "existing", "ok").await;
    assert!(ctx.tree.exists(&ctx.paths.request_root()).await.unwrap().is_some());

    // request and server added while running
    add_server(&ctx, "n2", json!({"server_id": 6})).await;
    let deadline = Instant::now() + Duration::from_secs(5);
    while ctx.registry.get("n2").await.is_none() {
        assert!(Instant::now() < deadline, "server n2 never registered");
        sleep(Duration::from_millis(10)).await;
    }
    add_request(&ctx, "r2", json!({"servers": ["5", "6"], "config_version": "c1", "game_version": "g1"})).await;
    wait_for_status(&ctx, "r2", "ok").await;

    assert_eq!(read_json(&ctx, &ctx.paths.result_node("r2", 6)).await.unwrap()["status"], "ok");
    assert_eq!(action.calls_for(5), 2);
    assert_eq!(action.calls_for(6), 1);

    // completed requests stay quiet across further polls
    sleep(WATCH_INTERVAL * 5).await;
    assert_eq!(action.calls().len(), 3);

    stop_tx.send(()).unwrap();
    timeout(Duration::from_secs(5), running).await.unwrap().unwrap().unwrap();
}

#[tokio::test]
async fn failed_request_is_retried_on_the_next_write() {
    let action = MockPublishAction::new();
    action.fail_server(5);
    let ctx = memory_ctx(action.clone(), 0);
    add_server(&ctx, "n1", json!({"server_id": 5})).await;

    let (stop_tx, stop_rx) = oneshot::channel::<()>();
    let running = tokio::spawn(run_coordinator(ctx.clone(), WATCH_INTERVAL, async {
        let _ = stop_rx.await;
    }));

    add_request(&ctx, "r1", json!({"servers": ["5"], "config_version": "c1", "game_version": "g1"})).await;
    let result_path = ctx.paths.result_node("r1", 5);
    let deadline = Instant::now() + Duration::from_secs(5);
    while read_json(&ctx, &result_path).await.is_none() {
        assert!(Instant::now() < deadline, "no result written");
        sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(read_json(&ctx, &result_path).await.unwrap()["status"], "failed");
    sleep(WATCH_INTERVAL * 5).await;
    assert_eq!(action.calls_for(5), 1);

    // publisher touches the request after fixing the server
    action.heal_server(5);
    let request_path = ctx.paths.request_node("r1");
    let mut request = read_json(&ctx, &request_path).await.unwrap();
    request["note"] = json!("retry");
    ctx.tree
        .set(&request_path, &serde_json::to_vec(&request).unwrap())
        .await
        .unwrap();

    let request = wait_for_status(&ctx, "r1", "ok").await;
    assert_eq!(request["note"], "retry");
    assert_eq!(read_json(&ctx, &result_path).await.unwrap()["status"], "ok");

    stop_tx.send(()).unwrap();
    timeout(Duration::from_secs(5), running).await.unwrap().unwrap().unwrap();
}

#[tokio::test]
async fn bounded_attempts_end_in_failed_status() {
    let action = MockPublishAction::new();
    action.fail_server(5);
    let ctx = memory_ctx(action.clone(), 3);
    add_server(&ctx, "n1", json!({"server_id": 5})).await;

    let (stop_tx, stop_rx) = oneshot::channel::<()>();
    let running = tokio::spawn(run_coordinator(ctx.clone(), WATCH_INTERVAL, async {
        let _ = stop_rx.await;
    }));

    add_request(&ctx, "r1", json!({"servers": ["5"], "config_version": "c1", "game_version": "g1"})).await;
    let request = wait_for_status(&ctx, "r1", "failed").await;
    assert_eq!(request["attempts"], 3);

    sleep(WATCH_INTERVAL * 5).await;
    assert_eq!(action.calls_for(5), 3);

    stop_tx.send(()).unwrap();
    timeout(Duration::from_secs(5), running).await.unwrap().unwrap().unwrap();
}
