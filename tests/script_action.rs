#![cfg(unix)]

use pub_coordinator::handler::script_action::ScriptPublishAction;
use pub_coordinator::traits::publish_action::PublishAction;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;
use std::time::{Duration, Instant};

fn write_script(dir: &Path, body: &str) {
    let path = dir.join("pub.sh");
    std::fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
}

// one test so no other thread holds a script open while it is executed
#[tokio::test]
async fn script_exit_status_decides_outcome() {
    let ok_dir = tempfile::tempdir().unwrap();
    write_script(
        ok_dir.path(),
        r#"echo "$1 $2 $3" >> "$(dirname "$0")/calls.log"
echo noise
echo more noise >&2
[ "$3" = "5" ] && exit 0
exit 3"#,
    );
    let slow_dir = tempfile::tempdir().unwrap();
    write_script(slow_dir.path(), "sleep 10");
    let empty_dir = tempfile::tempdir().unwrap();

    let action = ScriptPublishAction::new(ok_dir.path(), Duration::from_secs(10));
    assert_eq!(action.script(), ok_dir.path().join("pub.sh"));
    assert!(action.publish("c1", "g1", 5).await);
    assert!(!action.publish("c1", "g1", 6).await);
    let calls = std::fs::read_to_string(ok_dir.path().join("calls.log")).unwrap();
    assert_eq!(calls, "c1 g1 5\nc1 g1 6\n");

    let missing = ScriptPublishAction::new(empty_dir.path(), Duration::from_secs(1));
    assert!(!missing.publish("c1", "g1", 5).await);

    let slow = ScriptPublishAction::new(slow_dir.path(), Duration::from_millis(200));
    let started = Instant::now();
    assert!(!slow.publish("c1", "g1", 5).await);
    assert!(started.elapsed() < Duration::from_secs(5));
}
