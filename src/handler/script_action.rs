use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;

use crate::traits::publish_action::PublishAction;

pub const PUBLISH_SCRIPT: &str = "pub.sh";

/// Runs `<shell_path>/pub.sh <config_version> <game_version> <server_id>` with
/// output discarded. Exit status 0 is success. A zero timeout waits forever.
pub struct ScriptPublishAction {
    script: PathBuf,
    timeout: Duration,
}

impl ScriptPublishAction {
    pub fn new(shell_path: impl AsRef<Path>, timeout: Duration) -> Self {
        Self {
            script: shell_path.as_ref().join(PUBLISH_SCRIPT),
            timeout,
        }
    }

    pub fn script(&self) -> &Path {
        &self.script
    }
}

#[async_trait]
impl PublishAction for ScriptPublishAction {
    async fn publish(&self, config_version: &str, game_version: &str, server_id: i64) -> bool {
        log::info!(
            "start to execute shell {} {} {} {}",
            self.script.display(),
            config_version,
            game_version,
            server_id
        );

        let mut child = match Command::new(&self.script)
            .arg(config_version)
            .arg(game_version)
            .arg(server_id.to_string())
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
        {
            Ok(child) => child,
            Err(e) => {
                log::warn!("Failed to launch {}: {}", self.script.display(), e);
                return false;
            }
        };

        if self.timeout.is_zero() {
            return match child.wait().await {
                Ok(status) => status.success(),
                Err(e) => {
                    log::warn!("Failed to wait for {}: {}", self.script.display(), e);
                    false
                }
            };
        }

        match tokio::time::timeout(self.timeout, child.wait()).await {
            Ok(Ok(status)) => status.success(),
            Ok(Err(e)) => {
                log::warn!("Failed to wait for {}: {}", self.script.display(), e);
                false
            }
            Err(_) => {
                log::warn!(
                    "{} for server {} timed out after {:?}",
                    self.script.display(),
                    server_id,
                    self.timeout
                );
                if let Err(e) = child.kill().await {
                    log::warn!("Failed to kill {}: {}", self.script.display(), e);
                }
                false
            }
        }
    }
}
