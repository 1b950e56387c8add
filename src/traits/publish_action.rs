use async_trait::async_trait;

/// Per-server publish step. Implementations never fail the caller: launch
/// errors and timeouts are reported as an unsuccessful outcome.
#[async_trait]
pub trait PublishAction: Send + Sync {
    async fn publish(&self, config_version: &str, game_version: &str, server_id: i64) -> bool;
}
