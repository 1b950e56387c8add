use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::collections::HashSet;

use crate::common::utils::now_secs;

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PublishStatus {
    Pending,
    Ok,
    Failed,
}

impl PublishStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, PublishStatus::Ok | PublishStatus::Failed)
    }
}

/// Payload of `to_pub_notice/<request_id>`.
///
/// Fields the coordinator does not know about are kept in `extra` so that
/// rewriting the node never drops what the publisher wrote.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct PublishRequest {
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub config_version: Value,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub game_version: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub servers: Option<Vec<Value>>,
    #[serde(default, deserialize_with = "de_status", skip_serializing_if = "Option::is_none")]
    pub status: Option<PublishStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finish_time: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attempts: Option<u32>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl PublishRequest {
    pub fn decode(data: &[u8]) -> anyhow::Result<Self> {
        Ok(serde_json::from_slice(data)?)
    }

    pub fn encode(&self) -> anyhow::Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_some_and(PublishStatus::is_terminal)
    }

    /// Target server ids in their string form, `None` while the publisher has
    /// not filled in `servers`.
    pub fn targets(&self) -> Option<HashSet<String>> {
        self.servers
            .as_ref()
            .map(|servers| servers.iter().map(version_arg).collect())
    }

    pub fn targets_server(&self, server_id: i64) -> bool {
        self.targets()
            .is_some_and(|targets| targets.contains(&server_id.to_string()))
    }

    /// Both versions are only needed once some server is matched.
    pub fn has_versions(&self) -> bool {
        !self.config_version.is_null() && !self.game_version.is_null()
    }

    pub fn config_version_arg(&self) -> String {
        version_arg(&self.config_version)
    }

    pub fn game_version_arg(&self) -> String {
        version_arg(&self.game_version)
    }

    pub fn mark_finished(&mut self, status: PublishStatus) {
        self.status = Some(status);
        self.finish_time = Some(now_secs());
    }
}

/// Only `ok` and `failed` stop processing; any other status value counts as
/// pending.
fn de_status<'de, D>(deserializer: D) -> Result<Option<PublishStatus>, D::Error>
where
    D: Deserializer<'de>,
{
    let status = match Option::<Value>::deserialize(deserializer)? {
        None => None,
        Some(Value::String(s)) if s == "ok" => Some(PublishStatus::Ok),
        Some(Value::String(s)) if s == "failed" => Some(PublishStatus::Failed),
        Some(_) => Some(PublishStatus::Pending),
    };
    Ok(status)
}

/// Renders an opaque version value as a command line argument. Strings are
/// passed as-is, anything else in its JSON form.
pub fn version_arg(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ResultStatus {
    Ok,
    Failed,
}

/// Payload of `to_pub_result/<request_id>/s<server_id>`.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct PublishResult {
    pub status: ResultStatus,
    pub update_time: f64,
}

impl PublishResult {
    pub fn new(success: bool) -> Self {
        Self {
            status: if success { ResultStatus::Ok } else { ResultStatus::Failed },
            update_time: now_secs(),
        }
    }

    pub fn decode(data: &[u8]) -> anyhow::Result<Self> {
        Ok(serde_json::from_slice(data)?)
    }

    pub fn encode(&self) -> anyhow::Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rewrite_keeps_publisher_fields() {
        let raw = br#"{"config_version":"c1","game_version":3,"servers":["5",6],"owner":"ops"}"#;
        let mut request = PublishRequest::decode(raw).unwrap();
        assert!(request.targets_server(5));
        assert!(request.targets_server(6));
        assert!(!request.targets_server(7));
        assert_eq!(request.game_version_arg(), "3");

        request.mark_finished(PublishStatus::Ok);
        let value: Value = serde_json::from_slice(&request.encode().unwrap()).unwrap();
        assert_eq!(value["owner"], "ops");
        assert_eq!(value["status"], "ok");
        assert_eq!(value["servers"], serde_json::json!(["5", 6]));
        assert!(value["finish_time"].as_f64().is_some());
    }

    #[test]
    fn missing_servers_means_not_ready() {
        let request = PublishRequest::decode(br#"{"config_version":"c","game_version":"g"}"#).unwrap();
        assert!(request.targets().is_none());
        assert!(!request.is_terminal());

        let request = PublishRequest::decode(br#"{"config_version":"c","game_version":"g","servers":null,"status":"failed"}"#).unwrap();
        assert!(request.targets().is_none());
        assert!(request.is_terminal());
    }

    #[test]
    fn unknown_status_and_missing_versions_still_decode() {
        let request = PublishRequest::decode(br#"{"servers":["5"],"status":"queued"}"#).unwrap();
        assert_eq!(request.status, Some(PublishStatus::Pending));
        assert!(!request.is_terminal());
        assert!(!request.has_versions());

        let request = PublishRequest::decode(br#"{"servers":[],"status":7}"#).unwrap();
        assert!(!request.is_terminal());
        let value: Value = serde_json::from_slice(&request.encode().unwrap()).unwrap();
        assert!(value.get("config_version").is_none());
        assert!(value.get("game_version").is_none());
    }
}
