use serde::{Deserialize, Deserializer, Serialize};

/// One deployable server as registered under `server_list`.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ServerRecord {
    #[serde(skip)]
    pub node_id: String,
    #[serde(default, deserialize_with = "de_server_id")]
    pub server_id: i64,
    #[serde(default)]
    pub server_name: String,
    #[serde(default)]
    pub update_time: f64,
}

impl ServerRecord {
    /// Inert record for a server node that carries no data yet.
    pub fn placeholder(node_id: &str) -> Self {
        Self {
            node_id: node_id.to_string(),
            server_id: 0,
            server_name: String::new(),
            update_time: 0.0,
        }
    }

    pub fn decode(node_id: &str, data: &[u8]) -> anyhow::Result<Self> {
        let mut record: ServerRecord = serde_json::from_slice(data)?;
        record.node_id = node_id.to_string();
        Ok(record)
    }

    pub fn is_registered(&self) -> bool {
        self.server_id != 0
    }
}

// registrars are not consistent about numbers vs numeric strings
fn de_server_id<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawId {
        Int(i64),
        Text(String),
        Null(Option<()>),
    }

    match RawId::deserialize(deserializer)? {
        RawId::Int(id) => Ok(id),
        RawId::Text(s) if s.trim().is_empty() => Ok(0),
        RawId::Text(s) => s.trim().parse::<i64>().map_err(serde::de::Error::custom),
        RawId::Null(_) => Ok(0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_accepts_numeric_strings() {
        let record = ServerRecord::decode("n1", br#"{"server_id":"7","server_name":"s7"}"#).unwrap();
        assert_eq!(record.node_id, "n1");
        assert_eq!(record.server_id, 7);
        assert_eq!(record.update_time, 0.0);
    }

    #[test]
    fn missing_id_is_unregistered() {
        let record = ServerRecord::decode("n2", br#"{"server_name":"pending"}"#).unwrap();
        assert!(!record.is_registered());
        assert!(ServerRecord::decode("n3", b"not json").is_err());
    }
}
