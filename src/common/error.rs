use thiserror::Error;

/// Conditions of the coordination tree that callers branch on.
///
/// Backends return these wrapped in `anyhow::Error`; use
/// [`is_node_exists`] / [`is_no_node`] to test for them.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TreeError {
    #[error("node already exists: {0}")]
    NodeExists(String),
    #[error("no node: {0}")]
    NoNode(String),
    #[error("invalid path: {0}")]
    InvalidPath(String),
}

pub fn is_node_exists(err: &anyhow::Error) -> bool {
    matches!(err.downcast_ref::<TreeError>(), Some(TreeError::NodeExists(_)))
}

pub fn is_no_node(err: &anyhow::Error) -> bool {
    matches!(err.downcast_ref::<TreeError>(), Some(TreeError::NoNode(_)))
}
