use crate::common::error::TreeError;

const SERVER_LIST: &str = "server_list";
const TO_PUB_NOTICE: &str = "to_pub_notice";
const TO_PUB_RESULT: &str = "to_pub_result";

/// Node paths under the configured root.
#[derive(Debug, Clone)]
pub struct TreePaths {
    root: String,
}

impl TreePaths {
    pub fn new(root_node: &str) -> Self {
        let trimmed = root_node.trim_end_matches('/');
        let root = if trimmed.starts_with('/') {
            trimmed.to_string()
        } else {
            format!("/{}", trimmed)
        };
        Self { root }
    }

    pub fn root(&self) -> &str {
        &self.root
    }

    pub fn server_list(&self) -> String {
        format!("{}/{}", self.root, SERVER_LIST)
    }

    pub fn server_node(&self, node_id: &str) -> String {
        format!("{}/{}/{}", self.root, SERVER_LIST, node_id)
    }

    pub fn request_root(&self) -> String {
        format!("{}/{}", self.root, TO_PUB_NOTICE)
    }

    pub fn request_node(&self, request_id: &str) -> String {
        format!("{}/{}/{}", self.root, TO_PUB_NOTICE, request_id)
    }

    pub fn result_node(&self, request_id: &str, server_id: i64) -> String {
        format!("{}/{}/{}/s{}", self.root, TO_PUB_RESULT, request_id, server_id)
    }
}

/// Checks that `path` is absolute, has no empty segments and no trailing slash.
/// `/` itself is valid.
pub fn validate_path(path: &str) -> anyhow::Result<()> {
    if path == "/" {
        return Ok(());
    }
    if !path.starts_with('/') || path.ends_with('/') || path[1..].split('/').any(|s| s.is_empty()) {
        return Err(TreeError::InvalidPath(path.to_string()).into());
    }
    Ok(())
}

/// Parent of an absolute path, `None` for `/`.
pub fn parent_path(path: &str) -> Option<&str> {
    if path == "/" {
        return None;
    }
    match path.rfind('/') {
        Some(0) => Some("/"),
        Some(idx) => Some(&path[..idx]),
        None => None,
    }
}

pub fn child_path(parent: &str, child: &str) -> String {
    if parent == "/" {
        format!("/{}", child)
    } else {
        format!("{}/{}", parent, child)
    }
}

/// Last segment of an absolute path.
pub fn node_name(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_under_root() {
        let paths = TreePaths::new("/test/");
        assert_eq!(paths.server_node("n1"), "/test/server_list/n1");
        assert_eq!(paths.request_node("r1"), "/test/to_pub_notice/r1");
        assert_eq!(paths.result_node("r1", 5), "/test/to_pub_result/r1/s5");
        assert_eq!(TreePaths::new("games").root(), "/games");
    }

    #[test]
    fn parent_and_validation() {
        assert_eq!(parent_path("/a/b"), Some("/a"));
        assert_eq!(parent_path("/a"), Some("/"));
        assert_eq!(parent_path("/"), None);
        assert!(validate_path("/a/b").is_ok());
        assert!(validate_path("a/b").is_err());
        assert!(validate_path("/a//b").is_err());
        assert!(validate_path("/a/").is_err());
        assert_eq!(child_path("/", "a"), "/a");
        assert_eq!(node_name("/a/s5"), "s5");
    }
}
