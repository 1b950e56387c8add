use crate::common::error::TreeError;
use crate::common::paths::{parent_path, validate_path};
use crate::traits::coord_tree::{CoordTree, NodeStat};
use anyhow::Result;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use bytes::Bytes;
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use std::fs::{create_dir, create_dir_all, read_dir, remove_dir_all, File, OpenOptions};
use std::io::{ErrorKind::NotFound, Write};
use std::path::{Path, PathBuf};

const NODE_FILE: &str = "__node__.json";
const LOCK_FILE: &str = ".tree.lock";

#[derive(Debug, Serialize, Deserialize)]
struct NodeEnvelope {
    version: i64,
    ctime: i64,
    mtime: i64,
    data: String,
}

impl NodeEnvelope {
    fn stat(&self) -> NodeStat {
        NodeStat { version: self.version, ctime: self.ctime, mtime: self.mtime }
    }
}

/// Tree kept as a directory hierarchy, usable by several processes on one
/// host or a shared mount. Each node is a directory; its data sits in an
/// envelope file next to the child directories. Writers serialise on an
/// exclusive lock file at the tree root.
pub struct FileTree {
    base_dir: PathBuf,
}

impl FileTree {
    pub fn new(base_dir: impl AsRef<Path>) -> Result<Self> {
        let base_dir = base_dir.as_ref().to_owned();
        create_dir_all(&base_dir)?;
        Ok(Self { base_dir })
    }

    fn node_dir(&self, path: &str) -> Result<PathBuf> {
        validate_path(path)?;
        let mut dir = self.base_dir.clone();
        for segment in path.split('/').filter(|s| !s.is_empty()) {
            if segment == "." || segment == ".." || segment == NODE_FILE {
                return Err(TreeError::InvalidPath(path.to_string()).into());
            }
            dir.push(segment);
        }
        Ok(dir)
    }

    fn lock(&self) -> Result<File> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(self.base_dir.join(LOCK_FILE))?;
        file.lock_exclusive()?;
        Ok(file)
    }

    fn read_envelope(dir: &Path) -> Result<Option<NodeEnvelope>> {
        match std::fs::read(dir.join(NODE_FILE)) {
            Ok(contents) if contents.is_empty() => Ok(None),
            Ok(contents) => Ok(Some(serde_json::from_slice(&contents)?)),
            Err(e) if e.kind() == NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn write_envelope(dir: &Path, envelope: &NodeEnvelope) -> Result<()> {
        let tmp_path = dir.join(format!("{}.tmp", NODE_FILE));
        let mut file = File::create(&tmp_path)?;
        file.write_all(&serde_json::to_vec(envelope)?)?;
        file.sync_all()?;
        std::fs::rename(&tmp_path, dir.join(NODE_FILE))?;
        Ok(())
    }

    fn new_envelope(data: &[u8]) -> NodeEnvelope {
        let now = chrono::Utc::now().timestamp_millis();
        NodeEnvelope { version: 0, ctime: now, mtime: now, data: STANDARD.encode(data) }
    }

    // A directory whose envelope has not been written yet is a node with no data.
    fn stat_of(dir: &Path) -> Result<Option<NodeStat>> {
        if !dir.is_dir() {
            return Ok(None);
        }
        Ok(Some(Self::read_envelope(dir)?.map(|e| e.stat()).unwrap_or_default()))
    }
}

impl CoordTree for FileTree {
    async fn exists(&self, path: &str) -> Result<Option<NodeStat>> {
        let dir = self.node_dir(path)?;
        Self::stat_of(&dir)
    }

    async fn create(&self, path: &str, data: &[u8], makepath: bool) -> Result<()> {
        let dir = self.node_dir(path)?;
        let lock = self.lock()?;

        if dir.is_dir() {
            return Err(TreeError::NodeExists(path.to_string()).into());
        }
        if let Some(parent) = parent_path(path) {
            let parent_dir = self.node_dir(parent)?;
            if !parent_dir.is_dir() {
                if !makepath {
                    return Err(TreeError::NoNode(parent.to_string()).into());
                }
                let mut missing = Vec::new();
                let mut cursor = Some(parent);
                while let Some(ancestor) = cursor {
                    let ancestor_dir = self.node_dir(ancestor)?;
                    if ancestor_dir.is_dir() {
                        break;
                    }
                    missing.push(ancestor_dir);
                    cursor = parent_path(ancestor);
                }
                for ancestor_dir in missing.into_iter().rev() {
                    create_dir(&ancestor_dir)?;
                    Self::write_envelope(&ancestor_dir, &Self::new_envelope(&[]))?;
                }
            }
        }

        create_dir(&dir)?;
        Self::write_envelope(&dir, &Self::new_envelope(data))?;
        log::debug!("Created tree node {:?}", dir);
        lock.unlock()?;
        Ok(())
    }

    async fn set(&self, path: &str, data: &[u8]) -> Result<NodeStat> {
        let dir = self.node_dir(path)?;
        let lock = self.lock()?;
        if !dir.is_dir() {
            return Err(TreeError::NoNode(path.to_string()).into());
        }
        let mut envelope = Self::read_envelope(&dir)?.unwrap_or_else(|| Self::new_envelope(&[]));
        envelope.version += 1;
        envelope.mtime = chrono::Utc::now().timestamp_millis();
        envelope.data = STANDARD.encode(data);
        Self::write_envelope(&dir, &envelope)?;
        lock.unlock()?;
        Ok(envelope.stat())
    }

    async fn get(&self, path: &str) -> Result<Option<(Bytes, NodeStat)>> {
        let dir = self.node_dir(path)?;
        if !dir.is_dir() {
            return Ok(None);
        }
        match Self::read_envelope(&dir)? {
            Some(envelope) => {
                let data = STANDARD.decode(envelope.data.as_bytes())?;
                Ok(Some((Bytes::from(data), envelope.stat())))
            }
            None => Ok(Some((Bytes::new(), NodeStat::default()))),
        }
    }

    async fn get_children(&self, path: &str) -> Result<Vec<String>> {
        let dir = self.node_dir(path)?;
        let entries = match read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == NotFound => return Ok(vec![]),
            Err(e) => return Err(e.into()),
        };
        let mut children = Vec::new();
        for entry in entries {
            let entry = entry?;
            if entry.file_type()?.is_dir() {
                children.push(entry.file_name().to_string_lossy().to_string());
            }
        }
        children.sort();
        Ok(children)
    }

    async fn delete(&self, path: &str) -> Result<()> {
        if path == "/" {
            return Err(TreeError::InvalidPath(path.to_string()).into());
        }
        let dir = self.node_dir(path)?;
        let lock = self.lock()?;
        if !dir.is_dir() {
            return Err(TreeError::NoNode(path.to_string()).into());
        }
        remove_dir_all(&dir)?;
        lock.unlock()?;
        Ok(())
    }
}
