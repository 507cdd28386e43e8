//! Storage tasks: keep every node's private file storage in sync.

use crate::error::FarmError;
use crate::farm::registry::ClusterTask;
use crate::farm::types::TaskInstance;
use crate::node::context::NodeContext;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const UPDATE_FILE: &str = "storage.update_file";
pub const DELETE_FILE: &str = "storage.delete_file";

/// Target of file tasks, carried as the positional JSON array
/// `[siteName, guid, fileName, extension, deleteFlag]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileTarget {
    pub site_name: String,
    pub guid: String,
    pub file_name: String,
    /// Includes the leading dot, e.g. `".png"`.
    pub extension: String,
    /// Remove the file's directory (older versions, thumbnails) first.
    pub delete_existing: bool,
}

impl FileTarget {
    pub fn parse(target: &str) -> Result<Self, FarmError> {
        let (site_name, guid, file_name, extension, delete_existing): (
            String,
            String,
            String,
            String,
            bool,
        ) = serde_json::from_str(target).map_err(|e| FarmError::InvalidTarget {
            target: target.to_string(),
            reason: e.to_string(),
        })?;

        let parsed = Self {
            site_name,
            guid,
            file_name,
            extension,
            delete_existing,
        };

        for segment in [&parsed.site_name, &parsed.guid, &parsed.file_name] {
            if !is_safe_segment(segment) {
                return Err(FarmError::InvalidTarget {
                    target: target.to_string(),
                    reason: format!("unsafe path segment '{}'", segment),
                });
            }
        }
        if parsed.extension.contains(['/', '\\']) {
            return Err(FarmError::InvalidTarget {
                target: target.to_string(),
                reason: format!("unsafe extension '{}'", parsed.extension),
            });
        }

        Ok(parsed)
    }

    pub fn encode(&self) -> String {
        serde_json::json!([
            self.site_name,
            self.guid,
            self.file_name,
            self.extension,
            self.delete_existing
        ])
        .to_string()
    }

    /// `<root>/<site>/<guid>`.
    pub fn directory(&self, root: &Path) -> PathBuf {
        root.join(&self.site_name).join(&self.guid)
    }

    /// `<root>/<site>/<guid>/<fileName><extension>`.
    pub fn file_path(&self, root: &Path) -> PathBuf {
        self.directory(root)
            .join(format!("{}{}", self.file_name, self.extension))
    }
}

fn is_safe_segment(segment: &str) -> bool {
    !segment.is_empty() && segment != "." && segment != ".." && !segment.contains(['/', '\\'])
}

/// Writes the binary data of the task to the node's file storage.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateFileTask {}

#[async_trait]
impl ClusterTask for UpdateFileTask {
    fn can_create(&self, task: &TaskInstance) -> bool {
        task.binary_data.is_some() && FileTarget::parse(&task.target).is_ok()
    }

    async fn execute(&self, task: &TaskInstance, ctx: &NodeContext) -> Result<()> {
        let target = FileTarget::parse(&task.target)?;
        let data = task
            .binary_data
            .as_deref()
            .ok_or_else(|| anyhow::anyhow!("Missing file content for {}", task.target))?;

        let directory = target.directory(&ctx.file_root);
        if target.delete_existing && tokio::fs::try_exists(&directory).await? {
            tokio::fs::remove_dir_all(&directory).await?;
        }
        tokio::fs::create_dir_all(&directory).await?;

        let path = target.file_path(&ctx.file_root);
        tokio::fs::write(&path, data).await?;

        tracing::debug!("Stored {} bytes at {}", data.len(), path.display());
        Ok(())
    }
}

/// Deletes a file (or its whole directory when the delete flag is set).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeleteFileTask {}

#[async_trait]
impl ClusterTask for DeleteFileTask {
    fn can_create(&self, task: &TaskInstance) -> bool {
        FileTarget::parse(&task.target).is_ok()
    }

    async fn execute(&self, task: &TaskInstance, ctx: &NodeContext) -> Result<()> {
        let target = FileTarget::parse(&task.target)?;

        if target.delete_existing {
            let directory = target.directory(&ctx.file_root);
            if tokio::fs::try_exists(&directory).await? {
                tokio::fs::remove_dir_all(&directory).await?;
            }
            return Ok(());
        }

        let path = target.file_path(&ctx.file_root);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            // Already gone: deleting twice is fine.
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
