//! System tasks: node-wide cache resets and session synchronization.

use crate::farm::registry::ClusterTask;
use crate::farm::types::TaskInstance;
use crate::node::context::NodeContext;
use crate::sessions::types::SessionsCachingAction;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub const CLEAR_CACHE: &str = "system.clear_cache";
pub const SYNC_SESSION: &str = "system.sync_session";
pub const RENAME_SITE: &str = "system.rename_site";

/// Drops every local dictionary.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClearCacheTask {}

#[async_trait]
impl ClusterTask for ClearCacheTask {
    async fn execute(&self, _task: &TaskInstance, ctx: &NodeContext) -> Result<()> {
        let cleared = ctx.caches.clear_all();
        tracing::info!("Cleared {} cache tables on request of another node", cleared);
        Ok(())
    }
}

/// Replays a session change made on another node.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SyncSessionTask {
    /// `None` only for the default value used during registration checks.
    pub action: Option<SessionsCachingAction>,
}

impl SyncSessionTask {
    pub fn new(action: SessionsCachingAction) -> Self {
        Self {
            action: Some(action),
        }
    }
}

#[async_trait]
impl ClusterTask for SyncSessionTask {
    fn can_create(&self, _task: &TaskInstance) -> bool {
        self.action.is_some()
    }

    async fn execute(&self, _task: &TaskInstance, ctx: &NodeContext) -> Result<()> {
        let action = self
            .action
            .clone()
            .ok_or_else(|| anyhow::anyhow!("Session sync task without an action"))?;
        ctx.sessions.apply(action)?;
        Ok(())
    }
}

/// Moves a site's sessions and cached state to its new name (the target).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RenameSiteTask {
    pub old_site_name: String,
}

#[async_trait]
impl ClusterTask for RenameSiteTask {
    fn can_create(&self, task: &TaskInstance) -> bool {
        !self.old_site_name.is_empty() && !task.target.is_empty() && self.old_site_name != task.target
    }

    async fn execute(&self, task: &TaskInstance, ctx: &NodeContext) -> Result<()> {
        if self.old_site_name.is_empty() || task.target.is_empty() {
            return Err(anyhow::anyhow!("Rename needs both the old and the new site name"));
        }
        ctx.sessions.change_site_name(&self.old_site_name, &task.target)?;
        ctx.caches.clear_table(&format!("site:{}", self.old_site_name));
        Ok(())
    }
}
