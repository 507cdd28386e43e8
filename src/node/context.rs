use super::caches::LocalCaches;
use crate::farm::types::NodeId;
use crate::sessions::cache::SessionCache;

use std::path::PathBuf;
use std::sync::Arc;

/// Node-local state that cluster tasks act upon when executed.
pub struct NodeContext {
    pub node_id: NodeId,
    pub caches: Arc<LocalCaches>,
    pub sessions: SessionCache,
    /// Root directory of this node's private file storage.
    pub file_root: PathBuf,
}

impl NodeContext {
    pub fn new(
        node_id: NodeId,
        caches: Arc<LocalCaches>,
        sessions: SessionCache,
        file_root: PathBuf,
    ) -> Arc<Self> {
        Arc::new(Self {
            node_id,
            caches,
            sessions,
            file_root,
        })
    }
}
