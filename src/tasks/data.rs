//! Data tasks: invalidate cached object dictionaries on other nodes.

use crate::error::FarmError;
use crate::farm::registry::ClusterTask;
use crate::farm::types::TaskInstance;
use crate::node::context::NodeContext;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub const INVALIDATE_OBJECT: &str = "data.invalidate_object";
pub const CLEAR_HASHTABLES: &str = "data.clear_hashtables";

/// Target grammar of object tasks: `"<className>|<actionName>|<binaryFlag>"`.
///
/// Split on the first and the last `|`, so the action name may itself contain
/// the delimiter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectTarget {
    pub class_name: String,
    pub action_name: String,
    pub binary: bool,
}

impl ObjectTarget {
    pub fn new(class_name: &str, action_name: &str, binary: bool) -> Self {
        Self {
            class_name: class_name.to_string(),
            action_name: action_name.to_string(),
            binary,
        }
    }

    pub fn parse(target: &str) -> Result<Self, FarmError> {
        let invalid = |reason: &str| FarmError::InvalidTarget {
            target: target.to_string(),
            reason: reason.to_string(),
        };

        let first = target.find('|').ok_or_else(|| invalid("missing '|' delimiter"))?;
        let last = target.rfind('|').unwrap_or(first);
        if first == last {
            return Err(invalid("expected <className>|<actionName>|<binaryFlag>"));
        }

        let class_name = &target[..first];
        if class_name.is_empty() {
            return Err(invalid("empty class name"));
        }

        let binary = match &target[last + 1..] {
            "1" | "true" | "True" => true,
            "0" | "false" | "False" | "" => false,
            _ => return Err(invalid("binary flag must be a boolean")),
        };

        Ok(Self {
            class_name: class_name.to_string(),
            action_name: target[first + 1..last].to_string(),
            binary,
        })
    }

    pub fn encode(&self) -> String {
        format!(
            "{}|{}|{}",
            self.class_name,
            self.action_name,
            if self.binary { "1" } else { "0" }
        )
    }
}

/// Drops cached objects of one class. An empty id list drops the whole
/// dictionary.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InvalidateObjectTask {
    #[serde(default)]
    pub object_ids: Vec<i64>,
}

#[async_trait]
impl ClusterTask for InvalidateObjectTask {
    fn can_create(&self, task: &TaskInstance) -> bool {
        ObjectTarget::parse(&task.target).is_ok()
    }

    async fn execute(&self, task: &TaskInstance, ctx: &NodeContext) -> Result<()> {
        let target = ObjectTarget::parse(&task.target)?;

        if self.object_ids.is_empty() {
            ctx.caches.clear_table(&target.class_name);
            tracing::debug!("Dropped object dictionary {} ({})", target.class_name, target.action_name);
            return Ok(());
        }

        let removed = self
            .object_ids
            .iter()
            .filter(|id| ctx.caches.remove(&target.class_name, &id.to_string()))
            .count();
        tracing::debug!(
            "Invalidated {}/{} cached {} objects ({})",
            removed,
            self.object_ids.len(),
            target.class_name,
            target.action_name
        );
        Ok(())
    }
}

/// Clears the dictionary named by the target.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClearHashtablesTask {}

#[async_trait]
impl ClusterTask for ClearHashtablesTask {
    fn can_create(&self, task: &TaskInstance) -> bool {
        !task.target.is_empty()
    }

    async fn execute(&self, task: &TaskInstance, ctx: &NodeContext) -> Result<()> {
        ctx.caches.clear_table(&task.target);
        Ok(())
    }
}
