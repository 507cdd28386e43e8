//! Task Dispatcher
//!
//! Executes tasks received from other nodes: looks up the type id, rebuilds the
//! payload from its JSON text and runs it against the local node context.

use super::registry::TaskRegistry;
use super::types::*;
use crate::node::context::NodeContext;

use anyhow::Result;
use std::sync::Arc;

pub struct TaskDispatcher {
    registry: Arc<TaskRegistry>,
    context: Arc<NodeContext>,
}

impl TaskDispatcher {
    pub fn new(registry: Arc<TaskRegistry>, context: Arc<NodeContext>) -> Arc<Self> {
        Arc::new(Self { registry, context })
    }

    pub fn context(&self) -> &Arc<NodeContext> {
        &self.context
    }

    /// Executes one task.
    ///
    /// # Returns
    /// * `Ok(true)` if the payload ran successfully.
    /// * `Ok(false)` if the type is unknown or the payload could not be rebuilt.
    /// * `Err` if the payload's own logic failed; the caller owns retry policy.
    pub async fn execute(
        &self,
        type_id: &str,
        target: &str,
        text_data: Option<&str>,
        binary_data: Option<Vec<u8>>,
    ) -> Result<bool> {
        let task = TaskInstance {
            type_id: type_id.to_string(),
            target: target.to_string(),
            text_data: text_data.map(str::to_string),
            binary_data,
            ..Default::default()
        };
        self.execute_instance(&task).await
    }

    pub async fn execute_instance(&self, task: &TaskInstance) -> Result<bool> {
        let Some(registered) = self.registry.get(&task.type_id) else {
            tracing::warn!("Unknown task type: {} (target '{}')", task.type_id, task.target);
            return Ok(false);
        };

        let payload = match registered.instantiate(task.text()) {
            Ok(payload) => payload,
            Err(e) => {
                tracing::error!(
                    "Failed to rebuild payload {} for task {} (target '{}'): {} at line {} column {}; \
                     text data: {}",
                    registered.config().payload_type,
                    task.type_id,
                    task.target,
                    e,
                    e.line(),
                    e.column(),
                    task.text().unwrap_or("")
                );
                return Ok(false);
            }
        };

        tracing::debug!(
            "Executing task {} (target '{}', binary: {} bytes)",
            task.type_id,
            task.target,
            task.binary_len()
        );

        payload.execute(task, &self.context).await?;
        Ok(true)
    }
}
