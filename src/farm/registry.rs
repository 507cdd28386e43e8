//! Task Type Registry
//!
//! Maps stable task-type identifiers (e.g. "data.invalidate_object") to the
//! payload type that implements them. Registration builds a factory closure
//! for each type, so a receiving node can rebuild a payload from its JSON text
//! without any runtime type lookup.
//!
//! The registry is filled once at start-up and only read afterwards.

use super::types::*;
use crate::error::{FarmError, FarmResult};
use crate::node::context::NodeContext;

use anyhow::Result;
use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::marker::PhantomData;
use std::sync::Arc;

/// Execution contract every cluster task payload implements.
#[async_trait]
pub trait ClusterTask: Send + Sync {
    /// Type-specific creation predicate, consulted by the creation gate when
    /// no explicit condition was supplied at registration.
    fn can_create(&self, _task: &TaskInstance) -> bool {
        true
    }

    /// Applies the task on the local node. `task` carries the target and
    /// binary data the payload was sent with.
    async fn execute(&self, task: &TaskInstance, ctx: &NodeContext) -> Result<()>;
}

/// Rebuilds a payload from its (possibly empty) JSON text.
pub type PayloadFactory =
    Arc<dyn Fn(Option<&str>) -> Result<Box<dyn ClusterTask>, serde_json::Error> + Send + Sync>;

/// Creation predicate supplied at registration.
pub type ConditionFn = Arc<dyn Fn(&TaskInstance) -> bool + Send + Sync>;

/// A registry entry: the immutable config plus the dispatch closures.
pub struct RegisteredTask {
    config: TaskTypeConfig,
    factory: PayloadFactory,
    condition: Option<ConditionFn>,
}

impl RegisteredTask {
    pub fn config(&self) -> &TaskTypeConfig {
        &self.config
    }

    pub fn condition(&self) -> Option<&ConditionFn> {
        self.condition.as_ref()
    }

    /// Reconstructs the payload: the default value for empty text, otherwise
    /// the deserialized JSON.
    pub fn instantiate(&self, text_data: Option<&str>) -> Result<Box<dyn ClusterTask>, serde_json::Error> {
        (self.factory)(text_data)
    }
}

/// Builder for a registration with optional settings.
pub struct TaskRegistration<T> {
    type_id: String,
    is_memory_task: bool,
    optimization: OptimizationKind,
    condition: Option<ConditionFn>,
    _payload: PhantomData<fn() -> T>,
}

impl<T> TaskRegistration<T>
where
    T: ClusterTask + Serialize + DeserializeOwned + Default + 'static,
{
    pub fn new(type_id: &str) -> Self {
        Self {
            type_id: type_id.to_string(),
            is_memory_task: false,
            optimization: OptimizationKind::None,
            condition: None,
            _payload: PhantomData,
        }
    }

    pub fn memory_task(mut self, is_memory_task: bool) -> Self {
        self.is_memory_task = is_memory_task;
        self
    }

    pub fn optimization(mut self, optimization: OptimizationKind) -> Self {
        self.optimization = optimization;
        self
    }

    /// Overrides the payload's own `can_create` predicate.
    pub fn condition<F>(mut self, condition: F) -> Self
    where
        F: Fn(&TaskInstance) -> bool + Send + Sync + 'static,
    {
        self.condition = Some(Arc::new(condition));
        self
    }
}

/// Registry holding every task type this process knows how to create and execute.
pub struct TaskRegistry {
    tasks: DashMap<String, Arc<RegisteredTask>>,
}

impl TaskRegistry {
    /// Creates a new, empty registry.
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Registers `T` under `type_id`.
    ///
    /// # Errors
    /// * `DuplicateRegistration` if `type_id` is already present.
    /// * `InvalidTaskType` if `T` cannot be rebuilt from its own serialized form.
    pub fn register<T>(
        &self,
        type_id: &str,
        is_memory_task: bool,
        optimization: OptimizationKind,
    ) -> FarmResult<()>
    where
        T: ClusterTask + Serialize + DeserializeOwned + Default + 'static,
    {
        self.register_with(
            TaskRegistration::<T>::new(type_id)
                .memory_task(is_memory_task)
                .optimization(optimization),
        )
    }

    /// Registers a type described by a [`TaskRegistration`] builder.
    pub fn register_with<T>(&self, registration: TaskRegistration<T>) -> FarmResult<()>
    where
        T: ClusterTask + Serialize + DeserializeOwned + Default + 'static,
    {
        let TaskRegistration {
            type_id,
            is_memory_task,
            optimization,
            condition,
            ..
        } = registration;

        validate_payload_type::<T>(&type_id)?;

        let factory: PayloadFactory = Arc::new(|text_data: Option<&str>| {
            let payload: T = match text_data {
                Some(text) if !text.trim().is_empty() => serde_json::from_str(text)?,
                _ => T::default(),
            };
            Ok(Box::new(payload) as Box<dyn ClusterTask>)
        });

        let entry = RegisteredTask {
            config: TaskTypeConfig {
                type_id: type_id.clone(),
                payload_type: std::any::type_name::<T>().to_string(),
                is_memory_task,
                optimization,
            },
            factory,
            condition,
        };

        match self.tasks.entry(type_id.clone()) {
            Entry::Occupied(_) => {
                tracing::error!("Task type '{}' registered twice", type_id);
                Err(FarmError::DuplicateRegistration(type_id))
            }
            Entry::Vacant(slot) => {
                slot.insert(Arc::new(entry));
                tracing::info!(
                    "Registered task type: {} (memory: {}, optimization: {:?})",
                    type_id,
                    is_memory_task,
                    optimization
                );
                Ok(())
            }
        }
    }

    /// Looks up a registered type.
    pub fn get(&self, type_id: &str) -> Option<Arc<RegisteredTask>> {
        self.tasks.get(type_id).map(|entry| entry.value().clone())
    }

    /// `false` for unknown types.
    pub fn is_memory_task(&self, type_id: &str) -> bool {
        self.tasks
            .get(type_id)
            .map(|entry| entry.config.is_memory_task)
            .unwrap_or(false)
    }

    /// `OptimizationKind::None` for unknown types.
    pub fn get_optimization(&self, type_id: &str) -> OptimizationKind {
        self.tasks
            .get(type_id)
            .map(|entry| entry.config.optimization)
            .unwrap_or_default()
    }

    pub fn has_type(&self, type_id: &str) -> bool {
        self.tasks.contains_key(type_id)
    }

    /// Identifiers of all memory-only task types.
    pub fn memory_task_types(&self) -> Vec<String> {
        self.tasks
            .iter()
            .filter(|entry| entry.config.is_memory_task)
            .map(|entry| entry.key().clone())
            .collect()
    }

    /// Configs of every registered type, sorted by id.
    pub fn list_types(&self) -> Vec<TaskTypeConfig> {
        let mut configs: Vec<TaskTypeConfig> = self
            .tasks
            .iter()
            .map(|entry| entry.config.clone())
            .collect();
        configs.sort_by(|a, b| a.type_id.cmp(&b.type_id));
        configs
    }

    pub fn type_count(&self) -> usize {
        self.tasks.len()
    }
}

impl Default for TaskRegistry {
    fn default() -> Self {
        Self {
            tasks: DashMap::new(),
        }
    }
}

/// A payload type is usable only if its default value serializes to a JSON
/// object (or nothing at all) and can be read back.
fn validate_payload_type<T>(type_id: &str) -> FarmResult<()>
where
    T: Serialize + DeserializeOwned + Default,
{
    let invalid = |reason: String| FarmError::InvalidTaskType {
        type_id: type_id.to_string(),
        reason,
    };

    let value = serde_json::to_value(T::default())
        .map_err(|e| invalid(format!("default payload does not serialize: {}", e)))?;

    match value {
        serde_json::Value::Object(_) | serde_json::Value::Null => {}
        other => {
            return Err(invalid(format!(
                "payload must serialize to a JSON object, got `{}`",
                other
            )));
        }
    }

    serde_json::from_value::<T>(value)
        .map_err(|e| invalid(format!("default payload does not deserialize: {}", e)))?;

    Ok(())
}
