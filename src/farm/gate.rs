//! Task Creation Gate
//!
//! Decides whether a candidate task is worth persisting at all. Checks run in a
//! fixed order: registration, binary size, shared storage, global switches and
//! finally the type-specific condition.

use super::registry::TaskRegistry;
use super::types::*;
use crate::error::{FarmError, FarmResult};

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

/// Runtime switches that enable or disable task creation on this node.
///
/// Read on every creation attempt, flipped rarely (configuration changes,
/// shutdown).
pub struct TaskSwitches {
    allow_tasks: AtomicBool,
    allow_anonymous_tasks: AtomicBool,
    /// Timestamp (ms) when `allow_tasks` was last switched off, 0 if never.
    disabled_at: AtomicU64,
    grace: Duration,
}

impl TaskSwitches {
    pub fn new(allow_tasks: bool, allow_anonymous_tasks: bool, grace: Duration) -> Arc<Self> {
        Arc::new(Self {
            allow_tasks: AtomicBool::new(allow_tasks),
            allow_anonymous_tasks: AtomicBool::new(allow_anonymous_tasks),
            disabled_at: AtomicU64::new(0),
            grace,
        })
    }

    pub fn set_allow_tasks(&self, allow: bool) {
        let was_allowed = self.allow_tasks.swap(allow, Ordering::SeqCst);
        if was_allowed && !allow {
            self.disabled_at.store(now_ms(), Ordering::SeqCst);
            tracing::info!("Task creation disabled ({} ms grace)", self.grace.as_millis());
        } else if !was_allowed && allow {
            tracing::info!("Task creation enabled");
        }
    }

    pub fn set_allow_anonymous_tasks(&self, allow: bool) {
        self.allow_anonymous_tasks.store(allow, Ordering::SeqCst);
    }

    /// Switches task creation off; tasks already being created still pass
    /// during the grace window.
    pub fn begin_shutdown(&self) {
        self.set_allow_tasks(false);
    }

    pub fn tasks_allowed(&self) -> bool {
        if self.allow_tasks.load(Ordering::SeqCst) {
            return true;
        }
        let disabled_at = self.disabled_at.load(Ordering::SeqCst);
        disabled_at != 0 && now_ms() < disabled_at + self.grace.as_millis() as u64
    }

    pub fn anonymous_tasks_allowed(&self) -> bool {
        self.allow_anonymous_tasks.load(Ordering::SeqCst)
    }
}

/// Why a task was turned away. Only used for logging.
#[derive(Debug, Clone, PartialEq)]
pub enum Rejection {
    BinaryTooLarge { size: usize, max: usize },
    SharedStorage(String),
    AnonymousDisabled,
    TasksDisabled,
    ConditionFailed,
}

pub struct CreationGate {
    registry: Arc<TaskRegistry>,
    switches: Arc<TaskSwitches>,
    max_binary_size: usize,
    shared_storage_roots: Vec<PathBuf>,
}

impl CreationGate {
    pub fn new(
        registry: Arc<TaskRegistry>,
        switches: Arc<TaskSwitches>,
        max_binary_size: usize,
        shared_storage_roots: Vec<PathBuf>,
    ) -> Arc<Self> {
        Arc::new(Self {
            registry,
            switches,
            max_binary_size,
            shared_storage_roots,
        })
    }

    pub fn switches(&self) -> &Arc<TaskSwitches> {
        &self.switches
    }

    pub fn max_binary_size(&self) -> usize {
        self.max_binary_size
    }

    /// Returns whether `task` should be created.
    ///
    /// # Errors
    /// `UnregisteredTaskType` when the type was never registered; that is a
    /// start-up wiring mistake and is not turned into `false`.
    pub fn can_create(&self, task: &TaskInstance) -> FarmResult<bool> {
        match self.check(task)? {
            None => Ok(true),
            Some(rejection) => {
                tracing::debug!(
                    "Task {} (target '{}') not created: {:?}",
                    task.type_id,
                    task.target,
                    rejection
                );
                Ok(false)
            }
        }
    }

    fn check(&self, task: &TaskInstance) -> FarmResult<Option<Rejection>> {
        let registered = self
            .registry
            .get(&task.type_id)
            .ok_or_else(|| FarmError::UnregisteredTaskType(task.type_id.clone()))?;

        let size = task.binary_len();
        if size > self.max_binary_size {
            return Ok(Some(Rejection::BinaryTooLarge {
                size,
                max: self.max_binary_size,
            }));
        }

        if let Some(path) = &task.file_path {
            if self.is_shared_storage(Path::new(path)) {
                return Ok(Some(Rejection::SharedStorage(path.clone())));
            }
        }

        if task.is_anonymous {
            if !self.switches.anonymous_tasks_allowed() {
                return Ok(Some(Rejection::AnonymousDisabled));
            }
        } else if !self.switches.tasks_allowed() {
            return Ok(Some(Rejection::TasksDisabled));
        }

        let allowed = match registered.condition() {
            Some(condition) => condition(task),
            None => match registered.instantiate(task.text()) {
                Ok(payload) => payload.can_create(task),
                Err(e) => {
                    tracing::warn!(
                        "Cannot evaluate condition of task {} (target '{}', {} bytes of text data): \
                         payload deserialization failed at line {} column {}: {}",
                        task.type_id,
                        task.target,
                        task.text().map(str::len).unwrap_or(0),
                        e.line(),
                        e.column(),
                        e
                    );
                    false
                }
            },
        };

        Ok(if allowed {
            None
        } else {
            Some(Rejection::ConditionFailed)
        })
    }

    fn is_shared_storage(&self, path: &Path) -> bool {
        self.shared_storage_roots
            .iter()
            .any(|root| path.starts_with(root))
    }
}
