//! Error Types
//!
//! Configuration mistakes (duplicate or missing registrations, malformed payload
//! types) and transient data problems are reported through [`FarmError`].
//! Business failures raised by a task's own logic stay as `anyhow::Error` so the
//! caller decides what to do with them.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum FarmError {
    #[error("Task type '{0}' is already registered")]
    DuplicateRegistration(String),

    #[error("Task type '{type_id}' has an invalid payload type: {reason}")]
    InvalidTaskType { type_id: String, reason: String },

    #[error("Task type '{0}' is not registered")]
    UnregisteredTaskType(String),

    #[error("Invalid payload JSON for task type '{type_id}': {source}")]
    Payload {
        type_id: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid task target '{target}': {reason}")]
    InvalidTarget { target: String, reason: String },

    #[error("Worker queue '{0}' is stopped")]
    QueueStopped(&'static str),

    #[error("Task log error: {0}")]
    Log(String),
}

pub type FarmResult<T> = std::result::Result<T, FarmError>;
