use serde::{Deserialize, Serialize};

/// Unique identifier of a node in the web farm.
///
/// Generated once per process; used to recognise log entries a node
/// produced itself.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct NodeId(pub String);

impl NodeId {
    /// Generates a new random UUID v4-based NodeId.
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }
}

impl Default for NodeId {
    fn default() -> Self {
        Self::new()
    }
}

/// Policy applied to pending tasks of one type before they are persisted.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum OptimizationKind {
    /// Every task is persisted as created.
    #[default]
    None,
    /// Identical pending tasks (same type, target and data) are merged into one.
    GroupData,
}

/// Immutable description of a registered task type.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TaskTypeConfig {
    /// Registration key, stable across deployments.
    pub type_id: String,
    /// Rust type name of the payload reconstructed for this type.
    pub payload_type: String,
    /// The task only touches in-process caches.
    pub is_memory_task: bool,
    pub optimization: OptimizationKind,
}

/// One cluster task as it travels between nodes.
///
/// `target` is opaque to the core; each payload type owns its grammar.
/// `text_data` carries the payload's own fields serialized as JSON.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct TaskInstance {
    pub type_id: String,
    pub target: String,
    #[serde(default)]
    pub text_data: Option<String>,
    #[serde(default)]
    pub binary_data: Option<Vec<u8>>,
    #[serde(default)]
    pub file_path: Option<String>,
    #[serde(default)]
    pub is_anonymous: bool,
}

impl TaskInstance {
    pub fn new(type_id: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            type_id: type_id.into(),
            target: target.into(),
            ..Default::default()
        }
    }

    /// Serializes `payload` into `text_data` (empty payloads become `None`).
    pub fn with_payload<T: Serialize>(mut self, payload: &T) -> Result<Self, serde_json::Error> {
        let text = serialize_payload(payload)?;
        self.text_data = if text.is_empty() { None } else { Some(text) };
        Ok(self)
    }

    pub fn with_text_data(mut self, text_data: impl Into<String>) -> Self {
        self.text_data = Some(text_data.into());
        self
    }

    pub fn with_binary_data(mut self, data: Vec<u8>) -> Self {
        self.binary_data = Some(data);
        self
    }

    pub fn with_file_path(mut self, path: impl Into<String>) -> Self {
        self.file_path = Some(path.into());
        self
    }

    pub fn anonymous(mut self) -> Self {
        self.is_anonymous = true;
        self
    }

    pub fn binary_len(&self) -> usize {
        self.binary_data.as_ref().map(|data| data.len()).unwrap_or(0)
    }

    /// Text data with the empty string folded into `None`.
    pub fn text(&self) -> Option<&str> {
        self.text_data.as_deref().filter(|text| !text.is_empty())
    }
}

/// An accepted task as stored in the shared task log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    /// Monotonic position in the log.
    pub id: u64,
    /// Node that created the task.
    pub origin: NodeId,
    pub task: TaskInstance,
    /// Timestamp (ms) when the entry was appended.
    pub created_at: u64,
}

/// Serializes a payload to its wire text.
///
/// A payload with no fields (unit struct or empty object) yields an empty
/// string instead of `"{}"`.
pub fn serialize_payload<T: Serialize>(payload: &T) -> Result<String, serde_json::Error> {
    let value = serde_json::to_value(payload)?;
    match &value {
        serde_json::Value::Null => Ok(String::new()),
        serde_json::Value::Object(fields) if fields.is_empty() => Ok(String::new()),
        _ => serde_json::to_string(&value),
    }
}

/// Helper to get the current system time in milliseconds.
pub fn now_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as u64)
        .unwrap_or(0)
}
