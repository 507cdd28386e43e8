//! Network Protocol Definitions
//!
//! Data Transfer Objects for the node's HTTP task endpoints.

use super::processor::ProcessReport;
use super::types::*;
use serde::{Deserialize, Serialize};

pub const ENDPOINT_EMIT_TASK: &str = "/task/emit";
pub const ENDPOINT_ENQUEUE_TASK: &str = "/task/enqueue";
pub const ENDPOINT_EXECUTE_TASK: &str = "/internal/execute_task";
pub const ENDPOINT_TASK_TYPES: &str = "/task/types";
pub const ENDPOINT_PROCESS_LOG: &str = "/internal/process_log";
pub const ENDPOINT_SESSION_STATS: &str = "/sessions/:site/stats";

#[derive(Debug, Serialize, Deserialize)]
pub struct EmitTaskRequest {
    pub task: TaskInstance,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct EmitTaskResponse {
    pub accepted: bool,
    pub entry_id: Option<u64>,
    pub error: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ExecuteTaskRequest {
    pub type_id: String,
    pub target: String,
    #[serde(default)]
    pub text_data: Option<String>,
    #[serde(default)]
    pub binary_data: Option<Vec<u8>>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ExecuteTaskResponse {
    pub applied: bool,
    pub error: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TaskTypesResponse {
    pub types: Vec<TaskTypeConfig>,
}

#[derive(Debug, Serialize)]
pub struct ProcessLogResponse {
    /// Empty when `error` is set.
    pub report: ProcessReport,
    pub cursor: u64,
    pub error: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct SessionStatsResponse {
    pub site_name: String,
    pub sessions: usize,
    pub authenticated_users: usize,
    pub hidden_users: usize,
}
