use super::dispatcher::TaskDispatcher;
use super::emitter::TaskEmitter;
use super::processor::{ProcessReport, TaskProcessor};
use super::protocol::*;
use super::registry::TaskRegistry;
use crate::error::FarmError;
use crate::sessions::cache::SessionCache;

use axum::{Extension, Json, extract::Path, http::StatusCode};
use std::sync::Arc;

pub async fn handle_emit_task(
    Extension(emitter): Extension<Arc<TaskEmitter>>,
    Json(req): Json<EmitTaskRequest>,
) -> (StatusCode, Json<EmitTaskResponse>) {
    let type_id = req.task.type_id.clone();

    match emitter.emit(req.task).await {
        Ok(Some(entry_id)) => {
            tracing::info!("Task {} accepted as log entry {}", type_id, entry_id);
            (
                StatusCode::OK,
                Json(EmitTaskResponse {
                    accepted: true,
                    entry_id: Some(entry_id),
                    error: None,
                }),
            )
        }
        Ok(None) => (
            StatusCode::OK,
            Json(EmitTaskResponse {
                accepted: false,
                entry_id: None,
                error: None,
            }),
        ),
        Err(e) => {
            tracing::error!("Failed to emit task {}: {}", type_id, e);
            let status = match &e {
                FarmError::UnregisteredTaskType(_) => StatusCode::BAD_REQUEST,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            };
            (
                status,
                Json(EmitTaskResponse {
                    accepted: false,
                    entry_id: None,
                    error: Some(e.to_string()),
                }),
            )
        }
    }
}

/// Buffers the task; it reaches the log on the emitter's next flush,
/// merged with identical pending tasks where the type allows it.
pub async fn handle_enqueue_task(
    Extension(emitter): Extension<Arc<TaskEmitter>>,
    Json(req): Json<EmitTaskRequest>,
) -> (StatusCode, Json<EmitTaskResponse>) {
    let type_id = req.task.type_id.clone();

    match emitter.enqueue(req.task).await {
        Ok(accepted) => (
            StatusCode::OK,
            Json(EmitTaskResponse {
                accepted,
                entry_id: None,
                error: None,
            }),
        ),
        Err(e) => {
            tracing::error!("Failed to enqueue task {}: {}", type_id, e);
            let status = match &e {
                FarmError::UnregisteredTaskType(_) => StatusCode::BAD_REQUEST,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            };
            (
                status,
                Json(EmitTaskResponse {
                    accepted: false,
                    entry_id: None,
                    error: Some(e.to_string()),
                }),
            )
        }
    }
}

pub async fn handle_execute_task(
    Extension(dispatcher): Extension<Arc<TaskDispatcher>>,
    Json(req): Json<ExecuteTaskRequest>,
) -> (StatusCode, Json<ExecuteTaskResponse>) {
    match dispatcher
        .execute(
            &req.type_id,
            &req.target,
            req.text_data.as_deref(),
            req.binary_data,
        )
        .await
    {
        Ok(applied) => (
            StatusCode::OK,
            Json(ExecuteTaskResponse {
                applied,
                error: None,
            }),
        ),
        Err(e) => {
            tracing::error!("Task {} failed: {:#}", req.type_id, e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ExecuteTaskResponse {
                    applied: false,
                    error: Some(format!("{:#}", e)),
                }),
            )
        }
    }
}

pub async fn handle_task_types(
    Extension(registry): Extension<Arc<TaskRegistry>>,
) -> Json<TaskTypesResponse> {
    Json(TaskTypesResponse {
        types: registry.list_types(),
    })
}

pub async fn handle_process_log(
    Extension(processor): Extension<Arc<TaskProcessor>>,
) -> (StatusCode, Json<ProcessLogResponse>) {
    match processor.process_pending().await {
        Ok(report) => (
            StatusCode::OK,
            Json(ProcessLogResponse {
                report,
                cursor: processor.cursor(),
                error: None,
            }),
        ),
        Err(e) => {
            tracing::error!("Failed to process task log: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ProcessLogResponse {
                    report: ProcessReport::default(),
                    cursor: processor.cursor(),
                    error: Some(e.to_string()),
                }),
            )
        }
    }
}

pub async fn handle_session_stats(
    Extension(sessions): Extension<SessionCache>,
    Path(site_name): Path<String>,
) -> Json<SessionStatsResponse> {
    Json(SessionStatsResponse {
        sessions: sessions.get_sessions_count(&site_name),
        authenticated_users: sessions.get_authenticated_users_count(&site_name),
        hidden_users: sessions.get_hidden_users_count(&site_name),
        site_name,
    })
}
