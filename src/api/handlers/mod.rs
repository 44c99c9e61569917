use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde_json::json;

use super::AppState;
use crate::error::Error;
use crate::models::*;

type ApiResult<T> = Result<T, (StatusCode, String)>;

// ============================================================
// Error Handling
// ============================================================

/// Map an engine error to a response.
///
/// Caller mistakes and collaborator failures are reported as-is. Anything else
/// is logged server-side and returned as a generic message.
fn api_error(e: Error) -> (StatusCode, String) {
    let status = match &e {
        Error::InvalidProject(_) | Error::EmptyEntry => StatusCode::BAD_REQUEST,
        Error::Concurrency(_) | Error::NoPendingCommit(_) => StatusCode::CONFLICT,
        Error::Collaborator(_) => StatusCode::BAD_GATEWAY,
        Error::Format(_) => StatusCode::UNPROCESSABLE_ENTITY,
        Error::CommitFailed { .. } => {
            tracing::error!("Commit failed: {}", e);
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Snapshot was updated but not committed; retry with POST .../commit".to_string(),
            );
        }
        _ => {
            tracing::error!("Internal error: {}", e);
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error".to_string(),
            );
        }
    };

    tracing::warn!("Request failed: {}", e);
    (status, e.to_string())
}

fn project(state: &AppState, name: &str) -> ApiResult<Project> {
    Project::in_workspace(&state.workspace, name).map_err(api_error)
}

// ============================================================
// Health
// ============================================================

pub async fn health() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

// ============================================================
// Journal
// ============================================================

pub async fn start_journal(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> ApiResult<Json<serde_json::Value>> {
    let project = project(&state, &name)?;
    let generation = state
        .engine
        .start_journal(&project)
        .await
        .map_err(api_error)?;
    Ok(Json(json!({ "project": project.id, "generation": generation })))
}

pub async fn list_entries(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> ApiResult<Json<Vec<JournalEntry>>> {
    let project = project(&state, &name)?;
    state
        .engine
        .read_journal(&project)
        .map(Json)
        .map_err(api_error)
}

pub async fn append_entry(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Json(input): Json<AppendEntryInput>,
) -> ApiResult<(StatusCode, Json<JournalEntry>)> {
    let project = project(&state, &name)?;
    state
        .engine
        .append_entry(&project, EntryContent::from(input))
        .await
        .map(|entry| (StatusCode::CREATED, Json(entry)))
        .map_err(api_error)
}

// ============================================================
// Snapshot
// ============================================================

pub async fn get_snapshot(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> ApiResult<Json<Snapshot>> {
    let project = project(&state, &name)?;
    state
        .engine
        .read_snapshot(&project)
        .map(Json)
        .map_err(api_error)
}

pub async fn compact(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> ApiResult<Json<CompactionOutcome>> {
    let project = project(&state, &name)?;
    state
        .engine
        .compact(&project)
        .await
        .map(Json)
        .map_err(api_error)
}

pub async fn retry_commit(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> ApiResult<Json<serde_json::Value>> {
    let project = project(&state, &name)?;
    let commit_id = state
        .engine
        .retry_commit(&project)
        .await
        .map_err(api_error)?;
    Ok(Json(json!({ "commit_id": commit_id })))
}

pub async fn commit_status(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> ApiResult<Json<CommitStatus>> {
    let project = project(&state, &name)?;
    state
        .engine
        .commit_status(&project)
        .await
        .map(Json)
        .map_err(api_error)
}
