use axum::{
    Extension, Json, Router,
    extract::{Query, State},
    middleware::from_fn_with_state,
    response::Json as ResponseJson,
    routing::{get, post},
};
use db::models::task::{Task, TaskBoard};
use serde::Deserialize;
use services::services::extractor::{DraftTask, ExtractorError};
use services::services::task::{
    BoardRequest, CreateTaskRequest, TaskListRequest, UpdateTaskRequest,
};
use ts_rs::TS;
use utils::response::ApiResponse;

use crate::{AppState, error::ApiError, middleware::load_task_middleware};

#[derive(Debug, Deserialize, TS)]
pub struct VoiceTaskRequest {
    pub transcript: Option<String>,
}

pub async fn list_tasks(
    State(state): State<AppState>,
    Query(query): Query<TaskListRequest>,
) -> Result<ResponseJson<ApiResponse<Vec<Task>>>, ApiError> {
    let (page, pagination) = state.tasks().list(&state.db().connection, query).await?;

    Ok(ResponseJson(ApiResponse::success_with_pagination(
        page.tasks, pagination,
    )))
}

pub async fn get_board(
    State(state): State<AppState>,
    Query(query): Query<BoardRequest>,
) -> Result<ResponseJson<ApiResponse<TaskBoard>>, ApiError> {
    let (board, pagination) = state.tasks().board(&state.db().connection, query).await?;

    Ok(ResponseJson(ApiResponse::success_with_pagination(
        board, pagination,
    )))
}

pub async fn get_task(
    Extension(task): Extension<Task>,
    State(_state): State<AppState>,
) -> Result<ResponseJson<ApiResponse<Task>>, ApiError> {
    Ok(ResponseJson(ApiResponse::success(task)))
}

pub async fn create_task(
    State(state): State<AppState>,
    Json(payload): Json<CreateTaskRequest>,
) -> Result<ResponseJson<ApiResponse<Task>>, ApiError> {
    let task = state.tasks().create(&state.db().connection, payload).await?;

    tracing::debug!("Created task '{}' ({})", task.title, task.id);
    Ok(ResponseJson(ApiResponse::success(task)))
}

pub async fn update_task(
    Extension(existing_task): Extension<Task>,
    State(state): State<AppState>,
    Json(payload): Json<UpdateTaskRequest>,
) -> Result<ResponseJson<ApiResponse<Task>>, ApiError> {
    let task = state
        .tasks()
        .update(&state.db().connection, existing_task, payload)
        .await?;

    Ok(ResponseJson(ApiResponse::success(task)))
}

pub async fn delete_task(
    Extension(task): Extension<Task>,
    State(state): State<AppState>,
) -> Result<ResponseJson<ApiResponse<()>>, ApiError> {
    state.tasks().delete(&state.db().connection, task.id).await?;

    Ok(ResponseJson(ApiResponse::success(())))
}

/// Returns the structured guess for client review without persisting.
/// Extraction trouble on this path degrades to the heuristic, never to an
/// error response.
pub async fn parse_voice(
    State(state): State<AppState>,
    Json(payload): Json<VoiceTaskRequest>,
) -> Result<ResponseJson<ApiResponse<DraftTask>>, ApiError> {
    let transcript = payload.transcript.unwrap_or_default();
    let draft = match state.extractor().extract(&transcript).await {
        Ok(draft) => draft,
        Err(ExtractorError::ServiceUnreachable(err)) => {
            tracing::warn!("Extraction service unreachable, using heuristic fallback: {err}");
            state.extractor().heuristic_draft(&transcript)
        }
        Err(err) => return Err(err.into()),
    };

    Ok(ResponseJson(ApiResponse::success(draft)))
}

/// Extracts and persists in one step; here an unreachable extraction
/// service is surfaced as 503 instead of silently storing heuristic output.
pub async fn create_task_from_voice(
    State(state): State<AppState>,
    Json(payload): Json<VoiceTaskRequest>,
) -> Result<ResponseJson<ApiResponse<Task>>, ApiError> {
    let transcript = payload.transcript.unwrap_or_default();
    let draft = state.extractor().extract(&transcript).await?;
    let task = state
        .tasks()
        .create_from_draft(&state.db().connection, draft, &transcript)
        .await?;

    tracing::debug!("Created task '{}' ({}) from transcript", task.title, task.id);
    Ok(ResponseJson(ApiResponse::success(task)))
}

pub fn router(state: &AppState) -> Router<AppState> {
    let task_id_router = Router::new()
        .route("/", get(get_task).put(update_task).delete(delete_task))
        .layer(from_fn_with_state(state.clone(), load_task_middleware::<AppState>));

    let inner = Router::new()
        .route("/", get(list_tasks).post(create_task))
        .route("/board", get(get_board))
        .route("/voice", post(create_task_from_voice))
        .route("/voice/parse", post(parse_voice))
        .nest("/{task_id}", task_id_router);

    Router::new().nest("/tasks", inner)
}
