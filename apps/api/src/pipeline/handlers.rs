use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use tokio::sync::OwnedMutexGuard;
use tracing::info;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::resume::SavedResult;
use crate::pipeline::registry::Checkout;
use crate::pipeline::state::StageKind;
use crate::pipeline::{DraftEdit, OptimizationRequest, PipelineSession, RunSnapshot};
use crate::state::AppState;

/// Locks a live session for the duration of one request.
pub async fn checkout_session(
    state: &AppState,
    id: Uuid,
) -> Result<OwnedMutexGuard<PipelineSession>, AppError> {
    state.runs.checkout(id).await.map_err(|reason| match reason {
        Checkout::Missing => AppError::NotFound(format!("Optimization {id} not found")),
        Checkout::Busy => {
            AppError::Conflict(format!("Optimization {id} has a stage in progress"))
        }
    })
}

/// POST /api/optimizations
pub async fn handle_start(
    State(state): State<AppState>,
    Json(req): Json<OptimizationRequest>,
) -> Result<(StatusCode, Json<RunSnapshot>), AppError> {
    let session = state.orchestrator.prepare(req).await?;
    let id = session.id();
    let mut session = state.runs.insert(session).await;

    state.orchestrator.run(&mut session).await?;

    if !state.runs.contains(id).await {
        return Err(AppError::NotFound(format!(
            "Optimization {id} was discarded while running"
        )));
    }
    Ok((StatusCode::CREATED, Json(state.orchestrator.snapshot(&session))))
}

/// GET /api/optimizations/:id
pub async fn handle_get(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<RunSnapshot>, AppError> {
    let session = checkout_session(&state, id).await?;
    Ok(Json(state.orchestrator.snapshot(&session)))
}

/// DELETE /api/optimizations/:id
pub async fn handle_discard(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    let slot = state
        .runs
        .remove(id)
        .await
        .ok_or_else(|| AppError::NotFound(format!("Optimization {id} not found")))?;

    // A locked session is mid-stage; its result is dropped when the stage returns.
    if let Ok(mut session) = slot.try_lock() {
        session.reset()?;
    }
    info!("Run {id} discarded");
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/optimizations/:id/retry/:stage
pub async fn handle_retry(
    State(state): State<AppState>,
    Path((id, stage)): Path<(Uuid, String)>,
) -> Result<Json<RunSnapshot>, AppError> {
    let stage = StageKind::parse(&stage).ok_or_else(|| {
        AppError::Validation(format!(
            "Unknown stage '{stage}'; expected bullets, skills or cover-letter"
        ))
    })?;
    let mut session = checkout_session(&state, id).await?;

    state.orchestrator.retry(&mut session, stage).await?;

    if !state.runs.contains(id).await {
        return Err(AppError::NotFound(format!(
            "Optimization {id} was discarded while running"
        )));
    }
    Ok(Json(state.orchestrator.snapshot(&session)))
}

/// PUT /api/optimizations/:id/draft
pub async fn handle_edit_draft(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(edit): Json<DraftEdit>,
) -> Result<Json<RunSnapshot>, AppError> {
    let mut session = checkout_session(&state, id).await?;
    state.orchestrator.apply_draft(&mut session, edit)?;
    Ok(Json(state.orchestrator.snapshot(&session)))
}

/// POST /api/optimizations/:id/save
pub async fn handle_save(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<(StatusCode, Json<SavedResult>), AppError> {
    let session = checkout_session(&state, id).await?;
    let saved = state.orchestrator.save(&session).await?;
    Ok((StatusCode::CREATED, Json(saved)))
}
