use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};

use crate::errors::AppError;
use crate::relevance::{suggest_projects, ProjectSuggestions};
use crate::state::AppState;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SuggestRequest {
    #[serde(default)]
    pub job_posting: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SuggestResponse {
    #[serde(flatten)]
    pub suggestions: ProjectSuggestions,
    /// Set when nothing usable came back; the user picks manually.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// POST /api/projects/suggest
pub async fn handle_suggest(
    State(state): State<AppState>,
    Json(req): Json<SuggestRequest>,
) -> Result<Json<SuggestResponse>, AppError> {
    let projects = state.store.list_projects().await?;
    let suggestions = suggest_projects(&state.generator, &req.job_posting, &projects).await?;
    let message = suggestions.project_ids.is_empty().then(|| {
        "No relevant projects could be suggested. Please select them manually.".to_string()
    });
    Ok(Json(SuggestResponse {
        suggestions,
        message,
    }))
}
