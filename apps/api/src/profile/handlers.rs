use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::errors::AppError;
use crate::models::profile::{
    Document, DocumentBody, DocumentLibrary, DocumentRole, NewDocument, NewProject,
    NewWorkExperience, Project, Skill, WorkExperience,
};
use crate::models::resume::{NewSavedResult, SavedResult};
use crate::profile::assist::format_project;
use crate::profile::bulk::parse_project_blocks;
use crate::profile::files::{decode_base64, extension_for};
use crate::state::AppState;

// ── Projects ───────────────────────────────────────────────────────────────

/// GET /api/projects
pub async fn handle_list_projects(
    State(state): State<AppState>,
) -> Result<Json<Vec<Project>>, AppError> {
    Ok(Json(state.store.list_projects().await?))
}

/// POST /api/projects
pub async fn handle_add_project(
    State(state): State<AppState>,
    Json(req): Json<NewProject>,
) -> Result<(StatusCode, Json<Project>), AppError> {
    let project = state.store.add_project(req).await?;
    Ok((StatusCode::CREATED, Json(project)))
}

/// PUT /api/projects/:id
pub async fn handle_update_project(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<NewProject>,
) -> Result<Json<Project>, AppError> {
    let project = state.store.update_project(req.into_project(id)).await?;
    Ok(Json(project))
}

/// DELETE /api/projects/:id
pub async fn handle_delete_project(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    state.store.delete_project(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Deserialize)]
pub struct BulkProjectsRequest {
    pub text: String,
}

/// POST /api/projects/bulk
pub async fn handle_bulk_projects(
    State(state): State<AppState>,
    Json(req): Json<BulkProjectsRequest>,
) -> Result<(StatusCode, Json<Vec<Project>>), AppError> {
    let parsed = parse_project_blocks(&req.text);
    if parsed.is_empty() {
        return Err(AppError::Validation(
            "No projects found; separate projects with a blank line and start each with \"TITLE YEAR\""
                .to_string(),
        ));
    }

    let added = state.store.add_projects(parsed).await?;
    info!("Bulk-imported {} projects", added.len());
    Ok((StatusCode::CREATED, Json(added)))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormatProjectRequest {
    pub raw_text: String,
}

/// POST /api/projects/format
pub async fn handle_format_project(
    State(state): State<AppState>,
    Json(req): Json<FormatProjectRequest>,
) -> Result<Json<NewProject>, AppError> {
    if req.raw_text.trim().is_empty() {
        return Err(AppError::Validation(
            "Describe the project before formatting it".to_string(),
        ));
    }
    let existing = state.store.list_projects().await?;
    let draft = format_project(&state.generator, &req.raw_text, &existing).await?;
    Ok(Json(draft))
}

// ── Work experiences ───────────────────────────────────────────────────────

/// GET /api/work-experiences
pub async fn handle_list_work_experiences(
    State(state): State<AppState>,
) -> Result<Json<Vec<WorkExperience>>, AppError> {
    Ok(Json(state.store.list_work_experiences().await?))
}

/// POST /api/work-experiences
pub async fn handle_add_work_experience(
    State(state): State<AppState>,
    Json(req): Json<NewWorkExperience>,
) -> Result<(StatusCode, Json<WorkExperience>), AppError> {
    let experience = state.store.add_work_experience(req).await?;
    Ok((StatusCode::CREATED, Json(experience)))
}

/// PUT /api/work-experiences/:id
pub async fn handle_update_work_experience(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<NewWorkExperience>,
) -> Result<Json<WorkExperience>, AppError> {
    let experience = state
        .store
        .update_work_experience(WorkExperience {
            id,
            company: req.company,
            role: req.role,
            dates: req.dates,
            bullets: req.bullets,
        })
        .await?;
    Ok(Json(experience))
}

/// DELETE /api/work-experiences/:id
pub async fn handle_delete_work_experience(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    state.store.delete_work_experience(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ── Skills ─────────────────────────────────────────────────────────────────

#[derive(Deserialize)]
pub struct ReplaceSkillsRequest {
    pub names: Vec<String>,
}

#[derive(Deserialize)]
pub struct MergeSkillsRequest {
    /// Comma-separated names.
    pub input: String,
}

/// GET /api/skills
pub async fn handle_list_skills(
    State(state): State<AppState>,
) -> Result<Json<Vec<Skill>>, AppError> {
    Ok(Json(state.store.list_skills().await?))
}

/// PUT /api/skills
pub async fn handle_replace_skills(
    State(state): State<AppState>,
    Json(req): Json<ReplaceSkillsRequest>,
) -> Result<Json<Vec<Skill>>, AppError> {
    Ok(Json(state.store.replace_skills(req.names).await?))
}

/// POST /api/skills
pub async fn handle_merge_skills(
    State(state): State<AppState>,
    Json(req): Json<MergeSkillsRequest>,
) -> Result<Json<Vec<Skill>>, AppError> {
    Ok(Json(state.store.merge_skills(&req.input).await?))
}

/// DELETE /api/skills
pub async fn handle_clear_skills(State(state): State<AppState>) -> Result<StatusCode, AppError> {
    state.store.clear_skills().await?;
    Ok(StatusCode::NO_CONTENT)
}

// ── Documents ──────────────────────────────────────────────────────────────

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadedFile {
    /// Base64, optionally with a `data:` URL prefix.
    pub data: String,
    pub mime_type: Option<String>,
    pub file_name: Option<String>,
}

#[derive(Deserialize)]
pub struct AddDocumentRequest {
    pub role: String,
    pub name: String,
    pub content: Option<String>,
    pub file: Option<UploadedFile>,
}

#[derive(Serialize)]
pub struct DocumentText {
    pub text: String,
}

fn parse_role(role: &str) -> Result<DocumentRole, AppError> {
    DocumentRole::parse(role).ok_or_else(|| {
        AppError::Validation(format!(
            "Unknown document role '{role}'; expected resume or cover_letter"
        ))
    })
}

/// GET /api/documents
pub async fn handle_list_documents(
    State(state): State<AppState>,
) -> Result<Json<DocumentLibrary>, AppError> {
    Ok(Json(state.store.list_documents().await?))
}

/// POST /api/documents
pub async fn handle_add_document(
    State(state): State<AppState>,
    Json(req): Json<AddDocumentRequest>,
) -> Result<(StatusCode, Json<Document>), AppError> {
    let role = parse_role(&req.role)?;

    let body = match (req.file, req.content) {
        (Some(file), _) => {
            let bytes = decode_base64(&file.data)?;
            let extension = extension_for(file.file_name.as_deref(), file.mime_type.as_deref());
            let storage_ref = state.files.save(&bytes, &extension).await?;
            DocumentBody::Binary { storage_ref }
        }
        (None, Some(content)) => DocumentBody::Text { content },
        (None, None) => {
            return Err(AppError::Validation(
                "Provide the document as text content or as an uploaded file".to_string(),
            ))
        }
    };

    let stored_file = match &body {
        DocumentBody::Binary { storage_ref } => Some(storage_ref.clone()),
        DocumentBody::Text { .. } => None,
    };
    let added = state
        .store
        .add_document(NewDocument {
            role,
            name: req.name,
            body,
        })
        .await;

    match added {
        Ok(document) => Ok((StatusCode::CREATED, Json(document))),
        Err(e) => {
            if let Some(storage_ref) = stored_file {
                if let Err(cleanup) = state.files.delete(&storage_ref).await {
                    warn!("Could not remove orphaned upload {storage_ref}: {cleanup}");
                }
            }
            Err(e.into())
        }
    }
}

/// GET /api/documents/:id/text
pub async fn handle_document_text(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<DocumentText>, AppError> {
    let document = state.store.get_document(&id).await?;
    let text = match document.body {
        DocumentBody::Text { content } => content,
        DocumentBody::Binary { storage_ref } => state.files.extract_text(&storage_ref).await?,
    };
    Ok(Json(DocumentText { text }))
}

/// DELETE /api/documents/:role/:id
pub async fn handle_delete_document(
    State(state): State<AppState>,
    Path((role, id)): Path<(String, String)>,
) -> Result<StatusCode, AppError> {
    let role = parse_role(&role)?;
    let document = state.store.delete_document(role, &id).await?;
    if let DocumentBody::Binary { storage_ref } = &document.body {
        state.files.delete(storage_ref).await?;
    }
    Ok(StatusCode::NO_CONTENT)
}

// ── Results ────────────────────────────────────────────────────────────────

/// GET /api/results
pub async fn handle_list_results(
    State(state): State<AppState>,
) -> Result<Json<Vec<SavedResult>>, AppError> {
    Ok(Json(state.store.list_results().await?))
}

/// POST /api/results
pub async fn handle_add_result(
    State(state): State<AppState>,
    Json(req): Json<NewSavedResult>,
) -> Result<(StatusCode, Json<SavedResult>), AppError> {
    let result = state.store.add_result(req).await?;
    Ok((StatusCode::CREATED, Json(result)))
}

/// GET /api/results/:id
pub async fn handle_get_result(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<SavedResult>, AppError> {
    Ok(Json(state.store.get_result(&id).await?))
}

/// DELETE /api/results/:id
pub async fn handle_delete_result(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    state.store.delete_result(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}
