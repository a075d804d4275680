use axum::{
    extract::{Path, State},
    http::header,
    response::{IntoResponse, Response},
};
use bytes::Bytes;
use chrono::Utc;
use uuid::Uuid;

use crate::errors::AppError;
use crate::export::docx::{render_docx, DOCX};
use crate::export::latex::render_latex;
use crate::export::markdown::render_markdown;
use crate::export::render::attachment_name;
use crate::models::resume::ResumeStructure;
use crate::pipeline::handlers::checkout_session;
use crate::state::AppState;

const MARKDOWN: &str = "text/markdown; charset=utf-8";
const LATEX: &str = "application/x-latex; charset=utf-8";

/// The resume and letter an export works from, detached from any lock.
struct ExportSource {
    company_name: String,
    resume: ResumeStructure,
    cover_letter: String,
}

async fn from_session(state: &AppState, id: Uuid) -> Result<ExportSource, AppError> {
    let session = checkout_session(state, id).await?;
    Ok(ExportSource {
        company_name: session.company_name().to_string(),
        resume: state.orchestrator.resume(&session),
        cover_letter: session.cover_letter().to_string(),
    })
}

async fn from_result(state: &AppState, id: &str) -> Result<ExportSource, AppError> {
    let result = state.store.get_result(id).await?;
    Ok(ExportSource {
        company_name: result.company_name,
        resume: result.resume,
        cover_letter: result.cover_letter,
    })
}

fn text_document(content_type: &'static str, body: String) -> Response {
    ([(header::CONTENT_TYPE, content_type)], body).into_response()
}

fn attachment(content_type: &'static str, filename: String, body: Bytes) -> Response {
    let disposition = format!("attachment; filename=\"{filename}\"");
    (
        [
            (header::CONTENT_TYPE, content_type.to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        body,
    )
        .into_response()
}

fn markdown(state: &AppState, source: &ExportSource) -> Response {
    let name = &state.orchestrator.static_profile().name;
    text_document(MARKDOWN, render_markdown(name, &source.resume))
}

fn latex(state: &AppState, source: &ExportSource) -> Response {
    let name = &state.orchestrator.static_profile().name;
    text_document(LATEX, render_latex(name, &source.resume))
}

async fn resume_pdf(state: &AppState, source: ExportSource) -> Result<Response, AppError> {
    if let Some(section) = source.resume.missing_section() {
        return Err(AppError::Validation(format!(
            "Cannot render: the {section} section is empty"
        )));
    }
    let pdf = state.renderer.render_resume(&source.resume).await?;
    Ok(attachment(
        "application/pdf",
        attachment_name(&source.company_name, "Resume", "pdf"),
        pdf,
    ))
}

fn require_cover_letter(source: &ExportSource) -> Result<(), AppError> {
    if source.cover_letter.trim().is_empty() {
        return Err(AppError::Validation(
            "Cannot render: the cover letter is empty".to_string(),
        ));
    }
    Ok(())
}

async fn cover_letter_pdf(
    state: &AppState,
    source: ExportSource,
) -> Result<Response, AppError> {
    require_cover_letter(&source)?;
    let pdf = state
        .renderer
        .render_cover_letter(
            &source.company_name,
            &source.cover_letter,
            Utc::now().date_naive(),
        )
        .await?;
    Ok(attachment(
        "application/pdf",
        attachment_name(&source.company_name, "Cover-Letter", "pdf"),
        pdf,
    ))
}

fn resume_docx(state: &AppState, source: &ExportSource) -> Result<Response, AppError> {
    let name = &state.orchestrator.static_profile().name;
    let docx = render_docx(&render_markdown(name, &source.resume))?;
    Ok(attachment(
        DOCX,
        attachment_name(&source.company_name, "Resume", "docx"),
        docx.into(),
    ))
}

fn cover_letter_docx(source: &ExportSource) -> Result<Response, AppError> {
    require_cover_letter(source)?;
    let docx = render_docx(&source.cover_letter)?;
    Ok(attachment(
        DOCX,
        attachment_name(&source.company_name, "Cover-Letter", "docx"),
        docx.into(),
    ))
}

/// GET /api/optimizations/:id/export/markdown
pub async fn handle_session_markdown(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Response, AppError> {
    let source = from_session(&state, id).await?;
    Ok(markdown(&state, &source))
}

/// GET /api/optimizations/:id/export/latex
pub async fn handle_session_latex(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Response, AppError> {
    let source = from_session(&state, id).await?;
    Ok(latex(&state, &source))
}

/// POST /api/optimizations/:id/export/resume-pdf
pub async fn handle_session_resume_pdf(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Response, AppError> {
    let source = from_session(&state, id).await?;
    resume_pdf(&state, source).await
}

/// POST /api/optimizations/:id/export/cover-letter-pdf
pub async fn handle_session_cover_letter_pdf(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Response, AppError> {
    let source = from_session(&state, id).await?;
    cover_letter_pdf(&state, source).await
}

/// GET /api/results/:id/export/markdown
pub async fn handle_result_markdown(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Response, AppError> {
    let source = from_result(&state, &id).await?;
    Ok(markdown(&state, &source))
}

/// GET /api/results/:id/export/latex
pub async fn handle_result_latex(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Response, AppError> {
    let source = from_result(&state, &id).await?;
    Ok(latex(&state, &source))
}

/// POST /api/results/:id/export/resume-pdf
pub async fn handle_result_resume_pdf(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Response, AppError> {
    let source = from_result(&state, &id).await?;
    resume_pdf(&state, source).await
}

/// POST /api/results/:id/export/cover-letter-pdf
pub async fn handle_result_cover_letter_pdf(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Response, AppError> {
    let source = from_result(&state, &id).await?;
    cover_letter_pdf(&state, source).await
}

/// GET /api/optimizations/:id/export/resume-docx
pub async fn handle_session_resume_docx(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Response, AppError> {
    let source = from_session(&state, id).await?;
    resume_docx(&state, &source)
}

/// GET /api/optimizations/:id/export/cover-letter-docx
pub async fn handle_session_cover_letter_docx(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Response, AppError> {
    let source = from_session(&state, id).await?;
    cover_letter_docx(&source)
}

/// GET /api/results/:id/export/resume-docx
pub async fn handle_result_resume_docx(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Response, AppError> {
    let source = from_result(&state, &id).await?;
    resume_docx(&state, &source)
}

/// GET /api/results/:id/export/cover-letter-docx
pub async fn handle_result_cover_letter_docx(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Response, AppError> {
    let source = from_result(&state, &id).await?;
    cover_letter_docx(&source)
}
