//! Client for the external PDF rendering service.

use std::time::Duration;

use bytes::Bytes;
use chrono::NaiveDate;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, error};

use crate::models::profile::WorkExperience;
use crate::models::resume::{ProjectEntry, ResumeStructure, SkillCategory};

const RENDER_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("PDF renderer is unreachable: {0}")]
    Transport(String),

    #[error("PDF renderer returned {status}: {message}")]
    Status { status: u16, message: String },
}

impl From<reqwest::Error> for RenderError {
    fn from(e: reqwest::Error) -> Self {
        RenderError::Transport(e.to_string())
    }
}

/// Body of `POST /generate`.
#[derive(Debug, Serialize)]
pub struct ResumePayload<'a> {
    pub summary: &'a str,
    pub work_experience: &'a [WorkExperience],
    pub projects: &'a [ProjectEntry],
    pub skills: &'a [SkillCategory],
}

impl<'a> From<&'a ResumeStructure> for ResumePayload<'a> {
    fn from(resume: &'a ResumeStructure) -> Self {
        Self {
            summary: &resume.summary,
            work_experience: &resume.work_experience,
            projects: &resume.projects,
            skills: &resume.skills,
        }
    }
}

/// Body of `POST /generate-cover-letter`.
#[derive(Debug, Serialize)]
pub struct CoverLetterPayload<'a> {
    pub date: String,
    pub company_name: &'a str,
    pub body: &'a str,
}

/// "October 18, 2026"
pub fn format_letter_date(date: NaiveDate) -> String {
    date.format("%B %-d, %Y").to_string()
}

/// `Acme Corp` + `Resume` + `pdf` → `Acme Corp-Resume.pdf`, with characters
/// that are unsafe in a Content-Disposition filename dropped.
pub fn attachment_name(company: &str, document: &str, extension: &str) -> String {
    let company: String = company
        .chars()
        .filter(|c| !c.is_control() && !matches!(c, '"' | '\\' | '/' | ':' | ';'))
        .collect();
    let company = company.trim();
    let company = if company.is_empty() { "Application" } else { company };
    format!("{company}-{document}.{extension}")
}

#[derive(Clone)]
pub struct RenderClient {
    http: reqwest::Client,
    base_url: String,
}

impl RenderClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self, RenderError> {
        let http = reqwest::Client::builder().timeout(RENDER_TIMEOUT).build()?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub async fn render_resume(&self, resume: &ResumeStructure) -> Result<Bytes, RenderError> {
        self.post("generate", &ResumePayload::from(resume)).await
    }

    pub async fn render_cover_letter(
        &self,
        company_name: &str,
        body: &str,
        date: NaiveDate,
    ) -> Result<Bytes, RenderError> {
        let payload = CoverLetterPayload {
            date: format_letter_date(date),
            company_name,
            body,
        };
        self.post("generate-cover-letter", &payload).await
    }

    async fn post<T: Serialize + ?Sized>(&self, path: &str, body: &T) -> Result<Bytes, RenderError> {
        let url = format!("{}/{path}", self.base_url);
        debug!("Rendering PDF via {url}");

        let response = self.http.post(&url).json(body).send().await?;
        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            error!("PDF renderer {url} returned {status}: {message}");
            return Err(RenderError::Status {
                status: status.as_u16(),
                message,
            });
        }
        Ok(response.bytes().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::resume::StaticProfile;
    use axum::{http::StatusCode, routing::post, Json, Router};
    use serde_json::Value;

    fn resume() -> ResumeStructure {
        let profile = StaticProfile::default();
        ResumeStructure {
            summary: "Engineer".to_string(),
            education: profile.education,
            work_experience: vec![],
            projects: vec![],
            skills: vec![SkillCategory {
                title: "Languages".to_string(),
                items: "Go".to_string(),
            }],
            links: profile.links,
        }
    }

    async fn fake_renderer() -> String {
        async fn generate(Json(body): Json<Value>) -> Result<Vec<u8>, StatusCode> {
            let keys: Vec<&str> = body
                .as_object()
                .map(|o| o.keys().map(String::as_str).collect())
                .unwrap_or_default();
            if keys == ["projects", "skills", "summary", "work_experience"] {
                Ok(b"%PDF-resume".to_vec())
            } else {
                Err(StatusCode::BAD_REQUEST)
            }
        }
        async fn cover(Json(body): Json<Value>) -> Vec<u8> {
            format!("%PDF-{}-{}", body["company_name"], body["date"]).into_bytes()
        }

        let app = Router::new()
            .route("/generate", post(generate))
            .route("/generate-cover-letter", post(cover))
            .route("/broken", post(|| async { StatusCode::INTERNAL_SERVER_ERROR }));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });
        format!("http://{addr}/")
    }

    #[test]
    fn test_letter_date_format() {
        let date = NaiveDate::from_ymd_opt(2026, 10, 8).unwrap();
        assert_eq!(format_letter_date(date), "October 8, 2026");
    }

    #[test]
    fn test_attachment_name_strips_unsafe_characters() {
        assert_eq!(attachment_name("Acme Corp", "Resume", "pdf"), "Acme Corp-Resume.pdf");
        assert_eq!(
            attachment_name("A/B \"C\"", "Cover-Letter", "docx"),
            "AB C-Cover-Letter.docx"
        );
        assert_eq!(attachment_name("  ", "Resume", "pdf"), "Application-Resume.pdf");
    }

    #[test]
    fn test_resume_payload_uses_snake_case_keys() {
        let r = resume();
        let json = serde_json::to_value(ResumePayload::from(&r)).unwrap();
        assert!(json.get("work_experience").is_some());
        assert!(json.get("links").is_none());
    }

    #[tokio::test]
    async fn test_renders_against_service() {
        let client = RenderClient::new(fake_renderer().await).unwrap();

        let pdf = client.render_resume(&resume()).await.unwrap();
        assert_eq!(&pdf[..], b"%PDF-resume");

        let date = NaiveDate::from_ymd_opt(2026, 10, 18).unwrap();
        let pdf = client.render_cover_letter("Acme", "Dear Acme", date).await.unwrap();
        assert_eq!(&pdf[..], br#"%PDF-"Acme"-"October 18, 2026""#);
    }

    #[tokio::test]
    async fn test_error_status_is_reported() {
        let client = RenderClient::new(fake_renderer().await).unwrap();
        let err = client.post("broken", &serde_json::json!({})).await.unwrap_err();
        assert!(matches!(err, RenderError::Status { status: 500, .. }));
    }
}
