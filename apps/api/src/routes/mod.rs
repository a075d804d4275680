pub mod health;

use axum::{
    routing::{delete, get, post, put},
    Router,
};

use crate::export::handlers as export;
use crate::pipeline::handlers as pipeline;
use crate::profile::handlers as profile;
use crate::relevance::handlers as relevance;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        // Profile
        .route(
            "/api/projects",
            get(profile::handle_list_projects).post(profile::handle_add_project),
        )
        .route("/api/projects/bulk", post(profile::handle_bulk_projects))
        .route("/api/projects/format", post(profile::handle_format_project))
        .route("/api/projects/suggest", post(relevance::handle_suggest))
        .route(
            "/api/projects/:id",
            put(profile::handle_update_project).delete(profile::handle_delete_project),
        )
        .route(
            "/api/work-experiences",
            get(profile::handle_list_work_experiences).post(profile::handle_add_work_experience),
        )
        .route(
            "/api/work-experiences/:id",
            put(profile::handle_update_work_experience)
                .delete(profile::handle_delete_work_experience),
        )
        .route(
            "/api/skills",
            get(profile::handle_list_skills)
                .put(profile::handle_replace_skills)
                .post(profile::handle_merge_skills)
                .delete(profile::handle_clear_skills),
        )
        .route(
            "/api/documents",
            get(profile::handle_list_documents).post(profile::handle_add_document),
        )
        .route("/api/documents/:id/text", get(profile::handle_document_text))
        .route(
            "/api/documents/:role/:id",
            delete(profile::handle_delete_document),
        )
        // Saved results
        .route(
            "/api/results",
            get(profile::handle_list_results).post(profile::handle_add_result),
        )
        .route(
            "/api/results/:id",
            get(profile::handle_get_result).delete(profile::handle_delete_result),
        )
        .route(
            "/api/results/:id/export/markdown",
            get(export::handle_result_markdown),
        )
        .route("/api/results/:id/export/latex", get(export::handle_result_latex))
        .route(
            "/api/results/:id/export/resume-pdf",
            post(export::handle_result_resume_pdf),
        )
        .route(
            "/api/results/:id/export/cover-letter-pdf",
            post(export::handle_result_cover_letter_pdf),
        )
        .route(
            "/api/results/:id/export/resume-docx",
            get(export::handle_result_resume_docx),
        )
        .route(
            "/api/results/:id/export/cover-letter-docx",
            get(export::handle_result_cover_letter_docx),
        )
        // Optimization runs
        .route("/api/optimizations", post(pipeline::handle_start))
        .route(
            "/api/optimizations/:id",
            get(pipeline::handle_get).delete(pipeline::handle_discard),
        )
        .route(
            "/api/optimizations/:id/retry/:stage",
            post(pipeline::handle_retry),
        )
        .route(
            "/api/optimizations/:id/draft",
            put(pipeline::handle_edit_draft),
        )
        .route("/api/optimizations/:id/save", post(pipeline::handle_save))
        .route(
            "/api/optimizations/:id/export/markdown",
            get(export::handle_session_markdown),
        )
        .route(
            "/api/optimizations/:id/export/latex",
            get(export::handle_session_latex),
        )
        .route(
            "/api/optimizations/:id/export/resume-pdf",
            post(export::handle_session_resume_pdf),
        )
        .route(
            "/api/optimizations/:id/export/cover-letter-pdf",
            post(export::handle_session_cover_letter_pdf),
        )
        .route(
            "/api/optimizations/:id/export/resume-docx",
            get(export::handle_session_resume_docx),
        )
        .route(
            "/api/optimizations/:id/export/cover-letter-docx",
            get(export::handle_session_cover_letter_docx),
        )
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use axum::{
        body::Body,
        http::{header, Method, Request, StatusCode},
    };
    use base64::Engine;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use super::*;
    use crate::llm_client::testing::{RecordedCall, ScriptedBackend};
    use crate::llm_client::GenerationError;
    use crate::models::profile::{NewProject, NewWorkExperience};
    use crate::pipeline::OptimizationRequest;
    use crate::state::testing::test_state;

    const UNUSED_RENDERER: &str = "http://127.0.0.1:9";

    async fn send(
        app: &Router,
        method: Method,
        uri: &str,
        body: Option<Value>,
    ) -> (StatusCode, Vec<u8>, Option<String>) {
        let mut builder = Request::builder().method(method).uri(uri);
        let body = match body {
            Some(v) => {
                builder = builder.header(header::CONTENT_TYPE, "application/json");
                Body::from(v.to_string())
            }
            None => Body::empty(),
        };
        let response = app
            .clone()
            .oneshot(builder.body(body).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .map(|v| v.to_str().unwrap().to_string());
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, bytes.to_vec(), content_type)
    }

    async fn send_json(
        app: &Router,
        method: Method,
        uri: &str,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let (status, bytes, _) = send(app, method, uri, body).await;
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    /// Bullets echo the input sections; later stages return fixed output.
    fn scripted(call: &RecordedCall) -> Result<String, GenerationError> {
        match call.label.as_str() {
            "bullets" => {
                let between = |start: &str, end: &str| -> Value {
                    let from = call.text.find(start).unwrap() + start.len();
                    let to = from + call.text[from..].find(end).unwrap();
                    serde_json::from_str(&call.text[from..to]).unwrap()
                };
                let work = between("## Work Experience (JSON)\n", "\n\n## Selected Projects");
                let projects = between("## Selected Projects (JSON)\n", "\n\nReturn");
                Ok(json!({ "workExperience": work, "projects": projects }).to_string())
            }
            "skills" => Ok(json!([
                { "title": "Languages", "items": "Go, SQL" },
                { "title": "Data", "items": "Postgres" },
                { "title": "Practices", "items": "Code review" }
            ])
            .to_string()),
            "cover_letter" => Ok("Dear Acme team,\n\nI build Go services.".to_string()),
            "suggest_projects" => Ok(r#"["proj-missing"]"#.to_string()),
            other => Err(GenerationError::SchemaViolation(format!("unexpected {other}"))),
        }
    }

    async fn seeded_app() -> (Router, crate::state::AppState, tempfile::TempDir, Vec<String>) {
        let (state, dir) = test_state(ScriptedBackend::new(scripted), UNUSED_RENDERER).await;
        state
            .store
            .add_work_experience(NewWorkExperience {
                company: "Initech".to_string(),
                role: "Software Engineer".to_string(),
                dates: "2021 - 2024".to_string(),
                bullets: vec!["Built Go services".to_string(), "Ran Postgres".to_string()],
            })
            .await
            .unwrap();
        let mut project_ids = Vec::new();
        for title in ["LEDGER", "SCHEDULER"] {
            let project = state
                .store
                .add_project(NewProject {
                    title: title.to_string(),
                    year: 2024,
                    subtitle: "Backend".to_string(),
                    description: vec![format!("{title} bullet")],
                })
                .await
                .unwrap();
            project_ids.push(project.id);
        }
        state
            .store
            .replace_skills(vec!["Go".to_string(), "Postgres".to_string()])
            .await
            .unwrap();
        (build_router(state.clone()), state, dir, project_ids)
    }

    fn start_body(project_ids: &[String]) -> Value {
        json!({
            "jobTitle": "Backend Engineer",
            "companyName": "Acme",
            "jobPosting": "Looking for a Go developer with Postgres experience",
            "selectedProjectIds": project_ids,
        })
    }

    #[tokio::test]
    async fn test_health_reports_active_runs() {
        let (app, _, _dir, _) = seeded_app().await;
        let (status, body) = send_json(&app, Method::GET, "/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["service"], "tailor-api");
        assert_eq!(body["activeRuns"], 0);
    }

    #[tokio::test]
    async fn test_project_crud() {
        let (app, _, _dir, _) = seeded_app().await;
        let (status, created) = send_json(
            &app,
            Method::POST,
            "/api/projects",
            Some(json!({ "title": "PARSER", "year": 2025, "description": ["Wrote it"] })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        let id = created["id"].as_str().unwrap().to_string();

        let (status, updated) = send_json(
            &app,
            Method::PUT,
            &format!("/api/projects/{id}"),
            Some(json!({ "title": "PARSER v2", "year": 2025 })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(updated["title"], "PARSER v2");

        let (status, _) = send_json(&app, Method::DELETE, &format!("/api/projects/{id}"), None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);

        let (status, body) = send_json(
            &app,
            Method::PUT,
            &format!("/api/projects/{id}"),
            Some(json!({ "title": "GONE", "year": 2025 })),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"]["code"], "NOT_FOUND");
    }

    #[tokio::test]
    async fn test_bulk_import_and_skill_merge() {
        let (app, _, _dir, _) = seeded_app().await;
        let (status, added) = send_json(
            &app,
            Method::POST,
            "/api/projects/bulk",
            Some(json!({ "text": "CACHE 2023\nIn-memory store\n- Wrote LRU\n\nQUEUE 2022\n- Built it" })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(added.as_array().unwrap().len(), 2);

        let (status, skills) = send_json(
            &app,
            Method::POST,
            "/api/skills",
            Some(json!({ "input": "go, Docker, , Kubernetes" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let names: Vec<&str> = skills
            .as_array()
            .unwrap()
            .iter()
            .map(|s| s["name"].as_str().unwrap())
            .collect();
        assert_eq!(names, vec!["Go", "Postgres", "Docker", "Kubernetes"]);
    }

    #[tokio::test]
    async fn test_document_upload_and_text() {
        let (app, state, _dir, _) = seeded_app().await;
        let data = base64::engine::general_purpose::STANDARD.encode("Dear hiring manager");
        let (status, doc) = send_json(
            &app,
            Method::POST,
            "/api/documents",
            Some(json!({
                "role": "cover_letter",
                "name": "Old letter",
                "file": { "data": data, "mimeType": "text/plain", "fileName": "letter.txt" }
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(doc["body"]["kind"], "binary");
        let storage_ref = doc["body"]["storageRef"].as_str().unwrap().to_string();
        assert!(storage_ref.starts_with("/uploads/"));

        let id = doc["id"].as_str().unwrap();
        let (status, text) =
            send_json(&app, Method::GET, &format!("/api/documents/{id}/text"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(text["text"], "Dear hiring manager");

        let (status, _) =
            send_json(&app, Method::DELETE, &format!("/api/documents/resume/{id}"), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let (status, _) = send_json(
            &app,
            Method::DELETE,
            &format!("/api/documents/cover_letter/{id}"),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        assert!(!state.files.resolve(&storage_ref).unwrap().exists());
    }

    #[tokio::test]
    async fn test_suggest_with_no_usable_ids_returns_message() {
        let (app, _, _dir, _) = seeded_app().await;
        let (status, body) = send_json(
            &app,
            Method::POST,
            "/api/projects/suggest",
            Some(json!({ "jobPosting": "Go developer" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["projectIds"], json!([]));
        assert_eq!(body["discardedIds"], json!(["proj-missing"]));
        assert!(body["message"].is_string());
    }

    #[tokio::test]
    async fn test_start_rejects_missing_posting() {
        let (app, _, _dir, _) = seeded_app().await;
        let (status, body) = send_json(
            &app,
            Method::POST,
            "/api/optimizations",
            Some(json!({ "jobTitle": "Engineer", "companyName": "Acme" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn test_start_without_company_is_a_validation_error() {
        let (app, _, _dir, _) = seeded_app().await;
        let (status, body, content_type) = send(
            &app,
            Method::POST,
            "/api/optimizations",
            Some(json!({ "jobTitle": "Engineer", "jobPosting": "Go developer" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(content_type.unwrap().starts_with("application/json"));
        let body: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
        assert_eq!(body["error"]["message"], "Company name is required");
    }

    #[tokio::test]
    async fn test_suggest_without_posting_is_a_validation_error() {
        let (app, _, _dir, _) = seeded_app().await;
        let (status, body) =
            send_json(&app, Method::POST, "/api/projects/suggest", Some(json!({}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn test_run_export_and_save() {
        let (app, _, _dir, project_ids) = seeded_app().await;
        let (status, run) = send_json(
            &app,
            Method::POST,
            "/api/optimizations",
            Some(start_body(&project_ids)),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(run["stage"], "complete");
        assert_eq!(run["resume"]["workExperience"][0]["company"], "Initech");
        assert_eq!(run["resume"]["projects"].as_array().unwrap().len(), 2);
        assert_eq!(run["stageErrors"], json!({}));
        let id = run["id"].as_str().unwrap().to_string();

        let (status, bytes, content_type) = send(
            &app,
            Method::GET,
            &format!("/api/optimizations/{id}/export/markdown"),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert!(content_type.unwrap().starts_with("text/markdown"));
        let md = String::from_utf8(bytes).unwrap();
        assert!(md.contains("### Initech - 2021 - 2024"));

        let (status, saved) =
            send_json(&app, Method::POST, &format!("/api/optimizations/{id}/save"), None).await;
        assert_eq!(status, StatusCode::CREATED);
        let result_id = saved["id"].as_str().unwrap();

        let (status, results) = send_json(&app, Method::GET, "/api/results", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(results.as_array().unwrap().len(), 1);

        let (status, bytes, _) = send(
            &app,
            Method::GET,
            &format!("/api/results/{result_id}/export/latex"),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert!(String::from_utf8(bytes).unwrap().contains(r"\section*{Work Experience}"));
    }

    #[tokio::test]
    async fn test_retry_and_draft_edit() {
        let (app, _, _dir, project_ids) = seeded_app().await;
        let (_, run) = send_json(
            &app,
            Method::POST,
            "/api/optimizations",
            Some(start_body(&project_ids)),
        )
        .await;
        let id = run["id"].as_str().unwrap().to_string();

        let (status, body) = send_json(
            &app,
            Method::POST,
            &format!("/api/optimizations/{id}/retry/summary"),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "VALIDATION_ERROR");

        let (status, retried) = send_json(
            &app,
            Method::POST,
            &format!("/api/optimizations/{id}/retry/skills"),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(retried["stage"], "complete");
        assert_eq!(retried["resume"]["workExperience"], run["resume"]["workExperience"]);

        let (status, edited) = send_json(
            &app,
            Method::PUT,
            &format!("/api/optimizations/{id}/draft"),
            Some(json!({ "summary": "Hand-written summary" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(edited["resume"]["summary"], "Hand-written summary");
    }

    #[tokio::test]
    async fn test_busy_session_conflicts_and_discard() {
        let (app, state, _dir, project_ids) = seeded_app().await;
        let session = state
            .orchestrator
            .prepare(OptimizationRequest {
                job_title: "Backend Engineer".to_string(),
                company_name: "Acme".to_string(),
                job_posting: "Go".to_string(),
                selected_project_ids: project_ids,
                ..Default::default()
            })
            .await
            .unwrap();
        let id = session.id();
        let guard = state.runs.insert(session).await;

        let (status, body) =
            send_json(&app, Method::GET, &format!("/api/optimizations/{id}"), None).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error"]["code"], "CONFLICT");

        let (status, _) =
            send_json(&app, Method::DELETE, &format!("/api/optimizations/{id}"), None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        drop(guard);

        let (status, _) =
            send_json(&app, Method::GET, &format!("/api/optimizations/{id}"), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    async fn download(app: &Router, uri: &str) -> (StatusCode, Option<String>, Vec<u8>) {
        let response = app
            .clone()
            .oneshot(Request::get(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let disposition = response
            .headers()
            .get(header::CONTENT_DISPOSITION)
            .map(|v| v.to_str().unwrap().to_string());
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, disposition, bytes.to_vec())
    }

    #[tokio::test]
    async fn test_docx_exports_for_runs_and_saved_results() {
        let (app, _, _dir, project_ids) = seeded_app().await;
        let (_, run) = send_json(
            &app,
            Method::POST,
            "/api/optimizations",
            Some(start_body(&project_ids)),
        )
        .await;
        let id = run["id"].as_str().unwrap().to_string();

        let (status, disposition, bytes) =
            download(&app, &format!("/api/optimizations/{id}/export/resume-docx")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            disposition.unwrap(),
            "attachment; filename=\"Acme-Resume.docx\""
        );
        assert_eq!(&bytes[..2], b"PK");

        let (_, saved) =
            send_json(&app, Method::POST, &format!("/api/optimizations/{id}/save"), None).await;
        let result_id = saved["id"].as_str().unwrap();

        let (status, disposition, bytes) = download(
            &app,
            &format!("/api/results/{result_id}/export/cover-letter-docx"),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            disposition.unwrap(),
            "attachment; filename=\"Acme-Cover-Letter.docx\""
        );
        assert_eq!(&bytes[..2], b"PK");

        let (status, _, _) = download(&app, "/api/results/res-missing/export/resume-docx").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
