//! Project Relevance Selector. Ranks the user's projects against a job
//! posting and returns the most relevant identifiers, most relevant first.
//!
//! Independent of the pipeline: it shares no run state and may be called
//! while a run is in flight.

use std::collections::HashSet;

use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};

use crate::errors::AppError;
use crate::llm_client::prompts::{format_projects, JSON_ONLY_INSTRUCTION};
use crate::llm_client::{GenerationClient, GenerationError, Prompt, Schema};
use crate::models::profile::Project;
use crate::relevance::prompts::{SUGGEST_PROJECTS_PROMPT_TEMPLATE, SUGGEST_PROJECTS_SYSTEM};

pub mod handlers;
mod prompts;

pub const MAX_SUGGESTIONS: usize = 5;

#[derive(Debug, Error)]
pub enum SelectorError {
    #[error("{0}")]
    Validation(String),

    #[error(transparent)]
    Generation(#[from] GenerationError),
}

impl From<SelectorError> for AppError {
    fn from(e: SelectorError) -> Self {
        match e {
            SelectorError::Validation(msg) => AppError::Validation(msg),
            SelectorError::Generation(e) => AppError::Generation(e),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectSuggestions {
    /// Known project ids, most relevant first. May be empty.
    pub project_ids: Vec<String>,
    /// Ids the model returned that were unknown or repeated.
    pub discarded_ids: Vec<String>,
}

fn render_candidates(projects: &[Project]) -> String {
    projects
        .iter()
        .map(|p| format!("ID: {}\n{}", p.id, format_projects(std::slice::from_ref(p))))
        .collect::<Vec<_>>()
        .join("\n---\n")
}

/// Keeps the first occurrence of each known id, in model order, up to the cap.
fn filter_suggestions(returned: Vec<String>, projects: &[Project]) -> ProjectSuggestions {
    let known: HashSet<&str> = projects.iter().map(|p| p.id.as_str()).collect();
    let mut seen = HashSet::new();
    let mut suggestions = ProjectSuggestions::default();

    for id in returned {
        let id = id.trim().to_string();
        if known.contains(id.as_str()) && seen.insert(id.clone()) {
            if suggestions.project_ids.len() < MAX_SUGGESTIONS {
                suggestions.project_ids.push(id);
            }
        } else {
            suggestions.discarded_ids.push(id);
        }
    }
    suggestions
}

pub async fn suggest_projects(
    generator: &GenerationClient,
    job_posting: &str,
    projects: &[Project],
) -> Result<ProjectSuggestions, SelectorError> {
    if job_posting.trim().is_empty() {
        return Err(SelectorError::Validation(
            "A job posting is required to suggest projects".to_string(),
        ));
    }
    if projects.is_empty() {
        return Err(SelectorError::Validation(
            "Add some projects before asking for suggestions".to_string(),
        ));
    }

    let prompt = SUGGEST_PROJECTS_PROMPT_TEMPLATE
        .replace("{job_posting}", job_posting.trim())
        .replace("{projects}", &render_candidates(projects));
    let system = format!("{SUGGEST_PROJECTS_SYSTEM} {JSON_ONLY_INSTRUCTION}");

    let returned: Vec<String> = generator
        .call_json(
            "suggest_projects",
            &system,
            &Prompt::text(prompt),
            &Schema::array(Schema::string()),
        )
        .await?;

    let suggestions = filter_suggestions(returned, projects);
    if !suggestions.discarded_ids.is_empty() {
        warn!(
            "Discarded unknown or repeated project ids: {:?}",
            suggestions.discarded_ids
        );
    }
    info!(
        "Suggested {} of {} projects",
        suggestions.project_ids.len(),
        projects.len()
    );
    Ok(suggestions)
}
