//! Pipeline Orchestrator: bullets → skills → cover letter, with per-stage
//! error slots and independent stage retry.
//!
//! - `state` is the pure transition table.
//! - `stages` holds one function per generation stage.
//! - `orchestrator` drives a `PipelineSession` through the table.
//! - `registry` keeps live sessions for the HTTP layer.

use serde::Deserialize;
use thiserror::Error;

use crate::llm_client::ImageAttachment;
use crate::models::profile::{Project, Skill, WorkExperience};
use crate::profile::StoreError;

pub mod handlers;
pub mod orchestrator;
mod prompts;
pub mod registry;
pub mod stages;
pub mod state;

pub use orchestrator::{DraftEdit, Orchestrator, PipelineSession, RunSnapshot};
pub use registry::RunRegistry;
pub use state::TransitionError;

#[derive(Debug, Error)]
pub enum PipelineError {
    /// Bad or missing input, detected before any generation call.
    #[error("{0}")]
    Validation(String),

    #[error(transparent)]
    Transition(#[from] TransitionError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// What the user submits to start a run.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OptimizationRequest {
    #[serde(default)]
    pub job_title: String,
    #[serde(default)]
    pub company_name: String,
    #[serde(default)]
    pub job_posting: String,
    #[serde(default)]
    pub job_posting_image: Option<ImageAttachment>,
    #[serde(default)]
    pub selected_project_ids: Vec<String>,
    /// Free-text motivation woven into the cover letter.
    #[serde(default)]
    pub additional_info: String,
    /// A cover-letter document whose tone the new letter should follow.
    #[serde(default)]
    pub inspiration_document_id: Option<String>,
}

impl OptimizationRequest {
    /// The entry guard. Runs before anything is loaded or generated.
    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.job_posting.trim().is_empty() && self.job_posting_image.is_none() {
            return Err(PipelineError::Validation(
                "Provide the job posting as text or as an image".to_string(),
            ));
        }
        if let Some(image) = &self.job_posting_image {
            image.validate().map_err(PipelineError::Validation)?;
        }
        if self.job_title.trim().is_empty() {
            return Err(PipelineError::Validation("Job title is required".to_string()));
        }
        if self.company_name.trim().is_empty() {
            return Err(PipelineError::Validation("Company name is required".to_string()));
        }
        Ok(())
    }
}

/// Everything the stages read. Loaded once when the session is prepared.
#[derive(Debug, Clone)]
pub struct RunInputs {
    pub request: OptimizationRequest,
    pub work_experiences: Vec<WorkExperience>,
    /// Selected projects, in selection order.
    pub projects: Vec<Project>,
    pub skills: Vec<Skill>,
    pub inspiration: Option<String>,
}
