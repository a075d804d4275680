use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::llm_client::GenerationClient;
use crate::models::profile::{DocumentBody, DocumentRole, WorkExperience};
use crate::models::resume::{
    NewSavedResult, ProjectEntry, ResumeStructure, SavedResult, SkillCategory, StaticProfile,
};
use crate::pipeline::stages::{self, derive_summary};
use crate::pipeline::state::{
    reduce, RunEvent, RunMode, RunOutcome, RunState, Stage, StageErrors, StageKind,
};
use crate::pipeline::{OptimizationRequest, PipelineError, RunInputs};
use crate::profile::{clean_bullets, FileStore, ProfileStore};

/// A non-fatal observation made while post-processing a stage.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunWarning {
    pub stage: StageKind,
    pub message: String,
}

#[derive(Debug, Clone, Default)]
struct RunOutputs {
    summary: String,
    work_experience: Vec<WorkExperience>,
    projects: Vec<ProjectEntry>,
    skills: Vec<SkillCategory>,
    cover_letter: String,
}

/// One optimization session. Owned by whoever holds its lock; never shared
/// between runs.
#[derive(Debug)]
pub struct PipelineSession {
    id: Uuid,
    inputs: RunInputs,
    state: RunState,
    outputs: RunOutputs,
    warnings: Vec<RunWarning>,
    created_at: DateTime<Utc>,
}

impl PipelineSession {
    pub fn id(&self) -> Uuid {
        self.id
    }

    #[cfg(test)]
    pub fn state(&self) -> &RunState {
        &self.state
    }

    pub fn company_name(&self) -> &str {
        self.inputs.request.company_name.trim()
    }

    pub fn cover_letter(&self) -> &str {
        &self.outputs.cover_letter
    }

    /// Returns the run to idle and drops everything it produced.
    pub fn reset(&mut self) -> Result<(), PipelineError> {
        self.apply(RunEvent::Reset)?;
        self.outputs = RunOutputs::default();
        self.warnings.clear();
        Ok(())
    }

    fn apply(&mut self, event: RunEvent) -> Result<(), PipelineError> {
        self.state = reduce(&self.state, event)?;
        Ok(())
    }

    fn warn(&mut self, stage: StageKind, messages: Vec<String>) {
        self.warnings
            .extend(messages.into_iter().map(|message| RunWarning { stage, message }));
    }
}

/// Everything the client needs to render a run.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSnapshot {
    pub id: Uuid,
    pub job_title: String,
    pub company_name: String,
    pub stage: Stage,
    pub mode: RunMode,
    pub outcome: RunOutcome,
    pub stage_errors: StageErrors,
    pub warnings: Vec<RunWarning>,
    pub resume: ResumeStructure,
    pub cover_letter: String,
    pub ready_to_save: bool,
    pub created_at: DateTime<Utc>,
}

/// User edits to a finished draft. Absent fields are left as they are.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DraftEdit {
    pub summary: Option<String>,
    pub work_experience: Option<Vec<WorkExperience>>,
    pub projects: Option<Vec<ProjectEntry>>,
    pub skills: Option<Vec<SkillCategory>>,
    pub cover_letter: Option<String>,
}

/// Drives sessions through the stage table. Collaborators are injected at
/// construction; the orchestrator itself holds no run state.
#[derive(Clone)]
pub struct Orchestrator {
    generator: GenerationClient,
    store: Arc<dyn ProfileStore>,
    files: FileStore,
    profile: Arc<StaticProfile>,
}

impl Orchestrator {
    pub fn new(
        generator: GenerationClient,
        store: Arc<dyn ProfileStore>,
        files: FileStore,
        profile: Arc<StaticProfile>,
    ) -> Self {
        Self {
            generator,
            store,
            files,
            profile,
        }
    }

    pub fn static_profile(&self) -> &StaticProfile {
        &self.profile
    }

    /// Validates the request and loads the profile data a run reads.
    /// No generation call is made here.
    pub async fn prepare(
        &self,
        request: OptimizationRequest,
    ) -> Result<PipelineSession, PipelineError> {
        request.validate()?;

        let work_experiences = self.store.list_work_experiences().await?;
        let all_projects = self.store.list_projects().await?;
        let mut seen = HashSet::new();
        let mut projects = Vec::new();
        for id in &request.selected_project_ids {
            if !seen.insert(id.as_str()) {
                continue;
            }
            let project = all_projects
                .iter()
                .find(|p| &p.id == id)
                .ok_or_else(|| {
                    PipelineError::Validation(format!("Selected project {id} does not exist"))
                })?;
            projects.push(project.clone());
        }
        let skills = self.store.list_skills().await?;

        let inspiration = match &request.inspiration_document_id {
            Some(id) => Some(self.load_inspiration(id).await?),
            None => None,
        };

        let session = PipelineSession {
            id: Uuid::new_v4(),
            inputs: RunInputs {
                request,
                work_experiences,
                projects,
                skills,
                inspiration,
            },
            state: RunState::default(),
            outputs: RunOutputs::default(),
            warnings: Vec::new(),
            created_at: Utc::now(),
        };
        info!(
            "Prepared run {} for {} at {} ({} work entries, {} projects, {} skills)",
            session.id,
            session.inputs.request.job_title.trim(),
            session.company_name(),
            session.inputs.work_experiences.len(),
            session.inputs.projects.len(),
            session.inputs.skills.len()
        );
        Ok(session)
    }

    async fn load_inspiration(&self, id: &str) -> Result<String, PipelineError> {
        let document = self.store.get_document(id).await?;
        if document.role != DocumentRole::CoverLetter {
            return Err(PipelineError::Validation(format!(
                "Document {id} is not a cover letter"
            )));
        }
        match document.body {
            DocumentBody::Text { content } => Ok(content),
            DocumentBody::Binary { storage_ref } => {
                Ok(self.files.extract_text(&storage_ref).await?)
            }
        }
    }

    /// The full initial run: bullets, then skills, then cover letter.
    pub async fn run(&self, session: &mut PipelineSession) -> Result<(), PipelineError> {
        session.apply(RunEvent::Start)?;
        self.drive(session).await
    }

    /// Re-runs one stage. A bullets retry re-chains through the later stages.
    pub async fn retry(
        &self,
        session: &mut PipelineSession,
        stage: StageKind,
    ) -> Result<(), PipelineError> {
        session.apply(RunEvent::Retry(stage))?;
        info!("Run {}: retrying {}", session.id, stage.as_str());
        self.drive(session).await
    }

    async fn drive(&self, session: &mut PipelineSession) -> Result<(), PipelineError> {
        while let Some(kind) = session.state.active_stage() {
            session.warnings.retain(|w| w.stage != kind);

            let outcome = match kind {
                StageKind::Bullets => {
                    match stages::optimize_bullets(&self.generator, &session.inputs).await {
                        Ok(output) => {
                            session.outputs.summary = derive_summary(&output.work_experience);
                            session.outputs.work_experience = output.work_experience;
                            session.outputs.projects = output.projects;
                            session.warn(kind, output.warnings);
                            Ok(())
                        }
                        Err(failure) => Err(failure),
                    }
                }
                StageKind::Skills => {
                    match stages::categorize_skills(&self.generator, &session.inputs).await {
                        Ok(output) => {
                            session.outputs.skills = output.categories;
                            session.warn(kind, output.warnings);
                            Ok(())
                        }
                        Err(failure) => Err(failure),
                    }
                }
                StageKind::CoverLetter => stages::write_cover_letter(
                    &self.generator,
                    &session.inputs,
                    &session.outputs.work_experience,
                    &session.outputs.projects,
                )
                .await
                .map(|letter| session.outputs.cover_letter = letter),
            };

            let event = match outcome {
                Ok(()) => {
                    info!("Run {}: {} succeeded", session.id, kind.as_str());
                    RunEvent::Succeeded(kind)
                }
                Err(failure) => {
                    warn!(
                        "Run {}: {} failed ({:?}): {}",
                        session.id,
                        kind.as_str(),
                        failure.kind,
                        failure.message
                    );
                    RunEvent::Failed(kind, failure)
                }
            };
            session.apply(event)?;
        }

        info!(
            "Run {} settled at {} ({:?})",
            session.id,
            session.state.stage,
            session.state.outcome()
        );
        Ok(())
    }

    /// Applies user edits to a completed draft. Identity fields and entry
    /// counts must match the generated draft.
    pub fn apply_draft(
        &self,
        session: &mut PipelineSession,
        edit: DraftEdit,
    ) -> Result<(), PipelineError> {
        if session.state.stage != Stage::Complete {
            return Err(PipelineError::Validation(
                "The draft can only be edited once the run is complete".to_string(),
            ));
        }

        let work_experience = edit
            .work_experience
            .map(|edited| check_work_edit(&session.outputs.work_experience, edited))
            .transpose()?;
        let projects = edit
            .projects
            .map(|edited| check_project_edit(&session.outputs.projects, edited))
            .transpose()?;

        if let Some(summary) = edit.summary {
            session.outputs.summary = summary.trim().to_string();
        }
        if let Some(work_experience) = work_experience {
            session.outputs.work_experience = work_experience;
        }
        if let Some(projects) = projects {
            session.outputs.projects = projects;
        }
        if let Some(skills) = edit.skills {
            session.outputs.skills = skills
                .into_iter()
                .filter(|c| !c.title.trim().is_empty() && !c.items.trim().is_empty())
                .collect();
        }
        if let Some(cover_letter) = edit.cover_letter {
            session.outputs.cover_letter = cover_letter.trim().to_string();
        }
        info!("Run {}: draft edited", session.id);
        Ok(())
    }

    /// Assembles the resume from the current outputs and the static profile.
    pub fn resume(&self, session: &PipelineSession) -> ResumeStructure {
        ResumeStructure {
            summary: session.outputs.summary.clone(),
            education: self.profile.education.clone(),
            work_experience: session.outputs.work_experience.clone(),
            projects: session.outputs.projects.clone(),
            skills: session.outputs.skills.clone(),
            links: self.profile.links.clone(),
        }
    }

    fn save_blocker(&self, session: &PipelineSession, resume: &ResumeStructure) -> Option<String> {
        if session.state.stage != Stage::Complete {
            return Some(format!(
                "Cannot save while the run is {}",
                session.state.stage
            ));
        }
        if let Some(section) = resume.missing_section() {
            return Some(format!(
                "Cannot save: the {section} section is empty; retry that stage first"
            ));
        }
        if session.outputs.cover_letter.trim().is_empty() {
            return Some(
                "Cannot save: the cover letter is empty; retry the cover-letter stage or write one"
                    .to_string(),
            );
        }
        None
    }

    /// Persists a new, independent snapshot of the run.
    pub async fn save(&self, session: &PipelineSession) -> Result<SavedResult, PipelineError> {
        let resume = self.resume(session);
        if let Some(reason) = self.save_blocker(session, &resume) {
            return Err(PipelineError::Validation(reason));
        }

        let saved = self
            .store
            .add_result(NewSavedResult {
                job_title: session.inputs.request.job_title.trim().to_string(),
                company_name: session.company_name().to_string(),
                resume,
                cover_letter: session.outputs.cover_letter.clone(),
            })
            .await?;
        info!("Run {} saved as {}", session.id, saved.id);
        Ok(saved)
    }

    pub fn snapshot(&self, session: &PipelineSession) -> RunSnapshot {
        let resume = self.resume(session);
        let ready_to_save = self.save_blocker(session, &resume).is_none();
        RunSnapshot {
            id: session.id,
            job_title: session.inputs.request.job_title.trim().to_string(),
            company_name: session.company_name().to_string(),
            stage: session.state.stage,
            mode: session.state.mode,
            outcome: session.state.outcome(),
            stage_errors: session.state.errors.clone(),
            warnings: session.warnings.clone(),
            resume,
            cover_letter: session.outputs.cover_letter.clone(),
            ready_to_save,
            created_at: session.created_at,
        }
    }
}

fn check_work_edit(
    current: &[WorkExperience],
    edited: Vec<WorkExperience>,
) -> Result<Vec<WorkExperience>, PipelineError> {
    if edited.len() != current.len() {
        return Err(PipelineError::Validation(format!(
            "Expected {} work experience entries, got {}",
            current.len(),
            edited.len()
        )));
    }
    current
        .iter()
        .zip(edited)
        .map(|(c, e)| {
            if c.id != e.id || c.company != e.company || c.role != e.role || c.dates != e.dates {
                return Err(PipelineError::Validation(format!(
                    "Company, role and dates of {} cannot be edited",
                    c.company
                )));
            }
            let bullets = clean_bullets(e.bullets);
            if bullets.is_empty() {
                return Err(PipelineError::Validation(format!(
                    "{} needs at least one bullet",
                    c.company
                )));
            }
            Ok(WorkExperience { bullets, ..e })
        })
        .collect()
}

fn check_project_edit(
    current: &[ProjectEntry],
    edited: Vec<ProjectEntry>,
) -> Result<Vec<ProjectEntry>, PipelineError> {
    if edited.len() != current.len() {
        return Err(PipelineError::Validation(format!(
            "Expected {} projects, got {}",
            current.len(),
            edited.len()
        )));
    }
    current
        .iter()
        .zip(edited)
        .map(|(c, e)| {
            if c.company != e.company || c.dates != e.dates {
                return Err(PipelineError::Validation(format!(
                    "Title and year of project {} cannot be edited",
                    c.company
                )));
            }
            Ok(ProjectEntry {
                minor_desc: e.minor_desc.trim().to_string(),
                bullets: clean_bullets(e.bullets),
                ..e
            })
        })
        .collect()
}
