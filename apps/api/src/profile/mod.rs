//! Profile Store: projects, work history, skills, document libraries and saved results.
//!
//! `ProfileStore` is the seam: the pipeline and handlers depend on the trait,
//! `SqliteProfileStore` is the production backend. Every implementation enforces
//! the entity rules in this module before writing.

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::models::profile::{
    Document, DocumentBody, DocumentLibrary, DocumentRole, NewDocument, NewProject,
    NewWorkExperience, Project, Skill, WorkExperience,
};
use crate::models::resume::{NewSavedResult, SavedResult};

pub mod assist;
mod prompts;
pub mod bulk;
pub mod files;
pub mod handlers;
pub mod sqlite;

pub use files::FileStore;
pub use sqlite::SqliteProfileStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{0} not found")]
    NotFound(String),

    #[error("{0}")]
    Invalid(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("File storage error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Text extraction failed: {0}")]
    Extraction(String),
}

#[async_trait]
pub trait ProfileStore: Send + Sync {
    async fn list_projects(&self) -> Result<Vec<Project>, StoreError>;
    async fn add_project(&self, project: NewProject) -> Result<Project, StoreError>;
    /// Inserts every project or none of them.
    async fn add_projects(&self, projects: Vec<NewProject>) -> Result<Vec<Project>, StoreError>;
    /// Replaces every field except the id.
    async fn update_project(&self, project: Project) -> Result<Project, StoreError>;
    async fn delete_project(&self, id: &str) -> Result<(), StoreError>;

    async fn list_work_experiences(&self) -> Result<Vec<WorkExperience>, StoreError>;
    async fn add_work_experience(
        &self,
        experience: NewWorkExperience,
    ) -> Result<WorkExperience, StoreError>;
    async fn update_work_experience(
        &self,
        experience: WorkExperience,
    ) -> Result<WorkExperience, StoreError>;
    async fn delete_work_experience(&self, id: &str) -> Result<(), StoreError>;

    async fn list_skills(&self) -> Result<Vec<Skill>, StoreError>;
    /// Deletes every skill and inserts `names` in order.
    async fn replace_skills(&self, names: Vec<String>) -> Result<Vec<Skill>, StoreError>;

    /// Adds comma-separated names that are not already in the set.
    async fn merge_skills(&self, input: &str) -> Result<Vec<Skill>, StoreError> {
        let existing: Vec<String> = self
            .list_skills()
            .await?
            .into_iter()
            .map(|s| s.name)
            .collect();
        self.replace_skills(bulk::merge_skill_names(&existing, input))
            .await
    }

    async fn clear_skills(&self) -> Result<(), StoreError> {
        self.replace_skills(Vec::new()).await.map(|_| ())
    }

    async fn list_documents(&self) -> Result<DocumentLibrary, StoreError>;
    async fn get_document(&self, id: &str) -> Result<Document, StoreError>;
    async fn add_document(&self, document: NewDocument) -> Result<Document, StoreError>;
    /// Deletes the document only if it belongs to `role`; returns what was removed.
    async fn delete_document(&self, role: DocumentRole, id: &str)
        -> Result<Document, StoreError>;

    /// Newest first.
    async fn list_results(&self) -> Result<Vec<SavedResult>, StoreError>;
    async fn get_result(&self, id: &str) -> Result<SavedResult, StoreError>;
    async fn add_result(&self, result: NewSavedResult) -> Result<SavedResult, StoreError>;
    async fn delete_result(&self, id: &str) -> Result<(), StoreError>;
}

pub fn new_id(prefix: &str) -> String {
    format!("{prefix}-{}", Uuid::new_v4())
}

// ────────────────────────────────────────────────────────────────────────────
// Entity rules
// ────────────────────────────────────────────────────────────────────────────

/// Trims bullet text and drops blank bullets.
pub fn clean_bullets(bullets: Vec<String>) -> Vec<String> {
    bullets
        .into_iter()
        .map(|b| b.trim().to_string())
        .filter(|b| !b.is_empty())
        .collect()
}

pub fn validate_project(title: &str) -> Result<(), StoreError> {
    if title.trim().is_empty() {
        return Err(StoreError::Invalid("Project title cannot be empty".to_string()));
    }
    Ok(())
}

pub fn validate_work_experience(
    company: &str,
    role: &str,
    bullets: &[String],
) -> Result<(), StoreError> {
    if company.trim().is_empty() {
        return Err(StoreError::Invalid("Company cannot be empty".to_string()));
    }
    if role.trim().is_empty() {
        return Err(StoreError::Invalid("Role cannot be empty".to_string()));
    }
    if bullets.iter().all(|b| b.trim().is_empty()) {
        return Err(StoreError::Invalid(
            "Work experience needs at least one bullet".to_string(),
        ));
    }
    Ok(())
}

pub fn validate_document(document: &NewDocument) -> Result<(), StoreError> {
    if document.name.trim().is_empty() {
        return Err(StoreError::Invalid("Document name cannot be empty".to_string()));
    }
    match &document.body {
        DocumentBody::Text { content } if content.trim().is_empty() => Err(StoreError::Invalid(
            "Text document content cannot be empty".to_string(),
        )),
        DocumentBody::Binary { storage_ref } if storage_ref.trim().is_empty() => Err(
            StoreError::Invalid("Binary document is missing its storage reference".to_string()),
        ),
        _ => Ok(()),
    }
}

/// A result is only worth saving when every generated section has content.
pub fn validate_result(result: &NewSavedResult) -> Result<(), StoreError> {
    if result.job_title.trim().is_empty() || result.company_name.trim().is_empty() {
        return Err(StoreError::Invalid(
            "Job title and company name are required to save a result".to_string(),
        ));
    }
    if let Some(section) = result.resume.missing_section() {
        return Err(StoreError::Invalid(format!(
            "Cannot save: the {section} section is empty"
        )));
    }
    if result.cover_letter.trim().is_empty() {
        return Err(StoreError::Invalid(
            "Cannot save: the cover letter is empty".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_id_is_prefixed_and_unique() {
        let a = new_id("proj");
        let b = new_id("proj");
        assert!(a.starts_with("proj-"));
        assert_ne!(a, b);
    }

    #[test]
    fn test_work_experience_requires_a_non_blank_bullet() {
        assert!(validate_work_experience("Acme", "Engineer", &["  ".to_string()]).is_err());
        assert!(validate_work_experience("Acme", "Engineer", &[]).is_err());
        assert!(validate_work_experience("Acme", "Engineer", &["Shipped".to_string()]).is_ok());
        assert!(validate_work_experience(" ", "Engineer", &["Shipped".to_string()]).is_err());
    }

    #[test]
    fn test_clean_bullets_drops_blanks() {
        let cleaned = clean_bullets(vec![" a ".to_string(), "".to_string(), "b".to_string()]);
        assert_eq!(cleaned, vec!["a", "b"]);
    }

    #[test]
    fn test_text_document_needs_content() {
        let doc = NewDocument {
            role: DocumentRole::Resume,
            name: "CV".to_string(),
            body: DocumentBody::Text {
                content: "   ".to_string(),
            },
        };
        assert!(validate_document(&doc).is_err());
    }
}
