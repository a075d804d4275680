use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::query::Query;
use sqlx::sqlite::SqliteArguments;
use sqlx::{FromRow, Sqlite, SqlitePool};
use tracing::info;

use crate::models::profile::{
    Document, DocumentBody, DocumentLibrary, DocumentRole, NewDocument, NewProject,
    NewWorkExperience, Project, Skill, WorkExperience,
};
use crate::models::resume::{NewSavedResult, ResumeStructure, SavedResult};
use crate::profile::bulk::normalize_skill_names;
use crate::profile::{
    clean_bullets, new_id, validate_document, validate_project, validate_result,
    validate_work_experience, ProfileStore, StoreError,
};

// ────────────────────────────────────────────────────────────────────────────
// Rows
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, FromRow)]
struct ProjectRow {
    id: String,
    title: String,
    year: i32,
    subtitle: String,
    description: Json<Vec<String>>,
}

impl From<ProjectRow> for Project {
    fn from(row: ProjectRow) -> Self {
        Project {
            id: row.id,
            title: row.title,
            year: row.year,
            subtitle: row.subtitle,
            description: row.description.0,
        }
    }
}

#[derive(Debug, FromRow)]
struct WorkExperienceRow {
    id: String,
    company: String,
    role: String,
    dates: String,
    bullets: Json<Vec<String>>,
}

impl From<WorkExperienceRow> for WorkExperience {
    fn from(row: WorkExperienceRow) -> Self {
        WorkExperience {
            id: row.id,
            company: row.company,
            role: row.role,
            dates: row.dates,
            bullets: row.bullets.0,
        }
    }
}

#[derive(Debug, FromRow)]
struct SkillRow {
    id: String,
    name: String,
}

#[derive(Debug, FromRow)]
struct DocumentRow {
    id: String,
    role: String,
    name: String,
    kind: String,
    content: Option<String>,
    storage_ref: Option<String>,
    created_at: DateTime<Utc>,
}

impl TryFrom<DocumentRow> for Document {
    type Error = StoreError;

    fn try_from(row: DocumentRow) -> Result<Self, Self::Error> {
        let role = DocumentRole::parse(&row.role).ok_or_else(|| {
            StoreError::Invalid(format!("Document {} has unknown role '{}'", row.id, row.role))
        })?;
        let body = match (row.kind.as_str(), row.content, row.storage_ref) {
            ("text", Some(content), _) => DocumentBody::Text { content },
            ("binary", _, Some(storage_ref)) => DocumentBody::Binary { storage_ref },
            (kind, _, _) => {
                return Err(StoreError::Invalid(format!(
                    "Document {} has malformed '{kind}' body",
                    row.id
                )))
            }
        };
        Ok(Document {
            id: row.id,
            role,
            name: row.name,
            body,
            created_at: row.created_at,
        })
    }
}

#[derive(Debug, FromRow)]
struct ResultRow {
    id: String,
    job_title: String,
    company_name: String,
    resume: Json<ResumeStructure>,
    cover_letter: String,
    created_at: DateTime<Utc>,
}

impl From<ResultRow> for SavedResult {
    fn from(row: ResultRow) -> Self {
        SavedResult {
            id: row.id,
            job_title: row.job_title,
            company_name: row.company_name,
            resume: row.resume.0,
            cover_letter: row.cover_letter,
            created_at: row.created_at,
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Store
// ────────────────────────────────────────────────────────────────────────────

/// SQLite-backed profile store. Schema lives in `migrations/`.
#[derive(Clone)]
pub struct SqliteProfileStore {
    pool: SqlitePool,
}

impl SqliteProfileStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

fn prepare_project(project: NewProject) -> Result<Project, StoreError> {
    validate_project(&project.title)?;
    Ok(NewProject {
        title: project.title.trim().to_string(),
        subtitle: project.subtitle.trim().to_string(),
        description: clean_bullets(project.description),
        ..project
    }
    .into_project(new_id("proj")))
}

fn insert_project(project: &Project) -> Query<'_, Sqlite, SqliteArguments<'_>> {
    sqlx::query(
        r#"
        INSERT INTO projects (id, title, year, subtitle, description, created_at)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&project.id)
    .bind(&project.title)
    .bind(project.year)
    .bind(&project.subtitle)
    .bind(Json(&project.description))
    .bind(Utc::now())
}

#[async_trait]
impl ProfileStore for SqliteProfileStore {
    async fn list_projects(&self) -> Result<Vec<Project>, StoreError> {
        let rows = sqlx::query_as::<_, ProjectRow>(
            "SELECT id, title, year, subtitle, description FROM projects ORDER BY rowid",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Project::from).collect())
    }

    async fn add_project(&self, project: NewProject) -> Result<Project, StoreError> {
        let project = prepare_project(project)?;
        insert_project(&project).execute(&self.pool).await?;

        info!("Added project {}", project.id);
        Ok(project)
    }

    async fn add_projects(&self, projects: Vec<NewProject>) -> Result<Vec<Project>, StoreError> {
        let projects = projects
            .into_iter()
            .map(prepare_project)
            .collect::<Result<Vec<_>, _>>()?;

        let mut tx = self.pool.begin().await?;
        for project in &projects {
            insert_project(project).execute(&mut *tx).await?;
        }
        tx.commit().await?;

        info!("Added {} projects", projects.len());
        Ok(projects)
    }

    async fn update_project(&self, project: Project) -> Result<Project, StoreError> {
        validate_project(&project.title)?;
        let project = Project {
            title: project.title.trim().to_string(),
            subtitle: project.subtitle.trim().to_string(),
            description: clean_bullets(project.description),
            ..project
        };

        let result = sqlx::query(
            "UPDATE projects SET title = ?, year = ?, subtitle = ?, description = ? WHERE id = ?",
        )
        .bind(&project.title)
        .bind(project.year)
        .bind(&project.subtitle)
        .bind(Json(&project.description))
        .bind(&project.id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("Project {}", project.id)));
        }
        Ok(project)
    }

    async fn delete_project(&self, id: &str) -> Result<(), StoreError> {
        let result = sqlx::query("DELETE FROM projects WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("Project {id}")));
        }
        Ok(())
    }

    async fn list_work_experiences(&self) -> Result<Vec<WorkExperience>, StoreError> {
        let rows = sqlx::query_as::<_, WorkExperienceRow>(
            "SELECT id, company, role, dates, bullets FROM work_experiences ORDER BY rowid",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(WorkExperience::from).collect())
    }

    async fn add_work_experience(
        &self,
        experience: NewWorkExperience,
    ) -> Result<WorkExperience, StoreError> {
        validate_work_experience(&experience.company, &experience.role, &experience.bullets)?;
        let experience = WorkExperience {
            id: new_id("work"),
            company: experience.company.trim().to_string(),
            role: experience.role.trim().to_string(),
            dates: experience.dates.trim().to_string(),
            bullets: clean_bullets(experience.bullets),
        };

        sqlx::query(
            r#"
            INSERT INTO work_experiences (id, company, role, dates, bullets, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&experience.id)
        .bind(&experience.company)
        .bind(&experience.role)
        .bind(&experience.dates)
        .bind(Json(&experience.bullets))
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        info!("Added work experience {}", experience.id);
        Ok(experience)
    }

    async fn update_work_experience(
        &self,
        experience: WorkExperience,
    ) -> Result<WorkExperience, StoreError> {
        validate_work_experience(&experience.company, &experience.role, &experience.bullets)?;
        let experience = WorkExperience {
            company: experience.company.trim().to_string(),
            role: experience.role.trim().to_string(),
            dates: experience.dates.trim().to_string(),
            bullets: clean_bullets(experience.bullets),
            ..experience
        };

        let result = sqlx::query(
            "UPDATE work_experiences SET company = ?, role = ?, dates = ?, bullets = ? WHERE id = ?",
        )
        .bind(&experience.company)
        .bind(&experience.role)
        .bind(&experience.dates)
        .bind(Json(&experience.bullets))
        .bind(&experience.id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!(
                "Work experience {}",
                experience.id
            )));
        }
        Ok(experience)
    }

    async fn delete_work_experience(&self, id: &str) -> Result<(), StoreError> {
        let result = sqlx::query("DELETE FROM work_experiences WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("Work experience {id}")));
        }
        Ok(())
    }

    async fn list_skills(&self) -> Result<Vec<Skill>, StoreError> {
        let rows =
            sqlx::query_as::<_, SkillRow>("SELECT id, name FROM skills ORDER BY position")
                .fetch_all(&self.pool)
                .await?;
        Ok(rows
            .into_iter()
            .map(|r| Skill {
                id: r.id,
                name: r.name,
            })
            .collect())
    }

    async fn replace_skills(&self, names: Vec<String>) -> Result<Vec<Skill>, StoreError> {
        let names = normalize_skill_names(names);
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM skills").execute(&mut *tx).await?;

        let mut skills = Vec::with_capacity(names.len());
        for (position, name) in names.into_iter().enumerate() {
            let skill = Skill {
                id: new_id("skill"),
                name,
            };
            sqlx::query("INSERT INTO skills (id, name, position) VALUES (?, ?, ?)")
                .bind(&skill.id)
                .bind(&skill.name)
                .bind(position as i64)
                .execute(&mut *tx)
                .await?;
            skills.push(skill);
        }

        tx.commit().await?;
        info!("Replaced skill set ({} skills)", skills.len());
        Ok(skills)
    }

    async fn list_documents(&self) -> Result<DocumentLibrary, StoreError> {
        let rows = sqlx::query_as::<_, DocumentRow>(
            r#"
            SELECT id, role, name, kind, content, storage_ref, created_at
            FROM documents ORDER BY rowid
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        let mut library = DocumentLibrary::default();
        for row in rows {
            let document = Document::try_from(row)?;
            match document.role {
                DocumentRole::Resume => library.resumes.push(document),
                DocumentRole::CoverLetter => library.cover_letters.push(document),
            }
        }
        Ok(library)
    }

    async fn get_document(&self, id: &str) -> Result<Document, StoreError> {
        let row = sqlx::query_as::<_, DocumentRow>(
            r#"
            SELECT id, role, name, kind, content, storage_ref, created_at
            FROM documents WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| StoreError::NotFound(format!("Document {id}")))?;
        Document::try_from(row)
    }

    async fn add_document(&self, document: NewDocument) -> Result<Document, StoreError> {
        validate_document(&document)?;
        let document = Document {
            id: new_id("doc"),
            role: document.role,
            name: document.name.trim().to_string(),
            body: document.body,
            created_at: Utc::now(),
        };

        let (kind, content, storage_ref) = match &document.body {
            DocumentBody::Text { content } => ("text", Some(content.as_str()), None),
            DocumentBody::Binary { storage_ref } => ("binary", None, Some(storage_ref.as_str())),
        };

        sqlx::query(
            r#"
            INSERT INTO documents (id, role, name, kind, content, storage_ref, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&document.id)
        .bind(document.role.as_str())
        .bind(&document.name)
        .bind(kind)
        .bind(content)
        .bind(storage_ref)
        .bind(document.created_at)
        .execute(&self.pool)
        .await?;

        info!(
            "Added {} document {} ({kind})",
            document.role.as_str(),
            document.id
        );
        Ok(document)
    }

    async fn delete_document(
        &self,
        role: DocumentRole,
        id: &str,
    ) -> Result<Document, StoreError> {
        let document = self.get_document(id).await?;
        if document.role != role {
            return Err(StoreError::NotFound(format!(
                "{} document {id}",
                role.as_str()
            )));
        }

        sqlx::query("DELETE FROM documents WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(document)
    }

    async fn list_results(&self) -> Result<Vec<SavedResult>, StoreError> {
        let rows = sqlx::query_as::<_, ResultRow>(
            r#"
            SELECT id, job_title, company_name, resume, cover_letter, created_at
            FROM results ORDER BY rowid DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(SavedResult::from).collect())
    }

    async fn get_result(&self, id: &str) -> Result<SavedResult, StoreError> {
        let row = sqlx::query_as::<_, ResultRow>(
            r#"
            SELECT id, job_title, company_name, resume, cover_letter, created_at
            FROM results WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| StoreError::NotFound(format!("Result {id}")))?;
        Ok(SavedResult::from(row))
    }

    async fn add_result(&self, result: NewSavedResult) -> Result<SavedResult, StoreError> {
        validate_result(&result)?;
        let saved = SavedResult {
            id: new_id("result"),
            job_title: result.job_title.trim().to_string(),
            company_name: result.company_name.trim().to_string(),
            resume: result.resume,
            cover_letter: result.cover_letter,
            created_at: Utc::now(),
        };

        sqlx::query(
            r#"
            INSERT INTO results (id, job_title, company_name, resume, cover_letter, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&saved.id)
        .bind(&saved.job_title)
        .bind(&saved.company_name)
        .bind(Json(&saved.resume))
        .bind(&saved.cover_letter)
        .bind(saved.created_at)
        .execute(&self.pool)
        .await?;

        info!(
            "Saved result {} for {} at {}",
            saved.id, saved.job_title, saved.company_name
        );
        Ok(saved)
    }

    async fn delete_result(&self, id: &str) -> Result<(), StoreError> {
        let result = sqlx::query("DELETE FROM results WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("Result {id}")));
        }
        Ok(())
    }
}

#[cfg(test)]
pub mod tests {
    use super::*;
    use crate::db::memory_pool;
    use crate::models::resume::{ProjectEntry, SkillCategory, StaticProfile};

    pub async fn memory_store() -> SqliteProfileStore {
        SqliteProfileStore::new(memory_pool().await)
    }

    fn new_project(title: &str, year: i32) -> NewProject {
        NewProject {
            title: title.to_string(),
            year,
            subtitle: "Subtitle".to_string(),
            description: vec!["Did a thing".to_string(), "  ".to_string()],
        }
    }

    fn new_result(job_title: &str) -> NewSavedResult {
        let profile = StaticProfile::default();
        NewSavedResult {
            job_title: job_title.to_string(),
            company_name: "Acme".to_string(),
            resume: ResumeStructure {
                summary: "Engineer".to_string(),
                education: profile.education,
                work_experience: vec![WorkExperience {
                    id: "work-1".to_string(),
                    company: "Acme".to_string(),
                    role: "Engineer".to_string(),
                    dates: "2021 - 2024".to_string(),
                    bullets: vec!["Built".to_string()],
                }],
                projects: vec![ProjectEntry {
                    company: "TOOL".to_string(),
                    dates: "2024".to_string(),
                    minor_desc: "CLI".to_string(),
                    bullets: vec!["Shipped".to_string()],
                }],
                skills: vec![SkillCategory {
                    title: "Languages".to_string(),
                    items: "Go, SQL".to_string(),
                }],
                links: profile.links,
            },
            cover_letter: "Dear Acme,".to_string(),
        }
    }

    #[tokio::test]
    async fn test_project_crud_round_trip() {
        let store = memory_store().await;
        let added = store.add_project(new_project("ALPHA", 2024)).await.unwrap();
        assert!(added.id.starts_with("proj-"));
        assert_eq!(added.description, vec!["Did a thing"]);

        let updated = store
            .update_project(Project {
                title: "ALPHA v2".to_string(),
                ..added.clone()
            })
            .await
            .unwrap();
        assert_eq!(updated.id, added.id);

        let listed = store.list_projects().await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].title, "ALPHA v2");

        store.delete_project(&added.id).await.unwrap();
        assert!(store.list_projects().await.unwrap().is_empty());
        assert!(matches!(
            store.delete_project(&added.id).await,
            Err(StoreError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_add_projects_is_all_or_nothing() {
        let store = memory_store().await;
        let added = store
            .add_projects(vec![new_project("ALPHA", 2023), new_project("BETA", 2024)])
            .await
            .unwrap();
        assert_eq!(added.len(), 2);
        let titles: Vec<_> = store
            .list_projects()
            .await
            .unwrap()
            .into_iter()
            .map(|p| p.title)
            .collect();
        assert_eq!(titles, vec!["ALPHA", "BETA"]);

        let err = store
            .add_projects(vec![new_project("GAMMA", 2024), new_project("  ", 2024)])
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Invalid(_)));
        assert_eq!(store.list_projects().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_update_unknown_project_is_not_found() {
        let store = memory_store().await;
        let ghost = new_project("GHOST", 2020).into_project("proj-missing".to_string());
        assert!(matches!(
            store.update_project(ghost).await,
            Err(StoreError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_work_experience_without_bullets_is_rejected() {
        let store = memory_store().await;
        let err = store
            .add_work_experience(NewWorkExperience {
                company: "Acme".to_string(),
                role: "Engineer".to_string(),
                dates: "2020".to_string(),
                bullets: vec![" ".to_string()],
            })
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Invalid(_)));
        assert!(store.list_work_experiences().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_replace_skills_deletes_then_reinserts_in_order() {
        let store = memory_store().await;
        store
            .replace_skills(vec!["Rust".to_string(), "Go".to_string()])
            .await
            .unwrap();
        let replaced = store
            .replace_skills(vec![
                "Postgres".to_string(),
                "rust".to_string(),
                "Rust".to_string(),
                " ".to_string(),
            ])
            .await
            .unwrap();
        assert_eq!(replaced.len(), 2);

        let names: Vec<String> = store
            .list_skills()
            .await
            .unwrap()
            .into_iter()
            .map(|s| s.name)
            .collect();
        assert_eq!(names, vec!["Postgres", "rust"]);
    }

    #[tokio::test]
    async fn test_documents_are_grouped_by_role_and_delete_checks_role() {
        let store = memory_store().await;
        let resume = store
            .add_document(NewDocument {
                role: DocumentRole::Resume,
                name: "Base CV".to_string(),
                body: DocumentBody::Text {
                    content: "Experience...".to_string(),
                },
            })
            .await
            .unwrap();
        let letter = store
            .add_document(NewDocument {
                role: DocumentRole::CoverLetter,
                name: "Old letter".to_string(),
                body: DocumentBody::Binary {
                    storage_ref: "/uploads/doc-1.pdf".to_string(),
                },
            })
            .await
            .unwrap();

        let library = store.list_documents().await.unwrap();
        assert_eq!(library.resumes.len(), 1);
        assert_eq!(library.cover_letters.len(), 1);
        assert_eq!(library.cover_letters[0].body, letter.body);

        let wrong_role = store
            .delete_document(DocumentRole::CoverLetter, &resume.id)
            .await;
        assert!(matches!(wrong_role, Err(StoreError::NotFound(_))));

        let removed = store
            .delete_document(DocumentRole::Resume, &resume.id)
            .await
            .unwrap();
        assert_eq!(removed.id, resume.id);
        assert!(store.list_documents().await.unwrap().resumes.is_empty());
    }

    #[tokio::test]
    async fn test_results_are_append_only_and_listed_newest_first() {
        let store = memory_store().await;
        let first = store.add_result(new_result("Backend Engineer")).await.unwrap();
        let second = store.add_result(new_result("Backend Engineer")).await.unwrap();
        assert_ne!(first.id, second.id, "each save is an independent snapshot");

        let listed = store.list_results().await.unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].id, second.id);
        assert_eq!(listed[1].id, first.id);
        assert_eq!(listed[0].resume, second.resume);

        store.delete_result(&first.id).await.unwrap();
        assert!(matches!(
            store.get_result(&first.id).await,
            Err(StoreError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_incomplete_result_is_rejected_and_not_stored() {
        let store = memory_store().await;
        let mut result = new_result("Backend Engineer");
        result.resume.skills.clear();

        let err = store.add_result(result).await.unwrap_err();
        assert!(err.to_string().contains("skills"));
        assert!(store.list_results().await.unwrap().is_empty());
    }
}
