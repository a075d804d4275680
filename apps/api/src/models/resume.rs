//! Pipeline output shapes and saved snapshots.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::profile::{Project, WorkExperience};

/// Read-only education block copied into every resume.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Education {
    pub institution: String,
    pub degree: String,
    pub dates: String,
    #[serde(default)]
    pub details: Vec<String>,
}

/// Read-only contact block copied into every resume.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContactLinks {
    pub email: String,
    pub phone: String,
    pub portfolio: String,
    pub github: String,
    pub linkedin: String,
}

/// A resume project line. `company` carries the project title and `dates` its year,
/// matching the layout the PDF renderer expects.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectEntry {
    pub company: String,
    pub dates: String,
    pub minor_desc: String,
    pub bullets: Vec<String>,
}

impl From<&Project> for ProjectEntry {
    fn from(project: &Project) -> Self {
        ProjectEntry {
            company: project.title.clone(),
            dates: project.year.to_string(),
            minor_desc: project.subtitle.clone(),
            bullets: project.description.clone(),
        }
    }
}

/// A labelled group of skills; `items` is a comma-joined list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkillCategory {
    pub title: String,
    pub items: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResumeStructure {
    pub summary: String,
    pub education: Education,
    pub work_experience: Vec<WorkExperience>,
    pub projects: Vec<ProjectEntry>,
    pub skills: Vec<SkillCategory>,
    pub links: ContactLinks,
}

impl ResumeStructure {
    /// Names the first empty required section, if any.
    pub fn missing_section(&self) -> Option<&'static str> {
        if self.work_experience.is_empty() {
            Some("work experience")
        } else if self.projects.is_empty() {
            Some("projects")
        } else if self.skills.is_empty() {
            Some("skills")
        } else {
            None
        }
    }
}

/// Immutable snapshot of a finished run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedResult {
    pub id: String,
    pub job_title: String,
    pub company_name: String,
    pub resume: ResumeStructure,
    pub cover_letter: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewSavedResult {
    pub job_title: String,
    pub company_name: String,
    pub resume: ResumeStructure,
    pub cover_letter: String,
}

/// Fixed header data that never passes through generation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StaticProfile {
    pub name: String,
    pub education: Education,
    pub links: ContactLinks,
}

impl Default for StaticProfile {
    fn default() -> Self {
        StaticProfile {
            name: "Your Name".to_string(),
            education: Education {
                institution: "University".to_string(),
                degree: "Bachelor of Science".to_string(),
                dates: String::new(),
                details: Vec::new(),
            },
            links: ContactLinks {
                email: "you@example.com".to_string(),
                phone: String::new(),
                portfolio: String::new(),
                github: String::new(),
                linkedin: String::new(),
            },
        }
    }
}
