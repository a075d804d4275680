//! Profile entities owned by the profile store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A portfolio project. Identity is fixed at creation; edits replace the whole record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    pub id: String,
    pub title: String,
    pub year: i32,
    pub subtitle: String,
    pub description: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewProject {
    pub title: String,
    pub year: i32,
    #[serde(default)]
    pub subtitle: String,
    #[serde(default)]
    pub description: Vec<String>,
}

impl NewProject {
    pub fn into_project(self, id: String) -> Project {
        Project {
            id,
            title: self.title,
            year: self.year,
            subtitle: self.subtitle,
            description: self.description,
        }
    }
}

/// A past position. `dates` is free-form ("Jan 2022 - Present") and never parsed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkExperience {
    pub id: String,
    pub company: String,
    pub role: String,
    pub dates: String,
    pub bullets: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewWorkExperience {
    pub company: String,
    pub role: String,
    #[serde(default)]
    pub dates: String,
    pub bullets: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Skill {
    pub id: String,
    pub name: String,
}

/// Which library a document belongs to. Fixed at creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentRole {
    Resume,
    CoverLetter,
}

impl DocumentRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentRole::Resume => "resume",
            DocumentRole::CoverLetter => "cover_letter",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "resume" => Some(DocumentRole::Resume),
            "cover_letter" | "cover-letter" | "coverLetter" => Some(DocumentRole::CoverLetter),
            _ => None,
        }
    }
}

/// Document payload: inline text, or a reference to a stored upload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DocumentBody {
    Text {
        content: String,
    },
    Binary {
        #[serde(rename = "storageRef")]
        storage_ref: String,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub role: DocumentRole,
    pub name: String,
    pub body: DocumentBody,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewDocument {
    pub role: DocumentRole,
    pub name: String,
    pub body: DocumentBody,
}

/// Both document collections, as the client lists them.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentLibrary {
    pub resumes: Vec<Document>,
    pub cover_letters: Vec<Document>,
}
