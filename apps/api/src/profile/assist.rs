//! AI-assisted project formatting: free text in, a draft project out.
//! The draft is returned to the caller and only stored when posted back.

use serde::Deserialize;
use tracing::info;

use crate::llm_client::prompts::{format_projects, JSON_ONLY_INSTRUCTION};
use crate::llm_client::{GenerationClient, GenerationError, Prompt, Schema};
use crate::models::profile::{NewProject, Project};
use crate::profile::clean_bullets;
use crate::profile::prompts::{FORMAT_PROJECT_PROMPT_TEMPLATE, FORMAT_PROJECT_SYSTEM, NO_EXAMPLES};

/// Existing projects shown to the model as style examples.
const MAX_STYLE_EXAMPLES: usize = 5;

#[derive(Debug, Deserialize)]
struct FormattedProject {
    title: String,
    year: f64,
    subtitle: String,
    description: Vec<String>,
}

fn formatted_project_schema() -> Schema {
    Schema::object([
        ("title", Schema::string()),
        ("year", Schema::number()),
        ("subtitle", Schema::string()),
        ("description", Schema::array(Schema::string())),
    ])
}

/// Formats `raw_text` into a project draft styled after `existing`.
pub async fn format_project(
    generator: &GenerationClient,
    raw_text: &str,
    existing: &[Project],
) -> Result<NewProject, GenerationError> {
    let examples = if existing.is_empty() {
        NO_EXAMPLES.to_string()
    } else {
        format_projects(&existing[..existing.len().min(MAX_STYLE_EXAMPLES)])
    };
    let prompt = FORMAT_PROJECT_PROMPT_TEMPLATE
        .replace("{examples}", &examples)
        .replace("{raw_text}", raw_text.trim());
    let system = format!("{FORMAT_PROJECT_SYSTEM} {JSON_ONLY_INSTRUCTION}");

    let formatted: FormattedProject = generator
        .call_json(
            "format_project",
            &system,
            &Prompt::text(prompt),
            &formatted_project_schema(),
        )
        .await?;

    if formatted.title.trim().is_empty() {
        return Err(GenerationError::SchemaViolation(
            "formatted project has an empty title".to_string(),
        ));
    }

    let draft = NewProject {
        title: formatted.title.trim().to_string(),
        year: formatted.year.round() as i32,
        subtitle: formatted.subtitle.trim().to_string(),
        description: clean_bullets(formatted.description),
    };
    info!("Formatted project draft '{}'", draft.title);
    Ok(draft)
}
