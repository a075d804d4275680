// Shared prompt fragments.
// Each module that makes generation calls defines its own prompts.rs alongside it.

use crate::models::profile::Project;

/// Appended to every schema-typed system instruction.
pub const JSON_ONLY_INSTRUCTION: &str = "\
    You MUST respond with valid JSON only, matching the requested schema exactly. \
    Do NOT include any text outside the JSON value. \
    Do NOT use markdown code fences.";

/// Appended to every instruction that rewrites the applicant's own material.
pub const FACTS_ONLY_INSTRUCTION: &str = "\
    CRITICAL: Use only facts present in the applicant's material. \
    Do NOT invent employers, titles, dates, metrics, or technologies.";

/// Renders projects the way every prompt shows them to the model.
pub fn format_projects(projects: &[Project]) -> String {
    projects
        .iter()
        .map(|p| {
            let bullets = p
                .description
                .iter()
                .map(|d| format!("- {d}"))
                .collect::<Vec<_>>()
                .join("\n");
            format!("### {} - {}\n**{}**\n{bullets}", p.title, p.year, p.subtitle)
        })
        .collect::<Vec<_>>()
        .join("\n---\n")
}
