//! The three generation stages.
//!
//! Each stage is a free function over the run inputs: it builds its prompt,
//! makes exactly one generation call, and post-processes the response. Stages
//! never touch run state; a failure comes back as a `StageFailure` for the
//! orchestrator to record.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::llm_client::prompts::{FACTS_ONLY_INSTRUCTION, JSON_ONLY_INSTRUCTION};
use crate::llm_client::{GenerationClient, GenerationError, Prompt, Schema};
use crate::models::profile::WorkExperience;
use crate::models::resume::{ProjectEntry, SkillCategory};
use crate::pipeline::prompts::{
    BULLETS_PROMPT_TEMPLATE, BULLETS_SYSTEM, COVER_LETTER_PROMPT_TEMPLATE, COVER_LETTER_SYSTEM,
    NO_ADDITIONAL_INFO, NO_INSPIRATION, POSTING_IN_IMAGE, SKILLS_PROMPT_TEMPLATE, SKILLS_SYSTEM,
};
use crate::pipeline::state::StageFailure;
use crate::pipeline::RunInputs;

pub const MIN_SKILL_CATEGORIES: usize = 3;
pub const MAX_SKILL_CATEGORIES: usize = 5;

const GENERIC_SUMMARY: &str = "Professional with a track record of delivering impactful results, \
    bringing hands-on experience across the work and projects below.";

/// Builds a prompt from stage text plus the posting screenshot, if any.
fn with_posting(inputs: &RunInputs, text: String) -> Prompt {
    Prompt::text(text).with_images(inputs.request.job_posting_image.clone())
}

fn posting_text(inputs: &RunInputs) -> &str {
    let posting = inputs.request.job_posting.trim();
    if posting.is_empty() {
        POSTING_IN_IMAGE
    } else {
        posting
    }
}

fn to_prompt_json<T: Serialize>(value: &T) -> Result<String, StageFailure> {
    serde_json::to_string_pretty(value)
        .map_err(|e| StageFailure::validation(format!("could not serialize prompt input: {e}")))
}

// ────────────────────────────────────────────────────────────────────────────
// Stage 1: bullets
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct GeneratedWork {
    id: String,
    company: String,
    role: String,
    dates: String,
    bullets: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct GeneratedProject {
    company: String,
    dates: String,
    minor_desc: String,
    bullets: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeneratedBullets {
    work_experience: Vec<GeneratedWork>,
    projects: Vec<GeneratedProject>,
}

fn bullets_schema() -> Schema {
    let bullets = || Schema::array(Schema::string());
    Schema::object([
        (
            "workExperience",
            Schema::array(Schema::object([
                ("id", Schema::string()),
                ("company", Schema::string()),
                ("role", Schema::string()),
                ("dates", Schema::string()),
                ("bullets", bullets()),
            ])),
        ),
        (
            "projects",
            Schema::array(Schema::object([
                ("company", Schema::string()),
                ("dates", Schema::string()),
                ("minor_desc", Schema::string()),
                ("bullets", bullets()),
            ])),
        ),
    ])
}

#[derive(Debug, Clone)]
pub struct BulletsOutput {
    pub work_experience: Vec<WorkExperience>,
    pub projects: Vec<ProjectEntry>,
    pub warnings: Vec<String>,
}

pub async fn optimize_bullets(
    generator: &GenerationClient,
    inputs: &RunInputs,
) -> Result<BulletsOutput, StageFailure> {
    if inputs.work_experiences.is_empty() && inputs.projects.is_empty() {
        return Err(StageFailure::validation(
            "Add at least one work experience or select a project before optimizing",
        ));
    }

    let source_projects: Vec<ProjectEntry> =
        inputs.projects.iter().map(ProjectEntry::from).collect();
    let prompt = BULLETS_PROMPT_TEMPLATE
        .replace("{job_posting}", posting_text(inputs))
        .replace("{work_experience}", &to_prompt_json(&inputs.work_experiences)?)
        .replace("{projects}", &to_prompt_json(&source_projects)?);
    let system = format!("{BULLETS_SYSTEM} {FACTS_ONLY_INSTRUCTION} {JSON_ONLY_INSTRUCTION}");

    let generated: GeneratedBullets = generator
        .call_json(
            "bullets",
            &system,
            &with_posting(inputs, prompt),
            &bullets_schema(),
        )
        .await?;

    let mut warnings = Vec::new();
    let work_experience =
        realign_work(&inputs.work_experiences, generated.work_experience, &mut warnings);
    let projects = realign_projects(&source_projects, generated.projects, &mut warnings);
    for warning in &warnings {
        warn!("bullets: {warning}");
    }

    Ok(BulletsOutput {
        work_experience,
        projects,
        warnings,
    })
}

/// Maps generated entries back onto the source list. Matching is by id first,
/// then by position. Identity fields always come from the source; only
/// non-empty generated bullets are taken.
fn realign_work(
    source: &[WorkExperience],
    generated: Vec<GeneratedWork>,
    warnings: &mut Vec<String>,
) -> Vec<WorkExperience> {
    if generated.len() != source.len() {
        warnings.push(format!(
            "expected {} work experience entries, model returned {}",
            source.len(),
            generated.len()
        ));
    }

    let source_ids: HashSet<&str> = source.iter().map(|w| w.id.as_str()).collect();
    let mut used = vec![false; generated.len()];
    let mut matches: Vec<Option<usize>> = source
        .iter()
        .map(|s| {
            let index = (0..generated.len()).find(|&j| !used[j] && generated[j].id == s.id)?;
            used[index] = true;
            Some(index)
        })
        .collect();

    for (i, slot) in matches.iter_mut().enumerate() {
        if slot.is_none() && i < generated.len() && !used[i] {
            used[i] = true;
            *slot = Some(i);
        }
    }

    for (g, was_used) in generated.iter().zip(&used) {
        if !was_used && !source_ids.contains(g.id.as_str()) {
            warnings.push(format!(
                "model returned unknown work experience '{}' ({}); ignored",
                g.id, g.company
            ));
        }
    }

    source
        .iter()
        .zip(matches)
        .map(|(s, m)| {
            let Some(g) = m.map(|i| &generated[i]) else {
                warnings.push(format!(
                    "no optimized bullets returned for {} ({}); original bullets kept",
                    s.company, s.role
                ));
                return s.clone();
            };
            for (field, original, returned) in [
                ("company", &s.company, &g.company),
                ("role", &s.role, &g.role),
                ("dates", &s.dates, &g.dates),
            ] {
                if original.trim() != returned.trim() {
                    warnings.push(format!(
                        "model changed {field} of {} from '{original}' to '{returned}'; original kept",
                        s.id
                    ));
                }
            }
            let bullets = clean(&g.bullets);
            if bullets.is_empty() {
                warnings.push(format!(
                    "model returned no bullets for {} ({}); original bullets kept",
                    s.company, s.role
                ));
                return s.clone();
            }
            WorkExperience {
                bullets,
                ..s.clone()
            }
        })
        .collect()
}

fn realign_projects(
    source: &[ProjectEntry],
    generated: Vec<GeneratedProject>,
    warnings: &mut Vec<String>,
) -> Vec<ProjectEntry> {
    if generated.len() != source.len() {
        warnings.push(format!(
            "expected {} projects, model returned {}",
            source.len(),
            generated.len()
        ));
    }

    source
        .iter()
        .enumerate()
        .map(|(i, s)| {
            let Some(g) = generated.get(i) else {
                warnings.push(format!(
                    "no optimized bullets returned for project {}; original kept",
                    s.company
                ));
                return s.clone();
            };
            for (field, original, returned) in [
                ("title", &s.company, &g.company),
                ("year", &s.dates, &g.dates),
            ] {
                if original.trim() != returned.trim() {
                    warnings.push(format!(
                        "model changed {field} of project {i} from '{original}' to '{returned}'; original kept"
                    ));
                }
            }
            let bullets = clean(&g.bullets);
            let minor_desc = g.minor_desc.trim();
            ProjectEntry {
                company: s.company.clone(),
                dates: s.dates.clone(),
                minor_desc: if minor_desc.is_empty() {
                    s.minor_desc.clone()
                } else {
                    minor_desc.to_string()
                },
                bullets: if bullets.is_empty() {
                    s.bullets.clone()
                } else {
                    bullets
                },
            }
        })
        .collect()
}

fn clean(bullets: &[String]) -> Vec<String> {
    bullets
        .iter()
        .map(|b| b.trim().to_string())
        .filter(|b| !b.is_empty())
        .collect()
}

/// Deterministic summary line from the first role. No generation call.
pub fn derive_summary(work_experience: &[WorkExperience]) -> String {
    match work_experience.first().map(|w| w.role.trim()) {
        Some(role) if !role.is_empty() => format!(
            "{role} with a track record of delivering impactful results, \
             bringing hands-on experience across the work and projects below."
        ),
        _ => GENERIC_SUMMARY.to_string(),
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Stage 2: skills
// ────────────────────────────────────────────────────────────────────────────

fn skills_schema() -> Schema {
    Schema::array(Schema::object([
        ("title", Schema::string()),
        ("items", Schema::string()),
    ]))
}

#[derive(Debug, Clone)]
pub struct SkillsOutput {
    pub categories: Vec<SkillCategory>,
    pub warnings: Vec<String>,
}

pub async fn categorize_skills(
    generator: &GenerationClient,
    inputs: &RunInputs,
) -> Result<SkillsOutput, StageFailure> {
    if inputs.skills.is_empty() {
        return Err(StageFailure::validation(
            "Your skill list is empty; add skills before categorizing them",
        ));
    }

    let names = inputs
        .skills
        .iter()
        .map(|s| s.name.as_str())
        .collect::<Vec<_>>()
        .join(", ");
    let prompt = SKILLS_PROMPT_TEMPLATE
        .replace("{job_posting}", posting_text(inputs))
        .replace("{skills}", &names);
    let system = format!("{SKILLS_SYSTEM} {JSON_ONLY_INSTRUCTION}");

    let generated: Vec<SkillCategory> = generator
        .call_json("skills", &system, &with_posting(inputs, prompt), &skills_schema())
        .await?;

    let mut categories: Vec<SkillCategory> = generated
        .into_iter()
        .map(|c| SkillCategory {
            title: c.title.trim().trim_end_matches(':').trim().to_string(),
            items: c.items.trim().to_string(),
        })
        .filter(|c| !c.title.is_empty() && !c.items.is_empty())
        .collect();

    if categories.is_empty() {
        return Err(StageFailure::from(GenerationError::SchemaViolation(
            "model returned no usable skill categories".to_string(),
        )));
    }

    let mut warnings = Vec::new();
    if categories.len() > MAX_SKILL_CATEGORIES {
        warnings.push(format!(
            "model returned {} skill categories; kept the first {MAX_SKILL_CATEGORIES}",
            categories.len()
        ));
        categories.truncate(MAX_SKILL_CATEGORIES);
    } else if categories.len() < MIN_SKILL_CATEGORIES {
        warnings.push(format!(
            "model returned only {} skill categories; expected at least {MIN_SKILL_CATEGORIES}",
            categories.len()
        ));
    }
    for warning in &warnings {
        warn!("skills: {warning}");
    }

    Ok(SkillsOutput {
        categories,
        warnings,
    })
}

// ────────────────────────────────────────────────────────────────────────────
// Stage 3: cover letter
// ────────────────────────────────────────────────────────────────────────────

fn describe_work(work: &[WorkExperience]) -> String {
    work.iter()
        .map(|w| {
            let bullets = w
                .bullets
                .iter()
                .map(|b| format!("- {b}"))
                .collect::<Vec<_>>()
                .join("\n");
            format!("### {} at {} ({})\n{bullets}", w.role, w.company, w.dates)
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn describe_projects(projects: &[ProjectEntry]) -> String {
    projects
        .iter()
        .map(|p| {
            let bullets = p
                .bullets
                .iter()
                .map(|b| format!("- {b}"))
                .collect::<Vec<_>>()
                .join("\n");
            format!("### {} ({})\n{}\n{bullets}", p.company, p.dates, p.minor_desc)
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn or_placeholder<'a>(text: Option<&'a str>, placeholder: &'a str) -> &'a str {
    match text.map(str::trim) {
        Some(t) if !t.is_empty() => t,
        _ => placeholder,
    }
}

/// Writes the letter from the tailored (stage 1) entries.
pub async fn write_cover_letter(
    generator: &GenerationClient,
    inputs: &RunInputs,
    work_experience: &[WorkExperience],
    projects: &[ProjectEntry],
) -> Result<String, StageFailure> {
    let request = &inputs.request;
    let prompt = COVER_LETTER_PROMPT_TEMPLATE
        .replace("{company_name}", request.company_name.trim())
        .replace("{job_title}", request.job_title.trim())
        .replace("{job_posting}", posting_text(inputs))
        .replace("{work_experience}", &describe_work(work_experience))
        .replace("{projects}", &describe_projects(projects))
        .replace(
            "{inspiration}",
            or_placeholder(inputs.inspiration.as_deref(), NO_INSPIRATION),
        )
        .replace(
            "{additional_info}",
            or_placeholder(Some(request.additional_info.as_str()), NO_ADDITIONAL_INFO),
        );
    let system = format!("{COVER_LETTER_SYSTEM} {FACTS_ONLY_INSTRUCTION}");

    let letter = generator
        .call_text("cover_letter", &system, &with_posting(inputs, prompt))
        .await?;
    Ok(letter)
}
