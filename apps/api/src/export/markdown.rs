//! Markdown rendering of a finished resume.
//!
//! Layout is fixed: a `# name` title, then exactly six `##` sections in order.
//! Field values are flattened to one line so no value can open a new heading
//! or bullet.

use std::fmt::Write;

use crate::models::resume::ResumeStructure;

pub const SECTION_ORDER: [&str; 6] = [
    "Contact",
    "Professional Summary",
    "Education",
    "Work Experience",
    "Notable Projects",
    "Technical Skills",
];

/// Replaces every control character (newline, tab, CR, ...) with a space
/// and collapses runs of whitespace.
pub fn flatten(value: &str) -> String {
    value
        .chars()
        .map(|c| if c.is_control() { ' ' } else { c })
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn render_markdown(name: &str, resume: &ResumeStructure) -> String {
    let mut md = String::new();
    let links = &resume.links;
    let education = &resume.education;

    // Writing into a String cannot fail.
    let _ = writeln!(md, "# {}\n", flatten(name));

    let _ = writeln!(md, "## {}\n", SECTION_ORDER[0]);
    let contact = [
        ("Email", &links.email),
        ("Phone", &links.phone),
        ("Portfolio", &links.portfolio),
        ("GitHub", &links.github),
        ("LinkedIn", &links.linkedin),
    ];
    for (label, value) in contact {
        let value = flatten(value);
        if !value.is_empty() {
            let _ = writeln!(md, "- **{label}:** {value}");
        }
    }
    md.push('\n');

    let _ = writeln!(md, "## {}\n", SECTION_ORDER[1]);
    let _ = writeln!(md, "{}\n", flatten(&resume.summary));

    let _ = writeln!(md, "## {}\n", SECTION_ORDER[2]);
    let _ = writeln!(
        md,
        "**{}** - {}\n",
        flatten(&education.institution),
        flatten(&education.dates)
    );
    let _ = writeln!(md, "{}\n", flatten(&education.degree));
    push_bullets(&mut md, &education.details);

    let _ = writeln!(md, "## {}\n", SECTION_ORDER[3]);
    for exp in &resume.work_experience {
        let _ = writeln!(md, "### {} - {}\n", flatten(&exp.company), flatten(&exp.dates));
        let _ = writeln!(md, "*{}*\n", flatten(&exp.role));
        push_bullets(&mut md, &exp.bullets);
    }

    let _ = writeln!(md, "## {}\n", SECTION_ORDER[4]);
    for proj in &resume.projects {
        let _ = writeln!(md, "### {} - {}\n", flatten(&proj.company), flatten(&proj.dates));
        let minor_desc = flatten(&proj.minor_desc);
        if !minor_desc.is_empty() {
            let _ = writeln!(md, "*{minor_desc}*\n");
        }
        push_bullets(&mut md, &proj.bullets);
    }

    let _ = writeln!(md, "## {}\n", SECTION_ORDER[5]);
    for skill in &resume.skills {
        let _ = writeln!(md, "**{}:** {}\n", flatten(&skill.title), flatten(&skill.items));
    }

    md.trim_end().to_string() + "\n"
}

fn push_bullets(md: &mut String, bullets: &[String]) {
    if bullets.is_empty() {
        return;
    }
    for bullet in bullets {
        let _ = writeln!(md, "- {}", flatten(bullet));
    }
    md.push('\n');
}
