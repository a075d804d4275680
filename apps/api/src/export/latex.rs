//! LaTeX source for a resume, same section order as the Markdown export.

use crate::export::markdown::flatten;
use crate::models::resume::ResumeStructure;

const PREAMBLE: &str = r"\documentclass[a4paper,10pt]{article}
\usepackage[margin=1cm]{geometry}
\usepackage{enumitem}
\usepackage{titlesec}
\usepackage{hyperref}

\pagenumbering{gobble}
\titleformat{\section}{\large\bfseries}{}{0em}{}[\titlerule]

\newcommand{\entry}[4]{%
  \textbf{#1} \hfill \textit{#2}\\
  \textit{#3}\\[-2pt]
  \begin{itemize}[leftmargin=1em, noitemsep, topsep=0pt]
    #4
  \end{itemize}
}
";

/// Escapes LaTeX special characters in one pass and flattens control characters.
pub fn escape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in flatten(value).chars() {
        match c {
            '\\' => out.push_str(r"\textbackslash{}"),
            '~' => out.push_str(r"\textasciitilde{}"),
            '^' => out.push_str(r"\textasciicircum{}"),
            '&' | '%' | '$' | '#' | '_' | '{' | '}' => {
                out.push('\\');
                out.push(c);
            }
            _ => out.push(c),
        }
    }
    out
}

fn items(bullets: &[String]) -> String {
    if bullets.is_empty() {
        // itemize refuses to be empty
        return r"\item[] {}".to_string();
    }
    bullets
        .iter()
        .map(|b| format!(r"\item {}", escape(b)))
        .collect::<Vec<_>>()
        .join("\n    ")
}

fn entry(title: &str, dates: &str, subtitle: &str, bullets: &[String]) -> String {
    format!(
        "\\entry\n  {{{}}}\n  {{{}}}\n  {{{}}}\n  {{\n    {}\n  }}\n",
        escape(title),
        escape(dates),
        escape(subtitle),
        items(bullets)
    )
}

pub fn render_latex(name: &str, resume: &ResumeStructure) -> String {
    let links = &resume.links;
    let education = &resume.education;
    let mut tex = String::from(PREAMBLE);

    tex.push_str("\n\\begin{document}\n\n");
    tex.push_str(&format!("{{\\LARGE \\textbf{{{}}}}}\\\\[3pt]\n", escape(name)));
    let contact: Vec<String> = [
        &links.email,
        &links.phone,
        &links.portfolio,
        &links.github,
        &links.linkedin,
    ]
    .into_iter()
    .map(|v| escape(v))
    .filter(|v| !v.is_empty())
    .collect();
    tex.push_str(&contact.join(" \\quad | \\quad "));
    tex.push_str("\\\\[6pt]\n\n");

    tex.push_str("\\section*{Professional Summary}\n");
    tex.push_str(&escape(&resume.summary));
    tex.push_str("\n\n");

    tex.push_str("\\section*{Education}\n");
    tex.push_str(&format!(
        "\\textbf{{{}}} \\hfill \\textit{{{}}}\\\\\n{}\\\\\n",
        escape(&education.institution),
        escape(&education.dates),
        escape(&education.degree)
    ));
    for detail in &education.details {
        tex.push_str(&format!("\\textbullet{{}} {}\\\\\n", escape(detail)));
    }
    tex.push('\n');

    tex.push_str("\\section*{Work Experience}\n");
    for exp in &resume.work_experience {
        tex.push_str(&entry(&exp.company, &exp.dates, &exp.role, &exp.bullets));
    }
    tex.push('\n');

    tex.push_str("\\section*{Notable Projects}\n");
    for proj in &resume.projects {
        tex.push_str(&entry(&proj.company, &proj.dates, &proj.minor_desc, &proj.bullets));
    }
    tex.push('\n');

    tex.push_str("\\section*{Technical Skills}\n");
    for skill in &resume.skills {
        tex.push_str(&format!(
            "\\textbf{{{}:}} {}\\\\\n",
            escape(&skill.title),
            escape(&skill.items)
        ));
    }

    tex.push_str("\n\\end{document}\n");
    tex
}
