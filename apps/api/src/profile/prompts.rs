// Prompt constants for AI-assisted project formatting.

/// System prompt for turning free text into a project record.
pub const FORMAT_PROJECT_SYSTEM: &str = "\
    You are a helpful assistant that formats project descriptions for a resume. \
    The user provides a raw text description of a new project and their existing \
    projects as style examples. Parse the raw text into a single project with: \
    title (usually ALL CAPS), year (the year the project was completed), \
    subtitle (a brief descriptive line), and description (bullet points covering \
    the details and achievements). Match the tone, phrasing, and level of detail \
    of the examples.";

/// Replace `{examples}` and `{raw_text}` before sending.
pub const FORMAT_PROJECT_PROMPT_TEMPLATE: &str = r#"## Style Examples (Existing Projects)
```
{examples}
```

## New Project (Raw Text)
```
{raw_text}
```

Parse the new project raw text and return it as a single JSON object matching the style of the examples."#;

/// Shown in place of examples when the user has no projects yet.
pub const NO_EXAMPLES: &str = "No existing projects. Use a concise, impact-focused resume style.";
