// Prompt constants for project relevance ranking.

/// System prompt for ranking projects against a posting.
pub const SUGGEST_PROJECTS_SYSTEM: &str = "\
    You are an expert career coach helping job applicants select the most relevant \
    projects for their resume. Analyze the job posting for required and preferred \
    skills, technologies, responsibilities and domain. Then evaluate each project on \
    how well its technologies, responsibilities and demonstrated skills match, and on \
    its impact and complexity. Return a JSON array containing ONLY the IDs of the 3-5 \
    most relevant projects, ordered from most to least relevant.";

/// Replace `{job_posting}` and `{projects}` before sending.
pub const SUGGEST_PROJECTS_PROMPT_TEMPLATE: &str = r#"## Job Posting
```
{job_posting}
```

## Available Projects
{projects}

Return the IDs of the most relevant projects as a JSON array of strings."#;
