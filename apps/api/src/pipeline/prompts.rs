// Prompt constants for the three pipeline stages.
// Reuses cross-cutting fragments from llm_client::prompts.

/// Stage 1: bullet rewriting for work experience and selected projects.
pub const BULLETS_SYSTEM: &str = "\
    You are an expert career coach and professional resume writer. \
    Tailor the applicant's work experience and project bullet points to the job posting. \
    Rewrite each bullet to use the posting's keywords and phrasing and to emphasize impact and results. \
    Return EVERY work experience entry and EVERY project, in the same order you received them. \
    Copy id, company, role and dates for work experience, and company and dates for projects, \
    EXACTLY as given. Only the bullets, and a project's minor_desc, may be rewritten.";

/// Replace `{job_posting}`, `{work_experience}` and `{projects}` before sending.
pub const BULLETS_PROMPT_TEMPLATE: &str = r#"## Job Posting
{job_posting}

## Work Experience (JSON)
{work_experience}

## Selected Projects (JSON)
{projects}

Return a JSON object with "workExperience" and "projects" arrays containing the optimized entries."#;

/// Stage 2: grouping the flat skill set.
pub const SKILLS_SYSTEM: &str = "\
    You are an expert technical recruiter. \
    Group the applicant's skills into 3 to 5 labelled categories, ordered from most to least \
    relevant to the job posting. Put the most relevant skills first within each category. \
    Each category has a short title and an items string of comma-separated skill names. \
    Only use skills from the applicant's list; leave out skills that do not help this application.";

/// Replace `{job_posting}` and `{skills}` before sending.
pub const SKILLS_PROMPT_TEMPLATE: &str = r#"## Job Posting
{job_posting}

## Applicant Skills
{skills}

Return a JSON array of 3 to 5 skill categories."#;

/// Stage 3: the cover letter, as plain prose.
pub const COVER_LETTER_SYSTEM: &str = "\
    You are an expert career coach writing a cover letter for a job applicant. \
    Write a professional cover letter of exactly 3 paragraphs, tailored to the company and role, \
    drawing on the applicant's tailored work experience and projects. \
    If inspiration text is supplied, match its tone but do not copy it. \
    If the applicant shared why they want the role, weave it in naturally. \
    Return plain text only: no markdown, no salutation placeholders, no signature block.";

/// Replace `{company_name}`, `{job_title}`, `{job_posting}`, `{work_experience}`,
/// `{projects}`, `{inspiration}` and `{additional_info}` before sending.
pub const COVER_LETTER_PROMPT_TEMPLATE: &str = r#"## Company
{company_name}

## Role
{job_title}

## Job Posting
{job_posting}

## Tailored Work Experience
{work_experience}

## Tailored Projects
{projects}

## Cover Letter Inspiration
{inspiration}

## Additional Information from the Applicant
{additional_info}"#;

/// Stands in for the posting text when only a screenshot was supplied.
pub const POSTING_IN_IMAGE: &str =
    "The job posting is provided as the attached image. Read it carefully.";

pub const NO_INSPIRATION: &str = "None provided. Write in a warm, confident, professional tone.";

pub const NO_ADDITIONAL_INFO: &str = "None provided.";
