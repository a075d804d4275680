//! Plain-text project import and skill-name normalization.

use std::collections::HashSet;

use chrono::{Datelike, Utc};

use crate::models::profile::NewProject;

/// Parses blank-line separated project blocks.
///
/// ```text
/// FRAUD DETECTION 2023
/// Predictive modeling for card payments
/// - Trained gradient boosted models
/// * Cut false positives by 30%
/// ```
///
/// The first line is the title, optionally ending in a four-digit year (the
/// current year otherwise). A second line that is not a bullet is the subtitle.
/// Blocks without a title are skipped.
pub fn parse_project_blocks(text: &str) -> Vec<NewProject> {
    let current_year = Utc::now().year();
    split_blocks(text)
        .into_iter()
        .filter_map(|block| parse_block(&block, current_year))
        .collect()
}

fn split_blocks(text: &str) -> Vec<Vec<&str>> {
    let mut blocks = Vec::new();
    let mut current = Vec::new();
    for line in text.lines() {
        if line.trim().is_empty() {
            if !current.is_empty() {
                blocks.push(std::mem::take(&mut current));
            }
        } else {
            current.push(line.trim());
        }
    }
    if !current.is_empty() {
        blocks.push(current);
    }
    blocks
}

fn parse_block(lines: &[&str], current_year: i32) -> Option<NewProject> {
    let (first, mut rest) = lines.split_first()?;
    let (title, year) = split_title_year(first, current_year);
    if title.is_empty() {
        return None;
    }

    let mut subtitle = String::new();
    if let Some((line, tail)) = rest.split_first() {
        if !is_bullet(line) {
            subtitle = line.to_string();
            rest = tail;
        }
    }

    let description = rest
        .iter()
        .map(|line| strip_bullet(line))
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect();

    Some(NewProject {
        title,
        year,
        subtitle,
        description,
    })
}

/// "TITLE 2023" → ("TITLE", 2023). The year must be separated by whitespace.
fn split_title_year(line: &str, current_year: i32) -> (String, i32) {
    if let Some((head, tail)) = line.rsplit_once(char::is_whitespace) {
        if tail.len() == 4 && tail.chars().all(|c| c.is_ascii_digit()) {
            if let Ok(year) = tail.parse() {
                return (head.trim().to_string(), year);
            }
        }
    }
    (line.trim().to_string(), current_year)
}

fn is_bullet(line: &str) -> bool {
    line.starts_with('-') || line.starts_with('*')
}

fn strip_bullet(line: &str) -> &str {
    line.strip_prefix('-')
        .or_else(|| line.strip_prefix('*'))
        .unwrap_or(line)
        .trim()
}

/// Trims names, drops blanks, and removes case-insensitive duplicates
/// keeping the first spelling.
pub fn normalize_skill_names(names: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    names
        .into_iter()
        .map(|n| n.trim().to_string())
        .filter(|n| !n.is_empty())
        .filter(|n| seen.insert(n.to_lowercase()))
        .collect()
}

/// Appends comma-separated `input` to `existing`, skipping names already present.
pub fn merge_skill_names(existing: &[String], input: &str) -> Vec<String> {
    let combined = existing
        .iter()
        .cloned()
        .chain(input.split(',').map(str::to_string))
        .collect();
    normalize_skill_names(combined)
}
