use std::path::PathBuf;

use anyhow::{Context, Result};

use crate::models::resume::StaticProfile;

/// Application configuration loaded from environment variables.
/// Fails at startup if required variables are missing.
#[derive(Debug, Clone)]
pub struct Config {
    pub gemini_api_key: String,
    pub database_url: String,
    pub upload_dir: PathBuf,
    pub pdf_render_url: String,
    pub static_profile_path: Option<PathBuf>,
    pub port: u16,
    pub rust_log: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        Ok(Config {
            gemini_api_key: require_env("GEMINI_API_KEY")?,
            database_url: env_or("DATABASE_URL", "sqlite://tailor.db?mode=rwc"),
            upload_dir: PathBuf::from(env_or("UPLOAD_DIR", "uploads")),
            pdf_render_url: env_or("PDF_RENDER_URL", "http://localhost:5000")
                .trim_end_matches('/')
                .to_string(),
            static_profile_path: std::env::var("STATIC_PROFILE_PATH")
                .ok()
                .filter(|p| !p.trim().is_empty())
                .map(PathBuf::from),
            port: env_or("PORT", "3001")
                .parse::<u16>()
                .context("PORT must be a valid port number")?,
            rust_log: env_or("RUST_LOG", "info"),
        })
    }

    /// Reads the fixed education/contact block, or the built-in placeholder.
    pub fn load_static_profile(&self) -> Result<StaticProfile> {
        let Some(path) = &self.static_profile_path else {
            return Ok(StaticProfile::default());
        };
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Could not read static profile {}", path.display()))?;
        serde_json::from_str(&raw)
            .with_context(|| format!("Static profile {} is not valid JSON", path.display()))
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .with_context(|| format!("Required environment variable '{key}' is not set"))
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}
