//! Export Adapter: Markdown, LaTeX and Word renderings of a resume, plus the
//! client for the external PDF renderer. No generation calls happen here.

pub mod docx;
pub mod handlers;
pub mod latex;
pub mod markdown;
pub mod render;

pub use render::{RenderClient, RenderError};

use crate::errors::AppError;

impl From<RenderError> for AppError {
    fn from(e: RenderError) -> Self {
        AppError::Render(e.to_string())
    }
}
