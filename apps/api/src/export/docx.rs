//! Word (.docx) export of the Markdown resume and the cover letter.
//!
//! Only the Markdown the exporter itself produces is understood: `#`/`##`/`###`
//! headings, `- `/`* ` bullets, `**bold**` spans and whole-line `*italic*`.
//! Anything else becomes a plain paragraph.

use std::io::Cursor;

use docx_rs::{
    AbstractNumbering, Docx, IndentLevel, Level, LevelJc, LevelText, LineSpacing, NumberFormat,
    Numbering, NumberingId, Paragraph, Run, Start, Style, StyleType,
};
use thiserror::Error;

use crate::errors::AppError;

pub const DOCX: &str = "application/vnd.openxmlformats-officedocument.wordprocessingml.document";

const BULLET_NUMBERING: usize = 1;

#[derive(Debug, Error)]
#[error("Could not build the Word document: {0}")]
pub struct DocxError(String);

impl From<DocxError> for AppError {
    fn from(e: DocxError) -> Self {
        AppError::Render(e.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Span {
    pub text: String,
    pub bold: bool,
    pub italic: bool,
}

impl Span {
    fn plain(text: &str) -> Self {
        Self {
            text: text.to_string(),
            bold: false,
            italic: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Block {
    Heading { level: u8, text: String },
    Bullet(Vec<Span>),
    Paragraph(Vec<Span>),
    Blank,
}

/// Splits `**bold**` spans out of a line. An unmatched `**` stays literal.
fn spans(line: &str) -> Vec<Span> {
    let pieces: Vec<&str> = line.split("**").collect();
    let last = pieces.len() - 1;
    let mut out = Vec::new();
    for (i, piece) in pieces.iter().enumerate() {
        if piece.is_empty() {
            continue;
        }
        let bold = i % 2 == 1 && i < last;
        let text = if i % 2 == 1 && i == last {
            format!("**{piece}")
        } else {
            piece.to_string()
        };
        out.push(Span {
            text,
            bold,
            italic: false,
        });
    }
    out
}

pub fn parse_blocks(markdown: &str) -> Vec<Block> {
    let mut blocks = Vec::new();
    for line in markdown.lines() {
        let trimmed = line.trim();
        let heading = [("### ", 3), ("## ", 2), ("# ", 1)]
            .into_iter()
            .find_map(|(marker, level)| trimmed.strip_prefix(marker).map(|t| (level, t)));

        let block = if let Some((level, text)) = heading {
            Block::Heading {
                level,
                text: text.trim().to_string(),
            }
        } else if let Some(item) = trimmed
            .strip_prefix("- ")
            .or_else(|| trimmed.strip_prefix("* "))
        {
            Block::Bullet(spans(item))
        } else if trimmed.is_empty() {
            Block::Blank
        } else if trimmed.len() > 2
            && trimmed.starts_with('*')
            && trimmed.ends_with('*')
            && !trimmed.starts_with("**")
        {
            let mut span = Span::plain(&trimmed[1..trimmed.len() - 1]);
            span.italic = true;
            Block::Paragraph(vec![span])
        } else {
            Block::Paragraph(spans(line))
        };
        blocks.push(block);
    }
    blocks
}

fn run(span: &Span) -> Run {
    let mut run = Run::new().add_text(span.text.as_str());
    if span.bold {
        run = run.bold();
    }
    if span.italic {
        run = run.italic();
    }
    run
}

fn paragraph(block: &Block) -> Paragraph {
    match block {
        Block::Heading { level, text } => {
            let (before, after) = match level {
                1 => (0, 200),
                2 => (200, 180),
                _ => (180, 160),
            };
            Paragraph::new()
                .add_run(Run::new().add_text(text.as_str()))
                .style(&format!("Heading{level}"))
                .line_spacing(LineSpacing::new().before(before).after(after))
        }
        Block::Bullet(spans) => spans
            .iter()
            .fold(Paragraph::new(), |p, s| p.add_run(run(s)))
            .numbering(NumberingId::new(BULLET_NUMBERING), IndentLevel::new(0)),
        Block::Paragraph(spans) => spans
            .iter()
            .fold(Paragraph::new(), |p, s| p.add_run(run(s)))
            .line_spacing(LineSpacing::new().after(120)),
        Block::Blank => Paragraph::new(),
    }
}

fn heading_style(level: usize, size: usize) -> Style {
    Style::new(format!("Heading{level}"), StyleType::Paragraph)
        .name(format!("Heading {level}"))
        .size(size)
        .bold()
}

/// Builds a .docx package from exporter Markdown.
pub fn render_docx(markdown: &str) -> Result<Vec<u8>, DocxError> {
    let bullets = AbstractNumbering::new(BULLET_NUMBERING).add_level(Level::new(
        0,
        Start::new(1),
        NumberFormat::new("bullet"),
        LevelText::new("•"),
        LevelJc::new("left"),
    ));

    let docx = parse_blocks(markdown).iter().fold(
        Docx::new()
            .add_style(heading_style(1, 32))
            .add_style(heading_style(2, 28))
            .add_style(heading_style(3, 24))
            .add_abstract_numbering(bullets)
            .add_numbering(Numbering::new(BULLET_NUMBERING, BULLET_NUMBERING)),
        |docx, block| docx.add_paragraph(paragraph(block)),
    );

    let mut buffer = Cursor::new(Vec::new());
    docx.build()
        .pack(&mut buffer)
        .map_err(|e| DocxError(e.to_string()))?;
    Ok(buffer.into_inner())
}
