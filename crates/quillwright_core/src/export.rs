//! crates/quillwright_core/src/export.rs
//!
//! Format-independent export model. A `Book` is cleaned into an
//! `ExportDocument` once; each renderer only lays it out.

use std::fmt::Write as _;
use std::str::FromStr;

use serde::Deserialize;

use crate::domain::Book;
use crate::text;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Pdf,
    Docx,
    Txt,
}

impl ExportFormat {
    pub fn extension(self) -> &'static str {
        match self {
            Self::Pdf => "pdf",
            Self::Docx => "docx",
            Self::Txt => "txt",
        }
    }

    pub fn content_type(self) -> &'static str {
        match self {
            Self::Pdf => "application/pdf",
            Self::Docx => {
                "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
            }
            Self::Txt => "text/plain; charset=utf-8",
        }
    }
}

impl FromStr for ExportFormat {
    type Err = ExportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pdf" => Ok(Self::Pdf),
            "docx" => Ok(Self::Docx),
            "txt" | "text" => Ok(Self::Txt),
            other => Err(ExportError::UnsupportedFormat(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExportError {
    #[error("Book has no chapters with content to export")]
    NoContent,
    #[error("Unsupported export format: {0}")]
    UnsupportedFormat(String),
}

pub const MIN_FONT_SIZE: u8 = 8;
pub const MAX_FONT_SIZE: u8 = 24;

/// Layout toggles, read from the export query string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ExportOptions {
    pub include_cover: bool,
    pub include_toc: bool,
    pub include_chapter_numbers: bool,
    pub font_size: u8,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            include_cover: true,
            include_toc: true,
            include_chapter_numbers: true,
            font_size: 12,
        }
    }
}

impl ExportOptions {
    pub fn clamped_font_size(&self) -> u8 {
        self.font_size.clamp(MIN_FONT_SIZE, MAX_FONT_SIZE)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportChapter {
    pub number: u32,
    pub title: String,
    pub paragraphs: Vec<String>,
}

impl ExportChapter {
    /// "Chapter 3: Title" or just the title, depending on options.
    pub fn heading(&self, numbered: bool) -> String {
        if numbered {
            format!("Chapter {}: {}", self.number, self.title)
        } else {
            self.title.clone()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportDocument {
    pub title: String,
    pub subtitle: String,
    pub author: String,
    pub description: String,
    pub chapters: Vec<ExportChapter>,
    pub options: ExportOptions,
}

impl ExportDocument {
    /// Cleans the book for export. Chapters with no text after stripping
    /// markup are skipped and the rest numbered 1..N in reading order.
    pub fn from_book(book: &Book, author: &str, options: ExportOptions) -> Result<Self, ExportError> {
        let chapters: Vec<ExportChapter> = book
            .ordered_chapters()
            .into_iter()
            .filter_map(|c| {
                let paragraphs = text::paragraphs(&text::strip_html(&c.content));
                (!paragraphs.is_empty()).then(|| (c.title.clone(), paragraphs))
            })
            .enumerate()
            .map(|(i, (title, paragraphs))| ExportChapter {
                number: i as u32 + 1,
                title,
                paragraphs,
            })
            .collect();

        if chapters.is_empty() {
            return Err(ExportError::NoContent);
        }

        Ok(Self {
            title: book.title.clone(),
            subtitle: book.subtitle.clone(),
            author: author.to_string(),
            description: text::strip_html(&book.description),
            chapters,
            options,
        })
    }

    pub fn headings(&self) -> Vec<String> {
        self.chapters
            .iter()
            .map(|c| c.heading(self.options.include_chapter_numbers))
            .collect()
    }
}

/// Plain-text rendering.
pub fn render_text(doc: &ExportDocument) -> String {
    let mut out = String::new();
    let rule = "=".repeat(60);

    if doc.options.include_cover {
        let _ = writeln!(out, "{}", doc.title.to_uppercase());
        if !doc.subtitle.is_empty() {
            let _ = writeln!(out, "{}", doc.subtitle);
        }
        let _ = writeln!(out, "\nby {}", doc.author);
        if !doc.description.is_empty() {
            let _ = writeln!(out, "\n{}", doc.description);
        }
        let _ = writeln!(out, "\n{rule}\n");
    }

    if doc.options.include_toc {
        out.push_str("TABLE OF CONTENTS\n\n");
        for heading in doc.headings() {
            let _ = writeln!(out, "  {heading}");
        }
        let _ = writeln!(out, "\n{rule}\n");
    }

    for (i, chapter) in doc.chapters.iter().enumerate() {
        if i > 0 {
            out.push_str("\n\n");
        }
        let heading = chapter.heading(doc.options.include_chapter_numbers);
        let _ = writeln!(out, "{heading}\n{}\n", "-".repeat(heading.chars().count()));
        out.push_str(&chapter.paragraphs.join("\n\n"));
        out.push('\n');
    }
    out
}
