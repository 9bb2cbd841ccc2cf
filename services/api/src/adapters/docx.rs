//! services/api/src/adapters/docx.rs
//!
//! Word export with docx-rs: title page, contents list, one section per
//! chapter separated by page breaks.

use std::io::Cursor;

use docx_rs::{AlignmentType, BreakType, Docx, Paragraph, Run};
use quillwright_core::export::ExportDocument;
use quillwright_core::ports::{DocumentRenderer, PortError, PortResult};

#[derive(Debug, Clone, Copy, Default)]
pub struct DocxRenderer;

/// docx-rs sizes are in half-points.
fn half_points(pt: f32) -> usize {
    (pt * 2.0).round() as usize
}

fn text_paragraph(text: &str, size_pt: f32, bold: bool) -> Paragraph {
    let mut run = Run::new().add_text(text).size(half_points(size_pt));
    if bold {
        run = run.bold();
    }
    Paragraph::new().add_run(run)
}

fn page_break() -> Paragraph {
    Paragraph::new().add_run(Run::new().add_break(BreakType::Page))
}

impl DocumentRenderer for DocxRenderer {
    fn render(&self, document: &ExportDocument) -> PortResult<Vec<u8>> {
        let body = f32::from(document.options.clamped_font_size());
        let mut docx = Docx::new();
        let mut needs_break = false;

        if document.options.include_cover {
            docx = docx.add_paragraph(
                text_paragraph(&document.title, body * 2.5, true).align(AlignmentType::Center),
            );
            if !document.subtitle.is_empty() {
                docx = docx.add_paragraph(
                    text_paragraph(&document.subtitle, body * 1.5, false)
                        .align(AlignmentType::Center),
                );
            }
            docx = docx.add_paragraph(
                text_paragraph(&format!("by {}", document.author), body * 1.2, false)
                    .align(AlignmentType::Center),
            );
            for line in document.description.lines().filter(|l| !l.trim().is_empty()) {
                docx = docx.add_paragraph(text_paragraph(line, body, false));
            }
            needs_break = true;
        }

        if document.options.include_toc {
            if needs_break {
                docx = docx.add_paragraph(page_break());
            }
            docx = docx.add_paragraph(text_paragraph("Table of Contents", body * 1.6, true));
            for heading in document.headings() {
                docx = docx.add_paragraph(text_paragraph(&heading, body, false));
            }
            needs_break = true;
        }

        let numbered = document.options.include_chapter_numbers;
        for chapter in &document.chapters {
            if needs_break {
                docx = docx.add_paragraph(page_break());
            }
            docx = docx.add_paragraph(text_paragraph(&chapter.heading(numbered), body * 1.5, true));
            for para in &chapter.paragraphs {
                docx = docx.add_paragraph(text_paragraph(para, body, false));
            }
            needs_break = true;
        }

        let mut out = Cursor::new(Vec::new());
        docx.build()
            .pack(&mut out)
            .map_err(|e| PortError::Unexpected(format!("DOCX packaging failed: {e}")))?;
        Ok(out.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quillwright_core::export::{ExportChapter, ExportOptions};

    #[test]
    fn renders_a_zip_package() {
        let doc = ExportDocument {
            title: "Harbor Lights".to_string(),
            subtitle: "A Novel".to_string(),
            author: "Ann Writer".to_string(),
            description: String::new(),
            chapters: vec![ExportChapter {
                number: 1,
                title: "Arrival".to_string(),
                paragraphs: vec!["The ferry docked at dawn.".to_string()],
            }],
            options: ExportOptions::default(),
        };
        let bytes = DocxRenderer.render(&doc).unwrap();
        // DOCX files are zip archives.
        assert!(bytes.starts_with(b"PK"));
    }

    #[test]
    fn font_size_is_in_half_points() {
        assert_eq!(half_points(12.0), 24);
        assert_eq!(half_points(10.5), 21);
    }
}
