//! services/api/src/adapters/pdf.rs
//!
//! PDF export with printpdf and the built-in Helvetica faces. A4 pages with
//! 20 mm margins; text is wrapped by measured glyph width.

use printpdf::{
    BuiltinFont, IndirectFontRef, Mm, PdfDocument, PdfDocumentReference, PdfLayerReference,
};
use quillwright_core::export::ExportDocument;
use quillwright_core::ports::{DocumentRenderer, PortError, PortResult};
use quillwright_core::text::{helvetica_width, wrap_lines};

const PAGE_WIDTH_MM: f32 = 210.0;
const PAGE_HEIGHT_MM: f32 = 297.0;
const MARGIN_MM: f32 = 20.0;
const PT_TO_MM: f32 = 0.352_778;
const LINE_SPACING: f32 = 1.4;
/// Bold glyphs run wider than the regular width table.
const BOLD_WIDTH_FACTOR: f32 = 1.08;

#[derive(Debug, Clone, Copy, Default)]
pub struct PdfRenderer;

/// Writes lines top to bottom and starts a new page at the bottom margin.
struct PageWriter {
    doc: PdfDocumentReference,
    layer: PdfLayerReference,
    regular: IndirectFontRef,
    bold: IndirectFontRef,
    /// Baseline of the next line, in mm from the page bottom.
    cursor_mm: f32,
    pages: usize,
}

impl PageWriter {
    fn new(title: &str) -> PortResult<Self> {
        let (doc, page, layer) =
            PdfDocument::new(title, Mm(PAGE_WIDTH_MM), Mm(PAGE_HEIGHT_MM), "Layer 1");
        let regular = doc
            .add_builtin_font(BuiltinFont::Helvetica)
            .map_err(|e| PortError::Unexpected(e.to_string()))?;
        let bold = doc
            .add_builtin_font(BuiltinFont::HelveticaBold)
            .map_err(|e| PortError::Unexpected(e.to_string()))?;
        let layer = doc.get_page(page).get_layer(layer);
        Ok(Self {
            doc,
            layer,
            regular,
            bold,
            cursor_mm: PAGE_HEIGHT_MM - MARGIN_MM,
            pages: 1,
        })
    }

    fn text_width_mm() -> f32 {
        PAGE_WIDTH_MM - 2.0 * MARGIN_MM
    }

    fn new_page(&mut self) {
        let (page, layer) = self
            .doc
            .add_page(Mm(PAGE_WIDTH_MM), Mm(PAGE_HEIGHT_MM), "Layer 1");
        self.layer = self.doc.get_page(page).get_layer(layer);
        self.cursor_mm = PAGE_HEIGHT_MM - MARGIN_MM;
        self.pages += 1;
    }

    /// Moves to a fresh page unless nothing has been written on this one yet.
    fn ensure_fresh_page(&mut self) {
        if self.cursor_mm < PAGE_HEIGHT_MM - MARGIN_MM {
            self.new_page();
        }
    }

    fn skip(&mut self, mm: f32) {
        self.cursor_mm -= mm;
    }

    /// Wraps `text` and writes it, breaking pages as needed.
    fn paragraph(&mut self, text: &str, size: f32, bold: bool) {
        let factor = if bold { BOLD_WIDTH_FACTOR } else { 1.0 };
        let max_width_pt = Self::text_width_mm() / PT_TO_MM;
        let line_height_mm = size * LINE_SPACING * PT_TO_MM;

        for line in wrap_lines(text, max_width_pt, |s| helvetica_width(s, size) * factor) {
            if self.cursor_mm - line_height_mm < MARGIN_MM {
                self.new_page();
            }
            self.cursor_mm -= line_height_mm;
            let font = if bold { &self.bold } else { &self.regular };
            self.layer
                .use_text(line, size, Mm(MARGIN_MM), Mm(self.cursor_mm), font);
        }
    }

    fn finish(self) -> PortResult<Vec<u8>> {
        self.doc
            .save_to_bytes()
            .map_err(|e| PortError::Unexpected(format!("PDF serialization failed: {e}")))
    }
}

impl DocumentRenderer for PdfRenderer {
    fn render(&self, document: &ExportDocument) -> PortResult<Vec<u8>> {
        let body = f32::from(document.options.clamped_font_size());
        let mut writer = PageWriter::new(&document.title)?;

        if document.options.include_cover {
            writer.skip(60.0);
            writer.paragraph(&document.title, body * 2.2, true);
            if !document.subtitle.is_empty() {
                writer.skip(4.0);
                writer.paragraph(&document.subtitle, body * 1.4, false);
            }
            writer.skip(12.0);
            writer.paragraph(&format!("by {}", document.author), body * 1.2, false);
            if !document.description.is_empty() {
                writer.skip(16.0);
                for para in document.description.lines().filter(|l| !l.trim().is_empty()) {
                    writer.paragraph(para, body, false);
                }
            }
        }

        if document.options.include_toc {
            writer.ensure_fresh_page();
            writer.paragraph("Table of Contents", body * 1.6, true);
            writer.skip(6.0);
            for heading in document.headings() {
                writer.paragraph(&heading, body, false);
                writer.skip(1.5);
            }
        }

        let numbered = document.options.include_chapter_numbers;
        for chapter in &document.chapters {
            writer.ensure_fresh_page();
            writer.paragraph(&chapter.heading(numbered), body * 1.5, true);
            writer.skip(body * 0.8 * PT_TO_MM * 2.0);
            for para in &chapter.paragraphs {
                writer.paragraph(para, body, false);
                writer.skip(body * 0.6 * PT_TO_MM);
            }
        }

        tracing::debug!(pages = writer.pages, "Rendered PDF");
        writer.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quillwright_core::export::{ExportChapter, ExportOptions};

    fn document(paragraph_count: usize) -> ExportDocument {
        ExportDocument {
            title: "Harbor Lights".to_string(),
            subtitle: String::new(),
            author: "Ann Writer".to_string(),
            description: "A story about a lighthouse.".to_string(),
            chapters: vec![
                ExportChapter {
                    number: 1,
                    title: "Arrival".to_string(),
                    paragraphs: vec!["The ferry docked at dawn. ".repeat(30); paragraph_count],
                },
                ExportChapter {
                    number: 2,
                    title: "Storm".to_string(),
                    paragraphs: vec!["Rain.".to_string()],
                },
            ],
            options: ExportOptions::default(),
        }
    }

    #[test]
    fn renders_a_pdf_file() {
        let bytes = PdfRenderer.render(&document(3)).unwrap();
        assert!(bytes.starts_with(b"%PDF"));
    }

    #[test]
    fn long_chapters_break_pages() {
        let doc = document(40);
        let mut writer = PageWriter::new(&doc.title).unwrap();
        for para in &doc.chapters[0].paragraphs {
            writer.paragraph(para, 12.0, false);
        }
        assert!(writer.pages > 1);
    }
}
