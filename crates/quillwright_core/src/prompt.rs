//! crates/quillwright_core/src/prompt.rs
//!
//! Builds the prompts sent to the text generation service. Output is fully
//! determined by the book, the kind of request and the user's instruction.

use std::fmt::Write as _;

use crate::domain::{Book, Chapter};
use crate::text;

/// How much of the current chapter is quoted back to the model.
pub const CHAPTER_TAIL_CHARS: usize = 2_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenerationKind {
    ContinueChapter,
    RewriteChapter,
    Outline,
    CharacterProfile,
    PlotIdeas,
}

/// A fully assembled request for the model.
#[derive(Debug, Clone, PartialEq)]
pub struct Prompt {
    pub system: String,
    pub user: String,
    pub max_tokens: u32,
    pub temperature: f32,
}

impl GenerationKind {
    fn system_message(self) -> &'static str {
        match self {
            Self::ContinueChapter => "You are a skilled fiction co-writer. Continue the chapter in the author's voice, matching tense, point of view and tone. Return only the new prose, with paragraphs separated by blank lines.",
            Self::RewriteChapter => "You are a careful fiction editor. Rewrite the chapter following the author's instruction while keeping plot events and character names intact. Return only the rewritten prose.",
            Self::Outline => "You are a story structure consultant. Produce a chapter-by-chapter outline for the book as a numbered list, one line per chapter.",
            Self::CharacterProfile => "You are a character development assistant. Write a concise character profile covering appearance, personality, motivation and arc. Return plain prose.",
            Self::PlotIdeas => "You are a plot brainstorming assistant. Suggest plot developments that fit the existing story. Return one idea per line with no numbering.",
        }
    }

    fn max_tokens(self) -> u32 {
        match self {
            Self::ContinueChapter => 1_000,
            Self::RewriteChapter => 2_000,
            Self::Outline => 1_200,
            Self::CharacterProfile => 500,
            Self::PlotIdeas => 600,
        }
    }

    fn temperature(self) -> f32 {
        match self {
            Self::RewriteChapter => 0.5,
            Self::Outline => 0.7,
            Self::ContinueChapter | Self::CharacterProfile => 0.8,
            Self::PlotIdeas => 0.9,
        }
    }
}

/// Renders the book context block shared by every prompt. Empty sections are skipped.
pub fn book_context(book: &Book) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Title: {}", book.title);
    if !book.genre.is_empty() {
        let _ = writeln!(out, "Genre: {}", book.genre);
    }
    if !book.description.is_empty() {
        let _ = writeln!(out, "Description: {}", book.description);
    }
    if !book.characters.is_empty() {
        out.push_str("Characters:\n");
        for c in &book.characters {
            let _ = write!(out, "- {}", c.name);
            if !c.role.is_empty() {
                let _ = write!(out, " ({})", c.role);
            }
            if !c.description.is_empty() {
                let _ = write!(out, ": {}", c.description);
            }
            out.push('\n');
        }
    }
    if !book.settings.is_empty() {
        out.push_str("Settings:\n");
        for s in &book.settings {
            let _ = writeln!(out, "- {}: {}", s.name, s.description);
        }
    }
    if !book.plot_points.is_empty() {
        out.push_str("Plot points:\n");
        let mut points: Vec<_> = book.plot_points.iter().collect();
        points.sort_by_key(|p| p.order);
        for p in points {
            let _ = writeln!(out, "{}. {} {}", p.order, p.title, p.description);
        }
    }
    if !book.outline.trim().is_empty() {
        let _ = writeln!(out, "Outline:\n{}", book.outline.trim());
    }
    out
}

/// The last `max_chars` characters of the chapter's cleaned text.
pub fn chapter_tail(chapter: &Chapter, max_chars: usize) -> String {
    let clean = text::strip_html(&chapter.content);
    let count = clean.chars().count();
    if count <= max_chars {
        return clean;
    }
    clean.chars().skip(count - max_chars).collect()
}

/// Assembles the prompt for `kind`. `chapter` is quoted for chapter-level
/// requests and ignored otherwise.
pub fn build_prompt(
    kind: GenerationKind,
    book: &Book,
    chapter: Option<&Chapter>,
    instruction: &str,
) -> Prompt {
    let mut user = String::from("BOOK CONTEXT:\n");
    user.push_str(&book_context(book));

    if let Some(chapter) = chapter {
        match kind {
            GenerationKind::ContinueChapter => {
                let _ = write!(
                    user,
                    "\nCURRENT CHAPTER ({}. {}), most recent text:\n{}\n",
                    chapter.order,
                    chapter.title,
                    chapter_tail(chapter, CHAPTER_TAIL_CHARS)
                );
            }
            GenerationKind::RewriteChapter => {
                let _ = write!(
                    user,
                    "\nCHAPTER TO REWRITE ({}. {}):\n{}\n",
                    chapter.order,
                    chapter.title,
                    text::strip_html(&chapter.content)
                );
            }
            _ => {}
        }
    }

    let instruction = instruction.trim();
    if !instruction.is_empty() {
        let _ = write!(user, "\nINSTRUCTION:\n{instruction}\n");
    }

    Prompt {
        system: kind.system_message().to_string(),
        user,
        max_tokens: kind.max_tokens(),
        temperature: kind.temperature(),
    }
}
