//! crates/quillwright_core/src/text.rs
//!
//! Plain-text helpers shared by word counting and export: HTML stripping,
//! word counts, reading time and greedy line wrapping.

/// Average silent reading speed used for `reading_time`.
pub const WORDS_PER_MINUTE: u64 = 200;

const BLOCK_TAGS: &[&str] = &[
    "p", "br", "div", "li", "h1", "h2", "h3", "h4", "h5", "h6", "blockquote", "tr",
];

/// Removes HTML markup from chapter content, keeping paragraph breaks.
///
/// Block-level tags become newlines, the common entities are decoded and runs
/// of blank lines collapse to a single empty line.
pub fn strip_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(c) = chars.next() {
        // A bare '<' in prose ("x < y") is text, not the start of a tag.
        let opens_tag = c == '<'
            && chars
                .peek()
                .is_some_and(|&n| n.is_ascii_alphabetic() || n == '/' || n == '!');
        if opens_tag {
            let mut tag = String::new();
            for t in chars.by_ref() {
                if t == '>' {
                    break;
                }
                tag.push(t);
            }
            let name = tag
                .trim_start_matches('/')
                .split(|ch: char| ch.is_whitespace() || ch == '/')
                .next()
                .unwrap_or("")
                .to_ascii_lowercase();
            if BLOCK_TAGS.contains(&name.as_str()) {
                out.push('\n');
            }
        } else {
            out.push(c);
        }
    }

    let decoded = decode_entities(&out);

    let mut lines: Vec<String> = Vec::new();
    for line in decoded.lines() {
        let collapsed = line.split_whitespace().collect::<Vec<_>>().join(" ");
        if collapsed.is_empty() {
            if lines.last().is_some_and(|l| !l.is_empty()) {
                lines.push(String::new());
            }
        } else {
            lines.push(collapsed);
        }
    }
    while lines.last().is_some_and(|l| l.is_empty()) {
        lines.pop();
    }
    lines.join("\n")
}

fn decode_entities(s: &str) -> String {
    s.replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&apos;", "'")
        // Last, so "&amp;lt;" decodes to "&lt;" and not "<".
        .replace("&amp;", "&")
}

/// Splits cleaned text into paragraphs (non-empty lines).
pub fn paragraphs(clean: &str) -> Vec<String> {
    clean
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect()
}

/// Turns plain text into `<p>` paragraphs, escaping markup characters.
pub fn to_html_paragraphs(plain: &str) -> String {
    paragraphs(plain)
        .into_iter()
        .map(|p| {
            let escaped = p
                .replace('&', "&amp;")
                .replace('<', "&lt;")
                .replace('>', "&gt;");
            format!("<p>{escaped}</p>")
        })
        .collect()
}

/// Counts whitespace-separated words in HTML content.
pub fn count_words(html: &str) -> u64 {
    strip_html(html).split_whitespace().count() as u64
}

/// Minutes to read `words`, rounded up.
pub fn reading_time_minutes(words: u64) -> u32 {
    words.div_ceil(WORDS_PER_MINUTE) as u32
}

/// Greedy word wrap: each line takes as many words as fit in `max_width`
/// according to `measure`. A word wider than the line sits on its own line.
pub fn wrap_lines<F>(text: &str, max_width: f32, measure: F) -> Vec<String>
where
    F: Fn(&str) -> f32,
{
    let mut lines = Vec::new();
    let mut current = String::new();

    for word in text.split_whitespace() {
        if current.is_empty() {
            current.push_str(word);
            continue;
        }
        let candidate = format!("{current} {word}");
        if measure(&candidate) <= max_width {
            current = candidate;
        } else {
            lines.push(std::mem::take(&mut current));
            current.push_str(word);
        }
    }
    if !current.is_empty() {
        lines.push(current);
    }
    lines
}

/// Helvetica advance widths in 1/1000 em for printable ASCII (32..=126).
const HELVETICA_WIDTHS: [u16; 95] = [
    278, 278, 355, 556, 556, 889, 667, 191, 333, 333, 389, 584, 278, 333, 278, 278, // ' '../
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, // 0-9
    278, 278, 584, 584, 584, 556, 1015, // :..@
    667, 667, 722, 722, 667, 611, 778, 722, 278, 500, 667, 556, 833, // A-M
    722, 778, 667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, // N-Z
    278, 278, 278, 469, 556, 333, // [..`
    556, 556, 500, 556, 556, 278, 556, 556, 222, 222, 500, 222, 833, // a-m
    556, 556, 556, 556, 333, 500, 278, 556, 500, 722, 500, 500, 500, // n-z
    334, 260, 334, 584, // {..~
];

/// Width of `text` in points when set in Helvetica at `font_size`.
/// Characters outside printable ASCII use the width of 'n'.
pub fn helvetica_width(text: &str, font_size: f32) -> f32 {
    let units: u32 = text
        .chars()
        .map(|c| {
            let code = c as u32;
            if (32..=126).contains(&code) {
                u32::from(HELVETICA_WIDTHS[(code - 32) as usize])
            } else {
                556
            }
        })
        .sum();
    units as f32 * font_size / 1000.0
}

/// Turns a title into a filename-safe slug.
pub fn slugify(title: &str) -> String {
    let mut slug = String::new();
    for c in title.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
        } else if !slug.ends_with('-') && !slug.is_empty() {
            slug.push('-');
        }
    }
    let slug = slug.trim_end_matches('-').to_string();
    if slug.is_empty() {
        "book".to_string()
    } else {
        slug
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strip_html_keeps_paragraphs() {
        let html = "<h1>Title</h1><p>First &amp; <em>second</em>.</p><p></p><p>Third</p>";
        assert_eq!(strip_html(html), "Title\n\nFirst & second.\n\nThird");
    }

    #[test]
    fn strip_html_decodes_nested_entities_once() {
        assert_eq!(strip_html("a &amp;lt; b"), "a &lt; b");
        assert_eq!(strip_html("x&nbsp;y"), "x y");
    }

    #[test]
    fn strip_html_keeps_bare_angle_brackets() {
        let html = "<p>x < y and z > w</p><p>1 <2</p>";
        assert_eq!(strip_html(html), "x < y and z > w\n\n1 <2");
        assert_eq!(count_words("<p>x < y and z > w</p>"), 7);
        assert_eq!(strip_html("<!-- note --><b>bold</b>"), "bold");
    }

    #[test]
    fn plain_text_becomes_escaped_paragraphs() {
        assert_eq!(
            to_html_paragraphs("One <b>\n\n  Two & three  \n"),
            "<p>One &lt;b&gt;</p><p>Two &amp; three</p>"
        );
        assert_eq!(to_html_paragraphs("   "), "");
    }

    #[test]
    fn count_words_ignores_markup() {
        assert_eq!(count_words("<p>one two</p><p>three</p>"), 3);
        assert_eq!(count_words("<br/>"), 0);
        assert_eq!(count_words(""), 0);
    }

    #[test]
    fn reading_time_rounds_up() {
        assert_eq!(reading_time_minutes(0), 0);
        assert_eq!(reading_time_minutes(1), 1);
        assert_eq!(reading_time_minutes(200), 1);
        assert_eq!(reading_time_minutes(201), 2);
    }

    #[test]
    fn wrap_is_greedy() {
        let measure = |s: &str| s.len() as f32;
        let lines = wrap_lines("aa bb cc dd", 5.0, measure);
        assert_eq!(lines, vec!["aa bb", "cc dd"]);
    }

    #[test]
    fn wrap_puts_long_word_alone() {
        let measure = |s: &str| s.len() as f32;
        let lines = wrap_lines("a extraordinarily b", 5.0, measure);
        assert_eq!(lines, vec!["a", "extraordinarily", "b"]);
    }

    #[test]
    fn helvetica_measures_known_glyphs() {
        // 'l' is 222 units, 'W' is 944 units.
        assert!((helvetica_width("l", 10.0) - 2.22).abs() < 1e-4);
        assert!((helvetica_width("W", 10.0) - 9.44).abs() < 1e-4);
    }

    #[test]
    fn slugify_titles() {
        assert_eq!(slugify("The Long Night: Part II"), "the-long-night-part-ii");
        assert_eq!(slugify("???"), "book");
    }
}
