#![allow(dead_code)]

use std::sync::Arc;

use scripture_typeset::backend::{Typesetter, WrappedLine};
use scripture_typeset::markup;
use scripture_typeset::model::{Corpus, FootnoteEntry, LineUnit, Provenance};
use scripture_typeset::settings::{PageSettings, ParagraphStyle, StyleName, StyleSheet};

/// Monospaced metrics: every character is `char_width` wide and every
/// line `line_height` tall, with no paragraph spacing.
pub struct FixedBackend {
    pub char_width: f32,
    pub line_height: f32,
    styles: StyleSheet,
}

impl FixedBackend {
    pub fn new(char_width: f32, line_height: f32) -> Self {
        FixedBackend {
            char_width,
            line_height,
            styles: StyleSheet::default(),
        }
    }
}

impl Default for FixedBackend {
    fn default() -> Self {
        FixedBackend::new(5.0, 10.0)
    }
}

impl Typesetter for FixedBackend {
    fn style(&self, name: StyleName) -> ParagraphStyle {
        let mut style = *self.styles.get(name);
        style.leading = self.line_height;
        style.space_before = 0.0;
        style.space_after = 0.0;
        style.first_line_indent = 0.0;
        style
    }

    fn wrap(&self, markup: &str, _style: StyleName, width: f32) -> Vec<WrappedLine> {
        let plain = markup::strip_tags(markup).replace(markup::HAIR_SPACE, "");
        let mut lines: Vec<String> = Vec::new();
        let mut current = String::new();
        for word in plain.split_whitespace() {
            let candidate = if current.is_empty() {
                word.to_string()
            } else {
                format!("{current} {word}")
            };
            if !current.is_empty() && self.width_of(&candidate) > width {
                lines.push(std::mem::replace(&mut current, word.to_string()));
            } else {
                current = candidate;
            }
        }
        if !current.is_empty() || lines.is_empty() {
            lines.push(current);
        }
        // a paragraph that fits on one line keeps its inline markup
        if let [only] = lines.as_slice() {
            return vec![WrappedLine {
                width: self.width_of(only),
                markup: markup.to_string(),
                fragments: Vec::new(),
            }];
        }
        lines
            .into_iter()
            .map(|text| WrappedLine {
                width: self.width_of(&text),
                markup: markup::escape(&text),
                fragments: Vec::new(),
            })
            .collect()
    }

    fn text_width(&self, text: &str, _style: StyleName) -> f32 {
        self.width_of(text)
    }
}

impl FixedBackend {
    fn width_of(&self, text: &str) -> f32 {
        text.chars().count() as f32 * self.char_width
    }
}

/// Settings whose body is exactly `body` points tall, with no buffers.
pub fn settings_with_body(body: f32) -> PageSettings {
    let base = PageSettings::default();
    PageSettings {
        page_height: body + base.margin_top + base.margin_bottom,
        ..base
    }
}

pub fn provenance(book: &str, chapter: &str) -> Arc<Provenance> {
    Arc::new(Provenance {
        standard_work: "test-work".to_string(),
        book_slug: book.to_string(),
        book_name: capitalize(book),
        book_abbrev: None,
        chapter: chapter.to_string(),
        chapter_title: format!("{} {chapter}", capitalize(book)),
    })
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// A column unit of the given height with no verse.
pub fn unit(height: f32) -> LineUnit {
    LineUnit {
        height,
        space_before: 0.0,
        space_after: 0.0,
        markup: "text".to_string(),
        fragments: Vec::new(),
        style: StyleName::BodyCont,
        first_line: true,
        source: provenance("gen", "1"),
        verse: None,
        footnotes: Vec::new(),
        full_width: false,
        weight: 1,
        segment_index: 0,
        verse_line_index: 0,
        verse_line_count: 1,
        spacer: false,
    }
}

pub fn full_width_units(count: usize, height: f32) -> Vec<LineUnit> {
    (0..count)
        .map(|_| LineUnit {
            full_width: true,
            ..unit(height)
        })
        .collect()
}

/// First line of verse `verse` in `book` `chapter`, carrying `notes`.
pub fn verse_unit(
    book: &str,
    chapter: &str,
    verse: &str,
    height: f32,
    notes: Vec<Arc<FootnoteEntry>>,
) -> LineUnit {
    LineUnit {
        source: provenance(book, chapter),
        verse: Some(verse.to_string()),
        style: StyleName::Body,
        footnotes: notes,
        ..unit(height)
    }
}

pub fn note(book: &str, chapter: &str, verse: &str, letter: &str, text: &str) -> Arc<FootnoteEntry> {
    Arc::new(FootnoteEntry {
        book_slug: book.to_string(),
        chapter: chapter.to_string(),
        verse: verse.to_string(),
        letter: letter.to_string(),
        text: text.to_string(),
        segments: Vec::new(),
    })
}

/// Every footnote introduced by the verse units of `units`, in order.
pub fn introduced_notes(units: &[LineUnit]) -> Vec<Arc<FootnoteEntry>> {
    scripture_typeset::footnotes::notes_for_units(units)
}

/// A chapter of `verses` short verses with one footnote on every third verse.
pub fn chapter_json(number: usize, verses: usize) -> serde_json::Value {
    let paragraphs: Vec<serde_json::Value> = (1..=verses)
        .map(|v| {
            let marker = if v % 3 == 0 { "<sup>a</sup>" } else { "" };
            serde_json::json!({
                "kind": "verse",
                "verse": v.to_string(),
                "html": format!("And it came to pass{marker} that the people gathered by the river in verse {v}."),
            })
        })
        .collect();
    let footnotes: Vec<serde_json::Value> = (1..=verses)
        .filter(|v| v % 3 == 0)
        .map(|v| {
            serde_json::json!({
                "verse": v.to_string(),
                "letter": "a",
                "text": format!("<a href=\"/study/scriptures/bofm/1-ne/{}?lang=eng\">1 Ne. {}:{v}</a> note text for verse {v}", number % 3 + 1, number),
            })
        })
        .collect();
    serde_json::json!({
        "number": number.to_string(),
        "title": "",
        "paragraphs": paragraphs,
        "footnotes": footnotes,
    })
}

pub fn book_json(slug: &str, name: &str, chapters: usize, verses: usize) -> serde_json::Value {
    serde_json::json!({
        "name": name,
        "slug": slug,
        "chapters": (1..=chapters).map(|c| chapter_json(c, verses)).collect::<Vec<_>>(),
    })
}

/// Two works: one with books `1-ne` and `2-ne`, one with `gen`.
pub fn sample_corpus() -> Corpus {
    let value = serde_json::json!({
        "works": [
            {
                "slug": "book-of-mormon",
                "title": "The Book of Mormon",
                "books": [
                    book_json("1-ne", "1 Nephi", 3, 24),
                    book_json("2-ne", "2 Nephi", 2, 18),
                ],
            },
            {
                "slug": "old-testament",
                "title": "The Old Testament",
                "books": [book_json("gen", "Genesis", 2, 20)],
            },
        ],
        "metadata": {
            "structure": {
                "book-of-mormon": {
                    "books": {
                        "1-ne": { "churchUri": "/scriptures/bofm/1-ne" },
                        "2-ne": { "churchUri": "/scriptures/bofm/2-ne" },
                    }
                }
            }
        }
    });
    serde_json::from_value(value).expect("sample corpus deserializes")
}
