use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::fonts::FontFace;
use crate::settings::StyleName;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Alignment {
    #[default]
    Left,
    Center,
    Right,
    Justify,
}

// ---- Input corpus ----

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Corpus {
    pub works: Vec<StandardWork>,
    #[serde(default)]
    pub metadata: Option<Metadata>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StandardWork {
    pub slug: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub books: Vec<Book>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Book {
    pub name: String,
    pub slug: String,
    #[serde(default)]
    pub abbrev: Option<String>,
    #[serde(default)]
    pub subtitle: Option<String>,
    #[serde(default)]
    pub chapters: Vec<Chapter>,
}

impl Book {
    pub fn chapter(&self, number: &str) -> Option<&Chapter> {
        self.chapters.iter().find(|c| c.number == number)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Chapter {
    pub number: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub paragraphs: Vec<Paragraph>,
    #[serde(default)]
    pub footnotes: Vec<FootnoteEntry>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParagraphKind {
    #[default]
    Verse,
    Summary,
    Intro,
    Heading,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Paragraph {
    #[serde(default)]
    pub kind: ParagraphKind,
    pub html: String,
    #[serde(default)]
    pub verse: Option<String>,
    #[serde(default)]
    pub full_width: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FootnoteEntry {
    #[serde(default)]
    pub book_slug: String,
    #[serde(default)]
    pub chapter: String,
    pub verse: String,
    pub letter: String,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub segments: Vec<String>,
}

impl FootnoteEntry {
    pub fn chapter_key(&self) -> (String, String) {
        (self.book_slug.clone(), self.chapter.clone())
    }

    pub(crate) fn verse_key(&self) -> (&str, &str, &str) {
        (&self.book_slug, &self.chapter, &self.verse)
    }
}

// ---- Corpus metadata (only the parts used for cross-reference links) ----

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Metadata {
    #[serde(default)]
    pub structure: BTreeMap<String, WorkStructure>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct WorkStructure {
    #[serde(default)]
    pub books: BTreeMap<String, BookStructure>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct BookStructure {
    #[serde(rename = "churchUri", default)]
    pub church_uri: Option<String>,
}

// ---- Layout values ----

/// One styled piece of a wrapped line.
#[derive(Clone, Debug, PartialEq)]
pub struct Fragment {
    pub text: String,
    pub face: FontFace,
    pub font_size: f32,
    pub superscript: bool,
    pub href: Option<String>,
    /// Horizontal offset from the line start, in points.
    pub x: f32,
    pub width: f32,
    /// A word space precedes this fragment on its line.
    pub gap_before: bool,
}

/// Where a line unit came from.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Provenance {
    pub standard_work: String,
    pub book_slug: String,
    pub book_name: String,
    pub book_abbrev: Option<String>,
    pub chapter: String,
    pub chapter_title: String,
}

#[derive(Clone, Debug)]
pub struct LineUnit {
    /// Rendered height including paragraph spacing attached to this line.
    pub height: f32,
    pub space_before: f32,
    pub space_after: f32,
    pub markup: String,
    pub fragments: Vec<Fragment>,
    pub style: StyleName,
    pub first_line: bool,
    pub source: Arc<Provenance>,
    pub verse: Option<String>,
    pub footnotes: Vec<Arc<FootnoteEntry>>,
    pub full_width: bool,
    pub weight: u32,
    pub segment_index: usize,
    pub verse_line_index: usize,
    pub verse_line_count: usize,
    /// Empty line produced by a blank segment between breaks.
    pub spacer: bool,
}

impl LineUnit {
    pub fn is_verse(&self) -> bool {
        self.verse.as_deref().is_some_and(is_verse_id)
    }
}

/// `12` or `12a`: digits followed by at most one lowercase letter.
pub fn is_verse_id(id: &str) -> bool {
    let digits = id.bytes().take_while(u8::is_ascii_digit).count();
    if digits == 0 {
        return false;
    }
    let rest = &id.as_bytes()[digits..];
    match rest {
        [] => true,
        [c] => c.is_ascii_lowercase(),
        _ => false,
    }
}
