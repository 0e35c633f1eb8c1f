//! Footnote rows, their three-column block height, and page admission.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use crate::backend::{Typesetter, WrappedLine};
use crate::balance::{fill_bounds, group_sums};
use crate::markup::{self, LinkAction};
use crate::model::{FootnoteEntry, LineUnit, Metadata};
use crate::settings::{PageSettings, StyleName};

/// (book slug, chapter) pairs whose chapter label has already been printed.
pub type SeenChapters = BTreeSet<(String, String)>;

const MIN_LABEL_WIDTH: f32 = 6.0;
const MIN_TEXT_WIDTH: f32 = 24.0;

#[derive(Clone, Debug, PartialEq)]
pub struct FootnoteRow {
    pub chapter: String,
    pub verse: String,
    pub letter: String,
    pub markup: String,
    pub lines: Vec<WrappedLine>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct FootnoteColumns {
    pub chapter: f32,
    pub verse: f32,
    pub letter: f32,
    pub text: f32,
}

/// Rendered rows for one ordered set of entries.
#[derive(Clone, Debug, Default)]
pub struct RowSet {
    pub rows: Vec<FootnoteRow>,
    pub heights: Vec<f32>,
    pub lines: Vec<usize>,
    pub columns: FootnoteColumns,
    pub seen: SeenChapters,
}

#[derive(Clone, Debug, Default)]
pub struct Placement {
    pub placed: Vec<Arc<FootnoteEntry>>,
    pub pending: Vec<Arc<FootnoteEntry>>,
    pub rows: RowSet,
    pub height: f32,
}

/// Page numbers and book codes used to turn cross-references into in-document links.
#[derive(Clone, Debug, Default)]
pub struct LinkTargets {
    /// (book slug, chapter) -> printed page number
    pub chapter_pages: BTreeMap<(String, String), usize>,
    /// book code from reference URIs -> book slug
    pub code_map: BTreeMap<String, String>,
}

impl LinkTargets {
    fn is_empty(&self) -> bool {
        self.chapter_pages.is_empty() || self.code_map.is_empty()
    }

    pub fn resolve(&self, href: &str) -> LinkAction {
        let Some((code, chapter)) = extract_book_chapter(href) else {
            return if href.starts_with('#') {
                LinkAction::Unwrap
            } else {
                LinkAction::Keep
            };
        };
        let page = self
            .code_map
            .get(&code)
            .and_then(|slug| self.chapter_pages.get(&(slug.clone(), chapter)));
        match page {
            Some(page) => LinkAction::Retarget(format!("#page-{page}")),
            None => LinkAction::Keep,
        }
    }
}

/// `(book code, chapter)` from `.../scriptures/<work>/<book>/<chapter>?...`.
pub fn extract_book_chapter(href: &str) -> Option<(String, String)> {
    let parts: Vec<&str> = href.split('/').filter(|p| !p.is_empty()).collect();
    let idx = parts.iter().position(|p| *p == "scriptures")?;
    let code = parts.get(idx + 2)?;
    let chapter = parts
        .get(idx + 3)
        .and_then(|p| p.split('?').next())
        .unwrap_or("");
    Some((code.to_string(), chapter.to_string()))
}

/// Book code (last segment of each book's reference URI) to book slug.
pub fn code_map_from_metadata(metadata: Option<&Metadata>) -> BTreeMap<String, String> {
    let mut map = BTreeMap::new();
    let Some(metadata) = metadata else {
        return map;
    };
    for work in metadata.structure.values() {
        for (slug, book) in &work.books {
            let Some(uri) = book.church_uri.as_deref().filter(|u| !u.is_empty()) else {
                continue;
            };
            if let Some(code) = uri.trim_end_matches('/').rsplit('/').next() {
                map.insert(code.to_string(), slug.clone());
            }
        }
    }
    map
}

fn entry_segments(entry: &FootnoteEntry, links: Option<&LinkTargets>) -> Vec<String> {
    let base: Vec<&str> = if entry.segments.is_empty() {
        vec![entry.text.as_str()]
    } else {
        entry.segments.iter().map(String::as_str).collect()
    };
    let mut segments: Vec<String> = base
        .into_iter()
        .map(|seg| {
            let rewritten = match links {
                Some(targets) if !targets.is_empty() => {
                    markup::rewrite_links(seg, |href| targets.resolve(href))
                }
                _ => seg.to_string(),
            };
            markup::normalize_entry_markup(&rewritten)
        })
        .filter(|seg| !seg.is_empty())
        .collect();
    if segments.is_empty() {
        segments.push(String::new());
    }
    segments
}

fn max_label_width(ts: &dyn Typesetter, labels: impl Iterator<Item = String>, style: StyleName) -> f32 {
    labels
        .map(|label| ts.text_width(&label, style))
        .fold(0.0, f32::max)
}

fn column_widths(
    ts: &dyn Typesetter,
    settings: &PageSettings,
    rows: &[FootnoteRow],
) -> FootnoteColumns {
    let include_chapter = rows.iter().any(|r| !r.chapter.is_empty());
    let chapter = if include_chapter {
        let widest = max_label_width(
            ts,
            rows.iter().map(|r| r.chapter.clone()),
            StyleName::FootnoteChapter,
        );
        MIN_LABEL_WIDTH.max(widest + 1.0)
    } else {
        0.0
    };
    let widest_verse = max_label_width(ts, rows.iter().map(|r| r.verse.clone()), StyleName::Footnote);
    let widest_letter = max_label_width(
        ts,
        rows.iter().map(|r| r.letter.clone()),
        StyleName::FootnoteLetter,
    );
    let verse = MIN_LABEL_WIDTH.max(widest_verse + 1.0);
    let letter = MIN_LABEL_WIDTH.max(widest_letter + settings.footnote_letter_gap);
    let text = MIN_TEXT_WIDTH.max(settings.footnote_column_width() - (chapter + verse + letter));
    FootnoteColumns {
        chapter,
        verse,
        letter,
        text,
    }
}

/// Render `entries` as footnote rows, starting from the chapters in `seen`.
pub fn footnote_rows(
    ts: &dyn Typesetter,
    settings: &PageSettings,
    entries: &[Arc<FootnoteEntry>],
    seen: &SeenChapters,
    links: Option<&LinkTargets>,
) -> RowSet {
    let mut seen = seen.clone();
    let mut raw: Vec<FootnoteRow> = Vec::new();
    let mut last_key: Option<(&str, &str, &str)> = None;

    for entry in entries {
        let chapter_key = entry.chapter_key();
        let chapter = if seen.contains(&chapter_key) {
            String::new()
        } else {
            entry.chapter.clone()
        };
        let verse = if last_key != Some(entry.verse_key()) {
            entry.verse.clone()
        } else {
            String::new()
        };
        for (idx, text) in entry_segments(entry, links).into_iter().enumerate() {
            let first = idx == 0;
            raw.push(FootnoteRow {
                chapter: if first { chapter.clone() } else { String::new() },
                verse: if first { verse.clone() } else { String::new() },
                letter: if first { entry.letter.clone() } else { String::new() },
                markup: text,
                lines: Vec::new(),
            });
        }
        seen.insert(chapter_key);
        last_key = Some(entry.verse_key());
    }

    let columns = column_widths(ts, settings, &raw);

    let mut rows = Vec::with_capacity(raw.len());
    let mut heights = Vec::with_capacity(raw.len());
    let mut lines = Vec::with_capacity(raw.len());
    for row in raw {
        let wrapped = if row.markup.is_empty() {
            Vec::new()
        } else {
            ts.wrap(&row.markup, StyleName::Footnote, columns.text)
        };
        let pieces = if wrapped.len() <= 1 {
            vec![(row, wrapped)]
        } else {
            wrapped
                .into_iter()
                .enumerate()
                .map(|(idx, line)| {
                    let first = idx == 0;
                    let piece = FootnoteRow {
                        chapter: if first { row.chapter.clone() } else { String::new() },
                        verse: if first { row.verse.clone() } else { String::new() },
                        letter: if first { row.letter.clone() } else { String::new() },
                        markup: line.markup.clone(),
                        lines: Vec::new(),
                    };
                    (piece, vec![line])
                })
                .collect()
        };
        for (mut piece, piece_lines) in pieces {
            let height = ts.measure(&piece.markup, StyleName::Footnote, columns.text)
                + 2.0 * settings.footnote_row_padding;
            lines.push(piece_lines.len().max(1));
            heights.push(height);
            piece.lines = piece_lines;
            rows.push(piece);
        }
    }

    RowSet {
        rows,
        heights,
        lines,
        columns,
        seen,
    }
}

/// Height of a footnote block holding rows of `heights`, laid out in up to
/// three sequentially filled columns.
pub fn footnote_height(heights: &[f32], settings: &PageSettings) -> f32 {
    if heights.is_empty() {
        return 0.0;
    }
    let columns = heights.len().min(3);
    let bounds = fill_bounds(heights, columns);
    let tallest = group_sums(heights, &bounds).into_iter().fold(0.0, f32::max);
    tallest
        + settings.footnote_rule_height
        + settings.footnote_extra_buffer
        + settings.column_gap / 2.0
}

/// Admit entries from `pending` then `new` while the block fits in `available`.
/// The first entry that does not fit and everything after it stay pending.
pub fn place_footnotes(
    ts: &dyn Typesetter,
    settings: &PageSettings,
    pending: &[Arc<FootnoteEntry>],
    new: &[Arc<FootnoteEntry>],
    available: f32,
    seen: &SeenChapters,
) -> Placement {
    let entries: Vec<Arc<FootnoteEntry>> = pending.iter().chain(new).cloned().collect();
    let mut placed: Vec<Arc<FootnoteEntry>> = Vec::new();
    let mut rows = RowSet {
        seen: seen.clone(),
        ..RowSet::default()
    };

    for (idx, entry) in entries.iter().enumerate() {
        placed.push(Arc::clone(entry));
        let candidate = footnote_rows(ts, settings, &placed, seen, None);
        if footnote_height(&candidate.heights, settings) <= available {
            rows = candidate;
            continue;
        }
        placed.pop();
        let height = footnote_height(&rows.heights, settings);
        return Placement {
            placed,
            pending: entries[idx..].to_vec(),
            rows,
            height,
        };
    }

    let height = footnote_height(&rows.heights, settings);
    Placement {
        placed,
        pending: Vec::new(),
        rows,
        height,
    }
}

/// Footnotes introduced by the verse units among `units`, in order.
pub fn notes_for_units(units: &[LineUnit]) -> Vec<Arc<FootnoteEntry>> {
    units
        .iter()
        .filter(|u| u.is_verse())
        .flat_map(|u| u.footnotes.iter().cloned())
        .collect()
}
