//! Turn chapters into ordered line units ready for page fitting.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::backend::{Typesetter, WrappedLine};
use crate::markup;
use crate::model::{
    Book, Chapter, FootnoteEntry, LineUnit, Paragraph, ParagraphKind, Provenance, is_verse_id,
};
use crate::settings::{PageSettings, StyleName};

/// The line units of one chapter, plus header units shown above the columns
/// of the page that starts it.
#[derive(Clone, Debug)]
pub struct ChapterFlow {
    pub header: Vec<LineUnit>,
    pub units: Vec<LineUnit>,
    pub force_new_page: bool,
}

/// Sections of this work carry their own title paragraphs, so no chapter
/// heading is generated for them.
pub const DOCTRINE_AND_COVENANTS: &str = "doctrine-and-covenants";

#[derive(Clone, Copy, Debug, Default)]
pub struct FlattenOptions {
    /// Set chapter headings as page header units instead of column text.
    pub chapter_headers: bool,
}

struct LineBuilder<'a> {
    ts: &'a dyn Typesetter,
    settings: &'a PageSettings,
    source: Arc<Provenance>,
    units: Vec<LineUnit>,
}

impl LineBuilder<'_> {
    fn width(&self, full_width: bool) -> f32 {
        if full_width {
            self.settings.body_width()
        } else {
            self.settings.column_inner_width()
        }
    }

    fn unit(&self, line: WrappedLine, style: StyleName, full_width: bool) -> LineUnit {
        LineUnit {
            height: 0.0,
            space_before: 0.0,
            space_after: 0.0,
            markup: line.markup,
            fragments: line.fragments,
            style,
            first_line: false,
            source: Arc::clone(&self.source),
            verse: None,
            footnotes: Vec::new(),
            full_width,
            weight: 1,
            segment_index: 0,
            verse_line_index: 0,
            verse_line_count: 1,
            spacer: false,
        }
    }

    /// A non-verse paragraph: one unit per wrapped line, the paragraph's
    /// spacing carried by its first and last lines.
    fn paragraph_units(&self, html: &str, style: StyleName, full_width: bool) -> Vec<LineUnit> {
        let st = self.ts.style(style);
        let lines = self.ts.wrap(html, style, self.width(full_width));
        let count = lines.len();
        let leading = self.ts.line_height(style);
        lines
            .into_iter()
            .enumerate()
            .map(|(idx, line)| {
                let mut unit = self.unit(line, style, full_width);
                unit.first_line = idx == 0;
                unit.space_before = if idx == 0 { st.space_before } else { 0.0 };
                unit.space_after = if idx + 1 == count { st.space_after } else { 0.0 };
                unit.height = leading + unit.space_before + unit.space_after;
                unit.verse_line_index = idx;
                unit.verse_line_count = count;
                unit
            })
            .collect()
    }

    fn push_paragraph(&mut self, html: &str, style: StyleName, full_width: bool) {
        let units = self.paragraph_units(html, style, full_width);
        self.units.extend(units);
    }

    fn push_spacer(&mut self, number: &str, seg_idx: usize, full_width: bool) {
        let blank = WrappedLine {
            markup: String::new(),
            fragments: Vec::new(),
            width: 0.0,
        };
        let mut spacer = self.unit(blank, StyleName::BodyCont, full_width);
        spacer.height = self.ts.line_height(StyleName::BodyCont);
        spacer.verse = Some(number.to_string());
        spacer.segment_index = seg_idx;
        spacer.spacer = true;
        self.units.push(spacer);
    }

    fn push_verse(&mut self, para: &Paragraph, notes: &[Arc<FootnoteEntry>]) {
        let Some(number) = para.verse.as_deref() else {
            log::warn!(
                "Verse paragraph without a number in {} {}",
                self.source.book_slug,
                self.source.chapter
            );
            self.push_paragraph(&para.html, StyleName::BodyCont, para.full_width);
            return;
        };
        if !notes.is_empty() && !is_verse_id(number) {
            log::warn!(
                "{} footnote(s) on {} {}:{number} will not be placed: {number:?} is not a verse number",
                notes.len(),
                self.source.book_slug,
                self.source.chapter
            );
        }
        let width = self.width(para.full_width);
        let segments = markup::split_on_breaks(&markup::verse_markup(number, &para.html));
        let mut assigned = vec![false; notes.len()];
        let verse_start = self.units.len();

        for (seg_idx, segment) in segments.iter().enumerate() {
            if segment.trim().is_empty() {
                self.push_spacer(number, seg_idx, para.full_width);
                continue;
            }

            let cleaned = markup::prepare_verse_markup(segment);
            let wrap_style = if seg_idx == 0 { StyleName::Body } else { StyleName::BodyCont };
            let lines = self.ts.wrap(&cleaned, wrap_style, width);
            let total = lines.len();
            for (line_idx, line) in lines.into_iter().enumerate() {
                let first = seg_idx == 0 && line_idx == 0;
                let style = if first { StyleName::Body } else { StyleName::BodyCont };
                let mut unit = self.unit(line, style, para.full_width);
                if first {
                    let marked = markup::ensure_verse_number(&unit.markup, number);
                    if marked != unit.markup {
                        if let Some(line) = self.ts.wrap(&marked, style, width).into_iter().next() {
                            unit.fragments = line.fragments;
                        }
                        unit.markup = marked;
                    }
                }
                unit.height = self.ts.measure(&unit.markup, style, width);
                unit.first_line = first;
                unit.verse = Some(number.to_string());
                unit.segment_index = seg_idx;
                unit.verse_line_index = line_idx;
                unit.verse_line_count = total;
                unit.footnotes = collect_line_notes(&unit.markup, notes, &mut assigned);
                self.units.push(unit);
            }
        }

        // notes whose marker never showed up ride on the verse's last line
        if self.units.len() > verse_start
            && let Some(last) = self.units.last_mut()
        {
            for (entry, done) in notes.iter().zip(assigned.iter_mut()) {
                if !*done {
                    *done = true;
                    last.footnotes.push(Arc::clone(entry));
                }
            }
        }
    }
}

fn note_letter(entry: &FootnoteEntry) -> Option<char> {
    entry.letter.trim().chars().next().and_then(|c| c.to_lowercase().next())
}

/// Notes whose letters are marked on `line`, each taken at most once per verse.
fn collect_line_notes(
    line: &str,
    notes: &[Arc<FootnoteEntry>],
    assigned: &mut [bool],
) -> Vec<Arc<FootnoteEntry>> {
    let mut found = Vec::new();
    for letter in markup::footnote_letters(line) {
        let hit = notes
            .iter()
            .zip(assigned.iter())
            .position(|(entry, done)| !*done && note_letter(entry) == Some(letter));
        if let Some(idx) = hit {
            assigned[idx] = true;
            found.push(Arc::clone(&notes[idx]));
        }
    }
    found
}

/// Chapter footnotes grouped by verse, with book and chapter filled in.
fn footnotes_by_verse(
    book: &Book,
    chapter: &Chapter,
) -> BTreeMap<String, Vec<Arc<FootnoteEntry>>> {
    let mut by_verse: BTreeMap<String, Vec<Arc<FootnoteEntry>>> = BTreeMap::new();
    for entry in &chapter.footnotes {
        let mut entry = entry.clone();
        if entry.book_slug.is_empty() {
            entry.book_slug = book.slug.clone();
        }
        if entry.chapter.is_empty() {
            entry.chapter = chapter.number.clone();
        }
        by_verse
            .entry(entry.verse.clone())
            .or_default()
            .push(Arc::new(entry));
    }
    by_verse
}

/// Flatten one book into per-chapter flows. The book title (and subtitle)
/// open the first chapter as full-width units. Chapters of a multi-chapter
/// book get a heading, except in the Doctrine and Covenants.
pub fn flatten_book(
    work_slug: &str,
    book: &Book,
    ts: &dyn Typesetter,
    settings: &PageSettings,
    options: FlattenOptions,
) -> Vec<ChapterFlow> {
    let t0 = std::time::Instant::now();
    let mut flows = Vec::with_capacity(book.chapters.len());
    let titled_sections = work_slug == DOCTRINE_AND_COVENANTS;

    for (idx, chapter) in book.chapters.iter().enumerate() {
        let chapter_title = if chapter.title.is_empty() {
            format!("{} {}", book.name, chapter.number)
        } else {
            chapter.title.clone()
        };
        let mut builder = LineBuilder {
            ts,
            settings,
            source: Arc::new(Provenance {
                standard_work: work_slug.to_string(),
                book_slug: book.slug.clone(),
                book_name: book.name.clone(),
                book_abbrev: book.abbrev.clone(),
                chapter: chapter.number.clone(),
                chapter_title: chapter_title.clone(),
            }),
            units: Vec::new(),
        };
        let mut header = Vec::new();

        if idx == 0 {
            let title = markup::escape(&book.name.to_uppercase());
            builder.push_paragraph(&title, StyleName::BookTitle, true);
            if let Some(subtitle) = book.subtitle.as_deref().filter(|s| !s.trim().is_empty()) {
                let subtitle = markup::escape(&subtitle.to_uppercase());
                builder.push_paragraph(&subtitle, StyleName::BookSubtitle, true);
            }
        }

        if !titled_sections && (book.chapters.len() > 1 || !chapter.title.is_empty()) {
            let heading = markup::escape(&chapter_title);
            if options.chapter_headers {
                header = builder.paragraph_units(&heading, StyleName::ChapterHeading, true);
            } else {
                builder.push_paragraph(&heading, StyleName::ChapterHeading, false);
            }
        }

        let notes = footnotes_by_verse(book, chapter);
        for para in &chapter.paragraphs {
            match para.kind {
                ParagraphKind::Verse => {
                    let verse_notes = para
                        .verse
                        .as_ref()
                        .and_then(|v| notes.get(v))
                        .map(Vec::as_slice)
                        .unwrap_or_default();
                    builder.push_verse(para, verse_notes);
                }
                ParagraphKind::Summary => {
                    builder.push_paragraph(&para.html, StyleName::Preface, para.full_width)
                }
                ParagraphKind::Intro => {
                    builder.push_paragraph(&para.html, StyleName::BookSummary, para.full_width)
                }
                ParagraphKind::Heading => {
                    builder.push_paragraph(&para.html, StyleName::Section, para.full_width)
                }
            }
        }

        flows.push(ChapterFlow {
            header,
            units: builder.units,
            force_new_page: false,
        });
    }

    log::debug!(
        "flatten_book: {} ({} chapters, {} units) in {:.1}ms",
        book.slug,
        flows.len(),
        flows.iter().map(|f| f.units.len()).sum::<usize>(),
        t0.elapsed().as_secs_f64() * 1000.0,
    );
    flows
}
