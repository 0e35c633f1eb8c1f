//! Drive the page fitter across whole books.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Instant;

use rayon::prelude::*;

use crate::backend::Typesetter;
use crate::fit::{self, PagePlan, TextBlock};
use crate::flatten::{self, ChapterFlow, FlattenOptions};
use crate::footnotes::{self, LinkTargets, RowSet, SeenChapters};
use crate::labels;
use crate::model::{Book, FootnoteEntry, LineUnit, StandardWork};
use crate::settings::PageSettings;

/// One composed page.
#[derive(Clone, Debug)]
pub struct PageSlice {
    pub units: Vec<LineUnit>,
    pub blocks: Vec<TextBlock>,
    pub text_height: f32,
    pub header: Vec<LineUnit>,
    pub header_height: f32,
    pub footnotes: Vec<Arc<FootnoteEntry>>,
    pub footnote_rows: RowSet,
    pub footnote_height: f32,
    /// Uppercased verse range for the running header.
    pub range_label: String,
    pub id: String,
    /// Chapters whose footnote label was printed before this page.
    pub seen_chapters_in: SeenChapters,
}

#[derive(Clone, Copy, Debug, Default)]
pub struct PaginateOptions {
    /// Start every chapter on a new page.
    pub chapter_breaks: bool,
    pub flatten: FlattenOptions,
}

/// Pages of a stream plus the footnotes still waiting when it ran out.
#[derive(Clone, Debug, Default)]
pub struct Pagination {
    pub pages: Vec<PageSlice>,
    pub unplaced: Vec<Arc<FootnoteEntry>>,
}

impl Pagination {
    fn append(&mut self, other: Pagination) {
        self.pages.extend(other.pages);
        self.unplaced.extend(other.unplaced);
    }
}

/// Cross-page state, replaced after every page.
#[derive(Clone, Debug, Default)]
pub struct PaginationState {
    pub idx: usize,
    pub pending: Vec<Arc<FootnoteEntry>>,
    pub seen: SeenChapters,
}

impl PaginationState {
    fn advance(&self, plan: &PagePlan) -> PaginationState {
        PaginationState {
            idx: self.idx + plan.count.max(1),
            pending: plan.pending.clone(),
            seen: plan.seen.clone(),
        }
    }
}

/// A flattened stream: all units, header units keyed by unit index, and
/// the indices where a new page is forced.
struct Stream {
    units: Vec<LineUnit>,
    headers: BTreeMap<usize, Vec<LineUnit>>,
    breakpoints: Vec<usize>,
}

impl Stream {
    fn from_flows(flows: Vec<ChapterFlow>) -> Stream {
        let mut stream = Stream {
            units: Vec::new(),
            headers: BTreeMap::new(),
            breakpoints: Vec::new(),
        };
        for flow in flows {
            let start = stream.units.len();
            if flow.force_new_page {
                stream.breakpoints.push(start);
            }
            if !flow.header.is_empty() {
                stream.headers.insert(start, flow.header);
            }
            stream.units.extend(flow.units);
        }
        stream
    }

    fn next_break(&self, current: usize) -> usize {
        self.breakpoints
            .iter()
            .copied()
            .find(|&bp| bp > current)
            .unwrap_or(self.units.len())
    }
}

/// Height of header units: spacing between them collapses to the larger of
/// the two neighbours, and `header_gap` separates them from the text.
pub fn header_height(header: &[LineUnit], settings: &PageSettings) -> f32 {
    if header.is_empty() {
        return 0.0;
    }
    let mut height = 0.0;
    let mut prev_after = 0.0_f32;
    for (idx, unit) in header.iter().enumerate() {
        if idx > 0 {
            height += prev_after.max(unit.space_before);
        }
        height += unit.height - unit.space_before - unit.space_after;
        prev_after = unit.space_after;
    }
    height += prev_after;
    height.max(0.0) + settings.header_gap
}

fn paginate_stream(
    stream: Stream,
    ts: &dyn Typesetter,
    settings: &PageSettings,
    prefix: &str,
) -> Pagination {
    let mut state = PaginationState::default();
    let mut pages: Vec<PageSlice> = Vec::new();
    let mut progress: BTreeSet<(String, String)> = BTreeSet::new();

    while state.idx < stream.units.len() {
        let header = stream.headers.get(&state.idx).cloned().unwrap_or_default();
        let header_h = header_height(&header, settings);
        let stop = stream.next_break(state.idx);
        let plan = fit::fit_page(
            ts,
            settings,
            &stream.units,
            state.idx,
            stop,
            header_h,
            &state.pending,
            &state.seen,
        );

        let end = (state.idx + plan.count.max(1)).min(stream.units.len());
        let units = stream.units[state.idx..end].to_vec();
        for unit in &units {
            let key = (unit.source.book_slug.clone(), unit.source.chapter.clone());
            if !key.1.is_empty() && !progress.contains(&key) {
                log::debug!("Laying out {} {}", key.0, key.1);
                progress.insert(key);
            }
        }

        let next = state.advance(&plan);
        pages.push(PageSlice {
            range_label: labels::range_label(&units).to_uppercase(),
            id: format!("{prefix}-p{}", pages.len() + 1),
            units,
            blocks: plan.blocks,
            text_height: plan.text_height,
            header,
            header_height: header_h,
            footnotes: plan.placed,
            footnote_rows: plan.rows,
            footnote_height: plan.footnote_height,
            seen_chapters_in: std::mem::take(&mut state.seen),
        });
        state = next;
    }

    if !state.pending.is_empty() {
        log::warn!(
            "{prefix}: {} footnote(s) left unplaced at the end of the stream",
            state.pending.len()
        );
    }
    Pagination {
        pages,
        unplaced: state.pending,
    }
}

/// The chapter flows of one book.
#[derive(Clone, Debug)]
pub struct BookFlows {
    pub slug: String,
    pub flows: Vec<ChapterFlow>,
}

/// Flatten every book of `works` on the rayon pool, keeping book order.
pub fn flatten_works(
    works: &[StandardWork],
    ts: &dyn Typesetter,
    settings: &PageSettings,
    options: &PaginateOptions,
) -> Vec<BookFlows> {
    let books: Vec<(&str, &Book)> = works
        .iter()
        .flat_map(|w| w.books.iter().map(move |b| (w.slug.as_str(), b)))
        .collect();
    books
        .par_iter()
        .map(|(work, book)| BookFlows {
            slug: book.slug.clone(),
            flows: flatten::flatten_book(work, book, ts, settings, options.flatten),
        })
        .collect()
}

/// Header units only show on the page that starts their chapter, so a
/// chapter with a header always starts a page.
fn apply_breaks(flows: &mut [ChapterFlow], options: &PaginateOptions) {
    for flow in flows.iter_mut() {
        if options.chapter_breaks || !flow.header.is_empty() {
            flow.force_new_page = true;
        }
    }
    if let Some(first) = flows.first_mut() {
        first.force_new_page = true;
    }
}

fn paginate_one(book: BookFlows, ts: &dyn Typesetter, settings: &PageSettings, options: &PaginateOptions) -> Pagination {
    let t0 = Instant::now();
    let mut flows = book.flows;
    apply_breaks(&mut flows, options);
    let result = paginate_stream(Stream::from_flows(flows), ts, settings, &book.slug);
    log::info!(
        "{}: {} pages in {:.1}ms",
        book.slug,
        result.pages.len(),
        t0.elapsed().as_secs_f64() * 1000.0,
    );
    result
}

/// Paginate books as one continuous stream numbered `content-p{n}`. Only the
/// first chapter forces a page break unless chapter breaks or chapter
/// headers are on.
pub fn paginate_joined(
    books: Vec<BookFlows>,
    ts: &dyn Typesetter,
    settings: &PageSettings,
    options: &PaginateOptions,
) -> Pagination {
    let mut flows: Vec<ChapterFlow> = books.into_iter().flat_map(|b| b.flows).collect();
    apply_breaks(&mut flows, options);
    let result = paginate_stream(Stream::from_flows(flows), ts, settings, "content");
    log::info!("content: {} pages", result.pages.len());
    result
}

/// Paginate each book on its own, in parallel, concatenating in book order.
/// Every book starts on a new page and its pages are numbered `{slug}-p{n}`.
pub fn paginate_separately(
    books: Vec<BookFlows>,
    ts: &dyn Typesetter,
    settings: &PageSettings,
    options: &PaginateOptions,
) -> Pagination {
    let per_book: Vec<Pagination> = books
        .into_par_iter()
        .map(|book| paginate_one(book, ts, settings, options))
        .collect();
    let mut all = Pagination::default();
    for part in per_book {
        all.append(part);
    }
    all
}

/// Flatten and paginate a single book.
pub fn paginate_book(
    work_slug: &str,
    book: &Book,
    ts: &dyn Typesetter,
    settings: &PageSettings,
    options: &PaginateOptions,
) -> Pagination {
    let flows = BookFlows {
        slug: book.slug.clone(),
        flows: flatten::flatten_book(work_slug, book, ts, settings, options.flatten),
    };
    paginate_one(flows, ts, settings, options)
}

pub fn paginate_works(
    works: &[StandardWork],
    ts: &dyn Typesetter,
    settings: &PageSettings,
    options: &PaginateOptions,
) -> Pagination {
    paginate_joined(flatten_works(works, ts, settings, options), ts, settings, options)
}

pub fn paginate_books_parallel(
    works: &[StandardWork],
    ts: &dyn Typesetter,
    settings: &PageSettings,
    options: &PaginateOptions,
) -> Pagination {
    paginate_separately(flatten_works(works, ts, settings, options), ts, settings, options)
}

/// First page number of each (book, chapter) containing verse text, counting
/// pages from `toc_pages + 1`.
pub fn chapter_page_map(pages: &[PageSlice], toc_pages: usize) -> BTreeMap<(String, String), usize> {
    let mut map = BTreeMap::new();
    for (offset, page) in pages.iter().enumerate() {
        for unit in page.units.iter().filter(|u| u.is_verse()) {
            map.entry((unit.source.book_slug.clone(), unit.source.chapter.clone()))
                .or_insert(toc_pages + 1 + offset);
        }
    }
    map
}

/// Re-render every page's footnotes with cross-references pointing at pages.
/// Page boundaries and the placed entries stay as they are.
pub fn refresh_footnotes(
    pages: &mut [PageSlice],
    ts: &dyn Typesetter,
    settings: &PageSettings,
    links: &LinkTargets,
) {
    for page in pages.iter_mut().filter(|p| !p.footnotes.is_empty()) {
        let rows = footnotes::footnote_rows(
            ts,
            settings,
            &page.footnotes,
            &page.seen_chapters_in,
            Some(links),
        );
        page.footnote_height = footnotes::footnote_height(&rows.heights, settings);
        page.footnote_rows = rows;
    }
}
