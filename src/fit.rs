//! Page fitting: how many line units share a page with their footnotes.
//!
//! The search runs in four steps. A balanced probe search finds the largest
//! count whose text and footnotes both fit (A). Its notes are placed for real
//! (B), then units are added one at a time while all of their notes still fit
//! (C), and finally text-only units fill what is left, their notes deferred
//! to the next page (D).

use std::collections::HashMap;
use std::ops::Range;
use std::sync::Arc;

use crate::backend::Typesetter;
use crate::balance::column_bounds;
use crate::footnotes::{self, RowSet, SeenChapters};
use crate::model::{FootnoteEntry, LineUnit};
use crate::settings::{EPSILON, PageSettings, StyleName};

const MAX_PROBES: usize = 200;
const INITIAL_STEP: usize = 8;
const ESTIMATE_FACTOR: f32 = 1.8;
const ESTIMATE_WINDOW: usize = 100;

#[derive(Clone, Debug, PartialEq)]
pub enum BlockKind {
    FullWidth,
    /// Two balanced columns. Ranges exclude leading blank spacers.
    Columns { left: Range<usize>, right: Range<usize> },
}

/// A run of units set either across the full body width or in two columns.
/// `range` indexes into the page's units.
#[derive(Clone, Debug, PartialEq)]
pub struct TextBlock {
    pub kind: BlockKind,
    pub range: Range<usize>,
    pub height: f32,
    /// Space-before dropped from a book title that opens the page.
    pub trimmed_space: f32,
}

impl TextBlock {
    pub fn is_full_width(&self) -> bool {
        matches!(self.kind, BlockKind::FullWidth)
    }
}

fn column_height(units: &[LineUnit], range: Range<usize>) -> (Range<usize>, f32) {
    let lead = units[range.clone()].iter().take_while(|u| u.spacer).count();
    let trimmed = range.start + lead..range.end;
    let height = units[trimmed.clone()].iter().map(|u| u.height).sum();
    (trimmed, height)
}

fn build_block(units: &[LineUnit], range: Range<usize>, full_width: bool) -> TextBlock {
    if full_width {
        let height = units[range.clone()].iter().map(|u| u.height).sum();
        return TextBlock {
            kind: BlockKind::FullWidth,
            range,
            height,
            trimmed_space: 0.0,
        };
    }
    let weights: Vec<f32> = units[range.clone()].iter().map(|u| u.weight as f32).collect();
    let bounds = column_bounds(&weights, 2);
    let split = range.start + bounds[1];
    let (left, left_h) = column_height(units, range.start..split);
    let (right, right_h) = column_height(units, split..range.end);
    TextBlock {
        kind: BlockKind::Columns { left, right },
        range,
        height: left_h.max(right_h),
        trimmed_space: 0.0,
    }
}

/// Group `units` into blocks by their full-width flag and return the blocks
/// with their total height.
pub fn layout_text_blocks(units: &[LineUnit]) -> (Vec<TextBlock>, f32) {
    let mut blocks = Vec::new();
    let mut total = 0.0;
    let mut start = 0;
    while start < units.len() {
        let full_width = units[start].full_width;
        let end = start
            + units[start..]
                .iter()
                .take_while(|u| u.full_width == full_width)
                .count();
        let block = build_block(units, start..end, full_width);
        total += block.height;
        blocks.push(block);
        start = end;
    }

    if let Some(first) = blocks.first_mut()
        && first.is_full_width()
        && let Some(unit) = units.first()
        && unit.style == StyleName::BookTitle
        && unit.space_before > 0.0
    {
        first.height = (first.height - unit.space_before).max(0.0);
        first.trimmed_space = unit.space_before;
        total = (total - unit.space_before).max(0.0);
    }
    (blocks, total)
}

/// Memoized block layouts keyed by `(start, count)`, scoped to one page search.
pub struct LayoutCache<'a> {
    units: &'a [LineUnit],
    blocks: HashMap<(usize, usize), (Arc<Vec<TextBlock>>, f32)>,
}

impl<'a> LayoutCache<'a> {
    pub fn new(units: &'a [LineUnit]) -> Self {
        LayoutCache {
            units,
            blocks: HashMap::new(),
        }
    }

    pub fn blocks_for(&mut self, start: usize, count: usize) -> (Arc<Vec<TextBlock>>, f32) {
        let units = self.units;
        let (blocks, height) = self.blocks.entry((start, count)).or_insert_with(|| {
            let (blocks, height) = layout_text_blocks(&units[start..start + count]);
            (Arc::new(blocks), height)
        });
        (Arc::clone(blocks), *height)
    }
}

/// The fitter's decision for one page.
#[derive(Clone, Debug)]
pub struct PagePlan {
    pub count: usize,
    pub blocks: Vec<TextBlock>,
    pub text_height: f32,
    pub header_height: f32,
    pub placed: Vec<Arc<FootnoteEntry>>,
    pub rows: RowSet,
    pub footnote_height: f32,
    /// Notes carried to the next page: unplaced ones, then deferred ones.
    pub pending: Vec<Arc<FootnoteEntry>>,
    pub seen: SeenChapters,
}

#[derive(Clone)]
struct Probe {
    count: usize,
    blocks: Arc<Vec<TextBlock>>,
    text_height: f32,
    new_notes: Vec<Arc<FootnoteEntry>>,
    footnote_height: f32,
    fits: bool,
}

struct PlanState {
    count: usize,
    blocks: Arc<Vec<TextBlock>>,
    text_height: f32,
    placement: footnotes::Placement,
    deferred: Vec<Arc<FootnoteEntry>>,
}

/// Inputs of one page search over `units[start..stop]`.
pub struct PageFitter<'a> {
    ts: &'a dyn Typesetter,
    settings: &'a PageSettings,
    units: &'a [LineUnit],
    start: usize,
    stop: usize,
    header_height: f32,
    pending: &'a [Arc<FootnoteEntry>],
    seen: &'a SeenChapters,
    cache: LayoutCache<'a>,
    available_text: f32,
    max_count: usize,
}

impl<'a> PageFitter<'a> {
    /// `start < stop <= units.len()` is expected; an empty window is treated
    /// as a window of one unit.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        ts: &'a dyn Typesetter,
        settings: &'a PageSettings,
        units: &'a [LineUnit],
        start: usize,
        stop: usize,
        header_height: f32,
        pending: &'a [Arc<FootnoteEntry>],
        seen: &'a SeenChapters,
    ) -> Self {
        let available_text =
            (settings.body_height() - header_height - settings.text_extra_buffer).max(0.0);
        let stop = stop.min(units.len()).max((start + 1).min(units.len()));
        PageFitter {
            ts,
            settings,
            units,
            start,
            stop,
            header_height,
            pending,
            seen,
            cache: LayoutCache::new(units),
            available_text,
            max_count: stop.saturating_sub(start).max(1),
        }
    }

    fn padded(&self, raw: f32, has_footnotes: bool) -> f32 {
        if has_footnotes {
            raw + self.settings.column_gap / 2.0
        } else {
            raw
        }
    }

    fn available_footnote(&self, text_height: f32) -> f32 {
        self.settings.body_height() - self.header_height - text_height
    }

    fn notes(&self, count: usize) -> Vec<Arc<FootnoteEntry>> {
        footnotes::notes_for_units(&self.units[self.start..self.start + count])
    }

    fn measure(&mut self, count: usize) -> Probe {
        let (blocks, raw) = self.cache.blocks_for(self.start, count);
        let new_notes = self.notes(count);
        let all: Vec<Arc<FootnoteEntry>> =
            self.pending.iter().cloned().chain(new_notes.iter().cloned()).collect();
        let rows = footnotes::footnote_rows(self.ts, self.settings, &all, self.seen, None);
        let footnote_height = footnotes::footnote_height(&rows.heights, self.settings);
        let text_height = self.padded(raw, !rows.rows.is_empty());
        let available_fn = self.available_footnote(text_height);
        let fits = text_height <= self.available_text + EPSILON
            && footnote_height <= (available_fn + EPSILON).max(0.0);
        log::debug!(
            "[measure] count={count} text_raw={raw:.2} text_pad={text_height:.2} \
             avail_text={:.2} avail_fn={available_fn:.2} fn_h={footnote_height:.2} \
             rows={} new_notes={} pending={}",
            self.available_text,
            rows.rows.len(),
            new_notes.len(),
            self.pending.len(),
        );
        Probe {
            count,
            blocks,
            text_height,
            new_notes,
            footnote_height,
            fits,
        }
    }

    fn expected_count(&self) -> usize {
        let end = (self.start + ESTIMATE_WINDOW).min(self.units.len());
        let window = &self.units[self.start.min(end)..end];
        if window.is_empty() {
            return 1;
        }
        let avg = window.iter().map(|u| u.height).sum::<f32>() / window.len() as f32;
        if avg <= 0.0 {
            return 1;
        }
        let estimate = (self.available_text / avg * ESTIMATE_FACTOR) as usize;
        estimate.min(window.len()).max(1)
    }

    /// Step A: largest count whose text and footnotes fit together.
    fn balanced_fit(&mut self) -> Probe {
        let mut count = self.max_count.min(self.expected_count());
        let mut step = INITIAL_STEP;
        let mut best: Option<Probe> = None;
        let mut last_outcome: Option<bool> = None;
        let mut iterations = 0;
        let mut stop = false;
        log::debug!(
            "[fit] start_idx={} stop_idx={} start_count={count} step={step} max_count={} avail_text={:.1}",
            self.start,
            self.stop,
            self.max_count,
            self.available_text,
        );

        while !stop && iterations < MAX_PROBES {
            iterations += 1;
            let probe = self.measure(count);
            if probe.fits && best.as_ref().is_none_or(|b| probe.count > b.count) {
                best = Some(probe.clone());
            }
            if last_outcome.is_some_and(|last| last != probe.fits) {
                step = (step / 2).max(1);
                if step == 1 && best.is_some() {
                    stop = true;
                }
            }
            let next = if probe.fits {
                if count >= self.max_count || step == 0 {
                    count
                } else {
                    (count + step).min(self.max_count)
                }
            } else if count == 1 || step == 0 {
                count
            } else {
                count.saturating_sub(step).max(1)
            };
            if next == count {
                stop = true;
            }
            count = next;
            last_outcome = Some(probe.fits);
        }

        if let Some(best) = best {
            log::debug!(
                "[fit] best={} iters={iterations} text_h={:.1} fn_h={:.1}",
                best.count,
                best.text_height,
                best.footnote_height,
            );
            return best;
        }
        for candidate in (1..=count.min(self.max_count)).rev() {
            let probe = self.measure(candidate);
            if probe.fits {
                log::debug!("[fit] fallback found count={candidate}");
                return probe;
            }
        }
        log::debug!("[fit] no fitting count, forcing one unit");
        self.measure(1)
    }

    fn place(&self, new: &[Arc<FootnoteEntry>], available: f32) -> footnotes::Placement {
        footnotes::place_footnotes(self.ts, self.settings, self.pending, new, available, self.seen)
    }

    /// Step C: grow while every note of the grown page is placed.
    fn extend_with_footnotes(&mut self, mut state: PlanState) -> PlanState {
        while self.start + state.count < self.stop {
            let candidate = state.count + 1;
            let (blocks, raw) = self.cache.blocks_for(self.start, candidate);
            let available_fn = self.available_footnote(self.padded(raw, true));
            let placement = self.place(&self.notes(candidate), available_fn);
            let text_height = self.padded(raw, !placement.rows.rows.is_empty());
            log::debug!(
                "[extend] cand={candidate} text_raw={raw:.2} text_pad={text_height:.2} \
                 avail_fn={available_fn:.2} fn_h={:.2} rows={} pending={}",
                placement.height,
                placement.rows.rows.len(),
                placement.pending.len(),
            );
            if !placement.pending.is_empty() || text_height > self.available_text + EPSILON {
                break;
            }
            state = PlanState {
                count: candidate,
                blocks,
                text_height,
                placement,
                deferred: state.deferred,
            };
        }
        state
    }

    /// Step D: add text-only units; their notes go to the next page.
    fn fill_text_only(&mut self, mut state: PlanState) -> PlanState {
        let body_limit = self.settings.body_height() - self.header_height;
        let has_rows = !state.placement.rows.rows.is_empty();
        while self.start + state.count < self.stop {
            let candidate = state.count + 1;
            let (blocks, raw) = self.cache.blocks_for(self.start, candidate);
            let height = self.padded(raw, has_rows);
            log::debug!(
                "[fill] cand={candidate} text_raw={raw:.2} text_pad={height:.2} fn_h={:.2} \
                 body_limit={body_limit:.2}",
                state.placement.height,
            );
            if height + state.placement.height > body_limit + EPSILON
                || height > self.available_text + EPSILON
            {
                break;
            }
            let added = &self.units[self.start + state.count..self.start + candidate];
            state.deferred.extend(footnotes::notes_for_units(added));
            state.count = candidate;
            state.blocks = blocks;
            state.text_height = height;
        }
        state
    }

    pub fn plan(mut self) -> PagePlan {
        let base = self.balanced_fit();

        // Step B
        let available_fn =
            (self.settings.body_height() - self.header_height - base.text_height).max(0.0);
        let placement = self.place(&base.new_notes, available_fn);
        let state = PlanState {
            count: base.count,
            blocks: base.blocks,
            text_height: base.text_height,
            placement,
            deferred: Vec::new(),
        };

        let state = self.extend_with_footnotes(state);
        let state = self.fill_text_only(state);

        let mut pending = state.placement.pending;
        pending.extend(state.deferred);
        PagePlan {
            count: state.count,
            blocks: Arc::unwrap_or_clone(state.blocks),
            text_height: state.text_height,
            header_height: self.header_height,
            placed: state.placement.placed,
            footnote_height: state.placement.height,
            seen: state.placement.rows.seen.clone(),
            rows: state.placement.rows,
            pending,
        }
    }
}

/// Plan one page over `units[start..stop]`.
#[allow(clippy::too_many_arguments)]
pub fn fit_page(
    ts: &dyn Typesetter,
    settings: &PageSettings,
    units: &[LineUnit],
    start: usize,
    stop: usize,
    header_height: f32,
    pending: &[Arc<FootnoteEntry>],
    seen: &SeenChapters,
) -> PagePlan {
    PageFitter::new(ts, settings, units, start, stop, header_height, pending, seen).plan()
}
