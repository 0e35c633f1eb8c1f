mod layout;

use std::collections::HashSet;

use pdf_writer::types::{ActionType, AnnotationType};
use pdf_writer::{Filter, Name, Null, Pdf, Rect, Ref, Str};

use crate::backend::{MetricsBackend, Typesetter};
use crate::balance::{fill_bounds, group_sums};
use crate::error::Error;
use crate::fit::BlockKind;
use crate::fonts::{self, FontFace};
use crate::footnotes::RowSet;
use crate::model::LineUnit;
use crate::paginate::PageSlice;
use crate::settings::{PageSettings, StyleName};

use layout::{LineBox, LinkTarget, PageCanvas, superscript_rise};

/// Points between the top of the body and the running-header baseline.
const RUNNING_HEADER_OFFSET: f32 = 8.0;

/// Where each page is numbered from and what goes in its running header.
#[derive(Clone, Copy, Debug)]
pub struct RenderOptions {
    /// Printed number of the first page.
    pub first_page_number: usize,
    pub running_headers: bool,
}

impl Default for RenderOptions {
    fn default() -> Self {
        RenderOptions {
            first_page_number: 1,
            running_headers: true,
        }
    }
}

fn face_chars(chars: &mut [HashSet<char>; 4], face: FontFace, text: &str) {
    chars[face.index()].extend(text.chars());
}

/// Characters used per face, for font subsetting.
fn collect_used_chars(
    pages: &[PageSlice],
    backend: &MetricsBackend,
    options: &RenderOptions,
) -> [HashSet<char>; 4] {
    let mut chars: [HashSet<char>; 4] = Default::default();
    for set in chars.iter_mut() {
        set.insert(' ');
    }
    let header_face = backend.style(StyleName::RunningHeader).face;
    chars[header_face.index()].extend('0'..='9');

    for page in pages {
        for unit in page.header.iter().chain(&page.units) {
            for frag in &unit.fragments {
                face_chars(&mut chars, frag.face, &frag.text);
            }
        }
        if options.running_headers {
            face_chars(&mut chars, header_face, &page.range_label);
        }
        for row in &page.footnote_rows.rows {
            face_chars(&mut chars, backend.style(StyleName::FootnoteChapter).face, &row.chapter);
            face_chars(&mut chars, backend.style(StyleName::Footnote).face, &row.verse);
            face_chars(&mut chars, backend.style(StyleName::FootnoteLetter).face, &row.letter);
            for line in &row.lines {
                for frag in &line.fragments {
                    face_chars(&mut chars, frag.face, &frag.text);
                }
            }
        }
    }
    chars
}

struct PageRenderer<'a> {
    backend: &'a MetricsBackend,
    settings: &'a PageSettings,
}

impl PageRenderer<'_> {
    /// Draw one unit whose box starts at `top`; returns the top of the next unit.
    fn unit(&self, canvas: &mut PageCanvas, unit: &LineUnit, x: f32, width: f32, top: f32, skip_before: bool) -> f32 {
        let style = self.backend.style(unit.style);
        let before = if skip_before { 0.0 } else { unit.space_before };
        if !unit.fragments.is_empty() {
            let baseline = top - before - canvas.ascender(style.face, style.font_size);
            let line_box = LineBox {
                x,
                width,
                alignment: style.alignment,
                last: unit.verse_line_index + 1 >= unit.verse_line_count,
                rise: superscript_rise(style.font_size),
            };
            canvas.line(&unit.fragments, &line_box, baseline);
        }
        top - (unit.height - (unit.space_before - before))
    }

    fn stack(&self, canvas: &mut PageCanvas, units: &[LineUnit], x: f32, width: f32, top: f32, trim_first: bool) -> f32 {
        let mut y = top;
        for (idx, unit) in units.iter().enumerate() {
            y = self.unit(canvas, unit, x, width, y, trim_first && idx == 0);
        }
        y
    }

    fn header(&self, canvas: &mut PageCanvas, header: &[LineUnit], top: f32) {
        let s = self.settings;
        let mut y = top;
        let mut prev_after = 0.0_f32;
        for (idx, unit) in header.iter().enumerate() {
            if idx > 0 {
                y -= prev_after.max(unit.space_before);
            }
            let style = self.backend.style(unit.style);
            let baseline = y - canvas.ascender(style.face, style.font_size);
            let line_box = LineBox {
                x: s.margin_left,
                width: s.body_width(),
                alignment: style.alignment,
                last: true,
                rise: superscript_rise(style.font_size),
            };
            canvas.line(&unit.fragments, &line_box, baseline);
            y -= unit.height - unit.space_before - unit.space_after;
            prev_after = unit.space_after;
        }
    }

    fn text(&self, canvas: &mut PageCanvas, page: &PageSlice, top: f32) {
        let s = self.settings;
        let has_notes = !page.footnote_rows.rows.is_empty();
        let mut y = top;
        let last = page.blocks.len().saturating_sub(1);
        for (idx, block) in page.blocks.iter().enumerate() {
            let trim = block.trimmed_space > 0.0;
            match &block.kind {
                BlockKind::FullWidth => {
                    self.stack(canvas, &page.units[block.range.clone()], s.margin_left, s.body_width(), y, trim);
                }
                BlockKind::Columns { left, right } => {
                    let inner = s.column_inner_width();
                    let right_x = s.margin_left + s.text_column_width() + s.column_gap / 2.0;
                    self.stack(canvas, &page.units[left.clone()], s.margin_left, inner, y, false);
                    self.stack(canvas, &page.units[right.clone()], right_x, inner, y, false);
                    let mut bottom = y - block.height;
                    if has_notes && idx == last {
                        bottom -= s.column_gap / 2.0;
                    }
                    let sep_x = s.margin_left + s.text_column_width();
                    canvas.rule((sep_x, y), (sep_x, bottom), s.separator_line_width, s.separator_gray);
                }
            }
            y -= block.height;
        }
    }

    fn footnotes(&self, canvas: &mut PageCanvas, rows: &RowSet, top: f32) {
        if rows.rows.is_empty() {
            return;
        }
        let s = self.settings;
        canvas.rule(
            (s.margin_left, top),
            (s.margin_left + s.body_width(), top),
            s.separator_line_width,
            s.separator_gray,
        );
        let top = top - s.footnote_rule_height.max(s.separator_line_width);

        let note = self.backend.style(StyleName::Footnote);
        let chapter_style = self.backend.style(StyleName::FootnoteChapter);
        let letter_style = self.backend.style(StyleName::FootnoteLetter);
        let columns = rows.heights.len().min(3);
        let bounds = fill_bounds(&rows.heights, columns);
        let widths = rows.columns;
        let col_w = s.footnote_column_width();

        for (col, pair) in bounds.windows(2).enumerate() {
            let x0 = s.margin_left + col as f32 * (col_w + s.column_gap);
            let mut y = top;
            for idx in pair[0]..pair[1] {
                let row = &rows.rows[idx];
                let row_top = y - s.footnote_row_padding;
                let baseline = row_top - canvas.ascender(note.face, note.font_size);
                let mut x = x0;
                if widths.chapter > 0.0 {
                    canvas.label(chapter_style.face, chapter_style.font_size, x, baseline, &row.chapter);
                    x += widths.chapter;
                }
                canvas.label(note.face, note.font_size, x, baseline, &row.verse);
                x += widths.verse;
                canvas.label(letter_style.face, letter_style.font_size, x, baseline, &row.letter);
                x += widths.letter;

                let mut line_baseline = baseline;
                for (line_idx, line) in row.lines.iter().enumerate() {
                    let line_box = LineBox {
                        x,
                        width: widths.text,
                        alignment: note.alignment,
                        last: line_idx + 1 == row.lines.len(),
                        rise: superscript_rise(note.font_size),
                    };
                    canvas.line(&line.fragments, &line_box, line_baseline);
                    line_baseline -= self.backend.line_height(StyleName::Footnote);
                }
                y -= rows.heights[idx];
            }
        }
        log::trace!(
            "footnotes: {} rows in {columns} columns, tallest {:.1}",
            rows.rows.len(),
            group_sums(&rows.heights, &bounds).into_iter().fold(0.0, f32::max),
        );
    }

    fn running_header(&self, canvas: &mut PageCanvas, label: &str, number: usize) {
        let s = self.settings;
        let style = self.backend.style(StyleName::RunningHeader);
        let baseline = s.page_height - s.margin_top + RUNNING_HEADER_OFFSET;
        canvas.label(style.face, style.font_size, s.margin_left, baseline, &number.to_string());
        canvas.label_right(
            style.face,
            style.font_size,
            s.page_width - s.margin_right,
            baseline,
            label,
        );
    }
}

/// Serialize composed pages to PDF bytes.
pub fn render(
    pages: &[PageSlice],
    backend: &MetricsBackend,
    settings: &PageSettings,
    options: &RenderOptions,
) -> Result<Vec<u8>, Error> {
    if settings.body_width() <= 0.0 || settings.body_height() <= 0.0 {
        return Err(Error::Pdf(format!(
            "margins leave no body on a {}x{} page",
            settings.page_width, settings.page_height
        )));
    }
    let t0 = std::time::Instant::now();
    let mut pdf = Pdf::new();
    let mut next_id = 1i32;
    let mut alloc = || {
        let r = Ref::new(next_id);
        next_id += 1;
        r
    };

    let catalog_id = alloc();
    let pages_id = alloc();

    let used = collect_used_chars(pages, backend, options);
    let pdf_fonts: Vec<fonts::PdfFont> = FontFace::ALL
        .iter()
        .map(|&face| {
            fonts::register_face(&mut pdf, face, backend.fonts().face(face), &used[face.index()], &mut alloc)
        })
        .collect();
    let t_fonts = t0.elapsed();

    let renderer = PageRenderer { backend, settings };
    let body_top = settings.page_height - settings.margin_top;
    let mut canvases = Vec::with_capacity(pages.len());
    for (idx, page) in pages.iter().enumerate() {
        let mut canvas = PageCanvas::new(&pdf_fonts, backend.fonts());
        if options.running_headers {
            renderer.running_header(&mut canvas, &page.range_label, options.first_page_number + idx);
        }
        renderer.header(&mut canvas, &page.header, body_top);
        let text_top = body_top - page.header_height;
        renderer.text(&mut canvas, page, text_top);
        renderer.footnotes(&mut canvas, &page.footnote_rows, text_top - page.text_height);
        canvases.push(canvas);
    }
    let t_layout = t0.elapsed();

    let n = canvases.len();
    let page_ids: Vec<Ref> = (0..n).map(|_| alloc()).collect();
    let content_ids: Vec<Ref> = (0..n).map(|_| alloc()).collect();

    let mut page_annots: Vec<Vec<Ref>> = Vec::with_capacity(n);
    for canvas in &canvases {
        let mut refs = Vec::with_capacity(canvas.links.len());
        for link in &canvas.links {
            let annot_ref = alloc();
            let mut annot = pdf.annotation(annot_ref);
            annot
                .subtype(AnnotationType::Link)
                .rect(link.rect)
                .border(0.0, 0.0, 0.0, None);
            let mut action = annot.action();
            match &link.target {
                LinkTarget::Uri(url) => {
                    action.action_type(ActionType::Uri).uri(Str(url.as_bytes()));
                }
                LinkTarget::Named(name) => {
                    action.action_type(ActionType::GoTo);
                    action.insert(Name(b"D")).primitive(Name(name.as_bytes()));
                }
            }
            refs.push(annot_ref);
        }
        page_annots.push(refs);
    }

    for (i, canvas) in canvases.into_iter().enumerate() {
        let raw = canvas.content.finish();
        let compressed = miniz_oxide::deflate::compress_to_vec_zlib(raw.as_slice(), 6);
        pdf.stream(content_ids[i], &compressed).filter(Filter::FlateDecode);
    }

    {
        let mut catalog = pdf.catalog(catalog_id);
        catalog.pages(pages_id);
        let mut dests = catalog.insert(Name(b"Dests")).dict();
        for (i, page_id) in page_ids.iter().enumerate() {
            let name = format!("page-{}", options.first_page_number + i);
            let mut dest = dests.insert(Name(name.as_bytes())).array();
            dest.item(*page_id);
            dest.item(Name(b"XYZ"));
            dest.item(0.0_f32);
            dest.item(settings.page_height);
            dest.item(Null);
        }
    }
    pdf.pages(pages_id)
        .kids(page_ids.iter().copied())
        .count(n as i32);

    for i in 0..n {
        let mut page = pdf.page(page_ids[i]);
        page.media_box(Rect::new(0.0, 0.0, settings.page_width, settings.page_height))
            .parent(pages_id)
            .contents(content_ids[i]);
        if !page_annots[i].is_empty() {
            page.annotations(page_annots[i].iter().copied());
        }
        let mut resources = page.resources();
        let mut font_dict = resources.fonts();
        for font in &pdf_fonts {
            font_dict.pair(Name(font.pdf_name.as_bytes()), font.font_ref);
        }
    }

    log::info!(
        "Render phases: font_embed={:.1}ms, layout={:.1}ms, assembly={:.1}ms ({n} pages)",
        t_fonts.as_secs_f64() * 1000.0,
        (t_layout - t_fonts).as_secs_f64() * 1000.0,
        (t0.elapsed() - t_layout).as_secs_f64() * 1000.0,
    );

    Ok(pdf.finish())
}
