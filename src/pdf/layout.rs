use pdf_writer::{Content, Name, Rect, Str};

use crate::backend::SUPERSCRIPT_RISE;
use crate::fonts::{FontBook, FontFace, PdfFont};
use crate::model::{Alignment, Fragment};

pub(super) enum LinkTarget {
    Uri(String),
    /// Named destination inside this document (`page-N`).
    Named(String),
}

pub(super) struct LinkAnnotation {
    pub(super) rect: Rect,
    pub(super) target: LinkTarget,
}

impl LinkTarget {
    fn from_href(href: &str) -> LinkTarget {
        match href.strip_prefix('#') {
            Some(name) => LinkTarget::Named(name.to_string()),
            None => LinkTarget::Uri(href.to_string()),
        }
    }

    fn same(&self, href: &str) -> bool {
        match self {
            LinkTarget::Uri(url) => url == href,
            LinkTarget::Named(name) => href.strip_prefix('#') == Some(name.as_str()),
        }
    }
}

/// Draws text into one page's content stream and records its links.
pub(super) struct PageCanvas<'a> {
    pub(super) content: Content,
    pub(super) links: Vec<LinkAnnotation>,
    fonts: &'a [PdfFont],
    metrics: &'a FontBook,
    cur_font: Option<(FontFace, f32)>,
}

/// How one line is set horizontally.
pub(super) struct LineBox {
    pub(super) x: f32,
    pub(super) width: f32,
    pub(super) alignment: Alignment,
    /// Last line of its paragraph: never stretched.
    pub(super) last: bool,
    /// Baseline rise applied to superscripts.
    pub(super) rise: f32,
}

impl<'a> PageCanvas<'a> {
    pub(super) fn new(fonts: &'a [PdfFont], metrics: &'a FontBook) -> Self {
        PageCanvas {
            content: Content::new(),
            links: Vec::new(),
            fonts,
            metrics,
            cur_font: None,
        }
    }

    pub(super) fn ascender(&self, face: FontFace, font_size: f32) -> f32 {
        self.metrics.face(face).ascender(font_size)
    }

    pub(super) fn text_width(&self, face: FontFace, font_size: f32, text: &str) -> f32 {
        self.metrics.face(face).word_width(text, font_size)
    }

    fn show(&mut self, face: FontFace, font_size: f32, x: f32, y: f32, text: &str) {
        if text.is_empty() {
            return;
        }
        let font = &self.fonts[face.index()];
        if self.cur_font != Some((face, font_size)) {
            self.content.set_font(Name(font.pdf_name.as_bytes()), font_size);
            self.cur_font = Some((face, font_size));
        }
        self.content.set_text_matrix([1.0, 0.0, 0.0, 1.0, x, y]);
        let bytes = font.encode(text);
        self.content.show(Str(&bytes));
    }

    /// A single run of plain text with its left edge at `x`.
    pub(super) fn label(&mut self, face: FontFace, font_size: f32, x: f32, baseline: f32, text: &str) {
        self.content.begin_text();
        self.show(face, font_size, x, baseline, text);
        self.content.end_text();
    }

    /// A single run right-aligned to `right`.
    pub(super) fn label_right(
        &mut self,
        face: FontFace,
        font_size: f32,
        right: f32,
        baseline: f32,
        text: &str,
    ) {
        let w = self.text_width(face, font_size, text);
        self.label(face, font_size, right - w, baseline, text);
    }

    /// Draw pre-wrapped fragments. Justified lines spread the slack over the
    /// word gaps recorded on the fragments.
    pub(super) fn line(&mut self, fragments: &[Fragment], line_box: &LineBox, baseline: f32) {
        let Some(last_frag) = fragments.last() else {
            return;
        };
        let natural = last_frag.x + last_frag.width;
        let gaps = fragments.iter().skip(1).filter(|f| f.gap_before).count();
        let stretch = line_box.alignment == Alignment::Justify && !line_box.last && gaps > 0;
        let extra = if stretch {
            ((line_box.width - natural) / gaps as f32).max(0.0)
        } else {
            0.0
        };
        let start = match line_box.alignment {
            Alignment::Center => line_box.x + (line_box.width - natural) / 2.0,
            Alignment::Right => line_box.x + line_box.width - natural,
            Alignment::Left | Alignment::Justify => line_box.x,
        };

        self.content.begin_text();
        let mut shift = 0.0;
        for (idx, frag) in fragments.iter().enumerate() {
            if idx > 0 && frag.gap_before {
                shift += extra;
            }
            let x = start + frag.x + shift;
            let y = if frag.superscript {
                baseline + line_box.rise
            } else {
                baseline
            };
            self.show(frag.face, frag.font_size, x, y, &frag.text);
            if let Some(href) = &frag.href {
                self.push_link(href, x, y, frag);
            }
        }
        self.content.end_text();
    }

    fn push_link(&mut self, href: &str, x: f32, y: f32, frag: &Fragment) {
        let bottom = y - frag.font_size * 0.2;
        let top = y + frag.font_size * 0.8;
        let merged = self
            .links
            .last_mut()
            .filter(|prev| prev.target.same(href) && (prev.rect.y1 - bottom).abs() < 1.0);
        if let Some(prev) = merged {
            prev.rect.x2 = x + frag.width;
        } else {
            self.links.push(LinkAnnotation {
                rect: Rect::new(x, bottom, x + frag.width, top),
                target: LinkTarget::from_href(href),
            });
        }
    }

    /// Stroke a straight rule in the given gray level.
    pub(super) fn rule(&mut self, from: (f32, f32), to: (f32, f32), width: f32, gray: f32) {
        self.content.save_state();
        self.content.set_stroke_gray(gray);
        self.content.set_line_width(width);
        self.content.move_to(from.0, from.1);
        self.content.line_to(to.0, to.1);
        self.content.stroke();
        self.content.restore_state();
    }
}

/// Superscript rise for text set at `font_size`.
pub(super) fn superscript_rise(font_size: f32) -> f32 {
    SUPERSCRIPT_RISE * font_size
}
