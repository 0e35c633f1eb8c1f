use serde::{Deserialize, Serialize};

use crate::fonts::FontFace;
use crate::model::Alignment;

/// Tolerance used by every height comparison in the fitter.
pub const EPSILON: f32 = 1e-4;

pub const PAGE_SCALE: f32 = 0.7;
const INCH: f32 = 72.0;
const LETTER: (f32, f32) = (612.0, 792.0);

/// Page geometry and spacing, in points.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PageSettings {
    pub page_width: f32,
    pub page_height: f32,
    pub margin_left: f32,
    pub margin_right: f32,
    pub margin_top: f32,
    pub margin_bottom: f32,
    pub column_gap: f32,
    pub header_gap: f32,
    pub footnote_rule_height: f32,
    pub footnote_extra_buffer: f32,
    pub text_extra_buffer: f32,
    pub footnote_row_padding: f32,
    pub footnote_letter_gap: f32,
    pub footnote_font_size: f32,
    pub separator_line_width: f32,
    /// Gray level of column separators and the footnote rule (0 black, 1 white).
    pub separator_gray: f32,
}

impl Default for PageSettings {
    fn default() -> Self {
        PageSettings {
            page_width: LETTER.0 * PAGE_SCALE,
            page_height: LETTER.1 * PAGE_SCALE,
            margin_left: 0.65 * INCH * PAGE_SCALE,
            margin_right: 0.65 * INCH * PAGE_SCALE,
            margin_top: 0.75 * INCH * PAGE_SCALE,
            margin_bottom: 0.5 * INCH * PAGE_SCALE,
            column_gap: 12.0 * PAGE_SCALE,
            header_gap: 6.0 * PAGE_SCALE,
            footnote_rule_height: 0.0,
            footnote_extra_buffer: 0.0,
            text_extra_buffer: 0.0,
            footnote_row_padding: 0.0,
            footnote_letter_gap: PAGE_SCALE,
            footnote_font_size: 8.0,
            separator_line_width: 0.8,
            separator_gray: 0.83,
        }
    }
}

impl PageSettings {
    pub fn body_width(&self) -> f32 {
        self.page_width - self.margin_left - self.margin_right
    }

    pub fn body_height(&self) -> f32 {
        self.page_height - self.margin_top - self.margin_bottom + EPSILON
    }

    pub fn text_column_width(&self) -> f32 {
        self.body_width() / 2.0
    }

    /// Wrap width inside one text column, leaving half the gap on each side.
    pub fn column_inner_width(&self) -> f32 {
        self.text_column_width() - self.column_gap / 2.0
    }

    pub fn footnote_column_width(&self) -> f32 {
        (self.body_width() - 2.0 * self.column_gap) / 3.0
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum StyleName {
    Body,
    BodyCont,
    RunningHeader,
    BookTitle,
    BookSubtitle,
    BookSummary,
    ChapterHeading,
    Section,
    Preface,
    Study,
    Footnote,
    FootnoteChapter,
    FootnoteLetter,
}

impl StyleName {
    const COUNT: usize = 13;

    fn index(self) -> usize {
        self as usize
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ParagraphStyle {
    pub face: FontFace,
    pub font_size: f32,
    pub leading: f32,
    pub alignment: Alignment,
    pub space_before: f32,
    pub space_after: f32,
    pub first_line_indent: f32,
}

impl ParagraphStyle {
    const fn new(face: FontFace, font_size: f32, leading: f32, alignment: Alignment) -> Self {
        ParagraphStyle {
            face,
            font_size,
            leading,
            alignment,
            space_before: 0.0,
            space_after: 0.0,
            first_line_indent: 0.0,
        }
    }

    const fn spaced(mut self, before: f32, after: f32) -> Self {
        self.space_before = before;
        self.space_after = after;
        self
    }

    const fn indented(mut self, first_line: f32) -> Self {
        self.first_line_indent = first_line;
        self
    }
}

/// Paragraph styles indexed by [`StyleName`].
#[derive(Clone, Debug)]
pub struct StyleSheet {
    styles: [ParagraphStyle; StyleName::COUNT],
}

impl Default for StyleSheet {
    fn default() -> Self {
        use Alignment::*;
        use FontFace::*;

        let body = ParagraphStyle::new(Regular, 11.0, 13.0, Justify).indented(8.0);
        let footnote = ParagraphStyle::new(Regular, 7.8, 8.0, Left);
        let styles = [
            body,
            body.indented(0.0),
            ParagraphStyle::new(Regular, 8.0, 10.0, Center),
            ParagraphStyle::new(Regular, 26.0, 30.0, Center).spaced(38.0, 10.0),
            ParagraphStyle::new(Regular, 12.0, 15.0, Center).spaced(0.0, 10.0),
            body.indented(0.0),
            ParagraphStyle::new(Regular, 11.0, 13.0, Center),
            ParagraphStyle::new(Regular, 14.0, 13.0, Center).spaced(13.0, 6.0),
            ParagraphStyle::new(Italic, 11.0, 14.0, Center).spaced(0.0, 6.0),
            ParagraphStyle { face: Italic, ..body.indented(0.0) },
            footnote,
            ParagraphStyle { face: Bold, ..footnote },
            ParagraphStyle { face: Italic, ..footnote },
        ];
        StyleSheet { styles }
    }
}

impl StyleSheet {
    /// Default styles with the running header sized from the page settings.
    pub fn for_settings(settings: &PageSettings) -> Self {
        let mut sheet = StyleSheet::default();
        let header = &mut sheet.styles[StyleName::RunningHeader.index()];
        header.font_size = settings.footnote_font_size;
        header.leading = settings.footnote_font_size * 1.25;
        sheet
    }

    pub fn get(&self, name: StyleName) -> &ParagraphStyle {
        &self.styles[name.index()]
    }
}
