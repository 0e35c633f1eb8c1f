use crate::fonts::{FontBook, FontFace};
use crate::markup::{self, HAIR_SPACE, SOFT_HYPHEN, Span, SpanStyle};
use crate::model::Fragment;
use crate::settings::{PageSettings, ParagraphStyle, StyleName, StyleSheet};

/// Footnote markers are set at 8pt against 11pt body text.
pub const SUPERSCRIPT_SCALE: f32 = 8.0 / 11.0;
/// Baseline rise of a superscript, as a fraction of the style's font size.
pub const SUPERSCRIPT_RISE: f32 = 0.35;
/// Advance of a hair space, in ems.
pub const HAIR_SPACE_EM: f32 = 0.1;

/// One wrapped line: styled fragments plus the line re-serialized as markup.
#[derive(Clone, Debug, PartialEq)]
pub struct WrappedLine {
    pub markup: String,
    pub fragments: Vec<Fragment>,
    pub width: f32,
}

/// Text measurement and line breaking used by the layout core.
///
/// Implementations must be deterministic, and wrapping a line's own markup at
/// the same width must give back that single line.
pub trait Typesetter: Sync {
    fn style(&self, name: StyleName) -> ParagraphStyle;

    /// Height of `markup` set as one paragraph, including the style's spacing.
    fn measure(&self, markup: &str, style: StyleName, width: f32) -> f32 {
        let st = self.style(style);
        let lines = self.wrap(markup, style, width).len().max(1);
        st.space_before + lines as f32 * self.line_height(style) + st.space_after
    }

    fn wrap(&self, markup: &str, style: StyleName, width: f32) -> Vec<WrappedLine>;

    /// Single-line advance width of plain text.
    fn text_width(&self, text: &str, style: StyleName) -> f32;

    fn line_height(&self, style: StyleName) -> f32 {
        self.style(style).leading
    }
}

/// [`Typesetter`] backed by per-face advance widths.
#[derive(Clone, Debug)]
pub struct MetricsBackend {
    fonts: FontBook,
    styles: StyleSheet,
}

/// How a word joins the word before it on the same line.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Joint {
    Glued,
    Space,
    Hair,
}

struct WordChunk {
    style: SpanStyle,
    face: FontFace,
    font_size: f32,
    text: String,
    x_offset: f32,
    width: f32,
    joint: Joint,
}

/// Greedy line state for one paragraph.
struct LineFill {
    width: f32,
    lines: Vec<WrappedLine>,
    current: Vec<WordChunk>,
    current_x: f32,
    /// Index in `current` where the run of glued words ending the line starts.
    glue_start: usize,
}

impl MetricsBackend {
    pub fn new(fonts: FontBook, styles: StyleSheet) -> Self {
        MetricsBackend { fonts, styles }
    }

    /// Built-in Times metrics with the default style sheet.
    pub fn builtin(settings: &PageSettings) -> Self {
        MetricsBackend::new(FontBook::builtin(), StyleSheet::for_settings(settings))
    }

    pub fn fonts(&self) -> &FontBook {
        &self.fonts
    }

    pub fn styles(&self) -> &StyleSheet {
        &self.styles
    }

    fn span_face(&self, base: &ParagraphStyle, span: &Span) -> (FontFace, f32) {
        let marker = span.style.superscript && is_single_letter(&span.text);
        let bold = base.face.is_bold() || span.style.bold || span.style.verse_number;
        let italic = base.face.is_italic() || span.style.italic || marker;
        let size = if span.style.superscript {
            base.font_size * SUPERSCRIPT_SCALE
        } else {
            base.font_size
        };
        (FontFace::from_flags(bold, italic), size)
    }

    /// Put one word on the line, breaking lines and hyphenating as needed.
    #[allow(clippy::too_many_arguments)]
    fn place(
        &self,
        fill: &mut LineFill,
        style: &SpanStyle,
        face: FontFace,
        font_size: f32,
        word: &str,
        joint: Joint,
        joint_w: f32,
    ) {
        let metrics = self.fonts.face(face);
        let mut rest = word.to_string();
        let mut joint = joint;
        loop {
            let visible: String = rest.chars().filter(|&c| c != SOFT_HYPHEN).collect();
            let ww = metrics.word_width(&visible, font_size);
            let breakable = fill.current.is_empty() || joint != Joint::Glued;
            let lead = if fill.current.is_empty() || joint == Joint::Glued {
                0.0
            } else {
                joint_w
            };
            let x = fill.current_x + lead;
            let chunk = |text: String, width: f32, joint: Joint| WordChunk {
                style: style.clone(),
                face,
                font_size,
                text,
                x_offset: x,
                width,
                joint,
            };

            let fits = x + ww <= fill.width;
            if !fits
                && let Some((head, tail)) = split_at_soft_hyphen(&rest, fill.width - x, |t| {
                    metrics.word_width(t, font_size)
                })
            {
                let head_w = metrics.word_width(&head, font_size);
                fill.current.push(chunk(head, head_w, joint));
                fill.lines.push(Self::finish_line(&mut fill.current));
                fill.current_x = 0.0;
                fill.glue_start = 0;
                rest = tail;
                joint = Joint::Glued;
                continue;
            }

            if fits || fill.current.is_empty() {
                if breakable {
                    fill.glue_start = fill.current.len();
                }
                fill.current.push(chunk(visible, ww, joint));
                fill.current_x = x + ww;
                return;
            }

            if breakable || fill.glue_start == 0 {
                fill.lines.push(Self::finish_line(&mut fill.current));
                fill.current_x = 0.0;
                fill.glue_start = 0;
                joint = Joint::Glued;
            } else {
                // carry the glued word onto the next line
                let mut carried = fill.current.split_off(fill.glue_start);
                fill.lines.push(Self::finish_line(&mut fill.current));
                let shift = carried[0].x_offset;
                for chunk in &mut carried {
                    chunk.x_offset -= shift;
                }
                carried[0].joint = Joint::Glued;
                fill.current_x = carried.last().map(|c| c.x_offset + c.width).unwrap_or(0.0);
                fill.current = carried;
                fill.glue_start = 0;
            }
        }
    }

    fn finish_line(chunks: &mut Vec<WordChunk>) -> WrappedLine {
        let width = chunks.last().map(|c| c.x_offset + c.width).unwrap_or(0.0);
        let mut spans = Vec::with_capacity(chunks.len());
        let mut fragments = Vec::with_capacity(chunks.len());
        for (i, chunk) in chunks.drain(..).enumerate() {
            let joint = if i == 0 { Joint::Glued } else { chunk.joint };
            let text = match joint {
                Joint::Glued => chunk.text.clone(),
                Joint::Space => format!(" {}", chunk.text),
                Joint::Hair => format!("{HAIR_SPACE}{}", chunk.text),
            };
            spans.push(Span {
                text,
                style: chunk.style.clone(),
            });
            fragments.push(Fragment {
                text: chunk.text,
                face: chunk.face,
                font_size: chunk.font_size,
                superscript: chunk.style.superscript,
                href: chunk.style.href,
                x: chunk.x_offset,
                width: chunk.width,
                gap_before: joint == Joint::Space,
            });
        }
        WrappedLine {
            markup: markup::serialize(&spans),
            fragments,
            width,
        }
    }
}

/// Split `word` at the last soft hyphen whose head, with a `-` added, fits
/// in `room`. Returns the visible head and the remaining word.
fn split_at_soft_hyphen(
    word: &str,
    room: f32,
    measure: impl Fn(&str) -> f32,
) -> Option<(String, String)> {
    let mut best = None;
    for (at, _) in word.match_indices(SOFT_HYPHEN) {
        let mut head: String = word[..at].chars().filter(|&c| c != SOFT_HYPHEN).collect();
        if head.is_empty() {
            continue;
        }
        head.push('-');
        if measure(&head) > room {
            break;
        }
        let tail = &word[at + SOFT_HYPHEN.len_utf8()..];
        if tail.chars().any(|c| c != SOFT_HYPHEN) {
            best = Some((head, tail.to_string()));
        }
    }
    best
}

fn is_single_letter(text: &str) -> bool {
    let mut chars = text.trim().chars();
    matches!((chars.next(), chars.next()), (Some(ch), None) if ch.is_alphabetic())
}

impl Typesetter for MetricsBackend {
    fn style(&self, name: StyleName) -> ParagraphStyle {
        *self.styles.get(name)
    }

    /// Greedy line filling. No space is inserted between spans unless the
    /// text at the boundary has whitespace, and words glued across spans
    /// (a word and its footnote marker) move to the next line together. A
    /// word that does not fit is split at its last soft hyphen that leaves
    /// room for a visible `-`.
    fn wrap(&self, markup: &str, style: StyleName, width: f32) -> Vec<WrappedLine> {
        let base = self.style(style);
        let mut fill = LineFill {
            width,
            lines: Vec::new(),
            current: Vec::new(),
            current_x: base.first_line_indent,
            glue_start: 0,
        };
        // joint and space width carried over from the end of the previous span
        let mut joint = Joint::Glued;
        let mut joint_space_w = 0.0;

        for span in markup::parse_spans(markup) {
            let (face, font_size) = self.span_face(&base, &span);
            let space_w = self.fonts.face(face).space_width(font_size);
            let mut word = String::new();
            for ch in span.text.chars() {
                if ch == HAIR_SPACE || ch.is_whitespace() {
                    if !word.is_empty() {
                        let w = std::mem::take(&mut word);
                        self.place(&mut fill, &span.style, face, font_size, &w, joint, joint_space_w);
                        joint = Joint::Glued;
                    }
                    if ch != HAIR_SPACE {
                        joint = Joint::Space;
                        joint_space_w = space_w;
                    } else if joint == Joint::Glued {
                        joint = Joint::Hair;
                        joint_space_w = font_size * HAIR_SPACE_EM;
                    }
                } else {
                    word.push(ch);
                }
            }
            if !word.is_empty() {
                self.place(&mut fill, &span.style, face, font_size, &word, joint, joint_space_w);
                joint = Joint::Glued;
            }
        }

        if !fill.current.is_empty() || fill.lines.is_empty() {
            fill.lines.push(Self::finish_line(&mut fill.current));
        }
        fill.lines
    }

    fn text_width(&self, text: &str, style: StyleName) -> f32 {
        let base = self.style(style);
        self.fonts.face(base.face).word_width(text, base.font_size)
    }
}
