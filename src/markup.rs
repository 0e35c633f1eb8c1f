//! Inline markup handling for verse and footnote text.
//!
//! Markup is a small HTML subset: `b`/`strong`, `i`/`em`, `sup`, `a href`,
//! `span class="verse-number"` and `br`. It is parsed with roxmltree after
//! HTML entities and void `br` tags are rewritten into well-formed XML.

use std::sync::LazyLock;

use hyphenation::{Hyphenator, Language, Load, Standard};
use regex::{Captures, Regex};

pub const VERSE_NUMBER_CLASS: &str = "verse-number";
/// Invisible break opportunity inside a word; shown as `-` when the line breaks there.
pub const SOFT_HYPHEN: char = '\u{ad}';
/// Thin space set after a dash; lines may also break there.
pub const HAIR_SPACE: char = '\u{200a}';

static BREAK_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)<\s*/?\s*br\s*/?\s*>").expect("valid break regex"));
static CLOSING_BREAK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)</br\s*>").expect("valid closing break regex"));
static SPLIT_BREAK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)<br\s*/?>").expect("valid split regex"));
static ENTITY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"&(?:(#[0-9]+|#[xX][0-9a-fA-F]+|[A-Za-z][A-Za-z0-9]*);)?").expect("valid entity regex")
});
static TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]+>").expect("valid tag regex"));
static MULTI_SPACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s{2,}").expect("valid whitespace regex"));
static SUP_CONTENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<sup[^>]*>(.*?)</sup>").expect("valid sup regex"));
static SPACE_AFTER_SUP: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"</sup>\s+([A-Za-z0-9])").expect("valid sup spacing regex"));
static SUP_BETWEEN_LETTERS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"([A-Za-z])(<sup[^>]*>(?:[^<]|<[^>]*>)*?</sup>)([A-Za-z])").expect("valid sup regex")
});
static LETTER_BEFORE_ANCHOR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([A-Za-z])<a\b").expect("valid anchor regex"));
static PERIOD_BEFORE_ANCHOR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\.\s*<a\b").expect("valid anchor regex"));
static STUDY_PREFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(TG|HEB)\s*([A-Za-z])").expect("valid prefix regex"));
static ANCHOR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?s)<a\b[^>]*?\bhref\s*=\s*"([^"]*)"[^>]*>(.*?)</a>"#).expect("valid anchor regex")
});
static SPACED_DASH: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\s*(\x{2013}|\x{2014}|&[mn]dash;|&#821[12];|-)\s*").expect("valid dash regex")
});
static LONG_WORD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"&[#A-Za-z0-9]+;|[A-Za-z]{7,}").expect("valid word regex"));

static HYPHENATOR: LazyLock<Option<Standard>> =
    LazyLock::new(|| match Standard::from_embedded(Language::EnglishUS) {
        Ok(dict) => Some(dict),
        Err(e) => {
            log::warn!("en-US hyphenation patterns unavailable: {e}");
            None
        }
    });

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SpanStyle {
    pub bold: bool,
    pub italic: bool,
    pub superscript: bool,
    pub verse_number: bool,
    pub href: Option<String>,
}

/// A run of text sharing one inline style.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Span {
    pub text: String,
    pub style: SpanStyle,
}

/// What [`rewrite_links`] should do with one anchor.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LinkAction {
    Keep,
    Retarget(String),
    Unwrap,
}

fn named_entity(name: &str) -> Option<char> {
    let ch = match name {
        "amp" => '&',
        "lt" => '<',
        "gt" => '>',
        "quot" => '"',
        "apos" => '\'',
        "nbsp" => '\u{a0}',
        "ndash" => '\u{2013}',
        "mdash" => '\u{2014}',
        "lsquo" => '\u{2018}',
        "rsquo" => '\u{2019}',
        "ldquo" => '\u{201c}',
        "rdquo" => '\u{201d}',
        "hellip" => '\u{2026}',
        "middot" => '\u{b7}',
        "para" => '\u{b6}',
        "sect" => '\u{a7}',
        "thinsp" => '\u{2009}',
        "hairsp" => '\u{200a}',
        "shy" => '\u{ad}',
        _ => return None,
    };
    Some(ch)
}

fn decode_entity(body: &str) -> Option<char> {
    if let Some(num) = body.strip_prefix('#') {
        let code = match num.strip_prefix(['x', 'X']) {
            Some(hex) => u32::from_str_radix(hex, 16).ok()?,
            None => num.parse().ok()?,
        };
        return char::from_u32(code);
    }
    named_entity(body)
}

/// Replace HTML entities with characters. With `keep_markup` the result stays
/// well-formed XML: `<`, `>` and `&` are re-escaped and stray ampersands escaped.
fn decode_entities(text: &str, keep_markup: bool) -> String {
    ENTITY
        .replace_all(text, |caps: &Captures| {
            let Some(body) = caps.get(1).map(|m| m.as_str()) else {
                return if keep_markup { "&amp;".to_string() } else { "&".to_string() };
            };
            if keep_markup && matches!(body, "quot" | "apos") {
                return format!("&{body};");
            }
            match decode_entity(body) {
                Some('&') if keep_markup => "&amp;".to_string(),
                Some('<') if keep_markup => "&lt;".to_string(),
                Some('>') if keep_markup => "&gt;".to_string(),
                Some(ch) => ch.to_string(),
                None if keep_markup => format!("&amp;{body};"),
                None => caps[0].to_string(),
            }
        })
        .into_owned()
}

pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(ch),
        }
    }
    out
}

fn escape_attr(text: &str) -> String {
    escape(text).replace('"', "&quot;")
}

fn collect_spans(node: roxmltree::Node, style: &SpanStyle, out: &mut Vec<Span>) {
    for child in node.children() {
        if child.is_text() {
            if let Some(text) = child.text() {
                out.push(Span {
                    text: text.to_string(),
                    style: style.clone(),
                });
            }
            continue;
        }
        if !child.is_element() {
            continue;
        }
        let mut inner = style.clone();
        match child.tag_name().name().to_ascii_lowercase().as_str() {
            "b" | "strong" => inner.bold = true,
            "i" | "em" => inner.italic = true,
            "sup" => inner.superscript = true,
            "a" => {
                if let Some(href) = child.attribute("href") {
                    inner.href = Some(href.to_string());
                }
            }
            "span" => {
                let is_number = child
                    .attribute("class")
                    .is_some_and(|c| c.split_whitespace().any(|c| c == VERSE_NUMBER_CLASS));
                if is_number {
                    inner.verse_number = true;
                }
            }
            "br" => {
                out.push(Span {
                    text: " ".to_string(),
                    style: inner,
                });
                continue;
            }
            _ => {}
        }
        collect_spans(child, &inner, out);
    }
}

/// Parse markup into styled spans. Malformed markup degrades to one plain span.
pub fn parse_spans(markup: &str) -> Vec<Span> {
    let prepared = format!(
        "<root>{}</root>",
        decode_entities(&BREAK_TAG.replace_all(markup, "<br/>"), true)
    );
    match roxmltree::Document::parse(&prepared) {
        Ok(doc) => {
            let mut spans = Vec::new();
            collect_spans(doc.root_element(), &SpanStyle::default(), &mut spans);
            spans
        }
        Err(e) => {
            log::warn!("Malformed markup ({e}), rendering as plain text: {markup}");
            vec![Span {
                text: strip_tags(markup),
                style: SpanStyle::default(),
            }]
        }
    }
}

/// Serialize spans back to markup, merging neighbours with the same style.
pub fn serialize(spans: &[Span]) -> String {
    let mut merged: Vec<Span> = Vec::new();
    for span in spans {
        match merged.last_mut() {
            Some(last) if last.style == span.style => last.text.push_str(&span.text),
            _ => merged.push(span.clone()),
        }
    }

    let mut out = String::new();
    for span in merged {
        let mut piece = escape(&span.text);
        if span.style.superscript {
            piece = format!("<sup>{piece}</sup>");
        }
        if span.style.italic {
            piece = format!("<i>{piece}</i>");
        }
        if span.style.bold {
            piece = format!("<b>{piece}</b>");
        }
        if span.style.verse_number {
            piece = format!("<span class=\"{VERSE_NUMBER_CLASS}\">{piece}</span>");
        }
        if let Some(href) = &span.style.href {
            piece = format!("<a href=\"{}\">{piece}</a>", escape_attr(href));
        }
        out.push_str(&piece);
    }
    out
}

/// Plain text with tags removed, entities decoded and whitespace collapsed.
pub fn strip_tags(markup: &str) -> String {
    let text = TAG.replace_all(markup, "");
    let text = decode_entities(&text, false).replace(SOFT_HYPHEN, "");
    MULTI_SPACE.replace_all(&text, " ").trim().to_string()
}

/// Split a paragraph at `<br>` tags in any spelling. Blank segments are kept.
pub fn split_on_breaks(markup: &str) -> Vec<String> {
    let normalized = CLOSING_BREAK.replace_all(markup, "<br/>");
    SPLIT_BREAK
        .split(&normalized)
        .map(str::to_string)
        .collect()
}

/// Lowercased footnote letters marked by single-letter `<sup>` elements, in order.
pub fn footnote_letters(markup: &str) -> Vec<char> {
    SUP_CONTENT
        .captures_iter(markup)
        .filter_map(|caps| {
            let plain = TAG.replace_all(&caps[1], "");
            let mut chars = plain.trim().chars();
            match (chars.next(), chars.next()) {
                (Some(ch), None) if ch.is_alphabetic() => ch.to_lowercase().next(),
                _ => None,
            }
        })
        .collect()
}

/// Remove whitespace between a footnote marker and the word it marks.
pub fn collapse_space_after_sup(markup: &str) -> String {
    SPACE_AFTER_SUP.replace_all(markup, "</sup>$1").into_owned()
}

/// Clean a verse segment before wrapping: in-page anchors are unwrapped, a
/// marker squeezed between two letters gets a leading space, and the space
/// after each marker is removed.
pub fn prepare_verse_markup(markup: &str) -> String {
    let unwrapped = rewrite_links(markup, |href| {
        if href.starts_with('#') {
            LinkAction::Unwrap
        } else {
            LinkAction::Keep
        }
    });
    let spaced = SUP_BETWEEN_LETTERS.replace_all(&unwrapped, "$1 $2$3");
    hyphenate_markup(&collapse_space_after_sup(&spaced))
}

/// Normalize footnote text for rendering.
pub fn normalize_entry_markup(markup: &str) -> String {
    let text = decode_entities(markup, true).replace('\u{a0}', " ");
    let text = collapse_space_after_sup(&text);
    let text = LETTER_BEFORE_ANCHOR.replace_all(&text, "$1 <a");
    let text = PERIOD_BEFORE_ANCHOR.replace_all(&text, ". <a");
    let text = STUDY_PREFIX.replace_all(&text, "$1 $2");
    hyphenate_markup(&MULTI_SPACE.replace_all(&text, " "))
}

/// Drop the spaces around en dashes, em dashes and hyphens and put a hair
/// space after the dash.
pub fn tighten_dashes(text: &str) -> String {
    SPACED_DASH
        .replace_all(text, format!("${{1}}{HAIR_SPACE}").as_str())
        .into_owned()
}

/// Soft hyphens at every en-US break point of `word`.
pub fn hyphenate_word(word: &str) -> String {
    let Some(dict) = HYPHENATOR.as_ref() else {
        return word.to_string();
    };
    let breaks = dict.hyphenate(word).breaks;
    let mut out = String::with_capacity(word.len() + 2 * breaks.len());
    let mut last = 0;
    for at in breaks {
        out.push_str(&word[last..at]);
        out.push(SOFT_HYPHEN);
        last = at;
    }
    out.push_str(&word[last..]);
    out
}

fn hyphenate_text(text: &str) -> String {
    let tightened = tighten_dashes(text);
    LONG_WORD
        .replace_all(&tightened, |caps: &Captures| {
            let found = &caps[0];
            if found.starts_with('&') {
                found.to_string()
            } else {
                hyphenate_word(found)
            }
        })
        .into_owned()
}

/// Tighten dashes and hyphenate words of seven or more letters in the text
/// between tags. Tags and attribute values are left alone.
pub fn hyphenate_markup(markup: &str) -> String {
    let mut out = String::with_capacity(markup.len() + markup.len() / 8);
    let mut last = 0;
    for tag in TAG.find_iter(markup) {
        out.push_str(&hyphenate_text(&markup[last..tag.start()]));
        out.push_str(tag.as_str());
        last = tag.end();
    }
    out.push_str(&hyphenate_text(&markup[last..]));
    out
}

/// Apply `decide` to every anchor with an `href`.
pub fn rewrite_links(markup: &str, decide: impl Fn(&str) -> LinkAction) -> String {
    if !markup.contains("<a") {
        return markup.to_string();
    }
    ANCHOR
        .replace_all(markup, |caps: &Captures| {
            let href = decode_entities(&caps[1], false);
            match decide(&href) {
                LinkAction::Keep => caps[0].to_string(),
                LinkAction::Retarget(target) => {
                    format!("<a href=\"{}\">{}</a>", escape_attr(&target), &caps[2])
                }
                LinkAction::Unwrap => caps[2].to_string(),
            }
        })
        .into_owned()
}

/// Verse paragraph markup with its number as a leading span.
pub fn verse_markup(number: &str, html: &str) -> String {
    format!("<span class=\"{VERSE_NUMBER_CLASS}\">{}</span> {html}", escape(number))
}

/// Re-mark a leading verse number that lost its span while wrapping.
pub fn ensure_verse_number(line: &str, number: &str) -> String {
    if number.is_empty() || line.contains(VERSE_NUMBER_CLASS) {
        return line.to_string();
    }
    let stripped = line.trim_start();
    let Some(remainder) = stripped.strip_prefix(number) else {
        return line.to_string();
    };
    let leading = &line[..line.len() - stripped.len()];
    let gap = match remainder.chars().next() {
        Some(ch) if !ch.is_whitespace() && !remainder.starts_with("&nbsp;") => " ",
        _ => "",
    };
    format!(
        "{leading}<span class=\"{VERSE_NUMBER_CLASS}\">{number}</span>{gap}{remainder}"
    )
}
