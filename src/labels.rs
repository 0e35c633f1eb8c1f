//! Running-header labels describing the verse range on a page.

use std::sync::LazyLock;

use regex::Regex;

use crate::model::{LineUnit, Provenance};

const OFFICIAL_DECLARATIONS: &str = "official-declarations";

static TRAILING_CHAPTER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+\d+[A-Za-z]?$").expect("valid chapter suffix regex"));

/// Label for the units on one page, e.g. `Genesis 1:3–17`. Not uppercased.
pub fn range_label(units: &[LineUnit]) -> String {
    let verses: Vec<&LineUnit> = units.iter().filter(|u| u.is_verse()).collect();
    let (Some(&head), Some(&last)) = (verses.first(), verses.last()) else {
        return non_verse_label(units);
    };
    let first = verses.iter().copied().find(|u| u.first_line).unwrap_or(head);

    let start = &first.source;
    let end = &last.source;
    let start_verse = first.verse.as_deref().unwrap_or("");
    let end_verse = last.verse.as_deref().unwrap_or("");

    if same_chapter(start, end) {
        return chapter_verse_label(&start.chapter_title, start_verse, end_verse);
    }
    if start.book_slug == end.book_slug {
        let book_name = [&start.chapter_title, &end.chapter_title]
            .into_iter()
            .map(|title| book_name_from_title(title))
            .find(|name| !name.is_empty())
            .unwrap_or_else(|| {
                start
                    .book_abbrev
                    .clone()
                    .filter(|a| !a.is_empty())
                    .unwrap_or_else(|| start.book_name.clone())
            });
        return format!(
            "{book_name} {}:{start_verse}\u{2013}{}:{end_verse}",
            start.chapter, end.chapter
        );
    }
    format!(
        "{}:{start_verse}\u{2013}{}:{end_verse}",
        start.chapter_title, end.chapter_title
    )
}

/// Chapter numbers restart in every book, so a chapter is its book and number.
fn same_chapter(a: &Provenance, b: &Provenance) -> bool {
    a.book_slug == b.book_slug && a.chapter == b.chapter
}

fn chapter_verse_label(title: &str, start: &str, end: &str) -> String {
    if start == end {
        format!("{title}:{start}")
    } else {
        format!("{title}:{start}\u{2013}{end}")
    }
}

/// Chapter title without its trailing chapter number.
pub fn book_name_from_title(title: &str) -> String {
    TRAILING_CHAPTER.replace(title, "").trim().to_string()
}

fn non_verse_label(units: &[LineUnit]) -> String {
    let mut in_chapter = units.iter().filter(|u| !u.source.chapter.is_empty());
    let Some(first) = in_chapter.next() else {
        return String::new();
    };
    let last = in_chapter.last().unwrap_or(first);
    let (start, end) = (&first.source, &last.source);

    if start.book_slug == OFFICIAL_DECLARATIONS && end.book_slug == OFFICIAL_DECLARATIONS {
        return if start.chapter == end.chapter {
            format!("OFFICIAL DECLARATION {}", start.chapter)
        } else {
            format!("OFFICIAL DECLARATION {}-{}", start.chapter, end.chapter)
        };
    }
    if same_chapter(start, end) {
        start.chapter_title.clone()
    } else {
        format!("{}\u{2013}{}", start.chapter_title, end.chapter_title)
    }
}
