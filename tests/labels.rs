mod common;

use std::sync::Arc;

use common::{provenance, unit, verse_unit};
use scripture_typeset::labels::{book_name_from_title, range_label};
use scripture_typeset::model::{LineUnit, Provenance};

fn verse(book: &str, chapter: &str, number: &str) -> LineUnit {
    verse_unit(book, chapter, number, 10.0, Vec::new())
}

fn continuation(book: &str, chapter: &str, number: &str) -> LineUnit {
    LineUnit {
        first_line: false,
        ..verse(book, chapter, number)
    }
}

fn titled(mut unit: LineUnit, title: &str) -> LineUnit {
    let mut source = (*unit.source).clone();
    source.chapter_title = title.to_string();
    unit.source = Arc::new(source);
    unit
}

#[test]
fn one_chapter_range() {
    let units = vec![verse("gen", "1", "3"), verse("gen", "1", "4"), verse("gen", "1", "17")];
    assert_eq!(range_label(&units), "Gen 1:3\u{2013}17");
}

#[test]
fn single_verse_has_no_range() {
    assert_eq!(range_label(&[verse("gen", "1", "5")]), "Gen 1:5");
}

#[test]
fn leading_continuation_is_skipped() {
    let units = vec![
        continuation("gen", "1", "2"),
        verse("gen", "1", "3"),
        continuation("gen", "1", "4"),
    ];
    assert_eq!(range_label(&units), "Gen 1:3\u{2013}4");
}

#[test]
fn chapters_of_one_book() {
    let units = vec![
        titled(verse("1-ne", "3", "20"), "1 Nephi 3"),
        titled(verse("1-ne", "4", "2"), "1 Nephi 4"),
    ];
    assert_eq!(range_label(&units), "1 Nephi 3:20\u{2013}4:2");
}

#[test]
fn book_name_falls_back_to_abbreviation() {
    let mut source: Provenance = (*provenance("dc", "5")).clone();
    source.chapter_title = String::new();
    source.book_abbrev = Some("D&C".to_string());
    let first = LineUnit {
        source: Arc::new(source.clone()),
        ..verse("dc", "5", "1")
    };
    source.chapter = "6".to_string();
    let second = LineUnit {
        source: Arc::new(source),
        ..verse("dc", "6", "3")
    };
    assert_eq!(range_label(&[first, second]), "D&C 5:1\u{2013}6:3");
}

#[test]
fn range_across_books() {
    let units = vec![verse("gen", "50", "26"), verse("ex", "1", "4")];
    assert_eq!(range_label(&units), "Gen 50:26\u{2013}Ex 1:4");
}

#[test]
fn first_chapters_of_two_books_are_not_one_chapter() {
    let units = vec![verse("jarom", "1", "15"), verse("omni", "1", "3")];
    assert_eq!(range_label(&units), "Jarom 1:15\u{2013}Omni 1:3");

    let mut next_book = unit(10.0);
    next_book.source = provenance("ex", "1");
    let mut first = unit(10.0);
    first.source = provenance("gen", "1");
    assert_eq!(range_label(&[first, next_book]), "Gen 1\u{2013}Ex 1");
}

#[test]
fn pages_without_verses_use_chapter_titles() {
    assert_eq!(range_label(&[unit(10.0)]), "Gen 1");

    let mut second = unit(10.0);
    second.source = provenance("gen", "2");
    assert_eq!(range_label(&[unit(10.0), second]), "Gen 1\u{2013}Gen 2");

    let mut blank = unit(10.0);
    blank.source = provenance("gen", "");
    assert_eq!(range_label(&[blank]), "");
    assert_eq!(range_label(&[]), "");
}

#[test]
fn official_declarations_are_named() {
    let mut first = unit(10.0);
    first.source = provenance("official-declarations", "1");
    assert_eq!(range_label(&[first.clone()]), "OFFICIAL DECLARATION 1");

    let mut second = unit(10.0);
    second.source = provenance("official-declarations", "2");
    assert_eq!(range_label(&[first, second]), "OFFICIAL DECLARATION 1-2");
}

#[test]
fn trailing_chapter_number_is_removed() {
    assert_eq!(book_name_from_title("1 Nephi 3"), "1 Nephi");
    assert_eq!(book_name_from_title("Psalm 119"), "Psalm");
    assert_eq!(book_name_from_title("Section 2a"), "Section");
    assert_eq!(book_name_from_title("Genesis"), "Genesis");
}
