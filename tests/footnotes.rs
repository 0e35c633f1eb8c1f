mod common;

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use common::{FixedBackend, note, sample_corpus};
use scripture_typeset::PageSettings;
use scripture_typeset::footnotes::{
    LinkTargets, code_map_from_metadata, extract_book_chapter, footnote_height, footnote_rows,
    place_footnotes,
};
use scripture_typeset::markup::LinkAction;
use scripture_typeset::model::FootnoteEntry;

fn segmented(verse: &str, letter: &str, segments: usize) -> Arc<FootnoteEntry> {
    let mut entry = (*note("gen", "1", verse, letter, "")).clone();
    entry.segments = (0..segments).map(|i| format!("part {i}")).collect();
    Arc::new(entry)
}

fn pad(settings: &PageSettings) -> f32 {
    settings.column_gap / 2.0
}

#[test]
fn labels_repeat_only_when_they_change() {
    let ts = FixedBackend::default();
    let settings = PageSettings::default();
    let entries = vec![
        note("gen", "1", "1", "a", "see"),
        note("gen", "1", "1", "b", "see"),
        note("gen", "1", "2", "a", "see"),
        note("gen", "2", "1", "a", "see"),
    ];
    let set = footnote_rows(&ts, &settings, &entries, &BTreeSet::new(), None);

    let chapters: Vec<&str> = set.rows.iter().map(|r| r.chapter.as_str()).collect();
    let verses: Vec<&str> = set.rows.iter().map(|r| r.verse.as_str()).collect();
    let letters: Vec<&str> = set.rows.iter().map(|r| r.letter.as_str()).collect();
    assert_eq!(chapters, vec!["1", "", "", "2"]);
    assert_eq!(verses, vec!["1", "", "2", "1"]);
    assert_eq!(letters, vec!["a", "b", "a", "a"]);

    let expected: BTreeSet<(String, String)> = [
        ("gen".to_string(), "1".to_string()),
        ("gen".to_string(), "2".to_string()),
    ]
    .into_iter()
    .collect();
    assert_eq!(set.seen, expected);
}

#[test]
fn seen_chapter_loses_its_label() {
    let ts = FixedBackend::default();
    let settings = PageSettings::default();
    let seen: BTreeSet<(String, String)> = [("gen".to_string(), "1".to_string())].into_iter().collect();
    let entries = vec![note("gen", "1", "4", "a", "see")];
    let set = footnote_rows(&ts, &settings, &entries, &seen, None);
    assert_eq!(set.rows[0].chapter, "");
    assert_eq!(set.rows[0].verse, "4");
    assert_eq!(set.columns.chapter, 0.0);
}

#[test]
fn columns_fill_the_footnote_column() {
    let ts = FixedBackend::default();
    let settings = PageSettings::default();
    let entries = vec![note("gen", "12", "104", "a", "see")];
    let set = footnote_rows(&ts, &settings, &entries, &BTreeSet::new(), None);
    let cols = set.columns;
    // widest label plus one point, but never under six
    assert_eq!(cols.chapter, 11.0);
    assert_eq!(cols.verse, 16.0);
    assert_eq!(cols.letter, 6.0);
    let total = cols.chapter + cols.verse + cols.letter + cols.text;
    assert!((total - settings.footnote_column_width()).abs() < 1e-3);
}

#[test]
fn long_entries_split_into_one_row_per_line() {
    let ts = FixedBackend::default();
    let settings = PageSettings::default();
    let text = "a cross reference long enough to need several lines in one footnote column";
    let entries = vec![note("gen", "1", "1", "a", text)];
    let set = footnote_rows(&ts, &settings, &entries, &BTreeSet::new(), None);

    assert!(set.rows.len() > 1);
    assert_eq!(set.rows.len(), set.heights.len());
    assert!(set.lines.iter().all(|&n| n == 1));
    assert!(set.heights.iter().all(|&h| h == 10.0));
    assert_eq!(set.rows[0].letter, "a");
    assert!(set.rows[1..].iter().all(|r| r.letter.is_empty() && r.verse.is_empty()));
}

#[test]
fn segments_become_separate_rows() {
    let ts = FixedBackend::default();
    let settings = PageSettings::default();
    let set = footnote_rows(&ts, &settings, &[segmented("1", "a", 3)], &BTreeSet::new(), None);
    assert_eq!(set.rows.len(), 3);
    assert_eq!(set.rows[0].letter, "a");
    assert_eq!(set.rows[1].letter, "");
}

#[test]
fn empty_block_has_no_height() {
    let settings = PageSettings::default();
    assert_eq!(footnote_height(&[], &settings), 0.0);
}

#[test]
fn block_height_is_the_tallest_column_plus_padding() {
    let settings = PageSettings::default();
    assert_eq!(footnote_height(&[10.0], &settings), 10.0 + pad(&settings));
    assert_eq!(footnote_height(&[10.0, 10.0, 10.0], &settings), 10.0 + pad(&settings));
    let six = [10.0; 6];
    assert_eq!(footnote_height(&six, &settings), 20.0 + pad(&settings));

    let padded = PageSettings {
        footnote_rule_height: 2.0,
        footnote_extra_buffer: 3.0,
        ..PageSettings::default()
    };
    assert_eq!(footnote_height(&[10.0], &padded), 15.0 + pad(&padded));
}

#[test]
fn placement_stops_at_the_first_entry_that_does_not_fit() {
    let ts = FixedBackend::default();
    let settings = PageSettings::default();
    let first = note("gen", "1", "1", "a", "see");
    let big = segmented("2", "a", 4);
    let small = note("gen", "1", "3", "a", "see");
    let available = 10.0 + pad(&settings) + 0.5;

    let placement = place_footnotes(
        &ts,
        &settings,
        &[],
        &[first.clone(), big.clone(), small.clone()],
        available,
        &BTreeSet::new(),
    );
    assert_eq!(placement.placed, vec![first]);
    // the small entry after the oversized one waits too
    assert_eq!(placement.pending, vec![big, small]);
    assert_eq!(placement.height, 10.0 + pad(&settings));
    assert_eq!(placement.rows.rows.len(), 1);
}

#[test]
fn pending_entries_go_first() {
    let ts = FixedBackend::default();
    let settings = PageSettings::default();
    let carried = note("gen", "1", "9", "a", "see");
    let fresh = note("gen", "2", "1", "a", "see");
    let placement = place_footnotes(
        &ts,
        &settings,
        &[carried.clone()],
        &[fresh.clone()],
        1000.0,
        &BTreeSet::new(),
    );
    assert_eq!(placement.placed, vec![carried, fresh]);
    assert!(placement.pending.is_empty());
}

#[test]
fn nothing_fits_in_no_space() {
    let ts = FixedBackend::default();
    let settings = PageSettings::default();
    let entry = note("gen", "1", "1", "a", "see");
    let placement = place_footnotes(&ts, &settings, &[], &[entry.clone()], 0.0, &BTreeSet::new());
    assert!(placement.placed.is_empty());
    assert_eq!(placement.pending, vec![entry]);
    assert_eq!(placement.height, 0.0);
}

fn targets() -> LinkTargets {
    LinkTargets {
        chapter_pages: BTreeMap::from([(("1-ne".to_string(), "2".to_string()), 7)]),
        code_map: BTreeMap::from([("1-ne".to_string(), "1-ne".to_string())]),
    }
}

#[test]
fn references_resolve_to_pages() {
    let links = targets();
    assert_eq!(
        links.resolve("/study/scriptures/bofm/1-ne/2?lang=eng"),
        LinkAction::Retarget("#page-7".to_string())
    );
    assert_eq!(links.resolve("/study/scriptures/bofm/1-ne/3?lang=eng"), LinkAction::Keep);
    assert_eq!(links.resolve("/study/scriptures/bofm/alma/2"), LinkAction::Keep);
    assert_eq!(links.resolve("#note1a"), LinkAction::Unwrap);
    assert_eq!(links.resolve("https://example.com/"), LinkAction::Keep);
}

#[test]
fn book_and_chapter_come_from_the_path() {
    assert_eq!(
        extract_book_chapter("/study/scriptures/ot/gen/1?lang=eng&id=p3"),
        Some(("gen".to_string(), "1".to_string()))
    );
    assert_eq!(
        extract_book_chapter("/study/scriptures/ot/gen"),
        Some(("gen".to_string(), String::new()))
    );
    assert_eq!(extract_book_chapter("/study/manual/gen/1"), None);
}

#[test]
fn code_map_reads_reference_uris() {
    let corpus = sample_corpus();
    let map = code_map_from_metadata(corpus.metadata.as_ref());
    assert_eq!(map.get("1-ne").map(String::as_str), Some("1-ne"));
    assert_eq!(map.get("2-ne").map(String::as_str), Some("2-ne"));
    assert!(!map.contains_key("gen"));
    assert!(code_map_from_metadata(None).is_empty());
}

#[test]
fn rows_carry_retargeted_links() {
    let ts = FixedBackend::default();
    let settings = PageSettings::default();
    let entry = note(
        "1-ne",
        "1",
        "3",
        "a",
        "<a href=\"/study/scriptures/bofm/1-ne/2?lang=eng\">see</a>",
    );
    let links = targets();
    let set = footnote_rows(&ts, &settings, &[entry.clone()], &BTreeSet::new(), Some(&links));
    assert!(set.rows[0].markup.contains("#page-7"), "{}", set.rows[0].markup);

    let unlinked = footnote_rows(&ts, &settings, &[entry], &BTreeSet::new(), None);
    assert!(!unlinked.rows[0].markup.contains("#page-7"));
}
