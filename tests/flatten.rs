mod common;

use std::sync::{Mutex, Once};

use common::{FixedBackend, book_json, introduced_notes};
use scripture_typeset::PageSettings;
use scripture_typeset::flatten::{DOCTRINE_AND_COVENANTS, FlattenOptions, flatten_book};
use scripture_typeset::model::Book;
use scripture_typeset::settings::StyleName;

/// Collects warnings so tests can check what was reported.
struct WarningLog(Mutex<Vec<String>>);

impl log::Log for WarningLog {
    fn enabled(&self, metadata: &log::Metadata) -> bool {
        metadata.level() <= log::Level::Warn
    }

    fn log(&self, record: &log::Record) {
        if self.enabled(record.metadata())
            && let Ok(mut lines) = self.0.lock()
        {
            lines.push(record.args().to_string());
        }
    }

    fn flush(&self) {}
}

static WARNINGS: WarningLog = WarningLog(Mutex::new(Vec::new()));

fn warnings() -> Vec<String> {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        log::set_logger(&WARNINGS).expect("logger installs once");
        log::set_max_level(log::LevelFilter::Warn);
    });
    WARNINGS.0.lock().expect("warning log").clone()
}

fn book(value: serde_json::Value) -> Book {
    serde_json::from_value(value).expect("book deserializes")
}

fn genesis() -> Book {
    book(serde_json::json!({
        "name": "Genesis",
        "slug": "gen",
        "subtitle": "The First Book of Moses",
        "chapters": [
            {
                "number": "1",
                "paragraphs": [
                    { "kind": "summary", "html": "God creates the earth." },
                    { "kind": "verse", "verse": "1", "html": "In the<sup>a</sup> beginning." },
                    { "kind": "verse", "verse": "2", "html": "And the earth was without form, and void; and darkness was upon the face of the deep.<sup>b</sup>" },
                ],
                "footnotes": [
                    { "verse": "1", "letter": "a", "text": "see" },
                    { "verse": "2", "letter": "b", "text": "see" },
                    { "verse": "2", "letter": "c", "text": "unmarked" },
                ],
            },
            {
                "number": "2",
                "paragraphs": [
                    { "kind": "verse", "verse": "1", "html": "Thus the heavens<br/><br/>were finished." },
                ],
            },
        ],
    }))
}

#[test]
fn book_opens_with_its_title() {
    let ts = FixedBackend::default();
    let settings = PageSettings::default();
    let flows = flatten_book("old-testament", &genesis(), &ts, &settings, FlattenOptions::default());
    assert_eq!(flows.len(), 2);

    let units = &flows[0].units;
    assert_eq!(units[0].style, StyleName::BookTitle);
    assert!(units[0].full_width);
    assert_eq!(units[0].markup, "GENESIS");
    assert_eq!(units[1].style, StyleName::BookSubtitle);
    assert_eq!(units[1].markup, "THE FIRST BOOK OF MOSES");
    assert!(flows[1].units.iter().all(|u| u.style != StyleName::BookTitle));
}

#[test]
fn chapters_get_headings_in_the_columns() {
    let ts = FixedBackend::default();
    let settings = PageSettings::default();
    let flows = flatten_book("old-testament", &genesis(), &ts, &settings, FlattenOptions::default());

    let heading = flows[1]
        .units
        .iter()
        .find(|u| u.style == StyleName::ChapterHeading)
        .expect("second chapter has a heading");
    assert_eq!(heading.markup, "Genesis 2");
    assert!(!heading.full_width);
    assert!(flows.iter().all(|f| f.header.is_empty() && !f.force_new_page));
}

#[test]
fn chapter_headers_move_headings_out_of_the_text() {
    let ts = FixedBackend::default();
    let settings = PageSettings::default();
    let options = FlattenOptions {
        chapter_headers: true,
    };
    let flows = flatten_book("old-testament", &genesis(), &ts, &settings, options);
    for flow in &flows {
        assert_eq!(flow.header.len(), 1);
        assert_eq!(flow.header[0].style, StyleName::ChapterHeading);
        assert!(flow.header[0].full_width);
        assert!(flow.units.iter().all(|u| u.style != StyleName::ChapterHeading));
    }
}

#[test]
fn single_untitled_chapter_has_no_heading() {
    let ts = FixedBackend::default();
    let settings = PageSettings::default();
    let single = book(book_json("jarom", "Jarom", 1, 4));
    let flows = flatten_book("book-of-mormon", &single, &ts, &settings, FlattenOptions::default());
    assert!(flows[0].units.iter().all(|u| u.style != StyleName::ChapterHeading));
}

#[test]
fn verses_carry_number_and_provenance() {
    let ts = FixedBackend::default();
    let settings = PageSettings::default();
    let flows = flatten_book("old-testament", &genesis(), &ts, &settings, FlattenOptions::default());
    let verses: Vec<_> = flows[0].units.iter().filter(|u| u.is_verse()).collect();

    let first = verses[0];
    assert_eq!(first.verse.as_deref(), Some("1"));
    assert!(first.first_line);
    assert_eq!(first.style, StyleName::Body);
    assert!(first.markup.contains("verse-number"));
    assert_eq!(first.source.standard_work, "old-testament");
    assert_eq!(first.source.chapter_title, "Genesis 1");

    let second: Vec<_> = verses.iter().filter(|u| u.verse.as_deref() == Some("2")).collect();
    assert!(second.len() > 1);
    assert!(second[1..].iter().all(|u| !u.first_line && u.style == StyleName::BodyCont));
    assert!(second.iter().all(|u| u.verse_line_count == second.len()));

    let summary = flows[0]
        .units
        .iter()
        .find(|u| u.style == StyleName::Preface)
        .expect("summary paragraph");
    assert!(summary.verse.is_none());
}

#[test]
fn notes_attach_to_the_line_with_their_marker() {
    let ts = FixedBackend::default();
    let settings = PageSettings::default();
    let flows = flatten_book("old-testament", &genesis(), &ts, &settings, FlattenOptions::default());
    let units = &flows[0].units;

    let verse_one = units
        .iter()
        .find(|u| u.verse.as_deref() == Some("1"))
        .expect("verse 1");
    assert_eq!(verse_one.footnotes.len(), 1);
    assert_eq!(verse_one.footnotes[0].letter, "a");
    assert_eq!(verse_one.footnotes[0].book_slug, "gen");
    assert_eq!(verse_one.footnotes[0].chapter, "1");

    // markers lost in wrapping, and unmarked notes, ride on the last line
    let verse_two: Vec<_> = units.iter().filter(|u| u.verse.as_deref() == Some("2")).collect();
    let last = verse_two.last().expect("verse 2 has lines");
    let letters: Vec<&str> = last.footnotes.iter().map(|n| n.letter.as_str()).collect();
    assert_eq!(letters, vec!["b", "c"]);
    let total: usize = verse_two.iter().map(|u| u.footnotes.len()).sum();
    assert_eq!(total, 2);
}

#[test]
fn blank_segments_become_spacers() {
    let ts = FixedBackend::default();
    let settings = PageSettings::default();
    let flows = flatten_book("old-testament", &genesis(), &ts, &settings, FlattenOptions::default());
    let verse: Vec<_> = flows[1].units.iter().filter(|u| u.verse.is_some()).collect();

    let segments: Vec<usize> = verse.iter().map(|u| u.segment_index).collect();
    assert_eq!(segments, vec![0, 1, 2]);
    assert!(verse[1].spacer);
    assert!(verse[1].markup.is_empty());
    assert_eq!(verse[1].height, 10.0);
    assert!(!verse[0].spacer && !verse[2].spacer);
    assert_eq!(verse[2].style, StyleName::BodyCont);
}

#[test]
fn verse_without_number_is_plain_text() {
    let ts = FixedBackend::default();
    let settings = PageSettings::default();
    let odd = book(serde_json::json!({
        "name": "Moses",
        "slug": "moses",
        "chapters": [{
            "number": "1",
            "paragraphs": [{ "kind": "verse", "html": "Unnumbered words." }],
        }],
    }));
    let flows = flatten_book("pearl", &odd, &ts, &settings, FlattenOptions::default());
    let last = flows[0].units.last().expect("units");
    assert_eq!(last.style, StyleName::BodyCont);
    assert!(last.verse.is_none());
}

#[test]
fn sections_keep_their_own_titles() {
    let ts = FixedBackend::default();
    let settings = PageSettings::default();
    let sections = book(serde_json::json!({
        "name": "Doctrine and Covenants",
        "slug": "dc",
        "chapters": (1..=2).map(|n| serde_json::json!({
            "number": n.to_string(),
            "title": format!("Section {n}"),
            "paragraphs": [
                { "kind": "heading", "html": format!("Section {n}") },
                { "kind": "verse", "verse": "1", "html": "Hearken, O ye people." },
            ],
        })).collect::<Vec<_>>(),
    }));
    let options = FlattenOptions {
        chapter_headers: true,
    };
    let flows = flatten_book(DOCTRINE_AND_COVENANTS, &sections, &ts, &settings, options);

    assert!(flows.iter().all(|f| f.header.is_empty()));
    for (idx, flow) in flows.iter().enumerate() {
        assert!(flow.units.iter().all(|u| u.style != StyleName::ChapterHeading));
        let titles: Vec<&str> = flow
            .units
            .iter()
            .filter(|u| u.style == StyleName::Section)
            .map(|u| u.markup.as_str())
            .collect();
        let title = format!("Section {}", idx + 1);
        assert_eq!(titles, vec![title.as_str()]);
        assert!(flow.units.iter().all(|u| u.source.chapter_title == title));
    }
}

#[test]
fn notes_on_a_verse_range_are_reported() {
    warnings();
    let ts = FixedBackend::default();
    let settings = PageSettings::default();
    let ranged = book(serde_json::json!({
        "name": "Abraham",
        "slug": "abr",
        "chapters": [{
            "number": "3",
            "paragraphs": [{ "kind": "verse", "verse": "1-2", "html": "And I<sup>a</sup> saw." }],
            "footnotes": [{ "verse": "1-2", "letter": "a", "text": "see" }],
        }],
    }));
    let flows = flatten_book("pearl", &ranged, &ts, &settings, FlattenOptions::default());

    let units = &flows[0].units;
    assert!(units.iter().any(|u| !u.footnotes.is_empty()));
    assert!(introduced_notes(units).is_empty());
    assert!(
        warnings()
            .iter()
            .any(|w| w.contains("abr 3:1-2") && w.contains("not be placed")),
        "{:?}",
        warnings()
    );
}
