//! Choose which books of a corpus get typeset.

use std::collections::BTreeSet;

use crate::error::Error;
use crate::model::StandardWork;

/// Books to keep: an optional slug filter (case-insensitive) and an
/// optional cap on books per standard work.
#[derive(Clone, Debug, Default)]
pub struct BookSelection {
    pub slugs: Vec<String>,
    pub max_per_work: Option<usize>,
}

/// Filter `works`, dropping works left without books. Every requested slug
/// must match a book, otherwise `Error::UnknownBooks` lists the missing ones.
pub fn select_books(works: &[StandardWork], selection: &BookSelection) -> Result<Vec<StandardWork>, Error> {
    let requested: Option<BTreeSet<String>> = if selection.slugs.is_empty() {
        None
    } else {
        Some(selection.slugs.iter().map(|s| s.to_lowercase()).collect())
    };
    let mut found = BTreeSet::new();
    let mut trimmed = Vec::new();

    for work in works {
        let mut books = Vec::new();
        for book in &work.books {
            let slug = book.slug.to_lowercase();
            match &requested {
                Some(wanted) if wanted.contains(&slug) => {
                    books.push(book.clone());
                    found.insert(slug);
                }
                Some(_) => {}
                None => {
                    books.push(book.clone());
                    if selection.max_per_work.is_some_and(|cap| books.len() >= cap) {
                        break;
                    }
                }
            }
        }
        if let Some(cap) = selection.max_per_work {
            books.truncate(cap);
        }
        if !books.is_empty() {
            trimmed.push(StandardWork {
                slug: work.slug.clone(),
                title: work.title.clone(),
                books,
            });
        }
    }

    if let Some(wanted) = requested {
        let missing: Vec<String> = wanted.difference(&found).cloned().collect();
        if !missing.is_empty() {
            return Err(Error::UnknownBooks(missing));
        }
    }
    Ok(trimmed)
}
