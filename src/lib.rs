pub mod backend;
pub mod balance;
mod error;
pub mod fit;
pub mod flatten;
mod fonts;
pub mod footnotes;
pub mod labels;
pub mod markup;
pub mod model;
pub mod paginate;
mod pdf;
pub mod select;
pub mod settings;

pub use backend::{MetricsBackend, Typesetter, WrappedLine};
pub use error::Error;
pub use fonts::{FontBook, FontFace};
pub use model::Corpus;
pub use paginate::{PageSlice, PaginateOptions, Pagination};
pub use pdf::RenderOptions;
pub use select::BookSelection;
pub use settings::{PageSettings, StyleSheet};

use std::path::Path;
use std::time::{Duration, Instant};

use footnotes::LinkTargets;

/// Everything that shapes one typesetting run besides the corpus.
#[derive(Clone, Debug)]
pub struct TypesetOptions {
    pub selection: BookSelection,
    pub settings: PageSettings,
    /// Font family to look up in the system font directories; built-in
    /// Times metrics when `None`.
    pub font_family: Option<String>,
    pub chapter_breaks: bool,
    /// Set chapter headings above the columns instead of inside them.
    pub chapter_headers: bool,
    /// Paginate every book on its own, in parallel.
    pub per_book: bool,
    /// Pages assumed to precede the content, for page numbers and links.
    pub toc_pages: usize,
    pub running_headers: bool,
}

impl Default for TypesetOptions {
    fn default() -> Self {
        TypesetOptions {
            selection: BookSelection::default(),
            settings: PageSettings::default(),
            font_family: None,
            chapter_breaks: false,
            chapter_headers: false,
            per_book: false,
            toc_pages: 0,
            running_headers: true,
        }
    }
}

impl TypesetOptions {
    fn paginate_options(&self) -> PaginateOptions {
        PaginateOptions {
            chapter_breaks: self.chapter_breaks,
            flatten: flatten::FlattenOptions {
                chapter_headers: self.chapter_headers,
            },
        }
    }
}

/// Backend for `options`: the requested family's metrics or built-in Times.
pub fn backend_for(options: &TypesetOptions) -> MetricsBackend {
    let fonts = match options.font_family.as_deref() {
        Some(family) => FontBook::load(family),
        None => FontBook::builtin(),
    };
    MetricsBackend::new(fonts, StyleSheet::for_settings(&options.settings))
}

struct Composed {
    result: Pagination,
    flatten: Duration,
    paginate: Duration,
}

fn compose_timed(
    corpus: &Corpus,
    backend: &MetricsBackend,
    options: &TypesetOptions,
) -> Result<Composed, Error> {
    let works = select::select_books(&corpus.works, &options.selection)?;
    if works.is_empty() {
        return Err(Error::InvalidCorpus("no books to typeset".to_string()));
    }
    let settings = &options.settings;
    let paginate_options = options.paginate_options();

    let t0 = Instant::now();
    let books = paginate::flatten_works(&works, backend, settings, &paginate_options);
    let flatten = t0.elapsed();

    let mut result = if options.per_book {
        paginate::paginate_separately(books, backend, settings, &paginate_options)
    } else {
        paginate::paginate_joined(books, backend, settings, &paginate_options)
    };
    let links = LinkTargets {
        chapter_pages: paginate::chapter_page_map(&result.pages, options.toc_pages),
        code_map: footnotes::code_map_from_metadata(corpus.metadata.as_ref()),
    };
    paginate::refresh_footnotes(&mut result.pages, backend, settings, &links);
    Ok(Composed {
        result,
        flatten,
        paginate: t0.elapsed() - flatten,
    })
}

/// Compose the selected books into pages, with footnote cross-references
/// pointing at the pages where their chapters start.
pub fn compose(
    corpus: &Corpus,
    backend: &MetricsBackend,
    options: &TypesetOptions,
) -> Result<Pagination, Error> {
    Ok(compose_timed(corpus, backend, options)?.result)
}

/// Typeset `corpus` into PDF bytes.
pub fn typeset(corpus: &Corpus, options: &TypesetOptions) -> Result<Vec<u8>, Error> {
    let t0 = Instant::now();
    let backend = backend_for(options);
    let load = t0.elapsed();

    let composed = compose_timed(corpus, &backend, options)?;
    let t_render = Instant::now();
    let bytes = render_pages(&composed.result.pages, &backend, options)?;
    let render = t_render.elapsed();

    log::info!(
        "Timing: load={:.1}ms, flatten={:.1}ms, paginate={:.1}ms, render={:.1}ms, total={:.1}ms ({} pages, {} bytes)",
        load.as_secs_f64() * 1000.0,
        composed.flatten.as_secs_f64() * 1000.0,
        composed.paginate.as_secs_f64() * 1000.0,
        render.as_secs_f64() * 1000.0,
        t0.elapsed().as_secs_f64() * 1000.0,
        composed.result.pages.len(),
        bytes.len(),
    );
    Ok(bytes)
}

/// Read a corpus JSON file and write the typeset PDF to `output`.
pub fn typeset_file(input: &Path, output: &Path, options: &TypesetOptions) -> Result<(), Error> {
    let t0 = Instant::now();
    let data = std::fs::read(input)?;
    let corpus: Corpus = serde_json::from_slice(&data)?;
    log::debug!(
        "Loaded {} ({} works) in {:.1}ms",
        input.display(),
        corpus.works.len(),
        t0.elapsed().as_secs_f64() * 1000.0,
    );
    let bytes = typeset(&corpus, options)?;
    std::fs::write(output, &bytes)?;
    Ok(())
}

/// Render already composed pages, numbering them from `toc_pages + 1`.
pub fn render_pages(
    pages: &[PageSlice],
    backend: &MetricsBackend,
    options: &TypesetOptions,
) -> Result<Vec<u8>, Error> {
    let render_options = RenderOptions {
        first_page_number: options.toc_pages + 1,
        running_headers: options.running_headers,
    };
    pdf::render(pages, backend, &options.settings, &render_options)
}
