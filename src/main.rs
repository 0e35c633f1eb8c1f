use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use scripture_typeset::{BookSelection, Error, PageSettings, TypesetOptions};

/// Typeset a scripture corpus into two-column PDF pages with footnotes
#[derive(Parser, Debug)]
#[command(name = "scripture-typeset")]
#[command(version, about, long_about = None)]
struct Args {
    /// Corpus JSON file
    input: PathBuf,

    /// Output PDF path
    #[arg(short, long, default_value = "output.pdf")]
    output: PathBuf,

    /// Only typeset these book slugs (repeatable, case-insensitive)
    #[arg(short, long = "book")]
    books: Vec<String>,

    /// Keep at most this many books per standard work
    #[arg(long)]
    max_books: Option<usize>,

    /// Page settings JSON; missing fields keep their defaults
    #[arg(long)]
    settings: Option<PathBuf>,

    /// Font family to measure and embed (default: built-in Times)
    #[arg(long)]
    font: Option<String>,

    /// Start every chapter on a new page
    #[arg(long)]
    chapter_breaks: bool,

    /// Set chapter headings across the page above the columns
    #[arg(long)]
    chapter_headers: bool,

    /// Paginate each book separately and in parallel
    #[arg(long)]
    per_book: bool,

    /// Number of pages assumed before the first content page
    #[arg(long, default_value_t = 0)]
    toc_pages: usize,

    /// Leave out the page number and verse range at the top of each page
    #[arg(long)]
    no_running_headers: bool,
}

fn load_settings(path: Option<&PathBuf>) -> Result<PageSettings, Error> {
    match path {
        Some(path) => {
            let data = std::fs::read(path)?;
            Ok(serde_json::from_slice(&data)?)
        }
        None => Ok(PageSettings::default()),
    }
}

fn run(args: Args) -> Result<(), Error> {
    let options = TypesetOptions {
        selection: BookSelection {
            slugs: args.books,
            max_per_work: args.max_books,
        },
        settings: load_settings(args.settings.as_ref())?,
        font_family: args.font,
        chapter_breaks: args.chapter_breaks,
        chapter_headers: args.chapter_headers,
        per_book: args.per_book,
        toc_pages: args.toc_pages,
        running_headers: !args.no_running_headers,
    };
    scripture_typeset::typeset_file(&args.input, &args.output, &options)?;
    log::info!("Wrote {}", args.output.display());
    Ok(())
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    match run(Args::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{e}");
            ExitCode::FAILURE
        }
    }
}
