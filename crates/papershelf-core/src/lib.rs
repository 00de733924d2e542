use thiserror::Error;

pub mod bibfile;
pub mod cache;
pub mod config_file;
pub mod paper;
pub mod reconcile;
pub mod record;
pub mod remote;
pub mod similarity;
pub mod tags;

// Re-export for convenience
pub use bibfile::{BibError, find_matching, parse_bib, read_bib, save_bib};
pub use cache::BibCache;
pub use paper::{Paper, PaperOptions};
pub use reconcile::{AcceptIncoming, Choice, Confirm, KeepCurrent, MergeError, Reconciler};
pub use record::{BibRecord, Field, FieldValue, IdScheme, Identifier};
pub use remote::{IdTriple, LookupConfig, LookupError, TitleMatch, TitleSearch, lookup_by_id};
pub use similarity::{DEFAULT_FIELD_THRESHOLD, TITLE_ACCEPT, ratio};
pub use tags::{ExifToolStore, MemoryTagStore, Tag, TagError, TagStore, TagValue};

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("PDF error: {0}")]
    Pdf(#[from] papershelf_pdf::PdfError),
    #[error("bibliography error: {0}")]
    Bib(#[from] BibError),
    #[error("tag store error: {0}")]
    Tag(#[from] TagError),
    #[error("lookup error: {0}")]
    Lookup(#[from] LookupError),
    #[error("merge error: {0}")]
    Merge(#[from] MergeError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
