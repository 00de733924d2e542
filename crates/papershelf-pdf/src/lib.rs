use thiserror::Error;

pub mod authors;
pub mod extract;
pub mod identifiers;
pub mod keywords;
pub mod text;

// Re-export for convenience
pub use authors::{NamePart, family_name};
pub use extract::{count_pages, extract_lines, sidecar_bib_path, sidecar_txt_path};
pub use identifiers::find_doi;
pub use keywords::{DEFAULT_END_MARKERS, DEFAULT_MARKERS, DEFAULT_SEPARATORS, find_keywords};
pub use text::clean_text;

#[derive(Error, Debug)]
pub enum PdfError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("pdftotext not found on PATH")]
    ToolNotFound,
    #[error("pdftotext failed: {0}")]
    Conversion(String),
}
