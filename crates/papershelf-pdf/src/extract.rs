//! PDF-to-text conversion via the `pdftotext` tool, with a hidden sidecar
//! cache next to the source file.
//!
//! A PDF `papers/2019-Smith-Nature.pdf` gets two deterministic companions:
//! `.2019-Smith-Nature.txt` (cached extracted text, managed here) and
//! `.2019-Smith-Nature.bib` (the serialized record, managed by the core
//! crate). Both are hidden and both travel with the PDF on rename.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::process::Command;

use once_cell::sync::Lazy;
use regex::bytes::Regex;

use crate::PdfError;

/// Sidecar path with the given extension: same directory, same stem, leading
/// dot.
fn sidecar_path(pdf: &Path, extension: &str) -> PathBuf {
    let stem = pdf.file_stem().unwrap_or_default().to_string_lossy();
    let name = format!(".{}.{}", stem, extension);
    pdf.with_file_name(name)
}

/// Hidden text-cache companion of a PDF (`.stem.txt`).
pub fn sidecar_txt_path(pdf: &Path) -> PathBuf {
    sidecar_path(pdf, "txt")
}

/// Hidden bibliography companion of a PDF (`.stem.bib`).
pub fn sidecar_bib_path(pdf: &Path) -> PathBuf {
    sidecar_path(pdf, "bib")
}

/// Extract text lines from a PDF.
///
/// Reuses the hidden `.txt` sidecar when present unless `refresh` is set;
/// otherwise runs `pdftotext` (limited to `max_pages` pages when given) and
/// caches its output in the sidecar. A failed conversion removes the partial
/// sidecar so a later call does not read garbage.
pub fn extract_lines(
    pdf: &Path,
    max_pages: Option<u32>,
    refresh: bool,
) -> Result<Vec<String>, PdfError> {
    let txt = sidecar_txt_path(pdf);

    if !refresh && txt.exists() {
        tracing::debug!(path = %txt.display(), "reusing cached text sidecar");
        return read_lines(&txt);
    }

    let mut cmd = Command::new("pdftotext");
    if let Some(pages) = max_pages {
        cmd.arg("-l").arg(pages.to_string());
    }
    cmd.arg("-enc").arg("UTF-8").arg(pdf).arg(&txt);

    let output = cmd.output().map_err(|e| {
        if e.kind() == ErrorKind::NotFound {
            PdfError::ToolNotFound
        } else {
            PdfError::Io(e)
        }
    })?;

    if !output.status.success() {
        let _ = std::fs::remove_file(&txt);
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        return Err(PdfError::Conversion(stderr));
    }

    tracing::debug!(path = %pdf.display(), pages = ?max_pages, "extracted text");
    read_lines(&txt)
}

fn read_lines(path: &Path) -> Result<Vec<String>, PdfError> {
    let content = std::fs::read_to_string(path)?;
    Ok(content.lines().map(String::from).collect())
}

/// Count the pages of a PDF by scanning for `/Type /Page` objects.
///
/// This is a byte-level heuristic: it does not parse the document structure,
/// so compressed object streams can hide pages from it. Callers should
/// prefer the tag store's `PageCounts` value when available.
pub fn count_pages(pdf: &Path) -> Result<usize, PdfError> {
    static PAGE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"/Type\s*/Page([^s]|$)").unwrap());
    let data = std::fs::read(pdf)?;
    Ok(PAGE_RE.find_iter(&data).count())
}
