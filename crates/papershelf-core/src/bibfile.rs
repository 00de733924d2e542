//! Sidecar bibliography persistence in BibTeX form, plus fuzzy matching
//! over record lists.
//!
//! On disk every value is a string; `keywords` is comma-joined and restored
//! to a collection on read, `year` is coerced back to an integer. Fields
//! outside the vocabulary survive in the record's `extra` map.

use std::collections::BTreeSet;
use std::fmt::Write as _;
use std::path::Path;

use thiserror::Error;

use papershelf_pdf::{NamePart, family_name};

use crate::record::{BibRecord, Field, FieldValue};
use crate::similarity::{match_key, similar};

#[derive(Error, Debug)]
pub enum BibError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("BibTeX parse error: {0}")]
    Parse(String),
}

/// Vocabulary fields that serialize under their own BibTeX key.
const SERIALIZED_FIELDS: [Field; 13] = [
    Field::Author,
    Field::Title,
    Field::Year,
    Field::Journal,
    Field::Publisher,
    Field::Url,
    Field::Doi,
    Field::Pmid,
    Field::Pmcid,
    Field::Abstract,
    Field::Keywords,
    Field::LocalUrl,
    Field::Author1,
];

/// Serialize records to a BibTeX string, one entry per record.
pub fn render_bib(records: &[BibRecord]) -> String {
    let mut out = String::new();
    for record in records {
        let entry_type = if record.entry_type.is_empty() {
            "article"
        } else {
            &record.entry_type
        };
        let key = if record.id.is_empty() {
            "paper".to_string()
        } else {
            record.id.replace(' ', "_")
        };
        let _ = writeln!(out, "@{}{{{},", entry_type, key);
        for field in SERIALIZED_FIELDS {
            let value = record.get(field);
            if value.is_unset() {
                continue;
            }
            let _ = writeln!(out, "  {} = {{{}}},", field.name(), value.render());
        }
        for (name, value) in &record.extra {
            let _ = writeln!(out, "  {} = {{{}}},", name, value);
        }
        out.push_str("}\n\n");
    }
    out
}

/// Write records to the sidecar file. Callers holding a tabular cache must
/// invalidate it for this path afterwards.
pub fn save_bib(records: &[BibRecord], path: &Path) -> Result<(), BibError> {
    std::fs::write(path, render_bib(records))?;
    tracing::debug!(path = %path.display(), count = records.len(), "wrote sidecar bibliography");
    Ok(())
}

/// Read records back from a sidecar file. Returns `Ok(None)` when the file
/// does not exist.
pub fn read_bib(path: &Path) -> Result<Option<Vec<BibRecord>>, BibError> {
    if !path.exists() {
        return Ok(None);
    }
    let content = std::fs::read_to_string(path)?;
    parse_bib(&content).map(Some)
}

/// Parse BibTeX text into records.
pub fn parse_bib(content: &str) -> Result<Vec<BibRecord>, BibError> {
    let bibliography =
        biblatex::Bibliography::parse(content).map_err(|e| BibError::Parse(e.to_string()))?;
    Ok(bibliography.iter().map(record_from_entry).collect())
}

/// Convert biblatex chunks to a plain string.
fn chunks_to_string(chunks: &[biblatex::Spanned<biblatex::Chunk>]) -> String {
    chunks
        .iter()
        .map(|c| match &c.v {
            biblatex::Chunk::Normal(s) => s.as_str(),
            biblatex::Chunk::Verbatim(s) => s.as_str(),
            biblatex::Chunk::Math(s) => s.as_str(),
        })
        .collect::<Vec<_>>()
        .join("")
}

/// Format a biblatex person as `Family, Given` so the family name survives
/// the `" and "`-joined round trip.
fn format_person(p: &biblatex::Person) -> String {
    let family = if p.prefix.is_empty() {
        p.name.clone()
    } else {
        format!("{} {}", p.prefix, p.name)
    };
    if p.given_name.is_empty() {
        family
    } else {
        format!("{}, {}", family, p.given_name)
    }
}

fn record_from_entry(entry: &biblatex::Entry) -> BibRecord {
    let mut record = BibRecord::new();
    record.entry_type = entry.entry_type.to_string();
    record.id = entry.key.clone();

    let get = |name: &str| -> Option<String> {
        entry
            .get(name)
            .map(chunks_to_string)
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
    };

    record.author = entry
        .author()
        .unwrap_or_default()
        .iter()
        .map(format_person)
        .collect::<Vec<_>>()
        .join(" and ");
    record.title = get("title").unwrap_or_default();
    record.year = get("year")
        .and_then(|y| y.split('.').next().unwrap_or("").trim().parse::<i32>().ok())
        .filter(|y| *y >= 0)
        .unwrap_or(0);
    // Journal fallback chain: preprints carry archiveprefix, proceedings
    // carry booktitle.
    record.journal = get("journal")
        .or_else(|| get("archiveprefix"))
        .or_else(|| get("booktitle"))
        .unwrap_or_default();
    record.publisher = get("publisher").unwrap_or_default();
    record.url = get("url").unwrap_or_default();
    record.doi = get("doi").unwrap_or_default();
    record.pmid = get("pmid").unwrap_or_default();
    record.pmcid = get("pmcid").unwrap_or_default();
    record.abstract_ = get("abstract")
        .map(|a| a.replace('\n', " "))
        .unwrap_or_default();
    record.local_url = get("local_url").unwrap_or_default();
    record.author1 = get("author1").unwrap_or_default();
    record.keywords = get("keywords")
        .map(|ks| {
            let set: BTreeSet<String> = ks
                .split(',')
                .map(str::trim)
                .filter(|k| !k.is_empty())
                .map(String::from)
                .collect();
            set.into_iter().collect()
        })
        .unwrap_or_default();

    const KNOWN: [&str; 14] = [
        "author",
        "title",
        "year",
        "journal",
        "publisher",
        "url",
        "doi",
        "pmid",
        "pmcid",
        "abstract",
        "local_url",
        "author1",
        "keywords",
        "entry_type",
    ];
    for (name, chunks) in &entry.fields {
        if !KNOWN.contains(&name.as_str()) {
            record
                .extra
                .insert(name.clone(), chunks_to_string(chunks).trim().to_string());
        }
    }

    if record.author1.is_empty() && !record.author.is_empty() {
        record.author1 = family_name(&record.author, NamePart::Family);
    }

    record
}

/// Score one field of a candidate against the target.
///
/// Exact equality always scores. Non-year fields also score above the
/// similarity threshold. The author field instead checks that the family
/// name of either side's first author is contained in the other side's full
/// author string.
fn field_matches(candidate: &BibRecord, target: &BibRecord, field: Field, threshold: f64) -> bool {
    let a = candidate.get(field);
    let b = target.get(field);
    if a == b {
        return true;
    }
    match field {
        Field::Year => false,
        Field::Author => {
            let fam_a = match_key(&family_name(&candidate.author, NamePart::Family));
            let fam_b = match_key(&family_name(&target.author, NamePart::Family));
            if fam_a.is_empty() || fam_b.is_empty() {
                return false;
            }
            match_key(&target.author).contains(&fam_a)
                || match_key(&candidate.author).contains(&fam_b)
        }
        _ => {
            if let (FieldValue::Text(a), FieldValue::Text(b)) = (&a, &b) {
                similar(a, b, threshold)
            } else {
                false
            }
        }
    }
}

/// Return every candidate matching the target on all `match_fields`.
///
/// Zero, one, or many results are all legitimate; ties are not ranked or
/// truncated, the caller disambiguates.
pub fn find_matching<'a>(
    candidates: &'a [BibRecord],
    target: &BibRecord,
    match_fields: &[Field],
    threshold: f64,
) -> Vec<&'a BibRecord> {
    candidates
        .iter()
        .filter(|c| {
            match_fields
                .iter()
                .all(|f| field_matches(c, target, *f, threshold))
        })
        .collect()
}
