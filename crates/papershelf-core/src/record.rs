//! The bibliographic record type and its fixed field vocabulary.
//!
//! A [`BibRecord`] is an explicit struct, not a free-form map: every field
//! the rest of the system reasons about is a typed member, and anything
//! outside the vocabulary lands in the `extra` extension map where it
//! round-trips through the sidecar without ever entering reconciliation.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Identifier scheme for external registries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IdScheme {
    Doi,
    Pmid,
    Pmcid,
    Arxiv,
}

/// A scheme-tagged identifier.
///
/// Inside a [`BibRecord`] identifiers are stored bare (no scheme prefix);
/// the tag store uses the prefixed form (`doi:`, `pmid:`, `pmcid:`, or the
/// conventional `arXiv:` token). Translation between the two happens only at
/// the tag-store boundary, through [`Identifier::parse`] and
/// [`Identifier::tagged`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identifier {
    pub scheme: IdScheme,
    pub value: String,
}

impl Identifier {
    pub fn new(scheme: IdScheme, value: impl Into<String>) -> Self {
        Self {
            scheme,
            value: value.into(),
        }
    }

    /// Parse a tagged or bare identifier string.
    ///
    /// Accepts `doi:…`, `pmid:…`, `pmcid:…`, `arxiv:…` prefixes
    /// (case-insensitive), a bare `10.…` DOI, and a bare `PMC…` id. Anything
    /// else is not an identifier.
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim();
        if s.is_empty() {
            return None;
        }
        let lower = s.to_ascii_lowercase();
        for (prefix, scheme) in [
            ("doi:", IdScheme::Doi),
            ("pmid:", IdScheme::Pmid),
            ("pmcid:", IdScheme::Pmcid),
            ("arxiv:", IdScheme::Arxiv),
        ] {
            if lower.starts_with(prefix) {
                let value = s[prefix.len()..].trim();
                if value.is_empty() {
                    return None;
                }
                return Some(Self::new(scheme, value));
            }
        }
        if s.starts_with("10.") {
            return Some(Self::new(IdScheme::Doi, s));
        }
        if lower.starts_with("pmc") && s[3..].chars().all(|c| c.is_ascii_digit()) && s.len() > 3 {
            return Some(Self::new(IdScheme::Pmcid, s));
        }
        None
    }

    /// The tag-store form: scheme-prefixed, except arXiv which keeps its
    /// conventional `arXiv:` token.
    pub fn tagged(&self) -> String {
        match self.scheme {
            IdScheme::Doi => format!("doi:{}", self.value),
            IdScheme::Pmid => format!("pmid:{}", self.value),
            IdScheme::Pmcid => format!("pmcid:{}", self.value),
            IdScheme::Arxiv => format!("arXiv:{}", self.value),
        }
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.value)
    }
}

/// The fixed field vocabulary, in natural key order.
///
/// Declaration order is the order [`BibRecord::present_fields`] reports and
/// the order aggregate reconciliation applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Field {
    Doi,
    Pmid,
    Pmcid,
    Author,
    Author1,
    Title,
    Year,
    Journal,
    Publisher,
    Url,
    LocalUrl,
    Abstract,
    Keywords,
    Id,
    EntryType,
}

impl Field {
    pub const ALL: [Field; 15] = [
        Field::Doi,
        Field::Pmid,
        Field::Pmcid,
        Field::Author,
        Field::Author1,
        Field::Title,
        Field::Year,
        Field::Journal,
        Field::Publisher,
        Field::Url,
        Field::LocalUrl,
        Field::Abstract,
        Field::Keywords,
        Field::Id,
        Field::EntryType,
    ];

    /// The on-disk / wire name of this field.
    pub fn name(&self) -> &'static str {
        match self {
            Field::Doi => "doi",
            Field::Pmid => "pmid",
            Field::Pmcid => "pmcid",
            Field::Author => "author",
            Field::Author1 => "author1",
            Field::Title => "title",
            Field::Year => "year",
            Field::Journal => "journal",
            Field::Publisher => "publisher",
            Field::Url => "url",
            Field::LocalUrl => "local_url",
            Field::Abstract => "abstract",
            Field::Keywords => "keywords",
            Field::Id => "id",
            Field::EntryType => "entry_type",
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Error for a field name outside the vocabulary.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown bibliographic field: {0}")]
pub struct UnknownField(pub String);

impl FromStr for Field {
    type Err = UnknownField;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Field::ALL
            .into_iter()
            .find(|f| f.name() == s)
            .ok_or_else(|| UnknownField(s.to_string()))
    }
}

/// A typed field value.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Text(String),
    Year(i32),
    Keywords(Vec<String>),
}

impl FieldValue {
    /// Whether this value is the unset sentinel for its kind: empty string,
    /// year 0, or an empty keyword list.
    pub fn is_unset(&self) -> bool {
        match self {
            FieldValue::Text(s) => s.is_empty(),
            FieldValue::Year(y) => *y == 0,
            FieldValue::Keywords(ks) => ks.is_empty(),
        }
    }

    /// String rendering used at serialization boundaries; keywords are
    /// comma-joined.
    pub fn render(&self) -> String {
        match self {
            FieldValue::Text(s) => s.clone(),
            FieldValue::Year(y) => y.to_string(),
            FieldValue::Keywords(ks) => ks.join(", "),
        }
    }
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self {
        FieldValue::Text(s.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(s: String) -> Self {
        FieldValue::Text(s)
    }
}

impl From<i32> for FieldValue {
    fn from(y: i32) -> Self {
        FieldValue::Year(y)
    }
}

impl From<Vec<String>> for FieldValue {
    fn from(ks: Vec<String>) -> Self {
        FieldValue::Keywords(ks)
    }
}

/// One paper's bibliographic record.
///
/// Sentinels: empty string for text fields, `0` for an unknown year, an
/// empty vector for keywords. `year` is always a non-negative integer here
/// (string coercion happens in the reconciler), `keywords` is always a
/// cleaned, deduplicated collection, and `doi` carries no scheme prefix.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BibRecord {
    pub doi: String,
    pub pmid: String,
    pub pmcid: String,
    pub author: String,
    pub author1: String,
    pub title: String,
    pub year: i32,
    pub journal: String,
    pub publisher: String,
    pub url: String,
    pub local_url: String,
    #[serde(rename = "abstract")]
    pub abstract_: String,
    pub keywords: Vec<String>,
    /// Synthetic key `author1_year`, refreshed via [`BibRecord::refresh_id`].
    pub id: String,
    pub entry_type: String,
    /// Fields outside the vocabulary, preserved through the sidecar but
    /// never reconciled.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, String>,
}

impl BibRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, field: Field) -> FieldValue {
        match field {
            Field::Doi => FieldValue::Text(self.doi.clone()),
            Field::Pmid => FieldValue::Text(self.pmid.clone()),
            Field::Pmcid => FieldValue::Text(self.pmcid.clone()),
            Field::Author => FieldValue::Text(self.author.clone()),
            Field::Author1 => FieldValue::Text(self.author1.clone()),
            Field::Title => FieldValue::Text(self.title.clone()),
            Field::Year => FieldValue::Year(self.year),
            Field::Journal => FieldValue::Text(self.journal.clone()),
            Field::Publisher => FieldValue::Text(self.publisher.clone()),
            Field::Url => FieldValue::Text(self.url.clone()),
            Field::LocalUrl => FieldValue::Text(self.local_url.clone()),
            Field::Abstract => FieldValue::Text(self.abstract_.clone()),
            Field::Keywords => FieldValue::Keywords(self.keywords.clone()),
            Field::Id => FieldValue::Text(self.id.clone()),
            Field::EntryType => FieldValue::Text(self.entry_type.clone()),
        }
    }

    /// Store a value without any reconciliation. Mutation with conflict
    /// handling goes through the reconciler instead.
    pub fn set(&mut self, field: Field, value: FieldValue) {
        match (field, value) {
            (Field::Doi, FieldValue::Text(s)) => self.doi = s,
            (Field::Pmid, FieldValue::Text(s)) => self.pmid = s,
            (Field::Pmcid, FieldValue::Text(s)) => self.pmcid = s,
            (Field::Author, FieldValue::Text(s)) => self.author = s,
            (Field::Author1, FieldValue::Text(s)) => self.author1 = s,
            (Field::Title, FieldValue::Text(s)) => self.title = s,
            (Field::Year, FieldValue::Year(y)) => self.year = y,
            (Field::Journal, FieldValue::Text(s)) => self.journal = s,
            (Field::Publisher, FieldValue::Text(s)) => self.publisher = s,
            (Field::Url, FieldValue::Text(s)) => self.url = s,
            (Field::LocalUrl, FieldValue::Text(s)) => self.local_url = s,
            (Field::Abstract, FieldValue::Text(s)) => self.abstract_ = s,
            (Field::Keywords, FieldValue::Keywords(ks)) => self.keywords = ks,
            (Field::Id, FieldValue::Text(s)) => self.id = s,
            (Field::EntryType, FieldValue::Text(s)) => self.entry_type = s,
            (field, value) => {
                tracing::warn!(%field, ?value, "dropping value of wrong kind for field");
            }
        }
    }

    pub fn is_unset(&self, field: Field) -> bool {
        self.get(field).is_unset()
    }

    /// Fields carrying a non-sentinel value, in natural key order.
    pub fn present_fields(&self) -> Vec<Field> {
        Field::ALL
            .into_iter()
            .filter(|f| !self.is_unset(*f))
            .collect()
    }

    /// Recompute the synthetic `author1_year` key. Leaves `id` untouched
    /// when either component is missing.
    pub fn refresh_id(&mut self) {
        if !self.author1.is_empty() && self.year != 0 {
            self.id = format!("{}_{}", self.author1, self.year);
        }
    }

    /// The identifier to use for remote lookups, in priority order:
    /// DOI (which may itself be an `arXiv:` token from text heuristics),
    /// then PMID, then PMCID.
    pub fn primary_id(&self) -> Option<Identifier> {
        if !self.doi.is_empty() {
            return Identifier::parse(&self.doi)
                .or_else(|| Some(Identifier::new(IdScheme::Doi, self.doi.clone())));
        }
        if !self.pmid.is_empty() {
            return Some(Identifier::new(IdScheme::Pmid, self.pmid.clone()));
        }
        if !self.pmcid.is_empty() {
            return Some(Identifier::new(IdScheme::Pmcid, self.pmcid.clone()));
        }
        None
    }
}
