//! The PDF's embedded tag block, behind a key-value interface.
//!
//! The fixed tag vocabulary maps onto XMP/Info fields as exposed by
//! `exiftool`. Reads return an absent entry for missing tags; writes accept
//! string or list values. The scheme-prefixed identifier form (`doi:…`,
//! `pmid:…`, `arXiv:…`) lives only on this side of the boundary; records
//! keep identifiers bare.

use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::process::Command;

use thiserror::Error;

/// The fixed tag vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Tag {
    Author,
    Doi,
    Title,
    Description,
    Keywords,
    Publisher,
    Url,
    Subject,
    PageCounts,
}

impl Tag {
    pub const ALL: [Tag; 9] = [
        Tag::Author,
        Tag::Doi,
        Tag::Title,
        Tag::Description,
        Tag::Keywords,
        Tag::Publisher,
        Tag::Url,
        Tag::Subject,
        Tag::PageCounts,
    ];

    /// The exiftool-side tag name.
    pub fn name(&self) -> &'static str {
        match self {
            Tag::Author => "Author",
            Tag::Doi => "DOI",
            Tag::Title => "Title",
            Tag::Description => "Description",
            Tag::Keywords => "Keywords",
            Tag::Publisher => "Publisher",
            Tag::Url => "URL",
            Tag::Subject => "Subject",
            Tag::PageCounts => "PageCount",
        }
    }
}

impl std::fmt::Display for Tag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// A tag value: a plain string or a list of strings (Keywords).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TagValue {
    Text(String),
    List(Vec<String>),
}

impl TagValue {
    pub fn is_empty(&self) -> bool {
        match self {
            TagValue::Text(s) => s.is_empty(),
            TagValue::List(items) => items.is_empty(),
        }
    }

    pub fn render(&self) -> String {
        match self {
            TagValue::Text(s) => s.clone(),
            TagValue::List(items) => items.join(", "),
        }
    }
}

#[derive(Error, Debug)]
pub enum TagError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("exiftool not found on PATH")]
    ToolNotFound,
    #[error("exiftool failed: {0}")]
    Tool(String),
    #[error("could not parse exiftool output: {0}")]
    Parse(String),
}

/// Key-value access to a file's tag block.
pub trait TagStore {
    fn read_all(&self) -> Result<BTreeMap<Tag, TagValue>, TagError>;
    fn write(&mut self, tag: Tag, value: &TagValue) -> Result<(), TagError>;
}

/// Tag store backed by the `exiftool` command.
pub struct ExifToolStore {
    path: PathBuf,
}

impl ExifToolStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

fn run_exiftool(cmd: &mut Command) -> Result<std::process::Output, TagError> {
    let output = cmd.output().map_err(|e| {
        if e.kind() == ErrorKind::NotFound {
            TagError::ToolNotFound
        } else {
            TagError::Io(e)
        }
    })?;
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        return Err(TagError::Tool(stderr));
    }
    Ok(output)
}

fn json_to_tag_value(value: &serde_json::Value) -> Option<TagValue> {
    match value {
        serde_json::Value::String(s) => Some(TagValue::Text(s.clone())),
        serde_json::Value::Number(n) => Some(TagValue::Text(n.to_string())),
        serde_json::Value::Array(items) => Some(TagValue::List(
            items
                .iter()
                .filter_map(|v| match v {
                    serde_json::Value::String(s) => Some(s.clone()),
                    serde_json::Value::Number(n) => Some(n.to_string()),
                    _ => None,
                })
                .collect(),
        )),
        _ => None,
    }
}

impl TagStore for ExifToolStore {
    fn read_all(&self) -> Result<BTreeMap<Tag, TagValue>, TagError> {
        let output = run_exiftool(Command::new("exiftool").arg("-j").arg(&self.path))?;
        let parsed: serde_json::Value = serde_json::from_slice(&output.stdout)
            .map_err(|e| TagError::Parse(e.to_string()))?;
        let object = parsed
            .as_array()
            .and_then(|a| a.first())
            .and_then(|v| v.as_object())
            .ok_or_else(|| TagError::Parse("expected a one-element JSON array".into()))?;

        let mut tags = BTreeMap::new();
        for tag in Tag::ALL {
            if let Some(value) = object.get(tag.name()).and_then(json_to_tag_value) {
                if !value.is_empty() {
                    tags.insert(tag, value);
                }
            }
        }
        Ok(tags)
    }

    fn write(&mut self, tag: Tag, value: &TagValue) -> Result<(), TagError> {
        let mut cmd = Command::new("exiftool");
        match value {
            TagValue::Text(s) => {
                cmd.arg(format!("-{}={}", tag.name(), s));
            }
            TagValue::List(items) => {
                // Clear, then one assignment per item: exiftool appends
                // repeated list-tag arguments.
                cmd.arg(format!("-{}=", tag.name()));
                for item in items {
                    cmd.arg(format!("-{}+={}", tag.name(), item));
                }
            }
        }
        cmd.arg("-overwrite_original").arg(&self.path);
        run_exiftool(&mut cmd)?;
        tracing::debug!(tag = %tag, path = %self.path.display(), "wrote tag");
        Ok(())
    }
}

/// In-memory tag store for tests and dry runs.
#[derive(Debug, Default, Clone)]
pub struct MemoryTagStore {
    tags: BTreeMap<Tag, TagValue>,
}

impl MemoryTagStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tags(tags: impl IntoIterator<Item = (Tag, TagValue)>) -> Self {
        Self {
            tags: tags.into_iter().collect(),
        }
    }

    pub fn get(&self, tag: Tag) -> Option<&TagValue> {
        self.tags.get(&tag)
    }
}

impl TagStore for MemoryTagStore {
    fn read_all(&self) -> Result<BTreeMap<Tag, TagValue>, TagError> {
        Ok(self.tags.clone())
    }

    fn write(&mut self, tag: Tag, value: &TagValue) -> Result<(), TagError> {
        self.tags.insert(tag, value.clone());
        Ok(())
    }
}

/// Open the default tag store for a file.
pub fn open_store(path: &Path) -> Box<dyn TagStore> {
    Box::new(ExifToolStore::new(path))
}
