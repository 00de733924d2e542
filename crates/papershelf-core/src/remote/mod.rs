//! Remote bibliographic registries: CrossRef, arXiv, NCBI id conversion.
//!
//! Adapters are pure network calls with no local state. "Not found" is a
//! value (`Ok(None)`, or a `success = false` search result), never an error;
//! transport failures surface as [`LookupError`] and are caught at the
//! orchestration boundary and never reach the reconciler.

pub mod arxiv;
pub mod crossref;
pub mod idconv;

use std::time::Duration;

use thiserror::Error;

use crate::record::{BibRecord, IdScheme, Identifier};

pub use crossref::{TitleMatch, TitleSearch};
pub use idconv::IdTriple;

#[derive(Error, Debug)]
pub enum LookupError {
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("HTTP {0}")]
    Status(u16),
    #[error("could not parse response: {0}")]
    Parse(String),
}

/// Settings shared by all adapters.
#[derive(Debug, Clone)]
pub struct LookupConfig {
    /// Contact address sent to CrossRef's polite pool.
    pub mailto: Option<String>,
    /// Tool name reported to the NCBI id converter.
    pub idconv_tool: String,
    /// Contact address reported to the NCBI id converter.
    pub idconv_email: Option<String>,
    pub timeout: Duration,
}

impl Default for LookupConfig {
    fn default() -> Self {
        Self {
            mailto: None,
            idconv_tool: "papershelf".into(),
            idconv_email: None,
            timeout: Duration::from_secs(10),
        }
    }
}

impl LookupConfig {
    pub fn user_agent(&self) -> String {
        match &self.mailto {
            Some(mailto) => format!("papershelf/0.1 (mailto:{})", mailto),
            None => "papershelf/0.1".to_string(),
        }
    }
}

/// Fetch the canonical record for a scheme-tagged identifier.
///
/// arXiv ids route to the arXiv export API; everything else is treated as a
/// DOI-resolvable id and goes through CrossRef's transform endpoint.
/// `Ok(None)` means the registry has no record.
pub async fn lookup_by_id(
    client: &reqwest::Client,
    id: &Identifier,
    config: &LookupConfig,
) -> Result<Option<BibRecord>, LookupError> {
    match id.scheme {
        IdScheme::Arxiv => arxiv::fetch_by_id(client, &id.value, config).await,
        IdScheme::Doi | IdScheme::Pmid | IdScheme::Pmcid => {
            crossref::fetch_bibtex(client, &id.value, config).await
        }
    }
}
