//! CrossRef adapters: DOI-to-BibTeX transform and title search.

use super::{LookupConfig, LookupError};
use crate::bibfile::parse_bib;
use crate::record::BibRecord;
use crate::similarity::ratio;

/// Best title-search candidate: the registry's title, its similarity to the
/// query, and its DOI.
#[derive(Debug, Clone, PartialEq)]
pub struct TitleMatch {
    pub title: String,
    pub similarity: f64,
    pub doi: String,
}

impl TitleMatch {
    /// The empty-result sentinel, freshly constructed per call.
    pub fn empty() -> Self {
        Self {
            title: String::new(),
            similarity: 0.0,
            doi: String::new(),
        }
    }
}

/// Outcome of a title search. `success = false` signals a transport or
/// parse failure; an empty best match with `success = true` means the
/// registry simply had no candidates.
#[derive(Debug, Clone)]
pub struct TitleSearch {
    pub success: bool,
    pub best: TitleMatch,
}

/// Fetch the canonical citation for a DOI via the transform endpoint.
///
/// `Ok(None)` on HTTP 404 or a "not found" body. The returned BibTeX
/// payload is parsed into a record.
pub async fn fetch_bibtex(
    client: &reqwest::Client,
    doi: &str,
    config: &LookupConfig,
) -> Result<Option<BibRecord>, LookupError> {
    let url = format!(
        "https://api.crossref.org/works/{}/transform/application/x-bibtex",
        doi
    );

    let resp = client
        .get(&url)
        .header("User-Agent", config.user_agent())
        .timeout(config.timeout)
        .send()
        .await?;

    let status = resp.status();
    if status.as_u16() == 404 {
        tracing::debug!(doi, "CrossRef has no record");
        return Ok(None);
    }
    if !status.is_success() {
        return Err(LookupError::Status(status.as_u16()));
    }

    let body = resp.text().await?;
    if body.trim() == "Resource not found." {
        return Ok(None);
    }

    let records = parse_bib(&body).map_err(|e| LookupError::Parse(e.to_string()))?;
    Ok(records.into_iter().next())
}

/// Search CrossRef by free-text title and return the best candidate.
///
/// Never returns an error: transport or parse failures come back as
/// `success = false` with the empty-result sentinel. Acceptance (the
/// `> 0.9` similarity gate) is the caller's decision.
pub async fn query_title(
    client: &reqwest::Client,
    title: &str,
    config: &LookupConfig,
) -> TitleSearch {
    match query_title_inner(client, title, config).await {
        Ok(best) => TitleSearch {
            success: true,
            best,
        },
        Err(e) => {
            tracing::warn!(title, error = %e, "title search failed");
            TitleSearch {
                success: false,
                best: TitleMatch::empty(),
            }
        }
    }
}

async fn query_title_inner(
    client: &reqwest::Client,
    title: &str,
    config: &LookupConfig,
) -> Result<TitleMatch, LookupError> {
    let url = format!(
        "https://api.crossref.org/works?rows=5&query.title={}",
        urlencoding::encode(title)
    );

    let resp = client
        .get(&url)
        .header("User-Agent", config.user_agent())
        .timeout(config.timeout)
        .send()
        .await?;

    let status = resp.status();
    if !status.is_success() {
        return Err(LookupError::Status(status.as_u16()));
    }

    let data: serde_json::Value = resp.json().await?;
    Ok(best_candidate(&data, title))
}

/// Score each ranked candidate against the query and keep the most similar.
fn best_candidate(data: &serde_json::Value, query: &str) -> TitleMatch {
    let items = data["message"]["items"].as_array();
    let mut best = TitleMatch::empty();

    for item in items.into_iter().flatten() {
        let candidate_title = item["title"]
            .as_array()
            .and_then(|a| a.first())
            .and_then(|v| v.as_str())
            .unwrap_or("");
        if candidate_title.is_empty() {
            continue;
        }
        let similarity = ratio(candidate_title, query);
        if similarity > best.similarity {
            best = TitleMatch {
                title: candidate_title.to_string(),
                similarity,
                doi: item["DOI"].as_str().unwrap_or("").to_string(),
            };
        }
    }

    best
}
