//! NCBI id converter: map PMID/PMCID/DOI-style article ids onto each other.

use super::{LookupConfig, LookupError};

/// The identifier triple returned by the converter. Absent ids are empty.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IdTriple {
    pub doi: String,
    pub pmid: String,
    pub pmcid: String,
}

/// Resolve an external article id to its `(doi, pmid, pmcid)` triple.
///
/// `Ok(None)` when the response has no `records` key or an empty record
/// set, which is how the service signals an unknown id.
pub async fn resolve_ids(
    client: &reqwest::Client,
    idstring: &str,
    config: &LookupConfig,
) -> Result<Option<IdTriple>, LookupError> {
    let url = "https://www.ncbi.nlm.nih.gov/pmc/utils/idconv/v1.0/";
    let email = config.idconv_email.as_deref().unwrap_or("");

    let resp = client
        .get(url)
        .query(&[
            ("tool", config.idconv_tool.as_str()),
            ("email", email),
            ("ids", idstring),
            ("format", "json"),
        ])
        .header("User-Agent", config.user_agent())
        .timeout(config.timeout)
        .send()
        .await?;

    let status = resp.status();
    if !status.is_success() {
        return Err(LookupError::Status(status.as_u16()));
    }

    let data: serde_json::Value = resp.json().await?;
    Ok(triple_from_response(&data))
}

fn triple_from_response(data: &serde_json::Value) -> Option<IdTriple> {
    let record = data.get("records")?.as_array()?.first()?;
    if record.get("status").and_then(|s| s.as_str()) == Some("error") {
        return None;
    }
    let field = |name: &str| {
        record
            .get(name)
            .and_then(|v| v.as_str())
            .unwrap_or("")
            .to_string()
    };
    Some(IdTriple {
        doi: field("doi"),
        pmid: field("pmid"),
        pmcid: field("pmcid"),
    })
}
