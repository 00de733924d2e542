//! arXiv export API adapter: bare id to citation record.

use once_cell::sync::Lazy;
use regex::Regex;

use super::{LookupConfig, LookupError};
use crate::record::BibRecord;

/// Fetch the citation record for a bare arXiv id (e.g. `1234.5678`).
///
/// `Ok(None)` when the feed carries no usable entry (unknown ids come back
/// as an entry titled `Error`).
pub async fn fetch_by_id(
    client: &reqwest::Client,
    id: &str,
    config: &LookupConfig,
) -> Result<Option<BibRecord>, LookupError> {
    let url = format!(
        "http://export.arxiv.org/api/query?id_list={}&max_results=1",
        urlencoding::encode(id)
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

    let body = resp.text().await?;
    parse_atom_entry(&body, id)
}

/// Collapse whitespace runs (Atom titles and summaries wrap hard).
fn collapse_ws(s: &str) -> String {
    static WS_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());
    WS_RE.replace_all(s.trim(), " ").to_string()
}

/// Parse the first entry of an arXiv Atom feed into a record.
fn parse_atom_entry(xml: &str, id: &str) -> Result<Option<BibRecord>, LookupError> {
    use quick_xml::Reader;
    use quick_xml::events::Event;

    let mut reader = Reader::from_str(xml);

    let mut in_entry = false;
    let mut in_title = false;
    let mut in_author = false;
    let mut in_name = false;
    let mut in_summary = false;
    let mut in_published = false;

    let mut title = String::new();
    let mut authors: Vec<String> = Vec::new();
    let mut name = String::new();
    let mut summary = String::new();
    let mut published = String::new();
    let mut link = String::new();

    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => {
                let local = e.local_name();
                match local.as_ref() {
                    b"entry" => in_entry = true,
                    b"title" if in_entry => in_title = true,
                    b"author" if in_entry => {
                        in_author = true;
                        name.clear();
                    }
                    b"name" if in_author => in_name = true,
                    b"summary" if in_entry => in_summary = true,
                    b"published" if in_entry => in_published = true,
                    b"link" if in_entry => {
                        for attr in e.attributes().flatten() {
                            if attr.key.as_ref() == b"href" && link.is_empty() {
                                link = String::from_utf8_lossy(&attr.value).to_string();
                            }
                        }
                    }
                    _ => {}
                }
            }
            Ok(Event::Empty(ref e)) => {
                if e.local_name().as_ref() == b"link" && in_entry {
                    for attr in e.attributes().flatten() {
                        if attr.key.as_ref() == b"href" && link.is_empty() {
                            link = String::from_utf8_lossy(&attr.value).to_string();
                        }
                    }
                }
            }
            Ok(Event::Text(ref e)) => {
                let text = e.unescape().unwrap_or_default();
                if in_title && in_entry {
                    title.push_str(&text);
                }
                if in_name {
                    name.push_str(&text);
                }
                if in_summary {
                    summary.push_str(&text);
                }
                if in_published {
                    published.push_str(&text);
                }
            }
            Ok(Event::End(ref e)) => {
                let local = e.local_name();
                match local.as_ref() {
                    // First entry is all we asked for.
                    b"entry" => break,
                    b"title" => in_title = false,
                    b"author" => {
                        if !name.is_empty() {
                            authors.push(name.trim().to_string());
                        }
                        in_author = false;
                    }
                    b"name" => in_name = false,
                    b"summary" => in_summary = false,
                    b"published" => in_published = false,
                    _ => {}
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(LookupError::Parse(format!("XML parse error: {}", e))),
            _ => {}
        }
        buf.clear();
    }

    let title = collapse_ws(&title);
    if title.is_empty() || title == "Error" {
        return Ok(None);
    }

    let mut record = BibRecord::new();
    record.title = title;
    record.author = authors.join(" and ");
    record.abstract_ = collapse_ws(&summary);
    record.year = published
        .get(..4)
        .and_then(|y| y.parse::<i32>().ok())
        .filter(|y| *y >= 0)
        .unwrap_or(0);
    record.journal = "arXiv".to_string();
    record.url = if link.is_empty() {
        format!("https://arxiv.org/abs/{}", id)
    } else {
        link
    };
    record.entry_type = "article".to_string();
    record
        .extra
        .insert("archiveprefix".to_string(), "arXiv".to_string());
    record.extra.insert("eprint".to_string(), id.to_string());

    Ok(Some(record))
}
