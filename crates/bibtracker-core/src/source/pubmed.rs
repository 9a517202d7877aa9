//! PubMed efetch XML (`<PubmedArticleSet>`) to [`SourceRecord`]s.
//!
//! SAX-style over quick-xml events. Only the fields the merge engine uses are
//! read: PMID, title, journal, publication date, authors with affiliation and
//! ORCID, grant IDs and the article ID list (DOI, PMID, PMC).

use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};

use super::SourceError;
use crate::{SourceAuthor, SourceKind, SourceRecord};

const MONTHS: [&str; 12] = [
    "jan", "feb", "mar", "apr", "may", "jun", "jul", "aug", "sep", "oct", "nov", "dec",
];

fn attr(e: &BytesStart<'_>, key: &[u8]) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|a| a.key.as_ref() == key)
        .map(|a| String::from_utf8_lossy(&a.value).into_owned())
}

fn parse_month(raw: &str) -> Option<u32> {
    if let Ok(n) = raw.parse::<u32>() {
        return (1..=12).contains(&n).then_some(n);
    }
    let lower = raw.to_lowercase();
    MONTHS
        .iter()
        .position(|m| lower.starts_with(m))
        .map(|i| i as u32 + 1)
}

/// First run of four digits, for `MedlineDate` values like "2019 Jan-Feb".
fn leading_year(raw: &str) -> Option<i32> {
    let digits: String = raw
        .chars()
        .skip_while(|c| !c.is_ascii_digit())
        .take_while(|c| c.is_ascii_digit())
        .collect();
    (digits.len() == 4).then(|| digits.parse().ok()).flatten()
}

fn collapse(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn non_empty(text: String) -> Option<String> {
    if text.is_empty() { None } else { Some(text) }
}

/// Parse an efetch payload. Fails only on malformed XML.
pub fn records_from_xml(xml: &str) -> Result<Vec<SourceRecord>, SourceError> {
    let mut reader = Reader::from_reader(xml.as_bytes());
    reader.config_mut().trim_text(false);

    let mut buf = Vec::new();
    let mut path: Vec<String> = Vec::new();
    let mut records = Vec::new();
    let mut current: Option<SourceRecord> = None;
    let mut author: Option<SourceAuthor> = None;
    // IdType / EIdType / Source attribute of the open identifier element
    let mut id_type: Option<String> = None;
    let mut text = String::new();

    loop {
        buf.clear();
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => {
                let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                match name.as_str() {
                    "PubmedArticle" | "PubmedBookArticle" => {
                        current = Some(SourceRecord::default());
                    }
                    "Author" => author = Some(SourceAuthor::default()),
                    "ArticleId" => id_type = attr(e, b"IdType"),
                    "ELocationID" => id_type = attr(e, b"EIdType"),
                    "Identifier" => id_type = attr(e, b"Source"),
                    _ => {}
                }
                // titles may carry inline markup such as <i> or <sup>
                if !path.iter().any(|p| p == "ArticleTitle") {
                    text.clear();
                }
                path.push(name);
            }

            Ok(Event::Text(ref e)) => {
                let unescaped = e
                    .unescape()
                    .map_err(|err| SourceError::malformed(SourceKind::PubMed, err))?;
                text.push_str(&unescaped);
            }

            Ok(Event::CData(ref e)) => {
                text.push_str(&String::from_utf8_lossy(e.as_ref()));
            }

            Ok(Event::End(_)) => {
                let Some(name) = path.pop() else {
                    continue;
                };
                let parent = path.last().map(String::as_str).unwrap_or("");
                let grandparent = path
                    .len()
                    .checked_sub(2)
                    .map(|i| path[i].as_str())
                    .unwrap_or("");
                let value = collapse(&text);

                if let Some(a) = author.as_mut() {
                    match (name.as_str(), parent) {
                        ("LastName", "Author") => a.last_name = non_empty(value.clone()),
                        ("ForeName", "Author") => a.first_name = non_empty(value.clone()),
                        ("Initials", "Author") => a.initials = non_empty(value.clone()),
                        ("CollectiveName", "Author") => {
                            a.collective_name = non_empty(value.clone())
                        }
                        ("Affiliation", "AffiliationInfo") if a.affiliation.is_none() => {
                            a.affiliation = non_empty(value.clone());
                        }
                        ("Identifier", "Author")
                            if id_type.as_deref().is_some_and(|t| t.eq_ignore_ascii_case("orcid")) =>
                        {
                            a.orcid = non_empty(value.clone());
                        }
                        _ => {}
                    }
                }

                if matches!(name.as_str(), "PubmedArticle" | "PubmedBookArticle") {
                    if let Some(done) = current.take() {
                        records.push(done);
                    }
                    continue;
                }
                let Some(record) = current.as_mut() else {
                    continue;
                };
                match (name.as_str(), parent) {
                    ("PMID", "MedlineCitation") if record.pmid.is_none() => {
                        record.pmid = non_empty(value);
                    }
                    ("ArticleTitle", _) | ("BookTitle", "Book") if record.title.is_none() => {
                        record.title = non_empty(value);
                    }
                    ("Title", "Journal") => record.journal = non_empty(value),
                    ("Year", "PubDate") => record.publication_date.year = value.parse().ok(),
                    ("Month", "PubDate") => record.publication_date.month = parse_month(&value),
                    ("Day", "PubDate") => record.publication_date.day = value.parse().ok(),
                    ("MedlineDate", "PubDate") if record.publication_date.year.is_none() => {
                        record.publication_date.year = leading_year(&value);
                    }
                    ("Author", "AuthorList") => {
                        if let Some(a) = author.take() {
                            record.authors.push(a);
                        }
                    }
                    ("GrantID", "Grant") => {
                        if !value.is_empty() && !record.grants.contains(&value) {
                            record.grants.push(value);
                        }
                    }
                    ("ELocationID", "Article")
                        if id_type.as_deref() == Some("doi") && record.doi.is_none() =>
                    {
                        record.doi = non_empty(value.to_lowercase());
                    }
                    // references carry their own ArticleIdList; only the article's own counts
                    ("ArticleId", "ArticleIdList") if grandparent == "PubmedData" => {
                        match id_type.as_deref() {
                            Some("doi") => record.doi = non_empty(value.to_lowercase()),
                            Some("pubmed") if record.pmid.is_none() => {
                                record.pmid = non_empty(value)
                            }
                            Some("pmc") => record.pmcid = non_empty(value),
                            _ => {}
                        }
                    }
                    _ => {}
                }
                if !path.iter().any(|p| p == "ArticleTitle") {
                    text.clear();
                }
            }

            Ok(Event::Eof) => break,
            Err(err) => {
                return Err(SourceError::malformed(
                    SourceKind::PubMed,
                    format!("at byte {}: {}", reader.buffer_position(), err),
                ));
            }
            _ => {}
        }
    }

    tracing::debug!(records = records.len(), "parsed PubMed XML");
    Ok(records)
}
