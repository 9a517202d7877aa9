use serde_json::Value;

use super::json_str;
use crate::{PublicationDate, SourceAuthor, SourceRecord};

/// Convert a Crossref `works` response into records.
///
/// Accepts both the list form (`{"message": {"items": [...]}}`) and the
/// single-work form returned by a DOI lookup (`{"message": {...}}`).
pub fn records_from_json(data: &Value) -> Vec<SourceRecord> {
    let message = &data["message"];
    match message["items"].as_array() {
        Some(items) => items.iter().map(record_from_work).collect(),
        None if message.is_object() => vec![record_from_work(message)],
        None => Vec::new(),
    }
}

/// Convert one Crossref work. Missing fields are left empty.
pub fn record_from_work(work: &Value) -> SourceRecord {
    let title = work["title"]
        .as_array()
        .and_then(|a| a.first())
        .and_then(json_str)
        .or_else(|| json_str(&work["title"]));

    let authors = work["author"]
        .as_array()
        .map(|arr| arr.iter().map(author_from_json).collect())
        .unwrap_or_default();

    let journal = work["container-title"]
        .as_array()
        .and_then(|a| a.first())
        .and_then(json_str)
        .or_else(|| json_str(&work["publisher"]));

    let alternate_id = json_str(&work["URL"]).or_else(|| {
        work["link"]
            .as_array()
            .and_then(|links| links.iter().find_map(|l| json_str(&l["URL"])))
    });

    let grants = work["funder"]
        .as_array()
        .map(|funders| {
            let mut grants: Vec<String> = Vec::new();
            for award in funders.iter().filter_map(|f| f["award"].as_array()).flatten() {
                if let Some(award) = json_str(award) {
                    if !grants.contains(&award) {
                        grants.push(award);
                    }
                }
            }
            grants
        })
        .unwrap_or_default();

    SourceRecord {
        title,
        authors,
        doi: json_str(&work["DOI"]).map(|d| d.to_lowercase()),
        pmid: None,
        pmcid: None,
        journal,
        publication_date: publication_date(work),
        grants,
        alternate_id,
    }
}

fn author_from_json(author: &Value) -> SourceAuthor {
    let affiliation = author["affiliation"]
        .as_array()
        .and_then(|a| a.first())
        .and_then(|a| json_str(&a["name"]));
    SourceAuthor {
        first_name: json_str(&author["given"]),
        last_name: json_str(&author["family"]),
        initials: None,
        collective_name: json_str(&author["name"]),
        affiliation,
        orcid: json_str(&author["ORCID"]),
        author_id: None,
    }
}

/// First of `published`, `published-online`, `published-print` that has
/// date parts.
fn publication_date(work: &Value) -> PublicationDate {
    for field in ["published", "published-online", "published-print"] {
        let Some(parts) = work[field]["date-parts"]
            .as_array()
            .and_then(|p| p.first())
            .and_then(|p| p.as_array())
        else {
            continue;
        };
        let part = |i: usize| parts.get(i).and_then(|v| v.as_i64());
        return PublicationDate {
            year: part(0).and_then(|y| i32::try_from(y).ok()),
            month: part(1).and_then(|m| u32::try_from(m).ok()),
            day: part(2).and_then(|d| u32::try_from(d).ok()),
        };
    }
    PublicationDate::default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_full_work() {
        let data = json!({"message": {"items": [{
            "title": ["Lung outcomes in Kentucky"],
            "DOI": "10.1000/ABC",
            "URL": "http://dx.doi.org/10.1000/abc",
            "container-title": ["Journal X"],
            "published-online": {"date-parts": [[2021, 3]]},
            "funder": [{"name": "NIH", "award": ["P42ES007380", "P42ES007380"]}],
            "author": [
                {"given": "Andrew J.", "family": "Morris",
                 "affiliation": [{"name": "University of Kentucky"}],
                 "ORCID": "http://orcid.org/0000-0002-1825-0097"},
                {"name": "Lung Consortium", "affiliation": []}
            ]
        }]}});
        let records = records_from_json(&data);
        assert_eq!(records.len(), 1);
        let r = &records[0];
        assert_eq!(r.title.as_deref(), Some("Lung outcomes in Kentucky"));
        assert_eq!(r.doi.as_deref(), Some("10.1000/abc"));
        assert_eq!(r.journal.as_deref(), Some("Journal X"));
        assert_eq!(r.publication_date.year, Some(2021));
        assert_eq!(r.publication_date.month, Some(3));
        assert_eq!(r.publication_date.day, None);
        assert_eq!(r.grants, vec!["P42ES007380".to_string()]);
        assert_eq!(r.authors[0].affiliation.as_deref(), Some("University of Kentucky"));
        assert_eq!(r.authors[1].collective_name.as_deref(), Some("Lung Consortium"));
        assert_eq!(r.authors[1].affiliation, None);
    }

    #[test]
    fn test_bare_work_survives() {
        let records = records_from_json(&json!({"message": {"items": [{}]}}));
        assert_eq!(records, vec![SourceRecord::default()]);
    }

    #[test]
    fn test_single_work_lookup() {
        let records = records_from_json(&json!({"message": {"DOI": "10.1/x", "title": ["T"]}}));
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].doi.as_deref(), Some("10.1/x"));
    }

    #[test]
    fn test_out_of_range_date_parts_are_dropped() {
        let records = records_from_json(&json!({"message": {"items": [{
            "title": ["T"],
            "published": {"date-parts": [[4294967296i64, -1, 12]]}
        }]}}));
        let date = &records[0].publication_date;
        assert_eq!(date.year, None);
        assert_eq!(date.month, None);
        assert_eq!(date.day, Some(12));
    }

    #[test]
    fn test_unexpected_shape_yields_nothing() {
        assert!(records_from_json(&json!([1, 2, 3])).is_empty());
    }
}
