//! Publication identity: choosing a key for a record and deciding whether a
//! publication is already present in a keyed set.

use std::collections::HashSet;

use crate::matching::{is_match, is_match_to_list};
use crate::{PublicationKey, ResultSet, SourceRecord, TokenizedCitation};

/// Lower-case a DOI and strip any resolver URL or `doi:` prefix.
pub fn clean_doi(raw: &str) -> String {
    let lower = raw.trim().to_lowercase();
    let stripped = match lower.find("doi.org/") {
        Some(pos) => &lower[pos + "doi.org/".len()..],
        None => lower.strip_prefix("doi:").unwrap_or(&lower),
    };
    stripped.trim().to_string()
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

impl PublicationKey {
    /// Key for a source record: DOI URI, else PMID, else alternate URL.
    /// `None` when the record carries none of them.
    pub fn for_record(record: &SourceRecord) -> Option<PublicationKey> {
        if let Some(doi) = non_empty(&record.doi) {
            let doi = clean_doi(doi);
            if !doi.is_empty() {
                return Some(PublicationKey::from_doi(&doi));
            }
        }
        if let Some(pmid) = non_empty(&record.pmid) {
            // PubMed sometimes returns several IDs separated by newlines
            let first = pmid.lines().next().unwrap_or(pmid).trim();
            return Some(PublicationKey::new(first));
        }
        non_empty(&record.alternate_id).map(PublicationKey::new)
    }
}

/// The stored key for a record whose own PMID or DOI produces `key`.
///
/// A work first stored under its DOI can later arrive PMID-only from another
/// source; this ties the two together without relying on the titles.
fn key_by_identifier<'a>(key: &str, set: &'a ResultSet) -> Option<&'a PublicationKey> {
    set.iter()
        .find(|(_, record)| {
            let by_pmid = non_empty(&record.pmid)
                .and_then(|p| p.lines().next())
                .is_some_and(|p| p.trim().eq_ignore_ascii_case(key));
            let by_doi = non_empty(&record.doi)
                .map(clean_doi)
                .filter(|d| !d.is_empty())
                .is_some_and(|d| PublicationKey::from_doi(&d).eq_ignore_case(key));
            by_pmid || by_doi
        })
        .map(|(k, _)| k)
}

/// True when `key` is in `set` (ignoring case), names a stored record's own
/// PMID or DOI, or `title` fuzzy-matches a title already in it.
///
/// `known_titles` lets callers pass a title list computed once per run;
/// when it is absent or empty the titles are read from `set`.
pub fn is_known(key: &str, title: &str, set: &ResultSet, known_titles: Option<&[String]>) -> bool {
    if set.resolve_key(key).is_some() || key_by_identifier(key, set).is_some() {
        return true;
    }
    match known_titles {
        Some(titles) if !titles.is_empty() => is_match_to_list(title, titles),
        _ => is_match_to_list(title, &set.titles()),
    }
}

/// The key in `set` matched by `key`, by a stored PMID or DOI, or failing
/// those by fuzzy title.
pub fn find_known_key(key: &str, title: &str, set: &ResultSet) -> Option<PublicationKey> {
    if let Some(found) = set.resolve_key(key).or_else(|| key_by_identifier(key, set)) {
        return Some(found.clone());
    }
    set.iter()
        .find(|(_, record)| is_match(title, &record.title))
        .map(|(k, _)| k.clone())
}

/// For each citation, whether `set` already holds it by PMID, DOI or title.
pub fn citations_in_set(citations: &[TokenizedCitation], set: &ResultSet) -> Vec<bool> {
    let titles = set.titles();
    let dois: HashSet<String> = set
        .iter()
        .filter_map(|(_, r)| non_empty(&r.doi).map(clean_doi))
        .collect();
    let pmids: HashSet<&str> = set.iter().filter_map(|(_, r)| non_empty(&r.pmid)).collect();

    citations
        .iter()
        .map(|c| {
            non_empty(&c.pmid).is_some_and(|p| pmids.contains(p))
                || non_empty(&c.doi).is_some_and(|d| dois.contains(&clean_doi(d)))
                || c.title
                    .as_deref()
                    .is_some_and(|t| is_match_to_list(t, &titles))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::CanonicalPublicationRecord;

    fn record(key: &str, title: &str) -> CanonicalPublicationRecord {
        CanonicalPublicationRecord {
            key: PublicationKey::new(key),
            title: title.into(),
            ..Default::default()
        }
    }

    #[test]
    fn test_clean_doi() {
        assert_eq!(clean_doi("https://doi.org/10.1000/ABC.1"), "10.1000/abc.1");
        assert_eq!(clean_doi("doi:10.1/X"), "10.1/x");
        assert_eq!(clean_doi(" 10.5/y "), "10.5/y");
    }

    #[test]
    fn test_key_prefers_doi() {
        let r = SourceRecord {
            doi: Some("10.1000/XYZ".into()),
            pmid: Some("123".into()),
            alternate_id: Some("https://example.org/p".into()),
            ..Default::default()
        };
        assert_eq!(
            PublicationKey::for_record(&r).unwrap().as_str(),
            "https://doi.org/10.1000/xyz"
        );
    }

    #[test]
    fn test_key_falls_back_to_pmid_then_url() {
        let r = SourceRecord {
            doi: Some("  ".into()),
            pmid: Some("123\n456".into()),
            ..Default::default()
        };
        assert_eq!(PublicationKey::for_record(&r).unwrap().as_str(), "123");

        let r = SourceRecord {
            alternate_id: Some("https://example.org/p".into()),
            ..Default::default()
        };
        assert_eq!(
            PublicationKey::for_record(&r).unwrap().as_str(),
            "https://example.org/p"
        );
        assert!(PublicationKey::for_record(&SourceRecord::default()).is_none());
    }

    #[test]
    fn test_is_known_by_key_or_title() {
        let mut set = ResultSet::new();
        set.insert(record("https://doi.org/10.1/a", "Gene expression in mice"));

        assert!(is_known("HTTPS://DOI.ORG/10.1/A", "whatever", &set, None));
        assert!(is_known("999", "Gene expression in mice.", &set, None));
        assert!(!is_known("999", "Protein folding in yeast", &set, None));

        let titles = vec!["Protein folding in yeast".to_string()];
        assert!(is_known("999", "Protein folding in yeast", &set, Some(&titles)));
    }

    #[test]
    fn test_empty_title_never_matches() {
        let mut set = ResultSet::new();
        set.insert(record("1", ""));
        assert!(!is_known("2", "", &set, None));
    }

    #[test]
    fn test_find_known_key_by_stored_identifiers() {
        let mut set = ResultSet::new();
        set.insert(CanonicalPublicationRecord {
            pmid: Some("31415".into()),
            doi: Some("10.1/A".into()),
            ..record("https://doi.org/10.1/a", "Gene expression in mice")
        });
        set.insert(CanonicalPublicationRecord {
            doi: Some("10.2/b".into()),
            ..record("27182", "Dust exposure in miners")
        });

        // PMID-only arrival with a drifted title still lands on the DOI key
        assert_eq!(
            find_known_key("31415", "Expression of genes in mouse tissue", &set)
                .unwrap()
                .as_str(),
            "https://doi.org/10.1/a"
        );
        assert_eq!(
            find_known_key("https://doi.org/10.2/B", "Unrelated wording", &set)
                .unwrap()
                .as_str(),
            "27182"
        );
        assert!(is_known("31415", "Expression of genes in mouse tissue", &set, None));
        assert!(find_known_key("99999", "Unrelated wording", &set).is_none());
    }

    #[test]
    fn test_find_known_key() {
        let mut set = ResultSet::new();
        set.insert(record("https://doi.org/10.1/a", "Gene expression in mice"));
        assert_eq!(
            find_known_key("42", "Gene expresion in mice", &set).unwrap().as_str(),
            "https://doi.org/10.1/a"
        );
        assert!(find_known_key("42", "Unrelated", &set).is_none());
    }

    #[test]
    fn test_citations_in_set() {
        let mut set = ResultSet::new();
        let mut r = record("https://doi.org/10.1/a", "Gene expression in mice");
        r.doi = Some("10.1/A".into());
        r.pmid = Some("555".into());
        set.insert(r);

        let citations = vec![
            TokenizedCitation {
                pmid: Some("555".into()),
                ..Default::default()
            },
            TokenizedCitation {
                doi: Some("10.1/a".into()),
                ..Default::default()
            },
            TokenizedCitation {
                title: Some("GENE EXPRESSION IN MICE".into()),
                ..Default::default()
            },
            TokenizedCitation {
                title: Some("Something else".into()),
                ..Default::default()
            },
        ];
        assert_eq!(citations_in_set(&citations, &set), vec![true, true, true, false]);
    }
}
