use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod authors;
pub mod config_file;
pub mod duplicates;
pub mod identity;
pub mod matching;
pub mod merge;
pub mod orchestrator;
pub mod source;

// Re-export for convenience
pub use authors::match_authors;
pub use duplicates::find_duplicate_groups;
pub use identity::is_known;
pub use matching::{is_match, matches_in_set};
pub use merge::{MergeContext, MergeReport, merge, resolve_citations};
pub use orchestrator::{CollectSettings, collect_publications};
pub use source::{RecordSource, SourceError};

/// Prefix used to turn a bare DOI into its canonical URI form.
pub const DOI_URL: &str = "https://doi.org/";

/// One author as written in a citation.
///
/// Styles disagree on which parts of a name they carry, so everything except
/// the last name is optional. A citation author always has at least one
/// non-empty field.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CitationAuthor {
    #[serde(default)]
    pub last: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub middle: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initials: Option<String>,
}

impl CitationAuthor {
    /// `Last INITIALS` form used by Vancouver, APA, Harvard and MEDLINE.
    pub fn with_initials(last: impl Into<String>, initials: impl Into<String>) -> Self {
        Self {
            last: last.into(),
            initials: Some(initials.into()),
            ..Default::default()
        }
    }

    /// `First Middle Last` form used by MLA and Chicago.
    pub fn with_names(
        first: impl Into<String>,
        middle: impl Into<String>,
        last: impl Into<String>,
    ) -> Self {
        Self {
            last: last.into(),
            first: Some(first.into()),
            middle: Some(middle.into()),
            initials: None,
        }
    }

    /// True when every field is empty.
    pub fn is_blank(&self) -> bool {
        let empty = |f: &Option<String>| f.as_deref().is_none_or(|s| s.trim().is_empty());
        self.last.trim().is_empty() && empty(&self.first) && empty(&self.middle) && empty(&self.initials)
    }
}

/// A citation extracted from an input document, independent of any database.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenizedCitation {
    #[serde(default)]
    pub authors: Vec<CitationAuthor>,
    #[serde(default)]
    pub title: Option<String>,
    /// PubMed ID, kept as the digit string it was written as.
    #[serde(default, rename = "PMID")]
    pub pmid: Option<String>,
    /// Lower-cased DOI without any resolver prefix.
    #[serde(default, rename = "DOI")]
    pub doi: Option<String>,
    /// The text the citation was parsed from. Empty for MEDLINE records.
    #[serde(default)]
    pub source_line: String,
    /// Key of the publication this citation was resolved to, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub publication_key: Option<PublicationKey>,
}

impl TokenizedCitation {
    /// A citation with no title, no identifiers and no authors carries nothing
    /// to match on and is never emitted.
    pub fn is_valid(&self) -> bool {
        self.title.as_deref().is_some_and(|t| !t.is_empty())
            || self.pmid.as_deref().is_some_and(|p| !p.is_empty())
            || self.doi.as_deref().is_some_and(|d| !d.is_empty())
            || !self.authors.is_empty()
    }

    /// Single-line rendering for diagnostics: the source line with internal
    /// newlines collapsed, or the title when there is no source line.
    pub fn display_line(&self) -> String {
        if self.source_line.trim().is_empty() {
            return self.title.clone().unwrap_or_default();
        }
        self.source_line
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicationDate {
    pub year: Option<i32>,
    pub month: Option<u32>,
    pub day: Option<u32>,
}

/// An author mention as reported by a bibliographic source.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceAuthor {
    #[serde(default, rename = "firstname")]
    pub first_name: Option<String>,
    #[serde(default, rename = "lastname")]
    pub last_name: Option<String>,
    #[serde(default)]
    pub initials: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collective_name: Option<String>,
    #[serde(default)]
    pub affiliation: Option<String>,
    #[serde(default, rename = "ORCID", skip_serializing_if = "Option::is_none")]
    pub orcid: Option<String>,
    /// Roster key this mention was attributed to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author_id: Option<String>,
}

impl SourceAuthor {
    pub fn display_name(&self) -> String {
        if let Some(name) = self.collective_name.as_deref().filter(|n| !n.is_empty()) {
            return name.to_string();
        }
        let first = self.first_name.as_deref().unwrap_or("");
        let last = self.last_name.as_deref().unwrap_or("");
        format!("{} {}", first, last).trim().to_string()
    }
}

/// A publication as returned by one source, before merging.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceRecord {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub authors: Vec<SourceAuthor>,
    #[serde(default)]
    pub doi: Option<String>,
    #[serde(default, rename = "pubmed_id")]
    pub pmid: Option<String>,
    #[serde(default, rename = "PMCID")]
    pub pmcid: Option<String>,
    #[serde(default)]
    pub journal: Option<String>,
    #[serde(default)]
    pub publication_date: PublicationDate,
    #[serde(default)]
    pub grants: Vec<String>,
    /// External URL, used as identity only when there is no DOI or PMID.
    #[serde(default)]
    pub alternate_id: Option<String>,
}

/// The bibliographic sources the engine knows how to merge.
///
/// Declaration order is merge priority: identifier-rich sources establish
/// canonical keys before URL-only sources run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum SourceKind {
    PubMed,
    #[serde(rename = "ORCID")]
    Orcid,
    #[serde(rename = "Google Scholar")]
    GoogleScholar,
    Crossref,
}

impl SourceKind {
    pub const ALL: [SourceKind; 4] = [
        SourceKind::PubMed,
        SourceKind::Orcid,
        SourceKind::GoogleScholar,
        SourceKind::Crossref,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            SourceKind::PubMed => "PubMed",
            SourceKind::Orcid => "ORCID",
            SourceKind::GoogleScholar => "Google Scholar",
            SourceKind::Crossref => "Crossref",
        }
    }

    /// Sources queried per roster author, whose results name that author
    /// directly rather than listing every co-author.
    pub fn is_author_centric(&self) -> bool {
        matches!(self, SourceKind::Orcid | SourceKind::GoogleScholar)
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for SourceKind {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted: String = s.chars().filter(|c| c.is_alphanumeric()).collect();
        SourceKind::ALL
            .into_iter()
            .find(|k| {
                let name: String = k.name().chars().filter(|c| c.is_alphanumeric()).collect();
                name.eq_ignore_ascii_case(&wanted)
            })
            .ok_or_else(|| CoreError::Validation(format!("unknown source: {}", s)))
    }
}

/// Canonical identity of a publication: DOI URI, else PMID, else an
/// alternate URL. Compared case-insensitively by the resolver.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PublicationKey(String);

impl PublicationKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn from_doi(doi: &str) -> Self {
        Self(format!("{}{}", DOI_URL, doi.trim().to_lowercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn eq_ignore_case(&self, other: &str) -> bool {
        self.0.to_lowercase() == other.to_lowercase()
    }
}

impl fmt::Display for PublicationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A merged publication in a result set. Its key never changes once created;
/// later sources only add to it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanonicalPublicationRecord {
    pub key: PublicationKey,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub authors: Vec<SourceAuthor>,
    #[serde(default)]
    pub doi: Option<String>,
    #[serde(default, rename = "pubmed_id")]
    pub pmid: Option<String>,
    #[serde(default, rename = "PMCID")]
    pub pmcid: Option<String>,
    #[serde(default)]
    pub journal: Option<String>,
    #[serde(default)]
    pub publication_date: PublicationDate,
    #[serde(default)]
    pub grants: Vec<String>,
    #[serde(default)]
    pub alternate_id: Option<String>,
    #[serde(default)]
    pub queried_sources: Vec<SourceKind>,
}

impl Default for PublicationKey {
    fn default() -> Self {
        Self(String::new())
    }
}

impl CanonicalPublicationRecord {
    pub fn from_source(
        key: PublicationKey,
        record: &SourceRecord,
        authors: Vec<SourceAuthor>,
        source: SourceKind,
    ) -> Self {
        Self {
            key,
            title: record.title.clone().unwrap_or_default(),
            authors,
            doi: record.doi.clone(),
            pmid: record.pmid.clone(),
            pmcid: record.pmcid.clone(),
            journal: record.journal.clone(),
            publication_date: record.publication_date,
            grants: record.grants.clone(),
            alternate_id: record.alternate_id.clone(),
            queried_sources: vec![source],
        }
    }

    /// Roster keys already attributed on this record.
    pub fn attributed_ids(&self) -> impl Iterator<Item = &str> {
        self.authors.iter().filter_map(|a| a.author_id.as_deref())
    }

    /// Grants of the attributed roster authors that this record acknowledges.
    ///
    /// A roster grant counts when it appears inside any of the record's grant
    /// strings, ignoring case and whitespace, since funder fields often wrap
    /// the award number in other text. Sorted, without repeats.
    pub fn tracked_grants<'r>(&self, roster: &'r Roster) -> Vec<&'r str> {
        fn squash(s: &str) -> String {
            s.chars()
                .filter(|c| !c.is_whitespace())
                .flat_map(char::to_lowercase)
                .collect()
        }
        let acknowledged: Vec<String> = self.grants.iter().map(|g| squash(g)).collect();

        let mut found: Vec<&str> = self
            .attributed_ids()
            .filter_map(|id| roster.get(id))
            .flat_map(|entry| entry.grants.iter())
            .map(String::as_str)
            .filter(|grant| {
                let grant = squash(grant);
                !grant.is_empty() && acknowledged.iter().any(|a| a.contains(&grant))
            })
            .collect();
        found.sort_unstable();
        found.dedup();
        found
    }
}

/// Publications keyed by [`PublicationKey`], at most one per key.
///
/// Used both for the result set being built and for the read-only exclusion
/// set of previously reported publications.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResultSet {
    records: BTreeMap<PublicationKey, CanonicalPublicationRecord>,
}

impl ResultSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Find the stored key equal to `key` ignoring case.
    pub fn resolve_key(&self, key: &str) -> Option<&PublicationKey> {
        if let Some((k, _)) = self.records.get_key_value(&PublicationKey::new(key)) {
            return Some(k);
        }
        self.records.keys().find(|k| k.eq_ignore_case(key))
    }

    pub fn get(&self, key: &PublicationKey) -> Option<&CanonicalPublicationRecord> {
        self.records.get(key)
    }

    pub fn get_mut(&mut self, key: &PublicationKey) -> Option<&mut CanonicalPublicationRecord> {
        self.records.get_mut(key)
    }

    /// Insert a record under its own key. Returns `false` and leaves the set
    /// untouched when the key is already present.
    pub fn insert(&mut self, record: CanonicalPublicationRecord) -> bool {
        if self.resolve_key(record.key.as_str()).is_some() {
            return false;
        }
        self.records.insert(record.key.clone(), record);
        true
    }

    pub fn iter(&self) -> impl Iterator<Item = (&PublicationKey, &CanonicalPublicationRecord)> {
        self.records.iter()
    }

    pub fn keys(&self) -> impl Iterator<Item = &PublicationKey> {
        self.records.keys()
    }

    /// Non-empty titles of every record, in key order.
    pub fn titles(&self) -> Vec<String> {
        self.records
            .values()
            .filter(|r| !r.title.is_empty())
            .map(|r| r.title.clone())
            .collect()
    }
}

/// A tracked author.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorRosterEntry {
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub affiliations: Vec<String>,
    /// Publications from before this year are ignored. 0 tracks everything.
    #[serde(default)]
    pub cutoff_year: i32,
    #[serde(default, rename = "ORCID", alias = "orcid")]
    pub orcid: Option<String>,
    #[serde(default)]
    pub collective_name: Option<String>,
    #[serde(default)]
    pub scholar_id: Option<String>,
    #[serde(default)]
    pub grants: Vec<String>,
}

/// The configured authors, keyed by roster key. Never mutated by matching.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Roster(BTreeMap<String, AuthorRosterEntry>);

impl Roster {
    pub fn new(entries: BTreeMap<String, AuthorRosterEntry>) -> Self {
        Self(entries)
    }

    pub fn get(&self, key: &str) -> Option<&AuthorRosterEntry> {
        self.0.get(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &AuthorRosterEntry)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Reject entries that could never match anything.
    pub fn validate(&self) -> Result<(), CoreError> {
        for (key, entry) in &self.0 {
            let named = !entry.first_name.trim().is_empty() && !entry.last_name.trim().is_empty();
            let collective = entry
                .collective_name
                .as_deref()
                .is_some_and(|n| !n.trim().is_empty());
            if !named && !collective {
                return Err(CoreError::Validation(format!(
                    "author {} needs first_name and last_name, or collective_name",
                    key
                )));
            }
            if named && entry.affiliations.is_empty() && entry.orcid.is_none() {
                tracing::warn!(author = %key, "no affiliations or ORCID, name matches can never be confirmed");
            }
        }
        Ok(())
    }
}

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("config error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("XML error: {0}")]
    Xml(String),
    #[error("validation error: {0}")]
    Validation(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn source_kind_parses_loose_names() {
        assert_eq!("google-scholar".parse::<SourceKind>().unwrap(), SourceKind::GoogleScholar);
        assert_eq!("orcid".parse::<SourceKind>().unwrap(), SourceKind::Orcid);
        assert_eq!("PubMed".parse::<SourceKind>().unwrap(), SourceKind::PubMed);
        assert!("scopus".parse::<SourceKind>().is_err());
    }

    #[test]
    fn priority_order_puts_pubmed_first() {
        let mut kinds = vec![SourceKind::Crossref, SourceKind::GoogleScholar, SourceKind::PubMed];
        kinds.sort();
        assert_eq!(
            kinds,
            vec![SourceKind::PubMed, SourceKind::GoogleScholar, SourceKind::Crossref]
        );
    }

    #[test]
    fn result_set_keys_are_case_insensitive() {
        let mut set = ResultSet::new();
        let key = PublicationKey::from_doi("10.1000/ABC");
        assert_eq!(key.as_str(), "https://doi.org/10.1000/abc");
        assert!(set.insert(CanonicalPublicationRecord {
            key: key.clone(),
            ..Default::default()
        }));
        assert_eq!(set.resolve_key("HTTPS://DOI.ORG/10.1000/ABC"), Some(&key));
        assert!(!set.insert(CanonicalPublicationRecord {
            key: PublicationKey::new("https://doi.org/10.1000/ABC"),
            ..Default::default()
        }));
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn pmid_round_trips_as_string() {
        let citation = TokenizedCitation {
            pmid: Some("0012345".into()),
            ..Default::default()
        };
        let json = serde_json::to_string(&citation).unwrap();
        assert!(json.contains("\"PMID\":\"0012345\""));
        let back: TokenizedCitation = serde_json::from_str(&json).unwrap();
        assert_eq!(back, citation);
    }

    #[test]
    fn citation_validity() {
        assert!(!TokenizedCitation::default().is_valid());
        assert!(!TokenizedCitation {
            title: Some(String::new()),
            ..Default::default()
        }
        .is_valid());
        assert!(TokenizedCitation {
            doi: Some("10.1/x".into()),
            title: Some(String::new()),
            ..Default::default()
        }
        .is_valid());
    }

    #[test]
    fn tracked_grants_only_for_attributed_authors() {
        let mut entries = BTreeMap::new();
        entries.insert(
            "jsmith".to_string(),
            AuthorRosterEntry {
                first_name: "Jane".into(),
                last_name: "Smith".into(),
                grants: vec!["P42ES007380".into(), "R01 HL1".into()],
                ..Default::default()
            },
        );
        entries.insert(
            "bli".to_string(),
            AuthorRosterEntry {
                first_name: "Bo".into(),
                last_name: "Li".into(),
                grants: vec!["U24 DK097215".into()],
                ..Default::default()
            },
        );
        let roster = Roster::new(entries);

        let record = CanonicalPublicationRecord {
            authors: vec![SourceAuthor {
                last_name: Some("Smith".into()),
                author_id: Some("jsmith".into()),
                ..Default::default()
            }],
            grants: vec!["P42 ES007380/ES/NIEHS NIH HHS/United States".into(), "U24DK097215".into()],
            ..Default::default()
        };
        // Li is not attributed, so their grant does not count
        assert_eq!(record.tracked_grants(&roster), vec!["P42ES007380"]);
    }

    #[test]
    fn roster_validation_rejects_nameless_entry() {
        let mut entries = BTreeMap::new();
        entries.insert("ghost".to_string(), AuthorRosterEntry::default());
        assert!(Roster::new(entries).validate().is_err());
    }
}
