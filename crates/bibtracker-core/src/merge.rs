//! Folding source batches into a running result set.
//!
//! Two paths feed a [`ResultSet`]:
//!
//! - [`merge`], the author path: records come from querying the roster's
//!   authors and are kept only when a tracked author can be attributed.
//! - [`resolve_citations`], the reference path: records come from looking up
//!   input citations and are kept when they satisfy a citation.
//!
//! In both, a record already present (by key or fuzzy title) is never
//! replaced and its key never changes; later sources can only add to it.

use serde::Serialize;

use crate::authors::{citation_authors_overlap, match_authors, merge_author_lists};
use crate::identity::{clean_doi, find_known_key, is_known};
use crate::matching::is_match;
use crate::{
    CanonicalPublicationRecord, PublicationKey, ResultSet, Roster, SourceKind, SourceRecord,
    TokenizedCitation,
};

/// Read-only inputs shared by every merge in a run.
#[derive(Debug, Clone)]
pub struct MergeContext<'a> {
    pub roster: &'a Roster,
    /// Publications already reported in earlier runs.
    pub exclusion: &'a ResultSet,
    /// Titles of `exclusion`, computed once.
    pub exclusion_titles: Vec<String>,
}

impl<'a> MergeContext<'a> {
    pub fn new(roster: &'a Roster, exclusion: &'a ResultSet) -> Self {
        Self {
            roster,
            exclusion,
            exclusion_titles: exclusion.titles(),
        }
    }
}

/// What happened to each record of a merged batch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MergeReport {
    pub inserted: usize,
    /// Existing records that gained newly attributed authors.
    pub appended: usize,
    pub duplicates: usize,
    pub excluded: usize,
    /// Titles of records with no DOI, PMID or alternate URL.
    pub unkeyed: Vec<String>,
    pub unattributed: usize,
    pub before_cutoff: usize,
}

impl MergeReport {
    pub fn absorb(&mut self, other: MergeReport) {
        self.inserted += other.inserted;
        self.appended += other.appended;
        self.duplicates += other.duplicates;
        self.excluded += other.excluded;
        self.unkeyed.extend(other.unkeyed);
        self.unattributed += other.unattributed;
        self.before_cutoff += other.before_cutoff;
    }

    pub fn total(&self) -> usize {
        self.inserted
            + self.appended
            + self.duplicates
            + self.excluded
            + self.unkeyed.len()
            + self.unattributed
            + self.before_cutoff
    }
}

/// True when the record predates the cutoff of every attributed author.
/// An unknown year never predates anything.
fn before_cutoff(year: Option<i32>, roster: &Roster, authors: &[crate::SourceAuthor]) -> bool {
    let Some(year) = year else {
        return false;
    };
    let cutoffs: Vec<i32> = authors
        .iter()
        .filter_map(|a| a.author_id.as_deref())
        .filter_map(|id| roster.get(id))
        .map(|entry| entry.cutoff_year)
        .collect();
    !cutoffs.is_empty() && cutoffs.iter().all(|&cutoff| year < cutoff)
}

/// Merge one source's batch into `results`.
///
/// For each record, in order: derive its key (records without one are
/// reported in [`MergeReport::unkeyed`] and dropped); drop it when the
/// exclusion set already knows it; attribute its authors against the roster
/// and drop it when none match; drop it when it predates every attributed
/// author's cutoff year. A record already in `results` is skipped, except
/// that author-centric sources add attributed authors the existing record
/// lacks. Anything else is inserted under its own key.
///
/// Merging the same batch twice leaves `results` unchanged the second time.
pub fn merge(
    results: &mut ResultSet,
    records: &[SourceRecord],
    source: SourceKind,
    ctx: &MergeContext<'_>,
) -> MergeReport {
    let mut report = MergeReport::default();

    for record in records {
        let title = record.title.as_deref().unwrap_or("");
        let Some(key) = PublicationKey::for_record(record) else {
            tracing::warn!(source = %source, title, "no DOI, PMID or URL; record dropped");
            report.unkeyed.push(title.to_string());
            continue;
        };

        if is_known(key.as_str(), title, ctx.exclusion, Some(&ctx.exclusion_titles)) {
            report.excluded += 1;
            continue;
        }

        let authors = match_authors(ctx.roster, &record.authors);
        if authors.is_empty() {
            report.unattributed += 1;
            continue;
        }

        if before_cutoff(record.publication_date.year, ctx.roster, &authors) {
            report.before_cutoff += 1;
            continue;
        }

        if let Some(existing_key) = find_known_key(key.as_str(), title, results) {
            if !source.is_author_centric() {
                report.duplicates += 1;
                continue;
            }
            let Some(existing) = results.get_mut(&existing_key) else {
                continue;
            };
            let new_authors: Vec<_> = authors
                .into_iter()
                .filter(|a| {
                    a.author_id
                        .as_deref()
                        .is_some_and(|id| !existing.attributed_ids().any(|known| known == id))
                })
                .collect();
            if new_authors.is_empty() {
                report.duplicates += 1;
                continue;
            }
            tracing::debug!(
                source = %source,
                key = %existing_key,
                added = new_authors.len(),
                "attributed authors added to existing record"
            );
            existing.authors.extend(new_authors);
            if !existing.queried_sources.contains(&source) {
                existing.queried_sources.push(source);
            }
            report.appended += 1;
            continue;
        }

        tracing::debug!(source = %source, key = %key, "new publication");
        results.insert(CanonicalPublicationRecord::from_source(
            key, record, authors, source,
        ));
        report.inserted += 1;
    }

    log_report(source, &report);
    report
}

fn log_report(source: SourceKind, report: &MergeReport) {
    tracing::info!(
        source = %source,
        inserted = report.inserted,
        appended = report.appended,
        duplicates = report.duplicates,
        excluded = report.excluded,
        unkeyed = report.unkeyed.len(),
        unattributed = report.unattributed,
        before_cutoff = report.before_cutoff,
        "merged batch"
    );
}

fn fill<T: Clone>(slot: &mut Option<T>, value: &Option<T>) {
    if slot.is_none() {
        slot.clone_from(value);
    }
}

/// Fill fields `existing` lacks from `record`, merge authors and grants.
/// Existing values always win.
pub fn augment(existing: &mut CanonicalPublicationRecord, record: &SourceRecord, source: SourceKind) {
    if existing.title.is_empty() {
        if let Some(title) = &record.title {
            existing.title = title.clone();
        }
    }
    fill(&mut existing.doi, &record.doi);
    fill(&mut existing.pmid, &record.pmid);
    fill(&mut existing.pmcid, &record.pmcid);
    fill(&mut existing.journal, &record.journal);
    fill(&mut existing.alternate_id, &record.alternate_id);
    fill(&mut existing.publication_date.year, &record.publication_date.year);
    fill(&mut existing.publication_date.month, &record.publication_date.month);
    fill(&mut existing.publication_date.day, &record.publication_date.day);

    existing.authors = merge_author_lists(&existing.authors, &record.authors);
    for grant in &record.grants {
        if !existing.grants.contains(grant) {
            existing.grants.push(grant.clone());
        }
    }
    if !existing.queried_sources.contains(&source) {
        existing.queried_sources.push(source);
    }
}

/// True when `record` is the publication `citation` refers to: same PMID,
/// same DOI, or a shared author surname plus a fuzzy title match.
pub fn citation_satisfied_by(citation: &TokenizedCitation, record: &SourceRecord) -> bool {
    let same_pmid = matches!(
        (&citation.pmid, &record.pmid),
        (Some(a), Some(b)) if !a.trim().is_empty() && a.trim() == b.trim()
    );
    let same_doi = matches!(
        (&citation.doi, &record.doi),
        (Some(a), Some(b)) if !a.trim().is_empty() && clean_doi(a) == clean_doi(b)
    );
    if same_pmid || same_doi {
        return true;
    }
    match (&citation.title, &record.title) {
        (Some(cited), Some(found)) => {
            citation_authors_overlap(&citation.authors, &record.authors) && is_match(cited, found)
        }
        _ => false,
    }
}

/// Resolve each citation against the records a source returned for it.
///
/// `candidates[i]` holds the records found while looking up `citations[i]`.
/// Candidates already in `results` augment the existing record, at most once
/// per source. A candidate not yet in `results` is inserted only when it
/// satisfies the citation. The first satisfying candidate ends the search for
/// that citation; its key is stored on the citation and returned.
///
/// Citations with no candidates list resolve to `None`.
pub fn resolve_citations(
    results: &mut ResultSet,
    citations: &mut [TokenizedCitation],
    candidates: &[Vec<SourceRecord>],
    source: SourceKind,
) -> Vec<Option<PublicationKey>> {
    let mut resolved = Vec::with_capacity(citations.len());

    for (i, citation) in citations.iter_mut().enumerate() {
        let mut found: Option<PublicationKey> = None;

        for record in candidates.get(i).map(Vec::as_slice).unwrap_or_default() {
            let Some(key) = PublicationKey::for_record(record) else {
                continue;
            };
            let satisfied = citation_satisfied_by(citation, record);
            let title = record.title.as_deref().unwrap_or("");

            if let Some(existing_key) = find_known_key(key.as_str(), title, results) {
                if let Some(existing) = results.get_mut(&existing_key) {
                    if !existing.queried_sources.contains(&source) {
                        augment(existing, record, source);
                    }
                }
                if satisfied {
                    found = Some(existing_key);
                    break;
                }
                continue;
            }

            if satisfied {
                results.insert(CanonicalPublicationRecord::from_source(
                    key.clone(),
                    record,
                    record.authors.clone(),
                    source,
                ));
                found = Some(key);
                break;
            }
        }

        match &found {
            Some(key) => {
                tracing::debug!(source = %source, key = %key, "citation resolved");
                citation.publication_key = Some(key.clone());
            }
            None => tracing::debug!(source = %source, line = %citation.display_line(), "citation unresolved"),
        }
        resolved.push(found);
    }

    resolved
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{AuthorRosterEntry, PublicationDate, SourceAuthor};
    use std::collections::BTreeMap;

    fn roster() -> Roster {
        let mut entries = BTreeMap::new();
        entries.insert(
            "morris".to_string(),
            AuthorRosterEntry {
                first_name: "Andrew".into(),
                last_name: "Morris".into(),
                affiliations: vec!["kentucky".into()],
                cutoff_year: 2019,
                ..Default::default()
            },
        );
        entries.insert(
            "smith".to_string(),
            AuthorRosterEntry {
                first_name: "Jane".into(),
                last_name: "Smith".into(),
                affiliations: vec!["kentucky".into()],
                cutoff_year: 2015,
                ..Default::default()
            },
        );
        Roster::new(entries)
    }

    fn morris() -> SourceAuthor {
        SourceAuthor {
            first_name: Some("Andrew J".into()),
            last_name: Some("Morris".into()),
            affiliation: Some("University of Kentucky".into()),
            ..Default::default()
        }
    }

    fn smith() -> SourceAuthor {
        SourceAuthor {
            first_name: Some("Jane".into()),
            last_name: Some("Smith".into()),
            affiliation: Some("University of Kentucky".into()),
            ..Default::default()
        }
    }

    fn record(title: &str, doi: Option<&str>, pmid: Option<&str>, year: i32) -> SourceRecord {
        SourceRecord {
            title: Some(title.into()),
            authors: vec![morris()],
            doi: doi.map(String::from),
            pmid: pmid.map(String::from),
            publication_date: PublicationDate {
                year: Some(year),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    // =========================================================================
    // Author path
    // =========================================================================

    #[test]
    fn test_insert_and_idempotence() {
        let roster = roster();
        let exclusion = ResultSet::new();
        let ctx = MergeContext::new(&roster, &exclusion);
        let batch = vec![
            record("Lung outcomes in Kentucky", Some("10.1/A"), None, 2020),
            record("Liver outcomes in Ohio", None, Some("123"), 2021),
        ];

        let mut results = ResultSet::new();
        let first = merge(&mut results, &batch, SourceKind::PubMed, &ctx);
        assert_eq!(first.inserted, 2);
        let snapshot = results.clone();

        let second = merge(&mut results, &batch, SourceKind::PubMed, &ctx);
        assert_eq!(second.inserted, 0);
        assert_eq!(second.duplicates, 2);
        assert_eq!(results, snapshot);
    }

    #[test]
    fn test_key_stays_with_first_source() {
        let roster = roster();
        let exclusion = ResultSet::new();
        let ctx = MergeContext::new(&roster, &exclusion);
        let mut results = ResultSet::new();

        merge(
            &mut results,
            &[record("Lung outcomes in Kentucky", Some("10.1/A"), None, 2020)],
            SourceKind::PubMed,
            &ctx,
        );
        let report = merge(
            &mut results,
            &[record("Lung outcomes in Kentucky.", None, Some("999"), 2020)],
            SourceKind::Crossref,
            &ctx,
        );
        assert_eq!(report.duplicates, 1);
        assert_eq!(results.len(), 1);
        assert_eq!(
            results.keys().next().unwrap().as_str(),
            "https://doi.org/10.1/a"
        );
    }

    #[test]
    fn test_unkeyed_reported_with_title() {
        let roster = roster();
        let exclusion = ResultSet::new();
        let ctx = MergeContext::new(&roster, &exclusion);
        let mut results = ResultSet::new();
        let report = merge(
            &mut results,
            &[record("Nowhere to be found", None, None, 2020)],
            SourceKind::Crossref,
            &ctx,
        );
        assert_eq!(report.unkeyed, vec!["Nowhere to be found".to_string()]);
        assert!(results.is_empty());
    }

    #[test]
    fn test_exclusion_by_title() {
        let roster = roster();
        let mut exclusion = ResultSet::new();
        exclusion.insert(CanonicalPublicationRecord {
            key: PublicationKey::new("old-key"),
            title: "Lung outcomes in Kentucky".into(),
            ..Default::default()
        });
        let ctx = MergeContext::new(&roster, &exclusion);
        let mut results = ResultSet::new();
        let report = merge(
            &mut results,
            &[record("Lung Outcomes in Kentucky", Some("10.1/new"), None, 2020)],
            SourceKind::PubMed,
            &ctx,
        );
        assert_eq!(report.excluded, 1);
        assert!(results.is_empty());
    }

    #[test]
    fn test_unattributed_dropped() {
        let roster = roster();
        let exclusion = ResultSet::new();
        let ctx = MergeContext::new(&roster, &exclusion);
        let mut r = record("Someone else's paper", Some("10.1/x"), None, 2020);
        r.authors[0].affiliation = Some("Ohio State".into());
        let mut results = ResultSet::new();
        let report = merge(&mut results, &[r], SourceKind::PubMed, &ctx);
        assert_eq!(report.unattributed, 1);
        assert!(results.is_empty());
    }

    #[test]
    fn test_cutoff_uses_every_attributed_author() {
        let roster = roster();
        let exclusion = ResultSet::new();
        let ctx = MergeContext::new(&roster, &exclusion);
        let mut results = ResultSet::new();

        // 2017 predates Morris (2019) only
        let mut shared = record("Shared paper", Some("10.1/shared"), None, 2017);
        shared.authors.push(smith());
        // 2017 predates Morris's cutoff and he is the only tracked author
        let solo = record("Solo paper", Some("10.1/solo"), None, 2017);
        // unknown year passes
        let mut undated = record("Undated paper", Some("10.1/undated"), None, 0);
        undated.publication_date.year = None;

        let report = merge(
            &mut results,
            &[shared, solo, undated],
            SourceKind::PubMed,
            &ctx,
        );
        assert_eq!(report.inserted, 2);
        assert_eq!(report.before_cutoff, 1);
        assert!(results.resolve_key("https://doi.org/10.1/solo").is_none());
    }

    #[test]
    fn test_author_centric_appends_attribution() {
        let roster = roster();
        let exclusion = ResultSet::new();
        let ctx = MergeContext::new(&roster, &exclusion);
        let mut results = ResultSet::new();

        merge(
            &mut results,
            &[record("Shared paper", Some("10.1/shared"), None, 2020)],
            SourceKind::PubMed,
            &ctx,
        );
        let mut from_orcid = record("Shared paper", Some("10.1/SHARED"), None, 2020);
        from_orcid.authors = vec![smith()];

        let report = merge(&mut results, &[from_orcid.clone()], SourceKind::Orcid, &ctx);
        assert_eq!(report.appended, 1);
        let rec = results.get(&PublicationKey::new("https://doi.org/10.1/shared")).unwrap();
        let ids: Vec<&str> = rec.attributed_ids().collect();
        assert_eq!(ids, vec!["morris", "smith"]);
        assert_eq!(rec.queried_sources, vec![SourceKind::PubMed, SourceKind::Orcid]);

        let again = merge(&mut results, &[from_orcid], SourceKind::Orcid, &ctx);
        assert_eq!(again.appended, 0);
        assert_eq!(again.duplicates, 1);
    }

    #[test]
    fn test_non_author_centric_does_not_append() {
        let roster = roster();
        let exclusion = ResultSet::new();
        let ctx = MergeContext::new(&roster, &exclusion);
        let mut results = ResultSet::new();
        merge(
            &mut results,
            &[record("Shared paper", Some("10.1/shared"), None, 2020)],
            SourceKind::PubMed,
            &ctx,
        );
        let mut other = record("Shared paper", Some("10.1/shared"), None, 2020);
        other.authors = vec![smith()];
        merge(&mut results, &[other], SourceKind::Crossref, &ctx);
        let rec = results.get(&PublicationKey::new("https://doi.org/10.1/shared")).unwrap();
        assert_eq!(rec.authors.len(), 1);
    }

    // =========================================================================
    // Reference path
    // =========================================================================

    fn citation(title: &str, doi: Option<&str>, pmid: Option<&str>) -> TokenizedCitation {
        TokenizedCitation {
            authors: vec![crate::CitationAuthor::with_initials("Morris", "AJ")],
            title: Some(title.into()),
            doi: doi.map(String::from),
            pmid: pmid.map(String::from),
            ..Default::default()
        }
    }

    #[test]
    fn test_resolve_by_doi_despite_title_typo() {
        let mut results = ResultSet::new();
        let mut citations = vec![citation("A Study of Things", Some("10.1/abc"), Some("111222"))];
        let candidates = vec![vec![record("A Stduy of Thinsg entirely", Some("10.1/ABC"), None, 2020)]];

        let keys = resolve_citations(&mut results, &mut citations, &candidates, SourceKind::Crossref);
        let key = keys[0].clone().unwrap();
        assert_eq!(key.as_str(), "https://doi.org/10.1/abc");
        assert_eq!(citations[0].publication_key, Some(key.clone()));
        assert_eq!(results.get(&key).unwrap().queried_sources, vec![SourceKind::Crossref]);
    }

    #[test]
    fn test_resolve_by_author_and_title() {
        let mut results = ResultSet::new();
        let mut citations = vec![citation("Lung outcomes in Kentucky", None, None)];
        let candidates = vec![vec![
            record("Unrelated paper on hearts", Some("10.1/no"), None, 2020),
            record("Lung outcomes in Kentucky.", Some("10.1/yes"), None, 2020),
        ]];
        let keys = resolve_citations(&mut results, &mut citations, &candidates, SourceKind::PubMed);
        assert_eq!(keys[0].as_ref().unwrap().as_str(), "https://doi.org/10.1/yes");
        // non-satisfying candidates are not inserted
        assert_eq!(results.len(), 1);
    }

    #[test]
    fn test_resolve_augments_existing_once_per_source() {
        let mut results = ResultSet::new();
        results.insert(CanonicalPublicationRecord {
            key: PublicationKey::new("123"),
            title: "Lung outcomes in Kentucky".into(),
            pmid: Some("123".into()),
            grants: vec!["G1".into()],
            queried_sources: vec![SourceKind::PubMed],
            ..Default::default()
        });

        let mut found = record("Lung outcomes in Kentucky", Some("10.1/abc"), Some("123"), 2020);
        found.grants = vec!["G1".into(), "G2".into()];
        found.journal = Some("Journal X".into());
        let mut citations = vec![citation("Lung outcomes in Kentucky", None, Some("123"))];
        let candidates = vec![vec![found]];

        let keys = resolve_citations(&mut results, &mut citations, &candidates, SourceKind::Crossref);
        assert_eq!(keys[0].as_ref().unwrap().as_str(), "123");
        let rec = results.get(&PublicationKey::new("123")).unwrap().clone();
        assert_eq!(rec.doi.as_deref(), Some("10.1/abc"));
        assert_eq!(rec.journal.as_deref(), Some("Journal X"));
        assert_eq!(rec.grants, vec!["G1".to_string(), "G2".to_string()]);
        assert_eq!(rec.queried_sources, vec![SourceKind::PubMed, SourceKind::Crossref]);
        assert_eq!(rec.authors.len(), 1);

        resolve_citations(&mut results, &mut citations, &candidates, SourceKind::Crossref);
        assert_eq!(results.get(&PublicationKey::new("123")).unwrap(), &rec);
    }

    #[test]
    fn test_resolve_without_candidates() {
        let mut results = ResultSet::new();
        let mut citations = vec![citation("Anything", None, None)];
        let keys = resolve_citations(&mut results, &mut citations, &[], SourceKind::PubMed);
        assert_eq!(keys, vec![None]);
        assert!(citations[0].publication_key.is_none());
    }
}
