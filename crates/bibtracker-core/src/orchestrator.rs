use std::collections::BTreeMap;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::matching::is_match;
use crate::merge::{MergeContext, MergeReport, citation_satisfied_by, merge, resolve_citations};
use crate::source::{RecordSource, SourceError};
use crate::{PublicationKey, ResultSet, Roster, SourceKind, SourceRecord, TokenizedCitation};

/// Knobs for a collection run.
#[derive(Debug, Clone)]
pub struct CollectSettings {
    /// How many times the full source sequence is merged.
    pub passes: usize,
}

impl Default for CollectSettings {
    fn default() -> Self {
        Self {
            passes: crate::config_file::DEFAULT_PASSES,
        }
    }
}

/// Everything a collection run produced. `results` is valid even when the
/// run was cancelled part way.
#[derive(Debug, Default)]
pub struct CollectOutcome {
    pub results: ResultSet,
    pub report: MergeReport,
    pub failed_sources: Vec<SourceKind>,
    pub cancelled: bool,
}

/// Fetch every source concurrently; batches are grouped by kind.
///
/// A failing source is logged and left out. Returns `None` when `cancel`
/// fires before all fetches complete.
async fn fetch_all(
    sources: &[Arc<dyn RecordSource>],
    roster: &Roster,
    cancel: &CancellationToken,
    failed: &mut Vec<SourceKind>,
) -> Option<BTreeMap<SourceKind, Vec<SourceRecord>>> {
    let roster = Arc::new(roster.clone());
    let mut join_set = tokio::task::JoinSet::new();

    for source in sources {
        let source = Arc::clone(source);
        let roster = Arc::clone(&roster);
        join_set.spawn(async move {
            let kind = source.kind();
            let result = source.fetch(&roster).await;
            (kind, result)
        });
    }

    let mut batches: BTreeMap<SourceKind, Vec<SourceRecord>> = BTreeMap::new();
    loop {
        let next = tokio::select! {
            _ = cancel.cancelled() => {
                join_set.abort_all();
                tracing::info!("cancelled while fetching sources");
                return None;
            }
            next = join_set.join_next() => next,
        };
        let Some(joined) = next else {
            break;
        };
        match joined {
            Ok((kind, Ok(records))) => {
                tracing::info!(source = %kind, records = records.len(), "fetched");
                batches.entry(kind).or_default().extend(records);
            }
            Ok((kind, Err(e))) => {
                tracing::warn!(source = %kind, error = %e, "source failed, skipping");
                failed.push(kind);
            }
            Err(e) => tracing::warn!(error = %e, "source task panicked"),
        }
    }
    Some(batches)
}

/// Collect publications for the roster from every source.
///
/// Fetches run concurrently. Batches are then merged one at a time in
/// priority order (PubMed, ORCID, Google Scholar, Crossref), and the whole
/// sequence repeats `settings.passes` times. `cancel` is checked before each
/// merge step; whatever was merged before cancellation is returned.
pub async fn collect_publications(
    sources: &[Arc<dyn RecordSource>],
    roster: &Roster,
    exclusion: &ResultSet,
    settings: &CollectSettings,
    cancel: &CancellationToken,
) -> CollectOutcome {
    let mut outcome = CollectOutcome::default();

    let Some(batches) = fetch_all(sources, roster, cancel, &mut outcome.failed_sources).await
    else {
        outcome.cancelled = true;
        return outcome;
    };

    let ctx = MergeContext::new(roster, exclusion);
    'passes: for pass in 0..settings.passes {
        for (kind, records) in &batches {
            if cancel.is_cancelled() {
                tracing::info!(pass, source = %kind, "cancelled before merge");
                outcome.cancelled = true;
                break 'passes;
            }
            let report = merge(&mut outcome.results, records, *kind, &ctx);
            outcome.report.absorb(report);
        }
        tracing::debug!(pass, publications = outcome.results.len(), "pass complete");
    }

    outcome
}

/// Records from `pool` a lookup for `citation` would plausibly return: same
/// PMID or DOI, or a fuzzy title match.
pub fn candidates_for(citation: &TokenizedCitation, pool: &[SourceRecord]) -> Vec<SourceRecord> {
    pool.iter()
        .filter(|record| {
            citation_satisfied_by(citation, record)
                || matches!(
                    (&citation.title, &record.title),
                    (Some(cited), Some(found)) if is_match(cited, found)
                )
        })
        .cloned()
        .collect()
}

/// Resolve citations against every source, in priority order.
///
/// Each source's records act as the lookup pool for every citation. A
/// citation already resolved by an earlier source keeps its key; later
/// sources only augment the records. Returns the key per citation.
pub async fn resolve_references(
    sources: &[Arc<dyn RecordSource>],
    roster: &Roster,
    citations: &mut [TokenizedCitation],
    results: &mut ResultSet,
    cancel: &CancellationToken,
) -> Result<Vec<Option<PublicationKey>>, SourceError> {
    let mut failed = Vec::new();
    let Some(batches) = fetch_all(sources, roster, cancel, &mut failed).await else {
        return Ok(vec![None; citations.len()]);
    };
    if batches.is_empty() {
        if let Some(kind) = failed.first() {
            return Err(SourceError::Other {
                kind: *kind,
                message: "every source failed".to_string(),
            });
        }
    }

    let mut keys: Vec<Option<PublicationKey>> = vec![None; citations.len()];
    for (kind, pool) in &batches {
        if cancel.is_cancelled() {
            tracing::info!(source = %kind, "cancelled before resolving");
            break;
        }
        let candidates: Vec<Vec<SourceRecord>> =
            citations.iter().map(|c| candidates_for(c, pool)).collect();
        let found = resolve_citations(results, citations, &candidates, *kind);
        for (slot, key) in keys.iter_mut().zip(found) {
            if slot.is_none() {
                *slot = key;
            }
        }
    }
    // an earlier source's key wins on the citation too
    for (citation, key) in citations.iter_mut().zip(&keys) {
        citation.publication_key = key.clone();
    }
    Ok(keys)
}
