//! Record sources and the converters that turn their payloads into
//! [`SourceRecord`]s.
//!
//! Live API clients sit outside this crate. A source here is anything that can
//! hand back a batch of records for the current roster: saved API payloads on
//! disk ([`SnapshotSource`]) or canned batches in tests ([`mock::MockSource`]).

pub mod crossref;
pub mod mock;
pub mod orcid;
pub mod pubmed;
pub mod scholar;

use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;

use thiserror::Error;

use crate::{AuthorRosterEntry, Roster, SourceAuthor, SourceKind, SourceRecord};

#[derive(Error, Debug)]
pub enum SourceError {
    #[error("{kind}: could not read {path}: {err}")]
    Io {
        kind: SourceKind,
        path: PathBuf,
        #[source]
        err: std::io::Error,
    },
    #[error("{kind}: malformed payload: {message}")]
    Malformed { kind: SourceKind, message: String },
    #[error("{kind}: {message}")]
    Other { kind: SourceKind, message: String },
}

impl SourceError {
    pub fn malformed(kind: SourceKind, message: impl ToString) -> Self {
        SourceError::Malformed {
            kind,
            message: message.to_string(),
        }
    }
}

pub type FetchFuture<'a> =
    Pin<Box<dyn Future<Output = Result<Vec<SourceRecord>, SourceError>> + Send + 'a>>;

/// A bibliographic source that yields records for the tracked authors.
pub trait RecordSource: Send + Sync {
    fn kind(&self) -> SourceKind;

    /// Fetch every record this source has for `roster`.
    fn fetch<'a>(&'a self, roster: &'a Roster) -> FetchFuture<'a>;
}

/// A source backed by a saved API payload.
///
/// The expected file shape depends on `kind`:
///
/// | kind | payload |
/// |---|---|
/// | PubMed | efetch XML (`<PubmedArticleSet>`) |
/// | Crossref | works JSON (`{"message": {"items": [...]}}`) |
/// | ORCID | object of roster key to works JSON (`{"group": [...]}`) |
/// | Google Scholar | object of roster key to author JSON (`{"publications": [...]}`) |
#[derive(Debug, Clone)]
pub struct SnapshotSource {
    kind: SourceKind,
    path: PathBuf,
}

impl SnapshotSource {
    pub fn new(kind: SourceKind, path: impl Into<PathBuf>) -> Self {
        Self {
            kind,
            path: path.into(),
        }
    }

    pub fn path(&self) -> &std::path::Path {
        &self.path
    }

    /// Convert an in-memory payload, the same way [`RecordSource::fetch`]
    /// converts the file contents.
    pub fn convert(
        kind: SourceKind,
        payload: &str,
        roster: &Roster,
    ) -> Result<Vec<SourceRecord>, SourceError> {
        match kind {
            SourceKind::PubMed => pubmed::records_from_xml(payload),
            SourceKind::Crossref => {
                let value = parse_json(kind, payload)?;
                Ok(crossref::records_from_json(&value))
            }
            SourceKind::Orcid => {
                let value = parse_json(kind, payload)?;
                Ok(orcid::records_from_json(&value, roster))
            }
            SourceKind::GoogleScholar => {
                let value = parse_json(kind, payload)?;
                Ok(scholar::records_from_json(&value, roster))
            }
        }
    }
}

impl RecordSource for SnapshotSource {
    fn kind(&self) -> SourceKind {
        self.kind
    }

    fn fetch<'a>(&'a self, roster: &'a Roster) -> FetchFuture<'a> {
        Box::pin(async move {
            let payload =
                tokio::fs::read_to_string(&self.path)
                    .await
                    .map_err(|err| SourceError::Io {
                        kind: self.kind,
                        path: self.path.clone(),
                        err,
                    })?;
            let records = Self::convert(self.kind, &payload, roster)?;
            tracing::debug!(
                source = %self.kind,
                path = %self.path.display(),
                records = records.len(),
                "loaded snapshot"
            );
            Ok(records)
        })
    }
}

fn parse_json(kind: SourceKind, payload: &str) -> Result<serde_json::Value, SourceError> {
    serde_json::from_str(payload).map_err(|e| SourceError::malformed(kind, e))
}

/// Author mention for a roster entry, as author-centric sources report it:
/// the roster's own name, affiliations and ORCID.
pub(crate) fn roster_mention(entry: &AuthorRosterEntry) -> SourceAuthor {
    SourceAuthor {
        first_name: Some(entry.first_name.clone()),
        last_name: Some(entry.last_name.clone()),
        initials: None,
        collective_name: entry.collective_name.clone(),
        affiliation: Some(entry.affiliations.join(",")),
        orcid: entry.orcid.clone(),
        author_id: None,
    }
}

/// String value at `v`, trimmed, `None` when absent or empty.
pub(crate) fn json_str(v: &serde_json::Value) -> Option<String> {
    v.as_str()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
}
