use std::path::Path;

use thiserror::Error;

pub mod authors;
pub mod identifiers;
pub mod medline;
pub mod myncbi;
pub mod styles;

pub use medline::parse_medline;
pub use myncbi::parse_myncbi_html;
pub use styles::{detect_style, tokenize};
// Re-export domain types from core (canonical definitions live there)
pub use bibtracker_core::{CitationAuthor, TokenizedCitation};

#[derive(Error, Debug)]
pub enum ParsingError {
    #[error("no citations could be tokenized from the input")]
    NoCitations,
    #[error("failed to read input: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid tokenized citation JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// How an input document is laid out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputFormat {
    /// One free-text citation per line.
    Text,
    /// MEDLINE tagged export.
    Medline,
    /// A saved MyNCBI bibliography page.
    MyNcbiHtml,
    /// Previously tokenized citations.
    Json,
}

impl InputFormat {
    /// Guess the format from a file extension; anything unknown is text.
    pub fn from_path(path: &Path) -> Self {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase);
        match ext.as_deref() {
            Some("nbib" | "medline") => Self::Medline,
            Some("html" | "htm") => Self::MyNcbiHtml,
            Some("json") => Self::Json,
            _ => Self::Text,
        }
    }
}

/// Citations from a document plus a count of lines nothing could be read
/// from.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TokenizeOutcome {
    pub citations: Vec<TokenizedCitation>,
    /// Non-empty lines that matched no citation style.
    pub unparsed: usize,
}

pub(crate) fn non_empty(s: &str) -> Option<String> {
    let s = s.trim();
    if s.is_empty() { None } else { Some(s.to_string()) }
}

/// Tokenize free text, one citation per line.
///
/// Blank lines are skipped silently. Every other line either yields a
/// citation or counts toward `unparsed`.
pub fn parse_text_for_citations(text: &str) -> TokenizeOutcome {
    let mut outcome = TokenizeOutcome::default();
    for (line_no, line) in text.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        match tokenize(line) {
            Some(citation) => outcome.citations.push(citation),
            None => {
                tracing::debug!(line = line_no + 1, "no citation style matched");
                outcome.unparsed += 1;
            }
        }
    }
    outcome
}

/// Tokenize a whole document in the given format.
///
/// Fails with [`ParsingError::NoCitations`] when nothing could be read, since
/// every later step needs at least one citation.
pub fn tokenize_input(text: &str, format: InputFormat) -> Result<TokenizeOutcome, ParsingError> {
    let outcome = match format {
        InputFormat::Text => parse_text_for_citations(text),
        InputFormat::Medline => TokenizeOutcome {
            citations: parse_medline(text),
            unparsed: 0,
        },
        InputFormat::MyNcbiHtml => TokenizeOutcome {
            citations: parse_myncbi_html(text),
            unparsed: 0,
        },
        InputFormat::Json => {
            let citations: Vec<TokenizedCitation> = serde_json::from_str(text)?;
            TokenizeOutcome {
                citations: citations.into_iter().filter(|c| c.is_valid()).collect(),
                unparsed: 0,
            }
        }
    };

    if outcome.citations.is_empty() {
        return Err(ParsingError::NoCitations);
    }
    tracing::info!(
        citations = outcome.citations.len(),
        unparsed = outcome.unparsed,
        format = ?format,
        "tokenized input"
    );
    Ok(outcome)
}

/// Read and tokenize a file, guessing the format from its extension unless
/// one is given.
pub fn tokenize_file(path: &Path, format: Option<InputFormat>) -> Result<TokenizeOutcome, ParsingError> {
    let text = std::fs::read_to_string(path)?;
    tokenize_input(&text, format.unwrap_or_else(|| InputFormat::from_path(path)))
}

/// Drop every duplicate but the first of each group.
///
/// `groups` are index sets into `citations`, as produced by
/// [`bibtracker_core::find_duplicate_groups`]. Order of the survivors is
/// preserved.
pub fn remove_duplicates(
    citations: Vec<TokenizedCitation>,
    groups: &[Vec<usize>],
) -> Vec<TokenizedCitation> {
    let drop: std::collections::HashSet<usize> = groups
        .iter()
        .flat_map(|group| {
            let keep = group.iter().min().copied();
            group.iter().copied().filter(move |&i| Some(i) != keep)
        })
        .collect();

    citations
        .into_iter()
        .enumerate()
        .filter(|(i, _)| !drop.contains(i))
        .map(|(_, c)| c)
        .collect()
}
