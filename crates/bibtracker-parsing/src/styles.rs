//! Line-shape recognition for the citation styles people actually paste.
//!
//! Real bibliographies follow their style guide loosely, so each style is a
//! permissive regex over the whole line plus an author splitter. Styles are
//! tried in a fixed order and the first plausible match wins.

use bibtracker_core::{CitationAuthor, TokenizedCitation};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::authors::{split_apa_harvard, split_mla_chicago, split_vancouver};
use crate::identifiers::{extract_doi, extract_pmid};

/// Longest plausible author name, in words. Anything longer is a sentence
/// that happened to contain a comma.
const MAX_NAME_WORDS: usize = 4;

// Author sections exclude digits and most symbols. Allowing digits would
// admit "2nd"/"3rd" suffixes but also far too many false positives.
static QUOTED_TITLE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r##"^([^0-9!@#$%^*()\[\]_+=\\|<>:;'"{}`~/?]+)\s+"(.*)"\s+(.*)"##).unwrap()
});
static PAREN_YEAR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r##"^([^0-9!@#$%^*()\[\]_+=\\|<>:;'"{}`~/?]+)\s+\(\d\d\d\d\)\.\s+([^.]+)\.\s+(.*)"##,
    )
    .unwrap()
});
static BARE_YEAR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r##"^([^0-9!@#$%^*()\[\]_+=\\|<>:;'"{}`~/?]+)\s+\d\d\d\d\.\s+([^.]+)\.\s+(.*)"##)
        .unwrap()
});
static PERIOD_SEPARATED: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r##"^([^0-9!@#$%^*()\[\]_+=\\|<>:;'"{}`~/?.]+)\.\s+([^.]+)\.\s+(.*)"##).unwrap()
});

/// One recognised citation style.
pub struct CitationStyle {
    pub name: &'static str,
    shape: &'static Lazy<Regex>,
    split_authors: fn(&str) -> Vec<CitationAuthor>,
}

/// Styles in the order they are tried.
pub static STYLES: [CitationStyle; 5] = [
    CitationStyle {
        name: "MLA",
        shape: &QUOTED_TITLE,
        split_authors: split_mla_chicago,
    },
    CitationStyle {
        name: "APA",
        shape: &PAREN_YEAR,
        split_authors: split_apa_harvard,
    },
    CitationStyle {
        name: "Chicago",
        shape: &QUOTED_TITLE,
        split_authors: split_mla_chicago,
    },
    CitationStyle {
        name: "Harvard",
        shape: &BARE_YEAR,
        split_authors: split_apa_harvard,
    },
    CitationStyle {
        name: "Vancouver",
        shape: &PERIOD_SEPARATED,
        split_authors: split_vancouver,
    },
];

/// Parts of a line that matched a style shape.
struct LineParts<'a> {
    authors: &'a str,
    title: &'a str,
    tail: &'a str,
}

impl CitationStyle {
    fn parts<'a>(&self, line: &'a str) -> Option<LineParts<'a>> {
        let caps = self.shape.captures(line)?;
        Some(LineParts {
            authors: caps.get(1)?.as_str().trim(),
            title: caps.get(2)?.as_str().trim(),
            tail: caps.get(3)?.as_str().trim(),
        })
    }
}

/// True when some comma-separated entry has too many words to be a name.
fn reads_like_sentence(authors: &str) -> bool {
    authors
        .replace(" and ", ",")
        .split(',')
        .any(|name| name.trim().split(' ').count() > MAX_NAME_WORDS)
}

/// The style a line is written in, with the split author section, title and
/// trailing text. `None` when no style fits.
fn recognise(line: &str) -> Option<(&'static CitationStyle, LineParts<'_>)> {
    STYLES.iter().find_map(|style| {
        let parts = style.parts(line)?;
        if reads_like_sentence(parts.authors) {
            tracing::trace!(style = style.name, "author section too long, trying next style");
            return None;
        }
        Some((style, parts))
    })
}

/// Name of the first style that accepts `line`, if any.
pub fn detect_style(line: &str) -> Option<&'static str> {
    recognise(line.trim()).map(|(style, _)| style.name)
}

fn has_word(s: &str) -> bool {
    s.chars().any(char::is_alphanumeric)
}

fn author_has_word(author: &CitationAuthor) -> bool {
    has_word(&author.last)
        || [&author.first, &author.middle, &author.initials]
            .into_iter()
            .any(|f| f.as_deref().is_some_and(has_word))
}

/// Tokenize a single citation line.
///
/// Returns `None` for lines that fit no style, including empty and
/// punctuation-only lines. A title made only of punctuation is kept as `""`,
/// so a line still counts when it carries a PMID, DOI or an author.
pub fn tokenize(line: &str) -> Option<TokenizedCitation> {
    let line = line.trim();
    let (style, parts) = recognise(line)?;
    let mut authors = (style.split_authors)(parts.authors);
    authors.retain(author_has_word);

    let title = if has_word(parts.title) { parts.title } else { "" };
    let citation = TokenizedCitation {
        authors,
        title: Some(title.to_string()),
        pmid: extract_pmid(parts.tail),
        doi: extract_doi(parts.tail),
        source_line: line.to_string(),
        publication_key: None,
    };
    citation.is_valid().then_some(citation)
}
