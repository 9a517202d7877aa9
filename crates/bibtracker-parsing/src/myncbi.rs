//! Saved MyNCBI bibliography pages.
//!
//! Every citation is a `div.ncbi-docsum`. Most fields sit in classed spans,
//! but older pages leave the authors and the title link unclassed, so those
//! fall back to position among the div's children.

use bibtracker_core::{CitationAuthor, TokenizedCitation};
use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Node, Selector};

use crate::authors::{split_apa_harvard, split_vancouver};
use crate::identifiers::{extract_doi, extract_pmid};
use crate::non_empty;

static DOCSUM: Lazy<Selector> = Lazy::new(|| Selector::parse("div.ncbi-docsum").unwrap());
static AUTHORS: Lazy<Selector> = Lazy::new(|| Selector::parse("span.authors").unwrap());
static CHAPTER_TITLE: Lazy<Selector> = Lazy::new(|| Selector::parse("span.chaptertitle").unwrap());
static TITLE: Lazy<Selector> = Lazy::new(|| Selector::parse("span.title").unwrap());
static DOI: Lazy<Selector> = Lazy::new(|| Selector::parse("span.doi").unwrap());
static PMID: Lazy<Selector> = Lazy::new(|| Selector::parse("span.pmid").unwrap());

fn text_of(el: ElementRef<'_>) -> String {
    el.text().collect::<String>().trim().to_string()
}

fn first_text(citation: ElementRef<'_>, selector: &Selector) -> Option<String> {
    citation.select(selector).next().map(text_of)
}

/// Text of the `n`th child node, element or bare text.
fn child_text(citation: ElementRef<'_>, n: usize) -> Option<String> {
    let node = citation.children().nth(n)?;
    if let Some(el) = ElementRef::wrap(node) {
        return Some(text_of(el));
    }
    match node.value() {
        Node::Text(text) => Some(text.trim().to_string()),
        _ => None,
    }
}

fn child_is_span(citation: ElementRef<'_>, n: usize) -> bool {
    citation
        .children()
        .nth(n)
        .and_then(|node| node.value().as_element().map(|e| e.name() == "span"))
        .unwrap_or(false)
}

/// Vancouver first; pages that use `Last, I.` lists leave every Vancouver
/// initial blank, so those are re-read as APA.
fn split_docsum_authors(raw: &str) -> Vec<CitationAuthor> {
    let raw = raw.trim();
    let raw = raw.strip_suffix('.').unwrap_or(raw);
    let mut authors = split_vancouver(raw);
    if authors
        .iter()
        .all(|a| a.initials.as_deref().is_none_or(str::is_empty))
    {
        authors = split_apa_harvard(raw);
    }
    authors.retain(|a| !a.is_blank());
    authors
}

fn parse_docsum(citation: ElementRef<'_>) -> TokenizedCitation {
    let authors_raw = first_text(citation, &AUTHORS)
        .or_else(|| child_text(citation, 1))
        .unwrap_or_default();

    // for book chapters "title" is the book and "chaptertitle" the citation
    let title = first_text(citation, &CHAPTER_TITLE)
        .or_else(|| first_text(citation, &TITLE))
        .or_else(|| {
            if child_is_span(citation, 2) {
                Some(String::new())
            } else {
                child_text(citation, 2)
            }
        })
        .unwrap_or_default();

    TokenizedCitation {
        authors: split_docsum_authors(&authors_raw),
        title: non_empty(&title),
        pmid: first_text(citation, &PMID).and_then(|t| extract_pmid(&t)),
        doi: first_text(citation, &DOI).and_then(|t| extract_doi(&t)),
        source_line: text_of(citation),
        publication_key: None,
    }
}

/// Tokenize every citation on a MyNCBI bibliography page.
///
/// Docsums with no authors, title or identifiers are dropped.
pub fn parse_myncbi_html(html: &str) -> Vec<TokenizedCitation> {
    let document = Html::parse_document(html);
    let citations: Vec<TokenizedCitation> = document
        .select(&DOCSUM)
        .map(parse_docsum)
        .filter(|c| c.is_valid())
        .collect();
    tracing::debug!(citations = citations.len(), "parsed MyNCBI page");
    citations
}
