//! MEDLINE (`.nbib`) export parsing.
//!
//! Each line is a four-column tag, a dash, and a value starting at column 6.
//! Continuation lines are indented six spaces. Records are separated by a
//! blank line.

use bibtracker_core::{CitationAuthor, TokenizedCitation};

use crate::non_empty;

/// The tag in columns 0..4 and the value from column 6 onward.
fn split_line(line: &str) -> (&str, &str) {
    let at = |n: usize| line.char_indices().nth(n).map(|(i, _)| i);
    let tag_end = at(4).unwrap_or(line.len());
    let value_start = at(6).unwrap_or(line.len());
    (&line[..tag_end], &line[value_start..])
}

/// `AU  - Van Dyke JM` carries a two-word surname when the second token is a
/// capitalised word rather than initials.
fn parse_author(value: &str) -> CitationAuthor {
    let tokens: Vec<&str> = value.split(' ').filter(|t| !t.is_empty()).collect();
    match tokens.as_slice() {
        [] => CitationAuthor::default(),
        [last] => CitationAuthor {
            last: last.to_string(),
            ..Default::default()
        },
        [last, initials] => CitationAuthor::with_initials(*last, *initials),
        [first, second, third, ..] => {
            let capitalised_word = second.chars().count() > 1
                && second.chars().filter(|c| c.is_uppercase()).count() == 1;
            if capitalised_word {
                CitationAuthor::with_initials(format!("{first} {second}"), *third)
            } else {
                CitationAuthor::with_initials(*first, *second)
            }
        }
    }
}

/// `LID - 10.1000/xyz [doi]` and `AID - ... [doi]` lines.
fn doi_from_id_line(value: &str) -> Option<String> {
    let value = value.to_lowercase();
    if !value.contains("doi") {
        return None;
    }
    value.split(' ').next().and_then(non_empty)
}

#[derive(Default)]
struct RecordBuilder {
    pmid: Option<String>,
    doi: Option<String>,
    title: Option<String>,
    authors: Vec<CitationAuthor>,
    in_title: bool,
}

impl RecordBuilder {
    fn feed(&mut self, tag: &str, value: &str) {
        if self.in_title {
            if tag.trim().is_empty() {
                if let Some(title) = self.title.as_mut() {
                    title.push(' ');
                    title.push_str(value.trim());
                }
                return;
            }
            self.in_title = false;
        }

        match tag.trim_end() {
            "PMID" => self.pmid = non_empty(value),
            "TI" => {
                self.title = Some(value.trim().to_string());
                self.in_title = true;
            }
            "AU" => {
                let author = parse_author(value);
                if !author.is_blank() {
                    self.authors.push(author);
                }
            }
            "LID" | "AID" => {
                if let Some(doi) = doi_from_id_line(value) {
                    self.doi = Some(doi);
                }
            }
            _ => {}
        }
    }

    fn finish(&mut self) -> Option<TokenizedCitation> {
        let builder = std::mem::take(self);
        let citation = TokenizedCitation {
            authors: builder.authors,
            title: builder.title,
            pmid: builder.pmid,
            doi: builder.doi,
            source_line: String::new(),
            publication_key: None,
        };
        citation.is_valid().then_some(citation)
    }
}

/// Parse a MEDLINE export into citations, one per record.
///
/// Records with no PMID, DOI, title or author are dropped. The final record
/// does not need a trailing blank line.
pub fn parse_medline(text: &str) -> Vec<TokenizedCitation> {
    let mut citations = Vec::new();
    let mut builder = RecordBuilder::default();

    for line in text.lines() {
        let line = line.trim_end_matches('\r');
        if line.trim().is_empty() {
            citations.extend(builder.finish());
            continue;
        }
        let (tag, value) = split_line(line);
        builder.feed(tag, value);
    }
    citations.extend(builder.finish());

    tracing::debug!(records = citations.len(), "parsed MEDLINE export");
    citations
}
