//! Author-list splitters, one per family of citation styles.
//!
//! Each splitter takes the author section of a citation (everything before
//! the title) and returns the names it can find. Malformed input yields
//! fewer or emptier names, never a panic.

use bibtracker_core::CitationAuthor;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::non_empty;

/// Split on commas after turning the `&` and `and` connectives into commas.
fn comma_names(authors: &str) -> Vec<String> {
    authors
        .replace(" and ", ",")
        .replace('&', ",")
        .split(',')
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .map(String::from)
        .collect()
}

/// Vancouver: `Smith J, Doe AB, van der Berg C, et al`.
///
/// The final token of each name is the initials; everything before it is the
/// surname. A name with a single token keeps it as the surname with empty
/// initials.
pub fn split_vancouver(authors: &str) -> Vec<CitationAuthor> {
    let cleaned = authors.replace("...", "").replace("et al", "");
    comma_names(&cleaned)
        .into_iter()
        .filter_map(|name| {
            let tokens: Vec<&str> = name.split_whitespace().collect();
            match tokens.as_slice() {
                [] => None,
                [last] => Some(CitationAuthor::with_initials(*last, "")),
                [surname @ .., initials] => {
                    Some(CitationAuthor::with_initials(surname.join(" "), *initials))
                }
            }
        })
        .collect()
}

/// MLA and Chicago: `Smith, John A., Jane Doe, and Bo Li`.
///
/// Only the first author is inverted (`Last, First Middle`); the rest are in
/// reading order.
pub fn split_mla_chicago(authors: &str) -> Vec<CitationAuthor> {
    static INITIAL_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"^([a-zA-Z]\.)+").unwrap());

    let cleaned = authors.replace("...", "").replace("et al.", "");
    let mut names = comma_names(&cleaned);
    if names.is_empty() {
        return Vec::new();
    }

    // a trailing period closes the author section unless it ends an initial
    if let Some(last_name) = names.last_mut() {
        let final_token = last_name.rsplit(' ').next().unwrap_or_default();
        if final_token.chars().count() > 2
            && !INITIAL_RUN.is_match(final_token)
            && final_token.contains('.')
            && last_name.ends_with('.')
        {
            last_name.pop();
        }
    }

    let mut result = Vec::with_capacity(names.len());
    let mut rest = names.as_slice();

    if !names[0].contains(' ') {
        let last = &names[0];
        let (first, middle) = match names.get(1) {
            Some(given) => {
                let mut parts = given.split_whitespace();
                (
                    parts.next().unwrap_or_default().to_string(),
                    parts.next().unwrap_or_default().to_string(),
                )
            }
            None => (String::new(), String::new()),
        };
        result.push(CitationAuthor {
            last: last.clone(),
            first: non_empty(&first),
            middle: non_empty(&middle),
            initials: None,
        });
        rest = names.get(2..).unwrap_or_default();
    }

    for name in rest {
        let tokens: Vec<&str> = name.split_whitespace().collect();
        let author = match tokens.as_slice() {
            [] => continue,
            [last] => CitationAuthor {
                last: last.to_string(),
                ..Default::default()
            },
            [first, last] => CitationAuthor {
                last: last.to_string(),
                first: Some(first.to_string()),
                ..Default::default()
            },
            [first, middle, last @ ..] => CitationAuthor {
                last: last.join(" "),
                first: Some(first.to_string()),
                middle: Some(middle.to_string()),
                initials: None,
            },
        };
        result.push(author);
    }
    result
}

/// APA and Harvard: `Smith, J. A., & Doe, B.`.
///
/// Spaces are dropped and the comma-separated stream is read as alternating
/// surnames and initials; a token with a period is an initials token.
pub fn split_apa_harvard(authors: &str) -> Vec<CitationAuthor> {
    let cleaned = authors
        .replace('&', ",")
        .replace(" and ", ",")
        .replace("et al.", "")
        .replace(' ', "")
        .replace("...", "");

    let mut result: Vec<CitationAuthor> = Vec::new();
    let mut after_surname = false;
    for token in cleaned.split(',').map(str::trim).filter(|t| !t.is_empty()) {
        if token.contains('.') {
            match result.last_mut() {
                Some(author) if after_surname => author.initials = Some(token.to_string()),
                _ => result.push(CitationAuthor::with_initials("", token)),
            }
            after_surname = false;
        } else {
            result.push(CitationAuthor {
                last: token.to_string(),
                ..Default::default()
            });
            after_surname = true;
        }
    }
    result
}
