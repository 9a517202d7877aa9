use once_cell::sync::Lazy;
use regex::Regex;

use crate::{AuthorRosterEntry, CitationAuthor, Roster, SourceAuthor};

static ORCID_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\d{4}-\d{4}-\d{4}-\d{3}[0-9X])").unwrap());

/// Extract the bare `dddd-dddd-dddd-dddX` identifier from an ORCID string,
/// which may be a full `https://orcid.org/...` URL.
pub fn normalize_orcid(raw: &str) -> Option<String> {
    ORCID_RE
        .captures(&raw.to_uppercase())
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

/// Lower-case, drop dots, collapse whitespace.
fn clean_name(name: &str) -> String {
    name.replace('.', "")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Given-name prefix rule.
///
/// `wanted` must appear as a whole run of tokens in `given`: "andrew" matches
/// "andrew", "andrew j" and "j andrew", but not "andrews" or "hu" in "hubert".
fn given_name_matches(wanted: &str, given: &str) -> bool {
    let wanted = clean_name(wanted);
    let given = clean_name(given);
    if wanted.is_empty() || given.is_empty() {
        return false;
    }
    let wanted: Vec<&str> = wanted.split(' ').collect();
    let given: Vec<&str> = given.split(' ').collect();
    given.windows(wanted.len()).any(|w| w == wanted.as_slice())
}

fn last_name_matches(a: &str, b: &str) -> bool {
    let a = clean_name(a);
    !a.is_empty() && a == clean_name(b)
}

fn affiliation_matches(entry: &AuthorRosterEntry, affiliation: Option<&str>) -> bool {
    let Some(affiliation) = affiliation else {
        return false;
    };
    let affiliation = affiliation.to_lowercase();
    entry
        .affiliations
        .iter()
        .map(|a| a.trim().to_lowercase())
        .any(|a| !a.is_empty() && affiliation.contains(&a))
}

fn orcid_matches(entry: &AuthorRosterEntry, mention: &SourceAuthor) -> bool {
    let (Some(wanted), Some(found)) = (entry.orcid.as_deref(), mention.orcid.as_deref()) else {
        return false;
    };
    match (normalize_orcid(wanted), normalize_orcid(found)) {
        (Some(a), Some(b)) => a == b,
        _ => false,
    }
}

fn collective_matches(entry: &AuthorRosterEntry, mention: &SourceAuthor) -> bool {
    match (entry.collective_name.as_deref(), mention.collective_name.as_deref()) {
        (Some(a), Some(b)) => {
            let a = clean_name(a);
            !a.is_empty() && a == clean_name(b)
        }
        _ => false,
    }
}

/// Roster key of the first entry this mention can be attributed to.
pub fn attribute<'r>(roster: &'r Roster, mention: &SourceAuthor) -> Option<&'r str> {
    let first = mention.first_name.as_deref().unwrap_or("");
    let last = mention.last_name.as_deref().unwrap_or("");

    for (key, entry) in roster.iter() {
        let named = given_name_matches(&entry.first_name, first)
            && last_name_matches(&entry.last_name, last);
        if named && affiliation_matches(entry, mention.affiliation.as_deref()) {
            return Some(key.as_str());
        }
        if orcid_matches(entry, mention) || collective_matches(entry, mention) {
            return Some(key.as_str());
        }
    }
    None
}

/// Attribute author mentions from one source record to roster authors.
///
/// A mention is attributed when its given name and surname match a roster
/// entry and one of that entry's affiliations occurs in the mention's
/// affiliation, or when its ORCID (or collective name) equals the entry's.
/// Attributed mentions get `author_id` set to the roster key.
///
/// Returns every mention, attributed or not, when at least one was
/// attributed; otherwise an empty list. Co-authors are kept so the record
/// still lists its full author line.
pub fn match_authors(roster: &Roster, mentions: &[SourceAuthor]) -> Vec<SourceAuthor> {
    let mut out = mentions.to_vec();
    let mut any = false;
    for mention in out.iter_mut() {
        if let Some(key) = attribute(roster, mention) {
            mention.author_id = Some(key.to_string());
            any = true;
        }
    }
    if any { out } else { Vec::new() }
}

/// True when any citation surname equals a record surname, ignoring case.
pub fn citation_authors_overlap(citation: &[CitationAuthor], record: &[SourceAuthor]) -> bool {
    citation.iter().any(|ca| {
        record.iter().any(|ra| {
            ra.last_name
                .as_deref()
                .is_some_and(|last| last_name_matches(&ca.last, last))
        })
    })
}

fn same_person(prev: &SourceAuthor, new: &SourceAuthor) -> bool {
    if collective_matches_mentions(prev, new) {
        return true;
    }
    given_name_matches(
        new.first_name.as_deref().unwrap_or(""),
        prev.first_name.as_deref().unwrap_or(""),
    ) && last_name_matches(
        new.last_name.as_deref().unwrap_or(""),
        prev.last_name.as_deref().unwrap_or(""),
    )
}

fn collective_matches_mentions(a: &SourceAuthor, b: &SourceAuthor) -> bool {
    match (a.collective_name.as_deref(), b.collective_name.as_deref()) {
        (Some(x), Some(y)) => {
            let x = clean_name(x);
            !x.is_empty() && x == clean_name(y)
        }
        _ => false,
    }
}

/// Union of two author lists for augmenting an existing record.
///
/// A new mention that is already present (same `author_id`, or the same name)
/// only contributes its `author_id` when the existing mention lacks one.
/// Mentions attributed to two different roster authors are never folded.
pub fn merge_author_lists(prev: &[SourceAuthor], new: &[SourceAuthor]) -> Vec<SourceAuthor> {
    let mut combined = prev.to_vec();
    for mention in new {
        let mut matched = false;
        for existing in combined.iter_mut() {
            if mention.author_id.is_some() && mention.author_id == existing.author_id {
                matched = true;
                break;
            }
            let conflicting_ids = mention.author_id.is_some()
                && existing.author_id.is_some()
                && mention.author_id != existing.author_id;
            if !conflicting_ids && same_person(existing, mention) {
                if existing.author_id.is_none() {
                    existing.author_id = mention.author_id.clone();
                }
                matched = true;
                break;
            }
        }
        if !matched {
            combined.push(mention.clone());
        }
    }
    combined
}
