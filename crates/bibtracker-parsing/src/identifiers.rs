use bibtracker_core::identity::clean_doi;
use once_cell::sync::Lazy;
use regex::Regex;

/// Extract a PubMed ID written as `PMID: 12345678` (any case).
///
/// When a line carries several, the last one wins, matching how a trailing
/// identifier block is usually laid out.
pub fn extract_pmid(text: &str) -> Option<String> {
    static RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)^.*pmid:\s*(\d+)").unwrap());
    RE.captures(text).map(|caps| caps[1].to_string())
}

/// Extract a DOI written as `doi: 10.1234/abc` or `DOI:https://doi.org/10.1234/abc`.
///
/// The result is lower-cased with any resolver prefix removed. Trailing
/// punctuation is not part of the DOI: the match must end on a word character.
pub fn extract_doi(text: &str) -> Option<String> {
    static RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)^.*doi:\s*(\S+\w)").unwrap());
    let caps = RE.captures(text)?;
    let doi = clean_doi(&caps[1]);
    if doi.is_empty() { None } else { Some(doi) }
}
