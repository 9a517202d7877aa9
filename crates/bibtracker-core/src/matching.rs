/// Minimum similarity, on a 0-100 scale, for two strings to count as the same.
pub const MATCH_THRESHOLD: u8 = 90;

/// Similarity of two strings on a 0-100 integer scale.
///
/// Both strings are lower-cased first. An empty input scores 0 against
/// anything, including another empty string.
pub fn ratio(a: &str, b: &str) -> u8 {
    let a = a.to_lowercase();
    let b = b.to_lowercase();
    if a.is_empty() || b.is_empty() {
        return 0;
    }
    let score = rapidfuzz::fuzz::ratio(a.chars(), b.chars());
    (score * 100.0).round().clamp(0.0, 100.0) as u8
}

/// True when `a` and `b` score at or above [`MATCH_THRESHOLD`] in either
/// argument order.
pub fn is_match(a: &str, b: &str) -> bool {
    ratio(a, b) >= MATCH_THRESHOLD || ratio(b, a) >= MATCH_THRESHOLD
}

/// Every entry of `haystack` that matches `needle`, with its index.
///
/// Order follows `haystack`; returned values are lower-cased.
pub fn matches_in_set<S: AsRef<str>>(needle: &str, haystack: &[S]) -> Vec<(usize, String)> {
    haystack
        .iter()
        .enumerate()
        .filter(|(_, candidate)| is_match(needle, candidate.as_ref()))
        .map(|(i, candidate)| (i, candidate.as_ref().to_lowercase()))
        .collect()
}

/// True when `needle` matches at least one entry of `list`.
pub fn is_match_to_list<S: AsRef<str>>(needle: &str, list: &[S]) -> bool {
    list.iter().any(|candidate| is_match(needle, candidate.as_ref()))
}
