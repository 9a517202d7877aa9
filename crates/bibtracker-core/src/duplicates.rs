use std::collections::{BTreeMap, HashMap};

use crate::TokenizedCitation;
use crate::matching::is_match;

/// Disjoint-set forest over citation indices.
struct UnionFind {
    parent: Vec<usize>,
}

impl UnionFind {
    fn new(n: usize) -> Self {
        Self {
            parent: (0..n).collect(),
        }
    }

    fn find(&mut self, mut i: usize) -> usize {
        while self.parent[i] != i {
            self.parent[i] = self.parent[self.parent[i]];
            i = self.parent[i];
        }
        i
    }

    fn union(&mut self, a: usize, b: usize) {
        let ra = self.find(a);
        let rb = self.find(b);
        if ra != rb {
            // smaller root wins so group roots stay stable
            let (lo, hi) = if ra < rb { (ra, rb) } else { (rb, ra) };
            self.parent[hi] = lo;
        }
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

/// Partition a citation batch into groups that refer to the same publication.
///
/// Two citations are linked when they share a PMID, share a DOI (ignoring
/// case) or have fuzzy-matching titles. Links are closed transitively, so a
/// title link A-B plus a PMID link B-C yields one group {A, B, C}.
///
/// Only groups of two or more are returned. Indices within a group ascend and
/// groups are ordered by their smallest index.
pub fn find_duplicate_groups(citations: &[TokenizedCitation]) -> Vec<Vec<usize>> {
    let mut uf = UnionFind::new(citations.len());

    let mut by_pmid: HashMap<&str, usize> = HashMap::new();
    let mut by_doi: HashMap<String, usize> = HashMap::new();
    for (i, citation) in citations.iter().enumerate() {
        if let Some(pmid) = non_empty(&citation.pmid) {
            let first = *by_pmid.entry(pmid).or_insert(i);
            uf.union(first, i);
        }
        if let Some(doi) = non_empty(&citation.doi) {
            let first = *by_doi.entry(doi.to_lowercase()).or_insert(i);
            uf.union(first, i);
        }
    }

    let titled: Vec<(usize, &str)> = citations
        .iter()
        .enumerate()
        .filter_map(|(i, c)| non_empty(&c.title).map(|t| (i, t)))
        .collect();
    for (n, &(i, title_i)) in titled.iter().enumerate() {
        for &(j, title_j) in &titled[n + 1..] {
            if is_match(title_i, title_j) {
                uf.union(i, j);
            }
        }
    }

    let mut groups: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
    for i in 0..citations.len() {
        let root = uf.find(i);
        groups.entry(root).or_default().push(i);
    }

    let duplicates: Vec<Vec<usize>> = groups.into_values().filter(|g| g.len() > 1).collect();
    tracing::debug!(
        citations = citations.len(),
        groups = duplicates.len(),
        "found duplicate citation groups"
    );
    duplicates
}
