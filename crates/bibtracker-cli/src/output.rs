use std::io::Write;

use bibtracker_core::{
    MergeReport, PublicationKey, ResultSet, Roster, SourceKind, TokenizedCitation,
};
use owo_colors::OwoColorize;

/// Whether to use colored output.
#[derive(Debug, Clone, Copy)]
pub struct ColorMode(pub bool);

impl ColorMode {
    pub fn enabled(&self) -> bool {
        self.0
    }
}

fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() > max {
        let cut: String = text.chars().take(max).collect();
        format!("{}...", cut)
    } else {
        text.to_string()
    }
}

fn author_summary(citation: &TokenizedCitation) -> String {
    let names: Vec<String> = citation
        .authors
        .iter()
        .map(|a| match (&a.initials, &a.first) {
            (Some(i), _) if !i.is_empty() => format!("{} {}", a.last, i),
            (_, Some(f)) if !f.is_empty() => format!("{} {}", f, a.last),
            _ => a.last.clone(),
        })
        .collect();
    match names.len() {
        0 => "(no authors)".to_string(),
        1..=3 => names.join(", "),
        n => format!("{}, et al. ({} authors)", names[..3].join(", "), n),
    }
}

/// Print what tokenizing an input produced.
pub fn print_tokenize_summary(
    w: &mut dyn Write,
    file_name: &str,
    citations: usize,
    unparsed: usize,
    color: ColorMode,
) -> std::io::Result<()> {
    writeln!(w, "Tokenizing citations from {}...", file_name)?;
    writeln!(w, "Found {} citations", citations)?;
    if unparsed > 0 {
        let msg = format!("(Skipped {} lines that matched no citation style)", unparsed);
        if color.enabled() {
            writeln!(w, "{}", msg.dimmed())?;
        } else {
            writeln!(w, "{}", msg)?;
        }
    }
    writeln!(w)?;
    Ok(())
}

/// One block per citation: title, authors, identifiers.
pub fn print_citations(
    w: &mut dyn Write,
    citations: &[TokenizedCitation],
    color: ColorMode,
) -> std::io::Result<()> {
    for (i, citation) in citations.iter().enumerate() {
        let title = citation.title.as_deref().unwrap_or("");
        let title = if title.is_empty() { "(no title)" } else { title };
        if color.enabled() {
            writeln!(w, "[{}] {}", i + 1, truncate(title, 100).bold())?;
        } else {
            writeln!(w, "[{}] {}", i + 1, truncate(title, 100))?;
        }
        writeln!(w, "    Authors: {}", author_summary(citation))?;
        if let Some(pmid) = &citation.pmid {
            writeln!(w, "    PMID: {}", pmid)?;
        }
        if let Some(doi) = &citation.doi {
            writeln!(w, "    DOI: {}", doi)?;
        }
    }
    Ok(())
}

/// List groups of citations that look like the same publication.
pub fn print_duplicate_groups(
    w: &mut dyn Write,
    citations: &[TokenizedCitation],
    groups: &[Vec<usize>],
    color: ColorMode,
) -> std::io::Result<()> {
    if groups.is_empty() {
        writeln!(w, "No duplicate citations found.")?;
        return Ok(());
    }

    let header = format!(
        "{} group(s) of citations appear to be duplicates (same DOI, PMID or a similar title):",
        groups.len()
    );
    if color.enabled() {
        writeln!(w, "{}", header.yellow())?;
    } else {
        writeln!(w, "{}", header)?;
    }
    for group in groups {
        writeln!(w)?;
        for &index in group {
            let Some(citation) = citations.get(index) else {
                continue;
            };
            writeln!(w, "  [{}] {}", index + 1, truncate(&citation.display_line(), 160))?;
        }
    }
    writeln!(w)?;
    Ok(())
}

/// Counters from a collection run, plus sources that could not be read.
pub fn print_merge_report(
    w: &mut dyn Write,
    report: &MergeReport,
    failed_sources: &[SourceKind],
    cancelled: bool,
    color: ColorMode,
) -> std::io::Result<()> {
    if color.enabled() {
        writeln!(w, "{}", "SUMMARY".bold())?;
    } else {
        writeln!(w, "SUMMARY")?;
    }
    writeln!(w, "  New publications:       {}", report.inserted)?;
    writeln!(w, "  Authors added:          {}", report.appended)?;
    writeln!(w, "  Already collected:      {}", report.duplicates)?;
    writeln!(w, "  Previously reported:    {}", report.excluded)?;
    writeln!(w, "  No tracked author:      {}", report.unattributed)?;
    writeln!(w, "  Before cutoff year:     {}", report.before_cutoff)?;
    writeln!(w, "  Without DOI/PMID/URL:   {}", report.unkeyed.len())?;

    for title in &report.unkeyed {
        writeln!(w, "    - {}", truncate(title, 100))?;
    }

    for kind in failed_sources {
        let msg = format!("{} could not be read and was skipped", kind);
        if color.enabled() {
            writeln!(w, "{} {}", "WARNING:".yellow(), msg)?;
        } else {
            writeln!(w, "WARNING: {}", msg)?;
        }
    }
    if cancelled {
        if color.enabled() {
            writeln!(w, "{}", "Interrupted: results are partial.".red())?;
        } else {
            writeln!(w, "Interrupted: results are partial.")?;
        }
    }
    Ok(())
}

/// Collected publications with the sources that reported them and any
/// tracked grants they acknowledge.
pub fn print_results(
    w: &mut dyn Write,
    results: &ResultSet,
    roster: &Roster,
    color: ColorMode,
) -> std::io::Result<()> {
    for (key, record) in results.iter() {
        let sources: Vec<&str> = record.queried_sources.iter().map(|s| s.name()).collect();
        let authors: Vec<&str> = record.attributed_ids().collect();
        if color.enabled() {
            writeln!(w, "{}", truncate(&record.title, 100).bold())?;
            writeln!(w, "    {}", key.as_str().cyan())?;
        } else {
            writeln!(w, "{}", truncate(&record.title, 100))?;
            writeln!(w, "    {}", key)?;
        }
        writeln!(w, "    Sources: {}", sources.join(", "))?;
        if !authors.is_empty() {
            writeln!(w, "    Tracked authors: {}", authors.join(", "))?;
        }
        let grants = record.tracked_grants(roster);
        if !grants.is_empty() {
            writeln!(w, "    Grants: {}", grants.join(", "))?;
        }
    }
    writeln!(w)?;
    Ok(())
}

/// Per-citation outcome of a reference search.
pub fn print_resolution(
    w: &mut dyn Write,
    citations: &[TokenizedCitation],
    keys: &[Option<PublicationKey>],
    previously_reported: &[bool],
    color: ColorMode,
) -> std::io::Result<()> {
    let total = citations.len();
    for (i, citation) in citations.iter().enumerate() {
        let line = truncate(&citation.display_line(), 80);
        let known = previously_reported.get(i).copied().unwrap_or(false);
        match keys.get(i).and_then(Option::as_ref) {
            Some(key) => {
                let status = if known { "FOUND (reported before)" } else { "FOUND" };
                if color.enabled() {
                    writeln!(w, "[{}/{}] {} -> {} {}", i + 1, total, line, status.green(), key)?;
                } else {
                    writeln!(w, "[{}/{}] {} -> {} {}", i + 1, total, line, status, key)?;
                }
            }
            None => {
                if color.enabled() {
                    writeln!(w, "[{}/{}] {} -> {}", i + 1, total, line, "NOT FOUND".red())?;
                } else {
                    writeln!(w, "[{}/{}] {} -> NOT FOUND", i + 1, total, line)?;
                }
            }
        }
    }

    let found = keys.iter().filter(|k| k.is_some()).count();
    writeln!(w)?;
    writeln!(w, "Resolved {} of {} citations", found, total)?;
    Ok(())
}
