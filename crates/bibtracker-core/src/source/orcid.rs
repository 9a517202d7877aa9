use serde_json::Value;

use super::{json_str, roster_mention};
use crate::{PublicationDate, Roster, SourceRecord};

/// Convert ORCID works summaries into records.
///
/// `data` maps roster keys to the `works` document fetched for that author's
/// ORCID. Each work group becomes one record authored by that roster entry.
/// Groups that are not journal articles are skipped. Keys absent from the
/// roster are ignored.
pub fn records_from_json(data: &Value, roster: &Roster) -> Vec<SourceRecord> {
    let mut records = Vec::new();
    for (key, entry) in roster.iter() {
        let Some(groups) = data[key.as_str()]["group"].as_array() else {
            continue;
        };
        for group in groups {
            if let Some(mut record) = record_from_group(group) {
                record.authors = vec![roster_mention(entry)];
                records.push(record);
            }
        }
        tracing::debug!(author = %key, works = groups.len(), "converted ORCID works");
    }
    records
}

fn record_from_group(group: &Value) -> Option<SourceRecord> {
    let summaries = group["work-summary"].as_array()?;

    let mut record = SourceRecord::default();
    for summary in summaries {
        if summary["type"].as_str().is_some_and(|t| t != "JOURNAL_ARTICLE") {
            return None;
        }

        let date = &summary["publication-date"];
        fill_date(&mut record.publication_date, date);

        if record.title.is_none() {
            record.title = json_str(&summary["title"]["title"]["value"]);
        }
        if record.journal.is_none() {
            record.journal = json_str(&summary["journal-title"]["value"]);
        }

        let ids = summary["external-ids"]["external-id"]
            .as_array()
            .map(Vec::as_slice)
            .unwrap_or_default();
        for id in ids {
            let value = json_str(&id["external-id-value"]);
            match id["external-id-type"].as_str() {
                Some("doi") if record.doi.is_none() => {
                    record.doi = value.map(|v| v.to_lowercase());
                }
                Some("pmid") if record.pmid.is_none() => record.pmid = value,
                Some("pmc") if record.pmcid.is_none() => record.pmcid = value,
                _ => {}
            }
            if record.alternate_id.is_none() {
                record.alternate_id = json_str(&id["external-id-url"]["value"]);
            }
        }
    }
    Some(record)
}

fn fill_date(date: &mut PublicationDate, value: &Value) {
    let part = |name: &str| json_str(&value[name]["value"]);
    if date.year.is_none() {
        date.year = part("year").and_then(|y| y.parse::<i32>().ok());
    }
    if date.month.is_none() {
        date.month = part("month").and_then(|m| m.parse::<u32>().ok());
    }
    if date.day.is_none() {
        date.day = part("day").and_then(|d| d.parse::<u32>().ok());
    }
}
