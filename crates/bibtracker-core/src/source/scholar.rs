use serde_json::Value;

use super::{json_str, roster_mention};
use crate::{PublicationDate, Roster, SourceRecord};

/// Convert Google Scholar author profiles into records.
///
/// `data` maps roster keys to a filled author profile
/// (`{"scholar_id": ..., "publications": [{"bib": {...}, "pub_url": ...}]}`).
/// A profile whose `scholar_id` disagrees with the roster entry's is skipped.
/// Scholar rarely reports DOIs; a `doi` field is used when the snapshot
/// carries one, otherwise the record falls back to `pub_url`.
pub fn records_from_json(data: &Value, roster: &Roster) -> Vec<SourceRecord> {
    let mut records = Vec::new();
    for (key, entry) in roster.iter() {
        let profile = &data[key.as_str()];
        let Some(publications) = profile["publications"].as_array() else {
            continue;
        };
        if let (Some(wanted), Some(found)) =
            (entry.scholar_id.as_deref(), json_str(&profile["scholar_id"]))
        {
            if wanted != found {
                tracing::warn!(author = %key, wanted, found = %found, "scholar_id mismatch, profile skipped");
                continue;
            }
        }

        for publication in publications {
            let bib = &publication["bib"];
            let year = json_str(&bib["pub_year"])
                .and_then(|y| y.parse::<i32>().ok())
                .or_else(|| bib["pub_year"].as_i64().and_then(|y| i32::try_from(y).ok()));
            records.push(SourceRecord {
                title: json_str(&bib["title"]),
                authors: vec![roster_mention(entry)],
                doi: json_str(&publication["doi"]).map(|d| d.to_lowercase()),
                journal: json_str(&bib["journal"]).or_else(|| json_str(&bib["venue"])),
                publication_date: PublicationDate {
                    year,
                    ..Default::default()
                },
                alternate_id: json_str(&publication["pub_url"]),
                ..Default::default()
            });
        }
    }
    records
}
