//! End-to-end collection over snapshot files.
//!
//! Every source reads a saved payload from a temp dir, so no network is
//! involved. Covers the full fetch, attribute, merge and exclude cycle.

use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use bibtracker_core::config_file::ConfigFile;
use bibtracker_core::orchestrator::{CollectSettings, collect_publications};
use bibtracker_core::source::{RecordSource, SnapshotSource};
use bibtracker_core::{PublicationKey, ResultSet, SourceKind};
use tokio_util::sync::CancellationToken;

const CONFIG: &str = r#"
[authors.morris]
first_name = "Andrew"
last_name = "Morris"
affiliations = ["kentucky"]
cutoff_year = 2019
ORCID = "0000-0002-1825-0097"
"#;

const PUBMED: &str = r#"<PubmedArticleSet>
  <PubmedArticle>
    <MedlineCitation>
      <PMID>31234567</PMID>
      <Article>
        <Journal><JournalIssue><PubDate><Year>2020</Year></PubDate></JournalIssue><Title>Journal X</Title></Journal>
        <ArticleTitle>Lung outcomes in Kentucky coal miners</ArticleTitle>
        <AuthorList>
          <Author><LastName>Morris</LastName><ForeName>Andrew J</ForeName>
            <AffiliationInfo><Affiliation>University of Kentucky</Affiliation></AffiliationInfo></Author>
        </AuthorList>
      </Article>
    </MedlineCitation>
    <PubmedData><ArticleIdList><ArticleId IdType="doi">10.1000/LUNG</ArticleId></ArticleIdList></PubmedData>
  </PubmedArticle>
  <PubmedArticle>
    <MedlineCitation>
      <PMID>30000001</PMID>
      <Article>
        <Journal><JournalIssue><PubDate><Year>2015</Year></PubDate></JournalIssue></Journal>
        <ArticleTitle>An old paper</ArticleTitle>
        <AuthorList>
          <Author><LastName>Morris</LastName><ForeName>Andrew</ForeName>
            <AffiliationInfo><Affiliation>Kentucky</Affiliation></AffiliationInfo></Author>
        </AuthorList>
      </Article>
    </MedlineCitation>
  </PubmedArticle>
</PubmedArticleSet>"#;

const ORCID: &str = r#"{"morris": {"group": [
  {"work-summary": [{"type": "JOURNAL_ARTICLE",
    "title": {"title": {"value": "Lung outcomes in Kentucky coal miners."}},
    "publication-date": {"year": {"value": "2020"}},
    "external-ids": {"external-id": [{"external-id-type": "pmid", "external-id-value": "31234567"}]}}]},
  {"work-summary": [{"type": "JOURNAL_ARTICLE",
    "title": {"title": {"value": "Liver enzymes after exposure"}},
    "publication-date": {"year": {"value": "2022"}},
    "external-ids": {"external-id": [{"external-id-type": "doi", "external-id-value": "10.1000/LIVER"}]}}]}
]}}"#;

const CROSSREF: &str = r#"{"message": {"items": [
  {"title": ["Untraceable conference abstract"],
   "author": [{"given": "Andrew", "family": "Morris", "affiliation": [{"name": "University of Kentucky"}]}],
   "published": {"date-parts": [[2021]]}}
]}}"#;

fn write(dir: &Path, name: &str, content: &str) -> std::path::PathBuf {
    let path = dir.join(name);
    let mut file = std::fs::File::create(&path).unwrap();
    file.write_all(content.as_bytes()).unwrap();
    path
}

fn sources(dir: &Path) -> Vec<Arc<dyn RecordSource>> {
    vec![
        Arc::new(SnapshotSource::new(
            SourceKind::Crossref,
            write(dir, "crossref.json", CROSSREF),
        )),
        Arc::new(SnapshotSource::new(
            SourceKind::Orcid,
            write(dir, "orcid.json", ORCID),
        )),
        Arc::new(SnapshotSource::new(
            SourceKind::PubMed,
            write(dir, "pubmed.xml", PUBMED),
        )),
    ]
}

#[tokio::test]
async fn snapshot_run_merges_and_reports() {
    let dir = tempfile::tempdir().unwrap();
    let config: ConfigFile = toml::from_str(CONFIG).unwrap();
    let roster = config.roster();

    let outcome = collect_publications(
        &sources(dir.path()),
        &roster,
        &ResultSet::new(),
        &CollectSettings::default(),
        &CancellationToken::new(),
    )
    .await;

    // PubMed established the DOI key; ORCID's PMID-only copy folded into it
    let lung = PublicationKey::new("https://doi.org/10.1000/lung");
    let liver = PublicationKey::new("https://doi.org/10.1000/liver");
    assert_eq!(outcome.results.len(), 2);
    assert!(outcome.results.get(&lung).is_some());
    assert!(outcome.results.get(&liver).is_some());
    assert_eq!(
        outcome.results.get(&liver).unwrap().queried_sources,
        vec![SourceKind::Orcid]
    );

    assert_eq!(outcome.report.before_cutoff, 2); // the 2015 paper, once per pass
    assert_eq!(
        outcome.report.unkeyed,
        vec![
            "Untraceable conference abstract".to_string(),
            "Untraceable conference abstract".to_string()
        ]
    );
    assert!(outcome.failed_sources.is_empty());
}

#[tokio::test]
async fn previous_results_exclude_everything_on_rerun() {
    let dir = tempfile::tempdir().unwrap();
    let config: ConfigFile = toml::from_str(CONFIG).unwrap();
    let roster = config.roster();

    let first = collect_publications(
        &sources(dir.path()),
        &roster,
        &ResultSet::new(),
        &CollectSettings { passes: 1 },
        &CancellationToken::new(),
    )
    .await;

    // the result set survives a JSON round trip as the next run's exclusion set
    let json = serde_json::to_string_pretty(&first.results).unwrap();
    let exclusion: ResultSet = serde_json::from_str(&json).unwrap();
    assert_eq!(exclusion, first.results);

    let second = collect_publications(
        &sources(dir.path()),
        &roster,
        &exclusion,
        &CollectSettings { passes: 1 },
        &CancellationToken::new(),
    )
    .await;
    assert!(second.results.is_empty());
    assert_eq!(second.report.excluded, 3);
}

#[tokio::test]
async fn missing_snapshot_is_skipped() {
    let dir = tempfile::tempdir().unwrap();
    let config: ConfigFile = toml::from_str(CONFIG).unwrap();
    let sources: Vec<Arc<dyn RecordSource>> = vec![
        Arc::new(SnapshotSource::new(
            SourceKind::PubMed,
            write(dir.path(), "pubmed.xml", PUBMED),
        )),
        Arc::new(SnapshotSource::new(
            SourceKind::GoogleScholar,
            dir.path().join("scholar.json"),
        )),
    ];
    let outcome = collect_publications(
        &sources,
        &config.roster(),
        &ResultSet::new(),
        &CollectSettings::default(),
        &CancellationToken::new(),
    )
    .await;
    assert_eq!(outcome.failed_sources, vec![SourceKind::GoogleScholar]);
    assert_eq!(outcome.results.len(), 1);
}
