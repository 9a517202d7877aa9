use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::source::SnapshotSource;
use crate::{AuthorRosterEntry, CoreError, Roster, SourceKind};

/// On-disk TOML configuration structure.
/// All fields are optional so partial configs work (merge with defaults).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfigFile {
    pub sources: Option<SourcesConfig>,
    pub run: Option<RunConfig>,
    pub logging: Option<LoggingConfig>,
    /// Tracked authors, one `[authors.<key>]` table each.
    pub authors: Option<BTreeMap<String, AuthorRosterEntry>>,
}

/// Saved API payloads to read in place of live queries.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SourcesConfig {
    pub pubmed_snapshot: Option<String>,
    pub orcid_snapshot: Option<String>,
    pub scholar_snapshot: Option<String>,
    pub crossref_snapshot: Option<String>,
    /// Source names to skip, e.g. `["Google Scholar"]`.
    pub disabled: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunConfig {
    /// How many times the source sequence is merged. Defaults to 2.
    pub passes: Option<usize>,
    /// Result set JSON of previously reported publications.
    pub exclusion_path: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// `tracing` filter directive used when `RUST_LOG` is unset.
    pub level: Option<String>,
}

pub const DEFAULT_PASSES: usize = 2;

/// Platform config directory path: `<config_dir>/bibtracker/config.toml`.
pub fn config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("bibtracker").join("config.toml"))
}

/// Load config by cascading CWD `.bibtracker.toml` over platform config.
/// CWD values override platform values.
pub fn load_config() -> ConfigFile {
    let platform = config_path().and_then(|p| load_from_path(&p));
    let cwd = load_from_path(Path::new(".bibtracker.toml"));

    match (platform, cwd) {
        (None, None) => ConfigFile::default(),
        (Some(p), None) => p,
        (None, Some(c)) => c,
        (Some(p), Some(c)) => merge(p, c),
    }
}

/// Load a config from a specific path. Returns `None` if the file doesn't
/// exist or can't be parsed.
pub fn load_from_path(path: &Path) -> Option<ConfigFile> {
    match read_config(path) {
        Ok(config) => Some(config),
        Err(CoreError::Io(_)) => None,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "ignoring unparsable config");
            None
        }
    }
}

/// Load a config the user named explicitly. Missing or invalid files are
/// errors here.
pub fn read_config(path: &Path) -> Result<ConfigFile, CoreError> {
    let content = std::fs::read_to_string(path)?;
    Ok(toml::from_str(&content)?)
}

/// Merge two configs: `overlay` values take precedence over `base`.
/// The author roster is replaced as a whole, never merged entry by entry.
pub fn merge(base: ConfigFile, overlay: ConfigFile) -> ConfigFile {
    let base_src = base.sources.unwrap_or_default();
    let over_src = overlay.sources.unwrap_or_default();
    let base_run = base.run.unwrap_or_default();
    let over_run = overlay.run.unwrap_or_default();
    let base_log = base.logging.unwrap_or_default();
    let over_log = overlay.logging.unwrap_or_default();

    ConfigFile {
        sources: Some(SourcesConfig {
            pubmed_snapshot: over_src.pubmed_snapshot.or(base_src.pubmed_snapshot),
            orcid_snapshot: over_src.orcid_snapshot.or(base_src.orcid_snapshot),
            scholar_snapshot: over_src.scholar_snapshot.or(base_src.scholar_snapshot),
            crossref_snapshot: over_src.crossref_snapshot.or(base_src.crossref_snapshot),
            disabled: over_src.disabled.or(base_src.disabled),
        }),
        run: Some(RunConfig {
            passes: over_run.passes.or(base_run.passes),
            exclusion_path: over_run.exclusion_path.or(base_run.exclusion_path),
        }),
        logging: Some(LoggingConfig {
            level: over_log.level.or(base_log.level),
        }),
        authors: overlay.authors.or(base.authors),
    }
}

impl ConfigFile {
    pub fn roster(&self) -> Roster {
        Roster::new(self.authors.clone().unwrap_or_default())
    }

    pub fn passes(&self) -> usize {
        self.run
            .as_ref()
            .and_then(|r| r.passes)
            .unwrap_or(DEFAULT_PASSES)
    }

    /// Disabled source kinds. Unknown names are logged and ignored.
    pub fn disabled_sources(&self) -> Vec<SourceKind> {
        self.sources
            .as_ref()
            .and_then(|s| s.disabled.as_ref())
            .map(|names| {
                names
                    .iter()
                    .filter_map(|name| match name.parse::<SourceKind>() {
                        Ok(kind) => Some(kind),
                        Err(_) => {
                            tracing::warn!(name = %name, "unknown source in disabled list");
                            None
                        }
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Snapshot sources for every configured, enabled payload, in merge
    /// priority order.
    pub fn snapshot_sources(&self) -> Vec<SnapshotSource> {
        let Some(sources) = self.sources.as_ref() else {
            return Vec::new();
        };
        let disabled = self.disabled_sources();
        SourceKind::ALL
            .into_iter()
            .filter(|kind| !disabled.contains(kind))
            .filter_map(|kind| {
                let path = match kind {
                    SourceKind::PubMed => sources.pubmed_snapshot.as_ref(),
                    SourceKind::Orcid => sources.orcid_snapshot.as_ref(),
                    SourceKind::GoogleScholar => sources.scholar_snapshot.as_ref(),
                    SourceKind::Crossref => sources.crossref_snapshot.as_ref(),
                }?;
                Some(SnapshotSource::new(kind, path))
            })
            .collect()
    }
}
