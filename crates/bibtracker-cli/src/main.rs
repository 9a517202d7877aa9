use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use bibtracker_core::config_file::{self, ConfigFile};
use bibtracker_core::identity::citations_in_set;
use bibtracker_core::orchestrator::{CollectSettings, collect_publications, resolve_references};
use bibtracker_core::{RecordSource, ResultSet, SourceKind, TokenizedCitation, find_duplicate_groups};
use bibtracker_parsing::{InputFormat, remove_duplicates, tokenize_file};
use clap::{Args, Parser, Subcommand, ValueEnum};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

mod output;

use output::ColorMode;

/// Bibliography tracker - tokenize citations and collect tracked authors' publications
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Config file to load on top of the platform and working-directory configs
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Tokenize a bibliography and print the citations found
    Tokenize {
        #[command(flatten)]
        input: InputArgs,

        /// Keep citations that look like duplicates of an earlier one
        #[arg(long)]
        keep_duplicates: bool,

        /// Write tokenized citations as JSON to this path
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// List groups of citations that refer to the same publication
    Duplicates {
        #[command(flatten)]
        input: InputArgs,
    },

    /// Collect publications for every tracked author from saved source payloads
    Collect {
        #[command(flatten)]
        run: RunArgs,
    },

    /// Find the publications a bibliography cites in saved source payloads
    Resolve {
        #[command(flatten)]
        input: InputArgs,

        #[command(flatten)]
        run: RunArgs,

        /// Keep citations that look like duplicates of an earlier one
        #[arg(long)]
        keep_duplicates: bool,

        /// Write the citations, with their resolved keys, as JSON to this path
        #[arg(long)]
        citations_output: Option<PathBuf>,
    },
}

#[derive(Args, Debug)]
struct InputArgs {
    /// Bibliography file: plain text, MEDLINE, saved MyNCBI page, or tokenized JSON
    file_path: PathBuf,

    /// Input layout (default: guessed from the file extension)
    #[arg(long, value_enum)]
    format: Option<FormatArg>,
}

#[derive(Args, Debug)]
struct RunArgs {
    /// Previously reported publications (result set JSON) to leave out
    #[arg(long)]
    exclude: Option<PathBuf>,

    /// How many times the source sequence is merged
    #[arg(long)]
    passes: Option<usize>,

    /// Comma-separated list of sources to skip
    #[arg(long, value_delimiter = ',')]
    disable_sources: Vec<String>,

    /// Write the result set as JSON to this path
    #[arg(short, long)]
    output: Option<PathBuf>,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum FormatArg {
    Text,
    Medline,
    Myncbi,
    Json,
}

impl From<FormatArg> for InputFormat {
    fn from(arg: FormatArg) -> Self {
        match arg {
            FormatArg::Text => InputFormat::Text,
            FormatArg::Medline => InputFormat::Medline,
            FormatArg::Myncbi => InputFormat::MyNcbiHtml,
            FormatArg::Json => InputFormat::Json,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => {
            let explicit = config_file::read_config(path)
                .with_context(|| format!("failed to load config {}", path.display()))?;
            config_file::merge(config_file::load_config(), explicit)
        }
        None => config_file::load_config(),
    };
    init_logging(&config);

    let color = ColorMode(!cli.no_color);

    match cli.command {
        Command::Tokenize {
            input,
            keep_duplicates,
            output,
        } => tokenize(&input, keep_duplicates, output.as_deref(), color),
        Command::Duplicates { input } => duplicates(&input, color),
        Command::Collect { run } => collect(&config, &run, color).await,
        Command::Resolve {
            input,
            run,
            keep_duplicates,
            citations_output,
        } => resolve(&config, &input, &run, keep_duplicates, citations_output.as_deref(), color).await,
    }
}

/// `RUST_LOG` wins; otherwise the config's `[logging] level`, else warnings only.
fn init_logging(config: &ConfigFile) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let level = config
            .logging
            .as_ref()
            .and_then(|l| l.level.as_deref())
            .unwrap_or("warn");
        EnvFilter::new(level)
    });
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string())
}

/// Tokenize the input, report duplicates, and drop them unless asked not to.
fn read_citations(
    input: &InputArgs,
    keep_duplicates: bool,
    w: &mut dyn Write,
    color: ColorMode,
) -> anyhow::Result<Vec<TokenizedCitation>> {
    if !input.file_path.exists() {
        anyhow::bail!("File not found: {}", input.file_path.display());
    }
    let outcome = tokenize_file(&input.file_path, input.format.map(InputFormat::from))
        .with_context(|| format!("could not tokenize {}", input.file_path.display()))?;

    output::print_tokenize_summary(
        w,
        &file_name(&input.file_path),
        outcome.citations.len(),
        outcome.unparsed,
        color,
    )?;

    let groups = find_duplicate_groups(&outcome.citations);
    output::print_duplicate_groups(w, &outcome.citations, &groups, color)?;
    if groups.is_empty() || keep_duplicates {
        return Ok(outcome.citations);
    }
    writeln!(w, "Duplicates will only appear once in any output.")?;
    writeln!(w)?;
    Ok(remove_duplicates(outcome.citations, &groups))
}

fn write_json<T: serde::Serialize + ?Sized>(path: &Path, value: &T) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    std::fs::write(path, json).with_context(|| format!("failed to write {}", path.display()))?;
    Ok(())
}

fn tokenize(
    input: &InputArgs,
    keep_duplicates: bool,
    output_path: Option<&Path>,
    color: ColorMode,
) -> anyhow::Result<()> {
    let mut writer = std::io::stdout();
    let citations = read_citations(input, keep_duplicates, &mut writer, color)?;
    output::print_citations(&mut writer, &citations, color)?;

    if let Some(path) = output_path {
        write_json(path, &citations)?;
        writeln!(writer, "\nTokenized citations saved to {}", path.display())?;
    }
    Ok(())
}

fn duplicates(input: &InputArgs, color: ColorMode) -> anyhow::Result<()> {
    let mut writer = std::io::stdout();
    // keep everything so the printed indices match the input
    read_citations(input, true, &mut writer, color)?;
    Ok(())
}

/// Exclusion set from `--exclude`, else `[run] exclusion_path`, else empty.
fn load_exclusion(config: &ConfigFile, run: &RunArgs) -> anyhow::Result<ResultSet> {
    let path = run.exclude.clone().or_else(|| {
        config
            .run
            .as_ref()
            .and_then(|r| r.exclusion_path.as_ref())
            .map(PathBuf::from)
    });
    let Some(path) = path else {
        return Ok(ResultSet::new());
    };
    let content = std::fs::read_to_string(&path)
        .with_context(|| format!("failed to read previous results {}", path.display()))?;
    let set: ResultSet = serde_json::from_str(&content)
        .with_context(|| format!("{} is not a result set", path.display()))?;
    tracing::info!(path = %path.display(), publications = set.len(), "loaded exclusion set");
    Ok(set)
}

/// Snapshot sources from config, minus any disabled on the command line.
fn build_sources(config: &ConfigFile, run: &RunArgs) -> anyhow::Result<Vec<Arc<dyn RecordSource>>> {
    let mut disabled = Vec::new();
    for name in &run.disable_sources {
        let kind: SourceKind = name
            .parse()
            .map_err(|_| anyhow::anyhow!("unknown source {:?}", name))?;
        disabled.push(kind);
    }

    let sources: Vec<Arc<dyn RecordSource>> = config
        .snapshot_sources()
        .into_iter()
        .filter(|s| !disabled.contains(&s.kind()))
        .map(|s| Arc::new(s) as Arc<dyn RecordSource>)
        .collect();

    if sources.is_empty() {
        anyhow::bail!(
            "No sources configured. Set pubmed_snapshot, orcid_snapshot, scholar_snapshot or crossref_snapshot under [sources]."
        );
    }
    Ok(sources)
}

fn cancel_on_ctrl_c() -> CancellationToken {
    let cancel = CancellationToken::new();
    let cancel_clone = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            cancel_clone.cancel();
        }
    });
    cancel
}

async fn collect(config: &ConfigFile, run: &RunArgs, color: ColorMode) -> anyhow::Result<()> {
    let roster = config.roster();
    if roster.is_empty() {
        anyhow::bail!("No authors configured. Add [authors.<key>] tables to the config.");
    }
    roster.validate().context("invalid author roster")?;

    let sources = build_sources(config, run)?;
    let exclusion = load_exclusion(config, run)?;
    let settings = CollectSettings {
        passes: run.passes.unwrap_or_else(|| config.passes()),
    };

    let mut writer = std::io::stdout();
    writeln!(
        writer,
        "Collecting publications for {} authors from {} sources...\n",
        roster.len(),
        sources.len()
    )?;

    let cancel = cancel_on_ctrl_c();
    let outcome = collect_publications(&sources, &roster, &exclusion, &settings, &cancel).await;

    output::print_results(&mut writer, &outcome.results, &roster, color)?;
    output::print_merge_report(
        &mut writer,
        &outcome.report,
        &outcome.failed_sources,
        outcome.cancelled,
        color,
    )?;

    if let Some(path) = &run.output {
        write_json(path, &outcome.results)?;
        writeln!(writer, "\nPublications saved to {}", path.display())?;
    }
    Ok(())
}

async fn resolve(
    config: &ConfigFile,
    input: &InputArgs,
    run: &RunArgs,
    keep_duplicates: bool,
    citations_output: Option<&Path>,
    color: ColorMode,
) -> anyhow::Result<()> {
    let mut writer = std::io::stdout();
    let mut citations = read_citations(input, keep_duplicates, &mut writer, color)?;

    let roster = config.roster();
    roster.validate().context("invalid author roster")?;
    let sources = build_sources(config, run)?;
    let exclusion = load_exclusion(config, run)?;
    let previously_reported = citations_in_set(&citations, &exclusion);

    let cancel = cancel_on_ctrl_c();
    let mut results = ResultSet::new();
    let keys = resolve_references(&sources, &roster, &mut citations, &mut results, &cancel).await?;

    output::print_resolution(&mut writer, &citations, &keys, &previously_reported, color)?;
    if cancel.is_cancelled() {
        writeln!(writer, "Interrupted: results are partial.")?;
    }

    if let Some(path) = &run.output {
        write_json(path, &results)?;
        writeln!(writer, "Publications saved to {}", path.display())?;
    }
    if let Some(path) = citations_output {
        write_json(path, &citations)?;
        writeln!(writer, "Tokenized citations saved to {}", path.display())?;
    }
    Ok(())
}
