use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use paper_mesh::config::{find_config_file, load_config, Config, LogFormat};
use paper_mesh::mesh::{CitationClient, ExpandOutcome, GraphSession, LookupId};
use paper_mesh::models::{LayoutEvent, PaperRecord, SearchEvent, SearchQuery, SourceType};
use paper_mesh::sources::{SourceCapabilities, SourceRegistry};
use paper_mesh::ui::{self, ProviderSpinner, Spinner, Status};
use paper_mesh::utils::{
    deduplicate_papers_with_threshold, find_duplicates_with_threshold, HttpClient,
    SearchAggregator,
};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Paper Mesh - search literature catalogs and explore citation neighborhoods
#[derive(Parser, Debug)]
#[command(name = "paper-mesh")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Search paper catalogs at once and explore citation meshes", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose logging (-v, -vv)
    #[arg(long, short, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(long, short, global = true)]
    quiet: bool,

    /// Output format
    #[arg(long, short, value_enum, global = true, default_value_t = OutputFormat::Auto)]
    output: OutputFormat,

    /// Configuration file path
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log line format (overrides the configuration file)
    #[arg(long, value_enum, global = true)]
    log_format: Option<LogFormatArg>,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Output format for results
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum OutputFormat {
    /// Pretty in a terminal, JSON otherwise
    Auto,
    /// Human-readable
    Pretty,
    /// One JSON document per line
    Json,
}

impl OutputFormat {
    fn resolve(self) -> Self {
        match self {
            OutputFormat::Auto if ui::is_terminal() => OutputFormat::Pretty,
            OutputFormat::Auto => OutputFormat::Json,
            other => other,
        }
    }
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum LogFormatArg {
    Pretty,
    Json,
}

/// Searchable catalogs
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum SourceArg {
    #[value(name = "semantic")]
    Semantic,
    #[value(name = "openalex")]
    OpenAlex,
    #[value(name = "crossref")]
    CrossRef,
}

impl From<SourceArg> for SourceType {
    fn from(source: SourceArg) -> Self {
        match source {
            SourceArg::Semantic => SourceType::SemanticScholar,
            SourceArg::OpenAlex => SourceType::OpenAlex,
            SourceArg::CrossRef => SourceType::CrossRef,
        }
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Search every catalog at once, streaming deduplicated results
    #[command(alias = "s")]
    Search {
        /// Search query string
        query: String,

        /// Restrict to these catalogs (default: all)
        #[arg(long, short, value_enum)]
        source: Vec<SourceArg>,

        /// Maximum results requested from each catalog
        #[arg(long, short)]
        max_results: Option<usize>,
    },

    /// Open a citation mesh and optionally expand nodes
    #[command(alias = "m")]
    Mesh {
        /// Semantic Scholar paper id
        #[arg(conflicts_with = "doi")]
        paper_id: Option<String>,

        /// Look the paper up by DOI instead
        #[arg(long)]
        doi: Option<String>,

        /// Node ids to expand, in order
        #[arg(long, short)]
        expand: Vec<String>,
    },

    /// Title suggestions for a partial query
    #[command(alias = "ac")]
    Autocomplete {
        query: String,
    },

    /// Deduplicate a JSON file containing papers
    #[command(alias = "dedup")]
    Dedupe {
        /// Input JSON file containing papers
        input: PathBuf,

        /// Output file (default: overwrite input)
        #[arg(long = "out")]
        out: Option<PathBuf>,

        /// Show duplicate groups without removing
        #[arg(long)]
        show: bool,
    },

    /// List available catalogs and their capabilities
    #[command(alias = "ls")]
    Sources {
        #[arg(long, short)]
        detailed: bool,
    },

    /// Print the effective configuration
    Config {
        /// Save it to this path instead
        #[arg(long)]
        write: Option<PathBuf>,
    },
}

fn init_tracing(cli: &Cli, config: &Config) {
    let level = if cli.quiet {
        "error".to_string()
    } else {
        match cli.verbose {
            0 => config.logging.level.clone(),
            1 => "debug".to_string(),
            _ => "trace".to_string(),
        }
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(format!("paper_mesh={}", level)));

    let json = match cli.log_format {
        Some(LogFormatArg::Json) => true,
        Some(LogFormatArg::Pretty) => false,
        None => config.logging.format == LogFormat::Json,
    };

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

/// Print an opened mesh, then expand `expand` in order.
///
/// JSON output is one object per line: the initial snapshot (keyed by
/// `paperId`), then one delta (keyed by `expanded`) per successful
/// expansion. Skipped and failed expansions are reported on stderr only.
async fn run_mesh<W: Write>(
    session: &GraphSession,
    expand: &[String],
    format: OutputFormat,
    quiet: bool,
    out: &mut W,
) -> Result<()> {
    let snapshot = session.snapshot();
    match format {
        OutputFormat::Json => writeln!(out, "{}", serde_json::to_string(&snapshot)?)?,
        _ => ui::print_snapshot(&snapshot),
    }

    for id in expand {
        let event = LayoutEvent::NodeClicked { id: id.clone() };
        match session.handle_layout_event(&event).await {
            Some(Ok(ExpandOutcome::Expanded(delta))) => match format {
                OutputFormat::Json => writeln!(out, "{}", serde_json::to_string(&delta)?)?,
                _ => ui::print_delta(&delta),
            },
            Some(Ok(ExpandOutcome::Rejected(reason))) => {
                if !quiet {
                    ui::print_status(Status::Warning, &format!("Skipped {}: {:?}", id, reason));
                }
            }
            Some(Err(e)) => {
                ui::print_status(Status::Error, &format!("Expanding {} failed: {}", id, e));
            }
            None => {}
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_path = cli.config.clone().or_else(find_config_file);
    let config = load_config(config_path.as_deref())?;
    init_tracing(&cli, &config);
    if let Some(path) = &config_path {
        tracing::debug!(path = %path.display(), "Using config file");
    }

    let Some(command) = cli.command else {
        Cli::command().print_help()?;
        return Ok(());
    };

    let http = HttpClient::from_config(&config.http)?;
    let format = cli.output.resolve();

    match command {
        Commands::Search {
            query,
            source,
            max_results,
        } => {
            let mut registry = SourceRegistry::from_config(&config, &http);
            if !source.is_empty() {
                let types: Vec<SourceType> = source.into_iter().map(SourceType::from).collect();
                registry = registry.select(&types);
            }
            let aggregator = SearchAggregator::from_config(registry, &config);
            let providers: Vec<SourceType> = aggregator
                .registry()
                .searchable()
                .iter()
                .map(|s| s.source_type())
                .collect();

            let query = SearchQuery::new(query)
                .max_results(max_results.unwrap_or(config.sources.max_results_per_provider));
            let mut stream = aggregator.search(query)?;

            match format {
                OutputFormat::Json => {
                    while let Some(event) = stream.next_event().await {
                        println!("{}", serde_json::to_string(&event)?);
                    }
                }
                _ => {
                    let mut spinner = (!cli.quiet).then(|| ProviderSpinner::new(&providers));
                    let mut finished = false;
                    while let Some(event) = stream.next_event().await {
                        match event {
                            SearchEvent::Paper(paper) => match spinner.as_mut() {
                                Some(spinner) => {
                                    spinner.paper_received();
                                    spinner.suspend(|| ui::print_paper(&paper));
                                }
                                None => ui::print_paper(&paper),
                            },
                            SearchEvent::ProviderDone { source, status } => {
                                if let Some(spinner) = spinner.as_mut() {
                                    spinner.settle(source, status);
                                }
                            }
                            SearchEvent::Done { total } => {
                                finished = true;
                                if let Some(spinner) = spinner.as_ref() {
                                    spinner.finish(total);
                                }
                            }
                        }
                    }
                    if let Some(spinner) = spinner.as_ref().filter(|_| !finished) {
                        spinner.abandon("Search stream closed before completion");
                    }
                }
            }
        }

        Commands::Mesh {
            paper_id,
            doi,
            expand,
        } => {
            let lookup = match (paper_id, doi) {
                (Some(id), _) => LookupId::from_paper_id(&id)?,
                (None, Some(doi)) => LookupId::from_doi(&doi)?,
                (None, None) => anyhow::bail!("paperId or doi required"),
            };

            let client = CitationClient::from_config(http.clone(), &config);
            let spinner = (!cli.quiet && format == OutputFormat::Pretty)
                .then(|| Spinner::new(&format!("Fetching citation mesh for {}", lookup)));
            let opened = GraphSession::open(Arc::new(client), lookup).await;
            if let Some(spinner) = &spinner {
                spinner.finish_and_clear();
            }
            let session = opened?;
            run_mesh(&session, &expand, format, cli.quiet, &mut std::io::stdout()).await?;
        }

        Commands::Autocomplete { query } => {
            let registry = SourceRegistry::from_config(&config, &http);
            let mut suggestions = Vec::new();
            for source in registry.with_capability(SourceCapabilities::AUTOCOMPLETE) {
                match source.autocomplete(&query).await {
                    Ok(found) => suggestions.extend(found),
                    Err(e) => {
                        tracing::warn!(source = source.id(), error = %e, "Autocomplete failed")
                    }
                }
            }

            match format {
                OutputFormat::Json => println!("{}", serde_json::to_string(&suggestions)?),
                _ => {
                    for suggestion in &suggestions {
                        println!(
                            "{}  {}",
                            suggestion.paper_id,
                            ui::truncate_with_ellipsis(&suggestion.title, ui::terminal_width() / 2)
                        );
                        if let Some(detail) = &suggestion.authors_year {
                            println!("    {}", detail);
                        }
                    }
                }
            }
        }

        Commands::Dedupe { input, out, show } => {
            let json_str = std::fs::read_to_string(&input)?;
            let papers: Vec<PaperRecord> = serde_json::from_str(&json_str)?;

            if show {
                let groups =
                    find_duplicates_with_threshold(&papers, config.dedup.title_distance_threshold);
                if groups.is_empty() {
                    println!("No duplicates found");
                } else {
                    println!("Found {} duplicate groups:", groups.len());
                    for (i, group) in groups.iter().enumerate() {
                        println!("  Group {}: {} papers", i + 1, group.len());
                        for idx in group {
                            println!("    - {} ({})", papers[*idx].title, papers[*idx].source);
                        }
                    }
                }
            } else {
                let before = papers.len();
                let deduped = deduplicate_papers_with_threshold(
                    papers,
                    config.dedup.title_distance_threshold,
                );
                let output_path = out.as_ref().unwrap_or(&input);
                std::fs::write(output_path, serde_json::to_string_pretty(&deduped)?)?;
                if !cli.quiet {
                    ui::print_status(
                        Status::Success,
                        &format!(
                            "Deduplicated {}: {} -> {} papers",
                            input.display(),
                            before,
                            deduped.len()
                        ),
                    );
                }
            }
        }

        Commands::Sources { detailed } => {
            let registry = SourceRegistry::from_config(&config, &http);
            for src in registry.all() {
                if detailed {
                    println!(
                        "{} {} ({})",
                        ui::source_icon(src.source_type()),
                        src.name(),
                        src.id()
                    );
                    println!("  Capabilities: {:?}", src.capabilities());
                } else {
                    println!("{} - {}", src.id(), src.name());
                }
            }
        }

        Commands::Config { write } => match write {
            Some(path) => {
                config.save(&path)?;
                if !cli.quiet {
                    ui::print_status(
                        Status::Success,
                        &format!("Wrote configuration to {}", path.display()),
                    );
                }
            }
            None => print!("{}", config.to_toml()?),
        },
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use paper_mesh::mesh::mock::MockFetcher;

    #[test]
    fn test_cli_default_values() {
        let cli = Cli::parse_from(["paper-mesh"]);
        assert_eq!(cli.verbose, 0);
        assert!(!cli.quiet);
        assert_eq!(cli.output, OutputFormat::Auto);
        assert!(cli.log_format.is_none());
        assert!(cli.command.is_none());
    }

    #[test]
    fn test_cli_verbose_flag() {
        let cli = Cli::parse_from(["paper-mesh", "-vv"]);
        assert_eq!(cli.verbose, 2);
        let cli = Cli::parse_from(["paper-mesh", "sources", "-v"]);
        assert_eq!(cli.verbose, 1);
    }

    #[test]
    fn test_cli_output_format() {
        let cli = Cli::parse_from(["paper-mesh", "-o", "json"]);
        assert_eq!(cli.output, OutputFormat::Json);
        assert_eq!(OutputFormat::Pretty.resolve(), OutputFormat::Pretty);
    }

    #[test]
    fn test_cli_search_sources() {
        let cli = Cli::parse_from([
            "paper-mesh",
            "search",
            "graph neural networks",
            "--source",
            "openalex",
            "-s",
            "crossref",
            "--max-results",
            "10",
        ]);
        match cli.command {
            Some(Commands::Search {
                query,
                source,
                max_results,
            }) => {
                assert_eq!(query, "graph neural networks");
                assert_eq!(source, vec![SourceArg::OpenAlex, SourceArg::CrossRef]);
                assert_eq!(max_results, Some(10));
                assert_eq!(SourceType::from(source[0]), SourceType::OpenAlex);
            }
            _ => panic!("Expected Search command"),
        }
    }

    #[test]
    fn test_cli_mesh_command() {
        let cli =
            Cli::parse_from(["paper-mesh", "mesh", "abc123", "--expand", "n1", "-e", "n2"]);
        match cli.command {
            Some(Commands::Mesh {
                paper_id,
                doi,
                expand,
            }) => {
                assert_eq!(paper_id.as_deref(), Some("abc123"));
                assert!(doi.is_none());
                assert_eq!(expand, vec!["n1", "n2"]);
            }
            _ => panic!("Expected Mesh command"),
        }
    }

    #[test]
    fn test_cli_mesh_doi_conflicts_with_id() {
        assert!(Cli::try_parse_from(["paper-mesh", "mesh", "abc", "--doi", "10.1/x"]).is_err());
        let cli = Cli::try_parse_from(["paper-mesh", "mesh", "--doi", "10.1/x"]).unwrap();
        assert!(matches!(cli.command, Some(Commands::Mesh { doi: Some(_), .. })));
    }

    #[test]
    fn test_cli_dedupe_and_config() {
        let cli = Cli::parse_from(["paper-mesh", "dedupe", "in.json", "--show"]);
        assert!(matches!(cli.command, Some(Commands::Dedupe { show: true, .. })));

        let cli = Cli::parse_from(["paper-mesh", "config", "--write", "/tmp/pm.toml"]);
        match cli.command {
            Some(Commands::Config { write }) => {
                assert_eq!(write, Some(PathBuf::from("/tmp/pm.toml")))
            }
            _ => panic!("Expected Config command"),
        }
    }

    #[tokio::test]
    async fn test_mesh_json_is_snapshot_then_deltas() {
        let fetcher = MockFetcher::new()
            .with_neighborhood("p1", &["n1", "n2"], &[])
            .with_neighborhood("n1", &["x1"], &[]);
        let root = LookupId::from_paper_id("p1").unwrap();
        let session = GraphSession::open(Arc::new(fetcher), root).await.unwrap();

        // n1 twice: the second is skipped. n2 has no canned response and fails.
        let expand: Vec<String> = ["n1", "n1", "n2"].iter().map(|s| s.to_string()).collect();
        let mut out = Vec::new();
        run_mesh(&session, &expand, OutputFormat::Json, true, &mut out)
            .await
            .unwrap();

        let lines: Vec<serde_json::Value> = String::from_utf8(out)
            .unwrap()
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["paperId"], "p1");
        assert_eq!(lines[0]["nodes"].as_array().unwrap().len(), 3);
        assert_eq!(lines[1]["expanded"], "n1");
        assert_eq!(lines[1]["nodes"][0]["id"], "x1");
        assert_eq!(lines[1]["links"].as_array().unwrap().len(), 1);
    }

    #[test]
    fn test_cli_command_is_valid() {
        Cli::command().debug_assert();
    }
}
