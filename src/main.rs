//! bibsieve CLI: bibliographic record ingestion and completeness sieve.

use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use miette::{IntoDiagnostic, Result};

use bibsieve::checkpoint::CheckpointLedger;
use bibsieve::config::PipelineConfig;
use bibsieve::enrich::enricher_by_name;
use bibsieve::extract::ExtractOptions;
use bibsieve::monitor::SystemMonitor;
use bibsieve::pipeline::{EnrichStatus, PipelineRun, RunSummary};

#[derive(Parser)]
#[command(
    name = "bibsieve",
    version,
    about = "Ingest bibliographic tables into an entity graph and sieve out incomplete entities"
)]
struct Cli {
    /// TOML config file. Defaults apply when omitted.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the full pipeline: extract, build, enrich, classify, write.
    Run {
        #[command(flatten)]
        source: SourceArgs,

        /// Output file for the full merged graph.
        #[arg(long)]
        enriched_file: Option<PathBuf>,

        /// Output file for the incomplete-entity subset.
        #[arg(long)]
        incomplete_file: Option<PathBuf>,

        /// Enricher to run between building and classification (provenance, none).
        #[arg(long)]
        enricher: Option<String>,
    },

    /// Extract selection records only and report what would be built.
    Extract {
        #[command(flatten)]
        source: SourceArgs,
    },

    /// Write a config file holding every default.
    InitConfig {
        /// Where to write the config.
        #[arg(long, default_value = "bibsieve.toml")]
        path: PathBuf,

        /// Overwrite an existing file.
        #[arg(long)]
        force: bool,
    },

    /// List the source files recorded as fully processed.
    Checkpoints,
}

#[derive(Args)]
struct SourceArgs {
    /// Directory searched recursively for source tables.
    #[arg(long)]
    source_root: Option<PathBuf>,

    /// Namespace entity IRIs are derived from.
    #[arg(long)]
    base_iri: Option<String>,

    /// Stop after this many selection records.
    #[arg(long)]
    test_limit: Option<usize>,

    /// Only process the first N source files, in discovery order.
    #[arg(long)]
    file_limit: Option<usize>,

    /// Neither skip nor record checkpointed files.
    #[arg(long)]
    no_checkpoint: bool,

    /// Print the run summary as JSON.
    #[arg(long)]
    json: bool,
}

impl SourceArgs {
    fn apply(&self, config: &mut PipelineConfig) {
        if let Some(root) = &self.source_root {
            config.source.root = Some(root.clone());
        }
        if let Some(base_iri) = &self.base_iri {
            config.base_iri = base_iri.clone();
        }
        if self.no_checkpoint {
            config.checkpoint.enabled = false;
        }
    }

    fn options(&self) -> ExtractOptions {
        ExtractOptions {
            test_limit: self.test_limit,
            file_limit: self.file_limit,
        }
    }
}

fn load_config(path: Option<&PathBuf>) -> Result<PipelineConfig> {
    match path {
        Some(path) => Ok(PipelineConfig::load(path)?),
        None => Ok(PipelineConfig::default()),
    }
}

fn monitor_for(config: &PipelineConfig) -> SystemMonitor {
    SystemMonitor::new(Duration::from_millis(config.resources.cpu_sample_ms))
}

fn print_summary(summary: &RunSummary, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(summary).into_diagnostic()?);
    } else {
        print!("{summary}");
    }
    Ok(())
}

fn main() -> Result<()> {
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .unicode(true)
                .context_lines(3)
                .build(),
        )
    }))
    .ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let mut config = load_config(cli.config.as_ref())?;

    match cli.command {
        Commands::Run {
            source,
            enriched_file,
            incomplete_file,
            enricher,
        } => {
            source.apply(&mut config);
            if let Some(path) = enriched_file {
                config.output.enriched_file = path;
            }
            if let Some(path) = incomplete_file {
                config.output.incomplete_file = path;
            }
            if let Some(name) = enricher {
                config.enrich.enricher = name;
            }

            let enricher = enricher_by_name(&config.enrich.enricher)?;
            let mut monitor = monitor_for(&config);
            let mut run = PipelineRun::new(config)?;
            let sources = run.discover()?;
            let summary = run.execute(&sources, source.options(), &mut monitor, enricher.as_ref())?;
            print_summary(&summary, source.json)?;
        }

        Commands::Extract { source } => {
            source.apply(&mut config);
            // A dry run leaves the ledger and any persistent store untouched.
            config.checkpoint.enabled = false;
            config.graph.store_dir = None;

            let mut monitor = monitor_for(&config);
            let mut run = PipelineRun::new(config)?;
            let sources = run.discover()?;
            run.extract(&sources, source.options(), &mut monitor)?;
            print_summary(&run.summary(EnrichStatus::NotRun), source.json)?;
        }

        Commands::InitConfig { path, force } => {
            if path.exists() && !force {
                miette::bail!(
                    "{} already exists (pass --force to overwrite)",
                    path.display()
                );
            }
            config.save(&path)?;
            println!("Wrote default config to {}", path.display());
        }

        Commands::Checkpoints => {
            let ledger = CheckpointLedger::open(&config.checkpoint.path)?;
            let mut names: Vec<_> = ledger.processed().iter().collect();
            names.sort();
            for name in &names {
                println!("{name}");
            }
            println!(
                "{} file(s) recorded in {}",
                names.len(),
                config.checkpoint.path.display()
            );
        }
    }

    Ok(())
}
