use anyhow::{Context, Result};
use bibharvest::config::{
    find_config_file, load_config, write_default_config, Config, LibraryType, LogFormat,
    TagSection,
};
use bibharvest::models::{DiagnosticKind, RequiredField};
use bibharvest::pipeline::{run_arxiv, run_zotero, RunReport};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// bibharvest - Harvest arXiv search results into CSV and render Zotero libraries as HTML
#[derive(Parser, Debug)]
#[command(name = "bibharvest")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Harvest arXiv full-text search results and render Zotero bibliographies", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose logging (-v for debug, -vv for trace)
    #[arg(long, short, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Only log errors
    #[arg(long, short, global = true)]
    quiet: bool,

    /// Configuration file path
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log output format
    #[arg(long, value_enum, global = true)]
    log_format: Option<LogFormat>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Crawl arXiv full-text search results and export enriched metadata as CSV
    Arxiv {
        /// Full-text search query
        #[arg(long, short)]
        query: Option<String>,

        /// Output CSV path
        #[arg(long)]
        out: Option<PathBuf>,

        /// Maximum number of result pages to crawl
        #[arg(long)]
        max_pages: Option<usize>,

        /// Render search pages in headless Chromium (requires the `render` feature)
        #[arg(long)]
        render: bool,

        /// Identifiers per metadata request
        #[arg(long)]
        batch_size: Option<usize>,

        /// Pause after each metadata request, in milliseconds
        #[arg(long)]
        batch_delay_ms: Option<u64>,

        /// Pause between result pages, in milliseconds
        #[arg(long)]
        page_delay_ms: Option<u64>,
    },

    /// Fetch a Zotero library and render it as an HTML bibliography
    Zotero {
        /// Numeric library id
        #[arg(long)]
        library_id: Option<String>,

        /// Whether the id names a group or a user library
        #[arg(long, value_enum)]
        library_type: Option<LibraryType>,

        /// Output HTML path
        #[arg(long)]
        out: Option<PathBuf>,

        /// Maximum number of listing pages to fetch
        #[arg(long)]
        max_pages: Option<usize>,

        /// Item type to leave out (repeatable; replaces the configured list)
        #[arg(long = "exclude", value_name = "TYPE")]
        exclude: Vec<String>,

        /// Field every item should have (repeatable; replaces the configured list)
        #[arg(long = "require", value_name = "FIELD")]
        require: Vec<RequiredField>,

        /// Tag section as HEADING=TAG (repeatable; replaces the configured sections)
        #[arg(long = "section", value_name = "HEADING=TAG")]
        section: Vec<TagSection>,
    },

    /// Write the default configuration as TOML
    InitConfig {
        /// Where to write (default: <config dir>/bibharvest/config.toml)
        #[arg(long)]
        path: Option<PathBuf>,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

fn init_tracing(cli: &Cli, config: &Config) {
    let level = match (cli.quiet, cli.verbose) {
        (true, _) => "error",
        (false, 0) => config.logging.level.as_str(),
        (false, 1) => "debug",
        (false, _) => "trace",
    };

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("bibharvest={}", level)));

    let registry = tracing_subscriber::registry().with(filter);
    match cli.log_format.unwrap_or(config.logging.format) {
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init(),
        LogFormat::Text => registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init(),
    }
}

fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .map(|dir| dir.join("bibharvest").join("config.toml"))
        .unwrap_or_else(|| PathBuf::from("bibharvest.toml"))
}

fn print_report(report: &RunReport, quiet: bool) {
    if quiet {
        return;
    }

    eprintln!(
        "Wrote {} records to {}",
        report.records,
        report.output.display()
    );

    let kinds = [
        DiagnosticKind::FilteredItem,
        DiagnosticKind::MissingField,
        DiagnosticKind::InvisibleCharacter,
        DiagnosticKind::MissingTrailer,
        DiagnosticKind::MalformedEntry,
    ];
    for kind in kinds {
        let count = report.diagnostics.count(kind);
        if count > 0 {
            eprintln!("  {:>4} {}", count, kind);
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_path = cli.config.clone().or_else(find_config_file);
    let mut config = load_config(config_path.as_deref()).with_context(|| match &config_path {
        Some(path) => format!("Failed to load configuration from {}", path.display()),
        None => "Failed to load configuration from the environment".to_string(),
    })?;

    init_tracing(&cli, &config);
    if let Some(path) = &config_path {
        tracing::info!("Using config file: {}", path.display());
    }

    match cli.command {
        Commands::Arxiv {
            query,
            out,
            max_pages,
            render,
            batch_size,
            batch_delay_ms,
            page_delay_ms,
        } => {
            let settings = &mut config.arxiv;
            if query.is_some() {
                settings.query = query;
            }
            if let Some(out) = out {
                settings.output = out;
            }
            if let Some(max_pages) = max_pages {
                settings.max_pages = max_pages;
            }
            settings.render |= render;
            if let Some(batch_size) = batch_size {
                settings.batch_size = batch_size;
            }
            if let Some(batch_delay_ms) = batch_delay_ms {
                settings.batch_delay_ms = batch_delay_ms;
            }
            if let Some(page_delay_ms) = page_delay_ms {
                settings.page_delay_ms = page_delay_ms;
            }

            let report = run_arxiv(&config)
                .await
                .context("arXiv harvest failed")?;
            print_report(&report, cli.quiet);
        }
        Commands::Zotero {
            library_id,
            library_type,
            out,
            max_pages,
            exclude,
            require,
            section,
        } => {
            let settings = &mut config.zotero;
            if let Some(library_id) = library_id {
                settings.library_id = library_id;
            }
            if let Some(library_type) = library_type {
                settings.library_type = library_type;
            }
            if let Some(out) = out {
                settings.output = out;
            }
            if max_pages.is_some() {
                settings.max_pages = max_pages;
            }
            if !exclude.is_empty() {
                settings.exclude_item_types = exclude;
            }
            if !require.is_empty() {
                settings.required_fields = require;
            }
            if !section.is_empty() {
                settings.sections = section;
            }

            let report = run_zotero(&config)
                .await
                .context("Zotero bibliography failed")?;
            print_report(&report, cli.quiet);
        }
        Commands::InitConfig { path, force } => {
            let path = path.unwrap_or_else(default_config_path);
            write_default_config(&path, force)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            if !cli.quiet {
                eprintln!("Wrote default configuration to {}", path.display());
            }
        }
    }

    Ok(())
}
