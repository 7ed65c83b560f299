//! History-Mirror main entry point
//!
//! This is the command-line interface for the History-Mirror wiki archiver.

use anyhow::Context;
use clap::Parser;
use history_mirror::config::{load_config_with_hash, Config};
use history_mirror::crawler::{run_mirror, CrawlMode};
use history_mirror::storage::{DoneList, ResumeCheckpoint};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

/// History-Mirror: an incremental wiki history archiver
///
/// History-Mirror copies every revision of every page of a wiki into a local
/// directory tree. The first run archives full histories; later runs pick up
/// only the pages edited since the last complete update.
#[derive(Parser, Debug)]
#[command(name = "history-mirror")]
#[command(version)]
#[command(about = "An incremental wiki history archiver", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Crawl mode: auto, initial or incremental
    #[arg(long, default_value = "auto", value_parser = parse_mode)]
    mode: CrawlMode,

    /// Resume an incremental run at this page instead of the checkpoint
    #[arg(long, value_name = "PAGE")]
    start_page: Option<String>,

    /// Stop after fetching this many pages
    #[arg(long, value_name = "N")]
    max_pages: Option<u32>,

    /// Validate config and show what the next run would do without crawling
    #[arg(long, conflicts_with_all = ["stats", "export_summary"])]
    dry_run: bool,

    /// Show archive and journal statistics and exit
    #[arg(long, conflicts_with_all = ["dry_run", "export_summary"])]
    stats: bool,

    /// Write the markdown report of the latest run and exit
    #[arg(long, conflicts_with_all = ["dry_run", "stats"])]
    export_summary: bool,
}

fn parse_mode(s: &str) -> Result<CrawlMode, String> {
    s.parse()
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (mut config, config_hash) = match load_config_with_hash(&cli.config) {
        Ok((cfg, hash)) => {
            tracing::info!("Configuration loaded successfully (hash: {})", hash);
            (cfg, hash)
        }
        Err(e) => {
            tracing::error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };

    if let Some(start) = cli.start_page {
        config.crawl.start_page = Some(start);
    }
    if let Some(max) = cli.max_pages {
        config.crawl.max_pages = Some(max);
    }

    if cli.dry_run {
        handle_dry_run(&config, cli.mode)?;
    } else if cli.stats {
        handle_stats(&config)?;
    } else if cli.export_summary {
        handle_export_summary(&config)?;
    } else {
        handle_crawl(config, config_hash, cli.mode).await?;
    }

    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("history_mirror=info,warn"),
            1 => EnvFilter::new("history_mirror=debug,info"),
            2 => EnvFilter::new("history_mirror=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Handles the --dry-run mode: validates config and shows what the next run would do
fn handle_dry_run(config: &Config, requested: CrawlMode) -> anyhow::Result<()> {
    let root = Path::new(&config.archive.root);
    let done = DoneList::load(root).context("reading done-list")?;
    let checkpoint = ResumeCheckpoint::new(root);
    let mode = requested.resolve(&done, &checkpoint);

    println!("=== History-Mirror Dry Run ===\n");

    println!("Site:");
    println!("  Name: {}", config.site.name);
    println!("  URL: {}", config.site.url);
    println!("  API endpoint: {}", config.api.endpoint);

    println!("\nBrowser:");
    println!("  WebDriver: {}", config.browser.webdriver_url);
    println!("  Browser: {}", config.browser.browser_name);
    println!("  Wait timeout: {}s", config.browser.wait_timeout_secs);
    println!(
        "  Login: {}",
        config.browser.login_user.as_deref().unwrap_or("(anonymous)")
    );

    println!("\nArchive:");
    println!("  Root: {}", config.archive.root);
    println!("  Pages with complete history: {}", done.len());
    match checkpoint.load()? {
        Some(ts) => println!("  Resume checkpoint: {}", ts.to_rfc3339()),
        None => println!("  Resume checkpoint: none"),
    }

    println!("\nCrawl:");
    println!("  Mode: {} (requested {})", mode, requested);
    println!(
        "  Reserved prefixes: {}",
        config.crawl.reserved_prefixes.join(", ")
    );
    println!("  Ignored pages: {}", config.crawl.ignore_pages.len());
    if let Some(start) = &config.crawl.start_page {
        println!("  Start page: {}", start);
    }
    println!("  Boundary probes: {}", config.crawl.boundary_probes);
    if let Some(max) = config.crawl.max_pages {
        println!("  Max pages: {}", max);
    }

    println!("\nOutput:");
    println!("  Journal: {}", config.output.database_path);
    println!("  Summary: {}", config.output.summary_path);

    println!("\n✓ Configuration is valid");

    Ok(())
}

/// Handles the --stats mode
fn handle_stats(config: &Config) -> anyhow::Result<()> {
    use history_mirror::journal::open_journal;
    use history_mirror::output::{load_statistics, print_statistics};

    println!("Journal: {}\n", config.output.database_path);

    let journal = open_journal(Path::new(&config.output.database_path))?;
    let stats = load_statistics(&journal, Path::new(&config.archive.root))?;
    print_statistics(&stats);

    Ok(())
}

/// Handles the --export-summary mode: writes the markdown report of the latest run
fn handle_export_summary(config: &Config) -> anyhow::Result<()> {
    use history_mirror::journal::open_journal;
    use history_mirror::output::{generate_markdown_summary, generate_summary};

    println!("=== Exporting Run Summary ===\n");
    println!("Journal: {}", config.output.database_path);
    println!("Output: {}", config.output.summary_path);
    println!();

    let journal = open_journal(Path::new(&config.output.database_path))?;
    let summary = generate_summary(&journal)?;
    generate_markdown_summary(&summary, Path::new(&config.output.summary_path))?;

    println!("✓ Summary exported to: {}", config.output.summary_path);

    Ok(())
}

/// Handles the main crawl operation
async fn handle_crawl(config: Config, config_hash: String, mode: CrawlMode) -> anyhow::Result<()> {
    use history_mirror::journal::{open_journal, Journal};
    use history_mirror::output::{generate_markdown_summary, summarize_run};

    tracing::info!(
        "Mirroring {} into {} (mode: {})",
        config.site.url,
        config.archive.root,
        mode
    );

    let database_path = config.output.database_path.clone();
    let summary_path = config.output.summary_path.clone();

    let report = match run_mirror(config, config_hash, mode).await {
        Ok(report) => report,
        Err(e) => {
            tracing::error!("Mirror run failed: {}", e);
            return Err(e.into());
        }
    };

    let journal = open_journal(Path::new(&database_path))?;
    let run = journal.get_run(report.run_id)?;
    let summary = summarize_run(&journal, run)?;
    if let Err(e) = generate_markdown_summary(&summary, Path::new(&summary_path)) {
        tracing::warn!("Failed to write run summary to {}: {}", summary_path, e);
    }

    if report.failures.is_empty() {
        tracing::info!("Run {} completed successfully", report.run_id);
    } else {
        tracing::warn!(
            "Run {} completed with {} failed page(s); see {}",
            report.run_id,
            report.failures.len(),
            summary_path
        );
    }

    Ok(())
}
