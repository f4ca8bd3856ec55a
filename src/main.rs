// src/main.rs
// =============================================================================
// This is the entry point of our CLI application.
//
// What happens here:
// 1. Parse command-line arguments using clap
// 2. Set up logging and Ctrl-C handling
// 3. Dispatch to the appropriate subcommand handler
// 4. Print the crawl report
// 5. Exit with proper code (0 = success, 1 = some pages failed, 2 = error,
//    130 = interrupted)
//
// Resource rule: once the archiving proxy is started, it is stopped on every
// path out of the handler (success, error or Ctrl-C).
// =============================================================================

// Module declarations - tells Rust about our other source files
mod archive; // src/archive/ - warcprox process + port pool
mod browser; // src/browser/ - page loading and querying
mod cli; // src/cli.rs - command-line parsing
mod config; // src/config.rs - settings and data directory
mod crawl; // src/crawl/ - filter pipeline, queue, crawl loop
mod error; // src/error.rs - typed errors

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser; // Parser trait enables the parse() method
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use archive::{ArchiveSession, PortPool};
use browser::{HttpBrowser, HttpPage, Page};
use cli::{ArchiveArgs, Cli, Commands};
use config::{ArchiveConfig, SessionConfig};
use crawl::{CrawlReport, CrawlSession, Submitter};

const EXIT_OK: i32 = 0;
const EXIT_FAILED_PAGES: i32 = 1;
const EXIT_ERROR: i32 = 2;
const EXIT_INTERRUPTED: i32 = 130;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let exit_code = match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            // {:#} prints the whole context chain on one line
            eprintln!("Error: {:#}", e);
            EXIT_ERROR
        }
    };

    std::process::exit(exit_code);
}

// RUST_LOG wins over -v when both are given
fn init_logging(verbose: u8) {
    let default = match verbose {
        0 => "bget=info",
        1 => "bget=debug",
        _ => "bget=trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn run(cli: Cli) -> Result<i32> {
    let cancel = CancellationToken::new();
    let interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("interrupt received, stopping");
            interrupt.cancel();
        }
    });

    let data_dir = cli.data_dir.clone().unwrap_or_else(config::default_data_dir);
    let ports = PortPool::default();

    match cli.command {
        Commands::Archive(args) => {
            handle_archive(&args, &cli.warcprox, &data_dir, &ports, cancel).await
        }
        Commands::Browse {
            archive_name,
            proxy_timeout_secs,
        } => {
            let mut archive_config = ArchiveConfig::new(&cli.warcprox, &data_dir, &archive_name);
            archive_config.startup_timeout = Duration::from_secs(proxy_timeout_secs);
            handle_browse(&archive_config, &ports, cancel).await
        }
    }
}

// Handles the 'archive' subcommand
async fn handle_archive(
    args: &ArchiveArgs,
    warcprox: &str,
    data_dir: &Path,
    ports: &PortPool,
    cancel: CancellationToken,
) -> Result<i32> {
    let session_config = SessionConfig::from_args(args)?;
    println!("🔍 Archiving: {}", args.url);

    let archive = if args.no_proxy {
        None
    } else {
        let warc_name = match &args.archive_name {
            Some(name) => name.clone(),
            None => config::warc_name_for(&args.url)
                .with_context(|| format!("Cannot derive an archive name from {}", args.url))?,
        };
        let mut archive_config = ArchiveConfig::new(warcprox, data_dir, &warc_name);
        archive_config.blackout_period = Duration::from_secs(args.blackout_period);
        archive_config.startup_timeout = Duration::from_secs(args.proxy_timeout_secs);

        let archive = start_archive(&archive_config, ports).await?;
        println!(
            "📼 Recording '{}' into {}",
            warc_name,
            archive_config.proxy_dir().display()
        );
        Some(archive)
    };

    let proxy_port = archive.as_ref().map(ArchiveSession::port);
    let result = crawl(args, &session_config, proxy_port, cancel).await;

    if let Some(archive) = archive {
        archive.shutdown().await;
    }

    let report = result?;
    print_report(&report, args.json)?;

    Ok(if report.cancelled {
        EXIT_INTERRUPTED
    } else if !report.is_ok() {
        EXIT_FAILED_PAGES
    } else {
        EXIT_OK
    })
}

// Runs one crawl session against the (optional) proxy
async fn crawl(
    args: &ArchiveArgs,
    session_config: &SessionConfig,
    proxy_port: Option<u16>,
    cancel: CancellationToken,
) -> Result<CrawlReport> {
    let browser = HttpBrowser::new(proxy_port).context("Failed to set up the browser")?;
    let mut input = BufReader::new(tokio::io::stdin()).lines();

    if args.wait_for_input {
        println!("⏸️  Press Enter when you're ready to start crawling");
        let line = tokio::select! {
            _ = cancel.cancelled() => None,
            line = input.next_line() => Some(line),
        };
        match line {
            Some(line) => {
                line.context("Failed to read from stdin")?;
            }
            None => {
                return Ok(CrawlReport {
                    cancelled: true,
                    ..Default::default()
                })
            }
        }
    }

    let quiet = args.json;
    let progress = move |page: &HttpPage| {
        if !quiet {
            println!("  📄 {}", page.url());
        }
    };

    let mut session = CrawlSession::new(session_config, browser)
        .with_hook(progress)
        .with_cancellation(cancel);

    if !session.submit(&session_config.root) {
        warn!(url = %session_config.root, "seed URL was rejected by the filter pipeline");
    }

    if session_config.run_forever {
        if let Some(submitter) = session.submitter() {
            println!("⌨️  Queue more URLs by typing them, one per line (Ctrl-C to finish)");
            tokio::spawn(feed_from_stdin(input, submitter));
        }
    }

    Ok(session.run().await)
}

// Submits every non-empty stdin line until EOF or the session ends
//
// EOF only stops the feeding; the session itself runs until Ctrl-C.
async fn feed_from_stdin(mut input: Lines<BufReader<Stdin>>, submitter: Submitter) {
    loop {
        match input.next_line().await {
            Ok(Some(line)) => {
                let url = line.trim();
                if url.is_empty() {
                    continue;
                }
                if !submitter.submit(url) {
                    break;
                }
            }
            Ok(None) => break,
            Err(e) => {
                warn!(error = %e, "stopped reading URLs from stdin");
                break;
            }
        }
    }
}

// Handles the 'browse' subcommand: proxy only, until Ctrl-C
async fn handle_browse(
    archive_config: &ArchiveConfig,
    ports: &PortPool,
    cancel: CancellationToken,
) -> Result<i32> {
    let archive = start_archive(archive_config, ports).await?;

    println!("🌐 Archiving proxy listening on 127.0.0.1:{}", archive.port());
    println!("   Set it as your browser's HTTP and HTTPS proxy.");
    println!(
        "   Recording '{}' into {}",
        archive_config.warc_name,
        archive_config.proxy_dir().display()
    );
    println!("   Press Ctrl-C to stop.");

    cancel.cancelled().await;
    archive.shutdown().await;
    Ok(EXIT_OK)
}

async fn start_archive(archive_config: &ArchiveConfig, ports: &PortPool) -> Result<ArchiveSession> {
    archive_config.prepare()?;
    ArchiveSession::start(ports, archive_config)
        .await
        .context("Failed to start the archiving proxy")
}

// Prints the report either as a table or JSON
fn print_report(report: &CrawlReport, json: bool) -> Result<()> {
    if json {
        let json_output = serde_json::to_string_pretty(report)?;
        println!("{}", json_output);
    } else {
        print_summary(report);
    }
    Ok(())
}

// Prints results as a human-readable summary in the terminal
fn print_summary(report: &CrawlReport) {
    println!();

    if !report.failed.is_empty() {
        println!("{:<60} {:<30}", "FAILED URL", "ERROR");
        println!("{}", "=".repeat(90));
        for failure in &report.failed {
            // Truncate URL if too long for display
            let url_display = if failure.url.chars().count() > 57 {
                format!("{}...", failure.url.chars().take(57).collect::<String>())
            } else {
                failure.url.clone()
            };
            println!("{:<60} {:<30}", url_display, failure.error);
        }
        println!();
    }

    println!("📊 Summary:");
    println!("   ✅ Captured: {}", report.visited.len());
    println!("   ❌ Failed: {}", report.failed.len());
    println!("   📋 Total: {}", report.fetched());
    println!("   🎞️  Media preloaded: {}", report.media_loaded);
    println!("   🔗 Links admitted: {}", report.admitted);
    println!("   🚫 Links filtered out: {}", report.rejected);
    if report.cancelled {
        println!("   ⏹️  Interrupted before the queue was empty");
    }
}
