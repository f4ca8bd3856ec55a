// src/cli.rs
// =============================================================================
// This file defines our command-line interface using the `clap` crate.
//
// Subcommands:
// - archive: crawl a site and record everything through the archiving proxy
// - browse: run the archiving proxy alone, for a browser you drive yourself
//
// Every tunable can also come from an environment variable (the `env = ...`
// attributes), which is handy for config that rarely changes such as the
// data directory or the pacing defaults.
// =============================================================================

use std::path::PathBuf;

use clap::{ArgAction, Args, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(
    name = "bget",
    version,
    about = "Download websites using a browser, archiving everything to WARC files",
    long_about = "bget loads every page of a website, follows its links, and records all \
                  traffic through warcprox so the site can be replayed later."
)]
pub struct Cli {
    /// Increase log verbosity (-v debug, -vv trace)
    ///
    /// RUST_LOG, when set, takes precedence
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    /// Where WARC files and proxy state are kept
    ///
    /// Defaults to $XDG_DATA_HOME/bget
    #[arg(long, global = true, env = "BGET_DATA_DIR")]
    pub data_dir: Option<PathBuf>,

    /// warcprox executable to run
    #[arg(long, global = true, env = "BGET_WARCPROX", default_value = "warcprox")]
    pub warcprox: String,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Automatically archive a website
    ///
    /// Example: bget archive https://example.com/docs/
    Archive(ArchiveArgs),

    /// Start the archiving proxy for an interactive browsing session
    ///
    /// Point your browser's HTTP and HTTPS proxy at the printed address.
    /// Runs until Ctrl-C.
    Browse {
        /// Archive this session with a custom name
        #[arg(long, default_value = "interactive")]
        archive_name: String,

        /// Seconds to wait for the proxy to come up
        #[arg(long, default_value_t = 30)]
        proxy_timeout_secs: u64,
    },
}

#[derive(Args, Debug, Clone)]
pub struct ArchiveArgs {
    /// Where to start; only URLs beginning with this are followed
    pub url: String,

    /// Archive under a custom name (defaults to the URL's host)
    #[arg(long)]
    pub archive_name: Option<String>,

    /// Wait for Enter before starting (e.g. to log in first)
    #[arg(long)]
    pub wait_for_input: bool,

    /// Keep the session open after the queue runs dry, until Ctrl-C
    #[arg(long)]
    pub run_forever: bool,

    /// Fixed delay after each page, in milliseconds
    #[arg(long, env = "BGET_CRAWL_DELAY_MS", default_value_t = 0)]
    pub crawl_delay_ms: u64,

    /// Upper bound of a random extra delay after each page, in milliseconds
    #[arg(long, env = "BGET_CRAWL_JITTER_MS", default_value_t = 0)]
    pub crawl_jitter_ms: u64,

    /// Seconds during which warcprox won't store a duplicate of a response
    #[arg(long, default_value_t = 604800)]
    pub blackout_period: u64,

    /// Seconds to wait for the proxy to come up
    #[arg(long, default_value_t = 30)]
    pub proxy_timeout_secs: u64,

    /// Crawl without starting the archiving proxy
    #[arg(long)]
    pub no_proxy: bool,

    /// Print the crawl report as JSON instead of a table
    #[arg(long)]
    pub json: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_archive_defaults() {
        let cli = Cli::try_parse_from(["bget", "archive", "https://example.com/"]).unwrap();
        match cli.command {
            Commands::Archive(args) => {
                assert_eq!(args.url, "https://example.com/");
                assert_eq!(args.archive_name, None);
                assert_eq!(args.blackout_period, 604800);
                assert!(!args.run_forever);
                assert!(!args.no_proxy);
            }
            other => panic!("unexpected command {:?}", other),
        }
        assert_eq!(cli.verbose, 0);
    }

    #[test]
    fn test_archive_flags() {
        let cli = Cli::try_parse_from([
            "bget",
            "-vv",
            "archive",
            "https://example.com/",
            "--archive-name",
            "snapshot",
            "--crawl-delay-ms",
            "1000",
            "--crawl-jitter-ms",
            "500",
            "--run-forever",
            "--json",
        ])
        .unwrap();
        assert_eq!(cli.verbose, 2);
        let Commands::Archive(args) = cli.command else {
            panic!("expected archive");
        };
        assert_eq!(args.archive_name.as_deref(), Some("snapshot"));
        assert_eq!(args.crawl_delay_ms, 1000);
        assert_eq!(args.crawl_jitter_ms, 500);
        assert!(args.run_forever);
        assert!(args.json);
    }

    #[test]
    fn test_browse_default_name() {
        let cli = Cli::try_parse_from(["bget", "browse"]).unwrap();
        match cli.command {
            Commands::Browse { archive_name, .. } => assert_eq!(archive_name, "interactive"),
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_archive_requires_url() {
        assert!(Cli::try_parse_from(["bget", "archive"]).is_err());
    }
}
