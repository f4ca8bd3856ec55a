// src/config.rs
// =============================================================================
// Turns parsed command-line arguments into the settings each part of a
// session needs. Once built, these never change while the session runs.
//
// - SessionConfig: scope root, pacing, run-forever (used by the crawl loop)
// - ArchiveConfig: how to run the archiving proxy and where it writes
//
// Also handles the data directory:
//   $XDG_DATA_HOME/bget, or ~/.local/share/bget if XDG_DATA_HOME is unset
//   └── warcprox/   (proxy working directory: WARCs + dedup database)
// =============================================================================

use std::env;
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use url::Url;

use crate::cli::ArchiveArgs;
use crate::error::SetupError;

pub const DEFAULT_BLACKOUT_PERIOD: Duration = Duration::from_secs(604800);
pub const DEFAULT_PROXY_TIMEOUT: Duration = Duration::from_secs(30);

// Settings for the crawl loop
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// Only URLs starting with this string are followed
    pub root: String,
    /// Fixed part of the delay between fetches
    pub base_delay: Duration,
    /// Upper bound of the random part of the delay
    pub jitter: Duration,
    /// Keep waiting for submissions when the queue runs dry
    pub run_forever: bool,
}

impl SessionConfig {
    // The root is the seed in the same normalized form `Url::join` gives
    // extracted links, so the prefix check compares like with like
    pub fn from_args(args: &ArchiveArgs) -> Result<Self> {
        let seed = parse_seed(&args.url)?;
        Ok(Self {
            root: seed.to_string(),
            base_delay: Duration::from_millis(args.crawl_delay_ms),
            jitter: Duration::from_millis(args.crawl_jitter_ms),
            run_forever: args.run_forever,
        })
    }
}

// Settings for the archiving proxy
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveConfig {
    /// warcprox executable
    pub program: String,
    /// Root data directory
    pub data_dir: PathBuf,
    /// Prefix of the WARC files and dedup database
    pub warc_name: String,
    /// warcprox --blackout-period
    pub blackout_period: Duration,
    /// How long to wait for the proxy to start listening
    pub startup_timeout: Duration,
}

impl ArchiveConfig {
    pub fn new(program: &str, data_dir: &Path, warc_name: &str) -> Self {
        Self {
            program: program.to_string(),
            data_dir: data_dir.to_path_buf(),
            warc_name: warc_name.to_string(),
            blackout_period: DEFAULT_BLACKOUT_PERIOD,
            startup_timeout: DEFAULT_PROXY_TIMEOUT,
        }
    }

    // Working directory of the proxy
    pub fn proxy_dir(&self) -> PathBuf {
        self.data_dir.join("warcprox")
    }

    // Creates the data directory layout if it's missing
    pub fn prepare(&self) -> Result<(), SetupError> {
        let dir = self.proxy_dir();
        fs::create_dir_all(&dir).map_err(|source| SetupError::DataDir { path: dir, source })
    }
}

// The data directory to use when none is given
pub fn default_data_dir() -> PathBuf {
    data_dir_from(env::var_os("XDG_DATA_HOME"), env::var_os("HOME"))
}

fn data_dir_from(xdg_data_home: Option<OsString>, home: Option<OsString>) -> PathBuf {
    // XDG says relative paths must be ignored
    let base = xdg_data_home
        .map(PathBuf::from)
        .filter(|path| path.is_absolute())
        .or_else(|| home.map(|home| PathBuf::from(home).join(".local").join("share")))
        .unwrap_or_else(env::temp_dir);
    base.join("bget")
}

// Default archive name for a crawl: the seed's host (and port, if any)
//
// Example: "https://example.com:8080/docs" -> "example.com:8080"
pub fn warc_name_for(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    let host = parsed.host_str()?;
    Some(match parsed.port() {
        Some(port) => format!("{}:{}", host, port),
        None => host.to_string(),
    })
}

// The seed has to be an absolute http(s) URL
fn parse_seed(url: &str) -> Result<Url> {
    let parsed = Url::parse(url).with_context(|| format!("Invalid URL '{}'", url))?;
    if parsed.scheme() != "http" && parsed.scheme() != "https" {
        bail!("Only http and https URLs can be archived, got '{}'", url);
    }
    if parsed.host_str().is_none() {
        bail!("URL has no host: {}", url);
    }
    Ok(parsed)
}
