// src/error.rs
// =============================================================================
// Typed errors for the two kinds of faults that are real failures.
//
// - FetchError: one page could not be loaded. The crawl loop records it and
//   moves on to the next item.
// - SetupError: the archiving proxy or the browser could not be started.
//   This aborts the session before the first fetch.
//
// A filter rejecting a URL is NOT an error (it's just `None`), and neither is
// an href that can't be read (also `None`, logged and skipped).
//
// main.rs wraps these in anyhow::Error when they reach the top.
// =============================================================================

use std::io;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

// Failure to load a single page
#[derive(Debug, Error)]
pub enum FetchError {
    /// The request never produced a response (DNS, connect, TLS, timeout...)
    #[error("request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// The server answered with a non-success status
    #[error("{url} returned HTTP {status}")]
    Status { url: String, status: u16 },

    /// The response body could not be read
    #[error("failed to read body of {url}: {source}")]
    Body {
        url: String,
        #[source]
        source: reqwest::Error,
    },
}

// Failure to bring up a session resource
#[derive(Debug, Error)]
pub enum SetupError {
    #[error("no free port left in the proxy port pool")]
    NoFreePort,

    #[error("failed to create data directory {path}: {source}")]
    DataDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("archiving proxy exited during startup ({status})")]
    ProxyExited { status: String },

    #[error("archiving proxy did not accept connections on port {port} within {timeout:?}")]
    ProxyTimeout { port: u16, timeout: Duration },

    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),
}
