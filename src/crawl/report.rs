// src/crawl/report.rs
// Summary of a finished crawl session, printable as a table or JSON.

use serde::{Deserialize, Serialize};

// A page that could not be loaded
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailedFetch {
    pub url: String,
    pub error: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrawlReport {
    /// Pages loaded successfully, in visit order
    pub visited: Vec<String>,
    /// Pages that failed to load
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub failed: Vec<FailedFetch>,
    /// URLs that made it through the filter pipeline (seed included)
    pub admitted: usize,
    /// URLs the filter pipeline turned away
    pub rejected: usize,
    /// Media resources loaded eagerly for the archiver
    pub media_loaded: usize,
    /// True if the session was interrupted before the queue ran dry
    pub cancelled: bool,
}

impl CrawlReport {
    // Number of fetch attempts made
    pub fn fetched(&self) -> usize {
        self.visited.len() + self.failed.len()
    }

    pub fn is_ok(&self) -> bool {
        self.failed.is_empty()
    }
}
