// src/crawl/mod.rs
// =============================================================================
// This module handles crawl orchestration.
//
// Features:
// - Ordered filter pipeline deciding which discovered links are followed
// - Session-wide dedup so no URL is loaded twice
// - Breadth-first work queue
// - Randomized pacing between requests
// - Cooperative crawl loop with cancellation and a page-load hook
//
// Submodules:
// - filter: the admission pipeline and dedup set
// - queue: FIFO of admitted URLs
// - pacing: delay between fetches
// - extract: pulls hrefs out of a loaded page
// - session: the crawl loop tying it all together
// - report: what a finished session returns
// =============================================================================

mod extract;
mod filter;
mod pacing;
mod queue;
mod report;
mod session;

#[cfg(test)]
mod testing;

pub use report::CrawlReport;
pub use session::{CrawlSession, Submitter};
