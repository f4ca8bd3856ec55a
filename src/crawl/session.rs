// src/crawl/session.rs
// =============================================================================
// The crawl loop.
//
// One session = one filter pipeline + one work queue + one pacer, driving a
// single sequential stream of:
//
//   Idle -> Fetching -> (pacing delay) -> page-load hook
//        -> Extracting -> Dispatching -> Idle ... -> Done
//
// Ordering guarantees:
// - the hook runs after the fetch AND the pacing delay, never during a fetch
// - links found on a page are queued in the order they appear
// - a page that fails to load is recorded and skipped; the crawl goes on
//
// The loop ends when the queue is empty, unless `run_forever` is set, in
// which case it waits for URLs sent through a Submitter until cancelled.
//
// Cancellation is checked before each fetch and raced against every await,
// so Ctrl-C stops the crawl between items.
//
// Rust concepts:
// - Generics: the session works with any Browser and any hook
// - tokio::select!: wait on two futures, take whichever finishes first
// - CancellationToken: a cloneable "please stop" flag shared with main
// =============================================================================

use std::fmt;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use super::extract::extract_links;
use super::filter::Pipeline;
use super::pacing::Pacer;
use super::queue::WorkQueue;
use super::report::{CrawlReport, FailedFetch};
use crate::browser::{Browser, Page};
use crate::config::SessionConfig;

/// Called once for every page that loaded, after the pacing delay.
///
/// Any `FnMut(&P)` closure works as a hook.
pub trait PageLoadHook<P> {
    fn on_page_load(&mut self, page: &P);
}

impl<P, F> PageLoadHook<P> for F
where
    F: FnMut(&P),
{
    fn on_page_load(&mut self, page: &P) {
        self(page)
    }
}

/// The default hook: does nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopHook;

impl<P> PageLoadHook<P> for NoopHook {
    fn on_page_load(&mut self, _page: &P) {}
}

/// Hands raw URLs to a running session. They go through the filter
/// pipeline like any extracted link.
#[derive(Debug, Clone)]
pub struct Submitter {
    tx: mpsc::UnboundedSender<String>,
}

impl Submitter {
    // Returns false if the session has already finished
    pub fn submit(&self, url: impl Into<String>) -> bool {
        self.tx.send(url.into()).is_ok()
    }
}

// Where the loop currently is, for trace logs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Idle,
    Fetching,
    Extracting,
    Dispatching,
    Done,
}

impl fmt::Display for LoopState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LoopState::Idle => "idle",
            LoopState::Fetching => "fetching",
            LoopState::Extracting => "extracting",
            LoopState::Dispatching => "dispatching",
            LoopState::Done => "done",
        };
        f.write_str(name)
    }
}

pub struct CrawlSession<B, H = NoopHook> {
    browser: B,
    hook: H,
    pipeline: Pipeline,
    queue: WorkQueue,
    pacer: Pacer,
    run_forever: bool,
    cancel: CancellationToken,
    submissions: mpsc::UnboundedReceiver<String>,
    submitter: Option<Submitter>,
    state: LoopState,
    report: CrawlReport,
}

impl<B: Browser> CrawlSession<B, NoopHook> {
    // Session with the canonical pipeline rooted at `config.root`
    pub fn new(config: &SessionConfig, browser: B) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            browser,
            hook: NoopHook,
            pipeline: Pipeline::canonical(&config.root),
            queue: WorkQueue::new(),
            pacer: Pacer::new(config.base_delay, config.jitter),
            run_forever: config.run_forever,
            cancel: CancellationToken::new(),
            submissions: rx,
            submitter: Some(Submitter { tx }),
            state: LoopState::Idle,
            report: CrawlReport::default(),
        }
    }
}

impl<B, H> CrawlSession<B, H>
where
    B: Browser,
    H: PageLoadHook<B::Page>,
{
    // Replaces the page-load hook
    pub fn with_hook<H2>(self, hook: H2) -> CrawlSession<B, H2>
    where
        H2: PageLoadHook<B::Page>,
    {
        CrawlSession {
            browser: self.browser,
            hook,
            pipeline: self.pipeline,
            queue: self.queue,
            pacer: self.pacer,
            run_forever: self.run_forever,
            cancel: self.cancel,
            submissions: self.submissions,
            submitter: self.submitter,
            state: self.state,
            report: self.report,
        }
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    // A handle for feeding URLs in while the session runs
    //
    // Only useful with run_forever; call it before run().
    pub fn submitter(&self) -> Option<Submitter> {
        self.submitter.clone()
    }

    // Sends a raw URL (typically the seed) through the pipeline
    //
    // Returns true if it was queued
    pub fn submit(&mut self, url: &str) -> bool {
        self.dispatch(url)
    }

    // Runs the crawl to completion (or cancellation)
    pub async fn run(mut self) -> CrawlReport {
        // Keep only the handles given out, so the channel closes when they go
        self.submitter = None;

        let filters: Vec<&str> = self.pipeline.filters().iter().map(|f| f.name()).collect();
        debug!(?filters, queued = self.queue.len(), "crawl starting");

        loop {
            self.enter(LoopState::Idle);
            self.drain_submissions();

            let item = match self.queue.pop() {
                Some(item) => item,
                None if self.run_forever => {
                    if self.wait_for_submission().await {
                        continue;
                    }
                    break;
                }
                None => break,
            };

            if self.cancel.is_cancelled() {
                self.report.cancelled = true;
                break;
            }

            if !self.process(item).await {
                self.report.cancelled = true;
                break;
            }
        }

        self.enter(LoopState::Done);
        self.report.admitted = self.pipeline.admitted();
        self.report.rejected = self.pipeline.rejected();
        if !self.queue.is_empty() {
            debug!(remaining = self.queue.len(), "items left unvisited");
        }
        info!(
            visited = self.report.visited.len(),
            failed = self.report.failed.len(),
            cancelled = self.report.cancelled,
            "crawl finished"
        );
        self.report
    }

    // One full cycle for one item
    //
    // Returns false if the session was cancelled part way through
    async fn process(&mut self, item: String) -> bool {
        self.enter(LoopState::Fetching);
        info!(url = %item, queued = self.queue.len(), "loading");

        let fetched = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => None,
            result = self.browser.load(&item) => Some(result),
        };
        let Some(result) = fetched else {
            return false;
        };

        let delay = self.pacer.next_delay();
        trace!(?delay, "pacing");
        let paced = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => false,
            _ = tokio::time::sleep(delay) => true,
        };

        let page = match result {
            Ok(page) => page,
            Err(e) => {
                warn!(url = %item, error = %e, "failed to load page, skipping");
                self.report.failed.push(FailedFetch {
                    url: item,
                    error: e.to_string(),
                });
                return paced;
            }
        };
        self.report.visited.push(item);
        if !paced {
            return false;
        }

        self.hook.on_page_load(&page);

        self.enter(LoopState::Extracting);
        let links: Vec<String> = extract_links(&page).collect();

        self.enter(LoopState::Dispatching);
        let found = links.len();
        let queued = links.iter().filter(|link| self.dispatch(link)).count();
        debug!(page = page.url(), found, queued, "links dispatched");

        let media = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => None,
            loaded = page.mark_media_for_eager_load() => Some(loaded),
        };
        match media {
            Some(loaded) => {
                self.report.media_loaded += loaded;
                true
            }
            None => false,
        }
    }

    // Admits a raw URL through the pipeline and queues it if accepted
    fn dispatch(&mut self, raw: &str) -> bool {
        match self.pipeline.admit(raw) {
            Some(item) => {
                trace!(url = %item, "queued");
                self.queue.push(item);
                true
            }
            None => false,
        }
    }

    // Pulls in anything submitted since the last iteration
    fn drain_submissions(&mut self) {
        while let Ok(raw) = self.submissions.try_recv() {
            self.dispatch(&raw);
        }
    }

    // Blocks until a submission arrives
    //
    // Returns false only once the session is cancelled. With every Submitter
    // gone nothing new can arrive, but the session stays open until then.
    async fn wait_for_submission(&mut self) -> bool {
        debug!("queue empty, waiting for submissions");
        let received = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => None,
            raw = self.submissions.recv() => Some(raw),
        };
        match received {
            Some(Some(raw)) => {
                self.dispatch(&raw);
                true
            }
            Some(None) => {
                debug!("no submitters left, waiting for cancellation");
                self.cancel.cancelled().await;
                self.report.cancelled = true;
                false
            }
            None => {
                self.report.cancelled = true;
                false
            }
        }
    }

    fn enter(&mut self, state: LoopState) {
        trace!(from = %self.state, to = %state, "state");
        self.state = state;
    }
}
