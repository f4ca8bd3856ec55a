// src/browser/mod.rs
// =============================================================================
// The browser layer: whatever actually loads a URL and gives us back a page
// we can query.
//
// The crawl loop only talks to the two traits below, so it doesn't care
// whether pages come from a real browser, a plain HTTP client, or a fake
// used in tests.
//
// Submodules:
// - http: HttpBrowser, loads pages with reqwest and queries them with scraper
//
// Rust concepts:
// - Traits with associated types: each browser decides what its page and
//   element handles look like
// - async-trait: lets traits have async methods
// =============================================================================

mod http;

use async_trait::async_trait;

use crate::error::FetchError;

pub use http::{HttpBrowser, HttpPage};

/// Loads pages.
#[async_trait]
pub trait Browser: Send + Sync {
    type Page: Page;

    /// Navigates to `url` and returns the loaded page.
    ///
    /// May take arbitrarily long (network + render).
    async fn load(&self, url: &str) -> Result<Self::Page, FetchError>;
}

/// A loaded page.
#[async_trait]
pub trait Page: Send + Sync {
    /// Handle to one element that carries an `href` attribute.
    type Element: Send;

    /// URL of the page as loaded (after redirects).
    fn url(&self) -> &str;

    /// Every element on the page exposing an `href`, in document order.
    fn href_elements(&self) -> Vec<Self::Element>;

    /// Reads the absolute `href` of an element.
    ///
    /// Returns `None` if the element went away or its value can't be read.
    /// Callers should skip that element and keep going.
    fn read_href(&self, element: &Self::Element) -> Option<String>;

    /// Makes every `<video>`/`<audio>` on the page load its media eagerly so
    /// the archiving proxy records it. Returns how many resources were
    /// loaded; failures are logged by the implementation.
    async fn mark_media_for_eager_load(&self) -> usize;
}
