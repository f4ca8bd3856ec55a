// src/crawl/testing.rs
// In-memory browser for crawl tests. Pages are a map from URL to the hrefs
// found on them; `None` hrefs model elements that vanish before being read.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;

use crate::browser::{Browser, Page};
use crate::error::FetchError;

#[derive(Debug, Clone)]
pub struct FakePage {
    url: String,
    hrefs: Vec<Option<String>>,
    media: usize,
}

impl FakePage {
    pub fn new(url: &str, hrefs: Vec<Option<&str>>) -> Self {
        Self {
            url: url.to_string(),
            hrefs: hrefs.into_iter().map(|h| h.map(str::to_string)).collect(),
            media: 0,
        }
    }
}

#[async_trait]
impl Page for FakePage {
    type Element = usize;

    fn url(&self) -> &str {
        &self.url
    }

    fn href_elements(&self) -> Vec<usize> {
        (0..self.hrefs.len()).collect()
    }

    fn read_href(&self, element: &usize) -> Option<String> {
        self.hrefs.get(*element).cloned().flatten()
    }

    async fn mark_media_for_eager_load(&self) -> usize {
        self.media
    }
}

// `in_flight` is non-zero while a load is in progress
#[derive(Debug, Default)]
pub struct FakeBrowser {
    pages: HashMap<String, FakePage>,
    pub in_flight: Arc<AtomicUsize>,
}

impl FakeBrowser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn page(mut self, url: &str, hrefs: &[&str]) -> Self {
        let hrefs = hrefs.iter().map(|h| Some(*h)).collect();
        self.pages.insert(url.to_string(), FakePage::new(url, hrefs));
        self
    }

    pub fn insert(mut self, page: FakePage) -> Self {
        self.pages.insert(page.url.clone(), page);
        self
    }

    pub fn page_with_media(mut self, url: &str, hrefs: &[&str], media: usize) -> Self {
        let hrefs = hrefs.iter().map(|h| Some(*h)).collect();
        let mut page = FakePage::new(url, hrefs);
        page.media = media;
        self.pages.insert(url.to_string(), page);
        self
    }
}

#[async_trait]
impl Browser for FakeBrowser {
    type Page = FakePage;

    async fn load(&self, url: &str) -> Result<FakePage, FetchError> {
        self.in_flight.fetch_add(1, Ordering::SeqCst);
        tokio::task::yield_now().await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        self.pages.get(url).cloned().ok_or_else(|| FetchError::Status {
            url: url.to_string(),
            status: 404,
        })
    }
}
