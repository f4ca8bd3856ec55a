// src/browser/http.rs
// =============================================================================
// A browser built from an HTTP client and an HTML parser.
//
// - reqwest loads the page (through the archiving proxy when one is running)
// - scraper parses the HTML and finds elements with CSS selectors
// - url resolves relative hrefs against the page URL, like a browser's
//   `element.href` property does
//
// When a proxy port is given, every request (pages AND media) goes through
// it, which is how the archiver sees the traffic. warcprox re-signs HTTPS
// with its own CA, so certificate checks are turned off in that mode.
//
// Only HTML responses are kept in memory. Anything else (binaries, video
// and so on) is read to the end in chunks so the proxy records it, then thrown
// away; such a page has no links.
//
// Rust concepts:
// - scraper::Html is not Send, so it's parsed inside small sync helpers and
//   dropped before any .await
// - Streams: For fetching media with a concurrency limit
// =============================================================================

use std::collections::HashSet;
use std::time::Duration;

use async_trait::async_trait;
use futures::stream::{self, StreamExt}; // StreamExt gives us .buffer_unordered()
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, Response};
use scraper::{Html, Selector};
use tracing::{debug, warn};
use url::Url;

use super::{Browser, Page};
use crate::error::{FetchError, SetupError};

const USER_AGENT: &str = concat!("bget/", env!("CARGO_PKG_VERSION"));
const PAGE_TIMEOUT: Duration = Duration::from_secs(30);
const MEDIA_CONCURRENCY: usize = 4;

const LINK_SELECTOR: &str = "a[href]";
const MEDIA_SELECTOR: &str =
    "video[src], audio[src], video source[src], audio source[src]";

#[derive(Debug, Clone)]
pub struct HttpBrowser {
    client: Client,
}

impl HttpBrowser {
    // Builds the client, routed through 127.0.0.1:<proxy_port> if given
    pub fn new(proxy_port: Option<u16>) -> Result<Self, SetupError> {
        let mut builder = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(PAGE_TIMEOUT)
            .redirect(reqwest::redirect::Policy::limited(10));

        if let Some(port) = proxy_port {
            let proxy = reqwest::Proxy::all(format!("http://127.0.0.1:{}", port))
                .map_err(SetupError::Client)?;
            builder = builder.proxy(proxy).danger_accept_invalid_certs(true);
        }

        let client = builder.build().map_err(SetupError::Client)?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Browser for HttpBrowser {
    type Page = HttpPage;

    async fn load(&self, url: &str) -> Result<HttpPage, FetchError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|source| FetchError::Request {
                url: url.to_string(),
                source,
            })?;

        if !response.status().is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: response.status().as_u16(),
            });
        }

        // Links on a redirected page are relative to where we ended up
        let final_url = response.url().to_string();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);

        let body_error = |source| FetchError::Body {
            url: url.to_string(),
            source,
        };
        let html = if is_html(content_type.as_deref()) {
            response.text().await.map_err(body_error)?
        } else {
            let size = drain(response).await.map_err(body_error)?;
            debug!(url, content_type = ?content_type, size, "not HTML, skipping link extraction");
            String::new()
        };

        Ok(HttpPage {
            url: final_url,
            html,
            client: self.client.clone(),
        })
    }
}

// A page loaded by HttpBrowser
#[derive(Debug, Clone)]
pub struct HttpPage {
    url: String,
    html: String,
    client: Client,
}

// The raw attribute value of one href element
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HrefElement {
    raw: String,
}

impl HttpPage {
    // Wraps already-fetched HTML
    #[cfg(test)]
    pub fn from_html(url: &str, html: &str, client: Client) -> Self {
        Self {
            url: url.to_string(),
            html: html.to_string(),
            client,
        }
    }

    // Absolute URLs of every media resource on the page
    fn media_sources(&self) -> Vec<String> {
        let document = Html::parse_document(&self.html);
        // Constant selector, known to be valid
        let selector = Selector::parse(MEDIA_SELECTOR).unwrap();

        // First occurrence wins, so each source is fetched once
        let mut seen = HashSet::new();
        document
            .select(&selector)
            .filter_map(|element| element.value().attr("src"))
            .filter_map(|src| resolve_href(&self.url, src))
            .filter(|src| seen.insert(src.clone()))
            .collect()
    }
}

#[async_trait]
impl Page for HttpPage {
    type Element = HrefElement;

    fn url(&self) -> &str {
        &self.url
    }

    fn href_elements(&self) -> Vec<HrefElement> {
        let document = Html::parse_document(&self.html);
        // Constant selector, known to be valid
        let selector = Selector::parse(LINK_SELECTOR).unwrap();

        document
            .select(&selector)
            .filter_map(|element| element.value().attr("href"))
            .map(|raw| HrefElement {
                raw: raw.to_string(),
            })
            .collect()
    }

    fn read_href(&self, element: &HrefElement) -> Option<String> {
        resolve_href(&self.url, &element.raw)
    }

    async fn mark_media_for_eager_load(&self) -> usize {
        let sources = self.media_sources();
        if sources.is_empty() {
            return 0;
        }
        debug!(page = %self.url, count = sources.len(), "preloading media");

        let fetches = sources.into_iter().map(|src| {
            let client = self.client.clone();
            async move { preload(&client, &src).await }
        });

        let results: Vec<bool> = stream::iter(fetches)
            .buffer_unordered(MEDIA_CONCURRENCY)
            .collect()
            .await;
        results.into_iter().filter(|loaded| *loaded).count()
    }
}

// Downloads a media resource fully so the proxy records all of it
async fn preload(client: &Client, src: &str) -> bool {
    let response = match client.get(src).send().await {
        Ok(response) => response,
        Err(e) => {
            warn!(url = src, error = %e, "media request failed");
            return false;
        }
    };
    if !response.status().is_success() {
        warn!(url = src, status = response.status().as_u16(), "media not available");
        return false;
    }
    match drain(response).await {
        Ok(_) => true,
        Err(e) => {
            warn!(url = src, error = %e, "media download interrupted");
            false
        }
    }
}

// Reads a body to the end without holding on to it; returns its size
async fn drain(mut response: Response) -> Result<u64, reqwest::Error> {
    let mut size = 0;
    while let Some(chunk) = response.chunk().await? {
        size += chunk.len() as u64;
    }
    Ok(size)
}

// Whether a Content-Type is worth parsing for links
//
// A missing header is treated as HTML, like browsers sniffing a page.
fn is_html(content_type: Option<&str>) -> bool {
    let Some(content_type) = content_type else {
        return true;
    };
    let mime = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    mime == "text/html" || mime == "application/xhtml+xml"
}

// Resolves a possibly-relative href against the page URL
//
// Examples:
//   base = "https://example.com/page"
//   href = "/docs" -> Some("https://example.com/docs")
//   href = "#top" -> Some("https://example.com/page#top")
//   href = "http://[broken" -> None
fn resolve_href(base: &str, href: &str) -> Option<String> {
    let base = Url::parse(base).ok()?;
    base.join(href.trim()).ok().map(|url| url.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(url: &str, html: &str) -> HttpPage {
        HttpPage::from_html(url, html, Client::new())
    }

    fn links(page: &HttpPage) -> Vec<Option<String>> {
        page.href_elements()
            .iter()
            .map(|element| page.read_href(element))
            .collect()
    }

    #[test]
    fn test_resolves_relative_and_fragment_links() {
        let page = page(
            "https://example.com/page",
            r##"<a href="/docs">Docs</a><a href="#top">Top</a><a href="https://other.org">x</a>"##,
        );
        assert_eq!(
            links(&page),
            vec![
                Some("https://example.com/docs".to_string()),
                Some("https://example.com/page#top".to_string()),
                Some("https://other.org/".to_string()),
            ]
        );
    }

    #[test]
    fn test_unresolvable_href_reads_as_none() {
        let page = page("https://example.com/", r#"<a href="http://[broken">bad</a>"#);
        assert_eq!(page.href_elements().len(), 1);
        assert_eq!(links(&page), vec![None]);
    }

    #[test]
    fn test_anchor_without_href_is_not_an_element() {
        let page = page("https://example.com/", r#"<a name="x">no link</a><p>text</p>"#);
        assert!(page.href_elements().is_empty());
    }

    #[test]
    fn test_media_sources() {
        let page = page(
            "https://example.com/watch/",
            r#"
                <video src="clip.mp4"></video>
                <audio><source src="/sound.ogg"></audio>
                <img src="ignored.png">
            "#,
        );
        assert_eq!(
            page.media_sources(),
            vec![
                "https://example.com/watch/clip.mp4".to_string(),
                "https://example.com/sound.ogg".to_string(),
            ]
        );
    }

    #[test]
    fn test_repeated_media_source_listed_once() {
        let page = page(
            "https://example.com/",
            r#"
                <video src="/a.mp4"></video>
                <audio src="/b.ogg"></audio>
                <video><source src="a.mp4"></video>
            "#,
        );
        assert_eq!(
            page.media_sources(),
            vec![
                "https://example.com/a.mp4".to_string(),
                "https://example.com/b.ogg".to_string(),
            ]
        );
    }

    #[test]
    fn test_only_html_content_types_are_parsed() {
        assert!(is_html(Some("text/html")));
        assert!(is_html(Some("text/html; charset=utf-8")));
        assert!(is_html(Some("Text/HTML")));
        assert!(is_html(Some("application/xhtml+xml")));
        assert!(is_html(None));

        assert!(!is_html(Some("application/octet-stream")));
        assert!(!is_html(Some("video/mp4")));
        assert!(!is_html(Some("application/pdf")));
        assert!(!is_html(Some("text/plain")));
    }

    #[test]
    fn test_non_html_page_has_no_links() {
        let page = page("https://example.com/file.bin", "");
        assert!(page.href_elements().is_empty());
    }

    #[tokio::test]
    async fn test_page_without_media_loads_nothing() {
        let page = page("https://example.com/", r#"<a href="/a">a</a>"#);
        assert_eq!(page.mark_media_for_eager_load().await, 0);
    }

    #[test]
    fn test_browser_builds_with_and_without_proxy() {
        assert!(HttpBrowser::new(None).is_ok());
        assert!(HttpBrowser::new(Some(32768)).is_ok());
    }
}
