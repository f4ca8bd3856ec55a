// src/crawl/extract.rs
// =============================================================================
// Link extraction: turns a loaded page into candidate URLs for the pipeline.
//
// Elements are read one at a time. If an element can't be read (in a live
// browser the DOM may change between listing the elements and reading one
// of them), we log it and carry on with the rest of the page.
// =============================================================================

use tracing::warn;

use crate::browser::Page;

// Lazily yields the href of every link on `page`, in document order
pub fn extract_links<'a, P>(page: &'a P) -> impl Iterator<Item = String> + 'a
where
    P: Page,
    P::Element: 'a,
{
    page.href_elements()
        .into_iter()
        .enumerate()
        .filter_map(move |(index, element)| match page.read_href(&element) {
            Some(href) => Some(href),
            None => {
                warn!(
                    page = page.url(),
                    element = index,
                    "element disappeared before its href was read"
                );
                None
            }
        })
}
