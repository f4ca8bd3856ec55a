// src/crawl/filter.rs
// =============================================================================
// The admission pipeline every candidate URL goes through before it may be
// queued.
//
// A pipeline is an ordered list of filters. Each filter can:
// - pass the URL through unchanged
// - rewrite it (strip the query string, strip the fragment)
// - reject it, which stops the pipeline for that URL
//
// Order is chosen by the caller. The usual order is:
//   strip query -> strip fragment -> scope check -> dedup
//
// Dedup MUST be last: it records the URL as seen, so it has to see the final
// normalized spelling. If it ran before the normalizers, "page?a=1" and
// "page" would both get queued.
//
// Rust concepts:
// - Enums with data: each filter variant carries only what it needs
// - &mut self: only the dedup filter mutates, but admit() needs unique access
// - Option<String>: None means "rejected", which is not an error
// =============================================================================

use std::collections::HashSet;

use tracing::trace;

// One step of the pipeline
#[derive(Debug, Clone)]
pub enum Filter {
    /// Drops everything from the first '?' on
    StripQuery,
    /// Drops everything from the first '#' on
    StripFragment,
    /// Rejects anything that doesn't start with the root prefix
    NoParent { root: String },
    /// Rejects anything already admitted during this session
    Dedup(DedupSet),
}

impl Filter {
    // Name used in trace logs when this filter rejects something
    pub fn name(&self) -> &'static str {
        match self {
            Filter::StripQuery => "no_querystring",
            Filter::StripFragment => "remove_fragment",
            Filter::NoParent { .. } => "no_parent",
            Filter::Dedup(_) => "session_dedupe",
        }
    }

    // Applies this single filter
    //
    // Returns Some(url) to continue (possibly rewritten), None to reject
    pub fn apply(&mut self, item: String) -> Option<String> {
        match self {
            Filter::StripQuery => Some(strip_query(&item).to_string()),
            Filter::StripFragment => Some(strip_fragment(&item).to_string()),
            Filter::NoParent { root } => {
                if item.starts_with(root.as_str()) && !has_dot_segment(&item) {
                    Some(item)
                } else {
                    None
                }
            }
            Filter::Dedup(seen) => {
                if seen.insert(&item) {
                    Some(item)
                } else {
                    None
                }
            }
        }
    }
}

// Everything before the first '?'
pub fn strip_query(url: &str) -> &str {
    url.split('?').next().unwrap_or(url)
}

// Everything before the first '#'
pub fn strip_fragment(url: &str) -> &str {
    url.split('#').next().unwrap_or(url)
}

// True if the path part contains a ".." segment, percent-encoded or not
//
// "https://site/docs/../admin" starts with "https://site/docs/" but the
// browser will load "https://site/admin", which is above the root. URL
// parsers treat "%2e%2e" (any case, either dot) the same way.
fn has_dot_segment(url: &str) -> bool {
    let path = match url.find("://") {
        Some(idx) => &url[idx + 3..],
        None => url,
    };
    path.split(['/', '?', '#']).any(is_parent_segment)
}

fn is_parent_segment(segment: &str) -> bool {
    matches!(
        segment.to_ascii_lowercase().as_str(),
        ".." | ".%2e" | "%2e." | "%2e%2e"
    )
}

// Set of canonical URLs admitted so far in a session
//
// Keys are only ever added, never removed.
#[derive(Debug, Clone, Default)]
pub struct DedupSet {
    seen: HashSet<String>,
}

impl DedupSet {
    pub fn new() -> Self {
        Self::default()
    }

    // Returns true if the URL was not seen before (and records it)
    pub fn insert(&mut self, url: &str) -> bool {
        if self.seen.contains(url) {
            return false;
        }
        self.seen.insert(url.to_string())
    }
}

// The ordered filter chain plus admission counters
#[derive(Debug, Clone, Default)]
pub struct Pipeline {
    filters: Vec<Filter>,
    admitted: usize,
    rejected: usize,
}

impl Pipeline {
    // An empty pipeline admits everything
    pub fn new() -> Self {
        Self::default()
    }

    // The standard chain for capturing everything under `root`
    pub fn canonical(root: &str) -> Self {
        Self::new()
            .no_querystring()
            .remove_fragment()
            .no_parent(root)
            .session_dedupe()
    }

    pub fn push(mut self, filter: Filter) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn no_querystring(self) -> Self {
        self.push(Filter::StripQuery)
    }

    pub fn remove_fragment(self) -> Self {
        self.push(Filter::StripFragment)
    }

    // Prevents the crawl from going above `root`
    pub fn no_parent(self, root: &str) -> Self {
        self.push(Filter::NoParent {
            root: root.to_string(),
        })
    }

    // Should be the last filter registered
    pub fn session_dedupe(self) -> Self {
        self.push(Filter::Dedup(DedupSet::new()))
    }

    // Runs `item` through every filter in order
    //
    // Returns the canonical URL if admitted. A rejecting filter stops the
    // chain, so later filters (including dedup) never see the item.
    pub fn admit(&mut self, item: &str) -> Option<String> {
        let mut current = item.to_string();
        for filter in self.filters.iter_mut() {
            match filter.apply(current) {
                Some(next) => current = next,
                None => {
                    trace!(url = item, filter = filter.name(), "rejected");
                    self.rejected += 1;
                    return None;
                }
            }
        }
        self.admitted += 1;
        Some(current)
    }

    pub fn filters(&self) -> &[Filter] {
        &self.filters
    }

    pub fn admitted(&self) -> usize {
        self.admitted
    }

    pub fn rejected(&self) -> usize {
        self.rejected
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dedup_len(pipeline: &Pipeline) -> usize {
        pipeline
            .filters()
            .iter()
            .find_map(|f| match f {
                Filter::Dedup(set) => Some(set.seen.len()),
                _ => None,
            })
            .unwrap()
    }

    #[test]
    fn test_strip_query_is_idempotent() {
        for url in [
            "https://site/a?x=1",
            "https://site/a?x=1?y=2",
            "https://site/a",
            "?only",
            "",
        ] {
            assert_eq!(strip_query(strip_query(url)), strip_query(url));
        }
    }

    #[test]
    fn test_strip_query_drops_trailing_fragment_too() {
        assert_eq!(strip_query("https://site/a?x=1#top"), "https://site/a");
    }

    #[test]
    fn test_strip_fragment() {
        assert_eq!(strip_fragment("https://site/a#top"), "https://site/a");
        assert_eq!(strip_fragment("https://site/a"), "https://site/a");
    }

    #[test]
    fn test_no_parent_rejects_other_prefix() {
        let mut pipeline = Pipeline::new().no_parent("https://site/docs/");
        assert_eq!(
            pipeline.admit("https://site/docs/intro"),
            Some("https://site/docs/intro".to_string())
        );
        assert_eq!(pipeline.admit("https://site/blog"), None);
        assert_eq!(pipeline.admit("https://other/docs/intro"), None);
        assert_eq!(pipeline.admit("mailto:someone@site"), None);
    }

    #[test]
    fn test_no_parent_rejects_dot_segments() {
        let mut pipeline = Pipeline::new().no_parent("https://site/docs/");
        assert_eq!(pipeline.admit("https://site/docs/../admin"), None);
        assert_eq!(pipeline.admit("https://site/docs/.."), None);
        // ".." inside a name is not a segment
        assert!(pipeline.admit("https://site/docs/a..b").is_some());
    }

    #[test]
    fn test_no_parent_rejects_encoded_dot_segments() {
        let mut pipeline = Pipeline::new().no_parent("https://site/docs/");
        for url in [
            "https://site/docs/%2e%2e/admin",
            "https://site/docs/%2E%2E/admin",
            "https://site/docs/.%2e/admin",
            "https://site/docs/%2e./admin",
            "https://site/docs/%2E.",
        ] {
            assert_eq!(pipeline.admit(url), None, "{} should be out of scope", url);
        }
        // A single encoded dot is the current directory, not the parent
        assert!(pipeline.admit("https://site/docs/%2e/page").is_some());
        assert!(pipeline.admit("https://site/docs/%2e%2e%2e").is_some());
    }

    #[test]
    fn test_dedup_collapses_spellings() {
        let mut pipeline = Pipeline::canonical("https://site/");
        assert_eq!(
            pipeline.admit("https://site/b?x=1"),
            Some("https://site/b".to_string())
        );
        assert_eq!(pipeline.admit("https://site/b"), None);
        assert_eq!(pipeline.admit("https://site/b#part"), None);
        assert_eq!(pipeline.admit("https://site/b?y=2#part"), None);
        assert_eq!(pipeline.admitted(), 1);
        assert_eq!(pipeline.rejected(), 3);
    }

    #[test]
    fn test_rejection_short_circuits_dedup() {
        let mut pipeline = Pipeline::canonical("https://site/");
        assert_eq!(pipeline.admit("https://elsewhere/x"), None);
        assert_eq!(dedup_len(&pipeline), 0);
        assert!(pipeline.admit("https://site/x").is_some());
        assert_eq!(dedup_len(&pipeline), 1);
    }

    #[test]
    fn test_dedup_before_normalizers_lets_duplicates_through() {
        // Wrong order on purpose: shows why dedup belongs last
        let mut pipeline = Pipeline::new().session_dedupe().no_querystring();
        assert_eq!(pipeline.admit("https://site/b?x=1"), Some("https://site/b".to_string()));
        assert_eq!(pipeline.admit("https://site/b"), Some("https://site/b".to_string()));
    }

    #[test]
    fn test_accepted_items_stay_in_scope() {
        let root = "https://site/";
        let mut pipeline = Pipeline::canonical(root);
        let candidates = [
            "https://site/a",
            "http://site/a",
            "https://site.evil/a",
            "https://site/../c",
            "https://site/a/b?q#f",
            "/relative",
        ];
        for candidate in candidates {
            if let Some(accepted) = pipeline.admit(candidate) {
                assert!(accepted.starts_with(root), "{accepted} escaped scope");
            }
        }
    }

    #[test]
    fn test_seed_then_first_page_links() {
        let mut pipeline = Pipeline::canonical("https://site/");
        assert!(pipeline.admit("https://site/a").is_some());

        let admitted: Vec<String> = [
            "https://site/b?x=1",
            "https://site/b",
            "https://site/../c",
            "https://site/a#frag",
        ]
        .iter()
        .filter_map(|link| pipeline.admit(link))
        .collect();

        assert_eq!(admitted, vec!["https://site/b".to_string()]);
    }

    #[test]
    fn test_empty_pipeline_admits_everything() {
        let mut pipeline = Pipeline::new();
        assert_eq!(pipeline.admit("anything"), Some("anything".to_string()));
        assert_eq!(pipeline.admit("anything"), Some("anything".to_string()));
    }
}
