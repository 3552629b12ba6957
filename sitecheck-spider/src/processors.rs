use std::sync::Arc;

use reqwest::header::HeaderMap;
use scraper::Html;

use crate::links::ExtractedLink;

/// Parsed page handed to tree processors: the DOM plus every reference
/// found in it, absolutized and classified. Processors run in
/// registration order and may mutate it for the processors after them.
pub struct PageTree {
    pub document: Html,
    pub links: Vec<ExtractedLink>,
}

/// Called with `(url, headers)` for every HTML page before the body is
/// decoded. An error aborts the whole run: processors are trusted
/// configuration, not crawl data.
pub type HeaderProcessor = Arc<dyn Fn(&str, &HeaderMap) -> anyhow::Result<()> + Send + Sync>;

/// Called with `(url, html)` after decoding. Returning `Some` of a
/// non-empty string replaces the working text for all later processors
/// and for parsing; `None` leaves it unchanged. An error aborts the run.
pub type HtmlProcessor = Arc<dyn Fn(&str, &str) -> anyhow::Result<Option<String>> + Send + Sync>;

/// Called with `(url, tree)` after link processing. An error aborts the
/// run.
pub type TreeProcessor = Arc<dyn Fn(&str, &mut PageTree) -> anyhow::Result<()> + Send + Sync>;

/// Observational progress hook: `(processed, queued, url)` as each
/// response is taken off the wire.
pub type ProgressCallback = Arc<dyn Fn(u64, u64, &str) + Send + Sync>;
