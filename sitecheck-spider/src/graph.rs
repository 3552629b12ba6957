use std::collections::{BTreeSet, HashMap};
use std::time::Duration;

use serde::Serialize;

/// Everything we know about one canonical URL: last response status and
/// latency, who linked here, and what this page links to. Created on
/// first reference (seed or discovered link), updated in place, never
/// deleted.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PageRecord {
    pub status: Option<u16>,
    pub elapsed: Option<Duration>,
    pub content_type: Option<String>,
    /// Transport or decode failure message, when the fetch went wrong in
    /// a way a status code can't express.
    pub error: Option<String>,
    pub referrers: BTreeSet<String>,
    pub links: BTreeSet<String>,
}

impl PageRecord {
    /// A page that was fetched and answered with an error status, or
    /// could not be fetched or decoded at all.
    pub fn is_broken(&self) -> bool {
        self.error.is_some() || self.status.is_some_and(|s| s >= 400)
    }
}

/// Append-only map from canonical URL to its crawl facts. Written only by
/// the response pipeline, which runs serialized; readers get at it after
/// (or between) pipeline executions, so no locking lives here.
#[derive(Debug, Default)]
pub struct SiteGraph {
    pages: HashMap<String, PageRecord>,
}

impl SiteGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ensure a record exists for `url`, creating an empty one on first
    /// reference.
    pub fn touch(&mut self, url: &str) -> &mut PageRecord {
        self.pages.entry(url.to_string()).or_default()
    }

    pub fn record_response(&mut self, url: &str, status: u16, elapsed: Duration) {
        let record = self.touch(url);
        record.status = Some(status);
        record.elapsed = Some(elapsed);
    }

    pub fn record_error(&mut self, url: &str, message: impl Into<String>) {
        self.touch(url).error = Some(message.into());
    }

    pub fn record_content_type(&mut self, url: &str, content_type: &str) {
        self.touch(url).content_type = Some(content_type.to_string());
    }

    /// Forward edge: `from` links to `to`. Recorded for every discovered
    /// reference, whatever its host or scheme.
    pub fn record_link(&mut self, from: &str, to: &str) {
        self.touch(from).links.insert(to.to_string());
    }

    /// Reverse edge: `url` was linked from `referrer`.
    pub fn record_referrer(&mut self, url: &str, referrer: &str) {
        self.touch(url).referrers.insert(referrer.to_string());
    }

    pub fn get(&self, url: &str) -> Option<&PageRecord> {
        self.pages.get(url)
    }

    pub fn contains(&self, url: &str) -> bool {
        self.pages.contains_key(url)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &PageRecord)> {
        self.pages.iter()
    }

    pub fn len(&self) -> usize {
        self.pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }
}

/// Run totals. `processed <= queued` holds at all times; the run is over
/// exactly when they are equal and nothing in flight can queue more.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct Counters {
    pub queued: u64,
    pub processed: u64,
    pub errors: u64,
}

impl Counters {
    pub fn complete(&self) -> bool {
        self.processed == self.queued
    }
}
