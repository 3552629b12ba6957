use std::sync::{Arc, Mutex};

use anyhow::anyhow;
use reqwest::header::CONTENT_TYPE;
use sitecheck_spider::graph::{Counters, SiteGraph};
use sitecheck_spider::processors::{HeaderProcessor, TreeProcessor};
use sitecheck_spider::urls;
use std::collections::HashSet;
use url::Url;

use crate::report::{Severity, SiteReport};

/// Header processor that sorts fetched URLs into pages vs media. We
/// can't tell from a link alone whether it points at a page or a media
/// file, so this waits for the response and goes by Content-Type.
pub fn content_type_accounting(report: Arc<Mutex<SiteReport>>) -> HeaderProcessor {
    Arc::new(move |url, headers| {
        let Some(content_type) = headers.get(CONTENT_TYPE).and_then(|v| v.to_str().ok()) else {
            return Ok(());
        };

        let mut report = report.lock().map_err(|_| anyhow!("report lock poisoned"))?;
        if content_type.starts_with("text/html") {
            report.pages.insert(url.to_string());
        } else {
            report.media.insert(url.to_string());
        }
        Ok(())
    })
}

/// Tree processor that accounts for references whose role is already
/// clear from the tag that carried them, before they are ever fetched.
pub fn resource_accounting(report: Arc<Mutex<SiteReport>>) -> TreeProcessor {
    Arc::new(move |_url, tree| {
        let mut report = report.lock().map_err(|_| anyhow!("report lock poisoned"))?;
        for link in &tree.links {
            match link.tag {
                "link" | "script" => {
                    report.resources.insert(link.url.to_string());
                }
                "img" | "embed" | "object" | "audio" | "video" => {
                    report.media.insert(link.url.to_string());
                }
                _ => {}
            }
        }
        Ok(())
    })
}

/// Post-run pass over the site graph: every page that answered with an
/// error status or could not be fetched at all is filed under the pages
/// that link to it.
pub fn report_broken_links(
    graph: &SiteGraph,
    allowed_hosts: &HashSet<String>,
    report: &mut SiteReport,
) {
    for (url, record) in graph.iter() {
        if !record.is_broken() {
            continue;
        }

        let internal = Url::parse(url)
            .ok()
            .and_then(|parsed| urls::host_key(&parsed))
            .is_some_and(|host| allowed_hosts.contains(&host));
        let category = if internal {
            "Bad links (internal)"
        } else {
            "Bad links (external)"
        };

        let title = match (record.status, &record.error) {
            (_, Some(error)) => format!("{url} ({error})"),
            (Some(status), None) => format!("{url} (HTTP {status})"),
            (None, None) => unreachable!("broken record without status or error"),
        };

        if record.referrers.is_empty() {
            // A broken seed has nobody pointing at it but still belongs
            // in the report.
            report.add(Severity::Error, category, &title, url, None);
        } else {
            for referrer in &record.referrers {
                report.add(Severity::Error, category, &title, referrer, None);
            }
        }
    }
}

/// Informational totals entry for the finished run.
pub fn report_run_summary(counters: &Counters, seeds: &[String], report: &mut SiteReport) {
    let title = format!(
        "Retrieved {} URLs ({} errors)",
        counters.processed, counters.errors
    );
    for seed in seeds {
        report.add(Severity::Info, "Crawl", &title, seed, None);
    }
}
