use std::collections::BTreeMap;

use sitecheck_spider::graph::{Counters, PageRecord, SiteGraph};
use url::Url;

/// Path component of a URL, with "/" standing in for an empty path.
pub fn url_path(url: &str) -> String {
    Url::parse(url)
        .ok()
        .map(|parsed| {
            let path = parsed.path().to_string();
            if path.is_empty() {
                "/".to_string()
            } else {
                path
            }
        })
        .unwrap_or_else(|| url.to_string())
}

fn status_colored(status: u16) -> String {
    match status {
        100..=199 => format!("\x1b[37m{status}\x1b[0m"),
        200..=299 => format!("\x1b[32m{status}\x1b[0m"),
        300..=399 => format!("\x1b[36m{status}\x1b[0m"),
        400..=499 => format!("\x1b[33m{status}\x1b[0m"),
        500..=599 => format!("\x1b[31m{status}\x1b[0m"),
        _ => status.to_string(),
    }
}

fn record_line(url: &str, record: &PageRecord) -> String {
    let mut line = match (record.status, &record.error) {
        (_, Some(error)) => format!("  \x1b[31mERR\x1b[0m {} ({error})", url_path(url)),
        (Some(status), None) => format!("  {} {}", status_colored(status), url_path(url)),
        // Discovered but never fetched (offsite, skipped, or aborted run).
        (None, None) => format!("  --- {}", url_path(url)),
    };

    if let Some(content_type) = &record.content_type
        && !content_type.starts_with("text/html")
    {
        line.push_str(&format!(" \x1b[90m{content_type}\x1b[0m"));
    }

    line
}

/// Human-readable status map of a finished crawl, grouped by host.
pub fn crawl_summary(graph: &SiteGraph, counters: &Counters) -> String {
    let mut report = String::new();
    report.push_str("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━\n\n");
    report.push_str("# Summary:\n");
    report.push_str(&format!("  URLs discovered: {}\n", graph.len()));
    report.push_str(&format!("  URLs retrieved:  {}\n", counters.processed));
    report.push_str(&format!("  Errors:          {}\n", counters.errors));
    report.push_str("\n━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━\n\n");

    // Group by host; BTreeMap keeps hosts and paths in stable order.
    let mut by_host: BTreeMap<String, BTreeMap<&String, &PageRecord>> = BTreeMap::new();
    for (url, record) in graph.iter() {
        let host = Url::parse(url)
            .ok()
            .and_then(|parsed| parsed.host_str().map(str::to_string))
            .unwrap_or_else(|| "unknown".to_string());
        by_host.entry(host).or_default().insert(url, record);
    }

    for (host, records) in &by_host {
        report.push_str(&format!("## {host}\n"));
        report.push_str(&format!("  {} URLs\n\n", records.len()));

        for (url, record) in records {
            report.push_str(&record_line(url, record));
            report.push('\n');
        }
        report.push('\n');
    }

    report
}
