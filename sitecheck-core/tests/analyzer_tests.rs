// Tests for the built-in analyzers

use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use scraper::Html;
use sitecheck_core::analyzers::{
    content_type_accounting, report_broken_links, report_run_summary, resource_accounting,
};
use sitecheck_core::report::{Severity, SiteReport};
use sitecheck_spider::graph::{Counters, SiteGraph};
use sitecheck_spider::links::{ExtractedLink, LinkKind};
use sitecheck_spider::processors::PageTree;
use url::Url;

fn shared_report() -> Arc<Mutex<SiteReport>> {
    Arc::new(Mutex::new(SiteReport::new("test")))
}

#[test]
fn content_type_accounting_sorts_pages_from_media() {
    let report = shared_report();
    let processor = content_type_accounting(report.clone());

    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("text/html; charset=utf-8"));
    processor("http://a/page", &headers).unwrap();

    headers.insert(CONTENT_TYPE, HeaderValue::from_static("image/png"));
    processor("http://a/logo.png", &headers).unwrap();

    let report = report.lock().unwrap();
    assert!(report.pages.contains("http://a/page"));
    assert!(report.media.contains("http://a/logo.png"));
    assert!(report.resources.is_empty());
}

#[test]
fn content_type_accounting_ignores_headerless_responses() {
    let report = shared_report();
    let processor = content_type_accounting(report.clone());

    processor("http://a/mystery", &HeaderMap::new()).unwrap();

    let report = report.lock().unwrap();
    assert!(report.pages.is_empty());
    assert!(report.media.is_empty());
}

#[test]
fn resource_accounting_files_by_tag() {
    let report = shared_report();
    let processor = resource_accounting(report.clone());

    let links = vec![
        ExtractedLink {
            tag: "link",
            url: Url::parse("http://a/s.css").unwrap(),
            kind: LinkKind::Resource,
        },
        ExtractedLink {
            tag: "script",
            url: Url::parse("http://a/app.js").unwrap(),
            kind: LinkKind::Resource,
        },
        ExtractedLink {
            tag: "img",
            url: Url::parse("http://a/i.png").unwrap(),
            kind: LinkKind::Media,
        },
        ExtractedLink {
            tag: "a",
            url: Url::parse("http://a/p2").unwrap(),
            kind: LinkKind::Page,
        },
    ];
    let mut tree = PageTree {
        document: Html::parse_document("<html></html>"),
        links,
    };
    processor("http://a/", &mut tree).unwrap();

    let report = report.lock().unwrap();
    assert!(report.resources.contains("http://a/s.css"));
    assert!(report.resources.contains("http://a/app.js"));
    assert!(report.media.contains("http://a/i.png"));
    assert!(!report.resources.contains("http://a/p2"));
    assert!(!report.media.contains("http://a/p2"));
}

#[test]
fn broken_links_are_filed_under_their_referrers() {
    let mut graph = SiteGraph::new();
    graph.record_response("http://mine/", 200, Duration::from_millis(10));
    graph.record_link("http://mine/", "http://mine/gone");
    graph.record_referrer("http://mine/gone", "http://mine/");
    graph.record_response("http://mine/gone", 404, Duration::from_millis(5));
    graph.record_link("http://mine/", "http://other.com/x");
    graph.record_referrer("http://other.com/x", "http://mine/");
    graph.record_response("http://other.com/x", 500, Duration::from_millis(7));
    graph.record_error("http://mine/flaky", "connection timed out");

    let allowed: HashSet<String> = ["mine".to_string()].into();
    let mut report = SiteReport::new("broken");
    report_broken_links(&graph, &allowed, &mut report);

    let errors = &report.messages()[&Severity::Error];
    let internal = &errors["Bad links (internal)"];
    assert!(internal.contains_key("http://mine/gone (HTTP 404)"));
    assert!(
        internal["http://mine/gone (HTTP 404)"]
            .urls
            .contains("http://mine/")
    );
    // A broken page nobody links to is filed under itself.
    assert!(
        internal["http://mine/flaky (connection timed out)"]
            .urls
            .contains("http://mine/flaky")
    );

    let external = &errors["Bad links (external)"];
    assert!(
        external["http://other.com/x (HTTP 500)"]
            .urls
            .contains("http://mine/")
    );
}

#[test]
fn healthy_graphs_produce_no_broken_link_findings() {
    let mut graph = SiteGraph::new();
    graph.record_response("http://mine/", 200, Duration::from_millis(10));
    // Discovered but never fetched: not broken, just unvisited.
    graph.record_referrer("http://other.com/x", "http://mine/");

    let allowed: HashSet<String> = ["mine".to_string()].into();
    let mut report = SiteReport::new("healthy");
    report_broken_links(&graph, &allowed, &mut report);

    assert!(report.is_empty());
}

#[test]
fn run_summary_is_informational() {
    let counters = Counters {
        queued: 9,
        processed: 9,
        errors: 2,
    };
    let seeds = vec!["http://mine/".to_string()];
    let mut report = SiteReport::new("summary");
    report_run_summary(&counters, &seeds, &mut report);

    let info = &report.messages()[&Severity::Info]["Crawl"];
    assert!(info.contains_key("Retrieved 9 URLs (2 errors)"));
}
