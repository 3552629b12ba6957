use std::collections::{BTreeMap, BTreeSet};
use std::fs::File;
use std::io::Write;
use std::path::Path;

use serde::{Deserialize, Serialize};
use sitecheck_spider::Counters;

/// Finding severities, ordered the way they appear in reports: problems
/// first, background information last.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
    Bad,
    Good,
    Info,
}

impl Severity {
    pub const ALL: [Severity; 5] = [
        Severity::Error,
        Severity::Warning,
        Severity::Bad,
        Severity::Good,
        Severity::Info,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Severity::Error => "Error",
            Severity::Warning => "Warning",
            Severity::Bad => "Bad Practice",
            Severity::Good => "Good Practice",
            Severity::Info => "Informational",
        }
    }

    pub fn key(&self) -> &'static str {
        match self {
            Severity::Error => "error",
            Severity::Warning => "warning",
            Severity::Bad => "bad",
            Severity::Good => "good",
            Severity::Info => "info",
        }
    }
}

/// URLs sharing one finding, plus optional shared details.
#[derive(Debug, Clone, Default, Serialize)]
pub struct MessageGroup {
    pub urls: BTreeSet<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

/// Diagnostics produced by a QA run, grouped by
/// `(severity, category, title)`. The spider core never writes here; it
/// is the sink analyzers and validators append to through the extension
/// hooks, plus the page/resource/media accounting they maintain.
#[derive(Debug, Default, Serialize)]
pub struct SiteReport {
    pub title: String,
    messages: BTreeMap<Severity, BTreeMap<String, BTreeMap<String, MessageGroup>>>,
    pub pages: BTreeSet<String>,
    pub resources: BTreeSet<String>,
    pub media: BTreeSet<String>,
}

impl SiteReport {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }

    /// File a finding. The first call for a `(severity, category, title)`
    /// triple sets the shared details; later calls only add URLs.
    pub fn add(
        &mut self,
        severity: Severity,
        category: &str,
        title: &str,
        url: &str,
        details: Option<&str>,
    ) {
        let group = self
            .messages
            .entry(severity)
            .or_default()
            .entry(category.to_string())
            .or_default()
            .entry(title.to_string())
            .or_default();

        if group.urls.is_empty() && group.details.is_none() {
            group.details = details.map(str::to_string);
        }
        group.urls.insert(url.to_string());
    }

    pub fn messages(
        &self,
    ) -> &BTreeMap<Severity, BTreeMap<String, BTreeMap<String, MessageGroup>>> {
        &self.messages
    }

    /// Number of distinct findings filed at a severity.
    pub fn count(&self, severity: Severity) -> usize {
        self.messages
            .get(&severity)
            .map(|categories| categories.values().map(BTreeMap::len).sum())
            .unwrap_or(0)
    }

    pub fn total(&self) -> usize {
        Severity::ALL.iter().map(|s| self.count(*s)).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportFormat {
    Text,
    Html,
    Json,
}

impl ReportFormat {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "text" | "txt" => Some(ReportFormat::Text),
            "html" => Some(ReportFormat::Html),
            "json" => Some(ReportFormat::Json),
            _ => None,
        }
    }
}

pub fn render(report: &SiteReport, counters: &Counters, format: ReportFormat) -> String {
    match format {
        ReportFormat::Text => render_text(report, counters),
        ReportFormat::Html => render_html(report, counters),
        ReportFormat::Json => render_json(report, counters),
    }
}

pub fn render_text(report: &SiteReport, counters: &Counters) -> String {
    let mut out = String::new();

    out.push_str(&report.title);
    out.push('\n');
    out.push_str(&format!(
        "Retrieved {} URLs with {} errors\n\n",
        counters.processed, counters.errors
    ));

    for (severity, categories) in report.messages() {
        out.push_str(&format!("{}:\n", severity.label()));

        for (category, findings) in categories {
            out.push_str(&format!("\t{category}:\n"));

            for (title, group) in findings {
                out.push_str(&format!("\t\t{title}: {} pages\n", group.urls.len()));
                for url in &group.urls {
                    out.push_str(&format!("\t\t\t{url}\n"));
                }
                if let Some(details) = &group.details {
                    out.push_str(&format!("\t\t\t({details})\n"));
                }
                out.push('\n');
            }
        }
        out.push('\n');
    }

    out
}

pub fn render_html(report: &SiteReport, counters: &Counters) -> String {
    use html_escape::encode_text as esc;

    let mut out = String::new();
    out.push_str("<!DOCTYPE html>\n<html>\n<head>\n");
    out.push_str(&format!("<title>{}</title>\n", esc(&report.title)));
    out.push_str("<meta charset=\"utf-8\">\n<style>\n");
    out.push_str("body { font-family: sans-serif; margin: 2em; }\n");
    out.push_str("h2.error, h2.warning { color: #a00; }\n");
    out.push_str("h2.bad { color: #a60; }\n");
    out.push_str("h2.good { color: #080; }\n");
    out.push_str("h2.info { color: #444; }\n");
    out.push_str("ul.urls { font-size: smaller; }\n");
    out.push_str("</style>\n</head>\n<body>\n");

    out.push_str(&format!("<h1>{}</h1>\n", esc(&report.title)));
    out.push_str(&format!(
        "<p>Retrieved {} URLs with {} errors.</p>\n",
        counters.processed, counters.errors
    ));

    for (severity, categories) in report.messages() {
        out.push_str(&format!(
            "<h2 class=\"{}\">{}</h2>\n",
            severity.key(),
            esc(severity.label())
        ));

        for (category, findings) in categories {
            out.push_str(&format!("<h3>{}</h3>\n", esc(category)));

            for (title, group) in findings {
                out.push_str(&format!(
                    "<h4>{} <small>({} pages)</small></h4>\n",
                    esc(title),
                    group.urls.len()
                ));
                if let Some(details) = &group.details {
                    out.push_str(&format!("<p>{}</p>\n", esc(details)));
                }
                out.push_str("<ul class=\"urls\">\n");
                for url in &group.urls {
                    out.push_str(&format!(
                        "<li><a href=\"{}\">{}</a></li>\n",
                        html_escape::encode_double_quoted_attribute(url),
                        esc(url)
                    ));
                }
                out.push_str("</ul>\n");
            }
        }
    }

    out.push_str("</body>\n</html>\n");
    out
}

pub fn render_json(report: &SiteReport, counters: &Counters) -> String {
    let severity_counts: BTreeMap<&str, usize> = Severity::ALL
        .iter()
        .map(|s| (s.key(), report.count(*s)))
        .collect();

    let json = serde_json::json!({
        "report": {
            "metadata": {
                "generator": "sitecheck",
                "version": env!("CARGO_PKG_VERSION"),
                "generated_at": chrono::Utc::now().to_rfc3339(),
            },
            "title": report.title,
            "summary": {
                "urls_retrieved": counters.processed,
                "urls_queued": counters.queued,
                "errors": counters.errors,
                "total_findings": report.total(),
                "severity_breakdown": severity_counts,
            },
            "messages": report.messages(),
            "pages": report.pages,
            "resources": report.resources,
            "media": report.media,
        }
    });

    serde_json::to_string_pretty(&json).unwrap_or_else(|_| "{}".to_string())
}

pub fn save_report(content: &str, path: &Path) -> std::io::Result<()> {
    let mut file = File::create(path)?;
    file.write_all(content.as_bytes())?;
    Ok(())
}
