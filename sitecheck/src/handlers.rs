use std::fs;
use std::path::PathBuf;
use std::process::exit;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use clap::ArgMatches;
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use sitecheck_core::analyzers::{
    content_type_accounting, report_broken_links, report_run_summary, resource_accounting,
};
use sitecheck_core::report::{self, ReportFormat, Severity, SiteReport};
use sitecheck_core::{crawl_summary, url_path};
use sitecheck_spider::processors::ProgressCallback;
use sitecheck_spider::{Spider, SpiderConfig};
use tracing::warn;
use url::Url;

/// Load seed URLs from either a hosts file or a single URL argument.
pub fn load_urls_from_source(
    url: Option<&Url>,
    hosts_file: Option<&PathBuf>,
) -> Result<Vec<String>, String> {
    if let Some(path) = hosts_file {
        load_urls_from_file(path)
    } else if let Some(url) = url {
        Ok(vec![url.as_str().to_string()])
    } else {
        Err("either --url or --hosts-file must be provided".to_string())
    }
}

/// Load and parse seed URLs from a newline-delimited file.
pub fn load_urls_from_file(path: &PathBuf) -> Result<Vec<String>, String> {
    let content = fs::read_to_string(path)
        .map_err(|e| format!("failed to read hosts file {}: {e}", path.display()))?;

    let urls: Vec<String> = content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .filter_map(parse_url_line)
        .collect();

    if urls.is_empty() {
        return Err(format!("no usable URLs found in {}", path.display()));
    }

    Ok(urls)
}

/// Parse one hosts-file line as an http(s) URL, defaulting the scheme to
/// http:// when none was given.
pub fn parse_url_line(line: &str) -> Option<String> {
    match Url::parse(line) {
        Ok(url) if matches!(url.scheme(), "http" | "https") => return Some(line.to_string()),
        Ok(_) => {
            // A non-HTTP seed can never be crawled; defaulting its scheme
            // would only hide the mistake.
            eprintln!("skipping non-HTTP URL {line:?}");
            return None;
        }
        Err(_) => {}
    }

    let with_scheme = format!("http://{line}");
    if Url::parse(&with_scheme).is_ok() {
        return Some(with_scheme);
    }

    eprintln!("skipping invalid URL {line:?}");
    None
}

/// Anchor a user-supplied skip pattern the way the engine applies it
/// (against the whole URL path).
pub fn compile_skip_link_re(pattern: &str) -> Result<regex::Regex, String> {
    let anchored = if pattern.starts_with('^') {
        pattern.to_string()
    } else {
        warn!("correcting unanchored skip-link-re to: ^.*{pattern}");
        format!("^.*{pattern}")
    };

    regex::RegexBuilder::new(&anchored)
        .case_insensitive(true)
        .build()
        .map_err(|e| format!("invalid skip-link-re: {e}"))
}

fn seed_urls(args: &ArgMatches) -> Vec<String> {
    let url = args.get_one::<Url>("url");
    let hosts_file = args.get_one::<PathBuf>("hosts-file");

    match load_urls_from_source(url, hosts_file) {
        Ok(urls) => urls,
        Err(e) => {
            eprintln!("{} {e}", "✗".red().bold());
            exit(2);
        }
    }
}

fn spider_config(args: &ArgMatches) -> SpiderConfig {
    let max_connections = *args.get_one::<usize>("max-connections").unwrap_or(&6);
    let timeout = *args.get_one::<u64>("timeout").unwrap_or(&15);

    let mut config = SpiderConfig::default()
        .with_max_simultaneous_connections(max_connections)
        .with_request_timeout(Duration::from_secs(timeout))
        .with_follow_offsite_redirects(args.get_flag("follow-offsite-redirects"));

    if args.try_get_one::<bool>("skip-media").is_ok() {
        config = config
            .with_skip_media(args.get_flag("skip-media"))
            .with_skip_resources(args.get_flag("skip-resources"));
    }

    if let Ok(Some(pattern)) = args.try_get_one::<String>("skip-link-re") {
        match compile_skip_link_re(pattern) {
            Ok(re) => config = config.with_skip_link_re(re),
            Err(e) => {
                eprintln!("{} {e}", "✗".red().bold());
                exit(2);
            }
        }
    }

    config
}

fn crawl_spinner() -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.cyan} {msg}")
            .unwrap(),
    );
    spinner.enable_steady_tick(Duration::from_millis(100));
    spinner.set_message("Starting crawl...");
    spinner
}

fn spinner_progress(spinner: &ProgressBar) -> ProgressCallback {
    let spinner = spinner.clone();
    Arc::new(move |processed, queued, url| {
        spinner.set_message(format!("Crawling... {processed}/{queued} {}", url_path(url)));
    })
}

fn print_divider() {
    println!("{}", "═".repeat(60).bright_blue().bold());
}

pub async fn handle_crawl(args: &ArgMatches) {
    let urls = seed_urls(args);
    let config = spider_config(args);

    let mut spider = match Spider::new(config) {
        Ok(spider) => spider,
        Err(e) => {
            eprintln!("{} {e}", "✗".red().bold());
            exit(1);
        }
    };

    let spinner = crawl_spinner();
    spider = spider.with_progress_callback(spinner_progress(&spinner));

    let result = spider.run(&urls).await;
    spinner.finish_and_clear();

    print!("{}", crawl_summary(spider.graph(), &spider.counters()));

    if let Err(e) = result {
        eprintln!("{} Crawl aborted: {e}", "✗".red().bold());
        exit(1);
    }
    println!("{} Crawl complete!", "✓".green().bold());
}

pub async fn handle_check(args: &ArgMatches) {
    let urls = seed_urls(args);

    let format = args
        .get_one::<String>("format")
        .map(String::as_str)
        .unwrap_or("text");
    let Some(format) = ReportFormat::from_str(format) else {
        eprintln!("{} unknown report format {format:?}", "✗".red().bold());
        exit(2);
    };

    let config = spider_config(args);
    let report = Arc::new(Mutex::new(SiteReport::new("Site Report")));

    let mut spider = match Spider::new(config) {
        Ok(spider) => spider,
        Err(e) => {
            eprintln!("{} {e}", "✗".red().bold());
            exit(1);
        }
    };
    spider = spider
        .with_header_processor(content_type_accounting(report.clone()))
        .with_tree_processor(resource_accounting(report.clone()));

    let spinner = crawl_spinner();
    spider = spider.with_progress_callback(spinner_progress(&spinner));

    let result = spider.run(&urls).await;
    spinner.finish_and_clear();

    let counters = spider.counters();
    {
        let mut hosts: Vec<&String> = spider.allowed_hosts().iter().collect();
        hosts.sort();
        let hosts = hosts.into_iter().map(String::as_str).collect::<Vec<_>>();

        let mut report = report.lock().unwrap();
        report.title = format!("Site Report for {}", hosts.join(", "));
        report_broken_links(spider.graph(), spider.allowed_hosts(), &mut report);
        report_run_summary(&counters, &urls, &mut report);
    }

    let rendered = report::render(&report.lock().unwrap(), &counters, format);
    match args.get_one::<String>("output") {
        Some(path) => {
            let expanded = shellexpand::tilde(path);
            let path = std::path::Path::new(expanded.as_ref());
            if let Err(e) = report::save_report(&rendered, path) {
                eprintln!("{} failed to save report to {}: {e}", "✗".red().bold(), path.display());
                exit(1);
            }
            println!("{} Report saved to {}", "✓".green().bold(), path.display());
        }
        None => print!("{rendered}"),
    }

    print_severity_summary(&report.lock().unwrap(), &counters);

    if let Err(e) = result {
        eprintln!("{} Check aborted with partial results: {e}", "✗".red().bold());
        exit(1);
    }
}

fn print_severity_summary(report: &SiteReport, counters: &sitecheck_spider::Counters) {
    println!();
    print_divider();
    println!("{}", "  SITE CHECK COMPLETE".bright_white().bold());
    print_divider();
    println!(
        "{} Retrieved {} URLs ({} errors)",
        "→".blue(),
        counters.processed.to_string().bright_white(),
        counters.errors.to_string().bright_white()
    );

    for severity in Severity::ALL {
        let count = report.count(severity);
        if count == 0 {
            continue;
        }
        let label = format!("{}: {count}", severity.label());
        let line = match severity {
            Severity::Error => label.red().bold(),
            Severity::Warning => label.yellow().bold(),
            Severity::Bad => label.yellow(),
            Severity::Good => label.green(),
            Severity::Info => label.normal(),
        };
        println!("{} {line}", "•".blue());
    }
    println!();
}
