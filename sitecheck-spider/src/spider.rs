use std::collections::{HashMap, HashSet, VecDeque};

use reqwest::header;
use scraper::Html;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};
use url::Url;

use crate::charset;
use crate::config::SpiderConfig;
use crate::error::{ProcessorStage, Result, SpiderError};
use crate::graph::{Counters, SiteGraph};
use crate::links::{self, LinkKind};
use crate::processors::{
    HeaderProcessor, HtmlProcessor, PageTree, ProgressCallback, TreeProcessor,
};
use crate::transport::{FetchedResponse, Transport, content_length, header_str};
use crate::urls;

// Redirect chains longer than this are treated as cycles.
const MAX_REDIRECT_HOPS: usize = 32;

struct PendingFetch {
    url: String,
    referer: Option<String>,
}

struct FetchOutcome {
    url: String,
    referer: Option<String>,
    result: std::result::Result<FetchedResponse, reqwest::Error>,
}

/// Crawls a site from a set of seed URLs, feeding every response through
/// an ordered pipeline that records per-URL facts in the [`SiteGraph`]
/// and discovers further work.
///
/// Network fetches run concurrently up to the configured bound, but
/// pipeline executions are serialized: a response is fully handled,
/// including any queueing it triggers, before the next completion is
/// looked at. That is what makes the history set, redirect map, counters
/// and graph safe to mutate without locks, and the completion check
/// (`processed == queued` with nothing in flight) race-free.
pub struct Spider {
    config: SpiderConfig,
    transport: Transport,
    graph: SiteGraph,
    counters: Counters,
    /// Every URL ever queued; sole source of truth for dedup.
    history: HashSet<String>,
    pending: VecDeque<PendingFetch>,
    /// Requested URL -> redirect target, for cycle detection.
    redirects: HashMap<String, String>,
    allowed_hosts: HashSet<String>,
    header_processors: Vec<HeaderProcessor>,
    html_processors: Vec<HtmlProcessor>,
    tree_processors: Vec<TreeProcessor>,
    progress: Option<ProgressCallback>,
}

impl Spider {
    pub fn new(config: SpiderConfig) -> Result<Self> {
        let transport = Transport::new(&config)?;
        Ok(Self {
            config,
            transport,
            graph: SiteGraph::new(),
            counters: Counters::default(),
            history: HashSet::new(),
            pending: VecDeque::new(),
            redirects: HashMap::new(),
            allowed_hosts: HashSet::new(),
            header_processors: Vec::new(),
            html_processors: Vec::new(),
            tree_processors: Vec::new(),
            progress: None,
        })
    }

    pub fn with_header_processor(mut self, processor: HeaderProcessor) -> Self {
        self.header_processors.push(processor);
        self
    }

    pub fn with_html_processor(mut self, processor: HtmlProcessor) -> Self {
        self.html_processors.push(processor);
        self
    }

    pub fn with_tree_processor(mut self, processor: TreeProcessor) -> Self {
        self.tree_processors.push(processor);
        self
    }

    pub fn with_progress_callback(mut self, callback: ProgressCallback) -> Self {
        self.progress = Some(callback);
        self
    }

    pub fn graph(&self) -> &SiteGraph {
        &self.graph
    }

    pub fn counters(&self) -> Counters {
        self.counters
    }

    pub fn allowed_hosts(&self) -> &HashSet<String> {
        &self.allowed_hosts
    }

    /// Add a URL to be retrieved. Idempotent: a URL that was ever queued
    /// before (fragment differences aside) is ignored, so at most one
    /// fetch is issued per canonical URL.
    pub fn queue(&mut self, url: &str, referer: Option<&str>) -> Result<()> {
        let canonical = urls::canonicalize(url)
            .filter(urls::is_http)
            .ok_or_else(|| SpiderError::InvalidUrl(url.to_string()))?;
        self.queue_canonical(canonical, referer);
        Ok(())
    }

    /// Internal queue entry point for URLs the pipeline already
    /// canonicalized and scheme-checked.
    fn queue_canonical(&mut self, url: Url, referer: Option<&str>) {
        debug_assert!(urls::is_http(&url) && url.fragment().is_none());

        let key = url.to_string();
        if !self.history.insert(key.clone()) {
            return;
        }

        self.counters.queued += 1;
        self.graph.touch(&key);
        self.pending.push_back(PendingFetch {
            url: key,
            referer: referer.map(str::to_string),
        });
    }

    /// Crawl until every queued URL has been processed. Blocks the caller
    /// for the whole run; the graph and counters stay readable afterwards
    /// whether the run finished or aborted.
    pub async fn run(&mut self, seeds: &[String]) -> Result<()> {
        for seed in seeds {
            let parsed = urls::canonicalize(seed)
                .filter(urls::is_http)
                .ok_or_else(|| SpiderError::InvalidUrl(seed.clone()))?;
            // Every host named in the seed list is fair game to crawl.
            if let Some(host) = urls::host_key(&parsed) {
                self.allowed_hosts.insert(host);
            }
            self.queue_canonical(parsed, None);
        }

        info!(
            "starting crawl of {} seed(s), {} connection(s)",
            seeds.len(),
            self.config.max_simultaneous_connections
        );

        let window = self.config.max_simultaneous_connections.max(1);
        let mut in_flight: JoinSet<FetchOutcome> = JoinSet::new();

        loop {
            // Top up the in-flight window from the pending queue.
            while in_flight.len() < window {
                let Some(fetch) = self.pending.pop_front() else {
                    break;
                };
                let transport = self.transport.clone();
                in_flight.spawn(async move {
                    let result = transport.fetch(&fetch.url, fetch.referer.as_deref()).await;
                    FetchOutcome {
                        url: fetch.url,
                        referer: fetch.referer,
                        result,
                    }
                });
            }

            // Nothing in flight after topping up means nothing pending
            // either: the crawl is complete.
            let Some(joined) = in_flight.join_next().await else {
                break;
            };

            // The whole pipeline for this response runs before the loop
            // comes back around, so any URLs it queues are visible to the
            // next top-up and the completion check can't fire early.
            self.handle_response(joined?)?;
        }

        debug_assert!(self.counters.complete());
        info!(
            "crawl complete: {} processed, {} errors",
            self.counters.processed, self.counters.errors
        );
        Ok(())
    }

    fn handle_response(&mut self, outcome: FetchOutcome) -> Result<()> {
        self.counters.processed += 1;

        if let Some(progress) = &self.progress {
            progress(self.counters.processed, self.counters.queued, &outcome.url);
        }

        match outcome.result {
            Err(err) => {
                self.counters.errors += 1;
                self.graph.record_error(&outcome.url, err.to_string());
                match &outcome.referer {
                    Some(referer) => {
                        error!("unable to retrieve {} (referer={referer}): {err}", outcome.url)
                    }
                    None => error!("unable to retrieve {}: {err}", outcome.url),
                }
                Ok(())
            }
            Ok(response) => self.process_response(outcome.url, outcome.referer, response),
        }
    }

    /// The ordered, short-circuiting response pipeline.
    fn process_response(
        &mut self,
        url: String,
        referer: Option<String>,
        response: FetchedResponse,
    ) -> Result<()> {
        let status = response.status.as_u16();
        info!(
            "retrieved {url} (elapsed={:.2}s, status={status})",
            response.elapsed.as_secs_f64()
        );

        if status == 301 || status == 302 {
            return self.process_redirect(url, response);
        }

        self.graph.record_response(&url, status, response.elapsed);
        if let Some(content_type) = header_str(&response.headers, header::CONTENT_TYPE) {
            self.graph.record_content_type(&url, content_type);
        }

        if response.status.is_client_error() || response.status.is_server_error() {
            self.counters.errors += 1;
            match &referer {
                Some(referer) => error!("{url} (referer={referer}): HTTP {status}"),
                None => error!("{url}: HTTP {status}"),
            }
            return Ok(());
        }

        // Declared length vs what actually arrived. Transfer encodings
        // make the comparison fuzzy, so a shortfall is only a warning.
        if let Some(declared) = content_length(&response.headers)
            && (response.body.len() as u64) < declared
        {
            warn!(
                "{url}: possible partial content: Content-Length = {declared}, body length = {}",
                response.body.len()
            );
        }

        let Some(content_type) = header_str(&response.headers, header::CONTENT_TYPE) else {
            warn!("{url}: no Content-Type header");
            return Ok(());
        };

        if !content_type.starts_with("text/html") {
            // Leaf resource or media file: recorded, never parsed.
            info!("done processing {content_type} resource {url}");
            return Ok(());
        }

        for processor in &self.header_processors {
            processor(&url, &response.headers).map_err(|cause| SpiderError::Processor {
                stage: ProcessorStage::Header,
                url: url.clone(),
                cause,
            })?;
        }

        let (encoding, source) = charset::resolve(Some(content_type), &response.body);
        debug!("{url}: decoding body as {} ({source:?})", encoding.name());

        let Some(decoded) = charset::decode(&response.body, encoding) else {
            self.counters.errors += 1;
            let message = format!("unable to decode body as {}", encoding.name());
            error!("{url}: skipping page - {message}");
            self.graph.record_error(&url, message);
            return Ok(());
        };

        let (cleaned, junked) = charset::sanitize_control_chars(&decoded);
        if junked > 0 {
            warn!("{url}: stripped {junked} non-printable control characters");
        }

        let mut html = cleaned.into_owned();
        for processor in &self.html_processors {
            let replacement =
                processor(&url, &html).map_err(|cause| SpiderError::Processor {
                    stage: ProcessorStage::Html,
                    url: url.clone(),
                    cause,
                })?;
            if let Some(replacement) = replacement
                && !replacement.is_empty()
            {
                html = replacement;
            }
        }

        if html.trim().is_empty() {
            warn!("{url}: nothing to parse, skipping link processing");
            return Ok(());
        }

        debug!("{url}: parsing {} bytes of HTML", html.len());
        let document = Html::parse_document(&html);

        let Some(page_url) = urls::canonicalize(&url) else {
            warn!("{url}: aborting processing, page URL no longer parses");
            return Ok(());
        };

        let mut tree = PageTree {
            links: links::extract_links(&document, &page_url),
            document,
        };

        self.process_links(&url, &tree.links);

        for processor in &self.tree_processors {
            processor(&url, &mut tree).map_err(|cause| SpiderError::Processor {
                stage: ProcessorStage::Tree,
                url: url.clone(),
                cause,
            })?;
        }

        Ok(())
    }

    /// Record every discovered reference, then decide which ones to
    /// fetch: stay inside the allowed hosts, honor the skip pattern, and
    /// classify by the tag that carried the link.
    fn process_links(&mut self, page_url: &str, found: &[links::ExtractedLink]) {
        let mut queueable = Vec::new();

        for link in found {
            let target = urls::canonical(&link.url);
            let target_str = target.to_string();

            self.graph.record_link(page_url, &target_str);

            if !urls::is_http(&target) {
                debug!("skipping non-HTTP link: {target_str}");
                continue;
            }

            self.graph.record_referrer(&target_str, page_url);

            let offsite = urls::host_key(&target)
                .is_none_or(|host| !self.allowed_hosts.contains(&host));
            if offsite {
                debug!("recording external link without following: {target_str}");
                continue;
            }

            if let Some(skip_re) = &self.config.skip_link_re
                && skip_re.is_match(target.path())
            {
                debug!("link matched skip_link_re - not following {target_str}");
                continue;
            }

            let follow = match link.kind {
                LinkKind::Page => true,
                LinkKind::Resource => !self.config.skip_resources,
                LinkKind::Media => !self.config.skip_media,
            };
            if follow {
                queueable.push(target);
            }
        }

        for target in queueable {
            self.queue_canonical(target, Some(page_url));
        }
    }

    fn process_redirect(&mut self, source: String, response: FetchedResponse) -> Result<()> {
        let status = response.status.as_u16();
        self.graph.record_response(&source, status, response.elapsed);

        let Some(location) = header_str(&response.headers, header::LOCATION) else {
            self.counters.errors += 1;
            warn!("{source}: HTTP {status} without a Location header");
            return Ok(());
        };

        // Location may be relative; resolve it against the source.
        let target = urls::canonicalize(&source)
            .and_then(|source_url| source_url.join(location.trim()).ok())
            .map(|joined| urls::canonical(&joined));
        let Some(target) = target else {
            self.counters.errors += 1;
            warn!("{source}: unresolvable redirect target {location:?}");
            return Ok(());
        };
        let target_str = target.to_string();

        if self.redirect_leads_back(&target_str, &source) {
            error!("circular redirect: {source} -> {target_str}");
            return Err(SpiderError::RedirectCycle {
                from: source,
                to: target_str,
            });
        }
        self.redirects.insert(source.clone(), target_str.clone());

        if !urls::is_http(&target) {
            warn!("{source}: not following non-HTTP redirect to {target_str}");
            return Ok(());
        }

        let allowed = urls::host_key(&target)
            .is_some_and(|host| self.allowed_hosts.contains(&host));
        if allowed || self.config.follow_offsite_redirects {
            self.queue_canonical(target, Some(&source));
        } else {
            info!("not following external redirect from {source} to {target_str}");
        }
        Ok(())
    }

    /// Walk the redirect map from `start`; a path that reaches `source`
    /// (or runs past the hop bound) closes a cycle.
    fn redirect_leads_back(&self, start: &str, source: &str) -> bool {
        let mut current = start;
        for _ in 0..MAX_REDIRECT_HOPS {
            if current == source {
                return true;
            }
            match self.redirects.get(current) {
                Some(next) => current = next,
                None => return false,
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::Mutex;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn html_response(body: &str) -> ResponseTemplate {
        ResponseTemplate::new(200)
            .insert_header("content-type", "text/html")
            .set_body_bytes(body.as_bytes().to_vec())
    }

    async fn mount_html(server: &MockServer, at: &str, body: &str, expected: u64) {
        Mock::given(method("GET"))
            .and(path(at))
            .respond_with(html_response(body))
            .expect(expected)
            .mount(server)
            .await;
    }

    fn spider(config: SpiderConfig) -> Spider {
        Spider::new(config).unwrap()
    }

    /// Queuing the same URL twice must not issue two fetches; fragments
    /// don't make a URL new.
    #[tokio::test]
    async fn queue_is_idempotent() {
        let mut spider = spider(SpiderConfig::default());
        spider.queue("http://example.com/page", None).unwrap();
        spider.queue("http://example.com/page", None).unwrap();
        spider.queue("http://example.com/page#section", None).unwrap();
        assert_eq!(spider.counters().queued, 1);

        assert!(matches!(
            spider.queue("mailto:me@example.com", None),
            Err(SpiderError::InvalidUrl(_))
        ));
        assert!(matches!(
            spider.queue("not a url", None),
            Err(SpiderError::InvalidUrl(_))
        ));
    }

    /// Pages linking to each other (and to themselves) are each fetched
    /// exactly once.
    #[tokio::test]
    async fn each_url_is_fetched_exactly_once() {
        let server = MockServer::start().await;
        mount_html(
            &server,
            "/",
            r#"<html><body>
                <a href="/p2">once</a>
                <a href="/p2">twice</a>
                <a href="/p2#frag">still the same page</a>
            </body></html>"#,
            1,
        )
        .await;
        mount_html(
            &server,
            "/p2",
            r#"<html><body><a href="/">back home</a></body></html>"#,
            1,
        )
        .await;

        let mut spider = spider(SpiderConfig::default());
        spider.run(&[server.uri()]).await.unwrap();

        let counters = spider.counters();
        assert_eq!(counters.queued, 2);
        assert_eq!(counters.processed, 2);
        assert_eq!(counters.errors, 0);
    }

    /// Work discovered while finishing other work must not trip the
    /// completion check: `processed <= queued` holds at every
    /// observation point and the run only ends once they are equal.
    #[tokio::test]
    async fn completion_waits_for_reentrant_queueing() {
        let server = MockServer::start().await;
        // A chain: each page is only discoverable from the previous one,
        // so the crawl repeatedly drains to a single in-flight request
        // that then queues more work.
        mount_html(&server, "/", r#"<html><body><a href="/p1">1</a></body></html>"#, 1).await;
        mount_html(&server, "/p1", r#"<html><body><a href="/p2">2</a></body></html>"#, 1).await;
        mount_html(&server, "/p2", r#"<html><body><a href="/p3">3</a></body></html>"#, 1).await;
        mount_html(&server, "/p3", "<html><body>end of the line</body></html>", 1).await;

        let observations: Arc<Mutex<Vec<(u64, u64)>>> = Arc::new(Mutex::new(Vec::new()));
        let observations_in_callback = observations.clone();

        let config = SpiderConfig::default().with_max_simultaneous_connections(2);
        let mut spider = spider(config).with_progress_callback(Arc::new(
            move |processed, queued, _url| {
                observations_in_callback
                    .lock()
                    .unwrap()
                    .push((processed, queued));
            },
        ));
        spider.run(&[format!("{}/", server.uri())]).await.unwrap();

        let observations = observations.lock().unwrap();
        assert_eq!(observations.len(), 4);
        for (processed, queued) in observations.iter() {
            assert!(processed <= queued, "{processed} processed > {queued} queued");
        }

        let counters = spider.counters();
        assert!(counters.complete());
        assert_eq!(counters.processed, 4);
    }

    /// Offsite links are recorded as graph edges, with referrers, but
    /// never fetched.
    #[tokio::test]
    async fn offsite_links_are_recorded_but_not_fetched() {
        let onsite = MockServer::start().await;
        let offsite = MockServer::start().await;

        let root_html = format!(
            r#"<html><body>
                <a href="/about">about</a>
                <a href="{}/x">elsewhere</a>
            </body></html>"#,
            offsite.uri()
        );
        mount_html(&onsite, "/", &root_html, 1).await;
        mount_html(&onsite, "/about", "<html><body>about us</body></html>", 1).await;
        Mock::given(method("GET"))
            .respond_with(html_response("<html><body>never seen</body></html>"))
            .expect(0)
            .mount(&offsite)
            .await;

        let mut spider = spider(SpiderConfig::default());
        spider.run(&[format!("{}/", onsite.uri())]).await.unwrap();

        let counters = spider.counters();
        assert_eq!(counters.queued, 2);
        assert_eq!(counters.processed, 2);

        let root_url = format!("{}/", onsite.uri());
        let about = spider.graph().get(&format!("{}/about", onsite.uri())).unwrap();
        assert_eq!(about.status, Some(200));
        assert!(about.referrers.contains(&root_url));

        let external = spider.graph().get(&format!("{}/x", offsite.uri())).unwrap();
        assert_eq!(external.status, None);
        assert!(external.referrers.contains(&root_url));

        let root = spider.graph().get(&root_url).unwrap();
        assert!(root.links.contains(&format!("{}/x", offsite.uri())));
    }

    /// A->B->A redirect loops abort the run instead of spinning, and the
    /// partial graph stays readable.
    #[tokio::test]
    async fn redirect_cycle_aborts_the_run() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/a"))
            .respond_with(ResponseTemplate::new(301).insert_header("location", "/b"))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/b"))
            .respond_with(ResponseTemplate::new(302).insert_header("location", "/a"))
            .mount(&server)
            .await;

        let mut spider = spider(SpiderConfig::default());
        let result = spider.run(&[format!("{}/a", server.uri())]).await;

        assert!(matches!(result, Err(SpiderError::RedirectCycle { .. })));
        let a = spider.graph().get(&format!("{}/a", server.uri())).unwrap();
        assert_eq!(a.status, Some(301));
    }

    /// Redirects queue their target with the source as referer when the
    /// target host is allowed.
    #[tokio::test]
    async fn onsite_redirects_are_followed_with_referer() {
        let server = MockServer::start().await;
        let source = format!("{}/old", server.uri());
        Mock::given(method("GET"))
            .and(path("/old"))
            .respond_with(ResponseTemplate::new(302).insert_header("location", "/new"))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/new"))
            .and(header("referer", source.as_str()))
            .respond_with(html_response("<html><body>moved here</body></html>"))
            .expect(1)
            .mount(&server)
            .await;

        let mut spider = spider(SpiderConfig::default());
        spider.run(&[source.clone()]).await.unwrap();

        assert_eq!(spider.counters().queued, 2);
        let new = spider.graph().get(&format!("{}/new", server.uri())).unwrap();
        assert_eq!(new.status, Some(200));
        let old = spider.graph().get(&source).unwrap();
        assert_eq!(old.status, Some(302));
    }

    /// Offsite redirect targets are fetched only when the flag says so.
    #[tokio::test]
    async fn offsite_redirects_respect_the_flag() {
        for follow in [false, true] {
            let onsite = MockServer::start().await;
            let offsite = MockServer::start().await;

            Mock::given(method("GET"))
                .and(path("/go"))
                .respond_with(
                    ResponseTemplate::new(301)
                        .insert_header("location", format!("{}/landing", offsite.uri()).as_str()),
                )
                .expect(1)
                .mount(&onsite)
                .await;
            mount_html(
                &offsite,
                "/landing",
                "<html><body>you made it</body></html>",
                u64::from(follow),
            )
            .await;

            let config = SpiderConfig::default().with_follow_offsite_redirects(follow);
            let mut spider = spider(config);
            spider.run(&[format!("{}/go", onsite.uri())]).await.unwrap();

            let expected_queued = if follow { 2 } else { 1 };
            assert_eq!(spider.counters().queued, expected_queued, "follow={follow}");
            assert_eq!(spider.counters().processed, expected_queued);
        }
    }

    /// skip_resources leaves stylesheets unfetched while media is still
    /// retrieved; everything stays in the graph either way.
    #[tokio::test]
    async fn resource_and_media_classification() {
        let server = MockServer::start().await;
        mount_html(
            &server,
            "/",
            r#"<html><head><link href="/s.css" rel="stylesheet"></head>
               <body><a href="/p2">next</a><img src="/i.png"></body></html>"#,
            1,
        )
        .await;
        mount_html(&server, "/p2", "<html><body>page two</body></html>", 1).await;
        Mock::given(method("GET"))
            .and(path("/s.css"))
            .respond_with(ResponseTemplate::new(200).insert_header("content-type", "text/css"))
            .expect(0)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/i.png"))
            .respond_with(ResponseTemplate::new(200).insert_header("content-type", "image/png"))
            .expect(1)
            .mount(&server)
            .await;

        let config = SpiderConfig::default()
            .with_skip_resources(true)
            .with_skip_media(false);
        let mut spider = spider(config);
        spider.run(&[format!("{}/", server.uri())]).await.unwrap();

        assert_eq!(spider.counters().queued, 3);
        assert_eq!(spider.counters().processed, 3);

        let css = spider.graph().get(&format!("{}/s.css", server.uri())).unwrap();
        assert_eq!(css.status, None, "stylesheet must not be fetched");
        assert!(!css.referrers.is_empty());

        let image = spider.graph().get(&format!("{}/i.png", server.uri())).unwrap();
        assert_eq!(image.status, Some(200));
        // Leaf resource: no link extraction happened for it.
        assert!(image.links.is_empty());
    }

    /// Paths matching skip_link_re are recorded but never followed.
    #[tokio::test]
    async fn skip_pattern_blocks_following() {
        let server = MockServer::start().await;
        mount_html(
            &server,
            "/",
            r#"<html><body><a href="/admin/panel">admin</a><a href="/ok">ok</a></body></html>"#,
            1,
        )
        .await;
        mount_html(&server, "/ok", "<html><body>fine</body></html>", 1).await;
        Mock::given(method("GET"))
            .and(path("/admin/panel"))
            .respond_with(html_response("<html></html>"))
            .expect(0)
            .mount(&server)
            .await;

        let config = SpiderConfig::default()
            .with_skip_link_re(regex::Regex::new("^/admin").unwrap());
        let mut spider = spider(config);
        spider.run(&[format!("{}/", server.uri())]).await.unwrap();

        assert_eq!(spider.counters().queued, 2);
        let admin = spider.graph().get(&format!("{}/admin/panel", server.uri())).unwrap();
        assert_eq!(admin.status, None);
        assert!(!admin.referrers.is_empty());
    }

    /// HTTP error statuses are counted and recorded without stopping the
    /// crawl; transport failures behave the same way.
    #[tokio::test]
    async fn error_responses_do_not_abort() {
        let server = MockServer::start().await;
        mount_html(
            &server,
            "/",
            r#"<html><body><a href="/missing">gone</a><a href="/ok">ok</a></body></html>"#,
            1,
        )
        .await;
        mount_html(&server, "/ok", "<html><body>fine</body></html>", 1).await;
        Mock::given(method("GET"))
            .and(path("/missing"))
            .respond_with(ResponseTemplate::new(404))
            .expect(1)
            .mount(&server)
            .await;

        let mut spider = spider(SpiderConfig::default());
        spider.run(&[format!("{}/", server.uri())]).await.unwrap();

        let counters = spider.counters();
        assert_eq!(counters.queued, 3);
        assert_eq!(counters.processed, 3);
        assert_eq!(counters.errors, 1);

        let missing = spider.graph().get(&format!("{}/missing", server.uri())).unwrap();
        assert_eq!(missing.status, Some(404));
        assert!(missing.is_broken());
    }

    /// An html processor's replacement text is what gets parsed for
    /// links.
    #[tokio::test]
    async fn html_processor_replacement_feeds_parsing() {
        let server = MockServer::start().await;
        mount_html(
            &server,
            "/",
            "<html><body><a href=\"/original\">original</a></body></html>",
            1,
        )
        .await;
        mount_html(&server, "/injected", "<html><body>injected</body></html>", 1).await;
        Mock::given(method("GET"))
            .and(path("/original"))
            .respond_with(html_response("<html></html>"))
            .expect(0)
            .mount(&server)
            .await;

        let root = format!("{}/", server.uri());
        let root_for_processor = root.clone();
        let mut spider = spider(SpiderConfig::default()).with_html_processor(Arc::new(
            move |url, _html| {
                if url == root_for_processor {
                    Ok(Some(
                        "<html><body><a href=\"/injected\">replaced</a></body></html>".to_string(),
                    ))
                } else {
                    Ok(None)
                }
            },
        ));
        spider.run(&[root]).await.unwrap();

        assert_eq!(spider.counters().queued, 2);
        assert!(spider
            .graph()
            .get(&format!("{}/injected", server.uri()))
            .is_some_and(|record| record.status == Some(200)));
    }

    /// Processors are trusted configuration: one failing aborts the whole
    /// run with the stage and URL attached.
    #[tokio::test]
    async fn processor_failure_is_fatal() {
        let server = MockServer::start().await;
        mount_html(&server, "/", "<html><body>hello</body></html>", 1).await;

        let mut spider = spider(SpiderConfig::default()).with_header_processor(Arc::new(
            |_url, _headers| Err(anyhow::anyhow!("validator exploded")),
        ));
        let result = spider.run(&[format!("{}/", server.uri())]).await;

        match result {
            Err(SpiderError::Processor { stage, .. }) => {
                assert_eq!(stage, ProcessorStage::Header);
            }
            other => panic!("expected processor failure, got {other:?}"),
        }
    }

    /// Tree processors see the absolutized, classified link list.
    #[tokio::test]
    async fn tree_processors_observe_extracted_links() {
        let server = MockServer::start().await;
        mount_html(
            &server,
            "/",
            r#"<html><body><a href="/p2">p</a><img src="/i.png"></body></html>"#,
            1,
        )
        .await;
        mount_html(&server, "/p2", "<html><body>two</body></html>", 1).await;
        Mock::given(method("GET"))
            .and(path("/i.png"))
            .respond_with(ResponseTemplate::new(200).insert_header("content-type", "image/png"))
            .expect(1)
            .mount(&server)
            .await;

        let seen: Arc<Mutex<Vec<(String, LinkKind)>>> = Arc::new(Mutex::new(Vec::new()));
        let seen_in_processor = seen.clone();
        let mut spider = spider(SpiderConfig::default()).with_tree_processor(Arc::new(
            move |_url, tree| {
                let mut seen = seen_in_processor
                    .lock()
                    .map_err(|_| anyhow::anyhow!("poisoned"))?;
                for link in &tree.links {
                    seen.push((link.url.to_string(), link.kind));
                }
                Ok(())
            },
        ));
        spider.run(&[format!("{}/", server.uri())]).await.unwrap();

        let seen = seen.lock().unwrap();
        assert!(seen.contains(&(format!("{}/p2", server.uri()), LinkKind::Page)));
        assert!(seen.contains(&(format!("{}/i.png", server.uri()), LinkKind::Media)));
    }

    /// Pages without a Content-Type header stop at the gate but keep
    /// their status in the graph.
    #[tokio::test]
    async fn missing_content_type_stops_the_pipeline() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(
                b"<html><body><a href=\"/never\">x</a></body></html>".to_vec(),
            ))
            .expect(1)
            .mount(&server)
            .await;

        let mut spider = spider(SpiderConfig::default());
        spider.run(&[format!("{}/", server.uri())]).await.unwrap();

        assert_eq!(spider.counters().queued, 1);
        let root = spider.graph().get(&format!("{}/", server.uri())).unwrap();
        assert_eq!(root.status, Some(200));
        assert!(root.links.is_empty());
    }
}
