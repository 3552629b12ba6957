use std::time::Duration;

use regex::Regex;

pub const DEFAULT_USER_AGENT: &str =
    concat!("sitecheck/", env!("CARGO_PKG_VERSION"), " (https://github.com/sitecheck/sitecheck)");

/// Crawl options. Built once, handed to [`crate::Spider::new`] and never
/// mutated during a run.
#[derive(Debug, Clone)]
pub struct SpiderConfig {
    /// Upper bound on requests in flight at any moment.
    pub max_simultaneous_connections: usize,
    /// Time we are willing to wait for each response.
    pub default_request_timeout: Duration,
    /// Don't retrieve media files (<img>, <object>, <embed>, ...).
    pub skip_media: bool,
    /// Don't retrieve non-media page components (stylesheets, scripts).
    pub skip_resources: bool,
    /// Links whose URL path matches this pattern are recorded but never
    /// followed. `None` follows everything.
    pub skip_link_re: Option<Regex>,
    /// Follow redirects that leave the allowed hosts. Off by default to
    /// avoid hammering third-party servers.
    pub follow_offsite_redirects: bool,
    pub user_agent: String,
}

impl Default for SpiderConfig {
    fn default() -> Self {
        Self {
            max_simultaneous_connections: 6,
            default_request_timeout: Duration::from_secs(15),
            skip_media: false,
            skip_resources: false,
            skip_link_re: None,
            follow_offsite_redirects: false,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

impl SpiderConfig {
    pub fn with_max_simultaneous_connections(mut self, n: usize) -> Self {
        self.max_simultaneous_connections = n.max(1);
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.default_request_timeout = timeout;
        self
    }

    pub fn with_skip_media(mut self, skip: bool) -> Self {
        self.skip_media = skip;
        self
    }

    pub fn with_skip_resources(mut self, skip: bool) -> Self {
        self.skip_resources = skip;
        self
    }

    pub fn with_skip_link_re(mut self, pattern: Regex) -> Self {
        self.skip_link_re = Some(pattern);
        self
    }

    pub fn with_follow_offsite_redirects(mut self, follow: bool) -> Self {
        self.follow_offsite_redirects = follow;
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }
}
