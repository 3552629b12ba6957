use std::time::{Duration, Instant};

use reqwest::header::{self, HeaderMap};
use reqwest::{Client, StatusCode, redirect};
use tracing::debug;

use crate::config::SpiderConfig;
use crate::error::{Result, SpiderError};

/// One completed HTTP exchange. `status` carries HTTP-level failures
/// (4xx/5xx); transport-level failures (DNS, connect, timeout) surface as
/// `reqwest::Error` from [`Transport::fetch`] instead.
#[derive(Debug)]
pub struct FetchedResponse {
    pub url: String,
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
    pub elapsed: Duration,
}

/// Thin wrapper over a shared `reqwest::Client`: identifying user agent,
/// per-request timeout, and redirects left to the pipeline to intercept.
/// Cloning shares the underlying connection pool.
#[derive(Debug, Clone)]
pub struct Transport {
    client: Client,
}

impl Transport {
    pub fn new(config: &SpiderConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(config.default_request_timeout)
            .connect_timeout(config.default_request_timeout.min(Duration::from_secs(10)))
            .pool_max_idle_per_host(config.max_simultaneous_connections)
            .tcp_keepalive(Duration::from_secs(60))
            // Redirects are handled manually in the pipeline so cycles can
            // be detected and offsite targets filtered.
            .redirect(redirect::Policy::none())
            .build()
            .map_err(SpiderError::ClientSetup)?;

        Ok(Self { client })
    }

    /// Issue a single GET. Resolves exactly once: either a fully-read
    /// response descriptor or a transport error.
    pub async fn fetch(
        &self,
        url: &str,
        referer: Option<&str>,
    ) -> std::result::Result<FetchedResponse, reqwest::Error> {
        debug!("fetching {url}");

        let start = Instant::now();
        let mut request = self.client.get(url);
        if let Some(referer) = referer {
            request = request.header(header::REFERER, referer);
        }

        let response = request.send().await?;
        let status = response.status();
        let headers = response.headers().clone();
        let body = response.bytes().await?.to_vec();

        Ok(FetchedResponse {
            url: url.to_string(),
            status,
            headers,
            body,
            elapsed: start.elapsed(),
        })
    }
}

/// Header value as text, when present and representable.
pub fn header_str<'a>(headers: &'a HeaderMap, name: header::HeaderName) -> Option<&'a str> {
    headers.get(name).and_then(|value| value.to_str().ok())
}

/// Declared Content-Length, when present and numeric.
pub fn content_length(headers: &HeaderMap) -> Option<u64> {
    header_str(headers, header::CONTENT_LENGTH).and_then(|value| value.parse().ok())
}
