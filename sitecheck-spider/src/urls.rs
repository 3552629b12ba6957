use url::Url;

/// Parse an absolute URL and strip its fragment. Two URLs differing only
/// by fragment are the same page as far as the crawl is concerned.
pub fn canonicalize(url: &str) -> Option<Url> {
    let mut parsed = Url::parse(url).ok()?;
    parsed.set_fragment(None);
    Some(parsed)
}

/// Fragment-stripped copy of an already-parsed URL.
pub fn canonical(url: &Url) -> Url {
    let mut canonical = url.clone();
    canonical.set_fragment(None);
    canonical
}

/// Only http/https URLs ever enter the queue or get their own page record.
pub fn is_http(url: &Url) -> bool {
    matches!(url.scheme(), "http" | "https")
}

/// Host identity for the crawl boundary. Ports are significant: two
/// servers on the same address but different ports are different sites.
pub fn host_key(url: &Url) -> Option<String> {
    let host = url.host_str()?;
    match url.port() {
        Some(port) => Some(format!("{host}:{port}")),
        None => Some(host.to_string()),
    }
}
