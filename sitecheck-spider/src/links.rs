use scraper::{Html, Selector};
use std::sync::OnceLock;
use url::Url;

/// How a link may be scheduled, decided by the tag that carried it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkKind {
    /// Anchors, frames and iframes: always eligible for the queue.
    Page,
    /// Stylesheets and scripts: queued unless `skip_resources`.
    Resource,
    /// Everything else that embeds content: queued unless `skip_media`.
    Media,
}

/// One reference discovered in a page, already absolutized against the
/// page URL (or its `<base>` element).
#[derive(Debug, Clone)]
pub struct ExtractedLink {
    pub tag: &'static str,
    pub url: Url,
    pub kind: LinkKind,
}

// Tag/attribute pairs that carry references, per the classic HTML link
// walk: navigation targets, page components, and embedded media.
const LINK_ATTRS: &[(&str, &str, LinkKind)] = &[
    ("a", "href", LinkKind::Page),
    ("frame", "src", LinkKind::Page),
    ("iframe", "src", LinkKind::Page),
    ("link", "href", LinkKind::Resource),
    ("script", "src", LinkKind::Resource),
    ("area", "href", LinkKind::Media),
    ("img", "src", LinkKind::Media),
    ("embed", "src", LinkKind::Media),
    ("object", "data", LinkKind::Media),
    ("audio", "src", LinkKind::Media),
    ("video", "src", LinkKind::Media),
    ("source", "src", LinkKind::Media),
    ("input", "src", LinkKind::Media),
    ("form", "action", LinkKind::Media),
];

fn link_selector() -> &'static Selector {
    static SELECTOR: OnceLock<Selector> = OnceLock::new();
    SELECTOR.get_or_init(|| {
        let css = LINK_ATTRS
            .iter()
            .map(|(tag, attr, _)| format!("{tag}[{attr}]"))
            .collect::<Vec<_>>()
            .join(", ");
        Selector::parse(&css).expect("static selector")
    })
}

fn base_selector() -> &'static Selector {
    static SELECTOR: OnceLock<Selector> = OnceLock::new();
    SELECTOR.get_or_init(|| Selector::parse("base[href]").expect("static selector"))
}

/// The URL every reference in the document resolves against: the first
/// `<base href>` when one exists, the page URL otherwise.
pub fn base_url(document: &Html, page_url: &Url) -> Url {
    document
        .select(base_selector())
        .next()
        .and_then(|element| element.value().attr("href"))
        .and_then(|href| page_url.join(href.trim()).ok())
        .unwrap_or_else(|| page_url.clone())
}

/// Walk the document and absolutize every reference it carries. Order of
/// appearance is preserved; references the base URL can't resolve are
/// dropped.
pub fn extract_links(document: &Html, page_url: &Url) -> Vec<ExtractedLink> {
    let base = base_url(document, page_url);
    let mut links = Vec::new();

    for element in document.select(link_selector()) {
        let tag = element.value().name();
        let Some((tag, attr, kind)) = LINK_ATTRS
            .iter()
            .find(|(name, _, _)| *name == tag)
            .copied()
        else {
            continue;
        };

        let Some(href) = element.value().attr(attr) else {
            continue;
        };
        let href = href.trim();
        if href.is_empty() {
            continue;
        }

        if let Ok(url) = base.join(href) {
            links.push(ExtractedLink { tag, url, kind });
        }
    }

    links
}
