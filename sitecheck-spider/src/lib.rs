pub mod charset;
pub mod config;
pub mod error;
pub mod graph;
pub mod links;
pub mod processors;
pub mod spider;
pub mod transport;
pub mod urls;

pub use config::SpiderConfig;
pub use error::{ProcessorStage, SpiderError};
pub use graph::{Counters, PageRecord, SiteGraph};
pub use links::{ExtractedLink, LinkKind};
pub use processors::{HeaderProcessor, HtmlProcessor, PageTree, ProgressCallback, TreeProcessor};
pub use spider::Spider;
