use std::fmt;

use thiserror::Error;

/// Pipeline stage that invoked a failing extension hook.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessorStage {
    Header,
    Html,
    Tree,
}

impl fmt::Display for ProcessorStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProcessorStage::Header => write!(f, "header"),
            ProcessorStage::Html => write!(f, "html"),
            ProcessorStage::Tree => write!(f, "tree"),
        }
    }
}

/// Fatal error classes. Per-page failures (transport errors, HTTP error
/// statuses, undecodable bodies) are recorded in the site graph and the
/// error counter instead of surfacing here.
#[derive(Error, Debug)]
pub enum SpiderError {
    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    #[error("redirect cycle detected: {from} -> {to}")]
    RedirectCycle { from: String, to: String },

    #[error("{stage} processor failed on {url}: {cause}")]
    Processor {
        stage: ProcessorStage,
        url: String,
        cause: anyhow::Error,
    },

    #[error("HTTP client setup failed: {0}")]
    ClientSetup(#[source] reqwest::Error),

    #[error("task join error: {0}")]
    Join(#[from] tokio::task::JoinError),
}

pub type Result<T> = std::result::Result<T, SpiderError>;
