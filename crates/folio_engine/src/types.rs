use std::fmt;

use crate::article::ArticleSummary;
use crate::export::ExportReport;
use crate::pipeline::PipelineError;

pub type JobId = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Queued,
    Fetching,
    Rendering,
    Extracting,
    DownloadingImages,
    Writing,
    Done,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobProgress {
    pub job_id: JobId,
    pub stage: Stage,
    pub bytes: Option<u64>,
}

#[derive(Debug, Clone)]
pub enum EngineEvent {
    Progress(JobProgress),
    /// Extraction finished; the summary is available before the export runs.
    Extracted {
        job_id: JobId,
        summary: ArticleSummary,
    },
    JobCompleted {
        job_id: JobId,
        result: Result<JobOutcome, PipelineError>,
    },
}

/// Raw page content produced by a [`crate::PageFetcher`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchResult {
    pub source_url: String,
    pub final_url: String,
    pub raw_html: String,
    pub content_type: Option<String>,
    pub encoding: String,
    /// True when the HTML was captured from a headless browser.
    pub rendered: bool,
}

#[derive(Debug, Clone)]
pub struct JobOutcome {
    pub final_url: String,
    pub rendered: bool,
    pub summary: ArticleSummary,
    pub outputs: Vec<ExportReport>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct FetchError {
    pub kind: FailureKind,
    pub message: String,
}

impl FetchError {
    pub(crate) fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureKind {
    InvalidUrl,
    HttpStatus(u16),
    Timeout,
    RedirectLimitExceeded,
    TooLarge { max_bytes: u64, actual: Option<u64> },
    UnsupportedContentType { content_type: String },
    Browser,
    BrowserUnavailable,
    Cancelled,
    Network,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::InvalidUrl => write!(f, "invalid url"),
            FailureKind::HttpStatus(code) => write!(f, "http status {code}"),
            FailureKind::Timeout => write!(f, "timeout"),
            FailureKind::RedirectLimitExceeded => write!(f, "redirect limit exceeded"),
            FailureKind::TooLarge { max_bytes, actual } => {
                write!(f, "response too large (max {max_bytes}, actual {actual:?})")
            }
            FailureKind::UnsupportedContentType { content_type } => {
                write!(f, "unsupported content type {content_type}")
            }
            FailureKind::Browser => write!(f, "browser rendering failed"),
            FailureKind::BrowserUnavailable => write!(f, "browser rendering not available"),
            FailureKind::Cancelled => write!(f, "cancelled"),
            FailureKind::Network => write!(f, "network error"),
        }
    }
}
