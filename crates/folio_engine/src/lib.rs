//! Folio engine: page fetching, article extraction and PDF/TXT export.
mod article;
#[cfg(feature = "browser")]
mod browser;
mod decode;
mod engine;
mod export;
mod extract;
mod fetch;
mod filename;
mod pdf;
mod persist;
mod pipeline;
mod preview;
mod source;
mod text;
mod types;

pub use article::{Article, ArticleSummary, Block, ImageRef, PublishedDate};
#[cfg(feature = "browser")]
pub use browser::{BrowserSettings, ChromeRenderer};
pub use decode::{decode_html, DecodedHtml};
pub use engine::{EngineConfig, EngineHandle};
pub use export::{
    export, export_all, export_all_with, export_pdf, export_text, normalize_extension,
    resolve_destination, ExportError, ExportFormat, ExportReport, ExportRequest, ExportSettings,
    ExportTarget, ImageError, SkippedImage,
};
pub use extract::{ExtractError, ExtractSettings, Extractor, ReadabilityExtractor};
pub use fetch::{
    parse_http_url, ChannelProgressSink, FetchSettings, ImageFetcher, NullProgressSink,
    PageFetcher, ProgressSink, ReqwestFetcher, DEFAULT_USER_AGENT,
};
pub use filename::suggested_filename;
pub use persist::{ensure_output_dir, write_atomically, AtomicFileWriter, PersistError};
pub use pipeline::{JobRequest, Pipeline, PipelineError};
pub use preview::{prepare_preview, MAX_PREVIEW_CHARS};
pub use source::{render_reason, PageSource, RenderMode};
pub use text::render_text;
pub use types::{
    EngineEvent, FailureKind, FetchError, FetchResult, JobId, JobOutcome, JobProgress, Stage,
};
