use std::sync::Arc;

use futures_util::{stream, StreamExt};
use tokio_util::sync::CancellationToken;

use folio_logging::{folio_info, folio_warn};

use crate::article::Article;
use crate::export::{export_all_with, ExportError, ExportFormat, ExportSettings, ExportTarget};
use crate::extract::{ExtractError, Extractor};
use crate::fetch::{parse_http_url, ImageFetcher, ProgressSink};
use crate::source::{PageSource, RenderMode};
use crate::{EngineEvent, FailureKind, FetchError, JobId, JobOutcome, JobProgress, Stage};

/// Images fetched at the same time while preparing a PDF.
const IMAGE_DOWNLOAD_CONCURRENCY: usize = 4;

/// What the user asked for: one URL, how to fetch it, where to write it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobRequest {
    pub url: String,
    pub render_mode: RenderMode,
    pub targets: Vec<ExportTarget>,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PipelineError {
    #[error("invalid url: {0}")]
    InvalidUrl(String),
    #[error("{0}")]
    Network(FetchError),
    #[error("server answered {status}: {message}")]
    Http { status: u16, message: String },
    #[error("{0}")]
    Extraction(ExtractError),
    #[error("{0}")]
    Io(String),
    #[error("cancelled")]
    Cancelled,
}

impl PipelineError {
    /// Error kind name shown to the user.
    pub fn class(&self) -> &'static str {
        match self {
            PipelineError::InvalidUrl(_) => "InvalidUrl",
            PipelineError::Network(_) => "NetworkError",
            PipelineError::Http { .. } => "HttpError",
            PipelineError::Extraction(_) => "ExtractionError",
            PipelineError::Io(_) => "IoError",
            PipelineError::Cancelled => "Cancelled",
        }
    }
}

impl From<FetchError> for PipelineError {
    fn from(err: FetchError) -> Self {
        match err.kind {
            FailureKind::InvalidUrl => PipelineError::InvalidUrl(err.message),
            FailureKind::HttpStatus(status) => PipelineError::Http {
                status,
                message: err.message,
            },
            FailureKind::Cancelled => PipelineError::Cancelled,
            _ => PipelineError::Network(err),
        }
    }
}

impl From<ExtractError> for PipelineError {
    fn from(err: ExtractError) -> Self {
        PipelineError::Extraction(err)
    }
}

impl From<ExportError> for PipelineError {
    fn from(err: ExportError) -> Self {
        PipelineError::Io(err.to_string())
    }
}

/// Fetch -> extract -> export for one [`JobRequest`].
#[derive(Clone)]
pub struct Pipeline {
    source: PageSource,
    images: Arc<dyn ImageFetcher>,
    extractor: Arc<dyn Extractor>,
    export: ExportSettings,
}

impl Pipeline {
    pub fn new(
        source: PageSource,
        images: Arc<dyn ImageFetcher>,
        extractor: Arc<dyn Extractor>,
    ) -> Self {
        Self {
            source,
            images,
            extractor,
            export: ExportSettings::default(),
        }
    }

    pub fn with_export_settings(mut self, export: ExportSettings) -> Self {
        self.export = export;
        self
    }

    /// Runs the job until it finishes or `cancel` fires.
    ///
    /// Cancellation drops whatever fetch or download is outstanding. Files are
    /// only written in the last step, so a cancelled job leaves nothing behind.
    pub async fn run(
        &self,
        job_id: JobId,
        request: &JobRequest,
        sink: &dyn ProgressSink,
        cancel: &CancellationToken,
    ) -> Result<JobOutcome, PipelineError> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                folio_info!("job cancelled");
                Err(PipelineError::Cancelled)
            }
            result = self.execute(job_id, request, sink) => result,
        }
    }

    async fn execute(
        &self,
        job_id: JobId,
        request: &JobRequest,
        sink: &dyn ProgressSink,
    ) -> Result<JobOutcome, PipelineError> {
        parse_http_url(&request.url)?;
        let progress = |stage: Stage| {
            sink.emit(EngineEvent::Progress(JobProgress {
                job_id,
                stage,
                bytes: None,
            }))
        };

        let page = self
            .source
            .fetch(job_id, &request.url, request.render_mode, sink)
            .await?;

        progress(Stage::Extracting);
        let mut article = self.extractor.extract(&page.raw_html, &page.final_url)?;
        let summary = article.summary();
        sink.emit(EngineEvent::Extracted {
            job_id,
            summary: summary.clone(),
        });

        let wants_pdf = request
            .targets
            .iter()
            .any(|target| target.format == ExportFormat::Pdf);
        if wants_pdf && summary.image_count > 0 {
            progress(Stage::DownloadingImages);
            self.download_images(&mut article).await;
        }

        progress(Stage::Writing);
        let outputs = export_all_with(&article, &request.targets, &self.export)?;
        progress(Stage::Done);

        Ok(JobOutcome {
            final_url: page.final_url,
            rendered: page.rendered,
            summary,
            outputs,
        })
    }

    /// Fills image payloads; failed downloads stay empty and are skipped by the PDF.
    async fn download_images(&self, article: &mut Article) {
        let urls: Vec<String> = article.images().map(|image| image.url.clone()).collect();
        let images = self.images.as_ref();
        let payloads: Vec<_> = stream::iter(urls.iter())
            .map(|url| images.fetch_image(url))
            .buffered(IMAGE_DOWNLOAD_CONCURRENCY)
            .collect()
            .await;

        for (image, payload) in article.images_mut().zip(payloads) {
            match payload {
                Ok(bytes) => image.payload = Some(bytes.into()),
                Err(err) => folio_warn!("image {} not downloaded: {}", image.url, err),
            }
        }
    }
}
