use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};
use std::time::Duration;

use futures_util::StreamExt;
use reqwest::header::CONTENT_TYPE;
use url::Url;

use folio_logging::{folio_debug, folio_info};

use crate::decode::decode_html;
use crate::{EngineEvent, FailureKind, FetchError, FetchResult, JobId, JobProgress, Stage};

pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
    AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120 Safari/537.36";

#[derive(Debug, Clone)]
pub struct FetchSettings {
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
    pub redirect_limit: usize,
    pub max_bytes: u64,
    pub max_image_bytes: u64,
    pub user_agent: String,
    pub allowed_content_types: Vec<String>,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(20),
            redirect_limit: 5,
            max_bytes: 5 * 1024 * 1024,
            max_image_bytes: 10 * 1024 * 1024,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            allowed_content_types: vec![
                "text/html".to_string(),
                "application/xhtml+xml".to_string(),
            ],
        }
    }
}

pub trait ProgressSink: Send + Sync {
    fn emit(&self, event: EngineEvent);
}

pub struct ChannelProgressSink {
    tx: std::sync::mpsc::Sender<EngineEvent>,
}

impl ChannelProgressSink {
    pub fn new(tx: std::sync::mpsc::Sender<EngineEvent>) -> Self {
        Self { tx }
    }
}

impl ProgressSink for ChannelProgressSink {
    fn emit(&self, event: EngineEvent) {
        let _ = self.tx.send(event);
    }
}

/// Sink that drops every event.
pub struct NullProgressSink;

impl ProgressSink for NullProgressSink {
    fn emit(&self, _event: EngineEvent) {}
}

/// Retrieves the HTML of a page.
#[async_trait::async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch(
        &self,
        job_id: JobId,
        url: &str,
        sink: &dyn ProgressSink,
    ) -> Result<FetchResult, FetchError>;
}

/// Retrieves the raw bytes of an image referenced by an article.
#[async_trait::async_trait]
pub trait ImageFetcher: Send + Sync {
    async fn fetch_image(&self, url: &str) -> Result<Vec<u8>, FetchError>;
}

/// Parses `url` and rejects anything that is not an absolute http(s) address.
pub fn parse_http_url(url: &str) -> Result<Url, FetchError> {
    let parsed = Url::parse(url.trim())
        .map_err(|err| FetchError::new(FailureKind::InvalidUrl, err.to_string()))?;
    match parsed.scheme() {
        "http" | "https" if parsed.host_str().is_some() => Ok(parsed),
        scheme => Err(FetchError::new(
            FailureKind::InvalidUrl,
            format!("unsupported url scheme '{scheme}'"),
        )),
    }
}

struct Download {
    bytes: Vec<u8>,
    final_url: String,
    content_type: Option<String>,
    redirect_count: usize,
}

#[derive(Debug, Clone)]
pub struct ReqwestFetcher {
    settings: FetchSettings,
}

impl ReqwestFetcher {
    pub fn new(settings: FetchSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &FetchSettings {
        &self.settings
    }

    fn build_client(&self, redirect_counter: Arc<AtomicUsize>) -> Result<reqwest::Client, FetchError> {
        let redirect_limit = self.settings.redirect_limit;
        let policy = reqwest::redirect::Policy::custom(move |attempt| {
            let count = attempt.previous().len();
            redirect_counter.store(count, Ordering::Relaxed);
            if count > redirect_limit {
                attempt.error("redirect limit exceeded")
            } else {
                attempt.follow()
            }
        });

        reqwest::Client::builder()
            .connect_timeout(self.settings.connect_timeout)
            .timeout(self.settings.request_timeout)
            .user_agent(self.settings.user_agent.clone())
            .redirect(policy)
            .build()
            .map_err(|err| FetchError::new(FailureKind::Network, err.to_string()))
    }

    /// Single GET with size and content-type limits. Progress is reported when `job_id` is set.
    async fn download(
        &self,
        url: Url,
        max_bytes: u64,
        accepts: &(dyn Fn(&str) -> bool + Sync),
        progress: Option<(JobId, &dyn ProgressSink)>,
    ) -> Result<Download, FetchError> {
        let redirect_counter = Arc::new(AtomicUsize::new(0));
        let client = self.build_client(redirect_counter.clone())?;

        let response = client.get(url).send().await.map_err(map_reqwest_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::new(
                FailureKind::HttpStatus(status.as_u16()),
                status.to_string(),
            ));
        }

        if let Some(content_len) = response.content_length() {
            if content_len > max_bytes {
                return Err(FetchError::new(
                    FailureKind::TooLarge {
                        max_bytes,
                        actual: Some(content_len),
                    },
                    "response too large",
                ));
            }
        }

        let final_url = response.url().to_string();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(|value| value.to_string());

        if let Some(ct) = content_type.as_deref() {
            let mime = ct.split(';').next().unwrap_or(ct).trim();
            if !accepts(mime) {
                return Err(FetchError::new(
                    FailureKind::UnsupportedContentType {
                        content_type: ct.to_string(),
                    },
                    "unsupported content type",
                ));
            }
        }

        if let Some((job_id, sink)) = progress {
            sink.emit(EngineEvent::Progress(JobProgress {
                job_id,
                stage: Stage::Fetching,
                bytes: Some(0),
            }));
        }

        let mut bytes = Vec::new();
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(map_reqwest_error)?;
            let next_len = bytes.len() as u64 + chunk.len() as u64;
            if next_len > max_bytes {
                return Err(FetchError::new(
                    FailureKind::TooLarge {
                        max_bytes,
                        actual: Some(next_len),
                    },
                    "response too large",
                ));
            }
            bytes.extend_from_slice(&chunk);
            if let Some((job_id, sink)) = progress {
                sink.emit(EngineEvent::Progress(JobProgress {
                    job_id,
                    stage: Stage::Fetching,
                    bytes: Some(bytes.len() as u64),
                }));
            }
        }

        Ok(Download {
            bytes,
            final_url,
            content_type,
            redirect_count: redirect_counter.load(Ordering::Relaxed),
        })
    }

    fn is_page_content_type(&self, mime: &str) -> bool {
        self.settings
            .allowed_content_types
            .iter()
            .any(|allowed| allowed.eq_ignore_ascii_case(mime))
    }
}

#[async_trait::async_trait]
impl PageFetcher for ReqwestFetcher {
    async fn fetch(
        &self,
        job_id: JobId,
        url: &str,
        sink: &dyn ProgressSink,
    ) -> Result<FetchResult, FetchError> {
        let parsed = parse_http_url(url)?;
        sink.emit(EngineEvent::Progress(JobProgress {
            job_id,
            stage: Stage::Fetching,
            bytes: None,
        }));

        let download = self
            .download(
                parsed,
                self.settings.max_bytes,
                &|mime| self.is_page_content_type(mime),
                Some((job_id, sink)),
            )
            .await?;

        let decoded = decode_html(&download.bytes, download.content_type.as_deref());
        folio_info!(
            "fetched {} bytes from {} ({} redirects, {})",
            download.bytes.len(),
            download.final_url,
            download.redirect_count,
            decoded.encoding_label
        );

        Ok(FetchResult {
            source_url: url.to_string(),
            final_url: download.final_url,
            raw_html: decoded.html,
            content_type: download.content_type,
            encoding: decoded.encoding_label,
            rendered: false,
        })
    }
}

#[async_trait::async_trait]
impl ImageFetcher for ReqwestFetcher {
    async fn fetch_image(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        let parsed = parse_http_url(url)?;
        let download = self
            .download(
                parsed,
                self.settings.max_image_bytes,
                &|mime| {
                    mime.to_ascii_lowercase().starts_with("image/")
                        || mime.eq_ignore_ascii_case("application/octet-stream")
                },
                None,
            )
            .await?;
        folio_debug!("downloaded image {} ({} bytes)", url, download.bytes.len());
        Ok(download.bytes)
    }
}

fn map_reqwest_error(err: reqwest::Error) -> FetchError {
    if err.is_timeout() {
        return FetchError::new(FailureKind::Timeout, err.to_string());
    }
    if err.is_redirect() {
        return FetchError::new(FailureKind::RedirectLimitExceeded, err.to_string());
    }
    FetchError::new(FailureKind::Network, err.to_string())
}
