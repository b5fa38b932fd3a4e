//! Headless Chrome rendering for pages that only produce content after scripts run.

use std::path::PathBuf;
use std::time::Duration;

use chromiumoxide::browser::{Browser, BrowserConfig};
use futures_util::StreamExt;

use folio_logging::{folio_info, folio_warn};

use crate::fetch::{parse_http_url, PageFetcher, ProgressSink};
use crate::{EngineEvent, FailureKind, FetchError, FetchResult, JobId, JobProgress, Stage};

#[derive(Debug, Clone)]
pub struct BrowserSettings {
    /// Chrome/Chromium binary; auto-detected when `None`.
    pub executable: Option<PathBuf>,
    pub navigation_timeout: Duration,
    /// Extra wait after navigation so late XHR content lands in the DOM.
    pub settle_delay: Duration,
}

impl Default for BrowserSettings {
    fn default() -> Self {
        Self {
            executable: None,
            navigation_timeout: Duration::from_secs(20),
            settle_delay: Duration::from_secs(2),
        }
    }
}

/// Launches a fresh headless browser per page and captures the rendered DOM.
#[derive(Debug, Clone, Default)]
pub struct ChromeRenderer {
    settings: BrowserSettings,
}

impl ChromeRenderer {
    pub fn new(settings: BrowserSettings) -> Self {
        Self { settings }
    }

    fn config(&self) -> Result<BrowserConfig, FetchError> {
        let mut builder = BrowserConfig::builder();
        if let Some(path) = &self.settings.executable {
            builder = builder.chrome_executable(path);
        }
        builder
            .build()
            .map_err(|err| FetchError::new(FailureKind::BrowserUnavailable, err))
    }
}

#[async_trait::async_trait]
impl PageFetcher for ChromeRenderer {
    async fn fetch(
        &self,
        job_id: JobId,
        url: &str,
        sink: &dyn ProgressSink,
    ) -> Result<FetchResult, FetchError> {
        let parsed = parse_http_url(url)?;
        sink.emit(EngineEvent::Progress(JobProgress {
            job_id,
            stage: Stage::Rendering,
            bytes: None,
        }));

        let (mut browser, mut handler) = Browser::launch(self.config()?)
            .await
            .map_err(|err| FetchError::new(FailureKind::BrowserUnavailable, err.to_string()))?;
        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    break;
                }
            }
        });

        let rendered = tokio::time::timeout(
            self.settings.navigation_timeout,
            render_page(&browser, parsed.as_str(), self.settings.settle_delay),
        )
        .await;

        if let Err(err) = browser.close().await {
            folio_warn!("closing browser failed: {}", err);
        }
        let _ = browser.wait().await;
        handler_task.abort();

        let (html, final_url) = match rendered {
            Ok(result) => result?,
            Err(_) => {
                return Err(FetchError::new(
                    FailureKind::Timeout,
                    format!(
                        "page did not finish rendering within {:?}",
                        self.settings.navigation_timeout
                    ),
                ))
            }
        };

        folio_info!("rendered {} bytes from {}", html.len(), final_url);
        Ok(FetchResult {
            source_url: url.to_string(),
            final_url,
            raw_html: html,
            content_type: Some("text/html".to_string()),
            encoding: "UTF-8".to_string(),
            rendered: true,
        })
    }
}

async fn render_page(
    browser: &Browser,
    url: &str,
    settle_delay: Duration,
) -> Result<(String, String), FetchError> {
    let page = browser.new_page(url).await.map_err(browser_error)?;
    page.wait_for_navigation().await.map_err(browser_error)?;
    tokio::time::sleep(settle_delay).await;
    let html = page.content().await.map_err(browser_error)?;
    let final_url = page
        .url()
        .await
        .map_err(browser_error)?
        .unwrap_or_else(|| url.to_string());
    Ok((html, final_url))
}

fn browser_error(err: chromiumoxide::error::CdpError) -> FetchError {
    FetchError::new(FailureKind::Browser, err.to_string())
}
