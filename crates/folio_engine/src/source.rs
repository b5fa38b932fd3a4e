use std::sync::Arc;

use url::Url;

use folio_logging::{folio_info, folio_warn};

use crate::fetch::{PageFetcher, ProgressSink, ReqwestFetcher};
use crate::{FailureKind, FetchError, FetchResult, JobId};

/// Below this many bytes a plain GET is assumed to be a script shell.
const MIN_STATIC_HTML_BYTES: usize = 800;
/// Rendered output shorter than this is treated as a failed render.
const MIN_RENDERED_HTML_BYTES: usize = 200;
/// Visible text under this length next to a `<noscript>` means the page needs scripts.
const NOSCRIPT_TEXT_THRESHOLD: usize = 500;

const JS_HEAVY_HOSTS: &[&str] = &[
    "tesla.com",
    "twitter.com",
    "x.com",
    "instagram.com",
    "facebook.com",
    "youtube.com",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RenderMode {
    /// Plain HTTP GET only.
    Never,
    /// Always render with the headless browser.
    Always,
    /// HTTP first, browser when the static page looks script-dependent.
    #[default]
    Auto,
}

impl From<bool> for RenderMode {
    fn from(use_browser: bool) -> Self {
        if use_browser {
            RenderMode::Always
        } else {
            RenderMode::Never
        }
    }
}

/// Chooses between the HTTP fetcher and the browser according to a [`RenderMode`].
#[derive(Clone)]
pub struct PageSource {
    http: Arc<ReqwestFetcher>,
    browser: Option<Arc<dyn PageFetcher>>,
}

impl PageSource {
    pub fn new(http: Arc<ReqwestFetcher>, browser: Option<Arc<dyn PageFetcher>>) -> Self {
        Self { http, browser }
    }

    pub fn has_browser(&self) -> bool {
        self.browser.is_some()
    }

    pub async fn fetch(
        &self,
        job_id: JobId,
        url: &str,
        mode: RenderMode,
        sink: &dyn ProgressSink,
    ) -> Result<FetchResult, FetchError> {
        match mode {
            RenderMode::Never => self.http.fetch(job_id, url, sink).await,
            RenderMode::Always => match &self.browser {
                Some(browser) => browser.fetch(job_id, url, sink).await,
                None => Err(FetchError::new(
                    FailureKind::BrowserUnavailable,
                    "this build has no headless browser support",
                )),
            },
            RenderMode::Auto => self.fetch_auto(job_id, url, sink).await,
        }
    }

    async fn fetch_auto(
        &self,
        job_id: JobId,
        url: &str,
        sink: &dyn ProgressSink,
    ) -> Result<FetchResult, FetchError> {
        let static_result = self.http.fetch(job_id, url, sink).await;
        if matches!(&static_result, Err(err) if err.kind == FailureKind::InvalidUrl) {
            return static_result;
        }
        let reason = match &static_result {
            Err(err) => Some(format!("static fetch failed ({err})")),
            Ok(page) => render_reason(url, &page.raw_html),
        };

        let (Some(reason), Some(browser)) = (reason, &self.browser) else {
            return static_result;
        };

        folio_info!("falling back to browser rendering: {}", reason);
        match browser.fetch(job_id, url, sink).await {
            Ok(rendered) if rendered.raw_html.trim().len() > MIN_RENDERED_HTML_BYTES => Ok(rendered),
            Ok(_) => {
                folio_warn!("browser output too short, keeping static result");
                static_result
            }
            Err(err) => {
                folio_warn!("browser rendering failed: {}", err);
                static_result
            }
        }
    }
}

/// Returns why a statically fetched page should be rendered, if it should.
pub fn render_reason(url: &str, html: &str) -> Option<String> {
    if html.trim().len() < MIN_STATIC_HTML_BYTES {
        return Some("static html is nearly empty".to_string());
    }
    let lower = html.to_ascii_lowercase();
    if lower.contains("javascript required") || lower.contains("enable javascript") {
        return Some("page asks for javascript".to_string());
    }
    if lower.contains("<noscript") && visible_text_len(html) < NOSCRIPT_TEXT_THRESHOLD {
        return Some("noscript page with little visible text".to_string());
    }
    let host = Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(str::to_ascii_lowercase))?;
    JS_HEAVY_HOSTS
        .iter()
        .find(|known| host == **known || host.ends_with(&format!(".{known}")))
        .map(|known| format!("{known} is script-rendered"))
}

fn visible_text_len(html: &str) -> usize {
    let doc = scraper::Html::parse_document(html);
    let Ok(body) = scraper::Selector::parse("body") else {
        return 0;
    };
    doc.select(&body)
        .next()
        .map(|b| {
            b.descendants()
                .filter(|node| {
                    !node.ancestors().any(|a| {
                        a.value()
                            .as_element()
                            .is_some_and(|e| matches!(e.name(), "script" | "style" | "noscript"))
                    })
                })
                .filter_map(|node| node.value().as_text())
                .map(|t| t.trim().chars().count())
                .sum()
        })
        .unwrap_or(0)
}
