use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use folio_engine::{
    EngineEvent, FailureKind, FetchError, FetchResult, FetchSettings, ImageFetcher, JobId,
    JobProgress, PageFetcher, PageSource, PipelineError, ProgressSink, RenderMode,
    ReqwestFetcher, Stage,
};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[derive(Default)]
struct TestSink {
    events: Arc<Mutex<Vec<EngineEvent>>>,
}

impl TestSink {
    fn new() -> Self {
        Self {
            events: Arc::new(Mutex::new(Vec::new())),
        }
    }

    fn take(&self) -> Vec<EngineEvent> {
        self.events.lock().unwrap().drain(..).collect()
    }
}

impl ProgressSink for TestSink {
    fn emit(&self, event: EngineEvent) {
        self.events.lock().unwrap().push(event);
    }
}

/// Stands in for the headless browser and counts how often it is asked.
struct FakeBrowser {
    html: String,
    calls: AtomicUsize,
}

impl FakeBrowser {
    fn new(html: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            html: html.into(),
            calls: AtomicUsize::new(0),
        })
    }
}

#[async_trait::async_trait]
impl PageFetcher for FakeBrowser {
    async fn fetch(
        &self,
        _job_id: JobId,
        url: &str,
        _sink: &dyn ProgressSink,
    ) -> Result<FetchResult, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(FetchResult {
            source_url: url.to_string(),
            final_url: url.to_string(),
            raw_html: self.html.clone(),
            content_type: Some("text/html".to_string()),
            encoding: "UTF-8".to_string(),
            rendered: true,
        })
    }
}

fn rendered_page() -> String {
    format!(
        "<html><body><article><p>{}</p></article></body></html>",
        "Content that only exists after scripts ran. ".repeat(10)
    )
}

fn static_article() -> String {
    format!(
        "<html><head><title>Static</title></head><body><article><p>{}</p></article></body></html>",
        "Server rendered text that needs no scripts at all. ".repeat(30)
    )
}

#[tokio::test]
async fn fetcher_returns_html_and_emits_progress() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/doc"))
        .respond_with(
            ResponseTemplate::new(200).set_body_raw("<html>ok</html>", "text/html; charset=utf-8"),
        )
        .mount(&server)
        .await;

    let fetcher = ReqwestFetcher::new(FetchSettings::default());
    let sink = TestSink::new();
    let url = format!("{}/doc", server.uri());

    let output = fetcher.fetch(1, &url, &sink).await.expect("fetch ok");
    assert_eq!(output.source_url, url);
    assert_eq!(output.final_url, url);
    assert_eq!(output.raw_html, "<html>ok</html>");
    assert_eq!(output.encoding, "UTF-8");
    assert!(!output.rendered);
    assert!(output.content_type.unwrap().starts_with("text/html"));

    let progress = sink
        .take()
        .into_iter()
        .filter_map(|event| match event {
            EngineEvent::Progress(JobProgress { stage, bytes, .. }) => Some((stage, bytes)),
            _ => None,
        })
        .collect::<Vec<_>>();
    assert!(progress.contains(&(Stage::Fetching, Some(15))));
}

#[tokio::test]
async fn not_found_is_an_http_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/missing"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let fetcher = ReqwestFetcher::new(FetchSettings::default());
    let sink = TestSink::new();
    let url = format!("{}/missing", server.uri());

    let err = fetcher.fetch(7, &url, &sink).await.unwrap_err();
    assert_eq!(err.kind, FailureKind::HttpStatus(404));

    let pipeline_err = PipelineError::from(err);
    assert_eq!(pipeline_err.class(), "HttpError");
}

#[tokio::test]
async fn fetcher_times_out_on_slow_response() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/slow"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_delay(Duration::from_millis(250))
                .set_body_string("slow"),
        )
        .mount(&server)
        .await;

    let settings = FetchSettings {
        request_timeout: Duration::from_millis(50),
        ..FetchSettings::default()
    };
    let fetcher = ReqwestFetcher::new(settings);
    let sink = TestSink::new();
    let url = format!("{}/slow", server.uri());

    let err = fetcher.fetch(2, &url, &sink).await.unwrap_err();
    assert_eq!(err.kind, FailureKind::Timeout);
    assert_eq!(PipelineError::from(err).class(), "NetworkError");
}

#[tokio::test]
async fn fetcher_rejects_too_large_response() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/large"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("Content-Type", "text/html")
                .set_body_string("01234567890"),
        )
        .mount(&server)
        .await;

    let settings = FetchSettings {
        max_bytes: 10,
        ..FetchSettings::default()
    };
    let fetcher = ReqwestFetcher::new(settings);
    let sink = TestSink::new();
    let url = format!("{}/large", server.uri());

    let err = fetcher.fetch(3, &url, &sink).await.unwrap_err();
    assert_eq!(
        err.kind,
        FailureKind::TooLarge {
            max_bytes: 10,
            actual: Some(11)
        }
    );
}

#[tokio::test]
async fn fetcher_rejects_non_html_content() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/data.json"))
        .respond_with(ResponseTemplate::new(200).set_body_raw("{}", "application/json"))
        .mount(&server)
        .await;

    let fetcher = ReqwestFetcher::new(FetchSettings::default());
    let url = format!("{}/data.json", server.uri());
    let err = fetcher.fetch(4, &url, &TestSink::new()).await.unwrap_err();
    assert!(matches!(
        err.kind,
        FailureKind::UnsupportedContentType { .. }
    ));
}

#[tokio::test]
async fn invalid_url_never_reaches_the_network() {
    let fetcher = ReqwestFetcher::new(FetchSettings::default());
    let err = fetcher
        .fetch(5, "not a url", &TestSink::new())
        .await
        .unwrap_err();
    assert_eq!(err.kind, FailureKind::InvalidUrl);
}

#[tokio::test]
async fn image_fetch_accepts_only_images() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/pic.png"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(vec![1u8, 2, 3], "image/png"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/page"))
        .respond_with(ResponseTemplate::new(200).set_body_raw("<html></html>", "text/html"))
        .mount(&server)
        .await;

    let fetcher = ReqwestFetcher::new(FetchSettings::default());
    let bytes = fetcher
        .fetch_image(&format!("{}/pic.png", server.uri()))
        .await
        .unwrap();
    assert_eq!(bytes, vec![1, 2, 3]);

    let err = fetcher
        .fetch_image(&format!("{}/page", server.uri()))
        .await
        .unwrap_err();
    assert!(matches!(
        err.kind,
        FailureKind::UnsupportedContentType { .. }
    ));
}

#[tokio::test]
async fn auto_mode_renders_script_shell_pages() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/app"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(
            "<html><body><div id=\"root\"></div></body></html>",
            "text/html",
        ))
        .mount(&server)
        .await;

    let browser = FakeBrowser::new(rendered_page());
    let source = PageSource::new(
        Arc::new(ReqwestFetcher::new(FetchSettings::default())),
        Some(browser.clone()),
    );
    let url = format!("{}/app", server.uri());

    let page = source
        .fetch(1, &url, RenderMode::Auto, &TestSink::new())
        .await
        .unwrap();
    assert!(page.rendered);
    assert_eq!(browser.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn auto_mode_keeps_regular_pages_static() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/story"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(static_article(), "text/html"))
        .mount(&server)
        .await;

    let browser = FakeBrowser::new(rendered_page());
    let source = PageSource::new(
        Arc::new(ReqwestFetcher::new(FetchSettings::default())),
        Some(browser.clone()),
    );
    let url = format!("{}/story", server.uri());

    let page = source
        .fetch(1, &url, RenderMode::Auto, &TestSink::new())
        .await
        .unwrap();
    assert!(!page.rendered);
    assert_eq!(browser.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn auto_mode_falls_back_to_browser_after_http_failure() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/blocked"))
        .respond_with(ResponseTemplate::new(403))
        .mount(&server)
        .await;

    let browser = FakeBrowser::new(rendered_page());
    let source = PageSource::new(
        Arc::new(ReqwestFetcher::new(FetchSettings::default())),
        Some(browser.clone()),
    );
    let url = format!("{}/blocked", server.uri());

    let page = source
        .fetch(1, &url, RenderMode::Auto, &TestSink::new())
        .await
        .unwrap();
    assert!(page.rendered);
}

#[tokio::test]
async fn short_browser_output_keeps_the_http_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/blocked"))
        .respond_with(ResponseTemplate::new(403))
        .mount(&server)
        .await;

    let browser = FakeBrowser::new("<html></html>");
    let source = PageSource::new(
        Arc::new(ReqwestFetcher::new(FetchSettings::default())),
        Some(browser),
    );
    let url = format!("{}/blocked", server.uri());

    let err = source
        .fetch(1, &url, RenderMode::Auto, &TestSink::new())
        .await
        .unwrap_err();
    assert_eq!(err.kind, FailureKind::HttpStatus(403));
}

#[tokio::test]
async fn never_mode_does_not_touch_the_browser() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/app"))
        .respond_with(ResponseTemplate::new(200).set_body_raw("<html></html>", "text/html"))
        .mount(&server)
        .await;

    let browser = FakeBrowser::new(rendered_page());
    let source = PageSource::new(
        Arc::new(ReqwestFetcher::new(FetchSettings::default())),
        Some(browser.clone()),
    );
    let url = format!("{}/app", server.uri());

    let page = source
        .fetch(1, &url, RenderMode::from(false), &TestSink::new())
        .await
        .unwrap();
    assert!(!page.rendered);
    assert_eq!(browser.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn always_mode_without_browser_is_unavailable() {
    let source = PageSource::new(Arc::new(ReqwestFetcher::new(FetchSettings::default())), None);
    let err = source
        .fetch(1, "https://example.com", RenderMode::from(true), &TestSink::new())
        .await
        .unwrap_err();
    assert_eq!(err.kind, FailureKind::BrowserUnavailable);
}
