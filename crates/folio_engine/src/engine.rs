use std::io;
use std::sync::{mpsc, Arc, Mutex, PoisonError};
use std::thread;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use folio_logging::{folio_info, set_current_job};

use crate::export::ExportSettings;
use crate::extract::{ExtractSettings, ReadabilityExtractor};
use crate::fetch::{ChannelProgressSink, FetchSettings, PageFetcher, ReqwestFetcher};
use crate::pipeline::{JobRequest, Pipeline};
use crate::source::PageSource;
use crate::{EngineEvent, JobId, JobProgress, Stage};

#[cfg(feature = "browser")]
use crate::browser::{BrowserSettings, ChromeRenderer};

#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub fetch: FetchSettings,
    pub extract: ExtractSettings,
    pub export: ExportSettings,
    /// Headless browser used for `Always`/`Auto` rendering; `None` disables it.
    #[cfg(feature = "browser")]
    pub browser: Option<BrowserSettings>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            fetch: FetchSettings::default(),
            extract: ExtractSettings::default(),
            export: ExportSettings::default(),
            #[cfg(feature = "browser")]
            browser: Some(BrowserSettings::default()),
        }
    }
}

enum EngineCommand {
    Start {
        job_id: JobId,
        request: JobRequest,
        cancel: CancellationToken,
    },
}

/// Jobs queued or running, with the token that aborts each.
type ActiveJobs = Arc<Mutex<Vec<(JobId, CancellationToken)>>>;

/// Handle to the worker thread that runs jobs one at a time.
pub struct EngineHandle {
    cmd_tx: mpsc::Sender<EngineCommand>,
    event_tx: mpsc::Sender<EngineEvent>,
    event_rx: mpsc::Receiver<EngineEvent>,
    active: ActiveJobs,
}

impl EngineHandle {
    pub fn new(config: EngineConfig) -> io::Result<Self> {
        Self::with_pipeline(build_pipeline(config))
    }

    /// Starts the worker around an already assembled pipeline.
    pub fn with_pipeline(pipeline: Pipeline) -> io::Result<Self> {
        let (cmd_tx, cmd_rx) = mpsc::channel();
        let (event_tx, event_rx) = mpsc::channel();
        let active: ActiveJobs = Arc::new(Mutex::new(Vec::new()));
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;

        let worker_active = active.clone();
        let worker_tx = event_tx.clone();
        thread::Builder::new()
            .name("folio-engine".to_string())
            .spawn(move || {
                let sink = ChannelProgressSink::new(worker_tx.clone());
                while let Ok(command) = cmd_rx.recv() {
                    match command {
                        EngineCommand::Start {
                            job_id,
                            request,
                            cancel,
                        } => {
                            let _scope = set_current_job(job_id);
                            folio_info!("starting {}", request.url);
                            let result =
                                runtime.block_on(pipeline.run(job_id, &request, &sink, &cancel));
                            lock(&worker_active).retain(|(id, _)| *id != job_id);
                            match &result {
                                Ok(outcome) => {
                                    folio_info!("finished with {} output(s)", outcome.outputs.len())
                                }
                                Err(err) => folio_info!("failed: {} ({})", err, err.class()),
                            }
                            let _ = worker_tx.send(EngineEvent::JobCompleted { job_id, result });
                        }
                    }
                }
            })?;

        Ok(Self {
            cmd_tx,
            event_tx,
            event_rx,
            active,
        })
    }

    /// Queues a job; it starts once every earlier job has completed.
    pub fn start(&self, job_id: JobId, request: JobRequest) {
        let cancel = CancellationToken::new();
        lock(&self.active).push((job_id, cancel.clone()));
        let _ = self.event_tx.send(EngineEvent::Progress(JobProgress {
            job_id,
            stage: Stage::Queued,
            bytes: None,
        }));
        let _ = self.cmd_tx.send(EngineCommand::Start {
            job_id,
            request,
            cancel,
        });
    }

    /// Cancels every queued or running job. Returns whether there was one.
    pub fn abort(&self) -> bool {
        let active = lock(&self.active);
        for (_, cancel) in active.iter() {
            cancel.cancel();
        }
        !active.is_empty()
    }

    pub fn is_busy(&self) -> bool {
        !lock(&self.active).is_empty()
    }

    pub fn try_recv(&self) -> Option<EngineEvent> {
        self.event_rx.try_recv().ok()
    }

    pub fn recv_timeout(&self, timeout: Duration) -> Option<EngineEvent> {
        self.event_rx.recv_timeout(timeout).ok()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn build_pipeline(config: EngineConfig) -> Pipeline {
    let http = Arc::new(ReqwestFetcher::new(config.fetch));

    #[cfg(feature = "browser")]
    let browser = config
        .browser
        .map(|settings| Arc::new(ChromeRenderer::new(settings)) as Arc<dyn PageFetcher>);
    #[cfg(not(feature = "browser"))]
    let browser: Option<Arc<dyn PageFetcher>> = None;

    let source = PageSource::new(http.clone(), browser);
    folio_info!(
        "engine ready, browser rendering {}",
        if source.has_browser() { "available" } else { "disabled" }
    );
    let extractor = Arc::new(ReadabilityExtractor::new(config.extract));
    Pipeline::new(source, http, extractor).with_export_settings(config.export)
}
