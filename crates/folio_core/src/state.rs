use std::path::{Path, PathBuf};

use crate::request::{OutputFormat, RenderMode};
use crate::view_model::{ActiveJobView, AppViewModel};

pub type JobId = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Stage {
    #[default]
    Queued,
    Fetching,
    Rendering,
    Extracting,
    DownloadingImages,
    Writing,
    Done,
}

impl Stage {
    pub fn label(self) -> &'static str {
        match self {
            Stage::Queued => "Queued",
            Stage::Fetching => "Fetching page",
            Stage::Rendering => "Rendering in browser",
            Stage::Extracting => "Extracting article",
            Stage::DownloadingImages => "Downloading images",
            Stage::Writing => "Writing files",
            Stage::Done => "Done",
        }
    }
}

/// What the shell shows about the extracted article.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ArticlePreview {
    pub title: String,
    pub author: Option<String>,
    pub published: Option<String>,
    pub lead_image: Option<String>,
    pub paragraph_count: usize,
    pub image_count: usize,
    pub preview: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputSummary {
    pub format: OutputFormat,
    pub path: PathBuf,
    pub page_count: Option<usize>,
    pub images_embedded: usize,
    pub images_skipped: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobResult {
    Success {
        outputs: Vec<OutputSummary>,
        rendered: bool,
    },
    Failed {
        /// Error kind name, e.g. `HttpError`.
        class: String,
        message: String,
    },
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Info,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub severity: Severity,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ActiveJob {
    pub job_id: JobId,
    pub url: String,
    pub stage: Stage,
    pub bytes: Option<u64>,
    pub abort_requested: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppState {
    url_input: String,
    pdf: bool,
    txt: bool,
    render_mode: RenderMode,
    destination: Option<PathBuf>,
    open_when_done: bool,
    next_job_id: JobId,
    active: Option<ActiveJob>,
    article: Option<ArticlePreview>,
    last_result: Option<JobResult>,
    notices: Vec<Notice>,
    status: String,
    dirty: bool,
}

impl Default for AppState {
    fn default() -> Self {
        Self {
            url_input: String::new(),
            pdf: true,
            txt: false,
            render_mode: RenderMode::default(),
            destination: None,
            open_when_done: false,
            next_job_id: 1,
            active: None,
            article: None,
            last_result: None,
            notices: Vec::new(),
            status: "Ready".to_string(),
            dirty: false,
        }
    }
}

impl AppState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn view(&self) -> AppViewModel {
        AppViewModel {
            url: self.url_input.clone(),
            pdf: self.pdf,
            txt: self.txt,
            render_mode: self.render_mode,
            destination: self.destination.clone(),
            open_when_done: self.open_when_done,
            active: self.active.as_ref().map(|job| ActiveJobView {
                job_id: job.job_id,
                url: job.url.clone(),
                stage: job.stage,
                bytes: job.bytes,
                abort_requested: job.abort_requested,
            }),
            article: self.article.clone(),
            last_result: self.last_result.clone(),
            notices: self.notices.clone(),
            status: self.status.clone(),
            dirty: self.dirty,
        }
    }

    /// Returns whether anything changed since the last call, and resets the flag.
    pub fn consume_dirty(&mut self) -> bool {
        std::mem::take(&mut self.dirty)
    }

    pub fn is_busy(&self) -> bool {
        self.active.is_some()
    }

    pub(crate) fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    pub(crate) fn url_input(&self) -> &str {
        &self.url_input
    }

    pub(crate) fn set_url_input(&mut self, url: String) {
        self.url_input = url;
        self.mark_dirty();
    }

    pub(crate) fn set_format(&mut self, format: OutputFormat, enabled: bool) {
        match format {
            OutputFormat::Pdf => self.pdf = enabled,
            OutputFormat::Txt => self.txt = enabled,
        }
        self.mark_dirty();
    }

    pub(crate) fn formats(&self) -> Vec<OutputFormat> {
        OutputFormat::ALL
            .into_iter()
            .filter(|format| match format {
                OutputFormat::Pdf => self.pdf,
                OutputFormat::Txt => self.txt,
            })
            .collect()
    }

    pub(crate) fn render_mode(&self) -> RenderMode {
        self.render_mode
    }

    pub(crate) fn set_render_mode(&mut self, mode: RenderMode) {
        self.render_mode = mode;
        self.mark_dirty();
    }

    pub(crate) fn destination(&self) -> Option<&Path> {
        self.destination.as_deref()
    }

    pub(crate) fn set_destination(&mut self, destination: Option<PathBuf>) {
        self.destination = destination;
        self.mark_dirty();
    }

    pub(crate) fn open_when_done(&self) -> bool {
        self.open_when_done
    }

    pub(crate) fn set_open_when_done(&mut self, open: bool) {
        self.open_when_done = open;
        self.mark_dirty();
    }

    pub(crate) fn begin_job(&mut self, url: String) -> JobId {
        let job_id = self.next_job_id;
        self.next_job_id += 1;
        self.status = format!("Exporting {url}");
        self.active = Some(ActiveJob {
            job_id,
            url,
            stage: Stage::Queued,
            bytes: None,
            abort_requested: false,
        });
        self.article = None;
        self.last_result = None;
        self.notices.clear();
        self.mark_dirty();
        job_id
    }

    /// The running job, only if it is `job_id`; events for older jobs are stale.
    pub(crate) fn active_mut(&mut self, job_id: JobId) -> Option<&mut ActiveJob> {
        self.active.as_mut().filter(|job| job.job_id == job_id)
    }

    pub(crate) fn active_job_id(&self) -> Option<JobId> {
        self.active.as_ref().map(|job| job.job_id)
    }

    pub(crate) fn set_article(&mut self, article: ArticlePreview) {
        self.article = Some(article);
        self.mark_dirty();
    }

    pub(crate) fn finish_job(&mut self, result: JobResult) {
        self.active = None;
        self.last_result = Some(result);
        self.mark_dirty();
    }

    pub(crate) fn set_status(&mut self, status: impl Into<String>) {
        self.status = status.into();
        self.mark_dirty();
    }

    pub(crate) fn push_notice(&mut self, severity: Severity, message: impl Into<String>) {
        self.notices.push(Notice {
            severity,
            message: message.into(),
        });
        self.mark_dirty();
    }

    pub(crate) fn clear_notices(&mut self) {
        if !self.notices.is_empty() {
            self.notices.clear();
            self.mark_dirty();
        }
    }
}
