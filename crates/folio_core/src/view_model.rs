use std::path::PathBuf;

use crate::{ArticlePreview, JobId, JobResult, Notice, RenderMode, Stage};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppViewModel {
    pub url: String,
    pub pdf: bool,
    pub txt: bool,
    pub render_mode: RenderMode,
    pub destination: Option<PathBuf>,
    pub open_when_done: bool,
    pub active: Option<ActiveJobView>,
    pub article: Option<ArticlePreview>,
    pub last_result: Option<JobResult>,
    pub notices: Vec<Notice>,
    pub status: String,
    pub dirty: bool,
}

impl AppViewModel {
    /// Export is offered only while nothing is running.
    pub fn can_export(&self) -> bool {
        self.active.is_none()
    }

    pub fn can_abort(&self) -> bool {
        self.active.as_ref().is_some_and(|job| !job.abort_requested)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveJobView {
    pub job_id: JobId,
    pub url: String,
    pub stage: Stage,
    pub bytes: Option<u64>,
    pub abort_requested: bool,
}
