use std::path::PathBuf;

use crate::{ArticlePreview, JobId, JobResult, OutputFormat, RenderMode, Stage};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Msg {
    /// User edited the URL field.
    UrlChanged(String),
    /// User ticked or cleared an output format checkbox.
    FormatToggled { format: OutputFormat, enabled: bool },
    /// User changed how pages are fetched.
    RenderModeChanged(RenderMode),
    /// User picked (or cleared) the save location.
    DestinationChanged(Option<PathBuf>),
    OpenWhenDoneChanged(bool),
    /// User clicked Export.
    ExportClicked,
    /// User clicked Abort (or pressed Ctrl-C).
    AbortClicked,
    /// User dismissed the notices.
    NoticesDismissed,
    /// Engine progress for a job.
    JobProgress {
        job_id: JobId,
        stage: Stage,
        bytes: Option<u64>,
    },
    /// Engine finished extraction; the article is known before it is written.
    ArticleExtracted {
        job_id: JobId,
        article: ArticlePreview,
    },
    /// Engine completion for a job.
    JobDone { job_id: JobId, result: JobResult },
    /// UI/render tick to coalesce rendering.
    Tick,
    NoOp,
}
