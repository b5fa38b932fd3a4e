//! Folio core: pure shell state machine and view-model helpers.
mod effect;
mod msg;
mod request;
mod state;
mod update;
mod view_model;

pub use effect::Effect;
pub use msg::Msg;
pub use request::{build_request, InputProblem, JobRequest, OutputFormat, OutputTarget, RenderMode};
pub use state::{
    AppState, ArticlePreview, JobId, JobResult, Notice, OutputSummary, Severity, Stage,
};
pub use update::update;
pub use view_model::{ActiveJobView, AppViewModel};
