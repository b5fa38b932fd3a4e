use std::path::PathBuf;

use crate::{JobId, JobRequest};

/// Side effects requested by [`crate::update`]; executed by the app's effect runner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    StartJob { job_id: JobId, request: JobRequest },
    AbortJob { job_id: JobId },
    /// Show a written file in the platform's default viewer.
    OpenFile { path: PathBuf },
}
