use crate::request::build_request;
use crate::{AppState, Effect, JobId, JobResult, Msg, Severity};

/// Pure update function: applies a message to state and returns any effects.
pub fn update(mut state: AppState, msg: Msg) -> (AppState, Vec<Effect>) {
    let effects = match msg {
        Msg::UrlChanged(url) => {
            state.set_url_input(url);
            Vec::new()
        }
        Msg::FormatToggled { format, enabled } => {
            state.set_format(format, enabled);
            Vec::new()
        }
        Msg::RenderModeChanged(mode) => {
            state.set_render_mode(mode);
            Vec::new()
        }
        Msg::DestinationChanged(destination) => {
            state.set_destination(destination);
            Vec::new()
        }
        Msg::OpenWhenDoneChanged(open) => {
            state.set_open_when_done(open);
            Vec::new()
        }
        Msg::ExportClicked => export_clicked(&mut state),
        Msg::AbortClicked => {
            let Some(job_id) = state.active_job_id() else {
                return (state, Vec::new());
            };
            let job = state.active_mut(job_id).filter(|job| !job.abort_requested);
            match job {
                Some(job) => {
                    job.abort_requested = true;
                    state.set_status("Aborting...");
                    vec![Effect::AbortJob { job_id }]
                }
                None => Vec::new(),
            }
        }
        Msg::NoticesDismissed => {
            state.clear_notices();
            Vec::new()
        }
        Msg::JobProgress {
            job_id,
            stage,
            bytes,
        } => {
            if let Some(job) = state.active_mut(job_id) {
                job.stage = stage;
                if bytes.is_some() {
                    job.bytes = bytes;
                }
                state.mark_dirty();
            }
            Vec::new()
        }
        Msg::ArticleExtracted { job_id, article } => {
            if state.active_mut(job_id).is_some() {
                state.set_article(article);
            }
            Vec::new()
        }
        Msg::JobDone { job_id, result } => job_done(&mut state, job_id, result),
        Msg::Tick | Msg::NoOp => Vec::new(),
    };

    (state, effects)
}

fn export_clicked(state: &mut AppState) -> Vec<Effect> {
    if state.is_busy() {
        state.push_notice(
            Severity::Warning,
            "An export is already running; wait for it or abort it first.",
        );
        return Vec::new();
    }

    let request = match build_request(
        state.url_input(),
        &state.formats(),
        state.destination(),
        state.render_mode(),
    ) {
        Ok(request) => request,
        Err(problem) => {
            state.push_notice(Severity::Warning, problem.to_string());
            return Vec::new();
        }
    };

    let job_id = state.begin_job(request.url.clone());
    vec![Effect::StartJob { job_id, request }]
}

fn job_done(state: &mut AppState, job_id: JobId, result: JobResult) -> Vec<Effect> {
    if state.active_mut(job_id).is_none() {
        return Vec::new();
    }

    let mut effects = Vec::new();
    match &result {
        JobResult::Success { outputs, .. } => {
            let files = outputs
                .iter()
                .map(|output| output.path.display().to_string())
                .collect::<Vec<_>>()
                .join(", ");
            state.set_status(format!("Saved {files}"));
            let skipped: usize = outputs.iter().map(|output| output.images_skipped).sum();
            if skipped > 0 {
                state.push_notice(
                    Severity::Warning,
                    format!("{skipped} image(s) could not be embedded and were left out."),
                );
            }
            for output in outputs {
                let details = match output.page_count {
                    Some(pages) => format!(" ({pages} page(s), {} image(s))", output.images_embedded),
                    None => String::new(),
                };
                state.push_notice(
                    Severity::Info,
                    format!(
                        "{} written to {}{details}",
                        output.format.label(),
                        output.path.display()
                    ),
                );
            }
            if state.open_when_done() {
                if let Some(first) = outputs.first() {
                    effects.push(Effect::OpenFile {
                        path: first.path.clone(),
                    });
                }
            }
        }
        JobResult::Failed { class, message } => {
            state.set_status(format!("Export failed ({class})"));
            state.push_notice(Severity::Error, format!("{class}: {message}"));
        }
        JobResult::Cancelled => {
            state.set_status("Export aborted");
            state.push_notice(Severity::Warning, "Export aborted; no files were written.");
        }
    }
    state.finish_job(result);
    effects
}
