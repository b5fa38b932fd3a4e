use std::path::Path;
use std::process::Command;
use std::time::Duration;

use folio_core::{
    ArticlePreview, Effect, JobRequest, JobResult, Msg, OutputFormat, OutputSummary, RenderMode,
    Stage,
};
use folio_engine::{
    ArticleSummary, EngineEvent, EngineHandle, ExportFormat, ExportReport, ExportTarget,
    JobOutcome, PipelineError,
};
use folio_logging::{folio_error, folio_info, folio_warn};

/// Runs core effects against the engine and turns engine events back into messages.
pub struct EffectRunner {
    engine: EngineHandle,
}

impl EffectRunner {
    pub fn new(engine: EngineHandle) -> Self {
        Self { engine }
    }

    pub fn run(&self, effects: Vec<Effect>) {
        for effect in effects {
            match effect {
                Effect::StartJob { job_id, request } => {
                    folio_info!(
                        "StartJob job_id={} url={} outputs={}",
                        job_id,
                        request.url,
                        request.outputs.len()
                    );
                    self.engine.start(job_id, to_engine_request(request));
                }
                Effect::AbortJob { job_id } => {
                    let aborted = self.engine.abort();
                    folio_info!("AbortJob job_id={} signalled={}", job_id, aborted);
                }
                Effect::OpenFile { path } => open_file(&path),
            }
        }
    }

    /// Waits up to `timeout` for the first engine event, then drains the rest.
    pub fn poll_events(&self, timeout: Duration) -> Vec<Msg> {
        let Some(first) = self.engine.recv_timeout(timeout) else {
            return Vec::new();
        };
        let mut msgs = vec![map_event(first)];
        while let Some(event) = self.engine.try_recv() {
            msgs.push(map_event(event));
        }
        msgs
    }
}

fn to_engine_request(request: JobRequest) -> folio_engine::JobRequest {
    let render_mode = match request.render_mode {
        RenderMode::Static => folio_engine::RenderMode::Never,
        RenderMode::Browser => folio_engine::RenderMode::Always,
        RenderMode::Auto => folio_engine::RenderMode::Auto,
    };
    let targets = request
        .outputs
        .into_iter()
        .map(|output| ExportTarget::new(map_format(output.format), output.path))
        .collect();
    folio_engine::JobRequest {
        url: request.url,
        render_mode,
        targets,
    }
}

fn map_format(format: OutputFormat) -> ExportFormat {
    match format {
        OutputFormat::Pdf => ExportFormat::Pdf,
        OutputFormat::Txt => ExportFormat::Txt,
    }
}

fn map_event(event: EngineEvent) -> Msg {
    match event {
        EngineEvent::Progress(progress) => Msg::JobProgress {
            job_id: progress.job_id,
            stage: map_stage(progress.stage),
            bytes: progress.bytes,
        },
        EngineEvent::Extracted { job_id, summary } => Msg::ArticleExtracted {
            job_id,
            article: map_summary(summary),
        },
        EngineEvent::JobCompleted { job_id, result } => {
            if let Err(err) = &result {
                if *err != PipelineError::Cancelled {
                    folio_error!("job {} failed: {}", job_id, err);
                }
            }
            Msg::JobDone {
                job_id,
                result: map_result(result),
            }
        }
    }
}

fn map_stage(stage: folio_engine::Stage) -> Stage {
    match stage {
        folio_engine::Stage::Queued => Stage::Queued,
        folio_engine::Stage::Fetching => Stage::Fetching,
        folio_engine::Stage::Rendering => Stage::Rendering,
        folio_engine::Stage::Extracting => Stage::Extracting,
        folio_engine::Stage::DownloadingImages => Stage::DownloadingImages,
        folio_engine::Stage::Writing => Stage::Writing,
        folio_engine::Stage::Done => Stage::Done,
    }
}

fn map_summary(summary: ArticleSummary) -> ArticlePreview {
    ArticlePreview {
        title: summary.title,
        author: summary.author,
        published: summary.published,
        lead_image: summary.lead_image,
        paragraph_count: summary.paragraph_count,
        image_count: summary.image_count,
        preview: summary.preview,
    }
}

fn map_result(result: Result<JobOutcome, PipelineError>) -> JobResult {
    match result {
        Ok(outcome) => JobResult::Success {
            outputs: outcome.outputs.into_iter().map(map_report).collect(),
            rendered: outcome.rendered,
        },
        Err(PipelineError::Cancelled) => JobResult::Cancelled,
        Err(err) => JobResult::Failed {
            class: err.class().to_string(),
            message: err.to_string(),
        },
    }
}

fn map_report(report: ExportReport) -> OutputSummary {
    OutputSummary {
        format: match report.format {
            ExportFormat::Pdf => OutputFormat::Pdf,
            ExportFormat::Txt => OutputFormat::Txt,
        },
        path: report.path,
        page_count: report.page_count,
        images_embedded: report.images_embedded,
        images_skipped: report.images_skipped.len(),
    }
}

fn open_file(path: &Path) {
    let mut command = if cfg!(target_os = "windows") {
        let mut command = Command::new("cmd");
        command.args(["/C", "start", ""]);
        command
    } else if cfg!(target_os = "macos") {
        Command::new("open")
    } else {
        Command::new("xdg-open")
    };
    match command.arg(path).spawn() {
        Ok(_) => folio_info!("Opened {:?}", path),
        Err(err) => folio_warn!("Failed to open {:?}: {}", path, err),
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;
    use folio_core::OutputTarget;
    use folio_engine::{FetchError, SkippedImage};
    use pretty_assertions::assert_eq;

    #[test]
    fn request_maps_render_mode_and_targets() {
        let request = to_engine_request(JobRequest {
            url: "https://a.test/story".to_string(),
            render_mode: RenderMode::Static,
            outputs: vec![
                OutputTarget {
                    format: OutputFormat::Pdf,
                    path: PathBuf::from("out/story.pdf"),
                },
                OutputTarget {
                    format: OutputFormat::Txt,
                    path: PathBuf::from("out/story.txt"),
                },
            ],
        });
        assert_eq!(request.render_mode, folio_engine::RenderMode::Never);
        let formats: Vec<_> = request.targets.iter().map(|t| t.format).collect();
        assert_eq!(formats, vec![ExportFormat::Pdf, ExportFormat::Txt]);
        assert_eq!(request.targets[1].path, PathBuf::from("out/story.txt"));
    }

    #[test]
    fn cancelled_job_is_not_a_failure() {
        assert_eq!(map_result(Err(PipelineError::Cancelled)), JobResult::Cancelled);
    }

    #[test]
    fn failures_carry_their_class() {
        let result = map_result(Err(PipelineError::Http {
            status: 404,
            message: "not found".to_string(),
        }));
        let JobResult::Failed { class, .. } = &result else {
            panic!("expected a failure, got {result:?}");
        };
        assert_eq!(class, "HttpError");

        let err = PipelineError::from(FetchError {
            kind: folio_engine::FailureKind::Timeout,
            message: "slow".to_string(),
        });
        let JobResult::Failed { class, .. } = map_result(Err(err)) else {
            panic!("expected a failure");
        };
        assert_eq!(class, "NetworkError");
    }

    #[test]
    fn summary_keeps_the_lead_image() {
        let preview = map_summary(ArticleSummary {
            title: "Story".to_string(),
            lead_image: Some("https://a.test/lead.jpg".to_string()),
            paragraph_count: 2,
            ..ArticleSummary::default()
        });
        assert_eq!(preview.lead_image.as_deref(), Some("https://a.test/lead.jpg"));
        assert_eq!(preview.paragraph_count, 2);
    }

    #[test]
    fn report_counts_skipped_images() {
        let summary = map_report(ExportReport {
            path: PathBuf::from("a.pdf"),
            format: ExportFormat::Pdf,
            page_count: Some(3),
            images_embedded: 2,
            images_skipped: vec![SkippedImage {
                url: "https://a.test/x.png".to_string(),
                reason: folio_engine::ImageError::NotDownloaded,
            }],
        });
        assert_eq!(summary.format, OutputFormat::Pdf);
        assert_eq!(summary.page_count, Some(3));
        assert_eq!(summary.images_skipped, 1);
    }
}
