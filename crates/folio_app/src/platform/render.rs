use folio_core::{AppViewModel, Severity, Stage};

/// Turns successive view models into terminal lines, printing only what changed.
#[derive(Debug, Default)]
pub struct TerminalRenderer {
    last_stage: Option<Stage>,
    last_status: String,
    article_shown: bool,
    notices_printed: usize,
}

impl TerminalRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn render(&mut self, view: &AppViewModel) -> Vec<String> {
        let mut lines = Vec::new();

        match &view.active {
            Some(job) => {
                if self.last_stage != Some(job.stage) {
                    self.last_stage = Some(job.stage);
                    let line = match job.bytes {
                        Some(bytes) => {
                            format!("[{}] {} ({} bytes)", job.job_id, job.stage.label(), bytes)
                        }
                        None => format!("[{}] {}", job.job_id, job.stage.label()),
                    };
                    lines.push(line);
                }
            }
            None => self.last_stage = None,
        }

        match &view.article {
            Some(article) if !self.article_shown => {
                self.article_shown = true;
                let mut header = article.title.clone();
                if let Some(author) = &article.author {
                    header.push_str(&format!(" by {author}"));
                }
                if let Some(published) = &article.published {
                    header.push_str(&format!(" ({published})"));
                }
                lines.push(header);
                lines.push(format!(
                    "{} paragraph(s), {} image(s)",
                    article.paragraph_count, article.image_count
                ));
                if let Some(lead) = &article.lead_image {
                    lines.push(format!("Lead image: {lead}"));
                }
                lines.extend(article.preview.lines().map(|line| format!("  {line}")));
            }
            Some(_) => {}
            None => self.article_shown = false,
        }

        if view.notices.len() < self.notices_printed {
            self.notices_printed = 0;
        }
        for notice in &view.notices[self.notices_printed..] {
            let prefix = match notice.severity {
                Severity::Info => "info",
                Severity::Warning => "warning",
                Severity::Error => "error",
            };
            lines.push(format!("{prefix}: {}", notice.message));
        }
        self.notices_printed = view.notices.len();

        if view.status != self.last_status {
            self.last_status = view.status.clone();
            lines.push(view.status.clone());
        }

        lines
    }
}
