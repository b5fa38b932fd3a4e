use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use folio_logging::{folio_info, folio_warn};

use crate::article::Article;
use crate::filename::suggested_filename;
use crate::pdf::render_pdf;
use crate::persist::{write_atomically, PersistError};
use crate::text::render_text;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExportFormat {
    Pdf,
    Txt,
}

impl ExportFormat {
    pub fn extension(self) -> &'static str {
        match self {
            ExportFormat::Pdf => "pdf",
            ExportFormat::Txt => "txt",
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExportFormat::Pdf => write!(f, "PDF"),
            ExportFormat::Txt => write!(f, "TXT"),
        }
    }
}

/// One requested output of a job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportTarget {
    pub format: ExportFormat,
    /// File path, or a directory to receive a [`suggested_filename`].
    pub path: PathBuf,
}

impl ExportTarget {
    pub fn new(format: ExportFormat, path: impl Into<PathBuf>) -> Self {
        Self {
            format,
            path: path.into(),
        }
    }
}

/// Rendering options shared by every output of a job.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExportSettings {
    /// TrueType font for PDF text; system Unicode fonts are tried after it.
    pub pdf_font: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct ExportRequest<'a> {
    pub article: &'a Article,
    pub format: ExportFormat,
    pub destination: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ImageError {
    #[error("image was not downloaded")]
    NotDownloaded,
    #[error("image could not be decoded: {0}")]
    Decode(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedImage {
    pub url: String,
    pub reason: ImageError,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportReport {
    pub path: PathBuf,
    pub format: ExportFormat,
    /// Pages in the PDF; `None` for text output.
    pub page_count: Option<usize>,
    pub images_embedded: usize,
    pub images_skipped: Vec<SkippedImage>,
}

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("could not write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: PersistError,
    },
    #[error("pdf generation failed: {0}")]
    Pdf(String),
}

/// Bytes ready to be written plus the report fields known before writing.
struct Rendered {
    destination: PathBuf,
    format: ExportFormat,
    bytes: Vec<u8>,
    page_count: Option<usize>,
    images_embedded: usize,
    images_skipped: Vec<SkippedImage>,
}

impl Rendered {
    fn into_report(self, path: PathBuf) -> ExportReport {
        ExportReport {
            path,
            format: self.format,
            page_count: self.page_count,
            images_embedded: self.images_embedded,
            images_skipped: self.images_skipped,
        }
    }
}

/// Forces the extension matching `format`: `article.html` becomes `article.txt`
/// for text output, `notes` becomes `notes.pdf` for PDF output.
pub fn normalize_extension(path: &Path, format: ExportFormat) -> PathBuf {
    let ext = format.extension();
    match path.extension().and_then(|e| e.to_str()) {
        Some(current) if current.eq_ignore_ascii_case(ext) => path.to_path_buf(),
        _ => path.with_extension(ext),
    }
}

/// Final file path for `target`: directories get a generated file name.
pub fn resolve_destination(article: &Article, path: &Path, format: ExportFormat) -> PathBuf {
    if path.is_dir() {
        let name = suggested_filename(Some(&article.title), &article.source_url, format);
        path.join(name)
    } else {
        normalize_extension(path, format)
    }
}

fn render(
    article: &Article,
    format: ExportFormat,
    destination: PathBuf,
    settings: &ExportSettings,
) -> Result<Rendered, ExportError> {
    match format {
        ExportFormat::Txt => Ok(Rendered {
            destination,
            format,
            bytes: render_text(article).into_bytes(),
            page_count: None,
            images_embedded: 0,
            images_skipped: Vec::new(),
        }),
        ExportFormat::Pdf => {
            let pdf = render_pdf(article, settings.pdf_font.as_deref())?;
            Ok(Rendered {
                destination,
                format,
                bytes: pdf.bytes,
                page_count: Some(pdf.page_count),
                images_embedded: pdf.images_embedded,
                images_skipped: pdf.images_skipped,
            })
        }
    }
}

fn write(rendered: Rendered) -> Result<ExportReport, ExportError> {
    let path = write_atomically(&rendered.destination, &rendered.bytes).map_err(|source| {
        ExportError::Io {
            path: rendered.destination.clone(),
            source,
        }
    })?;
    folio_info!(
        "wrote {} ({} bytes) to {}",
        rendered.format,
        rendered.bytes.len(),
        path.display()
    );
    Ok(rendered.into_report(path))
}

pub fn export(request: &ExportRequest<'_>) -> Result<ExportReport, ExportError> {
    let destination = resolve_destination(request.article, &request.destination, request.format);
    write(render(
        request.article,
        request.format,
        destination,
        &ExportSettings::default(),
    )?)
}

/// Renders the article as a paginated PDF and writes it to `path`.
///
/// Images without a payload or with undecodable bytes are skipped and listed
/// in [`ExportReport::images_skipped`].
pub fn export_pdf(article: &Article, path: &Path) -> Result<ExportReport, ExportError> {
    export(&ExportRequest {
        article,
        format: ExportFormat::Pdf,
        destination: path.to_path_buf(),
    })
}

pub fn export_text(article: &Article, path: &Path) -> Result<ExportReport, ExportError> {
    export(&ExportRequest {
        article,
        format: ExportFormat::Txt,
        destination: path.to_path_buf(),
    })
}

pub fn export_all(article: &Article, targets: &[ExportTarget]) -> Result<Vec<ExportReport>, ExportError> {
    export_all_with(article, targets, &ExportSettings::default())
}

/// Exports every target, or none of them.
///
/// All outputs are rendered before the first write; if a later write fails the
/// files already written by this call are removed again.
pub fn export_all_with(
    article: &Article,
    targets: &[ExportTarget],
    settings: &ExportSettings,
) -> Result<Vec<ExportReport>, ExportError> {
    let rendered = targets
        .iter()
        .map(|target| {
            let destination = resolve_destination(article, &target.path, target.format);
            render(article, target.format, destination, settings)
        })
        .collect::<Result<Vec<_>, _>>()?;

    let mut reports: Vec<ExportReport> = Vec::with_capacity(rendered.len());
    for item in rendered {
        match write(item) {
            Ok(report) => reports.push(report),
            Err(err) => {
                for written in &reports {
                    if let Err(remove_err) = fs::remove_file(&written.path) {
                        folio_warn!(
                            "could not remove {} after failed export: {}",
                            written.path.display(),
                            remove_err
                        );
                    }
                }
                return Err(err);
            }
        }
    }
    Ok(reports)
}
