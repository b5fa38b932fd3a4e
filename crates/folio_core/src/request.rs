use std::fmt;
use std::path::{Path, PathBuf};

use url::Url;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum OutputFormat {
    Pdf,
    Txt,
}

impl OutputFormat {
    pub const ALL: [OutputFormat; 2] = [OutputFormat::Pdf, OutputFormat::Txt];

    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Pdf => "pdf",
            OutputFormat::Txt => "txt",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            OutputFormat::Pdf => "PDF",
            OutputFormat::Txt => "TXT",
        }
    }
}

/// How the page is fetched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RenderMode {
    /// Plain HTTP only.
    Static,
    /// Always use the headless browser.
    Browser,
    /// HTTP first, browser when the page needs scripts.
    #[default]
    Auto,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputTarget {
    pub format: OutputFormat,
    pub path: PathBuf,
}

/// Validated export request handed to the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobRequest {
    pub url: String,
    pub render_mode: RenderMode,
    pub outputs: Vec<OutputTarget>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputProblem {
    MissingUrl,
    UnsupportedUrl(String),
    NoFormat,
    NoDestination,
}

impl fmt::Display for InputProblem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InputProblem::MissingUrl => write!(f, "Enter the address of the page to export."),
            InputProblem::UnsupportedUrl(url) => {
                write!(f, "'{url}' is not a web address (http or https).")
            }
            InputProblem::NoFormat => write!(f, "Choose at least one output format (PDF or TXT)."),
            InputProblem::NoDestination => write!(f, "Choose where to save the export."),
        }
    }
}

/// Validates the shell inputs and derives one output path per format.
///
/// A bare host like `example.com/post` is read as `https://example.com/post`.
/// When the destination has an extension, each format gets its own file next
/// to it (`out/story.pdf` also yields `out/story.txt`); otherwise the
/// destination is passed through unchanged.
pub fn build_request(
    url: &str,
    formats: &[OutputFormat],
    destination: Option<&Path>,
    render_mode: RenderMode,
) -> Result<JobRequest, InputProblem> {
    let url = normalize_url(url)?;
    if formats.is_empty() {
        return Err(InputProblem::NoFormat);
    }
    let destination = destination
        .filter(|path| !path.as_os_str().is_empty())
        .ok_or(InputProblem::NoDestination)?;

    let mut formats = formats.to_vec();
    formats.sort();
    formats.dedup();
    let outputs = formats
        .into_iter()
        .map(|format| OutputTarget {
            format,
            path: output_path(destination, format),
        })
        .collect();

    Ok(JobRequest {
        url,
        render_mode,
        outputs,
    })
}

fn normalize_url(raw: &str) -> Result<String, InputProblem> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(InputProblem::MissingUrl);
    }
    let parsed = match Url::parse(trimmed) {
        Err(url::ParseError::RelativeUrlWithoutBase) => Url::parse(&format!("https://{trimmed}")),
        other => other,
    };
    match parsed {
        Ok(url) if matches!(url.scheme(), "http" | "https") && url.host_str().is_some() => {
            Ok(url.to_string())
        }
        _ => Err(InputProblem::UnsupportedUrl(trimmed.to_string())),
    }
}

fn output_path(destination: &Path, format: OutputFormat) -> PathBuf {
    if destination.extension().is_some() {
        destination.with_extension(format.extension())
    } else {
        destination.to_path_buf()
    }
}
