//! Settings file (`folio.ron`) and how the command line overrides it.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use folio_core::{OutputFormat, RenderMode};
use folio_engine::{BrowserSettings, EngineConfig, DEFAULT_USER_AGENT};
use serde::{Deserialize, Serialize};

use super::cli::{Cli, RenderChoice};
use super::logging::LogDestination;

const SETTINGS_FILENAME: &str = "folio.ron";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SavedFormat {
    Pdf,
    Txt,
}

impl From<SavedFormat> for OutputFormat {
    fn from(format: SavedFormat) -> Self {
        match format {
            SavedFormat::Pdf => OutputFormat::Pdf,
            SavedFormat::Txt => OutputFormat::Txt,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub render_mode: RenderChoice,
    pub formats: Vec<SavedFormat>,
    /// File or directory the export is written to.
    pub output: PathBuf,
    pub open_when_done: bool,
    pub request_timeout_secs: u64,
    pub connect_timeout_secs: u64,
    pub user_agent: String,
    /// Minimum characters of article text.
    pub min_text_length: usize,
    pub max_link_density: f64,
    pub chrome_executable: Option<PathBuf>,
    /// TrueType font for PDF text, for scripts outside Latin-1.
    pub pdf_font: Option<PathBuf>,
    pub log: LogDestination,
    #[serde(skip)]
    pub verbose: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            render_mode: RenderChoice::Auto,
            formats: vec![SavedFormat::Pdf],
            output: PathBuf::from("."),
            open_when_done: false,
            request_timeout_secs: 20,
            connect_timeout_secs: 10,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            min_text_length: 100,
            max_link_density: 0.5,
            chrome_executable: None,
            pdf_font: None,
            log: LogDestination::File,
            verbose: false,
        }
    }
}

impl Settings {
    /// Loads settings from `path`, or `./folio.ron` when `None`.
    ///
    /// Never fails: problems fall back to defaults and are returned as
    /// warnings, since logging is not set up yet when this runs.
    pub fn load(path: Option<&Path>) -> (Settings, Vec<String>) {
        let explicit = path.is_some();
        let path = path
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from(SETTINGS_FILENAME));

        let content = match fs::read_to_string(&path) {
            Ok(text) => text,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound && !explicit => {
                return (Settings::default(), Vec::new());
            }
            Err(err) => {
                let warning = format!("Failed to read settings from {path:?}: {err}");
                return (Settings::default(), vec![warning]);
            }
        };

        match ron::from_str::<Settings>(&content) {
            Ok(settings) => (settings, Vec::new()),
            Err(err) => {
                let warning = format!("Failed to parse settings from {path:?}: {err}");
                (Settings::default(), vec![warning])
            }
        }
    }

    pub fn apply_cli(&mut self, cli: &Cli) {
        if cli.browser {
            self.render_mode = RenderChoice::Always;
        } else if let Some(render) = cli.render {
            self.render_mode = render;
        }
        if cli.pdf || cli.txt {
            self.formats.clear();
            if cli.pdf {
                self.formats.push(SavedFormat::Pdf);
            }
            if cli.txt {
                self.formats.push(SavedFormat::Txt);
            }
        }
        if let Some(output) = &cli.output {
            self.output = output.clone();
        }
        if cli.open {
            self.open_when_done = true;
        }
        if let Some(secs) = cli.timeout {
            self.request_timeout_secs = secs;
        }
        if let Some(log) = cli.log {
            self.log = log;
        }
        self.verbose = cli.verbose;
    }

    pub fn render_mode(&self) -> RenderMode {
        self.render_mode.into()
    }

    pub fn is_enabled(&self, format: OutputFormat) -> bool {
        self.formats
            .iter()
            .any(|saved| OutputFormat::from(*saved) == format)
    }

    pub fn engine_config(&self) -> EngineConfig {
        let mut config = EngineConfig::default();
        config.fetch.request_timeout = Duration::from_secs(self.request_timeout_secs.max(1));
        config.fetch.connect_timeout = Duration::from_secs(self.connect_timeout_secs.max(1));
        config.fetch.user_agent = self.user_agent.clone();
        config.extract.min_text_length = self.min_text_length;
        config.extract.max_link_density = self.max_link_density;
        config.export.pdf_font = self.pdf_font.clone();
        config.browser = Some(BrowserSettings {
            executable: self.chrome_executable.clone(),
            navigation_timeout: config.fetch.request_timeout,
            ..BrowserSettings::default()
        });
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    #[test]
    fn missing_explicit_file_is_reported() {
        let dir = TempDir::new().unwrap();
        let (settings, warnings) = Settings::load(Some(&dir.path().join("absent.ron")));
        assert_eq!(settings, Settings::default());
        assert_eq!(warnings.len(), 1);
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("folio.ron");
        fs::write(
            &path,
            r#"(render_mode: never, formats: [pdf, txt], request_timeout_secs: 5, pdf_font: Some("/fonts/Serif.ttf"))"#,
        )
        .unwrap();

        let (settings, warnings) = Settings::load(Some(&path));
        assert!(warnings.is_empty(), "{warnings:?}");
        assert_eq!(settings.render_mode(), RenderMode::Static);
        assert!(settings.is_enabled(OutputFormat::Txt));
        assert_eq!(settings.request_timeout_secs, 5);
        assert_eq!(settings.min_text_length, 100);
        assert_eq!(settings.output, PathBuf::from("."));
        assert_eq!(
            settings.engine_config().export.pdf_font,
            Some(PathBuf::from("/fonts/Serif.ttf"))
        );
    }

    #[test]
    fn broken_file_falls_back_with_a_warning() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("folio.ron");
        fs::write(&path, "(render_mode: sometimes").unwrap();

        let (settings, warnings) = Settings::load(Some(&path));
        assert_eq!(settings, Settings::default());
        assert!(warnings[0].starts_with("Failed to parse settings"));
    }

    #[test]
    fn command_line_overrides_the_file() {
        let mut settings = Settings {
            formats: vec![SavedFormat::Pdf, SavedFormat::Txt],
            ..Settings::default()
        };
        let cli = Cli::try_parse_from([
            "folio",
            "--txt",
            "--browser",
            "--timeout",
            "60",
            "-o",
            "saved",
            "https://a.test",
        ])
        .unwrap();
        settings.apply_cli(&cli);

        assert_eq!(settings.formats, vec![SavedFormat::Txt]);
        assert_eq!(settings.render_mode(), RenderMode::Browser);
        assert_eq!(settings.output, PathBuf::from("saved"));

        let config = settings.engine_config();
        assert_eq!(config.fetch.request_timeout, Duration::from_secs(60));
        assert_eq!(
            config.browser.map(|browser| browser.navigation_timeout),
            Some(Duration::from_secs(60))
        );
    }
}
