use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use folio_core::RenderMode;
use serde::{Deserialize, Serialize};

use super::logging::LogDestination;

/// Save a web article as a clean PDF and/or plain-text file.
#[derive(Debug, Parser)]
#[command(name = "folio", version, about)]
pub struct Cli {
    /// Address of the article; `https://` is assumed when the scheme is missing.
    pub url: String,

    /// Always render the page in a headless browser first.
    #[arg(long, conflicts_with = "render")]
    pub browser: bool,

    /// When to render the page in a headless browser.
    #[arg(long, value_enum)]
    pub render: Option<RenderChoice>,

    /// Write a PDF.
    #[arg(long)]
    pub pdf: bool,

    /// Write a plain-text file.
    #[arg(long)]
    pub txt: bool,

    /// Output file or directory.
    #[arg(short, long, value_name = "PATH")]
    pub output: Option<PathBuf>,

    /// Open the first written file when the export finishes.
    #[arg(long)]
    pub open: bool,

    /// Request timeout in seconds.
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Where log lines go.
    #[arg(long, value_enum)]
    pub log: Option<LogDestination>,

    /// Log debug detail.
    #[arg(short, long)]
    pub verbose: bool,

    /// Settings file (defaults to ./folio.ron).
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RenderChoice {
    Never,
    Always,
    Auto,
}

impl From<RenderChoice> for RenderMode {
    fn from(choice: RenderChoice) -> Self {
        match choice {
            RenderChoice::Never => RenderMode::Static,
            RenderChoice::Always => RenderMode::Browser,
            RenderChoice::Auto => RenderMode::Auto,
        }
    }
}

impl Cli {
    /// Render mode requested on the command line, if any.
    pub fn render_mode(&self) -> Option<RenderMode> {
        if self.browser {
            return Some(RenderMode::Browser);
        }
        self.render.map(RenderMode::from)
    }
}
