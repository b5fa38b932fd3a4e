//! Terminal shell around the folio core and engine.
mod app;
mod cli;
mod effects;
mod logging;
mod render;
mod settings;

pub use app::run_app;
