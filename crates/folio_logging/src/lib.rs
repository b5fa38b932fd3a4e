#![deny(missing_docs)]
//! Shared logging utilities for the folio workspace.
//!
//! This crate provides the `folio_*` logging macros used across the codebase,
//! a job-scoped log prefix and a minimal test initializer for the global logger.

use std::cell::Cell;

#[doc(hidden)]
pub use log as __log;

thread_local! {
    /// Job currently being processed on this thread, if any.
    static CURRENT_JOB: Cell<Option<u64>> = const { Cell::new(None) };
}

/// Marks `job_id` as the job running on the current thread.
///
/// Every `folio_*` macro invoked on this thread is prefixed with `[job N]`
/// until [`clear_current_job`] is called or the returned guard is dropped.
pub fn set_current_job(job_id: u64) -> JobScope {
    CURRENT_JOB.with(|v| v.set(Some(job_id)));
    JobScope { _private: () }
}

/// Removes the job prefix for the current thread.
pub fn clear_current_job() {
    CURRENT_JOB.with(|v| v.set(None));
}

/// Retrieves the job id set for the current thread.
pub fn current_job() -> Option<u64> {
    CURRENT_JOB.with(|v| v.get())
}

/// Guard returned by [`set_current_job`]; clears the prefix on drop.
#[must_use = "the job prefix is cleared when the guard is dropped"]
pub struct JobScope {
    _private: (),
}

impl Drop for JobScope {
    fn drop(&mut self) {
        clear_current_job();
    }
}

/// Prefix inserted in front of every message logged through the macros.
#[doc(hidden)]
pub fn job_prefix() -> String {
    match current_job() {
        Some(job_id) => format!("[job {job_id}] "),
        None => String::new(),
    }
}

/// Logs a trace-level message using the global logging facade.
#[macro_export]
macro_rules! folio_trace {
    ($($arg:tt)*) => {{
        $crate::__log::trace!("{}{}", $crate::job_prefix(), format_args!($($arg)*));
    }};
}

/// Logs an info-level message using the global logging facade.
#[macro_export]
macro_rules! folio_info {
    ($($arg:tt)*) => {{
        $crate::__log::info!("{}{}", $crate::job_prefix(), format_args!($($arg)*));
    }};
}

/// Logs a debug-level message using the global logging facade.
#[macro_export]
macro_rules! folio_debug {
    ($($arg:tt)*) => {{
        $crate::__log::debug!("{}{}", $crate::job_prefix(), format_args!($($arg)*));
    }};
}

/// Logs a warn-level message using the global logging facade.
#[macro_export]
macro_rules! folio_warn {
    ($($arg:tt)*) => {{
        $crate::__log::warn!("{}{}", $crate::job_prefix(), format_args!($($arg)*));
    }};
}

/// Logs an error-level message using the global logging facade.
#[macro_export]
macro_rules! folio_error {
    ($($arg:tt)*) => {{
        $crate::__log::error!("{}{}", $crate::job_prefix(), format_args!($($arg)*));
    }};
}

/// Initializes a simple terminal logger for use in unit tests.
///
/// This safely no-ops if another logger has already been initialized.
pub fn initialize_for_tests() {
    use simplelog::{ColorChoice, CombinedLogger, Config, TermLogger, TerminalMode};

    let level = if cfg!(debug_assertions) {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };

    // Ignore the error if a logger was already set by another test.
    let _ = CombinedLogger::init(vec![TermLogger::new(
        level,
        Config::default(),
        TerminalMode::Mixed,
        ColorChoice::Auto,
    )]);
}
