use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use folio_core::{update, AppState, JobResult, Msg, OutputFormat};
use folio_engine::EngineHandle;
use folio_logging::{folio_info, folio_trace, folio_warn};

use super::cli::Cli;
use super::effects::EffectRunner;
use super::logging;
use super::render::TerminalRenderer;
use super::settings::Settings;

/// How long the loop waits for engine events before checking for input again.
const POLL_INTERVAL: Duration = Duration::from_millis(75);

pub fn run_app() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();
    let (mut settings, warnings) = Settings::load(cli.config.as_deref());
    settings.apply_cli(&cli);

    logging::initialize(settings.log, settings.verbose);
    for warning in &warnings {
        folio_warn!("{}", warning);
        eprintln!("warning: {warning}");
    }
    folio_info!("folio starting url={}", cli.url);

    let engine =
        EngineHandle::new(settings.engine_config()).context("failed to start the export worker")?;
    let runner = EffectRunner::new(engine);

    let (msg_tx, msg_rx) = mpsc::channel::<Msg>();
    spawn_ctrl_c_listener(msg_tx.clone());
    for msg in initial_msgs(&cli.url, &settings) {
        let _ = msg_tx.send(msg);
    }

    let mut state = AppState::new();
    let mut renderer = TerminalRenderer::new();
    loop {
        let mut msgs: Vec<Msg> = msg_rx.try_iter().collect();
        msgs.extend(runner.poll_events(POLL_INTERVAL));

        for msg in msgs {
            folio_trace!("msg {:?}", msg);
            let (next, effects) = update(state, msg);
            state = next;
            runner.run(effects);
        }

        if state.consume_dirty() {
            for line in renderer.render(&state.view()) {
                println!("{line}");
            }
        }

        if !state.is_busy() {
            break;
        }
    }

    let code = match state.view().last_result {
        Some(JobResult::Success { .. }) => ExitCode::SUCCESS,
        _ => ExitCode::FAILURE,
    };
    folio_info!("folio finished status={:?}", state.view().status);
    Ok(code)
}

/// Messages that fill the form from settings and press Export.
fn initial_msgs(url: &str, settings: &Settings) -> Vec<Msg> {
    let mut msgs = vec![Msg::UrlChanged(url.to_string())];
    msgs.extend(OutputFormat::ALL.iter().map(|&format| Msg::FormatToggled {
        format,
        enabled: settings.is_enabled(format),
    }));
    msgs.push(Msg::RenderModeChanged(settings.render_mode()));
    msgs.push(Msg::DestinationChanged(destination(settings)));
    msgs.push(Msg::OpenWhenDoneChanged(settings.open_when_done));
    msgs.push(Msg::ExportClicked);
    msgs
}

fn destination(settings: &Settings) -> Option<PathBuf> {
    if settings.output.as_os_str().is_empty() {
        None
    } else {
        Some(settings.output.clone())
    }
}

/// Ctrl-C requests an abort of the running job instead of killing the process.
fn spawn_ctrl_c_listener(msg_tx: mpsc::Sender<Msg>) {
    thread::spawn(move || {
        let runtime = match tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
        {
            Ok(runtime) => runtime,
            Err(err) => {
                folio_warn!("Ctrl-C handling unavailable: {}", err);
                return;
            }
        };
        runtime.block_on(async move {
            while tokio::signal::ctrl_c().await.is_ok() {
                folio_info!("Ctrl-C received; aborting");
                if msg_tx.send(Msg::AbortClicked).is_err() {
                    break;
                }
            }
        });
    });
}
