//! The interactive timer: reads commands from stdin and drives the
//! controller from a single task.
//!
//! The controller never leaves this task (the sound device is not `Send`).
//! Exports are the only work spawned elsewhere; their results come back
//! over a channel so ticks and beats keep flowing while a request is out.

use std::time::Duration;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tokio::time::interval;
use tracing::{debug, info, warn};

use slowjog_core::{CountdownEngine, Metronome, TICK_INTERVAL_MS};
use slowjog_protocol::CreateEventRequest;
use slowjog_server::SignalHandler;

use crate::audio::Output;
use crate::cli::Cli;
use crate::config::{ClientConfig, MetronomeSettings};
use crate::controller::{Controller, ExportNotice, Input, Reaction};
use crate::error::ClientResult;
use crate::export::ExportClient;

/// Runs the timer until `quit`, end of input, or SIGTERM/SIGINT.
pub async fn run(cli: &Cli, config: &ClientConfig) -> ClientResult<()> {
    let server_url = cli.server_url.as_deref().unwrap_or(&config.server.url);
    let timeout = cli
        .timeout
        .map(Duration::from_secs)
        .unwrap_or_else(|| config.timeout());
    let export = ExportClient::new(server_url, timeout)?;

    let mut metronome_config = config.metronome.to_metronome_config();
    if let Some(tempo) = cli.tempo {
        metronome_config = metronome_config.with_tempo(tempo);
    }
    let lookahead = metronome_config.lookahead;
    let output = Output::open(cli.silent);
    info!(silent = output.is_silent(), %server_url, "timer starting");
    let metronome = Metronome::new(output, metronome_config)?;

    let mut engine = CountdownEngine::default();
    match cli.duration {
        Some(total) => engine.configure((total / 60) as i64, (total % 60) as i64),
        None => engine.configure(config.timer.minutes, config.timer.seconds),
    };
    let mut controller = Controller::new(engine, metronome);

    let signal_handler = SignalHandler::new();
    signal_handler.spawn_listener();
    let shutdown = signal_handler.shutdown().wait();
    tokio::pin!(shutdown);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    // Missed ticks are replayed, so a stalled loop still counts every second.
    let mut ticker = interval(Duration::from_millis(TICK_INTERVAL_MS));
    let mut beats = interval(lookahead);
    let (notices_tx, mut notices) = mpsc::channel::<ExportNotice>(4);

    println!("{}", controller.status_line());
    println!("type `help` for commands");

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else {
                    debug!("stdin closed");
                    break;
                };
                let input = match line.parse::<Input>() {
                    Ok(input) => input,
                    Err(message) => {
                        println!("{}", message);
                        continue;
                    }
                };
                if input == Input::Metronome
                    && !controller.metronome_playing()
                    && controller.needs_sample()
                {
                    let fetched = load_sample(&config.metronome, &export).await;
                    controller.install_sample(fetched);
                }

                let was_ticking = controller.needs_ticker();
                let was_playing = controller.metronome_playing();
                match controller.apply(input) {
                    Reaction::Show(text) => print_lines(&text),
                    Reaction::Export(request) => start_export(&export, request, &notices_tx),
                    Reaction::Quit => break,
                }
                if controller.needs_ticker() && !was_ticking {
                    ticker.reset();
                }
                if controller.metronome_playing() && !was_playing {
                    beats.reset();
                }
            }
            _ = ticker.tick(), if controller.needs_ticker() => {
                print_lines(&controller.on_tick());
            }
            _ = beats.tick(), if controller.metronome_playing() => {
                controller.poll_metronome();
            }
            Some(notice) = notices.recv() => show_notice(notice),
            _ = &mut shutdown => {
                info!("interrupted");
                break;
            }
        }
    }

    if controller.metronome_playing() {
        controller.apply(Input::Metronome);
    }
    info!(sessions = controller.records().len(), "timer stopped");
    Ok(())
}

fn print_lines(lines: &[String]) {
    for line in lines {
        println!("{}", line);
    }
}

/// Reads the click from `sample_path`, or fetches it from the server.
async fn load_sample(settings: &MetronomeSettings, export: &ExportClient) -> ClientResult<Vec<u8>> {
    match settings.sample_path {
        Some(ref path) => Ok(tokio::fs::read(path).await?),
        None => export.fetch_sample().await,
    }
}

/// Sends one export unless another is still pending.
fn start_export(export: &ExportClient, request: CreateEventRequest, notices: &mpsc::Sender<ExportNotice>) {
    let Some(guard) = export.begin() else {
        println!("匯出中…");
        return;
    };
    println!("匯出中…");
    let export = export.clone();
    let notices = notices.clone();
    tokio::spawn(async move {
        let _guard = guard;
        let notice = ExportNotice::from_result(export.create_event(&request).await);
        if notices.send(notice).await.is_err() {
            debug!("export finished after the timer stopped");
        }
    });
}

fn show_notice(notice: ExportNotice) {
    if let ExportNotice::Consent { ref auth_url, .. } = notice
        && let Err(e) = open::that_detached(auth_url)
    {
        warn!(error = %e, "failed to open the browser");
    }
    print_lines(&notice.lines());
}
