use std::future::Future;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tokio_util::sync::CancellationToken;

pub mod config;
use config::{app_config::load_config, cli::Cli};
pub mod dispatcher;
pub mod http_probe;
pub mod input;
pub mod logging;
pub mod output;
use output::StdoutSink;
pub mod runner;
pub mod stats;

const BANNER: &str = r" __  __             _            __        __                   _
|  \/  | ___  _ __ | | _____ _   \ \      / / __ ___ _ __   ___| |__
| |\/| |/ _ \| '_ \| |/ / _ \ | | \ \ /\ / / '__/ _ \ '_ \ / __| '_ \
| |  | | (_) | | | |   <  __/ |_| |\ V  V /| | |  __/ | | | (__| | | |
|_|  |_|\___/|_| |_|_|\_\___|\__, | \_/\_/ |_|  \___|_| |_|\___|_| |_|
                             |___/";

/// Exit status after a second interrupt, as a shell reports death by SIGINT.
const INTERRUPTED: i32 = 130;

#[tokio::main]
async fn main() -> ExitCode {
    // a missing .env file is fine
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();
    logging::init(cli.debug);

    eprintln!("{BANNER}");
    log::info!("Welcome to the 403 Bypass Tool!");

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let app = load_config(&cli)?;
    let lines = input::ingest(app.input.as_deref()).await?;

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if watch_interrupts(tokio::signal::ctrl_c, on_signal).await {
            log::error!("Interrupted again, exiting");
            std::process::exit(INTERRUPTED);
        }
    });

    let sink = Arc::new(StdoutSink::new(app.probe.output));
    let summary = runner::run(app, lines, sink, cancel.clone()).await?;

    log::info!(
        "Probed {}/{} URLs with {} requests ({} skipped, {} failed){}",
        summary.dispatch.processed,
        summary.urls,
        summary.requests,
        summary.skipped,
        summary.dispatch.failed,
        if cancel.is_cancelled() { ", cancelled" } else { "" }
    );
    Ok(())
}

/// Cancels `cancel` on the first interrupt and returns `true` on the second.
/// Returns `false` if the signal cannot be awaited.
async fn watch_interrupts<F, Fut>(mut interrupt: F, cancel: CancellationToken) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = std::io::Result<()>>,
{
    if let Err(e) = interrupt().await {
        log::warn!("Cannot listen for Ctrl-C: {e}");
        return false;
    }
    log::warn!("Interrupted, finishing in-flight requests (Ctrl-C again to exit now)");
    cancel.cancel();

    interrupt().await.is_ok()
}
