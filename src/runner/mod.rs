use std::sync::Arc;
use std::time::Duration;

use clap::ValueEnum;
use tokio_util::sync::CancellationToken;

use crate::config::app_config::AppConfig;
use crate::dispatcher::{DispatchSummary, Dispatcher, DispatcherState};
use crate::http_probe::prelude::*;
use crate::input::{NormalizeError, normalize};
use crate::output::ResultSink;
use crate::stats::spawn_reporter;

const STATS_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Mode {
    Full,
    Headers,
}

/// The probing routine a mode resolves to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// Try every catalog header against the URL.
    HeaderCatalog,
}

impl Mode {
    /// Both modes currently probe the header catalog; new strategies slot in here.
    pub fn strategy(self) -> Strategy {
        match self {
            Mode::Full | Mode::Headers => Strategy::HeaderCatalog,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub urls: usize,
    pub skipped: usize,
    pub requests: u64,
    pub dispatch: DispatchSummary,
}

/// Normalizes raw input lines, dropping blanks silently and logging invalid ones.
pub fn prepare_jobs(lines: Vec<String>) -> (Vec<String>, usize) {
    let mut jobs = Vec::with_capacity(lines.len());
    let mut skipped = 0;

    for line in lines {
        match normalize(&line) {
            Ok(url) => jobs.push(url),
            Err(NormalizeError::Empty) => {}
            Err(e) => {
                skipped += 1;
                log::warn!("Skipping {line}: {e}");
            }
        }
    }

    (jobs, skipped)
}

/// Probes every URL in `lines` with the configured workers and reports hits to `sink`.
pub async fn run(
    app: AppConfig,
    lines: Vec<String>,
    sink: Arc<dyn ResultSink>,
    cancel: CancellationToken,
) -> anyhow::Result<RunSummary> {
    let (jobs, skipped) = prepare_jobs(lines);
    let urls = jobs.len();
    let strategy = app.mode.strategy();
    log::debug!("Mode {:?} uses strategy {strategy:?}", app.mode);

    let (counter, reporter) = spawn_reporter(STATS_INTERVAL);
    let ctx = Arc::new(ProbeContext {
        client: build_client()?,
        config: Arc::new(app.probe),
        sink,
        counter,
    });

    let mut dispatcher = Dispatcher::new(app.workers, app.rate, app.rate_scope);
    log::debug!(
        "Dispatching {urls} URLs to {} workers (rate period {:?}, {:?})",
        dispatcher.workers(),
        dispatcher.period(),
        app.rate_scope
    );
    let dispatch = dispatcher
        .run(jobs, cancel, move |url| {
            let ctx = ctx.clone();
            async move {
                match strategy {
                    Strategy::HeaderCatalog => probe_url(&ctx, &url).await,
                }
            }
        })
        .await;
    debug_assert_eq!(dispatcher.state(), DispatcherState::Done);

    // the handler owned the last counter handle, so the reporter can finish now
    let requests = reporter.await?;

    Ok(RunSummary {
        urls,
        skipped,
        requests,
        dispatch,
    })
}
