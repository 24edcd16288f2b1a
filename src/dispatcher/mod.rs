use std::fmt::Display;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use clap::ValueEnum;
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use tokio::sync::{Mutex, mpsc};
use tokio::time::{Instant, Interval, MissedTickBehavior, interval_at};
use tokio_util::sync::CancellationToken;

pub const MIN_WORKERS: usize = 1;
pub const MAX_WORKERS: usize = 100;
/// Slowest supported pace: one request a year.
pub const MAX_PERIOD: Duration = Duration::from_secs(365 * 24 * 60 * 60);

pub fn clamp_workers(workers: usize) -> usize {
    workers.clamp(MIN_WORKERS, MAX_WORKERS)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatcherState {
    Created,
    Running,
    Draining,
    Done,
}

/// How the configured rate is applied.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum RateScope {
    /// Every worker owns its own limiter, so throughput is roughly `rate * workers`.
    #[default]
    PerWorker,
    /// All workers share one governor limiter, capping total throughput at `rate`.
    Shared,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchSummary {
    pub processed: usize,
    pub failed: usize,
}

enum Limiter {
    Unlimited,
    Own(Interval),
    Shared(Arc<DefaultDirectRateLimiter>),
}

impl Limiter {
    async fn tick(&mut self) {
        match self {
            Limiter::Unlimited => {}
            Limiter::Own(interval) => {
                interval.tick().await;
            }
            Limiter::Shared(limiter) => limiter.until_ready().await,
        }
    }
}

/// The first tick fires one period after creation, like a freshly started ticker.
fn ticker(period: Duration) -> Interval {
    let mut interval = interval_at(Instant::now() + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    interval
}

/// A global limiter allowing one request per `period`, with its first cell already spent.
fn shared_limiter(period: Duration) -> Option<DefaultDirectRateLimiter> {
    let limiter = RateLimiter::direct(Quota::with_period(period)?);
    let _ = limiter.check();
    Some(limiter)
}

/// A fixed pool of workers consuming a bounded job queue.
pub struct Dispatcher {
    workers: usize,
    period: Option<Duration>,
    scope: RateScope,
    state: DispatcherState,
}

impl Dispatcher {
    /// `rate` is in requests per second; zero, negative or non-finite means unlimited.
    /// Rates slower than one request per [`MAX_PERIOD`] are raised to that pace.
    pub fn new(workers: usize, rate: f64, scope: RateScope) -> Self {
        let period = if rate.is_finite() && rate > 0.0 {
            let period = Duration::try_from_secs_f64(1.0 / rate)
                .map_or(MAX_PERIOD, |period| period.min(MAX_PERIOD));
            Some(period).filter(|period| !period.is_zero())
        } else {
            None
        };

        Self {
            workers: clamp_workers(workers),
            period,
            scope,
            state: DispatcherState::Created,
        }
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    pub fn period(&self) -> Option<Duration> {
        self.period
    }

    pub fn state(&self) -> DispatcherState {
        self.state
    }

    fn transition(&mut self, state: DispatcherState) {
        log::debug!("Dispatcher {:?} -> {:?}", self.state, state);
        self.state = state;
    }

    /// Runs `handler` once for every job and returns when all workers have exited.
    ///
    /// Handler errors are logged with the job and never stop other workers. Once
    /// `cancel` fires no new job is started; a handler already running is not interrupted.
    pub async fn run<F, Fut, E>(
        &mut self,
        jobs: Vec<String>,
        cancel: CancellationToken,
        handler: F,
    ) -> DispatchSummary
    where
        F: Fn(String) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), E>> + Send + 'static,
        E: Display + Send + 'static,
    {
        self.transition(DispatcherState::Running);

        let (tx, rx) = mpsc::channel::<String>(self.workers);
        let rx = Arc::new(Mutex::new(rx));
        let handler = Arc::new(handler);
        let shared = match (self.scope, self.period) {
            (RateScope::Shared, Some(period)) => shared_limiter(period).map(Arc::new),
            _ => None,
        };

        let mut handles = Vec::with_capacity(self.workers);
        for id in 0..self.workers {
            let limiter = match (&shared, self.period) {
                (Some(shared), _) => Limiter::Shared(shared.clone()),
                (None, Some(period)) => Limiter::Own(ticker(period)),
                (None, None) => Limiter::Unlimited,
            };
            handles.push(tokio::spawn(worker(
                id,
                rx.clone(),
                cancel.clone(),
                limiter,
                handler.clone(),
            )));
        }
        drop(rx);

        let producer_cancel = cancel.clone();
        let producer = tokio::spawn(async move {
            for job in jobs {
                tokio::select! {
                    biased;
                    _ = producer_cancel.cancelled() => {
                        log::debug!("Cancelled, no more jobs will be queued");
                        break;
                    }
                    sent = tx.send(job) => if sent.is_err() {
                        break;
                    }
                }
            }
            // dropping the sender closes the queue
        });

        if let Err(e) = producer.await {
            log::error!("Job producer failed: {e}");
        }
        self.transition(DispatcherState::Draining);

        let mut summary = DispatchSummary::default();
        for handle in handles {
            match handle.await {
                Ok(done) => {
                    summary.processed += done.processed;
                    summary.failed += done.failed;
                }
                Err(e) => log::error!("Worker failed: {e}"),
            }
        }

        self.transition(DispatcherState::Done);
        summary
    }
}

async fn worker<F, Fut, E>(
    id: usize,
    jobs: Arc<Mutex<mpsc::Receiver<String>>>,
    cancel: CancellationToken,
    mut limiter: Limiter,
    handler: Arc<F>,
) -> DispatchSummary
where
    F: Fn(String) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), E>> + Send + 'static,
    E: Display + Send + 'static,
{
    let mut summary = DispatchSummary::default();

    loop {
        let job = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            job = async { jobs.lock().await.recv().await } => job,
        };
        let Some(job) = job else {
            break;
        };

        summary.processed += 1;
        if let Err(e) = handler(job.clone()).await {
            summary.failed += 1;
            log::error!("Processing URL {job}: {e}");
        }

        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = limiter.tick() => {}
        }
    }

    log::debug!("Worker {id} finished after {} jobs", summary.processed);
    summary
}
