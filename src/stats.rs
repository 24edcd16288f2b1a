use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, interval_at};

/// Handle used by workers to report sent requests to the reporter task.
#[derive(Debug, Clone)]
pub struct RequestCounter {
    tx: mpsc::UnboundedSender<()>,
}

impl RequestCounter {
    pub fn record(&self) {
        // the reporter only goes away at shutdown
        let _ = self.tx.send(());
    }
}

/// Spawns the task that owns the request tally.
///
/// Every `period` it logs the observed rate at debug level. The task finishes
/// once every `RequestCounter` has been dropped and yields the total count.
pub fn spawn_reporter(period: Duration) -> (RequestCounter, JoinHandle<u64>) {
    let (tx, mut rx) = mpsc::unbounded_channel::<()>();

    let handle = tokio::spawn(async move {
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut total: u64 = 0;
        let mut window: u64 = 0;

        loop {
            tokio::select! {
                event = rx.recv() => match event {
                    Some(()) => {
                        total += 1;
                        window += 1;
                    }
                    None => break,
                },
                _ = ticker.tick() => {
                    if window > 0 {
                        log::debug!("{:.1} requests/s", window as f64 / period.as_secs_f64());
                    }
                    window = 0;
                }
            }
        }

        total
    });

    (RequestCounter { tx }, handle)
}
