//! Background task that advances the rate limiting window.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::rate_limiter::WindowCounter;

/// Handle to the periodic window reset task.
///
/// The task ticks once per window and stops when [`Resetter::stop`] is called
/// or when this handle is dropped.
pub struct Resetter {
    shutdown: Mutex<Option<oneshot::Sender<()>>>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl Resetter {
    /// Spawn the reset loop for `counter` on the current tokio runtime.
    pub fn spawn(counter: Arc<WindowCounter>) -> Self {
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let task = tokio::spawn(run(counter, shutdown_rx));

        Self {
            shutdown: Mutex::new(Some(shutdown_tx)),
            task: Mutex::new(Some(task)),
        }
    }

    /// Signal the loop to stop and wait until it has returned.
    pub async fn stop(&self) {
        let Some(shutdown) = self
            .shutdown
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        else {
            return;
        };

        // The receiver is gone only if the task already exited.
        let _ = shutdown.send(());

        let task = self
            .task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(task) = task {
            if let Err(err) = task.await {
                warn!(error = %err, "Window resetter did not exit cleanly");
            }
        }
    }

    pub fn is_running(&self) -> bool {
        self.task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(|task| !task.is_finished())
    }
}

// Deadline used when a window is too long to add to the current instant.
const FAR_FUTURE: Duration = Duration::from_secs(86400 * 365 * 30);

fn first_tick(period: Duration) -> Instant {
    let now = Instant::now();
    now.checked_add(period).unwrap_or_else(|| now + FAR_FUTURE)
}

async fn run(counter: Arc<WindowCounter>, mut shutdown: oneshot::Receiver<()>) {
    let period = counter.settings().window;
    let mut ticker = time::interval_at(first_tick(period), period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let advance = counter.advance();
                debug!(
                    tracked_clients = advance.tracked_clients,
                    cleared = advance.cleared,
                    "Rate limit window reset"
                );
            }
            signal = &mut shutdown => {
                match signal {
                    Ok(()) => info!("Window resetter stopped"),
                    Err(_) => debug!("Rate limiter dropped, window resetter exiting"),
                }
                return;
            }
        }
    }
}
