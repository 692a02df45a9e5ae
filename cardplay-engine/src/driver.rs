//! Preview timer driver
//!
//! Background task that sleeps until the scheduler's earliest preview
//! deadline and fires it. It wakes early when a timer is armed or the
//! configuration changes, so it never sleeps past a new, earlier deadline.

use crate::error::{Error, Result};
use crate::scheduler::PlaybackScheduler;
use cardplay_common::time::MonotonicClock;
use std::sync::Arc;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Drives preview deadlines in real (tokio) time
pub struct PreviewTimerDriver {
    scheduler: Arc<PlaybackScheduler>,
    clock: MonotonicClock,
}

/// Running driver task
pub struct DriverHandle {
    shutdown_tx: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

impl DriverHandle {
    /// Stop the driver and wait for the task to finish
    pub async fn stop(self) -> Result<()> {
        // Task may already be gone; nothing to signal then
        let _ = self.shutdown_tx.send(());
        self.task
            .await
            .map_err(|e| Error::Scheduler(format!("preview timer driver task failed: {}", e)))
    }
}

impl PreviewTimerDriver {
    /// `clock` must be the clock hosts timestamp their events with
    pub fn new(scheduler: Arc<PlaybackScheduler>, clock: MonotonicClock) -> Self {
        Self { scheduler, clock }
    }

    /// Spawn the driver on the current runtime
    pub fn spawn(self) -> DriverHandle {
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let task = tokio::spawn(self.run(shutdown_rx));
        DriverHandle { shutdown_tx, task }
    }

    /// Fire deadlines until `shutdown` resolves
    pub async fn run(self, mut shutdown: oneshot::Receiver<()>) {
        info!("Preview timer driver started");
        let notify = self.scheduler.timer_notify();
        let mut config_rx = self.scheduler.config_store().subscribe();

        loop {
            let now_ms = self.clock.now_ms();
            let fired = self.scheduler.fire_due_timers(now_ms);
            if fired > 0 {
                debug!("Fired {} preview timer(s) at {}ms", fired, now_ms);
            }

            let next = self.scheduler.next_deadline();
            let sleep = async {
                match next {
                    Some(at_ms) => tokio::time::sleep_until(self.clock.instant_at(at_ms)).await,
                    None => std::future::pending::<()>().await,
                }
            };

            tokio::select! {
                _ = &mut shutdown => {
                    break;
                }
                _ = notify.notified() => {}
                _ = sleep => {}
                changed = config_rx.changed() => {
                    if changed.is_err() {
                        warn!("Configuration store dropped, driver stopping");
                        break;
                    }
                    self.scheduler.refresh_config(self.clock.now_ms());
                }
            }
        }
        info!("Preview timer driver stopped");
    }
}
