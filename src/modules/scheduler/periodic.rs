use crate::modules::{common::signal::SIGNAL_MANAGER, error::BridgeResult};
use std::{future::Future, time::Duration};
use std::sync::Arc;
use tokio::sync::Notify;
use tokio::time::MissedTickBehavior;
use tracing::{info, warn};

pub struct PeriodicTask {
    name: String,
}

pub struct TaskHandle {
    cancel: Arc<Notify>,
    join_handle: tokio::task::JoinHandle<()>,
}

impl TaskHandle {
    /// Stops the timer. A run already in progress is left to finish.
    pub async fn cancel(self) {
        self.cancel.notify_one();
        let _ = self.join_handle.await;
    }
}

impl PeriodicTask {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_owned(),
        }
    }

    /// Runs `task` every `interval` until cancelled or the process shuts down.
    ///
    /// Each run is spawned, so a slow run never delays the timer; the task
    /// itself decides what to do when runs would overlap.
    pub fn start<F, T>(self, task: T, interval: Duration, run_immediately: bool) -> TaskHandle
    where
        T: Fn() -> F + Send + Sync + 'static,
        F: Future<Output = BridgeResult<()>> + Send + 'static,
    {
        info!(
            "Task '{}' started, running every {}s",
            &self.name,
            interval.as_secs_f64()
        );

        let cancel = Arc::new(Notify::new());
        let cancel_signal = cancel.clone();
        let name = self.name;

        let join_handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(interval);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            let shutdown = SIGNAL_MANAGER.wait();
            tokio::pin!(shutdown);

            if !run_immediately {
                interval.tick().await; // discard first immediate tick
            }

            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        let run = task();
                        let name = name.clone();
                        tokio::spawn(async move {
                            if let Err(e) = run.await {
                                warn!("Task '{}' failed: {:?}", name, e);
                            }
                        });
                    }
                    _ = cancel_signal.notified() => {
                        info!("Task '{}' received cancellation signal", name);
                        break;
                    }
                    _ = &mut shutdown => {
                        info!("Task '{}' shutting down due to shutdown signal", name);
                        break;
                    }
                }
            }

            info!("Task '{}' stopped", name);
        });

        TaskHandle {
            cancel,
            join_handle,
        }
    }
}
