use std::sync::LazyLock;

use crate::modules::{context::Initialize, error::BridgeResult, utils::shutdown::shutdown_signal};
use tokio::sync::watch;
use tracing::info;

pub static SIGNAL_MANAGER: LazyLock<SignalManager> = LazyLock::new(SignalManager::new);

/// Fans the process shutdown signal out to every long-running task.
///
/// The flag stays set once raised, so tasks that start waiting after the
/// signal arrived still see it.
pub struct SignalManager {
    sender: watch::Sender<bool>,
}

impl SignalManager {
    pub fn new() -> Self {
        let (sender, _) = watch::channel(false);
        SignalManager { sender }
    }

    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.sender.subscribe()
    }

    pub fn is_shutdown(&self) -> bool {
        *self.sender.borrow()
    }

    pub fn trigger(&self) {
        self.sender.send_replace(true);
    }

    /// Resolves once shutdown has been requested, immediately if it already
    /// was.
    pub async fn wait(&self) {
        let mut receiver = self.subscribe();
        let _ = receiver.wait_for(|shutdown| *shutdown).await;
    }
}

impl Initialize for SignalManager {
    async fn initialize() -> BridgeResult<()> {
        tokio::spawn(async move {
            shutdown_signal().await;
            info!("Shutdown signal received, stopping bridge");
            SIGNAL_MANAGER.trigger();
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn late_waiter_sees_earlier_shutdown() {
        let manager = SignalManager::new();
        manager.trigger();
        assert!(manager.is_shutdown());
        tokio::time::timeout(Duration::from_millis(200), manager.wait())
            .await
            .expect("wait should resolve after an earlier trigger");
    }

    #[tokio::test]
    async fn waiter_wakes_on_trigger() {
        let manager = std::sync::Arc::new(SignalManager::new());
        let waiter = tokio::spawn({
            let manager = manager.clone();
            async move { manager.wait().await }
        });
        tokio::task::yield_now().await;
        assert!(!waiter.is_finished());
        manager.trigger();
        tokio::time::timeout(Duration::from_millis(200), waiter)
            .await
            .expect("waiter should wake")
            .unwrap();
    }
}
