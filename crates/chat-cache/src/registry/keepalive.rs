//! Keep a gateway's entries alive for as long as it serves.

use chat_core::{ServiceEntry, ServiceRegistry};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

/// Running registration; [`RegistrationHandle::shutdown`] deregisters
#[derive(Debug)]
pub struct RegistrationHandle {
    stop: Option<oneshot::Sender<()>>,
    task: JoinHandle<()>,
}

impl RegistrationHandle {
    /// Stop refreshing and remove every entry from the registry
    pub async fn shutdown(mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        if let Err(e) = (&mut self.task).await {
            tracing::warn!(error = %e, "Registry keep-alive task failed");
        }
    }
}

/// Register `entries`, then refresh them every `interval` until shut down.
///
/// Registration and refresh failures are logged; the next tick retries.
pub fn keep_registered(
    registry: Arc<dyn ServiceRegistry>,
    entries: Vec<ServiceEntry>,
    interval: Duration,
) -> RegistrationHandle {
    let (stop_tx, mut stop_rx) = oneshot::channel();

    let task = tokio::spawn(async move {
        for entry in &entries {
            if let Err(e) = registry.register(entry).await {
                tracing::warn!(error = %e, address = %entry.address, "Failed to register gateway entry");
            }
        }

        let mut ticker = tokio::time::interval(interval);
        // First tick completes immediately
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    for entry in &entries {
                        if let Err(e) = registry.refresh(entry).await {
                            tracing::warn!(error = %e, address = %entry.address, "Failed to refresh gateway entry");
                        }
                    }
                }
                _ = &mut stop_rx => break,
            }
        }

        for entry in &entries {
            if let Err(e) = registry.deregister(entry).await {
                tracing::warn!(error = %e, address = %entry.address, "Failed to deregister gateway entry");
            }
        }
    });

    RegistrationHandle {
        stop: Some(stop_tx),
        task,
    }
}
