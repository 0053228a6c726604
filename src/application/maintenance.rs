//! Periodic purge of expired text entries and old request logs

use crate::config::MaintenanceSettings;
use crate::infrastructure::{RequestLogDao, TextStorageDao};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{error, info, instrument};

/// Outcome of one cleanup pass
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CleanupReport {
    pub text_entries_removed: u64,
    pub log_entries_removed: u64,
    pub completed_at: DateTime<Utc>,
    /// Set when at least one purge failed
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub failures: Vec<String>,
}

impl CleanupReport {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Run both purges; a failure in one does not prevent the other
#[instrument(skip_all)]
pub async fn run_cleanup(
    texts: &TextStorageDao,
    logs: &RequestLogDao,
    settings: &MaintenanceSettings,
) -> CleanupReport {
    let mut failures = Vec::new();

    let text_entries_removed = match texts.delete_expired_entries(settings.text_retention()).await
    {
        Ok(removed) => {
            info!(removed, "Expired text entries cleanup completed");
            removed
        }
        Err(e) => {
            error!(error = %e, "Failed to clean up text entries");
            failures.push(e.to_string());
            0
        }
    };

    let log_entries_removed = match logs
        .delete_old_request_logs(settings.log_retention_days)
        .await
    {
        Ok(removed) => {
            info!(removed, "Request logs cleanup completed");
            removed
        }
        Err(e) => {
            error!(error = %e, "Failed to clean up request logs");
            failures.push(e.to_string());
            0
        }
    };

    CleanupReport {
        text_entries_removed,
        log_entries_removed,
        completed_at: Utc::now(),
        failures,
    }
}

/// Handle to the background cleanup task
pub struct CleanupSchedule {
    shutdown_tx: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl CleanupSchedule {
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(true);
        if let Err(e) = self.handle.await {
            error!(error = %e, "Cleanup schedule panicked");
        }
    }
}

/// Run a cleanup immediately, then once per `settings.interval()`
pub fn spawn_cleanup_schedule(
    texts: TextStorageDao,
    logs: RequestLogDao,
    settings: MaintenanceSettings,
) -> CleanupSchedule {
    let (shutdown_tx, mut shutdown_rx) = watch::channel(false);

    let handle = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(settings.interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            // The first tick completes immediately
            tokio::select! {
                _ = ticker.tick() => {
                    info!("Running scheduled database cleanup");
                    run_cleanup(&texts, &logs, &settings).await;
                }
                _ = shutdown_rx.changed() => break,
            }
        }

        info!("Cleanup schedule stopped");
    });

    CleanupSchedule {
        shutdown_tx,
        handle,
    }
}
