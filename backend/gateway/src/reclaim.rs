//! Background reclamation: evicts an idle engine and sweeps stale staged files.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use ocrgate_config::Settings;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::gate::SingleFlightGate;
use crate::lifecycle::EngineLifecycle;
use crate::staging::sweep_orphans;

#[derive(Debug, Clone)]
pub struct ReclaimSettings {
    pub interval: Duration,
    pub idle_timeout: Duration,
    pub retention: Duration,
    pub staging_dir: PathBuf,
}

impl From<&Settings> for ReclaimSettings {
    fn from(settings: &Settings) -> Self {
        Self {
            interval: settings.reclaim_interval,
            idle_timeout: settings.idle_timeout,
            retention: settings.retention,
            staging_dir: settings.staging_dir.clone(),
        }
    }
}

/// What one cycle did.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ReclaimReport {
    pub evicted: bool,
    /// The gate was held by a request, so eviction waited for the next cycle.
    pub skipped_busy: bool,
    pub removed_files: usize,
}

#[derive(Clone)]
pub struct Reclaimer {
    gate: SingleFlightGate,
    lifecycle: Arc<EngineLifecycle>,
    settings: ReclaimSettings,
}

impl Reclaimer {
    pub fn new(
        gate: SingleFlightGate,
        lifecycle: Arc<EngineLifecycle>,
        settings: ReclaimSettings,
    ) -> Self {
        Self {
            gate,
            lifecycle,
            settings,
        }
    }

    /// Runs a single cycle under the gate. When a request holds it, the whole
    /// cycle waits: a timed-out request can outlive the retention window and
    /// its staged file must survive until the engine call returns.
    pub async fn run_once(&self) -> ReclaimReport {
        let mut report = ReclaimReport::default();

        let Some(permit) = self.gate.try_enter() else {
            debug!("Gate held by a request; reclamation deferred");
            report.skipped_busy = true;
            return report;
        };

        let lifecycle = Arc::clone(&self.lifecycle);
        let idle_timeout = self.settings.idle_timeout;
        let evict = tokio::task::spawn_blocking(move || {
            let evicted = lifecycle.evict_if_idle(&permit, idle_timeout);
            (evicted, permit)
        });
        let permit = match evict.await {
            Ok((evicted, permit)) => {
                report.evicted = evicted;
                permit
            }
            Err(e) => {
                error!(error = %e, "Eviction task panicked");
                return report;
            }
        };

        match sweep_orphans(&self.settings.staging_dir, self.settings.retention).await {
            Ok(removed) => report.removed_files = removed,
            Err(e) => warn!(
                dir = %self.settings.staging_dir.display(),
                error = %e,
                "Orphan sweep failed"
            ),
        }
        drop(permit);
        report
    }

    /// Runs cycles every `interval` until `token` is cancelled.
    pub fn spawn(self, token: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = time::interval(self.settings.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick completes immediately.
            ticker.tick().await;
            info!(
                interval_secs = self.settings.interval.as_secs_f64(),
                idle_timeout_secs = self.settings.idle_timeout.as_secs_f64(),
                "Reclamation task started"
            );

            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => {
                        let report = self.run_once().await;
                        if report.evicted || report.removed_files > 0 {
                            info!(
                                evicted = report.evicted,
                                removed_files = report.removed_files,
                                "Reclamation cycle"
                            );
                        }
                    }
                }
            }
            info!("Reclamation task stopped");
        })
    }
}
