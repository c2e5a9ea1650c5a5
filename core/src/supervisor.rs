//! The Scheduler/Supervisor: runs one tick every `tick_interval`, never
//! overlapping ticks, with a watchdog timeout and graceful shutdown via a
//! `CancellationToken`.

use std::path::PathBuf;
use std::time::Duration;

use chrono::Utc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::aggregate::build_change_sets;
use crate::artifact::build_artifact;
use crate::bootstrap::run_bootstrap;
use crate::delivery::EmailSender;
use crate::detect::detect_changes;
use crate::error::Result;
use crate::model::config::{StagingFolders, TrackingTriplet};
use crate::model::{SiteBinding, SyncParameters};
use crate::source::SourceConnector;

/// Process exit codes.
pub mod exit_code {
    pub const NORMAL: i32 = 0;
    pub const CONFIG_ERROR: i32 = 1;
    pub const WATCHDOG_TERMINATION: i32 = 2;
}

/// Observability-only state; control flow is a single sequential loop
/// regardless of which state is current -- a tick always runs to
/// completion before the next one begins.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupervisorState {
    Init,
    Running,
    Ticking,
    Stopping,
    Stopped,
}

pub struct Supervisor<C, E> {
    pub tick_interval: Duration,
    pub tick_watchdog: Duration,
    pub base_dir: PathBuf,
    pub params: SyncParameters,
    pub tracking_triplet: TrackingTriplet,
    pub site_bindings: SiteBinding,
    pub email_sender: E,
    pub cancellation: CancellationToken,
    connect: Box<dyn Fn() -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<C>> + Send>> + Send + Sync>,
}

impl<C, E> Supervisor<C, E>
where
    C: SourceConnector + 'static,
    E: EmailSender,
{
    pub fn new(
        tick_interval: Duration,
        tick_watchdog: Duration,
        base_dir: PathBuf,
        params: SyncParameters,
        tracking_triplet: TrackingTriplet,
        site_bindings: SiteBinding,
        email_sender: E,
        cancellation: CancellationToken,
        connect: impl Fn() -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<C>> + Send>>
            + Send
            + Sync
            + 'static,
    ) -> Self {
        Self {
            tick_interval,
            tick_watchdog,
            base_dir,
            params,
            tracking_triplet,
            site_bindings,
            email_sender,
            cancellation,
            connect: Box::new(connect),
        }
    }

    /// Runs the bootstrap pass (once, if needed per site) followed by the
    /// tick loop until the cancellation token fires or a tick watchdog
    /// expires. Returns the process exit code to use.
    pub async fn run(&mut self) -> i32 {
        let folders = StagingFolders {
            base_dir: self.base_dir.clone(),
        };

        match (self.connect)().await {
            Ok(mut conn) => {
                if let Err(err) =
                    run_bootstrap(&mut conn, &self.params, &self.tracking_triplet, &folders).await
                {
                    error!(error = %err, "bootstrap failed");
                }
            }
            Err(err) => {
                error!(error = %err, "bootstrap connection failed, proceeding to tick loop");
            }
        }

        let mut interval = tokio::time::interval(self.tick_interval);
        loop {
            tokio::select! {
                _ = self.cancellation.cancelled() => {
                    info!("shutdown requested, stopping after current state");
                    return exit_code::NORMAL;
                }
                _ = interval.tick() => {
                    match tokio::time::timeout(self.tick_watchdog, self.run_tick(&folders)).await {
                        Ok(Ok(())) => {}
                        Ok(Err(err)) => {
                            error!(error = %err, "tick aborted, retrying next interval");
                        }
                        Err(_) => {
                            error!("tick exceeded watchdog timeout, terminating");
                            return exit_code::WATCHDOG_TERMINATION;
                        }
                    }
                }
            }
        }
    }

    /// Runs exactly one tick to completion. Exposed (not just called from
    /// [Self::run]'s loop) so integration tests can drive a single tick
    /// deterministically against fakes.
    pub async fn run_tick(&mut self, folders: &StagingFolders) -> Result<()> {
        let mut conn = (self.connect)().await?;

        let detected = detect_changes(&mut conn, &self.params, &self.tracking_triplet).await?;
        let change_sets = build_change_sets(detected, &self.params.sites);

        let mut total_tables = 0usize;
        let mut total_records = 0usize;
        let mut sites_delivered = 0usize;

        for (site, change_set) in &change_sets {
            let artifact = match build_artifact(
                &folders.delta_dir(),
                site,
                change_set,
                &self.params.tables,
                Utc::now(),
            ) {
                Ok(Some(artifact)) => artifact,
                Ok(None) => continue,
                Err(err) => {
                    error!(%site, error = %err, "artifact build failed, skipping site");
                    continue;
                }
            };

            total_tables += artifact.table_counts.len();
            total_records += artifact.table_counts.iter().map(|(_, n)| n).sum::<usize>();

            let Some(recipient) = self.site_bindings.get(site) else {
                warn!(%site, "no recipient configured, skipping delivery");
                continue;
            };

            match self.email_sender.send(recipient, &artifact).await {
                Ok(()) => sites_delivered += 1,
                Err(err) => {
                    error!(%site, error = %err, "delivery failed, continuing with other sites");
                }
            }
        }

        info!(
            sites = change_sets.len(),
            sites_delivered,
            total_tables,
            total_records,
            "tick complete"
        );
        Ok(())
    }
}
