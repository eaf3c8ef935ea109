//! Maintenance loop
//!
//! One background task keeps the pool healthy:
//!
//! ```text
//! Starting -> Bootstrapping (rescan disk) -> Running
//!                                              |
//!       +--------------------------------------+
//!       v
//!   reclaim -> reload prompts -> ensure static -> replenish -> sleep --+
//!       ^                                                              |
//!       +--------------------------------------------------------------+
//! ```
//!
//! The first cycle runs immediately. A failing step is logged and the loop
//! carries on with the next cycle; only the cancellation token stops it.

use crate::config::ServiceConfig;
use crate::pool::PoolManager;
use crate::setup::PromptSetup;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Maintenance loop state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    /// Not started
    Starting,
    /// Registering artifacts already on disk
    Bootstrapping,
    /// Running maintenance cycles
    Running,
    /// Cancelled
    Stopped,
}

/// Maintenance loop settings, fixed at startup
#[derive(Debug, Clone)]
pub struct MaintenanceSettings {
    pub prompts_file: PathBuf,
    pub target_size: usize,
    pub grace_period: Duration,
    pub interval: Duration,
}

impl From<&ServiceConfig> for MaintenanceSettings {
    fn from(config: &ServiceConfig) -> Self {
        Self {
            prompts_file: config.prompts_file.clone(),
            target_size: config.pool.target_size,
            grace_period: config.pool.grace_period(),
            interval: config.pool.maintenance_interval(),
        }
    }
}

/// What one maintenance cycle did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub reclaimed: usize,
    pub reclaim_failures: usize,
    pub static_created: usize,
    pub generative_created: usize,
    /// One message per failed step
    pub errors: Vec<String>,
}

impl CycleReport {
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty() && self.reclaim_failures == 0
    }
}

/// Periodic reclaim / refresh / generate task
pub struct MaintenanceLoop {
    pool: Arc<PoolManager>,
    settings: MaintenanceSettings,
    state: Arc<RwLock<LoopState>>,
}

impl MaintenanceLoop {
    pub fn new(pool: Arc<PoolManager>, settings: MaintenanceSettings) -> Self {
        Self {
            pool,
            settings,
            state: Arc::new(RwLock::new(LoopState::Starting)),
        }
    }

    /// Get current state
    pub async fn state(&self) -> LoopState {
        *self.state.read().await
    }

    async fn set_state(&self, state: LoopState) {
        *self.state.write().await = state;
        tracing::debug!(state = ?state, "Maintenance loop state changed");
    }

    /// Spawn the loop on the runtime.
    pub fn spawn(self: Arc<Self>, cancel: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move { self.run(cancel).await })
    }

    /// Bootstrap, then run cycles until `cancel` fires.
    pub async fn run(&self, cancel: CancellationToken) {
        self.set_state(LoopState::Bootstrapping).await;
        match self.pool.bootstrap().await {
            Ok(count) => tracing::info!(count, "Registered existing artifacts"),
            Err(e) => tracing::error!(error = %e, "Failed to scan existing artifacts"),
        }
        self.set_state(LoopState::Running).await;

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                report = self.run_cycle() => log_report(&report),
            }

            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(self.settings.interval) => {}
            }
        }

        self.set_state(LoopState::Stopped).await;
        tracing::info!("Maintenance loop stopped");
    }

    /// Run one maintenance cycle.
    ///
    /// A prompts file that cannot be loaded skips the generation steps. A
    /// static item failure does not prevent replenishing generative items.
    pub async fn run_cycle(&self) -> CycleReport {
        let mut report = CycleReport::default();

        let reclaimed = self.pool.reclaim(self.settings.grace_period).await;
        report.reclaimed = reclaimed.deleted;
        report.reclaim_failures = reclaimed.failed;

        let setup = match PromptSetup::load(&self.settings.prompts_file).await {
            Ok(setup) => setup,
            Err(e) => {
                tracing::error!(error = %e, "Failed to load prompt setup");
                report.errors.push(e.to_string());
                return report;
            }
        };

        match self.pool.ensure_static_items(&setup).await {
            Ok(created) => report.static_created = created,
            Err(e) => {
                tracing::error!(error = %e, "Failed to generate static items");
                report.errors.push(e.to_string());
            }
        }

        match self
            .pool
            .replenish_generative(&setup, self.settings.target_size)
            .await
        {
            Ok(created) => report.generative_created = created,
            Err(e) => {
                tracing::error!(error = %e, "Failed to replenish generative items");
                report.errors.push(e.to_string());
            }
        }

        report
    }
}

fn log_report(report: &CycleReport) {
    if report.is_clean() {
        tracing::info!(
            reclaimed = report.reclaimed,
            static_created = report.static_created,
            generative_created = report.generative_created,
            "Maintenance cycle complete"
        );
    } else {
        tracing::warn!(
            reclaimed = report.reclaimed,
            reclaim_failures = report.reclaim_failures,
            static_created = report.static_created,
            generative_created = report.generative_created,
            errors = report.errors.len(),
            "Maintenance cycle finished with errors"
        );
    }
}
