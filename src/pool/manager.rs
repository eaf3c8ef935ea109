//! Pool manager
//!
//! Lock discipline: the catalog mutex is held only for in-memory catalog
//! reads and mutations. Generator calls and disk I/O always run with the
//! lock released, and their result is registered afterwards in a separate,
//! short critical section. A slow upstream call therefore never delays a
//! concurrent `pick`.

use super::catalog::{CatalogEntry, PickedArtifact, PoolState, PoolStatus};
use crate::error::{Error, Result};
use crate::generator::Generator;
use crate::setup::{GenerativeItem, PromptSetup};
use crate::store::{ArtifactClass, ArtifactStore};
use rand::seq::SliceRandom;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

/// Outcome of one reclamation pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReclaimReport {
    /// Files deleted (or already gone) and forgotten
    pub deleted: usize,
    /// Files that could not be deleted and stay tracked
    pub failed: usize,
}

/// Owner of the available and pending-deletion catalogs
pub struct PoolManager {
    state: Mutex<PoolState>,
    store: Arc<ArtifactStore>,
    generator: Arc<dyn Generator>,
    url_base: String,
    sequence: AtomicU64,
}

impl PoolManager {
    pub fn new(
        store: Arc<ArtifactStore>,
        generator: Arc<dyn Generator>,
        url_base: impl Into<String>,
    ) -> Self {
        Self {
            state: Mutex::new(PoolState::default()),
            store,
            generator,
            url_base: url_base.into(),
            sequence: AtomicU64::new(0),
        }
    }

    pub fn store(&self) -> &Arc<ArtifactStore> {
        &self.store
    }

    /// Public URL of a relative artifact path
    pub fn url_for(&self, relative: &str) -> String {
        format!("{}/{}", self.url_base.trim_end_matches('/'), relative)
    }

    /// Create the directory layout, drop leftover partial writes and
    /// register every artifact already on disk.
    ///
    /// The class of a rescanned file cannot be told reliably from its name,
    /// so all of them are registered as static: permanently available and
    /// never deleted automatically.
    pub async fn bootstrap(&self) -> Result<usize> {
        self.store.ensure_layout().await?;
        let partial = self.store.remove_partial_files().await?;
        if partial > 0 {
            tracing::info!(count = partial, "Removed leftover partial writes");
        }
        let existing = self.store.scan().await?;
        Ok(self.register_existing(existing).await)
    }

    /// Register already-generated files as static artifacts.
    pub async fn register_existing(&self, paths: Vec<String>) -> usize {
        let mut state = self.state.lock().await;
        let mut registered = 0;
        for path in paths {
            let entry = CatalogEntry {
                url: self.url_for(&path),
                class: ArtifactClass::Static,
            };
            tracing::debug!(path = %path, "Already available");
            if state.insert_available(path, entry) {
                registered += 1;
            }
        }
        registered
    }

    /// Make sure every static item exists on disk and is available.
    ///
    /// Items whose file already exists are not generated again. The first
    /// generation or write failure aborts the call; the caller retries on its
    /// next cycle.
    pub async fn ensure_static_items(&self, setup: &PromptSetup) -> Result<usize> {
        let mut created = 0;

        for item in &setup.static_items {
            let path = self.store.relative_path(ArtifactClass::Static, &item.id);

            if self.store.exists(&path).await {
                // Present on disk but unknown to the catalog: track it.
                let mut state = self.state.lock().await;
                if !state.is_tracked(&path) {
                    state.insert_available(path.clone(), self.entry(&path, ArtifactClass::Static));
                }
                continue;
            }

            let template = setup.tts_template(&item.tts_template)?;
            tracing::info!(id = %item.id, "Generating static item");
            self.produce(&path, template, &item.text).await?;
            self.register(path, ArtifactClass::Static).await;
            created += 1;
        }

        Ok(created)
    }

    /// Generate generative items until `target` of them are available.
    ///
    /// Never shrinks the pool. Each new item uses a definition chosen
    /// uniformly at random. A failure aborts the remaining iterations;
    /// items registered before it stay available.
    pub async fn replenish_generative(&self, setup: &PromptSetup, target: usize) -> Result<usize> {
        let current = self.state.lock().await.generative_count();
        if current >= target {
            return Ok(0);
        }
        if setup.generative_items.is_empty() {
            return Err(Error::Setup(
                "No generative item definitions to replenish from".to_string(),
            ));
        }

        let mut created = 0;
        for n in current..target {
            let item = match setup.generative_items.choose(&mut rand::thread_rng()) {
                Some(item) => item.clone(),
                None => break,
            };
            tracing::info!(
                id = %item.id,
                "Generating one more generative item {}/{}",
                n + 1,
                target
            );

            let path = self.generative_path(&item);
            let template = setup.gen_ai_template(&item.gen_ai_template)?;
            let text = self.generator.generate_text(template, &item.text).await?;
            let tts = setup.tts_template(&item.tts_template)?;
            self.produce(&path, tts, &text).await?;
            self.register(path, ArtifactClass::Generative).await;
            created += 1;
        }

        Ok(created)
    }

    /// Hand out one available artifact, chosen uniformly at random.
    ///
    /// A generative artifact is removed from the available catalog and its
    /// grace window starts now; a static artifact stays available.
    pub async fn pick(&self) -> Result<PickedArtifact> {
        let picked = {
            let mut state = self.state.lock().await;
            state.pick(&mut rand::thread_rng(), Instant::now())
        };

        match picked {
            Some(picked) => {
                tracing::debug!(path = %picked.path, class = ?picked.class, "Picked artifact");
                Ok(picked)
            }
            None => Err(Error::PoolExhausted),
        }
    }

    /// Delete picked generative artifacts whose grace window has elapsed.
    ///
    /// Expired entries are taken out of the pending catalog under the lock,
    /// so no entry is reclaimed twice. A file that cannot be deleted is put
    /// back with its original pick time and retried on the next pass.
    pub async fn reclaim(&self, grace: Duration) -> ReclaimReport {
        let expired = self.state.lock().await.take_expired(Instant::now(), grace);

        let mut report = ReclaimReport::default();
        let mut undeleted = Vec::new();
        for (path, picked_at) in expired {
            match self.store.delete(&path).await {
                Ok(()) => {
                    tracing::info!(path = %path, "Removing generative file already used");
                    report.deleted += 1;
                }
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    tracing::warn!(path = %path, "Picked file already gone");
                    report.deleted += 1;
                }
                Err(e) => {
                    tracing::error!(path = %path, error = %e, "Failed to delete picked file");
                    undeleted.push((path, picked_at));
                }
            }
        }

        if !undeleted.is_empty() {
            report.failed = undeleted.len();
            let mut state = self.state.lock().await;
            for (path, picked_at) in undeleted {
                state.restore_pending(path, picked_at);
            }
        }

        report
    }

    pub async fn status(&self) -> PoolStatus {
        self.state.lock().await.status()
    }

    fn entry(&self, path: &str, class: ArtifactClass) -> CatalogEntry {
        CatalogEntry {
            url: self.url_for(path),
            class,
        }
    }

    /// Time-stamped path that never collides with an earlier generation.
    fn generative_path(&self, item: &GenerativeItem) -> String {
        let seq = self.sequence.fetch_add(1, Ordering::Relaxed);
        let id = format!(
            "{}-{}-{}",
            item.id,
            chrono::Utc::now().timestamp_millis(),
            seq
        );
        self.store.relative_path(ArtifactClass::Generative, &id)
    }

    /// Synthesize and store one artifact. Runs without the catalog lock.
    async fn produce(&self, path: &str, template: &serde_json::Value, text: &str) -> Result<()> {
        let audio = self.generator.synthesize(template, text).await?;
        let payload = self.store.format().encode(audio);
        self.store.write(path, &payload).await
    }

    async fn register(&self, path: String, class: ArtifactClass) {
        let entry = self.entry(&path, class);
        if !self.state.lock().await.insert_available(path.clone(), entry) {
            tracing::warn!(path = %path, "Artifact already registered");
        }
    }
}
