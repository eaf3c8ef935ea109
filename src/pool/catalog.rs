//! In-memory pool catalogs
//!
//! `PoolState` holds both catalogs. It is never shared directly: the pool
//! manager keeps it behind a single mutex and every read-then-mutate
//! sequence below runs inside one critical section.

use crate::store::ArtifactClass;
use rand::seq::IteratorRandom;
use rand::Rng;
use serde::Serialize;
use std::collections::HashMap;
use std::time::Duration;
use tokio::time::Instant;

/// An artifact eligible to be picked
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogEntry {
    pub url: String,
    pub class: ArtifactClass,
}

/// Result of a pick
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PickedArtifact {
    /// Relative path under the artifact root
    pub path: String,
    pub url: String,
    pub class: ArtifactClass,
}

/// Catalog counts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PoolStatus {
    pub available_static: usize,
    pub available_generative: usize,
    pub pending_deletion: usize,
}

#[derive(Debug, Default)]
pub(crate) struct PoolState {
    /// path -> entry
    available: HashMap<String, CatalogEntry>,
    /// path -> pick instant
    pending: HashMap<String, Instant>,
}

impl PoolState {
    /// Register an artifact. Returns false if the path is already tracked
    /// by either catalog.
    pub(crate) fn insert_available(&mut self, path: String, entry: CatalogEntry) -> bool {
        if self.available.contains_key(&path) || self.pending.contains_key(&path) {
            return false;
        }
        self.available.insert(path, entry);
        true
    }

    pub(crate) fn is_tracked(&self, path: &str) -> bool {
        self.available.contains_key(path) || self.pending.contains_key(path)
    }

    pub(crate) fn generative_count(&self) -> usize {
        self.available
            .values()
            .filter(|e| e.class == ArtifactClass::Generative)
            .count()
    }

    /// Pick one available entry uniformly at random.
    ///
    /// Generative entries leave the available catalog and start their grace
    /// window in the pending catalog; static entries stay available.
    pub(crate) fn pick<R: Rng + ?Sized>(
        &mut self,
        rng: &mut R,
        now: Instant,
    ) -> Option<PickedArtifact> {
        let path = self.available.keys().choose(rng)?.clone();

        let entry = match self.available.get(&path)?.class {
            ArtifactClass::Static => self.available.get(&path)?.clone(),
            ArtifactClass::Generative => {
                let entry = self.available.remove(&path)?;
                self.pending.insert(path.clone(), now);
                entry
            }
        };

        Some(PickedArtifact {
            path,
            url: entry.url,
            class: entry.class,
        })
    }

    /// Remove and return every pending entry whose grace window has elapsed.
    pub(crate) fn take_expired(&mut self, now: Instant, grace: Duration) -> Vec<(String, Instant)> {
        let expired: Vec<String> = self
            .pending
            .iter()
            .filter(|(_, picked_at)| now.saturating_duration_since(**picked_at) >= grace)
            .map(|(path, _)| path.clone())
            .collect();

        expired
            .into_iter()
            .filter_map(|path| self.pending.remove(&path).map(|t| (path, t)))
            .collect()
    }

    /// Put back a pending entry whose file could not be deleted.
    pub(crate) fn restore_pending(&mut self, path: String, picked_at: Instant) {
        self.pending.insert(path, picked_at);
    }

    pub(crate) fn status(&self) -> PoolStatus {
        let available_generative = self.generative_count();
        PoolStatus {
            available_static: self.available.len() - available_generative,
            available_generative,
            pending_deletion: self.pending.len(),
        }
    }
}
