//! Content pool: available and pending-deletion catalogs
//!
//! - [`PoolManager`]: the only entry point to the shared catalogs. Creates
//!   static and generative artifacts, hands them out, reclaims picked ones.
//! - `catalog`: the in-memory state guarded by the manager's lock.

mod catalog;
mod manager;

pub use catalog::{CatalogEntry, PickedArtifact, PoolStatus};
pub use manager::{PoolManager, ReclaimReport};
