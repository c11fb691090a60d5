//! Operations: path resolution, conflict handling, and the dual-write
//! coordinator.
//!
//! The coordinator is one cohesive type whose operations are grouped by
//! mutation kind across the sibling modules: directory lifecycle in
//! [`directory`], file lifecycle in [`file`], the recursive copy engine in
//! [`copy`], the tag overlay in [`tags`], and tree materialization in
//! [`tree`].

pub mod conflict;
pub mod copy;
pub mod directory;
pub mod file;
pub mod resolver;
pub mod tags;
pub mod tree;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::config::VaultConfig;
use crate::error::VaultError;
use crate::infrastructure::audit::AuditLog;
use crate::infrastructure::cache::TreeCache;
use crate::infrastructure::catalog::{Catalog, CatalogError};
use crate::infrastructure::storage::PhysicalStorage;
use resolver::PathResolver;
use tags::History;

/// Cooperative cancellation checked between discrete steps of long-running
/// operations. Never interrupts a physical write in flight.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    pub(crate) fn check(&self, operation: &str) -> Result<(), VaultError> {
        if self.is_cancelled() {
            Err(VaultError::Cancelled(operation.to_string()))
        } else {
            Ok(())
        }
    }
}

/// Applies every structural mutation to both substrates: physical first,
/// catalog second, with the reversal plan captured before the commit.
pub struct Coordinator {
    pub(crate) catalog: Arc<dyn Catalog>,
    pub(crate) storage: PhysicalStorage,
    pub(crate) cache: Arc<dyn TreeCache>,
    pub(crate) audit: AuditLog,
    pub(crate) config: VaultConfig,
    pub(crate) resolver: PathResolver,
    pub(crate) history: Mutex<History>,
}

impl Coordinator {
    pub fn new(
        catalog: Arc<dyn Catalog>,
        storage: PhysicalStorage,
        cache: Arc<dyn TreeCache>,
        audit: AuditLog,
        config: VaultConfig,
    ) -> Self {
        let resolver = PathResolver::new(Arc::clone(&catalog));
        Self {
            catalog,
            storage,
            cache,
            audit,
            config,
            resolver,
            history: Mutex::new(History::default()),
        }
    }

    /// Cache key for this vault's materialized tree: the storage-root
    /// identity.
    pub(crate) fn cache_key(&self) -> String {
        self.storage.root().display().to_string()
    }

    pub(crate) async fn invalidate_cache(&self) {
        let key = self.cache_key();
        self.cache.invalidate(&key).await;
    }
}

/// Classify the outcome of a failed catalog commit by whether the physical
/// reversal landed: a reversed operation is recoverable, a failed reversal
/// leaves the substrates in disagreement.
pub(crate) fn rollback_outcome(
    operation: &str,
    commit_error: CatalogError,
    reversal: Result<(), std::io::Error>,
) -> VaultError {
    match reversal {
        Ok(()) => VaultError::ChangesRolledBack {
            operation: operation.to_string(),
            reason: commit_error.to_string(),
        },
        Err(reversal_error) => VaultError::RollbackFailed {
            operation: operation.to_string(),
            detail: format!(
                "commit failed ({commit_error}) and physical reversal failed ({reversal_error})"
            ),
        },
    }
}
