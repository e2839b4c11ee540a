//! Services layer - orchestration logic
//!
//! This module coordinates between domain logic and infrastructure.
//! Services use infrastructure adapters to perform I/O operations.

pub mod manifest_cache;
pub mod notification_service;
pub mod prune_service;

// Re-export commonly used types
pub use manifest_cache::ManifestExistenceCache;
pub use notification_service::{NotificationOutcome, NotificationReport, NotificationService};
pub use prune_service::{
    DeletionOutcome, PruneOptions, PruneReport, PruneService, RepositoryStatus,
};
