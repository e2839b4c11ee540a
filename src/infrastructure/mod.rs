//! Infrastructure layer - external I/O adapters
//!
//! This module contains all code that interacts with external systems:
//! - Quay API v1 (tags, manifests, notifications)
//! - Repository and tag paging
//! - Transport retry policy

pub mod api;
pub mod pager;
pub mod quay;
pub mod retry;

#[cfg(test)]
pub mod testing;

// Re-export commonly used types
pub use api::{DeleteOutcome, RegistryApi, RepositoryPage, ResetOutcome, TagPage};
pub use pager::{fetch_tag_set, RepositoryPager, TagListing, TagListingOptions};
pub use quay::QuayClient;
pub use retry::RetryPolicy;
