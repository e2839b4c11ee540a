//! Domain layer - pure business logic
//!
//! This module contains business logic with no external I/O.
//! Types and functions here can be unit tested without mocking.

pub mod classifier;
pub mod notification;
pub mod tag;

// Re-export commonly used types
pub use classifier::{Action, Classification, ClassificationPlan, ClassificationResult, Reason};
pub use notification::RepoNotification;
pub use tag::{ManifestDigestIndex, RepositoryRef, Tag, TagSet, TimeWindow};
