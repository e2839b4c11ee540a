//! Registry capability set consumed by the services layer
//!
//! [`QuayClient`](super::quay::QuayClient) is the production implementation.
//! Services only depend on this trait so they can be exercised against an
//! in-memory registry in tests.

use async_trait::async_trait;

use crate::domain::{RepoNotification, RepositoryRef, Tag};
use crate::error::RegistryError;

/// One page of the organization's repository listing
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RepositoryPage {
    pub repositories: Vec<RepositoryRef>,
    /// Opaque cursor for the following page
    pub next_page: Option<String>,
}

/// One page of a repository's active tags
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagPage {
    pub tags: Vec<Tag>,
    pub has_additional: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    Deleted,
    /// Tag was already gone; deletes are idempotent
    AlreadyGone,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResetOutcome {
    Reset,
    NotFound,
}

/// Registry operations used by the pruning and notification services
#[async_trait]
pub trait RegistryApi: Send + Sync {
    /// List one page of repositories in `namespace`, starting at `cursor`
    async fn list_repositories_page(
        &self,
        namespace: &str,
        cursor: Option<&str>,
    ) -> Result<RepositoryPage, RegistryError>;

    /// List one page (1-based) of active tags. A repository that no longer
    /// exists yields an empty final page.
    async fn list_tags_page(
        &self,
        repo: &RepositoryRef,
        page: u32,
    ) -> Result<TagPage, RegistryError>;

    /// Whether a manifest is still stored. Not-found is `false`.
    async fn manifest_exists(
        &self,
        repo: &RepositoryRef,
        digest: &str,
    ) -> Result<bool, RegistryError>;

    async fn delete_tag(
        &self,
        repo: &RepositoryRef,
        tag: &str,
    ) -> Result<DeleteOutcome, RegistryError>;

    /// List notifications. A repository that no longer exists has none.
    async fn list_notifications(
        &self,
        repo: &RepositoryRef,
    ) -> Result<Vec<RepoNotification>, RegistryError>;

    async fn reset_notification(
        &self,
        repo: &RepositoryRef,
        uuid: &str,
    ) -> Result<ResetOutcome, RegistryError>;
}
