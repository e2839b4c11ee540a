//! In-memory registry for service tests

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use super::api::{DeleteOutcome, RegistryApi, RepositoryPage, ResetOutcome, TagPage};
use crate::domain::{RepoNotification, RepositoryRef, Tag};
use crate::error::RegistryError;

#[derive(Default)]
struct Calls {
    repository_cursors: Vec<Option<String>>,
    tag_page_requests: usize,
    manifest_checks: Vec<String>,
    deletes: Vec<(RepositoryRef, String)>,
    resets: Vec<(RepositoryRef, String)>,
}

/// Scriptable [`RegistryApi`] that records every call
#[derive(Default)]
pub struct FakeRegistry {
    repository_pages: Vec<RepositoryPage>,
    failing_repository_call: Option<usize>,
    tag_pages: HashMap<RepositoryRef, Vec<TagPage>>,
    failing_tag_listings: HashSet<RepositoryRef>,
    unauthorized_tag_listings: HashSet<RepositoryRef>,
    existing_manifests: HashSet<String>,
    failing_manifests: HashSet<String>,
    missing_tags: HashSet<String>,
    failing_deletes: HashSet<String>,
    notifications: HashMap<RepositoryRef, Vec<RepoNotification>>,
    failing_notification_listings: HashSet<RepositoryRef>,
    unauthorized_notification_listings: HashSet<RepositoryRef>,
    missing_notifications: HashSet<String>,
    failing_resets: HashSet<String>,
    calls: Mutex<Calls>,
}

fn transient(what: &str) -> RegistryError {
    RegistryError::Transient {
        attempts: 5,
        message: format!("HTTP 502 from {}", what),
    }
}

fn server_error(what: &str) -> RegistryError {
    RegistryError::UnexpectedResponse {
        status: 500,
        url: what.to_string(),
        body: "internal error".to_string(),
    }
}

impl FakeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a page of repositories in namespace "sample"
    pub fn with_repository_page(mut self, names: &[&str], next_page: Option<&str>) -> Self {
        self.repository_pages.push(RepositoryPage {
            repositories: names
                .iter()
                .map(|n| RepositoryRef::new("sample", *n))
                .collect(),
            next_page: next_page.map(str::to_string),
        });
        self
    }

    /// Make the `call`-th (0-based) repository listing call fail
    pub fn with_repository_listing_failure(mut self, call: usize) -> Self {
        self.failing_repository_call = Some(call);
        self
    }

    pub fn with_tag_page(mut self, repo: &RepositoryRef, tags: Vec<Tag>, has_additional: bool) -> Self {
        self.tag_pages
            .entry(repo.clone())
            .or_default()
            .push(TagPage { tags, has_additional });
        self
    }

    /// Single-page listing
    pub fn with_tags(self, repo: &RepositoryRef, tags: &[(&str, &str)]) -> Self {
        let tags = tags.iter().map(|(n, d)| Tag::new(*n, *d)).collect();
        self.with_tag_page(repo, tags, false)
    }

    pub fn with_tag_listing_failure(mut self, repo: &RepositoryRef) -> Self {
        self.failing_tag_listings.insert(repo.clone());
        self
    }

    pub fn with_unauthorized_tag_listing(mut self, repo: &RepositoryRef) -> Self {
        self.unauthorized_tag_listings.insert(repo.clone());
        self
    }

    pub fn with_manifest(mut self, digest: &str) -> Self {
        self.existing_manifests.insert(digest.to_string());
        self
    }

    pub fn with_manifest_failure(mut self, digest: &str) -> Self {
        self.failing_manifests.insert(digest.to_string());
        self
    }

    /// Deleting `tag` answers not-found
    pub fn with_missing_tag(mut self, tag: &str) -> Self {
        self.missing_tags.insert(tag.to_string());
        self
    }

    pub fn with_delete_failure(mut self, tag: &str) -> Self {
        self.failing_deletes.insert(tag.to_string());
        self
    }

    pub fn with_notifications(mut self, repo: &RepositoryRef, notifications: Vec<RepoNotification>) -> Self {
        self.notifications.insert(repo.clone(), notifications);
        self
    }

    pub fn with_notification_listing_failure(mut self, repo: &RepositoryRef) -> Self {
        self.failing_notification_listings.insert(repo.clone());
        self
    }

    pub fn with_unauthorized_notification_listing(mut self, repo: &RepositoryRef) -> Self {
        self.unauthorized_notification_listings.insert(repo.clone());
        self
    }

    pub fn with_missing_notification(mut self, uuid: &str) -> Self {
        self.missing_notifications.insert(uuid.to_string());
        self
    }

    pub fn with_reset_failure(mut self, uuid: &str) -> Self {
        self.failing_resets.insert(uuid.to_string());
        self
    }

    pub fn repository_cursors(&self) -> Vec<Option<String>> {
        self.calls.lock().unwrap().repository_cursors.clone()
    }

    pub fn tag_page_requests(&self) -> usize {
        self.calls.lock().unwrap().tag_page_requests
    }

    pub fn manifest_checks(&self) -> Vec<String> {
        self.calls.lock().unwrap().manifest_checks.clone()
    }

    pub fn deleted_tags(&self) -> Vec<String> {
        self.calls
            .lock()
            .unwrap()
            .deletes
            .iter()
            .map(|(_, tag)| tag.clone())
            .collect()
    }

    pub fn resets(&self) -> Vec<String> {
        self.calls
            .lock()
            .unwrap()
            .resets
            .iter()
            .map(|(_, uuid)| uuid.clone())
            .collect()
    }

    /// Total calls that would mutate the registry
    pub fn mutating_calls(&self) -> usize {
        let calls = self.calls.lock().unwrap();
        calls.deletes.len() + calls.resets.len()
    }
}

#[async_trait]
impl RegistryApi for FakeRegistry {
    async fn list_repositories_page(
        &self,
        _namespace: &str,
        cursor: Option<&str>,
    ) -> Result<RepositoryPage, RegistryError> {
        let call = {
            let mut calls = self.calls.lock().unwrap();
            calls.repository_cursors.push(cursor.map(str::to_string));
            calls.repository_cursors.len() - 1
        };
        if self.failing_repository_call == Some(call) {
            return Err(transient("/repository"));
        }
        Ok(self.repository_pages.get(call).cloned().unwrap_or_default())
    }

    async fn list_tags_page(
        &self,
        repo: &RepositoryRef,
        page: u32,
    ) -> Result<TagPage, RegistryError> {
        self.calls.lock().unwrap().tag_page_requests += 1;
        if self.unauthorized_tag_listings.contains(repo) {
            return Err(RegistryError::Unauthorized { status: 403 });
        }
        if self.failing_tag_listings.contains(repo) {
            return Err(transient(&format!("{}/tag/", repo)));
        }
        Ok(self
            .tag_pages
            .get(repo)
            .and_then(|pages| pages.get(page as usize - 1))
            .cloned()
            .unwrap_or_default())
    }

    async fn manifest_exists(
        &self,
        _repo: &RepositoryRef,
        digest: &str,
    ) -> Result<bool, RegistryError> {
        self.calls
            .lock()
            .unwrap()
            .manifest_checks
            .push(digest.to_string());
        if self.failing_manifests.contains(digest) {
            return Err(server_error(digest));
        }
        Ok(self.existing_manifests.contains(digest))
    }

    async fn delete_tag(
        &self,
        repo: &RepositoryRef,
        tag: &str,
    ) -> Result<DeleteOutcome, RegistryError> {
        if self.failing_deletes.contains(tag) {
            return Err(server_error(tag));
        }
        self.calls
            .lock()
            .unwrap()
            .deletes
            .push((repo.clone(), tag.to_string()));
        if self.missing_tags.contains(tag) {
            return Ok(DeleteOutcome::AlreadyGone);
        }
        Ok(DeleteOutcome::Deleted)
    }

    async fn list_notifications(
        &self,
        repo: &RepositoryRef,
    ) -> Result<Vec<RepoNotification>, RegistryError> {
        if self.unauthorized_notification_listings.contains(repo) {
            return Err(RegistryError::Unauthorized { status: 401 });
        }
        if self.failing_notification_listings.contains(repo) {
            return Err(server_error(&format!("{}/notification/", repo)));
        }
        Ok(self.notifications.get(repo).cloned().unwrap_or_default())
    }

    async fn reset_notification(
        &self,
        repo: &RepositoryRef,
        uuid: &str,
    ) -> Result<ResetOutcome, RegistryError> {
        if self.failing_resets.contains(uuid) {
            return Err(server_error(uuid));
        }
        self.calls
            .lock()
            .unwrap()
            .resets
            .push((repo.clone(), uuid.to_string()));
        if self.missing_notifications.contains(uuid) {
            return Ok(ResetOutcome::NotFound);
        }
        Ok(ResetOutcome::Reset)
    }
}
