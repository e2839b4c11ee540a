//! Manifest existence cache
//!
//! Memoizes `manifest_exists` for a single repository pass. A digest is
//! checked against the registry at most once; the cache is dropped with the
//! pass, so answers never leak into another repository.

use futures::stream::{self, StreamExt};
use std::collections::HashMap;
use tracing::debug;

use crate::domain::RepositoryRef;
use crate::error::RegistryError;
use crate::infrastructure::RegistryApi;

pub struct ManifestExistenceCache<'a, A: RegistryApi + ?Sized> {
    api: &'a A,
    repo: &'a RepositoryRef,
    resolved: HashMap<String, bool>,
}

impl<'a, A: RegistryApi + ?Sized> ManifestExistenceCache<'a, A> {
    pub fn new(api: &'a A, repo: &'a RepositoryRef) -> Self {
        Self {
            api,
            repo,
            resolved: HashMap::new(),
        }
    }

    /// Cached answer, without touching the registry
    pub fn get(&self, digest: &str) -> Option<bool> {
        self.resolved.get(digest).copied()
    }

    /// Resolve every unresolved digest, at most `concurrency` checks in flight.
    ///
    /// Returns only after every launched check has finished. On failure the
    /// first error is returned; successful answers are still cached.
    pub async fn resolve_all(
        &mut self,
        digests: &[String],
        concurrency: usize,
    ) -> Result<(), RegistryError> {
        let mut pending: Vec<String> = Vec::new();
        for digest in digests {
            if !self.resolved.contains_key(digest) && !pending.contains(digest) {
                pending.push(digest.clone());
            }
        }
        if pending.is_empty() {
            return Ok(());
        }

        let api = self.api;
        let repo = self.repo;
        let results: Vec<(String, Result<bool, RegistryError>)> = stream::iter(pending)
            .map(move |digest| async move {
                let exists = api.manifest_exists(repo, &digest).await;
                (digest, exists)
            })
            .buffer_unordered(concurrency.max(1))
            .collect()
            .await;

        let mut first_error = None;
        for (digest, result) in results {
            match result {
                Ok(exists) => {
                    debug!(repository = %repo, digest = %digest, exists, "Checked manifest");
                    self.resolved.insert(digest, exists);
                }
                Err(e) if first_error.is_none() => first_error = Some(e),
                Err(_) => {}
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Number of digests resolved so far
    pub fn len(&self) -> usize {
        self.resolved.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resolved.is_empty()
    }
}
