//! Cursor-driven paging over repository and tag listings
//!
//! Pagers are restartable only from the beginning; a failed page ends the
//! walk and the caller decides whether to start over.

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use super::api::RegistryApi;
use crate::domain::{RepositoryRef, TagSet, TimeWindow};
use crate::error::RegistryError;
use crate::shutdown::StopSignal;

/// Walks an organization's repositories one page at a time
pub struct RepositoryPager<'a, A: RegistryApi + ?Sized> {
    api: &'a A,
    namespace: String,
    cursor: Option<String>,
    done: bool,
}

impl<'a, A: RegistryApi + ?Sized> RepositoryPager<'a, A> {
    pub fn new(api: &'a A, namespace: impl Into<String>) -> Self {
        Self {
            api,
            namespace: namespace.into(),
            cursor: None,
            done: false,
        }
    }

    /// Fetch the next batch of repositories, `None` once the listing is exhausted.
    ///
    /// Paging ends on an empty page, a missing cursor, or a cursor the server
    /// already handed out.
    pub async fn next_batch(&mut self) -> Result<Option<Vec<RepositoryRef>>, RegistryError> {
        if self.done {
            return Ok(None);
        }

        let page = self
            .api
            .list_repositories_page(&self.namespace, self.cursor.as_deref())
            .await
            .inspect_err(|_| self.done = true)?;

        if page.repositories.is_empty() {
            debug!(namespace = %self.namespace, "No image repository is found");
            self.done = true;
            return Ok(None);
        }

        match page.next_page {
            Some(next) if self.cursor.as_deref() != Some(next.as_str()) => {
                self.cursor = Some(next);
            }
            _ => self.done = true,
        }

        Ok(Some(page.repositories))
    }
}

/// How a repository's tags should be read
#[derive(Debug, Clone, Copy, Default)]
pub struct TagListingOptions<'w> {
    /// Only used to decide when paging may stop early
    pub window: Option<&'w TimeWindow>,
    /// Stop once a tag older than the window shows up. Requires newest-first
    /// listings; disabled for a repository as soon as an ordering violation
    /// is observed.
    pub assume_newest_first: bool,
}

/// Result of reading a repository's tags
#[derive(Debug)]
pub enum TagListing {
    Complete(TagSet),
    /// Listing stopped early at the window's lower bound
    Truncated(TagSet),
    /// Stop signal observed between pages; the partial snapshot is discarded
    Cancelled,
}

/// Read every active tag of `repo` into one snapshot
pub async fn fetch_tag_set<A: RegistryApi + ?Sized>(
    api: &A,
    repo: &RepositoryRef,
    options: TagListingOptions<'_>,
    stop: &StopSignal,
) -> Result<TagListing, RegistryError> {
    let mut tags = TagSet::default();
    let mut early_stop = options.assume_newest_first && options.window.is_some();
    let mut last_created: Option<DateTime<Utc>> = None;
    let mut page = 1;

    loop {
        let batch = api.list_tags_page(repo, page).await?;
        let mut saw_older = false;

        for tag in batch.tags {
            if let Some(created) = tag.created_at {
                if early_stop && last_created.is_some_and(|prev| created > prev) {
                    warn!(
                        repository = %repo,
                        tag = %tag.name,
                        "Tags are not listed newest first, reading every page"
                    );
                    early_stop = false;
                }
                last_created = Some(created);
            }
            if options.window.is_some_and(|w| w.is_older(&tag)) {
                saw_older = true;
            }
            tags.push(tag);
        }

        if !batch.has_additional {
            return Ok(TagListing::Complete(tags));
        }
        if early_stop && saw_older {
            debug!(repository = %repo, page, "Reached tags older than the time window");
            return Ok(TagListing::Truncated(tags));
        }
        if stop.is_stopped() {
            return Ok(TagListing::Cancelled);
        }
        page += 1;
    }
}
