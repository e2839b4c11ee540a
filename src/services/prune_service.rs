//! Prune service - removes orphaned and superseded tags across a namespace
//!
//! Walks every repository of the namespace, one at a time:
//! list tags, classify, confirm unreferenced manifests, then delete (or, in
//! dry-run mode, only report) the tags classified for deletion.
//!
//! A failure inside one repository ends that repository's work and the walk
//! moves on. Failures of the repository listing itself and authorization
//! failures end the whole run.

use anyhow::{Context, Result};
use tracing::{debug, info, warn};

use super::manifest_cache::ManifestExistenceCache;
use crate::domain::classifier;
use crate::domain::{Action, Reason, RepositoryRef, TimeWindow};
use crate::error::RegistryError;
use crate::infrastructure::{
    fetch_tag_set, DeleteOutcome, RegistryApi, RepositoryPager, TagListing, TagListingOptions,
};
use crate::shutdown::StopSignal;

/// Options for one pruning run
#[derive(Debug, Clone)]
pub struct PruneOptions {
    /// Organization namespace to walk
    pub namespace: String,
    /// Report decisions without deleting anything
    pub dry_run: bool,
    /// Only consider tags created inside this window
    pub window: Option<TimeWindow>,
    /// Concurrent manifest existence checks per repository
    pub verify_concurrency: usize,
    /// Allow early paging stop for windowed runs
    pub assume_newest_first: bool,
}

impl PruneOptions {
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            dry_run: false,
            window: None,
            verify_concurrency: 4,
            assume_newest_first: false,
        }
    }

    /// Builder: enable dry run
    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Builder: restrict to a time window
    pub fn with_window(mut self, window: Option<TimeWindow>) -> Self {
        self.window = window;
        self
    }

    /// Builder: set manifest check concurrency
    pub fn with_verify_concurrency(mut self, concurrency: usize) -> Self {
        self.verify_concurrency = concurrency;
        self
    }

    /// Builder: allow early paging stop
    pub fn assume_newest_first(mut self, assume: bool) -> Self {
        self.assume_newest_first = assume;
        self
    }
}

/// What happened to a tag classified for deletion
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeletionOutcome {
    /// Dry run
    WouldDelete,
    Deleted,
    /// The registry no longer had the tag
    AlreadyGone,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportEntry {
    pub tag: String,
    pub reason: Reason,
    pub outcome: DeletionOutcome,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RepositoryStatus {
    Completed,
    /// Stop signal observed while listing tags
    Cancelled,
    /// Work for this repository ended early with an error
    Failed(String),
}

/// Result of one repository pass
#[derive(Debug, Clone)]
pub struct RepositoryReport {
    /// Position of the repository in the run, starting at 1
    pub sequence: usize,
    pub repository: RepositoryRef,
    pub tags_seen: usize,
    pub kept: usize,
    pub manifest_checks: usize,
    pub entries: Vec<ReportEntry>,
    pub status: RepositoryStatus,
}

impl RepositoryReport {
    fn new(sequence: usize, repository: RepositoryRef) -> Self {
        Self {
            sequence,
            repository,
            tags_seen: 0,
            kept: 0,
            manifest_checks: 0,
            entries: Vec::new(),
            status: RepositoryStatus::Completed,
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self.status, RepositoryStatus::Failed(_))
    }
}

/// Result of a whole run
#[derive(Debug, Clone, Default)]
pub struct PruneReport {
    pub dry_run: bool,
    pub repositories: Vec<RepositoryReport>,
    /// The stop signal ended the walk before every repository was visited
    pub interrupted: bool,
}

impl PruneReport {
    /// Tags removed, or that would be removed in a dry run
    pub fn removal_count(&self) -> usize {
        self.repositories.iter().map(|r| r.entries.len()).sum()
    }

    pub fn failed(&self) -> impl Iterator<Item = &RepositoryReport> {
        self.repositories.iter().filter(|r| r.is_failed())
    }
}

/// Service for pruning tags
pub struct PruneService<'a, A: RegistryApi + ?Sized> {
    api: &'a A,
    stop: StopSignal,
}

impl<'a, A: RegistryApi + ?Sized> PruneService<'a, A> {
    /// Create a new prune service
    pub fn new(api: &'a A, stop: StopSignal) -> Self {
        Self { api, stop }
    }

    /// Walk every repository of the namespace
    pub async fn run(&self, options: &PruneOptions) -> Result<PruneReport> {
        let mut report = PruneReport {
            dry_run: options.dry_run,
            ..PruneReport::default()
        };
        let mut pager = RepositoryPager::new(self.api, &options.namespace);
        let mut sequence = 0;

        'walk: loop {
            if self.stop.is_stopped() {
                report.interrupted = true;
                break;
            }

            let batch = pager.next_batch().await.with_context(|| {
                format!("Unable to fetch repositories for namespace {}", options.namespace)
            })?;
            let Some(batch) = batch else {
                break;
            };

            for repo in batch {
                if self.stop.is_stopped() {
                    report.interrupted = true;
                    break 'walk;
                }
                sequence += 1;
                let repo_report = self
                    .prune_repository(sequence, repo, options)
                    .await
                    .context("Aborting run")?;
                report.repositories.push(repo_report);
            }
        }

        Ok(report)
    }

    /// Process a single repository.
    ///
    /// Only fatal errors are returned; anything else is recorded in the report.
    pub async fn prune_repository(
        &self,
        sequence: usize,
        repo: RepositoryRef,
        options: &PruneOptions,
    ) -> Result<RepositoryReport, RegistryError> {
        info!("Processing repository {}: {}", sequence, repo);
        let mut report = RepositoryReport::new(sequence, repo);

        match self.prune_tags(&mut report, options).await {
            Ok(()) => {}
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => {
                warn!(repository = %report.repository, error = %e, "Failed to prune repository");
                report.status = RepositoryStatus::Failed(e.to_string());
            }
        }

        Ok(report)
    }

    async fn prune_tags(
        &self,
        report: &mut RepositoryReport,
        options: &PruneOptions,
    ) -> Result<(), RegistryError> {
        let repo = report.repository.clone();
        let listing_options = TagListingOptions {
            window: options.window.as_ref(),
            assume_newest_first: options.assume_newest_first,
        };

        let (tags, complete) = match fetch_tag_set(self.api, &repo, listing_options, &self.stop).await? {
            TagListing::Complete(tags) => (tags, true),
            TagListing::Truncated(tags) => {
                debug!(repository = %repo, tags = tags.len(), "Classifying truncated listing");
                (tags, false)
            }
            TagListing::Cancelled => {
                info!(repository = %repo, "Stopped while listing tags");
                report.status = RepositoryStatus::Cancelled;
                return Ok(());
            }
        };
        report.tags_seen = tags.len();
        if tags.is_empty() {
            debug!(repository = %repo, "Repository has no tags");
            return Ok(());
        }

        let plan = if complete {
            classifier::plan(&tags, options.window.as_ref())
        } else {
            classifier::plan_truncated(&tags, options.window.as_ref())
        };
        let mut cache = ManifestExistenceCache::new(self.api, &repo);
        cache
            .resolve_all(&plan.pending_digests(), options.verify_concurrency)
            .await?;
        report.manifest_checks = cache.len();
        let result = plan.finalize(|digest| cache.get(digest));
        debug!(
            repository = %repo,
            decisions = result.len(),
            deletions = result.deletions().count(),
            "Classified tags"
        );
        if result.is_empty() {
            return Ok(());
        }

        for decision in result.iter() {
            let tag = &decision.tag.name;
            if decision.action == Action::Keep {
                debug!(repository = %repo, tag = %tag, reason = %decision.reason, "Keeping tag");
                report.kept += 1;
                continue;
            }

            let outcome = if options.dry_run {
                info!(reason = %decision.reason, "Tag {} from {} should be removed", tag, repo);
                DeletionOutcome::WouldDelete
            } else {
                info!(reason = %decision.reason, "Removing tag {} from {}", tag, repo);
                match self.api.delete_tag(&repo, tag).await? {
                    DeleteOutcome::Deleted => DeletionOutcome::Deleted,
                    DeleteOutcome::AlreadyGone => {
                        info!(repository = %repo, tag = %tag, "Tag was already removed");
                        DeletionOutcome::AlreadyGone
                    }
                }
            };

            report.entries.push(ReportEntry {
                tag: tag.clone(),
                reason: decision.reason,
                outcome,
            });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Tag;
    use crate::infrastructure::testing::FakeRegistry;
    use chrono::{DateTime, TimeZone, Utc};

    fn repo(name: &str) -> RepositoryRef {
        RepositoryRef::new("sample", name)
    }

    fn options() -> PruneOptions {
        PruneOptions::new("sample")
    }

    async fn run(registry: &FakeRegistry, options: &PruneOptions) -> PruneReport {
        PruneService::new(registry, StopSignal::new())
            .run(options)
            .await
            .unwrap()
    }

    fn entry(tag: &str, reason: Reason, outcome: DeletionOutcome) -> ReportEntry {
        ReportEntry {
            tag: tag.to_string(),
            reason,
            outcome,
        }
    }

    #[tokio::test]
    async fn test_orphan_attestation_is_deleted() {
        let hello = repo("hello-image");
        let registry = FakeRegistry::new()
            .with_repository_page(&["hello-image"], None)
            .with_tags(&hello, &[("sha256-abc123.att", "sha256:dx")]);

        let report = run(&registry, &options()).await;

        assert_eq!(registry.manifest_checks(), vec!["sha256:abc123"]);
        assert_eq!(registry.deleted_tags(), vec!["sha256-abc123.att"]);
        assert_eq!(
            report.repositories[0].entries,
            vec![entry("sha256-abc123.att", Reason::OrphanAttestation, DeletionOutcome::Deleted)]
        );
    }

    #[tokio::test]
    async fn test_referenced_artifacts_are_kept_without_checks() {
        let hello = repo("hello-image");
        let registry = FakeRegistry::new()
            .with_repository_page(&["hello-image"], None)
            .with_tags(
                &hello,
                &[("latest", "sha256:d1hex"), ("sha256-d1hex.sbom", "sha256:d2")],
            );

        let report = run(&registry, &options()).await;

        assert!(registry.manifest_checks().is_empty());
        assert!(registry.deleted_tags().is_empty());
        assert_eq!(report.repositories[0].kept, 2);
        assert_eq!(report.removal_count(), 0);
    }

    #[tokio::test]
    async fn test_existing_manifest_keeps_artifact() {
        let hello = repo("hello-image");
        let registry = FakeRegistry::new()
            .with_repository_page(&["hello-image"], None)
            .with_tags(&hello, &[("sha256-abc123.sig", "sha256:dx")])
            .with_manifest("sha256:abc123");

        let report = run(&registry, &options()).await;

        assert_eq!(registry.manifest_checks().len(), 1);
        assert!(registry.deleted_tags().is_empty());
        assert_eq!(report.repositories[0].manifest_checks, 1);
    }

    #[tokio::test]
    async fn test_each_digest_checked_once() {
        let hello = repo("hello-image");
        let registry = FakeRegistry::new()
            .with_repository_page(&["hello-image"], None)
            .with_tags(
                &hello,
                &[
                    ("sha256-071c766795a0.sbom", "sha256:961207f62413"),
                    ("sha256-071c766795a0.att", "sha256:961207f62413"),
                    ("sha256-071c766795a0.src", "sha256:0ab207f62413"),
                    ("sha256-071c766795a0.sig", "sha256:0ab207f62414"),
                ],
            );

        let report = run(&registry, &options()).await;

        assert_eq!(registry.manifest_checks(), vec!["sha256:071c766795a0"]);
        assert_eq!(registry.deleted_tags().len(), 4);
        assert_eq!(report.removal_count(), 4);
    }

    #[tokio::test]
    async fn test_legacy_source_tags() {
        let hello = repo("hello-image");
        let registry = FakeRegistry::new()
            .with_repository_page(&["hello-image"], None)
            .with_tags(
                &hello,
                &[
                    ("orphan.src", "sha256:d9"),
                    ("foo", "sha256:d1hex"),
                    ("foo.src", "sha256:d2"),
                    ("sha256-d1hex.src", "sha256:d2"),
                    ("bar", "sha256:d3"),
                    ("bar.src", "sha256:d4"),
                ],
            );

        let report = run(&registry, &options()).await;

        assert!(registry.manifest_checks().is_empty());
        assert_eq!(registry.deleted_tags(), vec!["orphan.src", "foo.src"]);
        assert!(report.repositories[0]
            .entries
            .iter()
            .all(|e| e.reason == Reason::DeprecatedLegacySource));
    }

    #[tokio::test]
    async fn test_empty_repository_makes_no_calls() {
        let registry = FakeRegistry::new().with_repository_page(&["empty"], None);

        let report = run(&registry, &options()).await;

        assert_eq!(registry.tag_page_requests(), 1);
        assert!(registry.manifest_checks().is_empty());
        assert_eq!(registry.mutating_calls(), 0);
        assert_eq!(report.repositories[0].tags_seen, 0);
        assert_eq!(report.repositories[0].status, RepositoryStatus::Completed);
    }

    #[tokio::test]
    async fn test_dry_run_makes_no_mutating_calls() {
        let hello = repo("hello-image");
        let registry = FakeRegistry::new()
            .with_repository_page(&["hello-image"], None)
            .with_tags(
                &hello,
                &[("latest", "sha256:93a8743dc130"), ("sha256-071c766795a0.sbom", "sha256:9612")],
            );

        let report = run(&registry, &options().dry_run(true)).await;

        assert_eq!(registry.mutating_calls(), 0);
        assert!(report.dry_run);
        assert_eq!(
            report.repositories[0].entries,
            vec![entry(
                "sha256-071c766795a0.sbom",
                Reason::OrphanSbom,
                DeletionOutcome::WouldDelete
            )]
        );
    }

    #[tokio::test]
    async fn test_already_deleted_tag_counts_as_success() {
        let hello = repo("hello-image");
        let registry = FakeRegistry::new()
            .with_repository_page(&["hello-image"], None)
            .with_tags(&hello, &[("gone.src", "sha256:d2")])
            .with_missing_tag("gone.src");

        let report = run(&registry, &options()).await;

        let repo_report = &report.repositories[0];
        assert_eq!(repo_report.status, RepositoryStatus::Completed);
        assert_eq!(
            repo_report.entries,
            vec![entry(
                "gone.src",
                Reason::DeprecatedLegacySource,
                DeletionOutcome::AlreadyGone
            )]
        );
    }

    #[tokio::test]
    async fn test_delete_failure_isolated_to_repository() {
        let first = repo("first");
        let second = repo("second");
        let registry = FakeRegistry::new()
            .with_repository_page(&["first", "second"], None)
            .with_tags(&first, &[("a.src", "sha256:1"), ("b.src", "sha256:2")])
            .with_tags(&second, &[("c.src", "sha256:3")])
            .with_delete_failure("a.src");

        let report = run(&registry, &options()).await;

        assert!(report.repositories[0].is_failed());
        assert!(report.repositories[0].entries.is_empty());
        assert_eq!(report.repositories[1].status, RepositoryStatus::Completed);
        assert_eq!(registry.deleted_tags(), vec!["c.src"]);
        assert_eq!(report.failed().count(), 1);
    }

    #[tokio::test]
    async fn test_manifest_check_failure_deletes_nothing() {
        let hello = repo("hello-image");
        let registry = FakeRegistry::new()
            .with_repository_page(&["hello-image"], None)
            .with_tags(
                &hello,
                &[("orphan.src", "sha256:d9"), ("sha256-abc.att", "sha256:dx")],
            )
            .with_manifest_failure("sha256:abc");

        let report = run(&registry, &options()).await;

        assert!(report.repositories[0].is_failed());
        assert!(registry.deleted_tags().is_empty());
    }

    #[tokio::test]
    async fn test_tag_listing_failure_isolated_to_repository() {
        let broken = repo("broken");
        let fine = repo("fine");
        let registry = FakeRegistry::new()
            .with_repository_page(&["broken", "fine"], None)
            .with_tag_listing_failure(&broken)
            .with_tags(&fine, &[("x.src", "sha256:1")]);

        let report = run(&registry, &options()).await;

        assert!(report.repositories[0].is_failed());
        assert_eq!(report.repositories[1].entries.len(), 1);
    }

    #[tokio::test]
    async fn test_repository_listing_failure_is_fatal() {
        let registry = FakeRegistry::new()
            .with_repository_page(&["hello-image"], Some("2"))
            .with_repository_listing_failure(1);

        let err = PruneService::new(&registry, StopSignal::new())
            .run(&options())
            .await
            .unwrap_err();
        assert!(format!("{:#}", err).contains("Unable to fetch repositories"));
    }

    #[tokio::test]
    async fn test_unauthorized_is_fatal() {
        let first = repo("first");
        let second = repo("second");
        let registry = FakeRegistry::new()
            .with_repository_page(&["first", "second"], None)
            .with_unauthorized_tag_listing(&first)
            .with_tags(&second, &[("c.src", "sha256:3")]);

        let result = PruneService::new(&registry, StopSignal::new())
            .run(&options())
            .await;
        assert!(result.is_err());
        assert_eq!(registry.tag_page_requests(), 1);
    }

    #[tokio::test]
    async fn test_sequence_spans_pages() {
        let registry = FakeRegistry::new()
            .with_repository_page(&["a", "b"], Some("2"))
            .with_repository_page(&["c"], None);

        let report = run(&registry, &options()).await;

        let sequences: Vec<_> = report.repositories.iter().map(|r| r.sequence).collect();
        assert_eq!(sequences, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_stop_signal_prevents_further_repositories() {
        let registry = FakeRegistry::new().with_repository_page(&["a", "b"], None);
        let stop = StopSignal::new();
        stop.stop();

        let report = PruneService::new(&registry, stop).run(&options()).await.unwrap();

        assert!(report.interrupted);
        assert!(report.repositories.is_empty());
        assert!(registry.repository_cursors().is_empty());
    }

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    #[tokio::test]
    async fn test_time_window_limits_candidates() {
        let hello = repo("hello-image");
        let registry = FakeRegistry::new()
            .with_repository_page(&["hello-image"], None)
            .with_tag_page(
                &hello,
                vec![
                    Tag::new("new.src", "sha256:1").created(at(9 * 86_400)),
                    Tag::new("old.src", "sha256:2").created(at(86_400)),
                ],
                false,
            );
        let window = TimeWindow::last_days(at(10 * 86_400), 3);

        let report = run(&registry, &options().with_window(Some(window))).await;

        assert_eq!(registry.deleted_tags(), vec!["new.src"]);
        assert_eq!(report.repositories[0].tags_seen, 2);
        assert_eq!(report.repositories[0].kept, 0);
    }

    #[tokio::test]
    async fn test_early_stop_keeps_source_of_binary_on_unread_page() {
        let hello = repo("hello-image");
        let registry = FakeRegistry::new()
            .with_repository_page(&["hello-image"], None)
            .with_tag_page(
                &hello,
                vec![
                    Tag::new("foo.src", "sha256:2").created(at(9 * 86_400)),
                    Tag::new("bar", "sha256:3").created(at(86_400)),
                ],
                true,
            )
            .with_tag_page(
                &hello,
                vec![Tag::new("foo", "sha256:1").created(at(100))],
                false,
            );
        let window = TimeWindow::last_days(at(10 * 86_400), 3);
        let options = options()
            .with_window(Some(window))
            .assume_newest_first(true);

        let report = run(&registry, &options).await;

        assert_eq!(registry.tag_page_requests(), 1);
        assert!(registry.deleted_tags().is_empty());
        assert_eq!(report.repositories[0].kept, 1);
    }
}
