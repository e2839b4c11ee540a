//! Notification service - re-enables repository notifications that stopped
//! firing after delivery failures

use anyhow::{Context, Result};
use tracing::{debug, info, warn};

use crate::domain::RepositoryRef;
use crate::error::RegistryError;
use crate::infrastructure::{RegistryApi, RepositoryPager, ResetOutcome};
use crate::shutdown::StopSignal;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationOutcome {
    WouldReset,
    Reset,
    /// Removed between listing and reset
    NotFound,
    /// The reset call failed; the error is on the repository report
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationEntry {
    pub uuid: String,
    pub title: String,
    pub failures: u64,
    pub outcome: NotificationOutcome,
}

#[derive(Debug, Clone)]
pub struct NotificationRepositoryReport {
    pub sequence: usize,
    pub repository: RepositoryRef,
    pub entries: Vec<NotificationEntry>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct NotificationReport {
    pub dry_run: bool,
    pub repositories: Vec<NotificationRepositoryReport>,
    pub interrupted: bool,
}

impl NotificationReport {
    /// Notifications reset, or that would be reset in a dry run
    pub fn reset_count(&self) -> usize {
        self.repositories
            .iter()
            .flat_map(|r| &r.entries)
            .filter(|e| e.outcome != NotificationOutcome::Failed)
            .count()
    }

    pub fn failed(&self) -> impl Iterator<Item = &NotificationRepositoryReport> {
        self.repositories.iter().filter(|r| r.error.is_some())
    }
}

/// Service for resetting failing notifications
pub struct NotificationService<'a, A: RegistryApi + ?Sized> {
    api: &'a A,
    stop: StopSignal,
}

impl<'a, A: RegistryApi + ?Sized> NotificationService<'a, A> {
    pub fn new(api: &'a A, stop: StopSignal) -> Self {
        Self { api, stop }
    }

    pub async fn run(&self, namespace: &str, dry_run: bool) -> Result<NotificationReport> {
        let mut report = NotificationReport {
            dry_run,
            ..NotificationReport::default()
        };
        let mut pager = RepositoryPager::new(self.api, namespace);
        let mut sequence = 0;

        'walk: loop {
            if self.stop.is_stopped() {
                report.interrupted = true;
                break;
            }
            let batch = pager
                .next_batch()
                .await
                .with_context(|| format!("Unable to fetch repositories for namespace {}", namespace))?;
            let Some(batch) = batch else {
                break;
            };

            for repo in batch {
                if self.stop.is_stopped() {
                    report.interrupted = true;
                    break 'walk;
                }
                sequence += 1;
                info!("Processing repository {}: {}", sequence, repo);

                let mut repo_report = NotificationRepositoryReport {
                    sequence,
                    repository: repo,
                    entries: Vec::new(),
                    error: None,
                };
                match self.reset_repository(&mut repo_report, dry_run).await {
                    Ok(()) => {}
                    Err(e) if e.is_fatal() => return Err(e).context("Aborting run"),
                    Err(e) => {
                        warn!(repository = %repo_report.repository, error = %e, "Failed to list notifications");
                        repo_report.error = Some(e.to_string());
                    }
                }
                report.repositories.push(repo_report);
            }
        }

        Ok(report)
    }

    async fn reset_repository(
        &self,
        report: &mut NotificationRepositoryReport,
        dry_run: bool,
    ) -> Result<(), RegistryError> {
        let repo = report.repository.clone();
        let notifications = self.api.list_notifications(&repo).await?;

        for notification in notifications {
            if !notification.needs_reset() {
                debug!(repository = %repo, uuid = %notification.uuid, "Notification has no failures");
                continue;
            }

            let outcome = if dry_run {
                info!(
                    failures = notification.number_of_failures,
                    "Notification {} ({}) of {} should be reset",
                    notification.uuid,
                    notification.title,
                    repo
                );
                NotificationOutcome::WouldReset
            } else {
                info!(
                    failures = notification.number_of_failures,
                    "Resetting notification {} ({}) of {}",
                    notification.uuid,
                    notification.title,
                    repo
                );
                match self.api.reset_notification(&repo, &notification.uuid).await {
                    Ok(ResetOutcome::Reset) => NotificationOutcome::Reset,
                    Ok(ResetOutcome::NotFound) => {
                        info!(repository = %repo, uuid = %notification.uuid, "Notification no longer exists");
                        NotificationOutcome::NotFound
                    }
                    Err(e) if e.is_fatal() => return Err(e),
                    Err(e) => {
                        warn!(repository = %repo, uuid = %notification.uuid, error = %e, "Failed to reset notification");
                        report.error.get_or_insert_with(|| e.to_string());
                        NotificationOutcome::Failed
                    }
                }
            };

            report.entries.push(NotificationEntry {
                uuid: notification.uuid,
                title: notification.title,
                failures: notification.number_of_failures,
                outcome,
            });
        }

        Ok(())
    }
}
