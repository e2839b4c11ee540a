//! Prune tags command
//!
//! Deletes orphaned signature/attestation/SBOM/source tags and superseded
//! legacy source tags from every repository of a namespace.

use anyhow::{bail, Result};
use chrono::Utc;
use tracing::info;

use super::{connect, GlobalOptions};
use crate::domain::TimeWindow;
use crate::services::{DeletionOutcome, PruneOptions, PruneReport, PruneService, RepositoryStatus};
use crate::shutdown::StopSignal;
use crate::ui::{self, RepositoryMark};

pub async fn execute(
    global: GlobalOptions,
    namespace: String,
    dry_run: bool,
    days: Option<u32>,
) -> Result<()> {
    ui::print_header(&format!("Prune Tags: {}", namespace));

    let (config, client) = connect(global)?;
    let window = days.map(|days| TimeWindow::last_days(Utc::now(), days));
    if let Some(days) = days {
        info!("Only considering tags created in the last {} days", days);
    }
    if dry_run {
        ui::print_info("Dry run, no tag will be deleted");
    }

    let options = PruneOptions::new(namespace)
        .dry_run(dry_run)
        .with_window(window)
        .with_verify_concurrency(config.prune.verify_concurrency)
        .assume_newest_first(config.prune.assume_newest_first);

    let stop = StopSignal::new();
    stop.stop_on_ctrl_c();

    let report = PruneService::new(&client, stop).run(&options).await?;
    print_summary(&report);

    let failed = report.failed().count();
    if failed > 0 {
        ui::print_error(&format!("{} repositories failed, see the log for details", failed));
        bail!("{} repositories could not be pruned", failed);
    }
    Ok(())
}

fn print_summary(report: &PruneReport) {
    println!();
    for repo in &report.repositories {
        let name = repo.repository.to_string();
        match &repo.status {
            RepositoryStatus::Failed(message) => {
                ui::print_repository(RepositoryMark::Failed, &name, message);
            }
            RepositoryStatus::Cancelled => {
                ui::print_repository(RepositoryMark::Stopped, &name, "stopped while listing tags");
            }
            RepositoryStatus::Completed if !repo.entries.is_empty() => {
                ui::print_repository(
                    RepositoryMark::Done,
                    &name,
                    &format!("{} of {} tags", repo.entries.len(), repo.tags_seen),
                );
                for entry in &repo.entries {
                    let action = match entry.outcome {
                        DeletionOutcome::WouldDelete => "would delete",
                        DeletionOutcome::Deleted => "deleted",
                        DeletionOutcome::AlreadyGone => "already gone",
                    };
                    ui::print_item(action, &entry.tag, entry.reason.as_str());
                }
            }
            RepositoryStatus::Completed => {}
        }
    }
    println!();

    ui::print_totals(
        report.dry_run,
        report.repositories.len(),
        report.removal_count(),
        "tags",
        "removed",
    );
    if report.interrupted {
        ui::print_warning("Interrupted before every repository was processed");
    }
}
