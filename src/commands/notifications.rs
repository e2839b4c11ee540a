//! Reset notifications command

use anyhow::{bail, Result};

use super::{connect, GlobalOptions};
use crate::services::{NotificationOutcome, NotificationReport, NotificationService};
use crate::shutdown::StopSignal;
use crate::ui::{self, RepositoryMark};

pub async fn execute(global: GlobalOptions, namespace: String, dry_run: bool) -> Result<()> {
    ui::print_header(&format!("Reset Notifications: {}", namespace));

    let (_config, client) = connect(global)?;
    if dry_run {
        ui::print_info("Dry run, no notification will be reset");
    }

    let stop = StopSignal::new();
    stop.stop_on_ctrl_c();

    let report = NotificationService::new(&client, stop)
        .run(&namespace, dry_run)
        .await?;
    print_summary(&report);

    let failed = report.failed().count();
    if failed > 0 {
        ui::print_error(&format!("{} repositories failed, see the log for details", failed));
        bail!("{} repositories could not be processed", failed);
    }
    Ok(())
}

fn print_summary(report: &NotificationReport) {
    println!();
    for repo in &report.repositories {
        let name = repo.repository.to_string();
        match &repo.error {
            Some(message) => ui::print_repository(RepositoryMark::Failed, &name, message),
            None if !repo.entries.is_empty() => ui::print_repository(
                RepositoryMark::Done,
                &name,
                &format!("{} notifications", repo.entries.len()),
            ),
            None => continue,
        }
        for entry in &repo.entries {
            let action = match entry.outcome {
                NotificationOutcome::WouldReset => "would reset",
                NotificationOutcome::Reset => "reset",
                NotificationOutcome::NotFound => "not found",
                NotificationOutcome::Failed => "failed",
            };
            ui::print_item(
                action,
                &entry.title,
                &format!("{} failures, {}", entry.failures, entry.uuid),
            );
        }
    }
    println!();

    ui::print_totals(
        report.dry_run,
        report.repositories.len(),
        report.reset_count(),
        "notifications",
        "reset",
    );
    if report.interrupted {
        ui::print_warning("Interrupted before every repository was processed");
    }
}
