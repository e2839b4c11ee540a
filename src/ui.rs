// Terminal output for janitor runs

use colored::Colorize;

/// How a repository came out of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepositoryMark {
    Done,
    Stopped,
    Failed,
}

pub fn print_header(title: &str) {
    println!();
    println!(
        "{}",
        "╔════════════════════════════════════════════════════════════╗".bright_blue()
    );
    println!("{}", format!("║  {:<58}║", title).bright_blue());
    println!(
        "{}",
        "╚════════════════════════════════════════════════════════════╝".bright_blue()
    );
    println!();
}

/// One line per repository of the run summary
pub fn print_repository(mark: RepositoryMark, repository: &str, detail: &str) {
    let mark = match mark {
        RepositoryMark::Done => "✓".green(),
        RepositoryMark::Stopped => "-".yellow(),
        RepositoryMark::Failed => "✗".red(),
    };
    println!("  {} {}: {}", mark, repository.bold(), detail);
}

/// A tag or notification handled in a repository
pub fn print_item(action: &str, name: &str, note: &str) {
    println!("      {:<13} {} ({})", action.dimmed(), name, note);
}

/// Closing totals, worded for dry runs
pub fn print_totals(dry_run: bool, repositories: usize, count: usize, noun: &str, done: &str) {
    let verb = if dry_run {
        format!("would be {}", done)
    } else {
        done.to_string()
    };
    print_success(&format!(
        "{} repositories processed, {} {} {}",
        repositories, count, noun, verb
    ));
}

pub fn print_success(message: &str) {
    println!("{}", format!("✅ {}", message).bright_green().bold());
}

pub fn print_error(message: &str) {
    eprintln!("{}", format!("❌ {}", message).bright_red().bold());
}

pub fn print_info(message: &str) {
    println!("{}", format!("ℹ️  {}", message).bright_cyan());
}

pub fn print_warning(message: &str) {
    println!("{}", format!("⚠️  {}", message).bright_yellow());
}
