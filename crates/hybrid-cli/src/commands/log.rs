//! Log command - show the install log.

use anyhow::{Context, Result};

use crate::app::App;
use crate::theme::Theme;

/// Print install log entries, oldest first.
pub(crate) fn show(app: &App, limit: Option<usize>) -> Result<()> {
    let log = app.service.orchestrator().log();
    let entries = log
        .entries()
        .with_context(|| format!("failed to read {}", log.path().display()))?;
    if entries.is_empty() {
        println!("{}", Theme::info("The install log is empty"));
        return Ok(());
    }

    let skip = limit.map_or(0, |n| entries.len().saturating_sub(n));
    println!("\n{}", Theme::header("Install log"));
    println!("{}", Theme::separator());
    for entry in entries.iter().skip(skip) {
        println!(
            "{} {} {:<16} {}",
            Theme::timestamp(&entry.timestamp),
            Theme::action(entry.action),
            entry.capability.as_str(),
            Theme::dimmed(&entry.packages.join(", "))
        );
    }
    println!();
    Ok(())
}
