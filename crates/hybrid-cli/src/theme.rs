//! CLI theme and styling.

use colored::Colorize;
use hybrid_packages::InstallAction;

/// CLI theme configuration.
pub(crate) struct Theme;

impl Theme {
    /// Format a header.
    pub(crate) fn header(text: &str) -> String {
        format!("{}", text.bold().cyan())
    }

    /// Format a success message.
    pub(crate) fn success(text: &str) -> String {
        format!("{} {}", "✓".green(), text)
    }

    /// Format a warning message.
    pub(crate) fn warning(text: &str) -> String {
        format!("{} {}", "!".yellow(), text.yellow())
    }

    /// Format an info message.
    pub(crate) fn info(text: &str) -> String {
        format!("{} {}", "i".blue(), text)
    }

    /// Format a dimmed message.
    pub(crate) fn dimmed(text: &str) -> String {
        format!("{}", text.dimmed())
    }

    /// Format a separator line.
    pub(crate) fn separator() -> String {
        "━".repeat(50).dimmed().to_string()
    }

    /// Format a key-value pair.
    pub(crate) fn kv(key: &str, value: &str) -> String {
        format!("  {:<14} {}", format!("{key}:").bold(), value)
    }

    /// Format an installed flag.
    pub(crate) fn installed(installed: bool) -> String {
        if installed {
            "installed".green().to_string()
        } else {
            "not installed".dimmed().to_string()
        }
    }

    /// Format an install log action.
    pub(crate) fn action(action: InstallAction) -> String {
        let text = format!("{:<14}", action.as_str());
        match action {
            InstallAction::Install => text.green().to_string(),
            InstallAction::Uninstall => text.red().to_string(),
            InstallAction::SkipUninstall => text.yellow().to_string(),
        }
    }

    /// Format a timestamp.
    pub(crate) fn timestamp(dt: &chrono::DateTime<chrono::Utc>) -> String {
        dt.format("%Y-%m-%d %H:%M").to_string().dimmed().to_string()
    }
}
