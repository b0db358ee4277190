//! Install command - install and uninstall capabilities in the background.

use anyhow::{Result, bail};
use hybrid_packages::InstallOutcome;
use hybrid_telemetry::format_secs;

use crate::app::{App, parse_name};
use crate::theme::Theme;

/// Install whatever `raw` is missing.
pub(crate) async fn install(app: &App, raw: &str) -> Result<()> {
    let name = parse_name(raw)?;
    let missing = app.service.missing_packages(&name)?;
    if !missing.is_empty() {
        let listed: Vec<String> = missing.iter().map(ToString::to_string).collect();
        println!(
            "{}",
            Theme::info(&format!("Installing {name}: {}", listed.join(", ")))
        );
    }

    let done = app.service.install(&name)?.wait().await;
    match done.result {
        Ok(InstallOutcome::AlreadySatisfied) => {
            println!("{}", Theme::success(&format!("{name} is already installed")));
        },
        Ok(InstallOutcome::Installed(specs)) => {
            println!(
                "{}",
                Theme::success(&format!(
                    "Installed {} package(s) for {name} in {}s",
                    specs.len(),
                    format_secs(done.elapsed)
                ))
            );
        },
        Err(e) => bail!("installing {name} failed: {e}"),
    }
    Ok(())
}

/// Uninstall `raw`, reporting which packages were kept.
pub(crate) async fn uninstall(app: &App, raw: &str) -> Result<()> {
    let name = parse_name(raw)?;
    let done = app.service.uninstall(&name)?.wait().await;
    let outcome = match done.result {
        Ok(outcome) => outcome,
        Err(e) => bail!("uninstalling {name} failed: {e}"),
    };

    for spec in &outcome.removed {
        println!("  {} {spec}", Theme::dimmed("removed"));
    }
    for spec in &outcome.retained {
        println!(
            "{}",
            Theme::warning(&format!("kept {spec}, still needed by another capability"))
        );
    }
    if app.service.is_installed(&name)? {
        println!(
            "{}",
            Theme::info(&format!("{name} stays installed; all its packages are shared"))
        );
    } else {
        println!("{}", Theme::success(&format!("Uninstalled {name}")));
    }
    Ok(())
}
