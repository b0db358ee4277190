//! Runtime command - provision the numerical runtime.

use anyhow::{Result, bail};
use hybrid_packages::RuntimeOutcome;
use hybrid_telemetry::format_secs;

use crate::app::App;
use crate::theme::Theme;

/// Show the installed runtime version, if any.
pub(crate) fn status(app: &App) {
    match app.service.orchestrator().compatible_runtime() {
        Some(version) => println!("{}", Theme::kv("Runtime", &version)),
        None => println!("{}", Theme::warning("No compatible runtime installed")),
    }
}

/// Install the runtime unless a compatible one is present.
pub(crate) async fn install(app: &App) -> Result<()> {
    let done = app.service.provision_runtime()?.wait().await;
    match done.result {
        Ok(RuntimeOutcome::Compatible(version)) => {
            println!(
                "{}",
                Theme::success(&format!("Runtime {version} already installed"))
            );
        },
        Ok(RuntimeOutcome::Installed(index)) => {
            println!(
                "{}",
                Theme::success(&format!(
                    "Installed runtime from {} in {}s",
                    index.url(),
                    format_secs(done.elapsed)
                ))
            );
        },
        Err(e) => bail!("runtime install failed: {e}"),
    }
    Ok(())
}
