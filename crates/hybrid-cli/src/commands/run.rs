//! Run command - invoke a capability and report its output.

use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use chrono::Utc;
use hybrid_capabilities::{
    CapabilityOutput, Invocation, InvocationOptions, create_base_filename, date_stamp,
};
use hybrid_telemetry::format_secs;
use tracing::debug;

use crate::app::{App, parse_name};
use crate::commands::install;
use crate::theme::Theme;

/// Arguments of one `run`.
pub(crate) struct RunRequest {
    pub(crate) input: String,
    pub(crate) file: bool,
    pub(crate) output: Option<PathBuf>,
    pub(crate) title: Option<String>,
    pub(crate) options: InvocationOptions,
    pub(crate) install: bool,
}

/// Invoke `raw` with `request`, installing it first when asked.
pub(crate) async fn run(app: &App, raw: &str, request: RunRequest) -> Result<()> {
    let name = parse_name(raw)?;
    if request.install && !app.service.is_installed(&name)? {
        install::install(app, raw).await?;
    }
    app.service.require_installed(&name)?;

    let output = match request.output {
        Some(path) => path,
        None => create_base_filename(
            request.title.as_deref(),
            &app.prefs.output_dir,
            name.as_str(),
            &date_stamp(Utc::now()),
        )
        .with_context(|| {
            format!(
                "failed to create output directory under {}",
                app.prefs.output_dir.display()
            )
        })?,
    };
    debug!(output = %output.display(), "output base");

    let invocation = if request.file {
        Invocation::file(&request.input)
    } else {
        Invocation::text(request.input)
    }
    .with_output(output)
    .with_options(request.options);

    let done = app.service.invoke(&name, invocation)?.wait().await;
    let result = match done.result {
        Ok(result) => result,
        Err(e) => bail!("{name} failed: {e}"),
    };

    match result {
        CapabilityOutput::File(path) => println!("{}", path.display()),
        CapabilityOutput::Files(paths) => {
            for path in paths {
                println!("{}", path.display());
            }
        },
        CapabilityOutput::Text(text) => println!("{text}"),
        CapabilityOutput::None => {},
    }
    eprintln!(
        "{}",
        Theme::success(&format!("{name} finished in {}s", format_secs(done.elapsed)))
    );
    Ok(())
}
