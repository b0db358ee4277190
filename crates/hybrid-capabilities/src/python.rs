//! Capabilities implemented as Python functions.
//!
//! The function is called in the resolved interpreter through a bootstrap
//! script. The call is described by one JSON argument; the result comes back
//! as one marked JSON line on stdout so that anything else the library
//! prints is ignored.

use hybrid_core::CapabilityName;
use hybrid_packages::CommandSpec;
use serde_json::json;
use tracing::debug;

use crate::capability::{Capability, CapabilityOutput, Invocation, InvocationContext};
use crate::error::{CapabilityError, CapabilityResult};

/// Prefix of the result line.
pub const RESULT_MARKER: &str = "__hybrid_result__ ";

const BOOTSTRAP: &str = r#"
import importlib, json, os, sys
call = json.loads(sys.argv[1])
func = getattr(importlib.import_module(call["module"]), call["function"])
args = [call["input"]]
if call.get("output") is not None:
    args.append(call["output"])
result = func(*args, **call["kwargs"])
if result is None:
    out = {"kind": "none"}
elif isinstance(result, (list, tuple)):
    out = {"kind": "files", "value": [os.fspath(p) for p in result]}
elif isinstance(result, os.PathLike) or (isinstance(result, str) and os.path.exists(result)):
    out = {"kind": "file", "value": os.fspath(result)}
else:
    out = {"kind": "text", "value": str(result)}
print("__hybrid_result__ " + json.dumps(out), flush=True)
"#;

/// Calls `module.function(input, [output], **options)` in the interpreter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PythonEntrypoint {
    capability: CapabilityName,
    module: String,
    function: String,
}

impl PythonEntrypoint {
    /// Entrypoint for `capability` at `module.function`.
    #[must_use]
    pub fn new(
        capability: CapabilityName,
        module: impl Into<String>,
        function: impl Into<String>,
    ) -> Self {
        Self {
            capability,
            module: module.into(),
            function: function.into(),
        }
    }

    /// Module path.
    #[must_use]
    pub fn module(&self) -> &str {
        &self.module
    }

    /// Function name.
    #[must_use]
    pub fn function(&self) -> &str {
        &self.function
    }

    /// Command that performs `invocation`.
    #[must_use]
    pub fn command(&self, ctx: &InvocationContext, invocation: &Invocation) -> CommandSpec {
        let call = json!({
            "module": self.module,
            "function": self.function,
            "input": invocation.input.as_value(),
            "output": invocation.output.as_ref().map(|p| p.display().to_string()),
            "kwargs": invocation.options.to_kwargs(),
        });
        ctx.import_paths().apply(
            CommandSpec::new(ctx.python())
                .args(["-c", BOOTSTRAP])
                .arg(call.to_string()),
        )
    }

    /// Extract the result from the entrypoint's stdout.
    ///
    /// # Errors
    ///
    /// Returns [`CapabilityError::InvalidOutput`] if no result line is
    /// present or it does not parse.
    pub fn parse_result(&self, stdout: &str) -> CapabilityResult<CapabilityOutput> {
        let line = stdout
            .lines()
            .rev()
            .find_map(|l| l.strip_prefix(RESULT_MARKER))
            .ok_or_else(|| CapabilityError::InvalidOutput {
                capability: self.capability.clone(),
                reason: "no result line".to_string(),
            })?;
        serde_json::from_str(line).map_err(|e| CapabilityError::InvalidOutput {
            capability: self.capability.clone(),
            reason: e.to_string(),
        })
    }
}

impl Capability for PythonEntrypoint {
    fn invoke(
        &self,
        ctx: &InvocationContext,
        invocation: &Invocation,
    ) -> CapabilityResult<CapabilityOutput> {
        let command = self.command(ctx, invocation);
        debug!(
            capability = %self.capability,
            module = %self.module,
            function = %self.function,
            "invoking entrypoint"
        );
        let out = ctx.runner().run(&command)?;
        if !out.success() {
            let message = out
                .stderr
                .lines()
                .rev()
                .find(|l| !l.trim().is_empty())
                .unwrap_or("entrypoint exited with an error")
                .trim()
                .to_string();
            return Err(CapabilityError::InvocationFailed {
                capability: self.capability.clone(),
                message,
            });
        }
        self.parse_result(&out.stdout)
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;
    use std::sync::{Arc, Mutex};

    use hybrid_packages::{CommandOutput, CommandRunner, ImportPaths, PackageResult};

    use super::*;
    use crate::capability::InvocationOptions;

    struct Scripted {
        output: CommandOutput,
        seen: Mutex<Vec<CommandSpec>>,
    }

    impl CommandRunner for Scripted {
        fn run(&self, command: &CommandSpec) -> PackageResult<CommandOutput> {
            self.seen.lock().unwrap().push(command.clone());
            Ok(self.output.clone())
        }

        fn locate(&self, _program: &str) -> Option<PathBuf> {
            None
        }
    }

    fn setup(output: CommandOutput) -> (Arc<Scripted>, InvocationContext, PythonEntrypoint) {
        let runner = Arc::new(Scripted {
            output,
            seen: Mutex::new(Vec::new()),
        });
        let paths = ImportPaths::new();
        paths.push("/home/u/.hybrid_tts/venv/lib/python3.11/site-packages");
        let ctx = InvocationContext::new("/usr/bin/python3", paths, runner.clone());
        let entry = PythonEntrypoint::new(
            CapabilityName::from_static("gtts"),
            "hybrid_backends.gtts",
            "synthesize",
        );
        (runner, ctx, entry)
    }

    #[test]
    fn test_call_payload() {
        let (runner, ctx, entry) =
            setup(CommandOutput::ok(format!("{RESULT_MARKER}{{\"kind\":\"none\"}}\n")));
        let invocation = Invocation::text("hello")
            .with_output("/tmp/out.mp3")
            .with_options(InvocationOptions {
                lang: Some("fr".to_string()),
                ..InvocationOptions::default()
            });
        assert_eq!(entry.invoke(&ctx, &invocation).unwrap(), CapabilityOutput::None);

        let seen = runner.seen.lock().unwrap();
        let args = seen[0].get_args();
        assert_eq!(args[0], "-c");
        let call: serde_json::Value = serde_json::from_str(&args[2]).unwrap();
        assert_eq!(call["module"], "hybrid_backends.gtts");
        assert_eq!(call["input"], "hello");
        assert_eq!(call["output"], "/tmp/out.mp3");
        assert_eq!(call["kwargs"], json!({"lang": "fr"}));
        assert!(seen[0].get_env("PYTHONPATH").is_some());
    }

    #[test]
    fn test_result_line_found_among_noise() {
        let stdout = format!(
            "loading model...\n{RESULT_MARKER}{{\"kind\":\"file\",\"value\":\"/tmp/a.wav\"}}\nbye\n"
        );
        let (_, ctx, entry) = setup(CommandOutput::ok(stdout));
        assert_eq!(
            entry.invoke(&ctx, &Invocation::text("x")).unwrap(),
            CapabilityOutput::File(PathBuf::from("/tmp/a.wav"))
        );
    }

    #[test]
    fn test_missing_result_line() {
        let (_, ctx, entry) = setup(CommandOutput::ok("nothing useful"));
        let err = entry.invoke(&ctx, &Invocation::text("x")).unwrap_err();
        assert!(matches!(err, CapabilityError::InvalidOutput { .. }));
    }

    #[test]
    fn test_failure_reports_last_stderr_line() {
        let (_, ctx, entry) = setup(CommandOutput::failed(
            1,
            "Traceback (most recent call last):\n  ...\nModuleNotFoundError: No module named 'gtts'\n",
        ));
        match entry.invoke(&ctx, &Invocation::text("x")).unwrap_err() {
            CapabilityError::InvocationFailed { message, .. } => {
                assert_eq!(message, "ModuleNotFoundError: No module named 'gtts'");
            },
            other => panic!("unexpected error: {other}"),
        }
    }
}
