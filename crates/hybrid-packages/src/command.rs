//! Subprocess execution seam.
//!
//! Everything that shells out (interpreters, package managers, `nvcc`) goes
//! through [`CommandRunner`], so tests can substitute a recording fake.

use std::ffi::OsString;
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use tracing::trace;

use crate::error::{PackageError, PackageResult};

/// A command line to execute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    program: PathBuf,
    args: Vec<String>,
    env: Vec<(String, OsString)>,
}

impl CommandSpec {
    /// Start a command for `program`.
    #[must_use]
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            env: Vec::new(),
        }
    }

    /// Append one argument.
    #[must_use]
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Append several arguments.
    #[must_use]
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Set an environment variable for the child.
    #[must_use]
    pub fn env(mut self, key: impl Into<String>, value: impl Into<OsString>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    /// Program path.
    #[must_use]
    pub fn program(&self) -> &Path {
        &self.program
    }

    /// Arguments, excluding the program.
    #[must_use]
    pub fn get_args(&self) -> &[String] {
        &self.args
    }

    /// Value of an environment variable set on this command.
    #[must_use]
    pub fn get_env(&self, key: &str) -> Option<&OsString> {
        self.env.iter().rev().find(|(k, _)| k == key).map(|(_, v)| v)
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program.display())?;
        for arg in &self.args {
            if arg.contains(char::is_whitespace) {
                write!(f, " \"{arg}\"")?;
            } else {
                write!(f, " {arg}")?;
            }
        }
        Ok(())
    }
}

/// Captured result of a finished command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// Exit code; `None` if the process was killed by a signal.
    pub code: Option<i32>,
    /// Captured standard output.
    pub stdout: String,
    /// Captured standard error.
    pub stderr: String,
}

impl CommandOutput {
    /// A successful output with the given stdout.
    #[must_use]
    pub fn ok(stdout: impl Into<String>) -> Self {
        Self {
            code: Some(0),
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    /// A failed output with the given exit code and stderr.
    #[must_use]
    pub fn failed(code: i32, stderr: impl Into<String>) -> Self {
        Self {
            code: Some(code),
            stdout: String::new(),
            stderr: stderr.into(),
        }
    }

    /// Whether the command exited with status zero.
    #[must_use]
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

/// Runs commands and finds programs on `PATH`.
pub trait CommandRunner: Send + Sync {
    /// Run `command` to completion, capturing its output.
    ///
    /// A non-zero exit is not an error here; callers inspect
    /// [`CommandOutput::success`].
    ///
    /// # Errors
    ///
    /// Returns [`PackageError::Spawn`] if the process cannot be started.
    fn run(&self, command: &CommandSpec) -> PackageResult<CommandOutput>;

    /// Resolve `program` on `PATH`.
    fn locate(&self, program: &str) -> Option<PathBuf>;
}

/// [`CommandRunner`] backed by `std::process::Command`.
///
/// Standard input is closed so an interactive prompt fails fast instead of
/// hanging the worker.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner;

impl CommandRunner for SystemRunner {
    fn run(&self, command: &CommandSpec) -> PackageResult<CommandOutput> {
        trace!(command = %command, "running");
        let mut cmd = Command::new(command.program());
        cmd.args(command.get_args())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        for (key, value) in &command.env {
            cmd.env(key, value);
        }

        let output = cmd.output().map_err(|e| PackageError::Spawn {
            program: command.program().display().to_string(),
            source: e,
        })?;

        Ok(CommandOutput {
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }

    fn locate(&self, program: &str) -> Option<PathBuf> {
        which::which(program).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_quotes_whitespace() {
        let cmd = CommandSpec::new("/venv/bin/python")
            .args(["-c", "import sys; print(1)"])
            .arg("x");
        assert_eq!(
            cmd.to_string(),
            "/venv/bin/python -c \"import sys; print(1)\" x"
        );
    }

    #[test]
    fn test_env_last_write_wins() {
        let cmd = CommandSpec::new("python")
            .env("PYTHONPATH", "/a")
            .env("PYTHONPATH", "/b");
        assert_eq!(cmd.get_env("PYTHONPATH"), Some(&OsString::from("/b")));
        assert!(cmd.get_env("HOME").is_none());
    }

    #[test]
    fn test_output_success() {
        assert!(CommandOutput::ok("").success());
        assert!(!CommandOutput::failed(1, "boom").success());
        assert!(!CommandOutput::default().success());
    }

    #[cfg(unix)]
    #[test]
    fn test_system_runner_captures_exit_and_stderr() {
        let runner = SystemRunner;
        let out = runner
            .run(&CommandSpec::new("sh").args(["-c", "echo out; echo err >&2; exit 3"]))
            .unwrap();
        assert_eq!(out.code, Some(3));
        assert_eq!(out.stdout.trim(), "out");
        assert_eq!(out.stderr.trim(), "err");
    }

    #[test]
    fn test_system_runner_spawn_error() {
        let err = SystemRunner
            .run(&CommandSpec::new("/definitely/not/a/program"))
            .unwrap_err();
        assert!(matches!(err, PackageError::Spawn { .. }));
    }
}
