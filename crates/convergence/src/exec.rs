//! External command execution.
//!
//! All state inspection and mutation that shells out goes through the
//! [`CommandRunner`] trait, so providers can be tested against a mock
//! and the shell-out can be swapped for an in-process library without
//! touching provider logic.

use std::path::{Path, PathBuf};
use std::process::Command;

use crate::error::{Error, Result};
use crate::resource::Ident;

/// A command to run: argv array plus execution context.
///
/// Commands are composed as argument vectors, never as shell strings,
/// so values containing spaces need no quoting or escaping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    /// Program to execute
    pub program: String,
    /// Arguments, one element per argv entry
    pub args: Vec<String>,
    /// Working directory, or inherit when `None`
    pub cwd: Option<PathBuf>,
    /// Environment overrides applied on top of the inherited environment
    pub env: Vec<(String, String)>,
    /// Effective user to run as (name or numeric id)
    pub user: Option<String>,
}

impl CommandSpec {
    /// Build a spec for `program` with the given arguments.
    pub fn new(program: impl Into<String>, args: &[&str]) -> Self {
        Self {
            program: program.into(),
            args: args.iter().map(ToString::to_string).collect(),
            cwd: None,
            env: Vec::new(),
            user: None,
        }
    }

    /// Set the working directory.
    pub fn cwd(mut self, dir: impl AsRef<Path>) -> Self {
        self.cwd = Some(dir.as_ref().to_path_buf());
        self
    }

    /// Add an environment override.
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    /// Run as the given user (name or numeric id).
    pub fn user(mut self, user: impl Into<String>) -> Self {
        self.user = Some(user.into());
        self
    }

    /// The command line as a display string, for logs and errors.
    pub fn display(&self) -> String {
        let mut line = self.program.clone();
        for arg in &self.args {
            line.push(' ');
            line.push_str(arg);
        }
        line
    }
}

/// Captured output of a completed process. Immutable once produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandResult {
    /// Full standard output, decoded lossily
    pub stdout: String,
    /// Full standard error, decoded lossily
    pub stderr: String,
    /// Exit status; -1 when the process was killed by a signal
    pub status: i32,
}

impl CommandResult {
    /// Whether the process exited with status zero.
    pub fn success(&self) -> bool {
        self.status == 0
    }
}

/// Runs external commands to completion, blocking the caller.
pub trait CommandRunner: Send + Sync {
    /// Run the command and capture its output.
    ///
    /// A nonzero exit status is returned as data; the only error is a
    /// process that could not be launched.
    fn run(&self, spec: &CommandSpec) -> Result<CommandResult>;

    /// Run the command and fail if it exits nonzero.
    fn run_checked(&self, spec: &CommandSpec) -> Result<CommandResult> {
        let result = self.run(spec)?;
        if result.success() {
            Ok(result)
        } else {
            Err(Error::CommandFailed {
                command: spec.display(),
                status: result.status,
                stderr: result.stderr.trim().to_string(),
            })
        }
    }
}

/// The real runner: spawns processes via `std::process::Command`.
///
/// Output is buffered fully in memory; commands at this system's scale
/// produce small output so unbounded capture is acceptable.
#[derive(Debug, Clone, Copy, Default)]
pub struct ShellRunner;

impl CommandRunner for ShellRunner {
    fn run(&self, spec: &CommandSpec) -> Result<CommandResult> {
        let mut command = Command::new(&spec.program);
        command.args(&spec.args);
        if let Some(dir) = &spec.cwd {
            command.current_dir(dir);
        }
        for (key, value) in &spec.env {
            command.env(key, value);
        }
        if let Some(user) = &spec.user {
            use std::os::unix::process::CommandExt;
            command.uid(Ident::Name(user.clone()).uid()?);
        }

        log::debug!("running: {}", spec.display());
        let output = command.output().map_err(|source| Error::CommandLaunch {
            program: spec.program.clone(),
            source,
        })?;

        Ok(CommandResult {
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            status: output.status.code().unwrap_or(-1),
        })
    }
}
