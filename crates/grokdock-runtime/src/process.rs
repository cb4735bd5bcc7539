//! External process execution.
//!
//! Every command the pipeline runs goes through [`ProcessRunner`], so the
//! orchestration logic can be exercised against a scripted runner.

use std::fmt;
use std::io::Write;
use std::process::{Command, Stdio};

use grokdock_common::error::{CiError, Result};

use crate::exec::ExecOutput;

/// A command line to execute, with optional data piped to stdin.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct CommandSpec {
    /// Program name or path.
    pub program: String,
    /// Arguments passed to the program.
    pub args: Vec<String>,
    /// Bytes written to the child's stdin, which is then closed.
    pub stdin: Option<Vec<u8>>,
}

impl CommandSpec {
    /// Creates a command for the given program with no arguments.
    #[must_use]
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            stdin: None,
        }
    }

    /// Appends one argument.
    #[must_use]
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Appends several arguments.
    #[must_use]
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Sets the bytes piped to stdin.
    #[must_use]
    pub fn stdin(mut self, input: impl Into<Vec<u8>>) -> Self {
        self.stdin = Some(input.into());
        self
    }

    /// Returns the command line as a single string.
    #[must_use]
    pub fn command_line(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

// Stdin may carry registry secrets, so it is never printed.
impl fmt::Debug for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandSpec")
            .field("program", &self.program)
            .field("args", &self.args)
            .field("stdin", &self.stdin.as_ref().map(|b| format!("<{} bytes>", b.len())))
            .finish()
    }
}

/// Capability to run an external command to completion.
pub trait ProcessRunner: Send + Sync {
    /// Runs the command and captures its output.
    ///
    /// A non-zero exit code is not an error at this level; callers decide
    /// what a failed command means.
    ///
    /// # Errors
    ///
    /// Returns `CiError::Spawn` if the program cannot be launched.
    fn run(&self, spec: &CommandSpec) -> Result<ExecOutput>;
}

impl<R: ProcessRunner + ?Sized> ProcessRunner for &R {
    fn run(&self, spec: &CommandSpec) -> Result<ExecOutput> {
        (**self).run(spec)
    }
}

impl<R: ProcessRunner + ?Sized> ProcessRunner for std::sync::Arc<R> {
    fn run(&self, spec: &CommandSpec) -> Result<ExecOutput> {
        (**self).run(spec)
    }
}

/// Runs commands as real child processes.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner;

impl ProcessRunner for SystemRunner {
    fn run(&self, spec: &CommandSpec) -> Result<ExecOutput> {
        tracing::debug!(cmd = %spec.command_line(), "running command");

        let mut cmd = Command::new(&spec.program);
        let _ = cmd
            .args(&spec.args)
            .stdin(if spec.stdin.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let mut child = cmd.spawn().map_err(|e| CiError::Spawn {
            program: spec.program.clone(),
            source: e,
        })?;

        // Feed stdin from a separate thread so a chatty child cannot
        // deadlock on a full stdout pipe.
        let writer = match (child.stdin.take(), spec.stdin.clone()) {
            (Some(mut pipe), Some(input)) => Some(std::thread::spawn(move || {
                let _ = pipe.write_all(&input);
            })),
            _ => None,
        };

        let output = child.wait_with_output().map_err(|e| CiError::Spawn {
            program: spec.program.clone(),
            source: e,
        })?;
        if let Some(handle) = writer {
            let _ = handle.join();
        }

        let out = ExecOutput {
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            exit_code: output.status.code().unwrap_or(-1),
        };
        tracing::debug!(cmd = %spec.command_line(), exit_code = out.exit_code, "command finished");
        Ok(out)
    }
}

/// Turns a non-zero exit into `CiError::CommandFailed`.
///
/// # Errors
///
/// Returns `CiError::CommandFailed` when the output carries a non-zero code.
pub fn check_status(spec: &CommandSpec, output: ExecOutput) -> Result<ExecOutput> {
    if output.success() {
        Ok(output)
    } else {
        Err(CiError::CommandFailed {
            program: format!(
                "{} {}",
                spec.program,
                spec.args.first().map_or("", String::as_str)
            )
            .trim_end()
            .to_string(),
            code: output.exit_code,
            stderr: output.stderr.trim().to_string(),
        })
    }
}
