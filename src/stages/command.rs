//! External tool invocation.
//!
//! Separation, denoising and (by default) transcription and synthesis run as separate
//! processes: fixed inputs on the command line, fixed output locations, success
//! signalled by the exit code. The `CommandExecutor` trait lets adapters be tested
//! without the tools installed.

use crate::error::{RedubError, Result};
use std::process::Command;
use std::sync::{Arc, Mutex};
use tracing::debug;

/// Trait for executing system commands.
///
/// Object-safe and `Send + Sync` so adapters can hold any executor.
pub trait CommandExecutor: Send + Sync {
    /// Run `program` with `args` to completion and return its stdout.
    ///
    /// A missing program is `ToolNotFound`; a non-zero exit is `ToolFailed`.
    fn execute(&self, program: &str, args: &[String]) -> Result<String>;
}

impl<T: CommandExecutor + ?Sized> CommandExecutor for Arc<T> {
    fn execute(&self, program: &str, args: &[String]) -> Result<String> {
        (**self).execute(program, args)
    }
}

/// Production executor using `std::process::Command`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemCommandExecutor;

impl SystemCommandExecutor {
    pub fn new() -> Self {
        Self
    }
}

/// Lines of stderr kept in error messages.
const STDERR_TAIL_LINES: usize = 20;

impl CommandExecutor for SystemCommandExecutor {
    fn execute(&self, program: &str, args: &[String]) -> Result<String> {
        debug!("Running {} {}", program, args.join(" "));
        let output = Command::new(program).args(args).output().map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                RedubError::ToolNotFound {
                    tool: program.to_string(),
                }
            } else {
                RedubError::ToolFailed {
                    tool: program.to_string(),
                    code: "spawn error".to_string(),
                    stderr: e.to_string(),
                }
            }
        })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(RedubError::ToolFailed {
                tool: program.to_string(),
                code: output.status.to_string(),
                stderr: tail(&stderr, STDERR_TAIL_LINES),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }
}

fn tail(text: &str, lines: usize) -> String {
    let all: Vec<&str> = text.trim().lines().collect();
    all[all.len().saturating_sub(lines)..].join("\n")
}

/// A program plus an argument list containing `{name}` placeholders.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandTemplate {
    program: String,
    args: Vec<String>,
}

impl CommandTemplate {
    pub fn new(program: impl Into<String>, args: &[&str]) -> Self {
        Self {
            program: program.into(),
            args: args.iter().map(|a| a.to_string()).collect(),
        }
    }

    /// Build from an argv-style list (`["demucs", "-o", "{out_dir}", ...]`).
    pub fn from_argv(argv: &[String]) -> Result<Self> {
        let (program, args) = argv.split_first().ok_or_else(|| RedubError::ConfigInvalidValue {
            key: "command".to_string(),
            message: "command must name a program".to_string(),
        })?;
        if program.trim().is_empty() {
            return Err(RedubError::ConfigInvalidValue {
                key: "command".to_string(),
                message: "program name is empty".to_string(),
            });
        }
        Ok(Self {
            program: program.clone(),
            args: args.to_vec(),
        })
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }

    /// Program followed by the unrendered arguments.
    pub fn to_argv(&self) -> Vec<String> {
        std::iter::once(self.program.clone())
            .chain(self.args.iter().cloned())
            .collect()
    }

    /// Substitute every `{name}` in the arguments in a single pass, so substituted
    /// values are never expanded again. Unknown placeholders stay as they are.
    pub fn render(&self, vars: &[(&str, &str)]) -> Vec<String> {
        self.args.iter().map(|arg| substitute(arg, vars)).collect()
    }

    /// Render and run through `executor`, returning stdout.
    pub fn run<E: CommandExecutor + ?Sized>(&self, executor: &E, vars: &[(&str, &str)]) -> Result<String> {
        executor.execute(&self.program, &self.render(vars))
    }
}

fn substitute(arg: &str, vars: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(arg.len());
    let mut rest = arg;
    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let value = after.find('}').and_then(|close| {
            let name = &after[..close];
            vars.iter()
                .find(|(key, _)| *key == name)
                .map(|(_, value)| (*value, close))
        });
        match value {
            Some((value, close)) => {
                out.push_str(value);
                rest = &after[close + 1..];
            }
            None => {
                out.push('{');
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}

/// Executor that records invocations and runs a callback instead of a process.
///
/// The callback receives the rendered arguments, so tests can create the files a
/// real tool would leave behind.
pub struct MockCommandExecutor {
    calls: Mutex<Vec<(String, Vec<String>)>>,
    #[allow(clippy::type_complexity)]
    handler: Box<dyn Fn(&str, &[String]) -> Result<String> + Send + Sync>,
}

impl MockCommandExecutor {
    /// Executor whose every call succeeds with empty output.
    pub fn new() -> Self {
        Self::with_handler(|_, _| Ok(String::new()))
    }

    pub fn with_handler<F>(handler: F) -> Self
    where
        F: Fn(&str, &[String]) -> Result<String> + Send + Sync + 'static,
    {
        Self {
            calls: Mutex::new(Vec::new()),
            handler: Box::new(handler),
        }
    }

    /// Recorded `(program, args)` pairs, in call order.
    pub fn calls(&self) -> Vec<(String, Vec<String>)> {
        match self.calls.lock() {
            Ok(calls) => calls.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl Default for MockCommandExecutor {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for MockCommandExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockCommandExecutor")
            .field("calls", &self.calls())
            .finish_non_exhaustive()
    }
}

impl CommandExecutor for MockCommandExecutor {
    fn execute(&self, program: &str, args: &[String]) -> Result<String> {
        match self.calls.lock() {
            Ok(mut calls) => calls.push((program.to_string(), args.to_vec())),
            Err(poisoned) => poisoned
                .into_inner()
                .push((program.to_string(), args.to_vec())),
        }
        (self.handler)(program, args)
    }
}
