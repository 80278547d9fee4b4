//! Command Registry
//!
//! The registry knows which commands exist and how to invoke them. The runner
//! only ever reaches it after the whitelist check.
//!
//! [`ProcessRegistry`] backs each configured command with a subprocess:
//! 1. Uses `tokio::process::Command` with discrete arguments, never a shell
//! 2. Enforces a per-command timeout and kills the child on expiry
//! 3. Buffers at most `max_output_size` + 1 bytes per stream; the rest of the
//!    child's output is read and discarded so it never blocks on a full pipe

use async_trait::async_trait;
use serde::Serialize;
use std::collections::BTreeMap;
use std::process::Stdio;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command as TokioCommand;
use tracing::{debug, info, warn};

use super::parser::Parameters;
use super::timeout::ExecutionTimeout;
use crate::config::CommandSpec;

/// Maximum captured output size in bytes (1MB)
pub const MAX_OUTPUT_SIZE: usize = 1024 * 1024;

/// A command known to the registry
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommandInfo {
    pub name: String,
    pub description: String,
}

/// Raw result of an invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    pub exit_code: i32,
    pub output: String,
}

/// Invocation failures
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("Command \"{0}\" is not defined.")]
    UnknownCommand(String),

    #[error("Failed to spawn process for '{command}': {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Command '{command}' timed out after {secs}s")]
    TimedOut { command: String, secs: u64 },

    #[error("Command '{0}' was terminated by a signal")]
    Terminated(String),

    #[error("I/O error while running command: {0}")]
    Io(#[from] std::io::Error),
}

/// Source of runnable commands
#[async_trait]
pub trait CommandRegistry: std::fmt::Debug + Send + Sync {
    /// Every registered command with its description
    fn commands(&self) -> Vec<CommandInfo>;

    /// Invoke `name` with `parameters`
    async fn call(&self, name: &str, parameters: &Parameters)
        -> Result<CommandOutput, RegistryError>;
}

/// Registry of configuration-defined subprocess commands
#[derive(Debug, Clone, Default)]
pub struct ProcessRegistry {
    commands: BTreeMap<String, CommandSpec>,
    max_output_size: usize,
}

impl ProcessRegistry {
    pub fn new(commands: BTreeMap<String, CommandSpec>) -> Self {
        Self {
            commands,
            max_output_size: MAX_OUTPUT_SIZE,
        }
    }

    /// Override the captured output limit
    pub fn with_max_output_size(mut self, size: usize) -> Self {
        self.max_output_size = size;
        self
    }
}

#[async_trait]
impl CommandRegistry for ProcessRegistry {
    fn commands(&self) -> Vec<CommandInfo> {
        self.commands
            .iter()
            .map(|(name, spec)| CommandInfo {
                name: name.clone(),
                description: spec.description.clone(),
            })
            .collect()
    }

    async fn call(
        &self,
        name: &str,
        parameters: &Parameters,
    ) -> Result<CommandOutput, RegistryError> {
        let spec = self
            .commands
            .get(name)
            .ok_or_else(|| RegistryError::UnknownCommand(name.to_string()))?;

        let args = parameters.to_args();
        info!(command = %name, program = %spec.program, extra_args = args.len(), "Executing command");

        let mut process = TokioCommand::new(&spec.program);
        process
            .args(&spec.args)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        if let Some(dir) = &spec.working_dir {
            process.current_dir(dir);
        }

        let mut child = process.spawn().map_err(|source| RegistryError::Spawn {
            command: name.to_string(),
            source,
        })?;

        // One byte past the limit so truncation still sees the overflow
        let limit = self.max_output_size.saturating_add(1);
        let (stdout, stderr) = (child.stdout.take(), child.stderr.take());
        let collect = async {
            tokio::try_join!(
                read_bounded(stdout, limit),
                read_bounded(stderr, limit),
                child.wait(),
            )
        };

        // On expiry the child is dropped on return, which kills it
        let timeout = ExecutionTimeout::from_secs(spec.timeout_secs);
        let (stdout, stderr, status) = match timeout.run(collect).await {
            Ok(result) => result?,
            Err(_) => {
                warn!(command = %name, "Command timed out after {:?}", timeout.duration());
                return Err(RegistryError::TimedOut {
                    command: name.to_string(),
                    secs: spec.timeout_secs,
                });
            }
        };

        let exit_code = status
            .code()
            .ok_or_else(|| RegistryError::Terminated(name.to_string()))?;

        let mut text = String::from_utf8_lossy(&stdout).into_owned();
        let stderr = String::from_utf8_lossy(&stderr);
        if !stderr.trim().is_empty() {
            if !text.is_empty() && !text.ends_with('\n') {
                text.push('\n');
            }
            text.push_str(&stderr);
        }

        debug!(command = %name, exit_code, bytes = text.len(), "Command finished");

        Ok(CommandOutput {
            exit_code,
            output: truncate_string(text, self.max_output_size),
        })
    }
}

/// Keep the first `limit` bytes of `pipe` and drain the rest
async fn read_bounded<R>(pipe: Option<R>, limit: usize) -> std::io::Result<Vec<u8>>
where
    R: AsyncRead + Unpin,
{
    let Some(mut pipe) = pipe else {
        return Ok(Vec::new());
    };

    let mut kept = Vec::new();
    (&mut pipe).take(limit as u64).read_to_end(&mut kept).await?;
    tokio::io::copy(&mut pipe, &mut tokio::io::sink()).await?;
    Ok(kept)
}

/// Truncate a string to a maximum byte length, adding ellipsis if truncated
pub(crate) fn truncate_string(mut s: String, max_len: usize) -> String {
    if s.len() > max_len {
        let mut cut = max_len.saturating_sub(3);
        while !s.is_char_boundary(cut) {
            cut -= 1;
        }
        s.truncate(cut);
        s.push_str("...");
    }
    s
}
