//! Whitelisted command runner
//!
//! Gatekeeper in front of a [`CommandRegistry`]. A command runs only if its
//! base name (text before the first space) is on the configured whitelist,
//! and that check happens inside [`CommandRunner::run`] itself.
//!
//! Execution-time failures never escape as errors: they come back as a
//! [`RunResult`] with `success: false` and exit code 1.

use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};

use super::parser::{self, Parameters, ParsedCommand};
use super::registry::{CommandInfo, CommandRegistry};
use crate::scrubber::PiiScrubber;

/// Errors that prevent a command from being attempted at all
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CommandError {
    #[error("Command not allowed: {0}")]
    NotAllowed(String),
}

/// Outcome of an attempted command
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunResult {
    pub success: bool,
    pub output: String,
    pub exit_code: i32,
}

#[derive(Debug, Clone)]
pub struct CommandRunner {
    allowed: Vec<String>,
    registry: Arc<dyn CommandRegistry>,
    scrubber: Arc<PiiScrubber>,
}

impl CommandRunner {
    pub fn new(
        allowed: Vec<String>,
        registry: Arc<dyn CommandRegistry>,
        scrubber: Arc<PiiScrubber>,
    ) -> Self {
        Self {
            allowed,
            registry,
            scrubber,
        }
    }

    /// The configured whitelist, in configuration order
    pub fn allowed_commands(&self) -> &[String] {
        &self.allowed
    }

    /// Whether the base name of `command` is whitelisted (exact match)
    pub fn is_allowed(&self, command: &str) -> bool {
        let base = parser::base_command(command);
        self.allowed.iter().any(|allowed| allowed == base)
    }

    pub fn parse_command(&self, input: &str) -> ParsedCommand {
        parser::parse_command(input)
    }

    /// Whitelisted commands the registry actually provides, in whitelist order
    pub fn list_commands(&self) -> Vec<CommandInfo> {
        let registered = self.registry.commands();
        self.allowed
            .iter()
            .filter_map(|name| registered.iter().find(|info| info.name == *name).cloned())
            .collect()
    }

    /// Names from [`list_commands`](Self::list_commands)
    pub fn available_command_names(&self) -> Vec<String> {
        self.list_commands().into_iter().map(|c| c.name).collect()
    }

    /// Run a whitelisted command.
    ///
    /// # Errors
    ///
    /// [`CommandError::NotAllowed`] if the base command is not whitelisted; the
    /// registry is not consulted in that case.
    pub async fn run(
        &self,
        command: &str,
        parameters: &Parameters,
    ) -> Result<RunResult, CommandError> {
        let base = parser::base_command(command);

        if !self.is_allowed(base) {
            warn!(command = %base, "Rejected command not on whitelist");
            return Err(CommandError::NotAllowed(base.to_string()));
        }

        match self.registry.call(base, parameters).await {
            Ok(output) => {
                info!(command = %base, exit_code = output.exit_code, "Command completed");
                Ok(RunResult {
                    success: output.exit_code == 0,
                    output: self.scrubber.scrub(output.output.trim()),
                    exit_code: output.exit_code,
                })
            }
            Err(e) => {
                warn!(command = %base, "Command execution failed: {}", e);
                Ok(RunResult {
                    success: false,
                    output: format!("execution failed: {}", self.scrubber.scrub(&e.to_string())),
                    exit_code: 1,
                })
            }
        }
    }
}
