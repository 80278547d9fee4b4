//! Command Runner
//!
//! Parses, gates and executes the restricted set of administrative commands.
//!
//! # Architecture
//!
//! - [`parser`]: command-line tokenizing and parameter classification
//! - [`registry`]: the [`CommandRegistry`] seam and its subprocess backend
//! - [`runner`]: whitelist enforcement and result shaping
//! - [`timeout`]: execution deadline for every registered command

pub mod parser;
pub mod registry;
pub mod runner;
pub mod timeout;

pub use parser::{parse_command, ParamValue, Parameters, ParsedCommand};
pub use registry::{CommandInfo, CommandOutput, CommandRegistry, ProcessRegistry, RegistryError};
pub use runner::{CommandError, CommandRunner, RunResult};
pub use timeout::{ExecutionTimeout, TimedOut};
