// Configuration File Support
//
// This module provides configuration file parsing for kick.
// Supports TOML format with environment variable overrides.
// Configuration files are loaded from the XDG config directory: ~/.config/kick/config.toml
//
// The loaded value is immutable for the lifetime of the process and is handed
// to each subsystem constructor by reference.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};

use crate::scrubber::PiiScrubber;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct KickConfig {
    /// Master switch; when false no routes are served
    pub enabled: bool,

    /// URI prefix for REST routes; also names the MCP endpoint (`/mcp/{prefix}`)
    pub prefix: String,

    /// Whitelist of commands that may be executed, in display order
    pub allowed_commands: Vec<String>,

    /// Token -> scopes table
    pub tokens: HashMap<String, Vec<String>>,

    /// HTTP listener configuration
    pub server: ServerConfig,

    /// Requests per minute per endpoint class
    pub rate_limits: RateLimitsConfig,

    /// Log reader configuration
    pub logs: LogsConfig,

    /// PII scrubber configuration
    pub scrubber: ScrubberConfig,

    /// Command registry: command name -> how to run it
    pub commands: BTreeMap<String, CommandSpec>,

    /// MCP endpoint configuration
    pub mcp: McpConfig,

    /// Logging configuration
    pub logging: LoggingConfig,

    /// Health probe configuration
    pub health: HealthConfig,

    /// Stats collector configuration
    pub stats: StatsConfig,
}

/// HTTP listener configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    /// Socket address to bind (e.g. "127.0.0.1:8780")
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:8780".to_string(),
        }
    }
}

/// Rate limits in requests per minute.
///
/// These are reported, not enforced: enforcement needs cross-request state and
/// is left to the proxy in front of kick.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RateLimitsConfig {
    /// Limit for read endpoints
    pub default: u32,

    /// Limit for command endpoints
    pub artisan: u32,
}

impl Default for RateLimitsConfig {
    fn default() -> Self {
        Self {
            default: 60,
            artisan: 10,
        }
    }
}

/// Log reader configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LogsConfig {
    /// Directory holding the log files
    pub path: PathBuf,

    /// File extensions that may be listed and read (compared case-insensitively)
    pub allowed_extensions: Vec<String>,

    /// Upper bound on lines returned by a single read
    pub max_lines: usize,
}

impl Default for LogsConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("storage/logs"),
            allowed_extensions: vec!["log".to_string()],
            max_lines: 500,
        }
    }
}

/// PII scrubber configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ScrubberConfig {
    /// Whether scrubbing is applied at all
    pub enabled: bool,

    /// Replacement for patterns without a dedicated placeholder
    pub replacement: String,

    /// Custom patterns, merged by name over the built-in set
    pub patterns: Vec<ScrubPatternConfig>,
}

impl Default for ScrubberConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            replacement: "[REDACTED]".to_string(),
            patterns: Vec::new(),
        }
    }
}

/// A named custom scrub pattern
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScrubPatternConfig {
    /// Pattern name; sharing a built-in name replaces that pattern
    pub name: String,

    /// Regular expression, bare or in `/.../flags` form
    pub regex: String,
}

/// How a registered command is executed
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CommandSpec {
    /// Human description shown when listing commands
    pub description: String,

    /// Program to spawn (never run through a shell)
    pub program: String,

    /// Fixed leading arguments
    pub args: Vec<String>,

    /// Execution timeout in seconds
    pub timeout_secs: u64,

    /// Working directory for the process
    pub working_dir: Option<PathBuf>,
}

impl Default for CommandSpec {
    fn default() -> Self {
        Self {
            description: String::new(),
            program: String::new(),
            args: Vec::new(),
            timeout_secs: 60,
            working_dir: None,
        }
    }
}

/// MCP endpoint configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct McpConfig {
    /// Whether the MCP endpoint is mounted
    pub enabled: bool,
}

impl Default for McpConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Log format (json, pretty, compact)
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "compact".to_string(),
        }
    }
}

/// Health probe configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct HealthConfig {
    /// Directory used by the storage write/read probe (system temp dir when unset)
    pub storage_path: Option<PathBuf>,

    /// TCP endpoints probed by connecting (database, cache, redis, ...)
    pub endpoints: Vec<HealthEndpoint>,

    /// Per-probe timeout in milliseconds
    pub timeout_ms: u64,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            storage_path: None,
            endpoints: Vec::new(),
            timeout_ms: 2000,
        }
    }
}

/// A named TCP endpoint probed by the health checker
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HealthEndpoint {
    pub name: String,
    pub address: String,
}

/// Stats collector configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StatsConfig {
    /// Root under which /proc and /sys/fs/cgroup are resolved
    pub root: PathBuf,

    /// Path whose filesystem is reported in disk stats
    pub disk_path: PathBuf,
}

impl Default for StatsConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("/"),
            disk_path: PathBuf::from("."),
        }
    }
}

fn default_allowed_commands() -> Vec<String> {
    [
        "about",
        "route:list",
        "migrate:status",
        "queue:monitor",
        "schedule:list",
        "cache:clear",
        "config:cache",
        "config:clear",
        "route:cache",
        "route:clear",
        "view:cache",
        "view:clear",
        "queue:retry",
        "queue:restart",
        "horizon:status",
        "horizon:pause",
        "horizon:continue",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

impl Default for KickConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            prefix: "kick".to_string(),
            allowed_commands: default_allowed_commands(),
            tokens: HashMap::new(),
            server: ServerConfig::default(),
            rate_limits: RateLimitsConfig::default(),
            logs: LogsConfig::default(),
            scrubber: ScrubberConfig::default(),
            commands: BTreeMap::new(),
            mcp: McpConfig::default(),
            logging: LoggingConfig::default(),
            health: HealthConfig::default(),
            stats: StatsConfig::default(),
        }
    }
}

impl KickConfig {
    /// Load configuration from the default XDG config directory
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be parsed or is invalid.
    /// If the config file does not exist, returns default configuration.
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path();
        Self::load_from_path(&config_path)
    }

    /// Load configuration from a specific path
    ///
    /// Environment overrides are applied after parsing, then the result is validated.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be parsed or is invalid.
    /// If the config file does not exist, returns default configuration.
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        let config = if path.exists() {
            let content = fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file from {:?}", path))?;

            let config: KickConfig = toml::from_str(&content)
                .with_context(|| format!("Failed to parse config file from {:?}", path))?;

            tracing::info!("Loaded configuration from {:?}", path);
            config
        } else {
            tracing::debug!("Config file not found at {:?}, using defaults", path);
            Self::default()
        };

        let config = config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    /// Get the default configuration file path
    ///
    /// Returns `~/.config/kick/config.toml` on Linux
    pub fn config_path() -> PathBuf {
        if let Some(proj_dirs) = directories::ProjectDirs::from("dev", "kick", "kick") {
            proj_dirs.config_dir().join("config.toml")
        } else {
            let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
            PathBuf::from(home).join(".config").join("kick").join("config.toml")
        }
    }

    /// Apply environment variable overrides to the configuration
    ///
    /// Environment variables take precedence over config file values:
    /// - KICK_ENABLED
    /// - KICK_PREFIX
    /// - KICK_TOKEN (registered with the `*` scope)
    /// - KICK_BIND
    /// - KICK_LOG_PATH
    /// - KICK_SCRUBBER_ENABLED
    /// - KICK_MCP_ENABLED
    /// - KICK_LOG_LEVEL
    /// - KICK_LOG_FORMAT
    pub fn apply_env_overrides(self) -> Self {
        self.apply_overrides_from(|key| std::env::var(key).ok())
    }

    /// Apply overrides read through `lookup` instead of the process environment
    pub fn apply_overrides_from<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(enabled) = lookup("KICK_ENABLED") {
            self.enabled = parse_bool(&enabled).unwrap_or(self.enabled);
        }
        if let Some(prefix) = lookup("KICK_PREFIX") {
            if !prefix.trim().is_empty() {
                self.prefix = prefix;
            }
        }
        if let Some(token) = lookup("KICK_TOKEN") {
            if !token.trim().is_empty() {
                self.tokens.insert(token, vec!["*".to_string()]);
            }
        }
        if let Some(bind) = lookup("KICK_BIND") {
            self.server.bind = bind;
        }
        if let Some(path) = lookup("KICK_LOG_PATH") {
            self.logs.path = PathBuf::from(path);
        }
        if let Some(enabled) = lookup("KICK_SCRUBBER_ENABLED") {
            self.scrubber.enabled = parse_bool(&enabled).unwrap_or(self.scrubber.enabled);
        }
        if let Some(enabled) = lookup("KICK_MCP_ENABLED") {
            self.mcp.enabled = parse_bool(&enabled).unwrap_or(self.mcp.enabled);
        }
        if let Some(level) = lookup("KICK_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Some(format) = lookup("KICK_LOG_FORMAT") {
            self.logging.format = format;
        }

        self
    }

    /// Validate the configuration
    ///
    /// Custom scrub patterns are compiled here so that a bad regex fails at
    /// startup rather than in the middle of a request.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn validate(&self) -> Result<()> {
        match self.logging.level.to_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => anyhow::bail!(
                "Invalid log level: {}. Must be one of: trace, debug, info, warn, error",
                self.logging.level
            ),
        }

        match self.logging.format.to_lowercase().as_str() {
            "json" | "pretty" | "compact" => {}
            _ => anyhow::bail!(
                "Invalid log format: {}. Must be one of: json, pretty, compact",
                self.logging.format
            ),
        }

        if self.prefix.trim_matches('/').is_empty() {
            anyhow::bail!("Route prefix must not be empty");
        }
        if self.prefix.contains(['{', '}']) {
            anyhow::bail!("Route prefix must not contain braces: {}", self.prefix);
        }

        if self.logs.max_lines == 0 {
            anyhow::bail!("logs.max_lines must be > 0");
        }
        if self.logs.allowed_extensions.is_empty() {
            anyhow::bail!("logs.allowed_extensions must list at least one extension");
        }

        if self.rate_limits.default == 0 || self.rate_limits.artisan == 0 {
            anyhow::bail!("Rate limits must be > 0");
        }

        for (name, spec) in &self.commands {
            if name.trim().is_empty() || name.contains(' ') {
                anyhow::bail!("Command name '{}' must be non-empty and contain no spaces", name);
            }
            if spec.program.trim().is_empty() {
                anyhow::bail!("Command '{}' has empty program", name);
            }
            if spec.timeout_secs == 0 {
                anyhow::bail!("Command '{}' must have a timeout > 0", name);
            }
        }

        for endpoint in &self.health.endpoints {
            if endpoint.name.trim().is_empty() || endpoint.address.trim().is_empty() {
                anyhow::bail!("Health endpoints need both a name and an address");
            }
        }

        PiiScrubber::new(&self.scrubber).context("Invalid scrubber configuration")?;

        Ok(())
    }

    /// Convert log level string to tracing::Level
    pub fn log_level(&self) -> Result<tracing::Level> {
        self.logging
            .level
            .to_lowercase()
            .parse()
            .map_err(|e| anyhow::anyhow!("Failed to parse log level: {}", e))
    }

    /// Prefix without surrounding slashes
    pub fn route_prefix(&self) -> &str {
        self.prefix.trim_matches('/')
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" | "" => Some(false),
        _ => None,
    }
}
