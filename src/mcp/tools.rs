//! MCP tools
//!
//! Each tool wraps one [`Kick`] operation and answers with a short text summary
//! for the model plus the full data as `structuredContent`. Bad arguments and
//! refused operations come back as tool results with `isError` set.

use serde_json::{json, Map, Value};
use tracing::{debug, error};

use super::protocol::{McpError, Tool, ToolResult};
use crate::app::Kick;
use crate::commands::{CommandError, Parameters};
use crate::error::KickError;
use crate::logs::ReadRequest;
use crate::queue::MAX_FAILED_LIMIT;

const LOG_LEVELS: [&str; 7] = [
    "DEBUG",
    "INFO",
    "WARNING",
    "ERROR",
    "CRITICAL",
    "ALERT",
    "EMERGENCY",
];

const MAX_STRING_ARGUMENT: usize = 255;
const DEFAULT_LOG_LIMIT: i64 = 100;
const MAX_LOG_LIMIT: i64 = 500;
const DEFAULT_FAILED_PREVIEW: i64 = 10;

/// Entries spelled out in a log read summary
const LOG_SUMMARY_ENTRIES: usize = 20;
const LOG_SUMMARY_WIDTH: usize = 200;

/// Every tool this server exposes, in listing order
pub fn definitions() -> Vec<Tool> {
    vec![
        Tool {
            name: "kick_health".to_string(),
            description: "Check application health: storage plus every configured \
                          dependency endpoint. Returns status and latency for each check."
                .to_string(),
            input_schema: no_arguments(),
        },
        Tool {
            name: "kick_stats".to_string(),
            description: "Get system/container statistics including CPU load, memory usage, \
                          disk space, and uptime. Container-aware using cgroups v1/v2 when \
                          available."
                .to_string(),
            input_schema: no_arguments(),
        },
        Tool {
            name: "kick_logs_list".to_string(),
            description: "List available log files with their sizes and last modified \
                          timestamps."
                .to_string(),
            input_schema: no_arguments(),
        },
        Tool {
            name: "kick_logs_read".to_string(),
            description: "Read entries from a log file. Supports filtering by log level \
                          (DEBUG, INFO, WARNING, ERROR, CRITICAL, ALERT, EMERGENCY) and \
                          searching within messages."
                .to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "file": {
                        "type": "string",
                        "description": "The log file name to read (e.g., \"laravel.log\")"
                    },
                    "level": {
                        "type": "string",
                        "enum": LOG_LEVELS,
                        "description": "Filter entries by log level"
                    },
                    "search": {
                        "type": "string",
                        "description": "Search string to filter log messages"
                    },
                    "limit": {
                        "type": "integer",
                        "description": "Maximum number of entries to return (default: 100, max: 500)",
                        "default": DEFAULT_LOG_LIMIT,
                        "minimum": 1,
                        "maximum": MAX_LOG_LIMIT
                    }
                },
                "required": ["file"]
            }),
        },
        Tool {
            name: "kick_queue_status".to_string(),
            description: "Get queue status including job counts per queue, failed job count, \
                          and connection info. Optionally list failed jobs with their details."
                .to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "include_failed": {
                        "type": "boolean",
                        "description": "Include list of failed jobs in the response",
                        "default": false
                    },
                    "failed_limit": {
                        "type": "integer",
                        "description": "Maximum number of failed jobs to include (default: 10, max: 100)",
                        "default": DEFAULT_FAILED_PREVIEW,
                        "minimum": 1,
                        "maximum": MAX_FAILED_LIMIT
                    }
                }
            }),
        },
        Tool {
            name: "kick_queue_retry".to_string(),
            description: "Retry failed queue jobs. Can retry a specific job by ID or all \
                          failed jobs."
                .to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "job_id": {
                        "type": "string",
                        "description": "The UUID of a specific failed job to retry"
                    },
                    "retry_all": {
                        "type": "boolean",
                        "description": "Set to true to retry all failed jobs",
                        "default": false
                    }
                }
            }),
        },
        Tool {
            name: "kick_artisan_list".to_string(),
            description: "List all whitelisted commands that can be executed through Kick. \
                          Only these commands are allowed for security."
                .to_string(),
            input_schema: no_arguments(),
        },
        Tool {
            name: "kick_artisan_run".to_string(),
            description: "Execute a whitelisted command. Use kick_artisan_list to see \
                          available commands."
                .to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "command": {
                        "type": "string",
                        "description": "Command to run, optionally with arguments (e.g. \"migrate:status --pending\")"
                    },
                    "arguments": {
                        "type": "object",
                        "description": "Extra parameters: numeric keys are positional arguments, other keys are options"
                    }
                },
                "required": ["command"]
            }),
        },
    ]
}

/// Run the tool called `name`.
///
/// # Errors
///
/// Only an unknown tool name is a protocol error; everything else is reported
/// inside the [`ToolResult`].
pub async fn call(kick: &Kick, name: &str, arguments: &Value) -> Result<ToolResult, McpError> {
    debug!(tool = %name, "Calling MCP tool");

    let empty = Map::new();
    let args = match arguments {
        Value::Null => &empty,
        Value::Object(map) => map,
        _ => return Ok(ToolResult::error("Tool arguments must be an object.")),
    };

    let result = match name {
        "kick_health" => health(kick).await,
        "kick_stats" => stats(kick).await,
        "kick_logs_list" => logs_list(kick).await,
        "kick_logs_read" => logs_read(kick, args).await,
        "kick_queue_status" => queue_status(kick, args).await,
        "kick_queue_retry" => queue_retry(kick, args).await,
        "kick_artisan_list" => Ok(artisan_list(kick)),
        "kick_artisan_run" => artisan_run(kick, args).await,
        other => return Err(McpError::invalid_params(format!("Unknown tool: {}", other))),
    };

    Ok(result.unwrap_or_else(ToolResult::error))
}

fn no_arguments() -> Value {
    json!({"type": "object", "properties": {}})
}

async fn health(kick: &Kick) -> Result<ToolResult, String> {
    let report = kick.health().check().await;

    let status = if report.is_healthy() { "HEALTHY" } else { "UNHEALTHY" };
    let mut summary = format!("Application is {}.\n\n", status);
    for (name, check) in &report.checks {
        let latency = check
            .latency_ms
            .map(|ms| format!(" ({}ms)", ms))
            .unwrap_or_default();
        let status = if check.is_healthy() { "healthy" } else { "unhealthy" };
        summary.push_str(&format!("- {}: {}{}\n", capitalize(name), status, latency));
    }

    Ok(ToolResult::structured(summary, to_json(&report)?))
}

async fn stats(kick: &Kick) -> Result<ToolResult, String> {
    let collector = kick.stats().clone();
    let stats = tokio::task::spawn_blocking(move || collector.collect())
        .await
        .map_err(|e| internal(format!("stats task failed: {}", e)))?;

    let mut summary = String::from("System Statistics:\n\n");
    if let Some(load) = &stats.cpu.load_average {
        summary.push_str(&format!(
            "CPU Load: {:.2} / {:.2} / {:.2} (1m/5m/15m)\n",
            load.one, load.five, load.fifteen
        ));
    }
    if let Some(cores) = stats.cpu.cores {
        summary.push_str(&format!("CPU Cores: {}\n", cores));
    }
    if let Some(percent) = stats.memory.used_percent {
        summary.push_str(&format!(
            "Memory: {:.1}% used ({} / {})\n",
            percent,
            format_bytes(stats.memory.used_bytes.unwrap_or(0)),
            format_bytes(stats.memory.total_bytes.unwrap_or(0))
        ));
    } else if let Some(err) = &stats.memory.error {
        summary.push_str(&format!("Memory: {}\n", err));
    }
    if let Some(percent) = stats.disk.used_percent {
        summary.push_str(&format!(
            "Disk: {:.1}% used ({} / {})\n",
            percent,
            format_bytes(stats.disk.used_bytes.unwrap_or(0)),
            format_bytes(stats.disk.total_bytes.unwrap_or(0))
        ));
    }
    if let Some(seconds) = stats.uptime.system_uptime_seconds {
        summary.push_str(&format!("System Uptime: {}\n", format_uptime(seconds)));
    }

    Ok(ToolResult::structured(
        summary,
        json!({
            "stats": to_json(&stats)?,
            "timestamp": chrono::Utc::now().to_rfc3339(),
        }),
    ))
}

async fn logs_list(kick: &Kick) -> Result<ToolResult, String> {
    let reader = kick.logs().clone();
    let files = tokio::task::spawn_blocking(move || reader.list_files())
        .await
        .map_err(|e| internal(format!("log listing task failed: {}", e)))?
        .map_err(|e| KickError::from(e).public_message())?;

    if files.is_empty() {
        return Ok(ToolResult::text("No log files found."));
    }

    let mut summary = format!("Found {} log file(s):\n\n", files.len());
    for file in &files {
        let modified = chrono::DateTime::from_timestamp(file.modified, 0)
            .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_else(|| "unknown".to_string());
        summary.push_str(&format!(
            "- {} ({}, modified {})\n",
            file.name,
            format_bytes(file.size),
            modified
        ));
    }

    Ok(ToolResult::structured(summary, json!({ "files": files })))
}

async fn logs_read(kick: &Kick, args: &Map<String, Value>) -> Result<ToolResult, String> {
    let file = string_arg(args, "file")?
        .filter(|f| !f.is_empty())
        .ok_or("You must specify a log file name. Use kick_logs_list to see available files.")?;
    check_length("file", &file)?;

    let level = string_arg(args, "level")?;
    if let Some(level) = &level {
        if !LOG_LEVELS.contains(&level.as_str()) {
            return Err(format!("Level must be one of: {}", LOG_LEVELS.join(", ")));
        }
    }

    let search = string_arg(args, "search")?.filter(|s| !s.is_empty());
    if let Some(search) = &search {
        check_length("search", search)?;
    }

    let limit = integer_arg(args, "limit")?.unwrap_or(DEFAULT_LOG_LIMIT);
    if !(1..=MAX_LOG_LIMIT).contains(&limit) {
        return Err(format!("limit must be between 1 and {}.", MAX_LOG_LIMIT));
    }

    let request = ReadRequest {
        lines: limit as usize,
        offset: 0,
        search: search.clone(),
        level: level.clone(),
    };
    let reader = kick.logs().clone();
    let target = file.clone();
    let result = tokio::task::spawn_blocking(move || reader.read(&target, &request))
        .await
        .map_err(|e| internal(format!("log read task failed: {}", e)))?
        .map_err(|e| KickError::from(e).public_message())?;

    if result.entries.is_empty() {
        let mut filters = String::new();
        if let Some(level) = &level {
            filters.push_str(&format!(" with level {}", level));
        }
        if let Some(search) = &search {
            filters.push_str(&format!(" matching '{}'", search));
        }
        return Ok(ToolResult::text(format!(
            "No log entries found in {}{}.",
            file, filters
        )));
    }

    let mut summary = format!(
        "Found {} entries in {} (showing {}):\n\n",
        result.total_lines,
        file,
        result.entries.len()
    );
    for entry in result.entries.iter().take(LOG_SUMMARY_ENTRIES) {
        let content: String = entry.content.chars().take(LOG_SUMMARY_WIDTH).collect();
        summary.push_str(&format!("Line {}: {}\n", entry.line, content));
    }
    if result.entries.len() > LOG_SUMMARY_ENTRIES {
        summary.push_str(&format!(
            "\n... and {} more entries (use structured content for full data)\n",
            result.entries.len() - LOG_SUMMARY_ENTRIES
        ));
    }

    Ok(ToolResult::structured(
        summary,
        json!({
            "entries": result.entries,
            "total_lines": result.total_lines,
            "has_more": result.has_more,
            "file": file,
        }),
    ))
}

async fn queue_status(kick: &Kick, args: &Map<String, Value>) -> Result<ToolResult, String> {
    let include_failed = bool_arg(args, "include_failed")?.unwrap_or(false);
    let failed_limit = integer_arg(args, "failed_limit")?.unwrap_or(DEFAULT_FAILED_PREVIEW);
    if !(1..=MAX_FAILED_LIMIT as i64).contains(&failed_limit) {
        return Err(format!(
            "failed_limit must be between 1 and {}.",
            MAX_FAILED_LIMIT
        ));
    }

    let overview = kick.queue().overview().await;

    let mut summary = format!("Queue Connection: {}\n\nQueue Sizes:\n", overview.connection);
    for (name, stats) in &overview.queues {
        match stats.size {
            Some(size) => summary.push_str(&format!("- {}: {} jobs\n", name, size)),
            None => summary.push_str(&format!("- {}: unavailable\n", name)),
        }
    }
    match overview.failed_count {
        Some(count) => summary.push_str(&format!("\nFailed Jobs: {}\n", count)),
        None => summary.push_str("\nFailed Jobs: unavailable\n"),
    }

    let mut data = json!({ "overview": to_json(&overview)? });

    if include_failed && overview.failed_count.unwrap_or(0) > 0 {
        match kick.queue().failed_jobs(failed_limit as usize).await {
            Ok(jobs) if !jobs.is_empty() => {
                summary.push_str("\nRecent Failed Jobs:\n");
                for job in jobs.iter().take(5) {
                    let exception: String = job.exception.chars().take(100).collect();
                    summary.push_str(&format!("- [{}] on {}: {}\n", job.id, job.queue, exception));
                }
                data["failed_jobs"] = to_json(&jobs)?;
            }
            Ok(_) => {}
            Err(_) => summary.push_str("\nUnable to retrieve failed jobs list.\n"),
        }
    }

    Ok(ToolResult::structured(summary, data))
}

async fn queue_retry(kick: &Kick, args: &Map<String, Value>) -> Result<ToolResult, String> {
    let job_id = string_arg(args, "job_id")
        .map_err(|_| "Job ID must be a string (UUID).".to_string())?
        .filter(|id| !id.is_empty());
    let retry_all = bool_arg(args, "retry_all")?.unwrap_or(false);

    match (job_id, retry_all) {
        (None, false) => {
            Err("You must specify either a job_id to retry or set retry_all to true.".to_string())
        }
        (Some(_), true) => {
            Err("Cannot specify both job_id and retry_all. Use one or the other.".to_string())
        }
        (None, true) => {
            let result = kick.queue().retry_all().await;
            if !result.success {
                return Err(result.message);
            }
            Ok(ToolResult::structured(
                format!("Retried {} failed job(s).", result.count),
                to_json(&result)?,
            ))
        }
        (Some(id), false) => {
            let result = kick.queue().retry_job(&id).await;
            if !result.success {
                return Err(result.message);
            }
            Ok(ToolResult::structured(
                format!("Successfully queued job {} for retry.", id),
                to_json(&result)?,
            ))
        }
    }
}

fn artisan_list(kick: &Kick) -> ToolResult {
    let commands = kick.commands().list_commands();

    let mut summary = format!("Available Commands ({}):\n\n", commands.len());
    for command in &commands {
        summary.push_str(&format!("- {}\n  {}\n\n", command.name, command.description));
    }

    let count = commands.len();
    ToolResult::structured(summary, json!({ "commands": commands, "count": count }))
}

async fn artisan_run(kick: &Kick, args: &Map<String, Value>) -> Result<ToolResult, String> {
    let input = string_arg(args, "command")?
        .filter(|c| !c.trim().is_empty())
        .ok_or(
            "You must specify a command to run. Use kick_artisan_list to see available commands.",
        )?;
    check_length("command", &input)?;

    let extra = match args.get("arguments") {
        None | Some(Value::Null) => Parameters::default(),
        Some(value @ (Value::Object(_) | Value::Array(_))) => Parameters::from_json(value),
        Some(_) => return Err("arguments must be an object.".to_string()),
    };

    let runner = kick.commands();
    let mut parsed = runner.parse_command(&input);
    parsed.parameters.merge(extra);

    match runner.run(&parsed.command, &parsed.parameters).await {
        Ok(result) => {
            let output = if result.output.is_empty() {
                "(no output)"
            } else {
                result.output.as_str()
            };
            let summary = format!(
                "Command: {}\nExit Code: {}\n\nOutput:\n{}",
                input, result.exit_code, output
            );
            Ok(ToolResult::structured(summary, to_json(&result)?))
        }
        Err(CommandError::NotAllowed(command)) => Err(format!(
            "Command '{}' is not allowed. Available commands: {}",
            command,
            runner.available_command_names().join(", ")
        )),
    }
}

fn string_arg(args: &Map<String, Value>, key: &str) -> Result<Option<String>, String> {
    match args.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(_) => Err(format!("{} must be a string.", key)),
    }
}

fn integer_arg(args: &Map<String, Value>, key: &str) -> Result<Option<i64>, String> {
    match args.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => value
            .as_i64()
            .map(Some)
            .ok_or_else(|| format!("{} must be an integer.", key)),
    }
}

fn bool_arg(args: &Map<String, Value>, key: &str) -> Result<Option<bool>, String> {
    match args.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Bool(b)) => Ok(Some(*b)),
        Some(_) => Err(format!("{} must be a boolean.", key)),
    }
}

fn check_length(key: &str, value: &str) -> Result<(), String> {
    if value.chars().count() > MAX_STRING_ARGUMENT {
        return Err(format!(
            "{} may not be greater than {} characters.",
            key, MAX_STRING_ARGUMENT
        ));
    }
    Ok(())
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<Value, String> {
    serde_json::to_value(value).map_err(|e| internal(format!("serialization failed: {}", e)))
}

/// Log the detail, hand the caller a generic message
fn internal(detail: String) -> String {
    error!("MCP tool failed: {}", detail);
    KickError::Internal(detail).public_message()
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Human-readable size with binary units, two decimals at most
pub(crate) fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];

    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }

    format!("{} {}", (value * 100.0).round() / 100.0, UNITS[unit])
}

fn format_uptime(seconds: u64) -> String {
    let days = seconds / 86_400;
    let hours = (seconds % 86_400) / 3_600;
    let minutes = (seconds % 3_600) / 60;

    if days > 0 {
        format!("{}d {}h {}m", days, hours, minutes)
    } else if hours > 0 {
        format!("{}h {}m", hours, minutes)
    } else {
        format!("{}m", minutes)
    }
}
