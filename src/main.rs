// Kick - Main Entry Point
//
// Serves the REST and MCP endpoints, and gives operators local access to the
// same engines:
// - config validation
// - log listing and reading
// - PII scrubbing of arbitrary text

use std::io::Read;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use kick::config::LoggingConfig;
use kick::logs::ReadRequest;
use kick::{Kick, KickConfig};
use tracing::{info, Level};
use tracing_subscriber::EnvFilter;

/// Kick: secure introspection and control for running applications
#[derive(Parser, Debug)]
#[command(name = "kick")]
#[command(version)]
#[command(about = "Token-scoped health, stats, logs, queue and command access", long_about = None)]
struct Args {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Path to the configuration file (default: ~/.config/kick/config.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Serve the REST and MCP endpoints
    Serve {
        /// Address to bind, overriding the configuration
        #[arg(long)]
        bind: Option<String>,
    },
    /// Validate the configuration and print a summary
    CheckConfig,
    /// List or read log files
    Logs {
        #[command(subcommand)]
        action: LogsCommand,
    },
    /// Scrub PII from text (reads stdin when no text is given)
    Scrub {
        text: Option<String>,
    },
}

#[derive(Subcommand, Debug)]
enum LogsCommand {
    /// List available log files
    List,
    /// Read a page of a log file, most recent first
    Read {
        /// Log file name, e.g. laravel.log
        file: String,

        #[arg(long, default_value_t = 100)]
        lines: usize,

        #[arg(long, default_value_t = 0)]
        offset: usize,

        /// Case-insensitive substring to match
        #[arg(long)]
        search: Option<String>,

        /// Log level to match, e.g. ERROR
        #[arg(long)]
        level: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // The configured subscriber needs the config, so loading logs through a
    // scoped default one
    let bootstrap = tracing_subscriber::fmt()
        .with_env_filter(env_filter(if args.verbose { Level::DEBUG } else { Level::INFO }))
        .with_writer(std::io::stderr)
        .compact()
        .finish();
    let config = tracing::subscriber::with_default(bootstrap, || match &args.config {
        Some(path) => KickConfig::load_from_path(path),
        None => KickConfig::load(),
    })
    .context("Failed to load configuration")?;

    init_tracing(args.verbose, &config.logging)?;

    match args.command {
        Some(Commands::Serve { bind }) => {
            let mut config = config;
            if let Some(bind) = bind {
                config.server.bind = bind;
            }
            serve(config).await?;
        }
        Some(Commands::CheckConfig) => check_config(config)?,
        Some(Commands::Logs { action }) => logs(config, action).await?,
        Some(Commands::Scrub { text }) => scrub(config, text)?,
        None => {
            info!("No command specified. Use \"kick --help\" for usage.");
        }
    }

    Ok(())
}

/// Logs go to stderr so that command output on stdout stays machine-readable
fn init_tracing(verbose: bool, logging: &LoggingConfig) -> Result<()> {
    let level = if verbose {
        Level::DEBUG
    } else {
        logging
            .level
            .to_lowercase()
            .parse::<Level>()
            .map_err(|e| anyhow::anyhow!("Failed to parse log level: {}", e))?
    };

    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter(level))
        .with_writer(std::io::stderr);

    match logging.format.to_lowercase().as_str() {
        "json" => builder.json().init(),
        "pretty" => builder.pretty().init(),
        _ => builder.compact().init(),
    }

    Ok(())
}

fn env_filter(level: Level) -> EnvFilter {
    EnvFilter::builder()
        .with_default_directive(level.into())
        .from_env_lossy()
}

fn build(config: KickConfig) -> Result<Kick> {
    Kick::from_config(config).context("Failed to build Kick from configuration")
}

async fn serve(config: KickConfig) -> Result<()> {
    info!("Kick v{} starting...", env!("CARGO_PKG_VERSION"));
    let kick = Arc::new(build(config)?);
    kick::server::serve(kick).await
}

/// Print a summary of the effective configuration; token values are never shown
fn check_config(config: KickConfig) -> Result<()> {
    let kick = build(config)?;
    let config = kick.config();
    let prefix = config.route_prefix();

    println!("Configuration OK");
    println!("  enabled:          {}", config.enabled);
    println!("  routes:           /{}/...", prefix);
    println!("  bind:             {}", config.server.bind);
    println!("  tokens:           {}", kick.authority().len());
    println!(
        "  commands:         {} allowed, {} available",
        config.allowed_commands.len(),
        kick.commands().list_commands().len()
    );
    println!(
        "  rate limits:      {}/min default, {}/min commands",
        config.rate_limits.default, config.rate_limits.artisan
    );
    println!("  log path:         {}", config.logs.path.display());
    println!(
        "  scrubber:         {} ({} patterns)",
        if kick.scrubber().is_enabled() { "enabled" } else { "disabled" },
        kick.scrubber().pattern_names().len()
    );
    if config.mcp.enabled {
        println!("  mcp:              /mcp/{}", prefix);
    } else {
        println!("  mcp:              disabled");
    }

    Ok(())
}

async fn logs(config: KickConfig, action: LogsCommand) -> Result<()> {
    let kick = build(config)?;
    let reader = kick.logs().clone();

    let output = match action {
        LogsCommand::List => {
            let files = tokio::task::spawn_blocking(move || reader.list_files())
                .await
                .context("Log listing task failed")??;
            serde_json::to_string_pretty(&serde_json::json!({ "files": files }))?
        }
        LogsCommand::Read {
            file,
            lines,
            offset,
            search,
            level,
        } => {
            let request = ReadRequest {
                lines,
                offset,
                search,
                level,
            };
            let result = tokio::task::spawn_blocking(move || reader.read(&file, &request))
                .await
                .context("Log read task failed")??;
            serde_json::to_string_pretty(&result)?
        }
    };

    println!("{}", output);
    Ok(())
}

fn scrub(config: KickConfig, text: Option<String>) -> Result<()> {
    let kick = build(config)?;

    let input = match text {
        Some(text) => text,
        None => {
            let mut buffer = String::new();
            std::io::stdin()
                .read_to_string(&mut buffer)
                .context("Failed to read stdin")?;
            buffer
        }
    };

    for line in input.lines() {
        println!("{}", kick.scrubber().scrub(line));
    }
    Ok(())
}
