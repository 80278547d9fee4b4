//! Kick facade
//!
//! Builds every subsystem from a validated [`KickConfig`] and hands them out to
//! the REST surface, the MCP endpoint and the CLI. Collaborators that live
//! outside this crate (queue backend, command registry, log search strategy,
//! health probes) can be swapped in through [`KickBuilder`].

use std::sync::Arc;

use crate::auth::ScopeAuthority;
use crate::commands::{CommandRegistry, CommandRunner, ProcessRegistry};
use crate::config::KickConfig;
use crate::error::KickError;
use crate::health::{HealthCheck, HealthChecker};
use crate::logs::{LineSearcher, LogReader};
use crate::queue::{QueueBackend, QueueInspector, UnavailableQueue};
use crate::scrubber::{PiiScrubber, ScrubberError};
use crate::stats::StatsCollector;

/// Everything a request handler needs, shared read-only across requests
#[derive(Debug, Clone)]
pub struct Kick {
    config: Arc<KickConfig>,
    authority: Arc<ScopeAuthority>,
    scrubber: Arc<PiiScrubber>,
    logs: LogReader,
    commands: CommandRunner,
    queue: QueueInspector,
    health: HealthChecker,
    stats: StatsCollector,
}

impl Kick {
    /// Wire up the default collaborators for `config`
    pub fn from_config(config: KickConfig) -> Result<Self, ScrubberError> {
        Self::builder(config).build()
    }

    pub fn builder(config: KickConfig) -> KickBuilder {
        KickBuilder {
            config,
            queue: None,
            registry: None,
            searcher: None,
            health_checks: None,
        }
    }

    pub fn config(&self) -> &KickConfig {
        &self.config
    }

    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    pub fn authority(&self) -> &ScopeAuthority {
        &self.authority
    }

    pub fn scrubber(&self) -> &Arc<PiiScrubber> {
        &self.scrubber
    }

    pub fn logs(&self) -> &LogReader {
        &self.logs
    }

    pub fn commands(&self) -> &CommandRunner {
        &self.commands
    }

    pub fn queue(&self) -> &QueueInspector {
        &self.queue
    }

    pub fn health(&self) -> &HealthChecker {
        &self.health
    }

    pub fn stats(&self) -> &StatsCollector {
        &self.stats
    }

    /// Check the raw `Authorization` header value against `scope`.
    ///
    /// # Errors
    ///
    /// `Unauthenticated` when the header is missing, is not a bearer token or
    /// names an unknown token; `Forbidden` when the token lacks `scope`.
    pub fn authorize(&self, header: Option<&str>, scope: &str) -> Result<(), KickError> {
        self.authority.authorize(header, scope)?;
        Ok(())
    }
}

/// Builder for [`Kick`] with optional replacement collaborators
#[derive(Debug)]
pub struct KickBuilder {
    config: KickConfig,
    queue: Option<Arc<dyn QueueBackend>>,
    registry: Option<Arc<dyn CommandRegistry>>,
    searcher: Option<Arc<dyn LineSearcher>>,
    health_checks: Option<Vec<Arc<dyn HealthCheck>>>,
}

impl KickBuilder {
    pub fn queue_backend(mut self, backend: Arc<dyn QueueBackend>) -> Self {
        self.queue = Some(backend);
        self
    }

    pub fn command_registry(mut self, registry: Arc<dyn CommandRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    pub fn log_searcher(mut self, searcher: Arc<dyn LineSearcher>) -> Self {
        self.searcher = Some(searcher);
        self
    }

    /// Replace the configured probes entirely
    pub fn health_checks(mut self, checks: Vec<Arc<dyn HealthCheck>>) -> Self {
        self.health_checks = Some(checks);
        self
    }

    /// # Errors
    ///
    /// Fails if a configured scrub pattern does not compile.
    pub fn build(self) -> Result<Kick, ScrubberError> {
        let config = self.config;
        let scrubber = Arc::new(PiiScrubber::new(&config.scrubber)?);

        let authority = Arc::new(ScopeAuthority::new(
            config
                .tokens
                .iter()
                .map(|(token, scopes)| (token.clone(), scopes.clone())),
        ));

        let mut logs = LogReader::new(&config.logs, scrubber.clone());
        if let Some(searcher) = self.searcher {
            logs = logs.with_searcher(searcher);
        }

        let registry = self
            .registry
            .unwrap_or_else(|| Arc::new(ProcessRegistry::new(config.commands.clone())));
        let commands = CommandRunner::new(
            config.allowed_commands.clone(),
            registry,
            scrubber.clone(),
        );

        let queue = QueueInspector::new(
            self.queue.unwrap_or_else(|| Arc::new(UnavailableQueue)),
            scrubber.clone(),
        );

        let health = match self.health_checks {
            Some(checks) => HealthChecker::new(checks, scrubber.clone()),
            None => HealthChecker::from_config(&config.health, scrubber.clone()),
        };

        let stats = StatsCollector::new(&config.stats);

        Ok(Kick {
            config: Arc::new(config),
            authority,
            scrubber,
            logs,
            commands,
            queue,
            health,
            stats,
        })
    }
}
