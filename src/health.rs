//! Health Checker
//!
//! Runs a set of named probes and folds them into one report. A probe never
//! fails the request: problems are reported as an `unhealthy` entry with a
//! scrubbed message. The overall status is unhealthy if any probe is.

use async_trait::async_trait;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::TcpStream;
use tracing::warn;

use crate::config::HealthConfig;
use crate::scrubber::PiiScrubber;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Unhealthy,
}

/// Outcome of a single probe
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CheckResult {
    pub status: HealthStatus,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<f64>,
}

impl CheckResult {
    pub fn healthy(message: impl Into<String>, started: Instant) -> Self {
        let latency = started.elapsed().as_secs_f64() * 1000.0;
        Self {
            status: HealthStatus::Healthy,
            message: message.into(),
            latency_ms: Some((latency * 100.0).round() / 100.0),
        }
    }

    pub fn unhealthy(message: impl Into<String>) -> Self {
        Self {
            status: HealthStatus::Unhealthy,
            message: message.into(),
            latency_ms: None,
        }
    }

    pub fn is_healthy(&self) -> bool {
        self.status == HealthStatus::Healthy
    }
}

/// Aggregated health report
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HealthReport {
    pub status: HealthStatus,
    pub checks: BTreeMap<String, CheckResult>,
    /// RFC 3339 time the report was produced
    pub timestamp: String,
}

impl HealthReport {
    pub fn is_healthy(&self) -> bool {
        self.status == HealthStatus::Healthy
    }
}

/// A named probe
#[async_trait]
pub trait HealthCheck: std::fmt::Debug + Send + Sync {
    fn name(&self) -> &str;

    async fn check(&self) -> CheckResult;
}

/// Writes, reads back and deletes a uniquely-named file
#[derive(Debug, Clone)]
pub struct StorageCheck {
    dir: PathBuf,
}

impl StorageCheck {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

#[async_trait]
impl HealthCheck for StorageCheck {
    fn name(&self) -> &str {
        "storage"
    }

    async fn check(&self) -> CheckResult {
        let started = Instant::now();
        let path = self
            .dir
            .join(format!("kick_health_check_{}.txt", uuid::Uuid::new_v4()));
        let content = format!("health_check_{}", chrono::Utc::now().timestamp());

        let outcome = async {
            tokio::fs::write(&path, &content).await?;
            let read_back = tokio::fs::read_to_string(&path).await;
            tokio::fs::remove_file(&path).await?;
            read_back
        }
        .await;

        match outcome {
            Ok(read_back) if read_back == content => {
                CheckResult::healthy("Storage read/write successful", started)
            }
            Ok(_) => CheckResult::unhealthy("Storage read/write verification failed"),
            Err(e) => CheckResult::unhealthy(format!("Storage operation failed: {}", e)),
        }
    }
}

/// Opens a TCP connection to a dependency (database, cache, redis, ...)
#[derive(Debug, Clone)]
pub struct TcpCheck {
    name: String,
    address: String,
    timeout: Duration,
}

impl TcpCheck {
    pub fn new(name: impl Into<String>, address: impl Into<String>, timeout: Duration) -> Self {
        Self {
            name: name.into(),
            address: address.into(),
            timeout,
        }
    }
}

#[async_trait]
impl HealthCheck for TcpCheck {
    fn name(&self) -> &str {
        &self.name
    }

    async fn check(&self) -> CheckResult {
        let started = Instant::now();
        match tokio::time::timeout(self.timeout, TcpStream::connect(&self.address)).await {
            Ok(Ok(_stream)) => CheckResult::healthy(
                format!("Connection to {} successful", self.name),
                started,
            ),
            Ok(Err(e)) => CheckResult::unhealthy(format!(
                "Connection to {} failed: {}",
                self.name, e
            )),
            Err(_) => CheckResult::unhealthy(format!(
                "Connection to {} timed out after {}ms",
                self.name,
                self.timeout.as_millis()
            )),
        }
    }
}

#[derive(Debug, Clone)]
pub struct HealthChecker {
    checks: Vec<Arc<dyn HealthCheck>>,
    scrubber: Arc<PiiScrubber>,
}

impl HealthChecker {
    pub fn new(checks: Vec<Arc<dyn HealthCheck>>, scrubber: Arc<PiiScrubber>) -> Self {
        Self { checks, scrubber }
    }

    /// Storage probe plus one TCP probe per configured endpoint
    pub fn from_config(config: &HealthConfig, scrubber: Arc<PiiScrubber>) -> Self {
        let timeout = Duration::from_millis(config.timeout_ms);
        let storage_dir = config
            .storage_path
            .clone()
            .unwrap_or_else(std::env::temp_dir);

        let mut checks: Vec<Arc<dyn HealthCheck>> = vec![Arc::new(StorageCheck::new(storage_dir))];
        for endpoint in &config.endpoints {
            checks.push(Arc::new(TcpCheck::new(
                endpoint.name.clone(),
                endpoint.address.clone(),
                timeout,
            )));
        }

        Self::new(checks, scrubber)
    }

    pub async fn check(&self) -> HealthReport {
        let mut checks = BTreeMap::new();
        for probe in &self.checks {
            let mut result = probe.check().await;
            if !result.is_healthy() {
                warn!(check = probe.name(), "Health check failed: {}", result.message);
                result.message = self.scrubber.scrub(&result.message);
            }
            checks.insert(probe.name().to_string(), result);
        }

        let status = if checks.values().all(CheckResult::is_healthy) {
            HealthStatus::Healthy
        } else {
            HealthStatus::Unhealthy
        };

        HealthReport {
            status,
            checks,
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}
