//! Stats Collector
//!
//! Container-aware resource figures. Each section tries cgroup v2, then
//! cgroup v1, then the host's `/proc` view. A section that cannot be read at
//! all carries an `error` string instead of failing the whole report.
//!
//! Every file path is resolved under a configurable root (normally `/`).

use serde::Serialize;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::config::StatsConfig;

/// cgroup v1 reports "no limit" as a value close to `i64::MAX`
const CGROUP_V1_UNLIMITED: u64 = 9_000_000_000_000_000_000;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LoadAverage {
    #[serde(rename = "1m")]
    pub one: f64,
    #[serde(rename = "5m")]
    pub five: f64,
    #[serde(rename = "15m")]
    pub fifteen: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CpuStats {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cores: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub throttled_periods: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub throttled_time_ns: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub load_average: Option<LoadAverage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl CpuStats {
    fn is_empty(&self) -> bool {
        self.cores.is_none()
            && self.throttled_periods.is_none()
            && self.throttled_time_ns.is_none()
            && self.load_average.is_none()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MemoryStats {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub used_bytes: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_bytes: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub available_bytes: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub used_percent: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl MemoryStats {
    fn with_limit(used: u64, total: u64) -> Self {
        Self {
            used_bytes: Some(used),
            total_bytes: Some(total),
            available_bytes: Some(total.saturating_sub(used)),
            used_percent: Some(percent(used, total)),
            error: None,
        }
    }

    fn error(message: &str) -> Self {
        Self {
            error: Some(message.to_string()),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DiskStats {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub used_bytes: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_bytes: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub free_bytes: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub used_percent: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct UptimeStats {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_uptime_seconds: Option<u64>,
    pub process_uptime_seconds: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SystemStats {
    pub cpu: CpuStats,
    pub memory: MemoryStats,
    pub disk: DiskStats,
    pub uptime: UptimeStats,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hostname: Option<String>,
}

#[derive(Debug, Clone)]
pub struct StatsCollector {
    root: PathBuf,
    disk_path: PathBuf,
    started: Instant,
}

impl StatsCollector {
    pub fn new(config: &StatsConfig) -> Self {
        Self {
            root: config.root.clone(),
            disk_path: config.disk_path.clone(),
            started: Instant::now(),
        }
    }

    pub fn collect(&self) -> SystemStats {
        SystemStats {
            cpu: self.cpu_stats(),
            memory: self.memory_stats(),
            disk: self.disk_stats(),
            uptime: self.uptime_stats(),
            hostname: hostname::get()
                .ok()
                .map(|name| name.to_string_lossy().into_owned()),
        }
    }

    pub fn cpu_stats(&self) -> CpuStats {
        self.cgroup_v2_cpu()
            .or_else(|| self.cgroup_v1_cpu())
            .unwrap_or_else(|| self.system_cpu())
    }

    pub fn memory_stats(&self) -> MemoryStats {
        self.cgroup_v2_memory()
            .or_else(|| self.cgroup_v1_memory())
            .unwrap_or_else(|| self.system_memory())
    }

    pub fn disk_stats(&self) -> DiskStats {
        let path = self
            .disk_path
            .canonicalize()
            .unwrap_or_else(|_| self.disk_path.clone());

        let disks = sysinfo::Disks::new_with_refreshed_list();
        let disk = disks
            .list()
            .iter()
            .filter(|disk| path.starts_with(disk.mount_point()))
            .max_by_key(|disk| disk.mount_point().as_os_str().len());

        let Some(disk) = disk else {
            return DiskStats {
                error: Some("Unable to read disk statistics".to_string()),
                ..Default::default()
            };
        };

        let total = disk.total_space();
        let free = disk.available_space();
        let used = total.saturating_sub(free);

        DiskStats {
            used_bytes: Some(used),
            total_bytes: Some(total),
            free_bytes: Some(free),
            used_percent: Some(percent(used, total)),
            path: Some(path.display().to_string()),
            error: None,
        }
    }

    pub fn uptime_stats(&self) -> UptimeStats {
        let system_uptime_seconds = self
            .read("proc/uptime")
            .and_then(|content| {
                content
                    .split_whitespace()
                    .next()
                    .and_then(|secs| secs.parse::<f64>().ok())
            })
            .map(|secs| secs.floor() as u64);

        UptimeStats {
            system_uptime_seconds,
            process_uptime_seconds: self.started.elapsed().as_secs(),
        }
    }

    fn cgroup_v2_cpu(&self) -> Option<CpuStats> {
        let stat = parse_key_values(&self.read("sys/fs/cgroup/cpu.stat")?);
        let mut cpu = CpuStats::default();

        if stat.contains_key("usage_usec") {
            if let Some(max) = self.read("sys/fs/cgroup/cpu.max") {
                let mut parts = max.split_whitespace();
                if let (Some(limit), Some(period)) = (parts.next(), parts.next()) {
                    if let (Ok(limit), Ok(period)) = (limit.parse::<f64>(), period.parse::<f64>()) {
                        if period > 0.0 {
                            cpu.cores = Some(round2(limit / period));
                        }
                    }
                }
            }
        }

        cpu.throttled_periods = stat.get("nr_throttled").copied();
        cpu.throttled_time_ns = stat.get("throttled_usec").map(|usec| usec.saturating_mul(1000));
        cpu.load_average = self.load_average();

        (!cpu.is_empty()).then_some(cpu)
    }

    fn cgroup_v1_cpu(&self) -> Option<CpuStats> {
        let dir = ["sys/fs/cgroup/cpu,cpuacct", "sys/fs/cgroup/cpuacct"]
            .into_iter()
            .find(|dir| self.resolve(dir).join("cpuacct.usage").is_file())?;

        let mut cpu = CpuStats::default();
        let quota = self.read_i64(&format!("{}/cpu.cfs_quota_us", dir));
        let period = self.read_i64(&format!("{}/cpu.cfs_period_us", dir));
        if let (Some(quota), Some(period)) = (quota, period) {
            if quota > 0 && period > 0 {
                cpu.cores = Some(round2(quota as f64 / period as f64));
            }
        }
        cpu.load_average = self.load_average();

        (!cpu.is_empty()).then_some(cpu)
    }

    fn system_cpu(&self) -> CpuStats {
        let mut cpu = CpuStats {
            cores: self.read("proc/cpuinfo").map(|info| {
                info.lines()
                    .filter(|line| line.starts_with("processor"))
                    .count() as f64
            }),
            load_average: self.load_average(),
            ..Default::default()
        };

        if cpu.is_empty() {
            cpu.error = Some("Unable to read CPU statistics".to_string());
        }
        cpu
    }

    fn cgroup_v2_memory(&self) -> Option<MemoryStats> {
        let used = self.read_u64("sys/fs/cgroup/memory.current")?;

        match self.read("sys/fs/cgroup/memory.max").map(|m| m.trim().to_string()) {
            Some(max) if max != "max" => match max.parse::<u64>() {
                Ok(total) => Some(MemoryStats::with_limit(used, total)),
                Err(_) => Some(MemoryStats {
                    used_bytes: Some(used),
                    ..Default::default()
                }),
            },
            _ => Some(MemoryStats {
                used_bytes: Some(used),
                ..Default::default()
            }),
        }
    }

    fn cgroup_v1_memory(&self) -> Option<MemoryStats> {
        let used = self.read_u64("sys/fs/cgroup/memory/memory.usage_in_bytes")?;

        match self.read_u64("sys/fs/cgroup/memory/memory.limit_in_bytes") {
            Some(limit) if limit > 0 && limit < CGROUP_V1_UNLIMITED => {
                Some(MemoryStats::with_limit(used, limit))
            }
            _ => Some(MemoryStats {
                used_bytes: Some(used),
                ..Default::default()
            }),
        }
    }

    fn system_memory(&self) -> MemoryStats {
        let Some(meminfo) = self.read("proc/meminfo") else {
            return MemoryStats::error("Unable to read memory statistics");
        };

        // Values are in kB
        let stats: HashMap<&str, u64> = meminfo
            .lines()
            .filter_map(|line| {
                let (key, rest) = line.split_once(':')?;
                let value = rest.split_whitespace().next()?.parse::<u64>().ok()?;
                Some((key.trim(), value.saturating_mul(1024)))
            })
            .collect();

        let Some(&total) = stats.get("MemTotal") else {
            return MemoryStats::error("Unable to parse memory statistics");
        };
        let available = stats
            .get("MemAvailable")
            .or_else(|| stats.get("MemFree"))
            .copied()
            .unwrap_or(0);

        MemoryStats::with_limit(total.saturating_sub(available), total)
    }

    fn load_average(&self) -> Option<LoadAverage> {
        let content = self.read("proc/loadavg")?;
        let mut values = content
            .split_whitespace()
            .map(|v| v.parse::<f64>().ok());
        Some(LoadAverage {
            one: round2(values.next()??),
            five: round2(values.next()??),
            fifteen: round2(values.next()??),
        })
    }

    fn resolve(&self, relative: &str) -> PathBuf {
        self.root.join(relative)
    }

    fn read(&self, relative: &str) -> Option<String> {
        fs::read_to_string(self.resolve(relative)).ok()
    }

    fn read_u64(&self, relative: &str) -> Option<u64> {
        self.read(relative)?.trim().parse().ok()
    }

    fn read_i64(&self, relative: &str) -> Option<i64> {
        self.read(relative)?.trim().parse().ok()
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

fn parse_key_values(content: &str) -> HashMap<String, u64> {
    content
        .lines()
        .filter_map(|line| {
            let (key, value) = line.split_once(' ')?;
            Some((key.to_string(), value.trim().parse().ok()?))
        })
        .collect()
}

fn percent(part: u64, total: u64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    round2(part as f64 / total as f64 * 100.0)
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
