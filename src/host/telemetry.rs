//! System and process telemetry
//!
//! `ProcfsTelemetry` reads Linux `/proc`; disk figures come from `fs2` so they
//! work on any platform that has a mounted root.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use thiserror::Error;

/// Units `/proc/<pid>/stat` counts in: CPU time in clock ticks, RSS in pages
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KernelUnits {
    pub clock_ticks: f64,
    pub page_size: u64,
}

impl Default for KernelUnits {
    fn default() -> Self {
        Self {
            clock_ticks: 100.0,
            page_size: 4096,
        }
    }
}

impl KernelUnits {
    /// Ask the running kernel, keeping the defaults for anything it won't say
    pub fn detect() -> Self {
        let defaults = Self::default();
        Self {
            clock_ticks: sysconf(SysConf::ClockTicks).map_or(defaults.clock_ticks, |v| v as f64),
            page_size: sysconf(SysConf::PageSize).unwrap_or(defaults.page_size),
        }
    }
}

enum SysConf {
    ClockTicks,
    PageSize,
}

#[cfg(unix)]
fn sysconf(name: SysConf) -> Option<u64> {
    let name = match name {
        SysConf::ClockTicks => libc::_SC_CLK_TCK,
        SysConf::PageSize => libc::_SC_PAGESIZE,
    };
    // SAFETY: sysconf only reads a system constant
    let value = unsafe { libc::sysconf(name) };
    (value > 0).then_some(value as u64)
}

#[cfg(not(unix))]
fn sysconf(_name: SysConf) -> Option<u64> {
    None
}

#[derive(Debug, Error)]
pub enum TelemetryError {
    #[error("Telemetry unavailable: {0}")]
    Unavailable(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Cannot parse {0}")]
    Parse(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct CpuStats {
    pub usage_percent: f64,
    pub cores: usize,
    pub frequency_mhz: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MemoryStats {
    pub total_bytes: u64,
    pub available_bytes: u64,
}

impl MemoryStats {
    pub fn used_bytes(&self) -> u64 {
        self.total_bytes.saturating_sub(self.available_bytes)
    }

    pub fn usage_percent(&self) -> f64 {
        percent(self.used_bytes(), self.total_bytes)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DiskStats {
    pub total_bytes: u64,
    pub free_bytes: u64,
}

impl DiskStats {
    pub fn used_bytes(&self) -> u64 {
        self.total_bytes.saturating_sub(self.free_bytes)
    }

    pub fn usage_percent(&self) -> f64 {
        percent(self.used_bytes(), self.total_bytes)
    }
}

/// Point-in-time view of the host
#[derive(Debug, Clone, PartialEq)]
pub struct SystemSnapshot {
    pub os: String,
    pub os_version: String,
    pub cpu: CpuStats,
    pub memory: MemoryStats,
    pub disk: DiskStats,
    pub boot_time: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProcessSample {
    pub pid: u32,
    pub name: String,
    pub cpu_percent: f64,
    pub memory_percent: f64,
}

#[async_trait]
pub trait TelemetryProvider: Send + Sync {
    async fn system_snapshot(&self) -> Result<SystemSnapshot, TelemetryError>;

    /// Enumerate processes
    ///
    /// The outer error means the process table itself could not be read. An
    /// inner error is one process that vanished or denied access while the
    /// table was being walked; callers skip those.
    async fn processes(&self) -> Result<Vec<Result<ProcessSample, TelemetryError>>, TelemetryError>;
}

/// Reads the Linux proc filesystem
#[derive(Debug, Clone)]
pub struct ProcfsTelemetry {
    proc_root: PathBuf,
    disk_path: PathBuf,
    cpu_sample: Duration,
    units: KernelUnits,
}

impl Default for ProcfsTelemetry {
    fn default() -> Self {
        Self {
            proc_root: PathBuf::from("/proc"),
            disk_path: PathBuf::from("/"),
            cpu_sample: Duration::from_millis(250),
            units: KernelUnits::detect(),
        }
    }
}

impl ProcfsTelemetry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read from another proc mount
    pub fn with_proc_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.proc_root = root.into();
        self
    }

    /// Report disk usage for the filesystem holding `path`
    pub fn with_disk_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.disk_path = path.into();
        self
    }

    pub fn with_cpu_sample(mut self, sample: Duration) -> Self {
        self.cpu_sample = sample;
        self
    }

    /// Override the detected tick rate and page size
    pub fn with_kernel_units(mut self, units: KernelUnits) -> Self {
        self.units = units;
        self
    }

    async fn read(&self, relative: impl AsRef<Path>) -> Result<String, TelemetryError> {
        let path = self.proc_root.join(relative);
        tokio::fs::read_to_string(&path).await.map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => TelemetryError::Unavailable(format!("{} not found", path.display())),
            _ => TelemetryError::Io(e),
        })
    }

    async fn cpu_usage(&self) -> Result<f64, TelemetryError> {
        let first = parse_cpu_times(&self.read("stat").await?)?;
        tokio::time::sleep(self.cpu_sample).await;
        let second = parse_cpu_times(&self.read("stat").await?)?;

        let total = second.total.saturating_sub(first.total);
        let idle = second.idle.saturating_sub(first.idle);
        Ok(percent(total.saturating_sub(idle), total))
    }

    async fn memory(&self) -> Result<MemoryStats, TelemetryError> {
        parse_meminfo(&self.read("meminfo").await?)
    }

    fn disk(&self) -> Result<DiskStats, TelemetryError> {
        Ok(DiskStats {
            total_bytes: fs2::total_space(&self.disk_path)?,
            free_bytes: fs2::free_space(&self.disk_path)?,
        })
    }
}

#[async_trait]
impl TelemetryProvider for ProcfsTelemetry {
    async fn system_snapshot(&self) -> Result<SystemSnapshot, TelemetryError> {
        let usage_percent = self.cpu_usage().await?;
        let cores = std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1);
        let frequency_mhz = match self.read("cpuinfo").await {
            Ok(text) => parse_cpu_mhz(&text),
            Err(_) => None,
        };
        let stat = self.read("stat").await?;
        let os_version = self
            .read("sys/kernel/osrelease")
            .await
            .map(|s| s.trim().to_string())
            .unwrap_or_else(|_| "unknown".to_string());

        Ok(SystemSnapshot {
            os: std::env::consts::OS.to_string(),
            os_version,
            cpu: CpuStats {
                usage_percent,
                cores,
                frequency_mhz,
            },
            memory: self.memory().await?,
            disk: self.disk()?,
            boot_time: parse_boot_time(&stat),
        })
    }

    async fn processes(&self) -> Result<Vec<Result<ProcessSample, TelemetryError>>, TelemetryError> {
        let memory = self.memory().await?;
        let uptime_secs = parse_uptime(&self.read("uptime").await?)?;

        let mut dir = tokio::fs::read_dir(&self.proc_root).await?;
        let mut samples = Vec::new();
        loop {
            let entry = match dir.next_entry().await {
                Ok(Some(entry)) => entry,
                Ok(None) => break,
                Err(e) => {
                    log::debug!("Skipping unreadable {} entry: {}", self.proc_root.display(), e);
                    continue;
                }
            };
            let Some(pid) = entry.file_name().to_str().and_then(|s| s.parse::<u32>().ok()) else {
                continue;
            };
            let sample = match self.read(format!("{}/stat", pid)).await {
                Ok(text) => parse_pid_stat(&text).map(|stat| stat.sample(pid, uptime_secs, memory.total_bytes, &self.units)),
                Err(e) => Err(e),
            };
            samples.push(sample);
        }

        Ok(samples)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct CpuTimes {
    idle: u64,
    total: u64,
}

fn parse_cpu_times(stat: &str) -> Result<CpuTimes, TelemetryError> {
    let line = stat
        .lines()
        .find(|l| l.starts_with("cpu "))
        .ok_or_else(|| TelemetryError::Parse("aggregate cpu line in stat".to_string()))?;
    let values: Vec<u64> = line.split_whitespace().skip(1).filter_map(|v| v.parse().ok()).collect();
    if values.len() < 4 {
        return Err(TelemetryError::Parse("cpu line in stat".to_string()));
    }

    // idle + iowait
    let idle = values[3] + values.get(4).copied().unwrap_or(0);
    Ok(CpuTimes {
        idle,
        total: values.iter().sum(),
    })
}

fn parse_meminfo(text: &str) -> Result<MemoryStats, TelemetryError> {
    let field = |name: &str| {
        text.lines()
            .find_map(|l| l.strip_prefix(name))
            .and_then(|rest| rest.trim_start_matches(':').split_whitespace().next())
            .and_then(|kb| kb.parse::<u64>().ok())
            .map(|kb| kb * 1024)
    };

    let total_bytes = field("MemTotal").ok_or_else(|| TelemetryError::Parse("MemTotal in meminfo".to_string()))?;
    let available_bytes = field("MemAvailable")
        .or_else(|| field("MemFree"))
        .ok_or_else(|| TelemetryError::Parse("MemAvailable in meminfo".to_string()))?;

    Ok(MemoryStats {
        total_bytes,
        available_bytes,
    })
}

fn parse_cpu_mhz(cpuinfo: &str) -> Option<f64> {
    cpuinfo
        .lines()
        .filter(|l| l.starts_with("cpu MHz"))
        .find_map(|l| l.split(':').nth(1))
        .and_then(|v| v.trim().parse().ok())
}

fn parse_boot_time(stat: &str) -> Option<DateTime<Utc>> {
    let secs = stat.lines().find_map(|l| l.strip_prefix("btime "))?.trim().parse().ok()?;
    Utc.timestamp_opt(secs, 0).single()
}

fn parse_uptime(text: &str) -> Result<f64, TelemetryError> {
    text.split_whitespace()
        .next()
        .and_then(|v| v.parse().ok())
        .ok_or_else(|| TelemetryError::Parse("uptime".to_string()))
}

#[derive(Debug, Clone, PartialEq)]
struct PidStat {
    name: String,
    cpu_ticks: u64,
    start_ticks: u64,
    rss_pages: u64,
}

impl PidStat {
    fn sample(&self, pid: u32, uptime_secs: f64, mem_total: u64, units: &KernelUnits) -> ProcessSample {
        let elapsed = uptime_secs - self.start_ticks as f64 / units.clock_ticks;
        let cpu_percent = if elapsed > 0.0 {
            (self.cpu_ticks as f64 / units.clock_ticks) / elapsed * 100.0
        } else {
            0.0
        };

        ProcessSample {
            pid,
            name: self.name.clone(),
            cpu_percent: round2(cpu_percent),
            memory_percent: round2(percent(self.rss_pages.saturating_mul(units.page_size), mem_total)),
        }
    }
}

/// Parse `/proc/<pid>/stat`; the command name may itself contain spaces and parens
fn parse_pid_stat(text: &str) -> Result<PidStat, TelemetryError> {
    let malformed = || TelemetryError::Parse("pid stat".to_string());
    let open = text.find('(').ok_or_else(malformed)?;
    let close = text.rfind(')').ok_or_else(malformed)?;
    if close < open {
        return Err(malformed());
    }

    let name = text[open + 1..close].to_string();
    // Fields after the name, starting at state (field 3 in proc(5))
    let fields: Vec<&str> = text[close + 1..].split_whitespace().collect();
    let num = |idx: usize| fields.get(idx).and_then(|v| v.parse::<u64>().ok()).ok_or_else(malformed);

    Ok(PidStat {
        name,
        cpu_ticks: num(11)? + num(12)?,
        start_ticks: num(19)?,
        rss_pages: num(21)?,
    })
}

fn percent(part: u64, whole: u64) -> f64 {
    if whole == 0 {
        0.0
    } else {
        round2(part as f64 / whole as f64 * 100.0)
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Canned telemetry
#[derive(Debug, Clone, Default)]
pub struct StaticTelemetry {
    snapshot: Option<SystemSnapshot>,
    processes: Vec<ProcessSample>,
    vanished: Vec<u32>,
}

impl StaticTelemetry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_snapshot(mut self, snapshot: SystemSnapshot) -> Self {
        self.snapshot = Some(snapshot);
        self
    }

    pub fn with_process(mut self, pid: u32, name: impl Into<String>, cpu_percent: f64, memory_percent: f64) -> Self {
        self.processes.push(ProcessSample {
            pid,
            name: name.into(),
            cpu_percent,
            memory_percent,
        });
        self
    }

    /// A process that disappears between listing and sampling
    pub fn with_vanished(mut self, pid: u32) -> Self {
        self.vanished.push(pid);
        self
    }
}

#[async_trait]
impl TelemetryProvider for StaticTelemetry {
    async fn system_snapshot(&self) -> Result<SystemSnapshot, TelemetryError> {
        self.snapshot
            .clone()
            .ok_or_else(|| TelemetryError::Unavailable("no snapshot configured".to_string()))
    }

    async fn processes(&self) -> Result<Vec<Result<ProcessSample, TelemetryError>>, TelemetryError> {
        let vanished = self
            .vanished
            .iter()
            .map(|pid| Err(TelemetryError::Unavailable(format!("process {} exited", pid))));
        Ok(self.processes.iter().cloned().map(Ok).chain(vanished).collect())
    }
}
