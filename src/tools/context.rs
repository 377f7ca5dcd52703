//! Tool execution context - host capabilities and limits shared by all executors

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::host::{
    Clock, CredentialSource, EnvCredentials, FileSystem, LocalFileSystem, ProcfsTelemetry, SystemClock,
    TelemetryProvider,
};

/// Fixed bounds applied by the executors
#[derive(Debug, Clone, PartialEq)]
pub struct ToolLimits {
    /// Files larger than this are refused before reading
    pub max_read_bytes: u64,
    pub default_read_lines: usize,
    pub command_timeout: Duration,
    /// Upper bound on a caller-supplied command timeout
    pub max_command_timeout: Duration,
    pub process_limit: usize,
    pub weather_url: String,
    /// Name of the credential holding the weather API key
    pub weather_api_key: String,
    pub weather_timeout: Duration,
}

impl Default for ToolLimits {
    fn default() -> Self {
        Self {
            max_read_bytes: 1024 * 1024,
            default_read_lines: 100,
            command_timeout: Duration::from_secs(10),
            max_command_timeout: Duration::from_secs(60),
            process_limit: 20,
            weather_url: "https://api.openweathermap.org/data/2.5/weather".to_string(),
            weather_api_key: "WEATHER_API_KEY".to_string(),
            weather_timeout: Duration::from_secs(10),
        }
    }
}

/// Everything an executor may touch
///
/// Cloning is cheap; the capabilities are shared and read-only.
#[derive(Clone)]
pub struct ToolContext {
    pub clock: Arc<dyn Clock>,
    pub credentials: Arc<dyn CredentialSource>,
    pub fs: Arc<dyn FileSystem>,
    pub telemetry: Arc<dyn TelemetryProvider>,
    /// Relative tool paths and spawned commands resolve here
    pub working_dir: PathBuf,
    pub limits: ToolLimits,
}

impl ToolContext {
    /// Production context rooted at `working_dir`
    pub fn new(working_dir: impl Into<PathBuf>) -> Self {
        Self {
            clock: Arc::new(SystemClock),
            credentials: Arc::new(EnvCredentials),
            fs: Arc::new(LocalFileSystem),
            telemetry: Arc::new(ProcfsTelemetry::new()),
            working_dir: working_dir.into(),
            limits: ToolLimits::default(),
        }
    }

    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    pub fn with_credentials(mut self, credentials: impl CredentialSource + 'static) -> Self {
        self.credentials = Arc::new(credentials);
        self
    }

    pub fn with_fs(mut self, fs: Arc<dyn FileSystem>) -> Self {
        self.fs = fs;
        self
    }

    pub fn with_telemetry(mut self, telemetry: impl TelemetryProvider + 'static) -> Self {
        self.telemetry = Arc::new(telemetry);
        self
    }

    pub fn with_limits(mut self, limits: ToolLimits) -> Self {
        self.limits = limits;
        self
    }
}

impl fmt::Debug for ToolContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ToolContext")
            .field("working_dir", &self.working_dir)
            .field("limits", &self.limits)
            .finish_non_exhaustive()
    }
}
