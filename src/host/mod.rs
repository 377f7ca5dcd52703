//! Host capabilities consumed by tool executors
//!
//! Each capability is a trait with one production implementation and at
//! least one in-memory implementation, so executors can be exercised without
//! touching the real clock, environment, disk or process table.

mod clock;
mod credentials;
mod fs;
mod telemetry;

pub use clock::{Clock, FixedClock, SystemClock};
pub use credentials::{CredentialSource, EnvCredentials, StaticCredentials};
pub use fs::{DirEntry, FileMeta, FileSystem, LocalFileSystem};
pub use telemetry::{
    CpuStats, DiskStats, KernelUnits, MemoryStats, ProcessSample, ProcfsTelemetry, StaticTelemetry, SystemSnapshot,
    TelemetryError, TelemetryProvider,
};
