pub const PROGRAM_NAME: &str = "pulso";
pub const PROGRAM_LOG_LEVEL: &str = "PULSO_LOG_LEVEL";

/// Cadence of time-triggered flushes.
pub const DEFAULT_FLUSH_INTERVAL_MS: u64 = 5000;

/// Buffer length that triggers an immediate flush.
pub const DEFAULT_MAX_BATCH_POINTS: usize = 1024;

/// Where the daemon accepts producer connections.
pub const DEFAULT_LISTEN_ADDR: &str = "127.0.0.1:5750";

/// Storage backend address (host:port).
pub const DEFAULT_DB_ADDR: &str = "localhost:8086";

pub const DEFAULT_DB_NAME: &str = "metrics";

pub const DEFAULT_RETENTION_POLICY: &str = "default";
