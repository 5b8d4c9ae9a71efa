use std::time::Duration;

use anyhow::{Result, ensure};
use clap::Parser;
use pulso_runtime::{
    DEFAULT_DB_ADDR, DEFAULT_DB_NAME, DEFAULT_FLUSH_INTERVAL_MS, DEFAULT_LISTEN_ADDR,
    DEFAULT_MAX_BATCH_POINTS, DEFAULT_RETENTION_POLICY,
};

#[derive(Debug, Clone)]
pub struct DaemonConfig {
    pub listen_addr: String,
    pub db_addr: String,
    pub db_user: Option<String>,
    pub db_pwd: Option<String>,
    pub db_name: String,
    pub retention_policy: String,
    pub flush_interval: Duration,
    pub max_batch_points: usize,
}

#[derive(Debug, Parser)]
#[command(name = "pulsod", version, about = "Pulso metrics bridge daemon")]
pub struct Cli {
    /// Address to accept producer connections on (host:port)
    #[arg(long, default_value = DEFAULT_LISTEN_ADDR)]
    pub listen: String,

    /// Storage backend address (host:port)
    #[arg(long, default_value = DEFAULT_DB_ADDR)]
    pub db: String,

    /// Optional user to access the storage backend
    #[arg(long)]
    pub db_user: Option<String>,

    /// Optional user password to access the storage backend
    #[arg(long)]
    pub db_pwd: Option<String>,

    /// Database to write to
    #[arg(long, default_value = DEFAULT_DB_NAME)]
    pub db_name: String,

    /// Retention policy stamped on every batch
    #[arg(long, default_value = DEFAULT_RETENTION_POLICY)]
    pub retention_policy: String,

    /// Batching cadence in milliseconds
    #[arg(long, default_value_t = DEFAULT_FLUSH_INTERVAL_MS)]
    pub flush_interval_ms: u64,

    /// Buffer size that triggers an immediate flush
    #[arg(long, default_value_t = DEFAULT_MAX_BATCH_POINTS)]
    pub max_batch_points: usize,
}

impl DaemonConfig {
    pub fn from_args(args: &Cli) -> Result<Self> {
        ensure!(
            args.flush_interval_ms > 0,
            "--flush-interval-ms must be greater than zero"
        );
        ensure!(
            args.max_batch_points > 0,
            "--max-batch-points must be greater than zero"
        );

        Ok(Self {
            listen_addr: args.listen.clone(),
            db_addr: args.db.clone(),
            db_user: args.db_user.clone(),
            db_pwd: args.db_pwd.clone(),
            db_name: args.db_name.clone(),
            retention_policy: args.retention_policy.clone(),
            flush_interval: Duration::from_millis(args.flush_interval_ms),
            max_batch_points: args.max_batch_points,
        })
    }

    pub fn from_env() -> Result<Self> {
        let args = Cli::parse();
        Self::from_args(&args)
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
