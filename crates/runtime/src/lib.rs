mod config;
pub mod logging;

pub use config::{
    DEFAULT_DB_ADDR, DEFAULT_DB_NAME, DEFAULT_FLUSH_INTERVAL_MS, DEFAULT_LISTEN_ADDR,
    DEFAULT_MAX_BATCH_POINTS, DEFAULT_RETENTION_POLICY, PROGRAM_LOG_LEVEL, PROGRAM_NAME,
};

pub use logging::init;
