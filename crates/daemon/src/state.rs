use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use crate::config::DaemonConfig;

/// Shared between the accept loop and every producer connection thread.
pub struct DaemonState {
    pub config: DaemonConfig,
    points_accepted: AtomicU64,
    started: Instant,
}

impl DaemonState {
    pub fn new(config: DaemonConfig) -> Self {
        Self {
            config,
            points_accepted: AtomicU64::new(0),
            started: Instant::now(),
        }
    }

    pub fn record_points(&self, count: u64) {
        self.points_accepted.fetch_add(count, Ordering::Relaxed);
    }

    pub fn points_accepted(&self) -> u64 {
        self.points_accepted.load(Ordering::Relaxed)
    }

    pub fn uptime_secs(&self) -> u64 {
        self.started.elapsed().as_secs()
    }
}
