use std::sync::Arc;

mod config;
mod ingest;
mod state;

use log::info;
use pulso_batch::BatcherConfig;
use pulso_runtime::logging;
use pulso_sink::{HttpSink, HttpSinkConfig};

use config::DaemonConfig;
use state::DaemonState;

fn main() -> anyhow::Result<()> {
    logging::init().ok();

    let config = DaemonConfig::from_env()?;

    info!(
        "Starting pulso daemon: listen={}, db={}/{}, flush_interval={}ms, max_batch_points={}",
        config.listen_addr,
        config.db_addr,
        config.db_name,
        config.flush_interval.as_millis(),
        config.max_batch_points,
    );

    let sink = HttpSink::connect(HttpSinkConfig {
        addr: config.db_addr.clone(),
        username: config.db_user.clone(),
        password: config.db_pwd.clone(),
    })?;

    let batcher = pulso_batch::spawn(
        BatcherConfig {
            flush_interval: config.flush_interval,
            max_batch_points: config.max_batch_points,
            database: config.db_name.clone(),
            retention_policy: config.retention_policy.clone(),
        },
        sink,
    )?;

    let state = Arc::new(DaemonState::new(config));
    ingest::run_ingest_server(state, batcher.points())?;

    info!("Draining buffered points before exit.");
    batcher.stop();
    info!("Terminated pulso daemon.");
    Ok(())
}
