use anyhow::{Context, Result};
use log::debug;
use pulso_batch::{Batch, Sink};

use crate::line::encode_batch;

#[derive(Debug, Clone)]
pub struct HttpSinkConfig {
    /// Storage backend address (host:port).
    pub addr: String,
    pub username: Option<String>,
    pub password: Option<String>,
}

/// Blocking HTTP sink speaking the InfluxDB 1.x write API.
///
/// Runs on the batcher worker thread; one POST per batch.
pub struct HttpSink {
    agent: ureq::Agent,
    base_url: String,
    config: HttpSinkConfig,
}

impl HttpSink {
    /// Build the sink and probe the backend. Connecting to an unreachable
    /// backend is an error here, at startup, rather than a stream of dropped
    /// batches later.
    pub fn connect(config: HttpSinkConfig) -> Result<Self> {
        let sink = Self {
            agent: ureq::Agent::new(),
            base_url: format!("http://{}", config.addr),
            config,
        };
        sink.ping()
            .with_context(|| format!("storage backend at {} is unreachable", sink.config.addr))?;
        Ok(sink)
    }

    /// Health probe; `/ping` answers 204 on a healthy instance.
    pub fn ping(&self) -> Result<()> {
        let url = format!("{}/ping", self.base_url);
        self.agent.get(&url).call()?;
        Ok(())
    }
}

impl Sink for HttpSink {
    /// Blocking I/O
    fn write(&self, batch: &Batch) -> Result<()> {
        let url = format!("{}/write", self.base_url);
        let mut request = self
            .agent
            .post(&url)
            .query("db", &batch.database)
            .query("rp", &batch.retention_policy);
        if let Some(username) = &self.config.username {
            request = request.query("u", username);
        }
        if let Some(password) = &self.config.password {
            request = request.query("p", password);
        }

        let body = encode_batch(batch);
        debug!(
            "POST {} points ({} bytes) to db {}",
            batch.points.len(),
            body.len(),
            batch.database
        );
        request.send_string(&body).with_context(|| {
            format!(
                "write of {} points to database {} failed",
                batch.points.len(),
                batch.database
            )
        })?;
        Ok(())
    }
}
