use std::io;
use std::net::{TcpListener, TcpStream};
use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};
use std::thread;
use std::time::Duration;

use anyhow::Context;
use chrono::{DateTime, TimeZone, Utc};
use crossbeam::channel::Sender;
use log::{debug, error, info};
use pulso_batch::{FieldValue, Point};
use pulso_protocol::codec::{read_frame, write_frame};
use pulso_protocol::{IngestRequest, IngestResponse, Metric, MetricValue, StatusReport, Timestamp};
use signal_hook::consts::{SIGINT, SIGTERM};
use signal_hook::flag;

use crate::state::DaemonState;

/// How long the accept loop sleeps between polls when no producer is
/// waiting. Bounds how stale a shutdown signal can go unnoticed.
const ACCEPT_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Accept producer connections until SIGINT/SIGTERM, pushing every published
/// metric into the batcher via `points`.
///
/// Returns once the shutdown signal has been observed; draining the batcher
/// is the caller's job. Connection handler threads still running at that
/// moment are abandoned with the process.
pub fn run_ingest_server(state: Arc<DaemonState>, points: Sender<Point>) -> anyhow::Result<()> {
    let shutdown = Arc::new(AtomicBool::new(false));

    // Register signal handlers. They only set the atomic flag
    for sig in [SIGINT, SIGTERM] {
        flag::register(sig, Arc::clone(&shutdown))
            .with_context(|| format!("Failed to register signal handler for {sig}"))?;
    }

    let listener = TcpListener::bind(&state.config.listen_addr).with_context(|| {
        format!(
            "Failed to bind ingest listener on {}",
            state.config.listen_addr
        )
    })?;

    info!("pulso daemon listening on {}", state.config.listen_addr);

    serve(listener, state, points, &shutdown)
}

/// The accept loop itself, shutdown signaled through `shutdown`.
///
/// The listener polls in non-blocking mode: signal handlers installed with
/// SA_RESTART never interrupt a blocking accept, which would leave an idle
/// daemon deaf to its own shutdown flag until the next producer connected.
fn serve(
    listener: TcpListener,
    state: Arc<DaemonState>,
    points: Sender<Point>,
    shutdown: &AtomicBool,
) -> anyhow::Result<()> {
    listener
        .set_nonblocking(true)
        .context("Failed to switch ingest listener to non-blocking mode")?;

    loop {
        if shutdown.load(Ordering::Relaxed) {
            info!("Shutdown signal observed; stopping ingest server.");
            break;
        }

        match listener.accept() {
            Ok((stream, addr)) => {
                debug!("producer connected from {addr}");
                // The handler does framed blocking reads; make sure the
                // accepted socket did not inherit the listener's mode.
                if let Err(err) = stream.set_nonblocking(false) {
                    error!("Failed to reset socket mode for {addr}: {err}");
                    continue;
                }
                let state = state.clone();
                let points = points.clone();
                thread::spawn(move || {
                    if let Err(err) = handle_producer(stream, state, points) {
                        error!("Error while handling producer: {err:#}");
                    }
                });
            }
            Err(ref err) if err.kind() == io::ErrorKind::WouldBlock => {
                thread::sleep(ACCEPT_POLL_INTERVAL);
            }
            Err(ref err) if err.kind() == io::ErrorKind::Interrupted => {
                // Spurious EINTR... retry
                continue;
            }
            Err(err) => {
                error!("Accept error: {err}");
                continue;
            }
        }
    }

    info!("Ingest server shutdown complete.");
    Ok(())
}

/// Serve one producer connection: a stream of framed requests until the
/// peer hangs up. Unparseable frames terminate the connection; well-formed
/// frames carrying bad content get an `Error` response and the connection
/// lives on. Nothing invalid ever reaches the batcher.
fn handle_producer(
    mut stream: TcpStream,
    state: Arc<DaemonState>,
    points: Sender<Point>,
) -> anyhow::Result<()> {
    loop {
        let request: IngestRequest = match read_frame(&mut stream) {
            Ok(request) => request,
            Err(err) if is_disconnect(&err) => return Ok(()),
            Err(err) => return Err(err).context("Failed to read ingest frame"),
        };

        let response = match request {
            IngestRequest::Publish(metrics) => {
                // All-or-nothing: one bad sample refuses the whole publish
                // before anything is enqueued.
                if let Some(reason) = metrics.iter().find_map(reject_reason) {
                    IngestResponse::Error(reason)
                } else {
                    let mut enqueued: u32 = 0;
                    let mut draining = false;
                    for metric in metrics {
                        if points.send(metric_to_point(metric)).is_err() {
                            // Batcher is draining; no further points are
                            // accepted.
                            draining = true;
                            break;
                        }
                        enqueued += 1;
                    }
                    state.record_points(u64::from(enqueued));
                    if draining {
                        write_frame(
                            &mut stream,
                            &IngestResponse::Error(format!(
                                "daemon is shutting down; enqueued {enqueued} metric(s) before the drain began"
                            )),
                        )
                        .context("Failed to write refusal response")?;
                        return Ok(());
                    }
                    IngestResponse::Ack(enqueued)
                }
            }
            IngestRequest::Ping => IngestResponse::Pong,
            IngestRequest::Status => IngestResponse::Status(StatusReport {
                listen_addr: state.config.listen_addr.clone(),
                sink_target: format!("{}/{}", state.config.db_addr, state.config.db_name),
                points_accepted: state.points_accepted(),
                uptime_secs: state.uptime_secs(),
            }),
        };

        write_frame(&mut stream, &response).context("Failed to write ingest response")?;
    }
}

/// Content validation for published samples. The batcher and the line
/// encoder both assume well-formed points, so anything the storage backend
/// would reject has to be caught here: a sample with no values, or a
/// non-finite float, would poison every other point in its batch.
fn reject_reason(metric: &Metric) -> Option<String> {
    if metric.values.is_empty() {
        return Some(format!("metric {:?} has no values", metric.name));
    }
    for (name, value) in &metric.values {
        if let MetricValue::Float(v) = value
            && !v.is_finite()
        {
            return Some(format!(
                "metric {:?} value {name:?} is not a finite number",
                metric.name
            ));
        }
    }
    None
}

/// A peer closing its end mid-read is a normal disconnect, not an error
/// worth logging.
fn is_disconnect(err: &anyhow::Error) -> bool {
    err.downcast_ref::<io::Error>().is_some_and(|io_err| {
        matches!(
            io_err.kind(),
            io::ErrorKind::UnexpectedEof | io::ErrorKind::ConnectionReset
        )
    })
}

/// Marshal a wire metric into the batcher's point shape.
fn metric_to_point(metric: Metric) -> Point {
    Point {
        measurement: metric.name,
        tags: metric.tags,
        time: metric_time(metric.timestamp),
        fields: metric
            .values
            .into_iter()
            .map(|(name, value)| (name, field_value(value)))
            .collect(),
    }
}

fn metric_time(ts: Timestamp) -> DateTime<Utc> {
    // A nanos value past the valid range degrades to the Unix epoch rather
    // than poisoning the batch.
    Utc.timestamp_opt(ts.seconds, ts.nanos)
        .single()
        .unwrap_or_default()
}

fn field_value(value: MetricValue) -> FieldValue {
    match value {
        MetricValue::Integer(v) => FieldValue::Integer(v),
        MetricValue::Float(v) => FieldValue::Float(v),
    }
}

#[cfg(test)]
#[path = "ingest_tests.rs"]
mod tests;
