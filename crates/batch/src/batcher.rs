use std::{mem, thread, time::Duration};

use anyhow::{Result, ensure};
use crossbeam::channel::{self, Receiver, Sender};
use crossbeam::select;
use log::{debug, error, info};

use crate::point::{Batch, Point};

/// Storage-write collaborator consuming batches.
///
/// `write` runs synchronously on the batcher worker thread, so a slow sink
/// stalls subsequent accepts and timer ticks. There is no write timeout and
/// no worker pool.
pub trait Sink {
    fn write(&self, batch: &Batch) -> Result<()>;
}

#[derive(Debug, Clone)]
pub struct BatcherConfig {
    /// Cadence of time-triggered flushes. Must be non-zero. The timer fires
    /// on a fixed schedule and is not reset by size-triggered flushes.
    pub flush_interval: Duration,
    /// Buffer length that triggers an immediate flush. Must be non-zero.
    pub max_batch_points: usize,
    /// Database every batch is addressed to.
    pub database: String,
    /// Retention policy hint stamped on every batch.
    pub retention_policy: String,
}

/// Converts a stream of individual points into size-bounded or time-bounded
/// batches and hands each batch to the sink exactly once.
///
/// The buffer has a single owner, the worker thread driving [`Batcher::run`],
/// so no locking is needed: producers and the stop signaler only talk to it
/// through channels.
pub struct Batcher<S> {
    config: BatcherConfig,
    sink: S,
    buf: Vec<Point>,
    /// Failed sink writes are forwarded here when a subscriber is attached.
    errors: Option<Sender<anyhow::Error>>,
}

/// Handle to a running batcher worker.
///
/// `stop` consumes the handle, so a second stop call is unrepresentable.
/// Dropping the handle without calling `stop` also shuts the worker down
/// (its channels disconnect), but does not wait for the drain to finish.
pub struct BatcherHandle {
    points: Sender<Point>,
    stop_tx: Sender<()>,
    worker: thread::JoinHandle<()>,
}

impl BatcherHandle {
    /// Channel producers push points into. Clone freely; every clone feeds
    /// the same buffer.
    pub fn points(&self) -> Sender<Point> {
        self.points.clone()
    }

    /// Signal shutdown and wait for the final drain flush to complete.
    ///
    /// Points still sitting in the channel when the stop signal is observed
    /// are dropped; producers that need their points flushed must stop
    /// publishing before stop is called.
    pub fn stop(self) {
        let _ = self.stop_tx.send(());
        drop(self.points);
        if self.worker.join().is_err() {
            error!("batcher worker panicked during drain");
        }
    }
}

/// Start a batcher worker thread writing to `sink`.
pub fn spawn<S>(config: BatcherConfig, sink: S) -> Result<BatcherHandle>
where
    S: Sink + Send + 'static,
{
    spawn_with_errors(config, sink, None)
}

/// Like [`spawn`], but failed sink writes are also forwarded to `errors`.
pub fn spawn_with_errors<S>(
    config: BatcherConfig,
    sink: S,
    errors: Option<Sender<anyhow::Error>>,
) -> Result<BatcherHandle>
where
    S: Sink + Send + 'static,
{
    ensure!(
        !config.flush_interval.is_zero(),
        "flush_interval must be non-zero"
    );
    ensure!(
        config.max_batch_points > 0,
        "max_batch_points must be non-zero"
    );

    let (points_tx, points_rx) = channel::unbounded::<Point>();
    let (stop_tx, stop_rx) = channel::bounded::<()>(1);

    let batcher = Batcher {
        buf: Vec::with_capacity(config.max_batch_points),
        config,
        sink,
        errors,
    };
    let worker = thread::spawn(move || batcher.run(points_rx, stop_rx));

    Ok(BatcherHandle {
        points: points_tx,
        stop_tx,
        worker,
    })
}

impl<S: Sink> Batcher<S> {
    /// Worker loop: blocks on whichever of {stop, incoming point, flush tick}
    /// fires first.
    ///
    /// Stop (or every producer hanging up) moves the loop into its drain
    /// path: one final flush of whatever is buffered, then the thread exits.
    /// No point is accepted once draining begins.
    fn run(mut self, points: Receiver<Point>, stop: Receiver<()>) {
        let ticker = channel::tick(self.config.flush_interval);
        loop {
            select! {
                recv(stop) -> _ => {
                    self.flush();
                    info!("batcher drained and stopped");
                    return;
                }
                recv(points) -> point => match point {
                    Ok(point) => self.accept(point),
                    Err(_) => {
                        // All producers disconnected.
                        self.flush();
                        return;
                    }
                },
                recv(ticker) -> _ => {
                    if !self.buf.is_empty() {
                        self.flush();
                    }
                }
            }
        }
    }

    /// Buffer one point, flushing the instant the threshold is reached so
    /// the buffer never grows past `max_batch_points`.
    fn accept(&mut self, point: Point) {
        self.buf.push(point);
        if self.buf.len() == self.config.max_batch_points {
            self.flush();
        }
    }

    /// Emit the current buffer as one batch and clear it, whatever the sink
    /// says. An empty buffer flushes nothing.
    ///
    /// Delivery is at most once: a failed write is logged, forwarded to the
    /// error channel when one is attached, and its points are dropped. There
    /// is deliberately no retry; callers that cannot tolerate loss need a
    /// sink that does its own buffering.
    fn flush(&mut self) {
        if self.buf.is_empty() {
            return;
        }
        let points = mem::replace(
            &mut self.buf,
            Vec::with_capacity(self.config.max_batch_points),
        );
        let batch = Batch {
            points,
            database: self.config.database.clone(),
            retention_policy: self.config.retention_policy.clone(),
        };
        debug!(
            "flushing {} points to {}",
            batch.points.len(),
            batch.database
        );
        if let Err(err) = self.sink.write(&batch) {
            error!(
                "sink write failed, dropping {} points: {err:#}",
                batch.points.len()
            );
            if let Some(errors) = &self.errors {
                let _ = errors.send(err);
            }
        }
    }
}

#[cfg(test)]
#[path = "batcher_tests.rs"]
mod tests;
