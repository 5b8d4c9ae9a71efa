pub mod codec;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Wire timestamp: seconds since the Unix epoch plus a nanosecond fraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Timestamp {
    pub seconds: i64,
    pub nanos: u32,
}

/// One metric sample as published by producers.
///
/// Producers marshal whatever they measured into this shape; the daemon
/// converts it into a storage point before batching. Maps are ordered so
/// the encoding of a given sample is deterministic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metric {
    pub name: String,
    pub tags: BTreeMap<String, String>,
    pub timestamp: Timestamp,
    pub values: BTreeMap<String, MetricValue>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum MetricValue {
    Integer(i64),
    Float(f64),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum IngestRequest {
    /// Deliver samples for batching. Answered with `Ack` carrying the
    /// number of samples taken.
    Publish(Vec<Metric>),
    Ping,
    Status,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum IngestResponse {
    Ack(u32),
    Pong,
    Status(StatusReport),
    Error(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusReport {
    pub listen_addr: String,
    /// Destination the daemon writes batches to, as `addr/database`.
    pub sink_target: String,
    pub points_accepted: u64,
    pub uptime_secs: u64,
}
