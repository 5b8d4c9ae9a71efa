use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

/// One timestamped measurement sample. Immutable once received: the batcher
/// only ever moves points around, it never edits them.
#[derive(Debug, Clone, PartialEq)]
pub struct Point {
    pub measurement: String,
    pub tags: BTreeMap<String, String>,
    pub time: DateTime<Utc>,
    pub fields: BTreeMap<String, FieldValue>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FieldValue {
    Integer(i64),
    Float(f64),
}

/// A bounded, ordered group of points submitted to storage in one write.
///
/// Built incrementally by the batcher, consumed exactly once by the sink,
/// then discarded.
#[derive(Debug, Clone, PartialEq)]
pub struct Batch {
    pub points: Vec<Point>,
    /// Destination database.
    pub database: String,
    /// Retention/placement hint for the destination.
    pub retention_policy: String,
}
