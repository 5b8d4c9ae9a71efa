use std::fmt::Write;

use pulso_batch::{Batch, FieldValue, Point};

// Characters that need a backslash in each position of a line.
const MEASUREMENT_SPECIALS: &[char] = &[',', ' '];
const TAG_SPECIALS: &[char] = &[',', ' ', '='];

/// Encode a batch as line protocol, one line per point, nanosecond
/// timestamps. Tag and field maps are ordered, so the output for a given
/// batch is deterministic.
pub fn encode_batch(batch: &Batch) -> String {
    let mut out = String::new();
    for point in &batch.points {
        encode_point(&mut out, point);
        out.push('\n');
    }
    out
}

fn encode_point(out: &mut String, point: &Point) {
    escape_into(out, &point.measurement, MEASUREMENT_SPECIALS);

    for (key, value) in &point.tags {
        out.push(',');
        escape_into(out, key, TAG_SPECIALS);
        out.push('=');
        escape_into(out, value, TAG_SPECIALS);
    }

    out.push(' ');
    let mut first = true;
    for (key, value) in &point.fields {
        if !first {
            out.push(',');
        }
        first = false;
        escape_into(out, key, TAG_SPECIALS);
        out.push('=');
        match value {
            FieldValue::Integer(v) => {
                let _ = write!(out, "{v}i");
            }
            FieldValue::Float(v) => {
                let _ = write!(out, "{v}");
            }
        }
    }

    let _ = write!(out, " {}", timestamp_nanos(point));
}

fn timestamp_nanos(point: &Point) -> i64 {
    match point.time.timestamp_nanos_opt() {
        Some(nanos) => nanos,
        // Out of i64-nanosecond range (beyond the year 2262); degrade to
        // second precision rather than refuse the point.
        None => point.time.timestamp().saturating_mul(1_000_000_000),
    }
}

fn escape_into(out: &mut String, raw: &str, specials: &[char]) {
    for ch in raw.chars() {
        if specials.contains(&ch) {
            out.push('\\');
        }
        out.push(ch);
    }
}

#[cfg(test)]
#[path = "line_tests.rs"]
mod tests;
