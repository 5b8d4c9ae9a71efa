use std::collections::BTreeMap;
use std::process::ExitCode;

use anyhow::{Context, Result, bail};
use chrono::Utc;
use clap::Args;
use pulso_protocol::{IngestRequest, IngestResponse, Metric, MetricValue, Timestamp};

use crate::commands::{ConnectOptions, roundtrip};

#[derive(Debug, Args)]
pub struct PublishArgs {
    /// Measurement name
    pub measurement: String,

    /// Tag as KEY=VALUE (repeatable)
    #[arg(long = "tag", value_name = "KEY=VALUE")]
    pub tags: Vec<String>,

    /// Field as KEY=VALUE (repeatable); the value is an integer unless it
    /// only parses as a float
    #[arg(long = "field", value_name = "KEY=VALUE", required = true)]
    pub fields: Vec<String>,

    #[command(flatten)]
    pub connect: ConnectOptions,
}

pub fn run(args: PublishArgs) -> ExitCode {
    match execute(args) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("[error] {e:#}");
            ExitCode::from(2)
        }
    }
}

fn execute(args: PublishArgs) -> Result<ExitCode> {
    let metric = build_metric(&args)?;
    let response = roundtrip(&args.connect.addr, &IngestRequest::Publish(vec![metric]))?;

    match response {
        IngestResponse::Ack(count) => {
            println!("published {count} metric(s)");
            Ok(ExitCode::SUCCESS)
        }
        IngestResponse::Error(msg) => {
            eprintln!("[error] daemon refused publish: {msg}");
            Ok(ExitCode::from(1))
        }
        other => bail!("unexpected response to publish: {other:?}"),
    }
}

fn build_metric(args: &PublishArgs) -> Result<Metric> {
    let mut tags = BTreeMap::new();
    for raw in &args.tags {
        let (key, value) = parse_pair(raw)?;
        tags.insert(key, value);
    }

    let mut values = BTreeMap::new();
    for raw in &args.fields {
        let (key, value) = parse_pair(raw)?;
        values.insert(key, parse_value(&value)?);
    }

    let now = Utc::now();
    Ok(Metric {
        name: args.measurement.clone(),
        tags,
        timestamp: Timestamp {
            seconds: now.timestamp(),
            nanos: now.timestamp_subsec_nanos(),
        },
        values,
    })
}

fn parse_pair(raw: &str) -> Result<(String, String)> {
    match raw.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => bail!("expected KEY=VALUE, got {raw:?}"),
    }
}

fn parse_value(raw: &str) -> Result<MetricValue> {
    if let Ok(v) = raw.parse::<i64>() {
        return Ok(MetricValue::Integer(v));
    }
    raw.parse::<f64>()
        .map(MetricValue::Float)
        .with_context(|| format!("field value {raw:?} is not numeric"))
}

#[cfg(test)]
#[path = "publish_tests.rs"]
mod tests;
