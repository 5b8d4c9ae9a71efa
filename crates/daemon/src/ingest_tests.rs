use super::*;

use std::collections::BTreeMap;
use std::net::TcpListener;
use std::time::Duration;

use clap::Parser;
use crossbeam::channel;

use crate::config::{Cli, DaemonConfig};

fn test_state() -> Arc<DaemonState> {
    let cli = Cli::parse_from(["pulsod"]);
    let config = DaemonConfig::from_args(&cli).expect("default config");
    Arc::new(DaemonState::new(config))
}

fn sample_metric(name: &str, seconds: i64) -> Metric {
    let mut tags = BTreeMap::new();
    tags.insert("host".to_string(), "node-1".to_string());

    let mut values = BTreeMap::new();
    values.insert("count".to_string(), MetricValue::Integer(3));
    values.insert("ratio".to_string(), MetricValue::Float(0.5));

    Metric {
        name: name.to_string(),
        tags,
        timestamp: Timestamp { seconds, nanos: 42 },
        values,
    }
}

#[test]
fn metric_to_point_carries_everything_across() {
    let point = metric_to_point(sample_metric("net", 1_700_000_000));

    assert_eq!(point.measurement, "net");
    assert_eq!(point.tags["host"], "node-1");
    assert_eq!(point.time.timestamp(), 1_700_000_000);
    assert_eq!(point.time.timestamp_subsec_nanos(), 42);
    assert_eq!(point.fields["count"], FieldValue::Integer(3));
    assert_eq!(point.fields["ratio"], FieldValue::Float(0.5));
}

#[test]
fn out_of_range_nanos_degrade_to_epoch() {
    let time = metric_time(Timestamp {
        seconds: 1_700_000_000,
        nanos: 2_000_000_000,
    });
    assert_eq!(time, DateTime::<Utc>::default());
}

#[test]
fn reject_reason_catches_degenerate_samples() {
    assert!(reject_reason(&sample_metric("net", 0)).is_none());

    let mut fieldless = sample_metric("cpu", 0);
    fieldless.values.clear();
    let reason = reject_reason(&fieldless).expect("fieldless sample refused");
    assert!(reason.contains("no values"), "unexpected reason: {reason}");

    for bad in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
        let mut non_finite = sample_metric("cpu", 0);
        non_finite
            .values
            .insert("load".to_string(), MetricValue::Float(bad));
        let reason = reject_reason(&non_finite).expect("non-finite value refused");
        assert!(reason.contains("finite"), "unexpected reason: {reason}");
    }
}

#[test]
fn disconnect_errors_are_classified() {
    let eof: anyhow::Error = io::Error::new(io::ErrorKind::UnexpectedEof, "eof").into();
    let reset: anyhow::Error = io::Error::new(io::ErrorKind::ConnectionReset, "reset").into();
    let other: anyhow::Error = io::Error::new(io::ErrorKind::PermissionDenied, "denied").into();
    let not_io = anyhow::anyhow!("some decode failure");

    assert!(is_disconnect(&eof));
    assert!(is_disconnect(&reset));
    assert!(!is_disconnect(&other));
    assert!(!is_disconnect(&not_io));
}

#[test]
fn producer_connection_publishes_pings_and_reports_status() {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let addr = listener.local_addr().expect("local addr");

    let state = test_state();
    let (points_tx, points_rx) = channel::unbounded::<Point>();

    let server_state = state.clone();
    let server = std::thread::spawn(move || {
        let (stream, _addr) = listener.accept().expect("accept");
        handle_producer(stream, server_state, points_tx)
    });

    let mut stream = TcpStream::connect(addr).expect("connect");

    let publish = IngestRequest::Publish(vec![
        sample_metric("first", 1_700_000_000),
        sample_metric("second", 1_700_000_001),
    ]);
    write_frame(&mut stream, &publish).expect("write publish");
    let response: IngestResponse = read_frame(&mut stream).expect("publish response");
    assert_eq!(response, IngestResponse::Ack(2));

    // Published points come out of the channel in arrival order.
    let first = points_rx
        .recv_timeout(Duration::from_secs(2))
        .expect("first point");
    let second = points_rx
        .recv_timeout(Duration::from_secs(2))
        .expect("second point");
    assert_eq!(first.measurement, "first");
    assert_eq!(second.measurement, "second");

    write_frame(&mut stream, &IngestRequest::Ping).expect("write ping");
    let response: IngestResponse = read_frame(&mut stream).expect("ping response");
    assert_eq!(response, IngestResponse::Pong);

    write_frame(&mut stream, &IngestRequest::Status).expect("write status");
    let response: IngestResponse = read_frame(&mut stream).expect("status response");
    match response {
        IngestResponse::Status(report) => {
            assert_eq!(report.points_accepted, 2);
            assert!(report.sink_target.ends_with("/metrics"));
        }
        other => panic!("expected status report, got {other:?}"),
    }

    // Peer hangup ends the connection without an error.
    drop(stream);
    server
        .join()
        .expect("handler thread")
        .expect("clean disconnect");

    assert_eq!(state.points_accepted(), 2);
}

#[test]
fn degenerate_publish_is_refused_and_the_connection_survives() {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let addr = listener.local_addr().expect("local addr");

    let state = test_state();
    let (points_tx, points_rx) = channel::unbounded::<Point>();

    let server_state = state.clone();
    let server = std::thread::spawn(move || {
        let (stream, _addr) = listener.accept().expect("accept");
        handle_producer(stream, server_state, points_tx)
    });

    let mut stream = TcpStream::connect(addr).expect("connect");

    // A publish where one of the samples has no values: nothing from the
    // request may reach the batcher.
    let mut fieldless = sample_metric("cpu", 1_700_000_000);
    fieldless.values.clear();
    let publish = IngestRequest::Publish(vec![sample_metric("ok", 1_700_000_000), fieldless]);
    write_frame(&mut stream, &publish).expect("write publish");
    let response: IngestResponse = read_frame(&mut stream).expect("refusal response");
    match response {
        IngestResponse::Error(msg) => {
            assert!(msg.contains("no values"), "unexpected refusal: {msg}")
        }
        other => panic!("expected refusal, got {other:?}"),
    }
    assert!(
        points_rx.try_recv().is_err(),
        "no point from a refused publish may be enqueued"
    );
    assert_eq!(state.points_accepted(), 0);

    // Same for a non-finite float value.
    let mut non_finite = sample_metric("cpu", 1_700_000_000);
    non_finite
        .values
        .insert("load".to_string(), MetricValue::Float(f64::NAN));
    write_frame(&mut stream, &IngestRequest::Publish(vec![non_finite])).expect("write publish");
    let response: IngestResponse = read_frame(&mut stream).expect("refusal response");
    assert!(matches!(response, IngestResponse::Error(_)));

    // The connection is still good for a valid publish afterwards.
    let publish = IngestRequest::Publish(vec![sample_metric("net", 1_700_000_001)]);
    write_frame(&mut stream, &publish).expect("write publish");
    let response: IngestResponse = read_frame(&mut stream).expect("publish response");
    assert_eq!(response, IngestResponse::Ack(1));
    assert_eq!(state.points_accepted(), 1);

    drop(stream);
    server
        .join()
        .expect("handler thread")
        .expect("clean disconnect");
}

#[test]
fn publish_during_drain_is_refused() {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let addr = listener.local_addr().expect("local addr");

    let state = test_state();
    let (points_tx, points_rx) = channel::unbounded::<Point>();
    // Batcher gone: its receiver is dropped.
    drop(points_rx);

    let server_state = state.clone();
    let server = std::thread::spawn(move || {
        let (stream, _addr) = listener.accept().expect("accept");
        handle_producer(stream, server_state, points_tx)
    });

    let mut stream = TcpStream::connect(addr).expect("connect");
    let publish = IngestRequest::Publish(vec![sample_metric("late", 1_700_000_000)]);
    write_frame(&mut stream, &publish).expect("write publish");

    let response: IngestResponse = read_frame(&mut stream).expect("refusal response");
    match response {
        IngestResponse::Error(msg) => assert!(msg.contains("shutting down")),
        other => panic!("expected refusal, got {other:?}"),
    }

    server
        .join()
        .expect("handler thread")
        .expect("refusal is not a handler error");

    // The counter reflects what was actually enqueued before the drain was
    // noticed; here the batcher was already gone, so nothing was.
    assert_eq!(state.points_accepted(), 0);
}

#[test]
fn shutdown_flag_stops_an_idle_server() {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");

    let state = test_state();
    let (points_tx, _points_rx) = channel::unbounded::<Point>();
    let shutdown = Arc::new(AtomicBool::new(false));
    let (done_tx, done_rx) = channel::bounded::<()>(1);

    let server_shutdown = shutdown.clone();
    std::thread::spawn(move || {
        serve(listener, state, points_tx, &server_shutdown).expect("serve");
        done_tx.send(()).ok();
    });

    // No producer ever connects; the flag alone must end the loop.
    std::thread::sleep(Duration::from_millis(100));
    shutdown.store(true, Ordering::Relaxed);

    done_rx
        .recv_timeout(Duration::from_secs(2))
        .expect("idle server must observe the shutdown flag without a connection");
}

#[test]
fn polling_server_still_serves_producers_before_shutdown() {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let addr = listener.local_addr().expect("local addr");

    let state = test_state();
    let (points_tx, points_rx) = channel::unbounded::<Point>();
    let shutdown = Arc::new(AtomicBool::new(false));
    let (done_tx, done_rx) = channel::bounded::<()>(1);

    let server_state = state.clone();
    let server_shutdown = shutdown.clone();
    std::thread::spawn(move || {
        serve(listener, server_state, points_tx, &server_shutdown).expect("serve");
        done_tx.send(()).ok();
    });

    // A connection accepted by the polling listener must still do blocking
    // framed I/O end to end.
    let mut stream = TcpStream::connect(addr).expect("connect");
    let publish = IngestRequest::Publish(vec![sample_metric("net", 1_700_000_000)]);
    write_frame(&mut stream, &publish).expect("write publish");
    let response: IngestResponse = read_frame(&mut stream).expect("publish response");
    assert_eq!(response, IngestResponse::Ack(1));
    points_rx
        .recv_timeout(Duration::from_secs(2))
        .expect("published point");

    shutdown.store(true, Ordering::Relaxed);
    done_rx
        .recv_timeout(Duration::from_secs(2))
        .expect("server exits after the flag is set");
}
