//! Tests for streaming error classification and metrics.

use super::super::error::*;
use std::io;

#[test]
fn test_stream_error_creation() {
    let error = StreamError::demand_violation(-1);
    assert!(error.is_caller_error());
    assert!(!error.is_terminal());
    assert!(error.to_string().contains("-1"));

    let read_error = StreamError::from(io::Error::new(io::ErrorKind::UnexpectedEof, "short"));
    assert!(read_error.is_terminal());
    assert!(read_error.to_string().contains("short"));
}

#[test]
fn test_stream_error_terminal_classification() {
    // Errors that end a running stream
    assert!(StreamError::injected(3).is_terminal());
    assert!(StreamError::device("unplugged").is_terminal());
    assert!(StreamError::sink("upload closed").is_terminal());

    // Errors rejected at the call site
    assert!(StreamError::invalid_config("chunk_size").is_caller_error());
    assert!(StreamError::AlreadySubscribed.is_caller_error());
    assert!(StreamError::WorkerSpawn("no threads".into()).is_caller_error());
    assert!(StreamError::WorkerPanicked.is_caller_error());
}

#[test]
fn test_stream_error_clone_keeps_kind() {
    let original = StreamError::Read(io::Error::new(io::ErrorKind::BrokenPipe, "pipe closed"));
    match original.clone() {
        StreamError::Read(err) => {
            assert_eq!(err.kind(), io::ErrorKind::BrokenPipe);
            assert!(err.to_string().contains("pipe closed"));
        }
        other => panic!("unexpected clone {other:?}"),
    }

    assert!(matches!(
        StreamError::injected(7).clone(),
        StreamError::Injected { call: 7 }
    ));
}

#[test]
fn test_stream_error_display() {
    assert_eq!(
        StreamError::injected(2).to_string(),
        "Injected fault on read call 2"
    );
    assert_eq!(
        StreamError::AlreadySubscribed.to_string(),
        "Publisher already has a subscriber"
    );
}

#[test]
fn test_error_metrics() {
    let mut metrics = StreamErrorMetrics::default();

    metrics.record_error(&StreamError::demand_violation(0));
    metrics.record_error(&StreamError::injected(1));
    metrics.record_error(&StreamError::Read(io::Error::other("disk")));
    metrics.record_error(&StreamError::AlreadySubscribed);

    assert_eq!(metrics.total_errors, 4);
    assert_eq!(metrics.demand_violations, 1);
    assert_eq!(metrics.injected_errors, 1);
    assert_eq!(metrics.read_errors, 1);
    assert_eq!(metrics.terminal_errors, 2);

    metrics.reset();
    assert_eq!(metrics.total_errors, 0);
    assert_eq!(metrics.terminal_errors, 0);
}
