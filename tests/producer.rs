use std::io::Write;
use std::time::Duration;

use serde_json::json;
use tempfile::NamedTempFile;
use windrow::{
    channel, ConfigError, PrimitiveFileProducer, SetKind, StageControl, StageError, Subsystem,
};

const RECV_TIMEOUT: Duration = Duration::from_secs(2);

fn primitive_file(rows: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("temp file");
    file.write_all(rows.as_bytes()).expect("write rows");
    file
}

#[test]
fn configure_loads_and_wraps_the_primitives() {
    let file = primitive_file("100 5 102 7 5000 900 1 0\n40\t3\t41\t2\t1200\t300\t1\t0\n");
    let mut producer = PrimitiveFileProducer::new("producer");
    producer
        .configure(json!({
            "filename": file.path().to_str().unwrap(),
            "number_of_loops": 1,
            "source_id": 11,
        }))
        .unwrap();

    let set = producer.loaded().expect("set assembled at configure");
    assert_eq!(set.kind, SetKind::Payload);
    assert_eq!(set.objects.len(), 2);
    assert_eq!(set.objects[0].time_start, 100);
    assert_eq!(set.objects[0].adc_integral, 5000);
    assert_eq!(set.objects[1].channel, 2);
    // The envelope spans the loaded primitives.
    assert_eq!(set.start_time, 40);
    assert_eq!(set.end_time, 101);
    assert_eq!(set.origin.subsystem, Subsystem::Readout);
    assert_eq!(set.origin.element_id, 11);
}

#[test]
fn malformed_rows_are_rejected() {
    let file = primitive_file("100 5 102 7\n");
    let mut producer = PrimitiveFileProducer::new("producer");
    let err = producer
        .configure(json!({"filename": file.path().to_str().unwrap()}))
        .unwrap_err();
    assert!(matches!(
        err,
        StageError::InvalidConfig(ConfigError::MalformedRow { line: 1, .. })
    ));
}

#[test]
fn missing_file_is_an_io_error() {
    let mut producer = PrimitiveFileProducer::new("producer");
    let err = producer
        .configure(json!({"filename": "/nonexistent/primitives.txt"}))
        .unwrap_err();
    assert!(matches!(
        err,
        StageError::InvalidConfig(ConfigError::Io { .. })
    ));
}

#[test]
fn emits_one_copy_per_iteration() {
    let file = primitive_file("10 1 10 0 100 50 1 0\n20 1 20 1 200 60 1 0\n30 1 30 2 300 70 1 0\n");
    let (tx, rx) = channel(8);
    let mut producer = PrimitiveFileProducer::new("producer");
    producer.init(tx);
    producer
        .configure(json!({
            "filename": file.path().to_str().unwrap(),
            "number_of_loops": 3,
            "send_interval_ms": 10,
        }))
        .unwrap();
    producer.start().unwrap();

    for expected_seqno in 0..3u64 {
        let set = rx.recv(RECV_TIMEOUT).expect("producer emission");
        assert_eq!(set.seqno, expected_seqno);
        assert_eq!(set.objects.len(), 3);
    }
    producer.stop().unwrap();

    assert_eq!(producer.sent(), 3);
    assert_eq!(producer.generated(), 9);
    // The loop count is exhausted; nothing further arrives.
    assert!(rx.recv(Duration::from_millis(100)).is_err());
}

#[test]
fn empty_file_sends_nothing() {
    let file = primitive_file("");
    let (tx, rx) = channel(4);
    let mut producer = PrimitiveFileProducer::new("producer");
    producer.init(tx);
    producer
        .configure(json!({
            "filename": file.path().to_str().unwrap(),
            "number_of_loops": 2,
            "send_interval_ms": 5,
        }))
        .unwrap();
    producer.start().unwrap();
    std::thread::sleep(Duration::from_millis(60));
    producer.stop().unwrap();

    assert_eq!(producer.sent(), 0);
    assert!(rx.recv(Duration::from_millis(50)).is_err());
}
