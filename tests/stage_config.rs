use std::time::Duration;

use serde_json::json;
use windrow::{
    HeartbeatConfig, ProducerConfig, StageConfig, DEFAULT_BUFFER_TIME, DEFAULT_WINDOW_TIME,
};

#[test]
fn stage_defaults_from_an_empty_blob() {
    let conf = StageConfig::from_value(&json!({})).unwrap();
    assert_eq!(conf.window_time, DEFAULT_WINDOW_TIME);
    assert_eq!(conf.buffer_time, DEFAULT_BUFFER_TIME);
    assert_eq!(conf.source_id, 0);
    assert_eq!(conf.queue_timeout(), Duration::from_millis(100));
    assert!(conf.drop_on_drain);
    assert!(conf.algorithm.is_null());
}

#[test]
fn stage_values_override_the_defaults() {
    let conf = StageConfig::from_value(&json!({
        "window_time": 1000,
        "buffer_time": 250,
        "source_id": 42,
        "queue_timeout_ms": 20,
        "drop_on_drain": false,
        "algorithm": {"prescale": 5},
    }))
    .unwrap();
    assert_eq!(conf.window_time, 1000);
    assert_eq!(conf.buffer_time, 250);
    assert_eq!(conf.source_id, 42);
    assert_eq!(conf.queue_timeout(), Duration::from_millis(20));
    assert!(!conf.drop_on_drain);
    assert_eq!(conf.algorithm["prescale"], 5);
}

#[test]
fn unknown_keys_are_ignored() {
    let conf = StageConfig::from_value(&json!({"window_time": 500, "frobnicate": true})).unwrap();
    assert_eq!(conf.window_time, 500);
}

#[test]
fn mistyped_keys_are_rejected() {
    assert!(StageConfig::from_value(&json!({"window_time": "wide"})).is_err());
    assert!(StageConfig::from_value(&json!([1, 2, 3])).is_err());
}

#[test]
fn heartbeat_cadence_and_offset_derive_from_the_clock() {
    let conf = HeartbeatConfig::from_value(&json!({
        "heartbeat_interval": 10_000,
        "clock_frequency_hz": 1_000_000,
        "heartbeat_send_offset_ms": 25,
    }))
    .unwrap();
    assert_eq!(conf.send_interval(), Duration::from_millis(10));
    assert_eq!(conf.send_offset_ticks(), 25_000);
}

#[test]
fn heartbeat_defaults_match_the_catalog() {
    let conf = HeartbeatConfig::from_value(&json!({})).unwrap();
    assert_eq!(conf.heartbeat_interval, 5_000);
    assert_eq!(conf.clock_frequency_hz, 62_500_000);
    assert_eq!(conf.heartbeat_send_offset_ms, 0);
}

#[test]
fn producer_requires_a_filename() {
    assert!(ProducerConfig::from_value(&json!({})).is_err());
    let conf = ProducerConfig::from_value(&json!({"filename": "tps.txt"})).unwrap();
    assert_eq!(conf.number_of_loops, 1);
    assert_eq!(conf.send_interval(), Duration::from_millis(1000));
}
