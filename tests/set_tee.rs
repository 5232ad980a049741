use std::time::Duration;

use serde_json::json;
use windrow::{channel, Origin, Set, SetTee, StageControl, TriggerPrimitive};

const RECV_TIMEOUT: Duration = Duration::from_secs(2);

fn tp(time_start: u64) -> TriggerPrimitive {
    TriggerPrimitive {
        time_start,
        ..Default::default()
    }
}

#[test]
fn every_sink_receives_a_copy() {
    let (in_tx, in_rx) = channel(8);
    let (out_a_tx, out_a_rx) = channel(8);
    let (out_b_tx, out_b_rx) = channel(8);
    let mut tee = SetTee::new("tee");
    tee.init(in_rx, vec![out_a_tx, out_b_tx]);
    tee.configure(json!({})).unwrap();
    tee.start().unwrap();

    let set = Set::payload(0, 100, vec![tp(10), tp(20)], Origin::default());
    in_tx.send(set.clone(), RECV_TIMEOUT).unwrap();

    let copy_a = out_a_rx.recv(RECV_TIMEOUT).unwrap();
    let copy_b = out_b_rx.recv(RECV_TIMEOUT).unwrap();
    assert_eq!(copy_a, set);
    assert_eq!(copy_b, set);

    tee.stop().unwrap();
    assert_eq!(tee.report().received, 1);
    assert_eq!(tee.report().sent, 2);
}

#[test]
fn a_full_sink_loses_only_its_own_copy() {
    let (in_tx, in_rx) = channel(8);
    // One-slot sink that nobody drains, plus a healthy one.
    let (stuck_tx, _stuck_rx) = channel(1);
    let (out_tx, out_rx) = channel(8);
    let mut tee = SetTee::new("tee");
    tee.init(in_rx, vec![stuck_tx.clone(), out_tx]);
    tee.configure(json!({"queue_timeout_ms": 20})).unwrap();
    tee.start().unwrap();

    // Fill the stuck sink ahead of time.
    stuck_tx
        .send(Set::heartbeat(0, 0, Origin::default()), RECV_TIMEOUT)
        .unwrap();

    let set = Set::payload(0, 100, vec![tp(10)], Origin::default());
    in_tx.send(set.clone(), RECV_TIMEOUT).unwrap();

    assert_eq!(out_rx.recv(RECV_TIMEOUT).unwrap(), set);

    tee.stop().unwrap();
    assert_eq!(tee.report().received, 1);
    assert_eq!(tee.report().sent, 1);
    assert!(!tee.issues().snapshot().is_empty());
}

#[test]
fn tee_restarts_after_stop() {
    let (in_tx, in_rx) = channel(8);
    let (out_tx, out_rx) = channel(8);
    let mut tee = SetTee::new("tee");
    tee.init(in_rx, vec![out_tx]);
    tee.configure(json!({})).unwrap();

    tee.start().unwrap();
    tee.stop().unwrap();
    tee.start().unwrap();

    let set: Set<TriggerPrimitive> = Set::heartbeat(10, 20, Origin::default());
    in_tx.send(set.clone(), RECV_TIMEOUT).unwrap();
    assert_eq!(out_rx.recv(RECV_TIMEOUT).unwrap(), set);
    tee.stop().unwrap();
}
