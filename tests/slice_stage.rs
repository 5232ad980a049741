use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use windrow::{
    channel, Algorithm, AlgorithmError, AlgorithmFactory, Origin, Set, SetKind, Severity,
    SliceStage, StageControl, StageIssue, StageReceiver, Tick, TimeSliced,
};

const RECV_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Pulse {
    t: Tick,
}

impl TimeSliced for Pulse {
    fn time_start(&self) -> Tick {
        self.t
    }
}

fn payload(start: Tick, end: Tick, times: &[Tick]) -> Set<Pulse> {
    Set::payload(
        start,
        end,
        times.iter().map(|&t| Pulse { t }).collect(),
        Origin::default(),
    )
}

struct Identity;

impl Algorithm<Pulse, Pulse> for Identity {
    fn apply(&mut self, input: &Pulse, out: &mut Vec<Pulse>) -> Result<(), AlgorithmError> {
        out.push(*input);
        Ok(())
    }
}

struct Accumulating {
    held: Vec<Pulse>,
}

impl Algorithm<Pulse, Pulse> for Accumulating {
    fn apply(&mut self, input: &Pulse, _out: &mut Vec<Pulse>) -> Result<(), AlgorithmError> {
        self.held.push(*input);
        Ok(())
    }

    fn flush(&mut self, _end_time: Tick, out: &mut Vec<Pulse>) -> Result<(), AlgorithmError> {
        out.append(&mut self.held);
        Ok(())
    }
}

struct Fixture {
    stage: SliceStage<Pulse, Pulse>,
    input: windrow::StageSender<Set<Pulse>>,
    output: StageReceiver<Pulse>,
}

fn start_stage(factory: AlgorithmFactory<Pulse, Pulse>) -> Fixture {
    let (in_tx, in_rx) = channel(32);
    let (out_tx, out_rx) = channel(32);
    let mut stage = SliceStage::new("slice_stage", "test_algorithm", factory);
    stage.init(in_rx, out_tx);
    stage.configure(json!({})).unwrap();
    stage.start().unwrap();
    Fixture {
        stage,
        input: in_tx,
        output: out_rx,
    }
}

#[test]
fn complete_slices_drive_the_algorithm_in_time_order() {
    let mut fix = start_stage(Arc::new(|_| Ok(Box::new(Identity))));

    fix.input
        .send(payload(0, 100, &[30, 10]), RECV_TIMEOUT)
        .unwrap();
    fix.input
        .send(payload(100, 200, &[150]), RECV_TIMEOUT)
        .unwrap();

    // The first slice closes when the second arrives; its elements come out
    // individually and time-sorted.
    assert_eq!(fix.output.recv(RECV_TIMEOUT).unwrap(), Pulse { t: 10 });
    assert_eq!(fix.output.recv(RECV_TIMEOUT).unwrap(), Pulse { t: 30 });

    fix.stage.stop().unwrap();
}

#[test]
fn heartbeat_flushes_both_buffers() {
    let mut fix = start_stage(Arc::new(|_| Ok(Box::new(Accumulating { held: Vec::new() }))));

    fix.input
        .send(payload(0, 100, &[10]), RECV_TIMEOUT)
        .unwrap();
    fix.input
        .send(payload(0, 100, &[20]), RECV_TIMEOUT)
        .unwrap();
    fix.input
        .send(Set::heartbeat(100, 105, Origin::default()), RECV_TIMEOUT)
        .unwrap();

    // The heartbeat first flushes the input buffer through the algorithm
    // (which holds the elements), then flushes the algorithm itself.
    assert_eq!(fix.output.recv(RECV_TIMEOUT).unwrap(), Pulse { t: 10 });
    assert_eq!(fix.output.recv(RECV_TIMEOUT).unwrap(), Pulse { t: 20 });

    fix.stage.stop().unwrap();
    assert_eq!(fix.stage.report().sent, 2);
}

#[test]
fn unknown_sets_are_discarded() {
    let mut fix = start_stage(Arc::new(|_| Ok(Box::new(Identity))));

    let mut bogus = payload(0, 100, &[10]);
    bogus.kind = SetKind::Unknown;
    fix.input.send(bogus, RECV_TIMEOUT).unwrap();
    fix.input
        .send(payload(0, 100, &[40]), RECV_TIMEOUT)
        .unwrap();
    fix.input
        .send(Set::heartbeat(200, 205, Origin::default()), RECV_TIMEOUT)
        .unwrap();

    assert_eq!(fix.output.recv(RECV_TIMEOUT).unwrap(), Pulse { t: 40 });

    let records = fix.stage.issues().snapshot();
    assert!(records.iter().any(|record| {
        record.severity == Severity::Error && matches!(record.issue, StageIssue::UnknownSet { .. })
    }));

    fix.stage.stop().unwrap();
}

#[test]
fn stop_drops_the_buffered_slice_by_default() {
    let mut fix = start_stage(Arc::new(|_| Ok(Box::new(Identity))));

    fix.input
        .send(payload(0, 100, &[10]), RECV_TIMEOUT)
        .unwrap();
    // Wait for the worker to absorb it, then stop: the incomplete slice is
    // run through the algorithm but its outputs are dropped.
    let deadline = std::time::Instant::now() + RECV_TIMEOUT;
    while fix.stage.report().received < 1 {
        assert!(std::time::Instant::now() < deadline, "input never arrived");
        std::thread::sleep(Duration::from_millis(5));
    }
    fix.stage.stop().unwrap();

    assert_eq!(fix.stage.report().sent, 0);
    assert!(fix.output.recv(Duration::from_millis(100)).is_err());
}
