use windrow::{
    IssueLog, Origin, Set, Severity, StageIssue, TimeSliceInputBuffer, TriggerPrimitive,
};

fn tp(time_start: u64) -> TriggerPrimitive {
    TriggerPrimitive {
        time_start,
        ..Default::default()
    }
}

fn payload(start: u64, end: u64, times: &[u64]) -> Set<TriggerPrimitive> {
    Set::payload(
        start,
        end,
        times.iter().copied().map(tp).collect(),
        Origin::default(),
    )
}

#[test]
fn same_key_sets_merge_into_one_slice() {
    let issues = IssueLog::default();
    let mut buffer = TimeSliceInputBuffer::new("stage", issues);

    assert!(buffer.absorb(payload(0, 100, &[10])).is_none());
    assert!(buffer.absorb(payload(0, 100, &[50])).is_none());

    let slice = buffer
        .absorb(payload(100, 200, &[150]))
        .expect("new key should complete the slice");
    assert_eq!(slice.start_time, 0);
    assert_eq!(slice.end_time, 100);
    let times: Vec<u64> = slice.objects.iter().map(|o| o.time_start).collect();
    assert_eq!(times, vec![10, 50]);
}

#[test]
fn completed_slice_is_sorted_by_time_start() {
    let issues = IssueLog::default();
    let mut buffer = TimeSliceInputBuffer::new("stage", issues);

    buffer.absorb(payload(0, 100, &[50, 10, 30]));
    let slice = buffer.flush().expect("buffered slice");
    let times: Vec<u64> = slice.objects.iter().map(|o| o.time_start).collect();
    assert_eq!(times, vec![10, 30, 50]);
    assert!(buffer.is_empty());
}

#[test]
fn out_of_order_set_warns_and_is_still_handled() {
    let issues = IssueLog::default();
    let mut buffer = TimeSliceInputBuffer::new("stage", issues.clone());

    buffer.absorb(payload(200, 300, &[210]));
    let slice = buffer
        .absorb(payload(100, 200, &[110]))
        .expect("boundary crossing completes the buffered slice");
    assert_eq!(slice.start_time, 200);

    let records = issues.snapshot();
    assert!(records.iter().any(|record| {
        record.severity == Severity::Warning
            && matches!(
                record.issue,
                StageIssue::OutOfOrderSets {
                    previous: 200,
                    observed: 100,
                    ..
                }
            )
    }));

    // The tardy set became the new in-progress slice.
    let tardy = buffer.flush().expect("tardy slice buffered");
    assert_eq!(tardy.start_time, 100);
    assert_eq!(tardy.objects.len(), 1);
}

#[test]
fn flush_on_empty_buffer_returns_none() {
    let issues = IssueLog::default();
    let mut buffer: TimeSliceInputBuffer<TriggerPrimitive> =
        TimeSliceInputBuffer::new("stage", issues);
    assert!(buffer.flush().is_none());
}

#[test]
fn empty_payload_slice_never_completes() {
    let issues = IssueLog::default();
    let mut buffer = TimeSliceInputBuffer::new("stage", issues.clone());

    assert!(buffer.absorb(payload(0, 100, &[])).is_none());
    // With nothing buffered the next key simply installs itself; no empty
    // slice is released and no warning fires.
    assert!(buffer.absorb(payload(100, 200, &[150])).is_none());
    assert!(issues.snapshot().is_empty());

    let slice = buffer.flush().expect("non-empty slice buffered");
    assert_eq!(slice.start_time, 100);
}
