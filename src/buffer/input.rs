use crate::model::set::{Set, Tick, TimeSliced};
use crate::observability::issues::{IssueLog, Severity, StageIssue};

/// Complete, time-ordered slice released by the input buffer.
#[derive(Debug, Clone, PartialEq)]
pub struct TimeSlice<T> {
    pub objects: Vec<T>,
    pub start_time: Tick,
    pub end_time: Tick,
}

/// Reassembles payload sets that share one `[start_time, end_time)` key into
/// a single time-ordered slice.
///
/// Upstream producers each cover a fraction of a slice window, so the
/// fragments for one slice arrive as separate sets. A slice is complete once
/// a set with a different key shows up; the buffered elements are then
/// sorted by `time_start` and released, and the new set becomes the
/// in-progress slice.
pub struct TimeSliceInputBuffer<T> {
    stage: String,
    objects: Vec<T>,
    start_time: Tick,
    end_time: Tick,
    issues: IssueLog,
}

impl<T: TimeSliced> TimeSliceInputBuffer<T> {
    pub fn new(stage: impl Into<String>, issues: IssueLog) -> Self {
        Self {
            stage: stage.into(),
            objects: Vec::new(),
            start_time: 0,
            end_time: 0,
            issues,
        }
    }

    /// Accepts a payload set. Returns the completed prior slice when the
    /// incoming key differs from the buffered one, `None` while the set was
    /// merged into the in-progress slice.
    ///
    /// A set keyed earlier than the buffered slice is reported as
    /// `OutOfOrderSets` but still handled: slices are never reordered across
    /// their boundaries.
    pub fn absorb(&mut self, set: Set<T>) -> Option<TimeSlice<T>> {
        if self.objects.is_empty()
            || (set.start_time == self.start_time && set.end_time == self.end_time)
        {
            self.start_time = set.start_time;
            self.end_time = set.end_time;
            self.objects.extend(set.objects);
            return None;
        }
        if set.start_time < self.start_time {
            self.issues.record(
                Severity::Warning,
                StageIssue::OutOfOrderSets {
                    stage: self.stage.clone(),
                    previous: self.start_time,
                    observed: set.start_time,
                },
            );
        }
        let complete = self.flush();
        self.start_time = set.start_time;
        self.end_time = set.end_time;
        self.objects = set.objects;
        complete
    }

    /// Releases the in-progress slice, sorted by element `time_start`.
    pub fn flush(&mut self) -> Option<TimeSlice<T>> {
        if self.objects.is_empty() {
            return None;
        }
        let mut objects = std::mem::take(&mut self.objects);
        objects.sort_by_key(|obj| obj.time_start());
        Some(TimeSlice {
            objects,
            start_time: self.start_time,
            end_time: self.end_time,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }
}
