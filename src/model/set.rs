use serde::{Deserialize, Serialize};

/// Logical timestamp in ticks. Conversion to wall-clock time is a
/// collaborator concern; inside the pipeline all time is tick-valued.
pub type Tick = u64;

/// Element id marking an origin that has not been assigned one.
pub const INVALID_ELEMENT_ID: u32 = u32::MAX;

/// Discriminates the three envelope flavors on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SetKind {
    Payload,
    Heartbeat,
    Unknown,
}

/// Subsystem that produced a set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Subsystem {
    Unknown,
    Readout,
    Trigger,
}

/// Identifies the producer of a set: subsystem plus element id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Origin {
    pub subsystem: Subsystem,
    pub element_id: u32,
}

impl Origin {
    pub fn new(subsystem: Subsystem, element_id: u32) -> Self {
        Self {
            subsystem,
            element_id,
        }
    }
}

impl Default for Origin {
    fn default() -> Self {
        Self {
            subsystem: Subsystem::Unknown,
            element_id: INVALID_ELEMENT_ID,
        }
    }
}

/// Behavior required of any element that can be placed on the timeline.
pub trait TimeSliced {
    /// Tick at which the element starts.
    fn time_start(&self) -> Tick;
}

/// Time-tagged envelope covering the half-open interval `[start_time, end_time)`.
///
/// Payload sets carry elements whose `time_start` falls inside the interval;
/// heartbeat sets are empty and exist only to advance logical time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Set<T> {
    pub kind: SetKind,
    pub seqno: u64,
    pub origin: Origin,
    pub start_time: Tick,
    pub end_time: Tick,
    pub objects: Vec<T>,
}

impl<T> Set<T> {
    /// Builds a payload set over `[start_time, end_time)`.
    pub fn payload(start_time: Tick, end_time: Tick, objects: Vec<T>, origin: Origin) -> Self {
        Self {
            kind: SetKind::Payload,
            seqno: 0,
            origin,
            start_time,
            end_time,
            objects,
        }
    }

    /// Builds an empty heartbeat marker over `[start_time, end_time)`.
    pub fn heartbeat(start_time: Tick, end_time: Tick, origin: Origin) -> Self {
        Self {
            kind: SetKind::Heartbeat,
            seqno: 0,
            origin,
            start_time,
            end_time,
            objects: Vec::new(),
        }
    }

    pub fn is_payload(&self) -> bool {
        self.kind == SetKind::Payload
    }

    pub fn is_heartbeat(&self) -> bool {
        self.kind == SetKind::Heartbeat
    }
}

impl<T: TimeSliced> Set<T> {
    /// Checks the envelope invariants: a coherent interval, emptiness for
    /// heartbeats, and containment of every element's `time_start`.
    pub fn is_well_formed(&self) -> bool {
        if self.start_time > self.end_time {
            return false;
        }
        match self.kind {
            SetKind::Heartbeat => self.objects.is_empty(),
            SetKind::Payload => self
                .objects
                .iter()
                .all(|obj| obj.time_start() >= self.start_time && obj.time_start() < self.end_time),
            SetKind::Unknown => true,
        }
    }
}
