use std::collections::{BTreeMap, VecDeque};

use crate::model::set::{Set, Tick, TimeSliced};

/// Groups outgoing elements into fixed-width windows aligned to the global
/// grid `{k * window_time}` and releases each window once logical time has
/// moved far enough past its end.
///
/// The watermark is the maximum `time_start` seen from inserted elements and
/// queued heartbeats. Window `[k*w, (k+1)*w)` is closed when
/// `watermark >= (k+1)*w + buffer_time`. Heartbeat markers interleave with
/// payload windows in ascending `start_time`; a payload window wins a tie.
///
/// `ready` gates normal operation; `flush` pops the time-earliest pending
/// item unconditionally so a draining worker can empty the buffer.
pub struct TimeSliceOutputBuffer<T> {
    window_time: Tick,
    buffer_time: Tick,
    windows: BTreeMap<u64, Vec<T>>,
    heartbeats: VecDeque<Set<T>>,
    watermark: Tick,
}

impl<T: TimeSliced> TimeSliceOutputBuffer<T> {
    pub fn new(window_time: Tick, buffer_time: Tick) -> Self {
        assert!(window_time > 0, "window time must be > 0");
        Self {
            window_time,
            buffer_time,
            windows: BTreeMap::new(),
            heartbeats: VecDeque::new(),
            watermark: 0,
        }
    }

    pub fn set_window_time(&mut self, window_time: Tick) {
        assert!(window_time > 0, "window time must be > 0");
        self.window_time = window_time;
    }

    pub fn set_buffer_time(&mut self, buffer_time: Tick) {
        self.buffer_time = buffer_time;
    }

    /// Inserts elements into their grid windows and advances the watermark.
    pub fn buffer(&mut self, elems: Vec<T>) {
        for elem in elems {
            let time = elem.time_start();
            self.watermark = self.watermark.max(time);
            self.windows
                .entry(time / self.window_time)
                .or_default()
                .push(elem);
        }
    }

    /// Queues a heartbeat marker and advances the watermark to its start.
    pub fn buffer_heartbeat(&mut self, heartbeat: Set<T>) {
        self.watermark = self.watermark.max(heartbeat.start_time);
        self.heartbeats.push_back(heartbeat);
    }

    /// Whether the time-earliest pending item may be released.
    pub fn ready(&self) -> bool {
        match self.next_pending() {
            Some(Pending::Window(index)) => {
                let end = (index + 1).saturating_mul(self.window_time);
                self.watermark >= end.saturating_add(self.buffer_time)
            }
            // A heartbeat at the front of time order has nothing left to
            // wait for.
            Some(Pending::Heartbeat) => true,
            None => false,
        }
    }

    /// Pops the time-earliest pending item: a payload set covering one grid
    /// window with elements sorted by `time_start`, or a heartbeat marker.
    pub fn flush(&mut self) -> Option<Set<T>> {
        match self.next_pending()? {
            Pending::Window(index) => {
                let mut objects = self.windows.remove(&index).unwrap_or_default();
                objects.sort_by_key(|obj| obj.time_start());
                let start_time = index.saturating_mul(self.window_time);
                let end_time = start_time.saturating_add(self.window_time);
                Some(Set::payload(
                    start_time,
                    end_time,
                    objects,
                    Default::default(),
                ))
            }
            Pending::Heartbeat => self.heartbeats.pop_front(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.windows.is_empty() && self.heartbeats.is_empty()
    }

    pub fn reset(&mut self) {
        self.windows.clear();
        self.heartbeats.clear();
        self.watermark = 0;
    }

    /// Highest tick observed so far.
    pub fn watermark(&self) -> Tick {
        self.watermark
    }

    fn next_pending(&self) -> Option<Pending> {
        let window = self.windows.keys().next().copied();
        let heartbeat = self.heartbeats.front().map(|hb| hb.start_time);
        match (window, heartbeat) {
            (Some(index), Some(hb_start)) => {
                if index.saturating_mul(self.window_time) <= hb_start {
                    Some(Pending::Window(index))
                } else {
                    Some(Pending::Heartbeat)
                }
            }
            (Some(index), None) => Some(Pending::Window(index)),
            (None, Some(_)) => Some(Pending::Heartbeat),
            (None, None) => None,
        }
    }
}

enum Pending {
    Window(u64),
    Heartbeat,
}
