use std::collections::VecDeque;
use std::sync::{Arc, Condvar, Mutex};
use std::time::{Duration, Instant};

use thiserror::Error;

/// Error returned when a timed send gives up; the item comes back to the
/// caller so it can decide whether to drop or retry.
#[derive(Debug)]
pub enum SendError<T> {
    TimedOut(T),
    Closed(T),
}

/// Error returned when a timed receive gives up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum RecvError {
    #[error("receive timed out")]
    TimedOut,
    #[error("channel closed")]
    Closed,
}

struct ChannelState<T> {
    buffer: VecDeque<T>,
    closed: bool,
    senders: usize,
}

struct ChannelShared<T> {
    capacity: usize,
    state: Mutex<ChannelState<T>>,
    not_empty: Condvar,
    not_full: Condvar,
}

impl<T> ChannelShared<T> {
    fn close(&self) {
        let mut guard = self.state.lock().unwrap();
        guard.closed = true;
        self.not_empty.notify_all();
        self.not_full.notify_all();
    }
}

/// Creates a bounded channel whose send and receive both block up to a
/// caller-supplied timeout.
///
/// Sends and receives are the only suspension points a stage worker has, so
/// both are bounded: a full queue holds the sender until space opens or the
/// timeout lapses, an empty queue holds the receiver likewise. Dropping the
/// last sender closes the channel; the receiver drains what is buffered and
/// then observes `Closed`.
pub fn channel<T>(capacity: usize) -> (StageSender<T>, StageReceiver<T>) {
    assert!(capacity > 0, "channel capacity must be > 0");
    let shared = Arc::new(ChannelShared {
        capacity,
        state: Mutex::new(ChannelState {
            buffer: VecDeque::with_capacity(capacity),
            closed: false,
            senders: 1,
        }),
        not_empty: Condvar::new(),
        not_full: Condvar::new(),
    });
    (
        StageSender {
            shared: shared.clone(),
        },
        StageReceiver { shared },
    )
}

/// Sending half of a stage channel. Clonable so multiple producers can feed
/// one stage.
pub struct StageSender<T> {
    shared: Arc<ChannelShared<T>>,
}

impl<T> StageSender<T> {
    /// Moves `item` into the channel, blocking while full up to `timeout`.
    pub fn send(&self, item: T, timeout: Duration) -> Result<(), SendError<T>> {
        let deadline = Instant::now() + timeout;
        let mut guard = self.shared.state.lock().unwrap();
        loop {
            if guard.closed {
                return Err(SendError::Closed(item));
            }
            if guard.buffer.len() < self.shared.capacity {
                guard.buffer.push_back(item);
                self.shared.not_empty.notify_one();
                return Ok(());
            }
            let now = Instant::now();
            if now >= deadline {
                return Err(SendError::TimedOut(item));
            }
            let (next_guard, wait) = self
                .shared
                .not_full
                .wait_timeout(guard, deadline - now)
                .unwrap();
            guard = next_guard;
            if wait.timed_out() && guard.buffer.len() >= self.shared.capacity {
                return Err(SendError::TimedOut(item));
            }
        }
    }

    /// Closes the channel for every endpoint; pending items stay readable.
    pub fn close(&self) {
        self.shared.close();
    }
}

impl<T> Clone for StageSender<T> {
    fn clone(&self) -> Self {
        let mut guard = self.shared.state.lock().unwrap();
        guard.senders += 1;
        drop(guard);
        Self {
            shared: self.shared.clone(),
        }
    }
}

impl<T> Drop for StageSender<T> {
    fn drop(&mut self) {
        let mut guard = self.shared.state.lock().unwrap();
        guard.senders -= 1;
        let last = guard.senders == 0;
        if last {
            guard.closed = true;
        }
        drop(guard);
        if last {
            self.shared.not_empty.notify_all();
            self.shared.not_full.notify_all();
        }
    }
}

/// Receiving half of a stage channel; owned by exactly one worker.
pub struct StageReceiver<T> {
    shared: Arc<ChannelShared<T>>,
}

impl<T> Drop for StageReceiver<T> {
    fn drop(&mut self) {
        self.shared.close();
    }
}

impl<T> StageReceiver<T> {
    /// Takes the next item, blocking while empty up to `timeout`.
    ///
    /// `Closed` is only reported once the buffer is drained, so no input is
    /// lost when producers disappear.
    pub fn recv(&self, timeout: Duration) -> Result<T, RecvError> {
        let deadline = Instant::now() + timeout;
        let mut guard = self.shared.state.lock().unwrap();
        loop {
            if let Some(item) = guard.buffer.pop_front() {
                self.shared.not_full.notify_one();
                return Ok(item);
            }
            if guard.closed {
                return Err(RecvError::Closed);
            }
            let now = Instant::now();
            if now >= deadline {
                return Err(RecvError::TimedOut);
            }
            let (next_guard, wait) = self
                .shared
                .not_empty
                .wait_timeout(guard, deadline - now)
                .unwrap();
            guard = next_guard;
            if wait.timed_out() && guard.buffer.is_empty() && !guard.closed {
                return Err(RecvError::TimedOut);
            }
        }
    }
}
