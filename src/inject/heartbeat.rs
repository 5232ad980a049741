use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use serde_json::Value;

use crate::config::{HeartbeatConfig, DEFAULT_QUEUE_TIMEOUT_MS};
use crate::model::set::{Origin, Set, Subsystem, Tick};
use crate::stage::channel::{SendError, StageSender};
use crate::stage::core::{StageControl, StageError};

/// Source of the estimated current tick.
///
/// Tests inject deterministic implementations; production uses
/// [`SystemTickClock`].
pub trait TickClock: Send {
    fn now_ticks(&mut self) -> Tick;
}

/// Monotonic wall-clock scaled to ticks by the configured frequency.
pub struct SystemTickClock {
    origin: Instant,
    clock_frequency_hz: u64,
}

impl SystemTickClock {
    pub fn new(clock_frequency_hz: u64) -> Self {
        Self {
            origin: Instant::now(),
            clock_frequency_hz,
        }
    }
}

impl TickClock for SystemTickClock {
    fn now_ticks(&mut self) -> Tick {
        let elapsed = self.origin.elapsed().as_nanos();
        let ticks = elapsed.saturating_mul(self.clock_frequency_hz as u128) / 1_000_000_000;
        ticks.min(u128::from(u64::MAX)) as Tick
    }
}

/// Emits heartbeat markers on a fixed cadence so downstream stages make
/// progress through data lulls.
///
/// Consecutive markers tile the timeline: each covers
/// `[previous_mark, now - offset)`, where the offset keeps the markers
/// safely behind the newest real data.
pub struct HeartbeatInjector<T> {
    name: String,
    sink: Option<StageSender<Set<T>>>,
    conf: Option<HeartbeatConfig>,
    clock: Option<Box<dyn TickClock>>,
    running: Arc<AtomicBool>,
    join: Option<JoinHandle<Box<dyn TickClock>>>,
    sent: Arc<AtomicU64>,
}

impl<T> HeartbeatInjector<T>
where
    T: Send + 'static,
{
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            sink: None,
            conf: None,
            clock: None,
            running: Arc::new(AtomicBool::new(false)),
            join: None,
            sent: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Binds the output sender.
    pub fn init(&mut self, sink: StageSender<Set<T>>) {
        self.sink = Some(sink);
    }

    /// Replaces the tick source; defaults to a [`SystemTickClock`] built
    /// from the configured frequency at `start`.
    pub fn set_clock(&mut self, clock: Box<dyn TickClock>) {
        self.clock = Some(clock);
    }

    pub fn sent(&self) -> u64 {
        self.sent.load(Ordering::Relaxed)
    }

    fn is_running(&self) -> bool {
        self.join.is_some()
    }
}

impl<T> StageControl for HeartbeatInjector<T>
where
    T: Send + 'static,
{
    fn configure(&mut self, conf: Value) -> Result<(), StageError> {
        if self.is_running() {
            return Err(StageError::AlreadyRunning);
        }
        self.conf = Some(HeartbeatConfig::from_value(&conf)?);
        Ok(())
    }

    fn start(&mut self) -> Result<(), StageError> {
        if self.is_running() {
            return Err(StageError::AlreadyRunning);
        }
        let conf = self.conf.clone().ok_or(StageError::NotConfigured)?;
        let sink = self.sink.clone().ok_or(StageError::NotInitialized)?;
        let mut clock = self
            .clock
            .take()
            .unwrap_or_else(|| Box::new(SystemTickClock::new(conf.clock_frequency_hz)));
        self.sent.store(0, Ordering::Relaxed);
        self.running.store(true, Ordering::Relaxed);
        let running = self.running.clone();
        let sent = self.sent.clone();
        let name = self.name.clone();
        let join = thread::Builder::new()
            .name(self.name.clone())
            .spawn(move || {
                run_injector(&name, &conf, sink, running, sent, clock.as_mut());
                clock
            })
            .expect("failed to spawn heartbeat worker");
        self.join = Some(join);
        Ok(())
    }

    fn stop(&mut self) -> Result<(), StageError> {
        let join = self.join.take().ok_or(StageError::NotRunning)?;
        self.running.store(false, Ordering::Relaxed);
        let clock = join.join().map_err(|_| StageError::WorkerPanicked)?;
        self.clock = Some(clock);
        Ok(())
    }

    fn scrap(&mut self) -> Result<(), StageError> {
        if self.is_running() {
            return Err(StageError::AlreadyRunning);
        }
        self.conf = None;
        Ok(())
    }
}

fn run_injector<T>(
    name: &str,
    conf: &HeartbeatConfig,
    sink: StageSender<Set<T>>,
    running: Arc<AtomicBool>,
    sent: Arc<AtomicU64>,
    clock: &mut dyn TickClock,
) {
    let origin = Origin::new(Subsystem::Trigger, conf.source_id);
    let offset = conf.send_offset_ticks();
    let interval = conf.send_interval();
    let timeout = Duration::from_millis(DEFAULT_QUEUE_TIMEOUT_MS);
    let mut previous = clock.now_ticks().saturating_sub(offset);
    while running.load(Ordering::Relaxed) {
        thread::sleep(interval);
        if !running.load(Ordering::Relaxed) {
            break;
        }
        // Never regress, even if the offset outruns a slow clock.
        let mark = clock.now_ticks().saturating_sub(offset).max(previous);
        let heartbeat = Set::heartbeat(previous, mark, origin);
        match sink.send(heartbeat, timeout) {
            Ok(()) => {
                sent.fetch_add(1, Ordering::Relaxed);
                previous = mark;
            }
            Err(SendError::TimedOut(_)) => {
                // The next heartbeat covers this span as well.
                log::warn!("{name}: heartbeat send timed out, marker dropped");
            }
            Err(SendError::Closed(_)) => {
                log::warn!("{name}: sink closed, stopping early");
                break;
            }
        }
    }
    log::info!(
        "{name}: heartbeat injector exiting after {} markers",
        sent.load(Ordering::Relaxed)
    );
}
