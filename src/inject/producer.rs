use std::fs;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use serde_json::Value;

use crate::config::{ConfigError, ProducerConfig};
use crate::model::primitive::TriggerPrimitive;
use crate::model::set::{Origin, Set, Subsystem, TimeSliced};
use crate::stage::channel::{SendError, StageSender};
use crate::stage::core::{StageControl, StageError};

/// File-driven test producer: reads primitives at configure time, then emits
/// the assembled set once per interval for a configured number of
/// iterations.
///
/// Only used to drive stages in tests and commissioning setups; it has no
/// windowing of its own. Sends block up to the queue timeout and are retried
/// until delivered or stopped.
pub struct PrimitiveFileProducer {
    name: String,
    sink: Option<StageSender<Set<TriggerPrimitive>>>,
    conf: Option<ProducerConfig>,
    template: Option<Set<TriggerPrimitive>>,
    running: Arc<AtomicBool>,
    join: Option<JoinHandle<()>>,
    generated: Arc<AtomicU64>,
    sent: Arc<AtomicU64>,
}

impl PrimitiveFileProducer {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            sink: None,
            conf: None,
            template: None,
            running: Arc::new(AtomicBool::new(false)),
            join: None,
            generated: Arc::new(AtomicU64::new(0)),
            sent: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Binds the output sender.
    pub fn init(&mut self, sink: StageSender<Set<TriggerPrimitive>>) {
        self.sink = Some(sink);
    }

    /// Primitives loaded by the last `configure`, if any.
    pub fn loaded(&self) -> Option<&Set<TriggerPrimitive>> {
        self.template.as_ref()
    }

    pub fn generated(&self) -> u64 {
        self.generated.load(Ordering::Relaxed)
    }

    pub fn sent(&self) -> u64 {
        self.sent.load(Ordering::Relaxed)
    }

    fn is_running(&self) -> bool {
        self.join.is_some()
    }
}

impl StageControl for PrimitiveFileProducer {
    fn configure(&mut self, conf: Value) -> Result<(), StageError> {
        if self.is_running() {
            return Err(StageError::AlreadyRunning);
        }
        let parsed = ProducerConfig::from_value(&conf)?;
        let primitives = read_primitive_file(&parsed.filename)?;
        self.template = Some(assemble_set(primitives, parsed.source_id));
        self.conf = Some(parsed);
        Ok(())
    }

    fn start(&mut self) -> Result<(), StageError> {
        if self.is_running() {
            return Err(StageError::AlreadyRunning);
        }
        let conf = self.conf.clone().ok_or(StageError::NotConfigured)?;
        let template = self.template.clone().ok_or(StageError::NotConfigured)?;
        let sink = self.sink.clone().ok_or(StageError::NotInitialized)?;
        self.generated.store(0, Ordering::Relaxed);
        self.sent.store(0, Ordering::Relaxed);
        self.running.store(true, Ordering::Relaxed);
        let running = self.running.clone();
        let generated = self.generated.clone();
        let sent = self.sent.clone();
        let name = self.name.clone();
        let join = thread::Builder::new()
            .name(self.name.clone())
            .spawn(move || {
                run_producer(name, conf, template, sink, running, generated, sent);
            })
            .expect("failed to spawn producer worker");
        self.join = Some(join);
        Ok(())
    }

    fn stop(&mut self) -> Result<(), StageError> {
        let join = self.join.take().ok_or(StageError::NotRunning)?;
        self.running.store(false, Ordering::Relaxed);
        join.join().map_err(|_| StageError::WorkerPanicked)?;
        Ok(())
    }

    fn scrap(&mut self) -> Result<(), StageError> {
        if self.is_running() {
            return Err(StageError::AlreadyRunning);
        }
        self.conf = None;
        self.template = None;
        Ok(())
    }
}

fn run_producer(
    name: String,
    conf: ProducerConfig,
    template: Set<TriggerPrimitive>,
    sink: StageSender<Set<TriggerPrimitive>>,
    running: Arc<AtomicBool>,
    generated: Arc<AtomicU64>,
    sent: Arc<AtomicU64>,
) {
    let mut iteration = 0u64;
    'produce: while running.load(Ordering::Relaxed) && iteration < conf.number_of_loops {
        thread::sleep(conf.send_interval());
        if !running.load(Ordering::Relaxed) {
            break;
        }
        if template.objects.is_empty() {
            log::warn!("{name}: primitive set is empty, nothing to send");
            iteration += 1;
            continue;
        }
        let mut set = template.clone();
        set.seqno = iteration;
        generated.fetch_add(template.objects.len() as u64, Ordering::Relaxed);
        loop {
            match sink.send(set, conf.queue_timeout()) {
                Ok(()) => {
                    sent.fetch_add(1, Ordering::Relaxed);
                    break;
                }
                Err(SendError::TimedOut(returned)) => {
                    if !running.load(Ordering::Relaxed) {
                        break 'produce;
                    }
                    set = returned;
                }
                Err(SendError::Closed(_)) => {
                    log::warn!("{name}: sink closed, stopping early");
                    break 'produce;
                }
            }
        }
        iteration += 1;
    }
    log::info!(
        "{name}: producer exiting, generated {} primitives and successfully sent {} sets",
        generated.load(Ordering::Relaxed),
        sent.load(Ordering::Relaxed)
    );
}

fn read_primitive_file(path: &str) -> Result<Vec<TriggerPrimitive>, ConfigError> {
    let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_string(),
        source,
    })?;
    let mut primitives = Vec::new();
    for (index, line) in contents.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let tp = parse_row(line).ok_or(ConfigError::MalformedRow {
            path: path.to_string(),
            line: index + 1,
        })?;
        primitives.push(tp);
    }
    Ok(primitives)
}

/// Parses one tab- or space-separated row of the eight primitive columns.
fn parse_row(line: &str) -> Option<TriggerPrimitive> {
    let mut fields = line.split_whitespace();
    let tp = TriggerPrimitive {
        time_start: fields.next()?.parse().ok()?,
        time_over_threshold: fields.next()?.parse().ok()?,
        time_peak: fields.next()?.parse().ok()?,
        channel: fields.next()?.parse().ok()?,
        adc_integral: fields.next()?.parse().ok()?,
        adc_peak: fields.next()?.parse().ok()?,
        detid: fields.next()?.parse().ok()?,
        kind: fields.next()?.parse().ok()?,
    };
    if fields.next().is_some() {
        return None;
    }
    Some(tp)
}

/// Wraps the loaded primitives in a payload set spanning their times.
fn assemble_set(primitives: Vec<TriggerPrimitive>, source_id: u32) -> Set<TriggerPrimitive> {
    let start_time = primitives.iter().map(|tp| tp.time_start()).min().unwrap_or(0);
    let end_time = primitives
        .iter()
        .map(|tp| tp.time_start())
        .max()
        .map(|t| t + 1)
        .unwrap_or(0);
    Set::payload(
        start_time,
        end_time,
        primitives,
        Origin::new(Subsystem::Readout, source_id),
    )
}
