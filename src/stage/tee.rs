use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use serde_json::Value;

use crate::config::StageConfig;
use crate::model::set::Set;
use crate::observability::issues::{IssueLog, Severity, StageCounters, StageIssue, StageReport};
use crate::stage::channel::{RecvError, SendError, StageReceiver, StageSender};
use crate::stage::core::{StageControl, StageError};

/// Fans a set stream out to every bound sink.
///
/// Each input is cloned per sink; a sink that stays full past the queue
/// timeout loses its copy while the others still receive theirs. The tee
/// holds no buffers, so there is nothing to drain at stop.
pub struct SetTee<T> {
    name: String,
    input: Option<StageReceiver<Set<T>>>,
    sinks: Vec<StageSender<Set<T>>>,
    conf: Option<StageConfig>,
    running: Arc<AtomicBool>,
    join: Option<JoinHandle<StageReceiver<Set<T>>>>,
    counters: StageCounters,
    issues: IssueLog,
}

impl<T> SetTee<T>
where
    T: Clone + Send + 'static,
{
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            input: None,
            sinks: Vec::new(),
            conf: None,
            running: Arc::new(AtomicBool::new(false)),
            join: None,
            counters: StageCounters::default(),
            issues: IssueLog::default(),
        }
    }

    /// Binds the input receiver and the downstream sinks.
    pub fn init(&mut self, input: StageReceiver<Set<T>>, sinks: Vec<StageSender<Set<T>>>) {
        self.input = Some(input);
        self.sinks = sinks;
    }

    pub fn report(&self) -> StageReport {
        self.counters.report()
    }

    pub fn issues(&self) -> IssueLog {
        self.issues.clone()
    }

    fn is_running(&self) -> bool {
        self.join.is_some()
    }
}

impl<T> StageControl for SetTee<T>
where
    T: Clone + Send + 'static,
{
    fn configure(&mut self, conf: Value) -> Result<(), StageError> {
        if self.is_running() {
            return Err(StageError::AlreadyRunning);
        }
        self.conf = Some(StageConfig::from_value(&conf)?);
        Ok(())
    }

    fn start(&mut self) -> Result<(), StageError> {
        if self.is_running() {
            return Err(StageError::AlreadyRunning);
        }
        let conf = self.conf.clone().ok_or(StageError::NotConfigured)?;
        let input = self.input.take().ok_or(StageError::NotInitialized)?;
        let sinks = self.sinks.clone();
        self.counters.reset();
        self.running.store(true, Ordering::Relaxed);
        let running = self.running.clone();
        let counters = self.counters.clone();
        let issues = self.issues.clone();
        let name = self.name.clone();
        let join = thread::Builder::new()
            .name(self.name.clone())
            .spawn(move || run_tee(name, conf, input, sinks, running, counters, issues))
            .expect("failed to spawn tee worker");
        self.join = Some(join);
        Ok(())
    }

    fn stop(&mut self) -> Result<(), StageError> {
        let join = self.join.take().ok_or(StageError::NotRunning)?;
        self.running.store(false, Ordering::Relaxed);
        let input = join.join().map_err(|_| StageError::WorkerPanicked)?;
        self.input = Some(input);
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

fn run_tee<T: Clone>(
    name: String,
    conf: StageConfig,
    input: StageReceiver<Set<T>>,
    sinks: Vec<StageSender<Set<T>>>,
    running: Arc<AtomicBool>,
    counters: StageCounters,
    issues: IssueLog,
) -> StageReceiver<Set<T>> {
    let timeout = conf.queue_timeout();
    loop {
        match input.recv(timeout) {
            Ok(set) => {
                counters.record_received();
                for sink in &sinks {
                    match sink.send(set.clone(), timeout) {
                        Ok(()) => counters.record_sent(),
                        Err(SendError::TimedOut(_)) | Err(SendError::Closed(_)) => {
                            issues.record(
                                Severity::Error,
                                StageIssue::FailedToSend {
                                    stage: name.clone(),
                                    algorithm: "tee".to_string(),
                                },
                            );
                        }
                    }
                }
            }
            Err(RecvError::TimedOut) => {
                if !running.load(Ordering::Relaxed) {
                    break;
                }
            }
            Err(RecvError::Closed) => break,
        }
    }
    let report = counters.report();
    log::info!(
        "{name}: tee exiting, received {} sets and successfully sent {} copies",
        report.received,
        report.sent
    );
    input
}
