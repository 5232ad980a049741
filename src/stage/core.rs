use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use serde_json::Value;
use thiserror::Error;

use crate::algorithm::core::{Algorithm, AlgorithmError};
use crate::buffer::input::TimeSlice;
use crate::config::{ConfigError, StageConfig};
use crate::model::set::Tick;
use crate::observability::issues::{IssueLog, Severity, StageCounters, StageIssue, StageReport};
use crate::stage::channel::{RecvError, SendError, StageReceiver, StageSender};

/// Lifecycle surface common to every stage and collaborator.
///
/// `init` stays a typed per-stage method because it binds concrete channel
/// endpoints; the commands below all carry opaque blobs.
pub trait StageControl {
    /// Stashes configuration for the next `start`.
    fn configure(&mut self, conf: Value) -> Result<(), StageError>;
    /// Ingests the stashed configuration, builds a fresh algorithm, and
    /// launches the worker.
    fn start(&mut self) -> Result<(), StageError>;
    /// Signals the worker and joins it.
    fn stop(&mut self) -> Result<(), StageError>;
    /// Tears down stashed configuration.
    fn scrap(&mut self) -> Result<(), StageError>;
}

/// Lifecycle misuse and configuration failures.
///
/// Data-shaped conditions never surface here; they go through the issue log
/// and the worker keeps running.
#[derive(Debug, Error)]
pub enum StageError {
    #[error("stage endpoints have not been bound; call init first")]
    NotInitialized,
    #[error("stage has no stashed configuration; call configure first")]
    NotConfigured,
    #[error("stage is already running")]
    AlreadyRunning,
    #[error("stage is not running")]
    NotRunning,
    #[error(transparent)]
    InvalidConfig(#[from] ConfigError),
    #[error(transparent)]
    Algorithm(#[from] AlgorithmError),
    #[error("stage worker panicked; stage must be re-initialized")]
    WorkerPanicked,
}

/// Outcome of one bounded receive attempt.
pub(crate) enum Inbound<In> {
    Received(In),
    Idle,
    Closed,
}

/// Worker-side plumbing bundle: endpoints, counters, and the issue log.
///
/// Moved into the worker thread at `start`; the receiver travels back to the
/// stage through the join handle so the stage can be restarted.
pub(crate) struct StageCore<In, Out> {
    pub(crate) name: String,
    pub(crate) algorithm_name: String,
    input: StageReceiver<In>,
    output: StageSender<Out>,
    queue_timeout: Duration,
    pub(crate) counters: StageCounters,
    pub(crate) issues: IssueLog,
}

impl<In, Out> StageCore<In, Out> {
    pub(crate) fn new(
        name: String,
        algorithm_name: String,
        input: StageReceiver<In>,
        output: StageSender<Out>,
        queue_timeout: Duration,
        counters: StageCounters,
        issues: IssueLog,
    ) -> Self {
        Self {
            name,
            algorithm_name,
            input,
            output,
            queue_timeout,
            counters,
            issues,
        }
    }

    /// Pulls the next input. An idle timeout is not an error; it just gives
    /// the loop a chance to observe the running flag.
    pub(crate) fn recv(&self) -> Inbound<In> {
        match self.input.recv(self.queue_timeout) {
            Ok(item) => {
                self.counters.record_received();
                Inbound::Received(item)
            }
            Err(RecvError::TimedOut) => Inbound::Idle,
            Err(RecvError::Closed) => Inbound::Closed,
        }
    }

    /// Pushes one output downstream. A timed-out or closed send is reported
    /// and the output dropped; the worker never retries forever.
    pub(crate) fn send(&self, out: Out) -> bool {
        match self.output.send(out, self.queue_timeout) {
            Ok(()) => {
                self.counters.record_sent();
                true
            }
            Err(SendError::TimedOut(_)) | Err(SendError::Closed(_)) => {
                self.issues.record(
                    Severity::Error,
                    StageIssue::FailedToSend {
                        stage: self.name.clone(),
                        algorithm: self.algorithm_name.clone(),
                    },
                );
                false
            }
        }
    }

    pub(crate) fn record(&self, severity: Severity, issue: StageIssue) {
        self.issues.record(severity, issue);
    }

    fn into_receiver(self) -> StageReceiver<In> {
        self.input
    }
}

/// Mode-specific half of a worker: how inputs are processed and how leftover
/// state is drained at exit.
pub(crate) trait Processor<In, Out>: Send {
    fn process(&mut self, input: In, core: &StageCore<In, Out>);
    fn drain(&mut self, drop: bool, core: &StageCore<In, Out>);
}

/// Common worker loop: pull until told to stop, then drain.
///
/// A user stop drains with the configured drop policy (stale partial
/// windows are dropped by default); a closed input channel is clean
/// end-of-stream and forwards leftovers instead.
pub(crate) fn run_worker<In, Out, P>(
    core: StageCore<In, Out>,
    running: Arc<AtomicBool>,
    mut processor: P,
    drop_on_drain: bool,
) -> StageReceiver<In>
where
    P: Processor<In, Out>,
{
    loop {
        match core.recv() {
            Inbound::Received(input) => processor.process(input, &core),
            Inbound::Idle => {
                if !running.load(Ordering::Relaxed) {
                    processor.drain(drop_on_drain, &core);
                    break;
                }
            }
            Inbound::Closed => {
                processor.drain(false, &core);
                break;
            }
        }
    }
    let report = core.counters.report();
    log::info!(
        "{}: worker exiting, received {} inputs and successfully sent {} outputs",
        core.name,
        report.received,
        report.sent
    );
    core.into_receiver()
}

/// Runs the algorithm over a complete slice in time order.
///
/// A failing invocation is reported as fatal, its partial outputs are
/// rolled back, and the rest of the slice is abandoned; the worker moves on
/// to the next input.
pub(crate) fn apply_slice<A, B>(
    algorithm: &mut dyn Algorithm<A, B>,
    slice: &TimeSlice<A>,
    out: &mut Vec<B>,
    stage: &str,
    algorithm_name: &str,
    issues: &IssueLog,
) {
    for input in &slice.objects {
        let mark = out.len();
        if algorithm.apply(input, out).is_err() {
            out.truncate(mark);
            issues.record(
                Severity::Fatal,
                StageIssue::AlgorithmFatal {
                    stage: stage.to_string(),
                    algorithm: algorithm_name.to_string(),
                },
            );
            return;
        }
    }
}

/// Asks the algorithm to release buffered state up to `end_time`.
pub(crate) fn flush_algorithm<A, B>(
    algorithm: &mut dyn Algorithm<A, B>,
    end_time: Tick,
    out: &mut Vec<B>,
    stage: &str,
    algorithm_name: &str,
    issues: &IssueLog,
) {
    let mark = out.len();
    if algorithm.flush(end_time, out).is_err() {
        out.truncate(mark);
        issues.record(
            Severity::Fatal,
            StageIssue::AlgorithmFatal {
                stage: stage.to_string(),
                algorithm: algorithm_name.to_string(),
            },
        );
    }
}

/// Lifecycle state shared by the concrete stages: endpoints, stashed
/// configuration, the running flag, and the worker join handle.
pub(crate) struct StageHarness<In, Out> {
    pub(crate) name: String,
    pub(crate) algorithm_name: String,
    endpoints: Option<(StageReceiver<In>, StageSender<Out>)>,
    output_keepalive: Option<StageSender<Out>>,
    pub(crate) conf: Option<StageConfig>,
    running: Arc<AtomicBool>,
    join: Option<JoinHandle<StageReceiver<In>>>,
    pub(crate) counters: StageCounters,
    pub(crate) issues: IssueLog,
}

impl<In, Out> StageHarness<In, Out>
where
    In: Send + 'static,
    Out: Send + 'static,
{
    pub(crate) fn new(name: impl Into<String>, algorithm_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            algorithm_name: algorithm_name.into(),
            endpoints: None,
            output_keepalive: None,
            conf: None,
            running: Arc::new(AtomicBool::new(false)),
            join: None,
            counters: StageCounters::default(),
            issues: IssueLog::default(),
        }
    }

    pub(crate) fn bind(&mut self, input: StageReceiver<In>, output: StageSender<Out>) {
        self.endpoints = Some((input, output));
    }

    pub(crate) fn is_running(&self) -> bool {
        self.join.is_some()
    }

    pub(crate) fn configure(&mut self, conf: Value) -> Result<(), StageError> {
        if self.is_running() {
            return Err(StageError::AlreadyRunning);
        }
        self.conf = Some(StageConfig::from_value(&conf)?);
        Ok(())
    }

    pub(crate) fn scrap(&mut self) -> Result<(), StageError> {
        if self.is_running() {
            return Err(StageError::AlreadyRunning);
        }
        self.conf = None;
        Ok(())
    }

    /// Launches the worker around a freshly built processor.
    pub(crate) fn spawn<P>(&mut self, conf: &StageConfig, processor: P) -> Result<(), StageError>
    where
        P: Processor<In, Out> + 'static,
    {
        if self.is_running() {
            return Err(StageError::AlreadyRunning);
        }
        let (input, output) = self.endpoints.take().ok_or(StageError::NotInitialized)?;
        self.counters.reset();
        // Retain a sender clone so the stage can rebind after the join.
        let output_keepalive = output.clone();
        let core = StageCore::new(
            self.name.clone(),
            self.algorithm_name.clone(),
            input,
            output,
            conf.queue_timeout(),
            self.counters.clone(),
            self.issues.clone(),
        );
        self.running.store(true, Ordering::Relaxed);
        let running = self.running.clone();
        let drop_on_drain = conf.drop_on_drain;
        let join = thread::Builder::new()
            .name(self.name.clone())
            .spawn(move || run_worker(core, running, processor, drop_on_drain))
            .expect("failed to spawn stage worker");
        self.join = Some(join);
        self.output_keepalive = Some(output_keepalive);
        Ok(())
    }

    pub(crate) fn stop(&mut self) -> Result<(), StageError> {
        let join = self.join.take().ok_or(StageError::NotRunning)?;
        self.running.store(false, Ordering::Relaxed);
        match join.join() {
            Ok(input) => {
                let output = self
                    .output_keepalive
                    .take()
                    .expect("output endpoint retained while running");
                self.endpoints = Some((input, output));
                Ok(())
            }
            Err(_) => {
                self.output_keepalive = None;
                Err(StageError::WorkerPanicked)
            }
        }
    }

    pub(crate) fn report(&self) -> StageReport {
        self.counters.report()
    }

    pub(crate) fn issues(&self) -> IssueLog {
        self.issues.clone()
    }
}
