use serde_json::Value;

use crate::algorithm::core::{Algorithm, AlgorithmFactory};
use crate::buffer::input::TimeSliceInputBuffer;
use crate::buffer::output::TimeSliceOutputBuffer;
use crate::model::set::{Origin, Set, SetKind, Subsystem, Tick, TimeSliced};
use crate::observability::issues::{IssueLog, Severity, StageIssue, StageReport};
use crate::stage::channel::{StageReceiver, StageSender};
use crate::stage::core::{
    apply_slice, flush_algorithm, Processor, StageControl, StageCore, StageError, StageHarness,
};

/// Fully windowed stage: time-tagged sets in, time-tagged sets out.
///
/// Payload slices are reassembled and fed through the algorithm; outputs are
/// regrouped into fixed-width windows on the global grid and emitted once
/// closed, interleaved in time order with forwarded heartbeat markers.
/// Emitted sets carry a fresh seqno and the configured origin.
pub struct WindowStage<A, B> {
    harness: StageHarness<Set<A>, Set<B>>,
    factory: AlgorithmFactory<A, B>,
}

impl<A, B> WindowStage<A, B>
where
    A: TimeSliced + Send + 'static,
    B: TimeSliced + Send + 'static,
{
    pub fn new(
        name: impl Into<String>,
        algorithm_name: impl Into<String>,
        factory: AlgorithmFactory<A, B>,
    ) -> Self {
        Self {
            harness: StageHarness::new(name, algorithm_name),
            factory,
        }
    }

    /// Binds the input receiver and output sender.
    pub fn init(&mut self, input: StageReceiver<Set<A>>, output: StageSender<Set<B>>) {
        self.harness.bind(input, output);
    }

    pub fn report(&self) -> StageReport {
        self.harness.report()
    }

    pub fn issues(&self) -> IssueLog {
        self.harness.issues()
    }
}

impl<A, B> StageControl for WindowStage<A, B>
where
    A: TimeSliced + Send + 'static,
    B: TimeSliced + Send + 'static,
{
    fn configure(&mut self, conf: Value) -> Result<(), StageError> {
        self.harness.configure(conf)
    }

    fn start(&mut self) -> Result<(), StageError> {
        let conf = self.harness.conf.clone().ok_or(StageError::NotConfigured)?;
        let algorithm = (self.factory)(&conf.algorithm)?;
        let processor = WindowProcessor {
            algorithm,
            in_buffer: TimeSliceInputBuffer::new(self.harness.name.clone(), self.harness.issues()),
            out_buffer: TimeSliceOutputBuffer::new(conf.window_time, conf.buffer_time),
            prev_start_time: 0,
            origin: Origin::new(Subsystem::Trigger, conf.source_id),
        };
        self.harness.spawn(&conf, processor)
    }

    fn stop(&mut self) -> Result<(), StageError> {
        self.harness.stop()
    }

    fn scrap(&mut self) -> Result<(), StageError> {
        self.harness.scrap()
    }
}

struct WindowProcessor<A, B> {
    algorithm: Box<dyn Algorithm<A, B>>,
    in_buffer: TimeSliceInputBuffer<A>,
    out_buffer: TimeSliceOutputBuffer<B>,
    prev_start_time: Tick,
    origin: Origin,
}

impl<A, B> WindowProcessor<A, B>
where
    A: TimeSliced + Send,
    B: TimeSliced + Send,
{
    /// Stamps seqno and origin and pushes one set downstream.
    fn emit(&self, mut out: Set<B>, core: &StageCore<Set<A>, Set<B>>) {
        out.seqno = core.counters.sent();
        out.origin = self.origin;
        core.send(out);
    }
}

impl<A, B> Processor<Set<A>, Set<B>> for WindowProcessor<A, B>
where
    A: TimeSliced + Send,
    B: TimeSliced + Send,
{
    fn process(&mut self, input: Set<A>, core: &StageCore<Set<A>, Set<B>>) {
        let mut elems = Vec::new();
        match input.kind {
            SetKind::Payload => {
                if self.prev_start_time != 0 && input.start_time < self.prev_start_time {
                    core.record(
                        Severity::Warning,
                        StageIssue::OutOfOrderSets {
                            stage: core.name.clone(),
                            previous: self.prev_start_time,
                            observed: input.start_time,
                        },
                    );
                }
                self.prev_start_time = input.start_time;
                if let Some(slice) = self.in_buffer.absorb(input) {
                    apply_slice(
                        self.algorithm.as_mut(),
                        &slice,
                        &mut elems,
                        &core.name,
                        &core.algorithm_name,
                        &core.issues,
                    );
                }
            }
            SetKind::Heartbeat => {
                // A heartbeat for time T promises no further inputs with
                // t < T; the buffered slice is complete by construction.
                if let Some(slice) = self.in_buffer.flush() {
                    if slice.end_time > input.start_time {
                        core.record(
                            Severity::Fatal,
                            StageIssue::OutOfOrderSets {
                                stage: core.name.clone(),
                                previous: slice.end_time,
                                observed: input.start_time,
                            },
                        );
                    }
                    apply_slice(
                        self.algorithm.as_mut(),
                        &slice,
                        &mut elems,
                        &core.name,
                        &core.algorithm_name,
                        &core.issues,
                    );
                }
                self.out_buffer.buffer_heartbeat(Set::heartbeat(
                    input.start_time,
                    input.end_time,
                    self.origin,
                ));
                flush_algorithm(
                    self.algorithm.as_mut(),
                    input.end_time,
                    &mut elems,
                    &core.name,
                    &core.algorithm_name,
                    &core.issues,
                );
            }
            SetKind::Unknown => {
                core.record(
                    Severity::Error,
                    StageIssue::UnknownSet {
                        stage: core.name.clone(),
                        algorithm: core.algorithm_name.clone(),
                    },
                );
            }
        }
        if !elems.is_empty() {
            self.out_buffer.buffer(elems);
        }
        while self.out_buffer.ready() {
            if let Some(out) = self.out_buffer.flush() {
                self.emit(out, core);
            }
        }
    }

    fn drain(&mut self, drop: bool, core: &StageCore<Set<A>, Set<B>>) {
        // Push anything still in the input buffer through the algorithm
        // first, then empty the output buffer. The popped windows may not be
        // fully formed, but no more data is coming.
        if let Some(slice) = self.in_buffer.flush() {
            let mut elems = Vec::new();
            apply_slice(
                self.algorithm.as_mut(),
                &slice,
                &mut elems,
                &core.name,
                &core.algorithm_name,
                &core.issues,
            );
            if !elems.is_empty() {
                self.out_buffer.buffer(elems);
            }
        }
        while let Some(out) = self.out_buffer.flush() {
            if !drop {
                self.emit(out, core);
            }
        }
    }
}
