use serde_json::Value;

use crate::algorithm::core::{Algorithm, AlgorithmFactory};
use crate::buffer::input::TimeSliceInputBuffer;
use crate::model::set::{Set, SetKind, TimeSliced};
use crate::observability::issues::{IssueLog, Severity, StageIssue, StageReport};
use crate::stage::channel::{StageReceiver, StageSender};
use crate::stage::core::{
    apply_slice, flush_algorithm, Processor, StageControl, StageCore, StageError, StageHarness,
};

/// Slice-consuming stage: time-tagged input sets in, raw output elements
/// out.
///
/// Payload sets are reassembled into complete slices before the algorithm
/// sees them; heartbeats flush the input buffer and the algorithm but are
/// not forwarded (there is no envelope downstream to carry them).
pub struct SliceStage<A, B> {
    harness: StageHarness<Set<A>, B>,
    factory: AlgorithmFactory<A, B>,
}

impl<A, B> SliceStage<A, B>
where
    A: TimeSliced + Send + 'static,
    B: Send + 'static,
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
    pub fn init(&mut self, input: StageReceiver<Set<A>>, output: StageSender<B>) {
        self.harness.bind(input, output);
    }

    pub fn report(&self) -> StageReport {
        self.harness.report()
    }

    pub fn issues(&self) -> IssueLog {
        self.harness.issues()
    }
}

impl<A, B> StageControl for SliceStage<A, B>
where
    A: TimeSliced + Send + 'static,
    B: Send + 'static,
{
    fn configure(&mut self, conf: Value) -> Result<(), StageError> {
        self.harness.configure(conf)
    }

    fn start(&mut self) -> Result<(), StageError> {
        let conf = self.harness.conf.clone().ok_or(StageError::NotConfigured)?;
        let algorithm = (self.factory)(&conf.algorithm)?;
        let processor = SliceProcessor {
            algorithm,
            in_buffer: TimeSliceInputBuffer::new(self.harness.name.clone(), self.harness.issues()),
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

struct SliceProcessor<A, B> {
    algorithm: Box<dyn Algorithm<A, B>>,
    in_buffer: TimeSliceInputBuffer<A>,
}

impl<A, B> Processor<Set<A>, B> for SliceProcessor<A, B>
where
    A: TimeSliced + Send,
    B: Send,
{
    fn process(&mut self, input: Set<A>, core: &StageCore<Set<A>, B>) {
        let mut out = Vec::new();
        match input.kind {
            SetKind::Payload => {
                let Some(slice) = self.in_buffer.absorb(input) else {
                    return;
                };
                apply_slice(
                    self.algorithm.as_mut(),
                    &slice,
                    &mut out,
                    &core.name,
                    &core.algorithm_name,
                    &core.issues,
                );
            }
            SetKind::Heartbeat => {
                // A heartbeat for time T promises no further inputs with
                // t < T, so everything buffered can be released.
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
                        &mut out,
                        &core.name,
                        &core.algorithm_name,
                        &core.issues,
                    );
                }
                flush_algorithm(
                    self.algorithm.as_mut(),
                    input.end_time,
                    &mut out,
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
        for produced in out {
            core.send(produced);
        }
    }

    fn drain(&mut self, drop: bool, core: &StageCore<Set<A>, B>) {
        let Some(slice) = self.in_buffer.flush() else {
            return;
        };
        let mut out = Vec::new();
        apply_slice(
            self.algorithm.as_mut(),
            &slice,
            &mut out,
            &core.name,
            &core.algorithm_name,
            &core.issues,
        );
        if drop {
            return;
        }
        for produced in out {
            core.send(produced);
        }
    }
}
