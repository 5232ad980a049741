use serde_json::Value;

use crate::algorithm::core::{Algorithm, AlgorithmFactory};
use crate::observability::issues::{IssueLog, Severity, StageIssue, StageReport};
use crate::stage::channel::{StageReceiver, StageSender};
use crate::stage::core::{Processor, StageControl, StageCore, StageError, StageHarness};

/// Pass-through stage: one raw input element in, raw output elements out.
///
/// No envelopes, no slice reassembly, no windowing, no heartbeat handling;
/// every produced output is sent individually as soon as it exists.
pub struct ElementStage<A, B> {
    harness: StageHarness<A, B>,
    factory: AlgorithmFactory<A, B>,
}

impl<A, B> ElementStage<A, B>
where
    A: Send + 'static,
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
    pub fn init(&mut self, input: StageReceiver<A>, output: StageSender<B>) {
        self.harness.bind(input, output);
    }

    pub fn report(&self) -> StageReport {
        self.harness.report()
    }

    pub fn issues(&self) -> IssueLog {
        self.harness.issues()
    }
}

impl<A, B> StageControl for ElementStage<A, B>
where
    A: Send + 'static,
    B: Send + 'static,
{
    fn configure(&mut self, conf: Value) -> Result<(), StageError> {
        self.harness.configure(conf)
    }

    fn start(&mut self) -> Result<(), StageError> {
        let conf = self.harness.conf.clone().ok_or(StageError::NotConfigured)?;
        let algorithm = (self.factory)(&conf.algorithm)?;
        let processor = ElementProcessor { algorithm };
        self.harness.spawn(&conf, processor)
    }

    fn stop(&mut self) -> Result<(), StageError> {
        self.harness.stop()
    }

    fn scrap(&mut self) -> Result<(), StageError> {
        self.harness.scrap()
    }
}

struct ElementProcessor<A, B> {
    algorithm: Box<dyn Algorithm<A, B>>,
}

impl<A, B> Processor<A, B> for ElementProcessor<A, B>
where
    A: Send,
    B: Send,
{
    fn process(&mut self, input: A, core: &StageCore<A, B>) {
        let mut out = Vec::new();
        if self.algorithm.apply(&input, &mut out).is_err() {
            core.record(
                Severity::Fatal,
                StageIssue::AlgorithmFatal {
                    stage: core.name.clone(),
                    algorithm: core.algorithm_name.clone(),
                },
            );
            return;
        }
        for produced in out {
            core.send(produced);
        }
    }

    fn drain(&mut self, _drop: bool, _core: &StageCore<A, B>) {}
}
