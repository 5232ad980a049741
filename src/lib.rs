//! Time-sliced windowing stages for data-acquisition trigger pipelines.
//!
//! A stage pulls time-tagged sets from a bounded input channel, reassembles
//! complete time slices, drives a pluggable algorithm, regroups its outputs
//! into fixed-width windows on a global grid, and emits them downstream with
//! heartbeat markers interleaved so logical time advances through data
//! lulls. Each stage owns exactly one worker thread; parallelism comes from
//! instantiating several stages connected by channels.

pub mod model {
    pub mod primitive;
    pub mod set;

    pub use primitive::*;
    pub use set::*;
}

pub mod observability {
    pub mod issues;

    pub use issues::*;
}

pub mod buffer {
    pub mod input;
    pub mod output;

    pub use input::*;
    pub use output::*;
}

pub mod algorithm {
    pub mod core;
    pub mod prescale;
    pub mod registry;

    pub use core::*;
    pub use prescale::*;
    pub use registry::*;
}

pub mod stage {
    pub mod channel;
    pub mod core;
    pub mod element;
    pub mod slice;
    pub mod tee;
    pub mod window;

    pub use core::*;
    pub use element::*;
    pub use slice::*;
    pub use tee::*;
    pub use window::*;
}

pub mod inject {
    pub mod heartbeat;
    pub mod producer;

    pub use heartbeat::*;
    pub use producer::*;
}

pub mod config;

pub use algorithm::{
    standard_registry, Algorithm, AlgorithmError, AlgorithmFactory, AlgorithmRegistry,
    PrescaleActivityMaker,
};
pub use buffer::{TimeSlice, TimeSliceInputBuffer, TimeSliceOutputBuffer};
pub use config::{
    ConfigError, HeartbeatConfig, ProducerConfig, StageConfig, DEFAULT_BUFFER_TIME,
    DEFAULT_CLOCK_FREQUENCY_HZ, DEFAULT_HEARTBEAT_INTERVAL, DEFAULT_QUEUE_TIMEOUT_MS,
    DEFAULT_SEND_INTERVAL_MS, DEFAULT_WINDOW_TIME,
};
pub use inject::{HeartbeatInjector, PrimitiveFileProducer, SystemTickClock, TickClock};
pub use model::{
    Origin, Set, SetKind, Subsystem, Tick, TimeSliced, TriggerActivity, TriggerPrimitive,
    INVALID_ELEMENT_ID,
};
pub use observability::{
    IssueLog, IssueRecord, Severity, StageCounters, StageIssue, StageReport,
};
pub use stage::channel::{channel, RecvError, SendError, StageReceiver, StageSender};
pub use stage::{ElementStage, SetTee, SliceStage, StageControl, StageError, WindowStage};
