use serde::{Deserialize, Serialize};

use crate::model::set::{Tick, TimeSliced};

/// Single over-threshold hit reported by the readout: one row of the
/// producer's input file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriggerPrimitive {
    pub time_start: Tick,
    pub time_over_threshold: Tick,
    pub time_peak: Tick,
    pub channel: u32,
    pub adc_integral: u32,
    pub adc_peak: u16,
    pub detid: u16,
    pub kind: u16,
}

impl TimeSliced for TriggerPrimitive {
    fn time_start(&self) -> Tick {
        self.time_start
    }
}

/// Cluster of primitives promoted by an algorithm into a candidate activity.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TriggerActivity {
    pub time_start: Tick,
    pub time_end: Tick,
    pub channel_start: u32,
    pub channel_end: u32,
    pub adc_integral: u64,
    pub inputs: Vec<TriggerPrimitive>,
}

impl TriggerActivity {
    /// Builds an activity spanning exactly the provided primitives.
    pub fn from_inputs(inputs: Vec<TriggerPrimitive>) -> Self {
        let mut activity = Self::default();
        if let Some(first) = inputs.first() {
            activity.time_start = first.time_start;
            activity.time_end = first.time_start + first.time_over_threshold;
            activity.channel_start = first.channel;
            activity.channel_end = first.channel;
        }
        for tp in &inputs {
            activity.time_start = activity.time_start.min(tp.time_start);
            activity.time_end = activity.time_end.max(tp.time_start + tp.time_over_threshold);
            activity.channel_start = activity.channel_start.min(tp.channel);
            activity.channel_end = activity.channel_end.max(tp.channel);
            activity.adc_integral += u64::from(tp.adc_integral);
        }
        activity.inputs = inputs;
        activity
    }
}

impl TimeSliced for TriggerActivity {
    fn time_start(&self) -> Tick {
        self.time_start
    }
}
