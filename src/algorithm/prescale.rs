use serde::Deserialize;
use serde_json::Value;

use crate::algorithm::core::{Algorithm, AlgorithmError};
use crate::model::primitive::{TriggerActivity, TriggerPrimitive};

#[derive(Debug, Deserialize)]
struct PrescaleConfig {
    #[serde(default = "default_prescale")]
    prescale: u64,
}

fn default_prescale() -> u64 {
    1
}

/// Promotes every Nth primitive into a single-input activity.
///
/// The simplest useful trigger algorithm: a deterministic downsample with no
/// cross-input state beyond the counter, so `flush` has nothing to release.
pub struct PrescaleActivityMaker {
    prescale: u64,
    seen: u64,
}

impl PrescaleActivityMaker {
    pub fn new(prescale: u64) -> Self {
        Self { prescale, seen: 0 }
    }

    pub fn from_config(config: &Value) -> Result<Self, AlgorithmError> {
        // An absent sub-object means "no downsampling".
        let parsed: PrescaleConfig = if config.is_null() {
            PrescaleConfig {
                prescale: default_prescale(),
            }
        } else {
            serde_json::from_value(config.clone())
                .map_err(|err| AlgorithmError::InvalidConfig(err.to_string()))?
        };
        if parsed.prescale == 0 {
            return Err(AlgorithmError::InvalidConfig(
                "prescale must be >= 1".into(),
            ));
        }
        Ok(Self::new(parsed.prescale))
    }
}

impl Algorithm<TriggerPrimitive, TriggerActivity> for PrescaleActivityMaker {
    fn apply(
        &mut self,
        input: &TriggerPrimitive,
        out: &mut Vec<TriggerActivity>,
    ) -> Result<(), AlgorithmError> {
        self.seen += 1;
        if self.seen % self.prescale == 0 {
            out.push(TriggerActivity::from_inputs(vec![*input]));
        }
        Ok(())
    }
}
