use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;

use crate::algorithm::core::{Algorithm, AlgorithmError, AlgorithmFactory};
use crate::algorithm::prescale::PrescaleActivityMaker;
use crate::model::primitive::{TriggerActivity, TriggerPrimitive};

/// Name-keyed algorithm factories.
///
/// Wiring code looks an algorithm up by the name carried in the stage
/// configuration and hands the factory to the stage, which rebuilds the
/// instance on every `start`.
pub struct AlgorithmRegistry<A, B> {
    factories: HashMap<String, AlgorithmFactory<A, B>>,
}

impl<A, B> Default for AlgorithmRegistry<A, B> {
    fn default() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }
}

impl<A, B> AlgorithmRegistry<A, B> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a factory under `name`, replacing any previous entry.
    pub fn register(&mut self, name: impl Into<String>, factory: AlgorithmFactory<A, B>) {
        self.factories.insert(name.into(), factory);
    }

    /// Returns the factory registered under `name`.
    pub fn factory(&self, name: &str) -> Result<AlgorithmFactory<A, B>, AlgorithmError> {
        self.factories
            .get(name)
            .cloned()
            .ok_or_else(|| AlgorithmError::Unknown(name.to_string()))
    }

    /// Builds an instance directly, mostly a convenience for tests.
    pub fn build(
        &self,
        name: &str,
        config: &Value,
    ) -> Result<Box<dyn Algorithm<A, B>>, AlgorithmError> {
        (self.factory(name)?)(config)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.factories.keys().map(String::as_str)
    }
}

/// Registry preloaded with the stock trigger algorithms.
pub fn standard_registry() -> AlgorithmRegistry<TriggerPrimitive, TriggerActivity> {
    let mut registry = AlgorithmRegistry::new();
    registry.register(
        "prescale",
        Arc::new(|config: &Value| {
            PrescaleActivityMaker::from_config(config)
                .map(|maker| Box::new(maker) as Box<dyn Algorithm<_, _>>)
        }),
    );
    registry
}
