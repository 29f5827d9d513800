use crate::sink_trait::ResultSink;
use std::collections::HashMap;
use sttstream_core::{OutputConfig, SinkError};

/// Result sinks by name, as selected by `[output] sink`.
pub struct SinkRegistry {
    factories: HashMap<String, fn() -> Box<dyn ResultSink>>,
}

impl SinkRegistry {
    pub fn new() -> Self {
        let mut registry = Self {
            factories: HashMap::new(),
        };
        registry.register("console", || Box::new(crate::console_sink::ConsoleSink::new()));
        registry.register("file", || Box::new(crate::file_sink::FileSink::new()));
        registry
    }

    pub fn register(&mut self, name: &str, factory: fn() -> Box<dyn ResultSink>) {
        self.factories.insert(name.to_string(), factory);
    }

    pub fn create(&self, name: &str) -> Result<Box<dyn ResultSink>, SinkError> {
        self.factories
            .get(name)
            .map(|f| f())
            .ok_or_else(|| SinkError::NotFound(name.to_string()))
    }

    /// Creates the sink named by `[output] sink` and hands it the rest of
    /// the `[output]` table.
    pub async fn open(&self, output: &OutputConfig) -> Result<Box<dyn ResultSink>, SinkError> {
        let mut sink = self.create(&output.sink)?;
        sink.initialize(toml::Value::Table(output.extra.clone())).await?;
        tracing::debug!(sink = sink.name(), "result sink ready");
        Ok(sink)
    }

    pub fn list_sinks(&self) -> Vec<&str> {
        self.factories.keys().map(|s| s.as_str()).collect()
    }
}

impl Default for SinkRegistry {
    fn default() -> Self {
        Self::new()
    }
}
