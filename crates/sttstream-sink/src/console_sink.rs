use crate::sink_trait::ResultSink;
use async_trait::async_trait;
use std::io::Write;
use sttstream_core::SinkError;

/// Prints each final refinement's alternatives, newline-joined.
pub struct ConsoleSink {
    out: Box<dyn Write + Send>,
    show_partials: bool,
}

impl ConsoleSink {
    pub fn new() -> Self {
        Self::with_writer(Box::new(std::io::stdout()))
    }

    pub fn with_writer(out: Box<dyn Write + Send>) -> Self {
        Self {
            out,
            show_partials: false,
        }
    }
}

impl Default for ConsoleSink {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ResultSink for ConsoleSink {
    fn name(&self) -> &str {
        "console"
    }

    async fn initialize(&mut self, config: toml::Value) -> Result<(), SinkError> {
        self.show_partials = config
            .get("show_partials")
            .and_then(|v| v.as_bool())
            .unwrap_or(true);
        Ok(())
    }

    async fn accept(&mut self, texts: &[String]) -> Result<(), SinkError> {
        writeln!(self.out, "{}", texts.join("\n"))
            .and_then(|_| self.out.flush())
            .map_err(|e| SinkError::SendFailed(e.to_string()))
    }

    async fn accept_partial(&mut self, texts: &[String]) -> Result<(), SinkError> {
        if !self.show_partials {
            return Ok(());
        }
        if let Some(best) = texts.first() {
            writeln!(self.out, "... {best}")
                .and_then(|_| self.out.flush())
                .map_err(|e| SinkError::SendFailed(e.to_string()))?;
        }
        Ok(())
    }

    fn is_healthy(&self) -> bool {
        true
    }

    async fn shutdown(&mut self) -> Result<(), SinkError> {
        self.out
            .flush()
            .map_err(|e| SinkError::SendFailed(e.to_string()))
    }
}
